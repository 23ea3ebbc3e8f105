use harvester_core::{
    update, Effect, HarvestSettings, HarvestState, ListingRecord, Msg, Phase, SessionEnd,
};

fn listing(id: &str) -> ListingRecord {
    ListingRecord {
        ad_id: id.to_string(),
        ..ListingRecord::default()
    }
}

fn running_state() -> HarvestState {
    let settings = HarvestSettings {
        target_count: 100,
        token_budget: 5,
        ..HarvestSettings::default()
    };
    let (state, _) = update(HarvestState::new(settings, 3), Msg::Start);
    let (state, _) = update(state, Msg::TokenAcquired);
    state
}

#[test]
fn cancel_while_pacing_ends_session_and_keeps_records() {
    let state = running_state();
    let (state, _) = update(
        state,
        Msg::PageFetched {
            descriptor: 0,
            records: vec![listing("a")],
        },
    );
    assert_eq!(state.phase(), Phase::Pacing { session: 1, next: 1 });

    let (state, effects) = update(state, Msg::CancelRequested);
    assert_eq!(
        effects,
        vec![Effect::EndSession {
            session: 1,
            new_records: 1,
            reason: SessionEnd::Cancelled,
        }]
    );
    assert!(state.is_finished());
    assert!(state.is_cancelled());
    assert_eq!(state.collected(), 1);
    assert_eq!(state.view().requests_issued, 1);
}

#[test]
fn cancel_between_sessions_starts_nothing() {
    let state = running_state();
    let (state, _) = update(state, Msg::AuthRejected { descriptor: 0 });
    assert_eq!(state.phase(), Phase::BetweenSessions);

    let (state, effects) = update(state, Msg::CancelRequested);
    assert!(effects.is_empty());
    assert!(state.is_finished());

    let (state, effects) = update(state, Msg::WaitElapsed);
    assert!(effects.is_empty());
    assert_eq!(state.sessions_attempted(), 1);
}

#[test]
fn cancel_is_idempotent() {
    let state = running_state();
    let (state, first) = update(state, Msg::CancelRequested);
    let (state, second) = update(state, Msg::CancelRequested);
    assert_eq!(first.len(), 1);
    assert!(second.is_empty());
    assert!(state.is_finished());
}

#[test]
fn cancelled_state_never_starts_a_session() {
    let (state, _) = update(HarvestState::new(HarvestSettings::default(), 3), Msg::CancelRequested);
    let (state, effects) = update(state, Msg::Start);
    assert!(effects.is_empty());
    assert_eq!(state.sessions_attempted(), 0);
    assert!(!state.should_start_session());
}

#[test]
fn cancel_before_acquisition_gives_the_session_back() {
    let (state, effects) = update(HarvestState::new(HarvestSettings::default(), 3), Msg::Start);
    assert_eq!(effects, vec![Effect::AcquireToken { session: 1 }]);

    let (state, effects) = update(state, Msg::CancelRequested);
    assert!(effects.is_empty());
    assert!(state.is_finished());
    assert_eq!(state.view().sessions_attempted, 0);
}

#[test]
fn cancel_before_first_request_counts_no_request() {
    let state = running_state();
    assert_eq!(state.phase(), Phase::Fetching { session: 1, descriptor: 0 });

    let (state, effects) = update(state, Msg::CancelRequested);
    assert_eq!(
        effects,
        vec![Effect::EndSession {
            session: 1,
            new_records: 0,
            reason: SessionEnd::Cancelled,
        }]
    );
    let summary = state.view();
    assert_eq!(summary.requests_issued, 0);
    assert_eq!(summary.sessions_attempted, 1);
}
