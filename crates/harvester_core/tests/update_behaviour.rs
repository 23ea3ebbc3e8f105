use std::sync::Once;
use std::time::Duration;

use harvester_core::{
    update, Effect, HarvestSettings, HarvestState, ListingRecord, Msg, Phase, SessionEnd,
    WaitReason,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(engine_logging::initialize_for_tests);
}

fn settings(target_count: usize, token_budget: u32) -> HarvestSettings {
    HarvestSettings {
        target_count,
        token_budget,
        request_delay: Duration::from_millis(500),
        session_delay: Duration::from_secs(2),
        acquisition_cooldown: Duration::from_secs(5),
    }
}

fn listing(id: &str) -> ListingRecord {
    ListingRecord {
        ad_id: id.to_string(),
        ..ListingRecord::default()
    }
}

#[test]
fn start_opens_first_session() {
    init_logging();
    let state = HarvestState::new(settings(10, 3), 2);
    let (state, effects) = update(state, Msg::Start);

    assert_eq!(effects, vec![Effect::AcquireToken { session: 1 }]);
    assert_eq!(state.phase(), Phase::Acquiring { session: 1 });
    assert_eq!(state.sessions_attempted(), 1);
}

#[test]
fn zero_budget_finishes_without_acquiring() {
    init_logging();
    let (state, effects) = update(HarvestState::new(settings(10, 0), 2), Msg::Start);
    assert!(effects.is_empty());
    assert!(state.is_finished());
    assert_eq!(state.sessions_attempted(), 0);
}

#[test]
fn token_starts_fan_out_at_first_descriptor() {
    init_logging();
    let (state, _) = update(HarvestState::new(settings(10, 3), 2), Msg::Start);
    let (state, effects) = update(state, Msg::TokenAcquired);

    assert_eq!(
        effects,
        vec![Effect::Fetch {
            session: 1,
            descriptor: 0
        }]
    );
    assert_eq!(state.view().requests_issued, 0);

    let (state, _) = update(
        state,
        Msg::PageFetched {
            descriptor: 0,
            records: Vec::new(),
        },
    );
    assert_eq!(state.view().requests_issued, 1);
}

#[test]
fn every_request_outcome_counts_as_issued() {
    init_logging();
    let (state, _) = update(HarvestState::new(settings(10, 3), 3), Msg::Start);
    let (state, _) = update(state, Msg::TokenAcquired);
    let (state, _) = update(state, Msg::TransientFailure { descriptor: 0 });
    let (state, _) = update(state, Msg::WaitElapsed);
    let (state, _) = update(state, Msg::AuthRejected { descriptor: 1 });

    let summary = state.view();
    assert_eq!(summary.requests_issued, 2);
    assert_eq!(summary.transient_failures, 1);
    assert_eq!(summary.auth_rejections, 1);
}

#[test]
fn page_is_paced_before_next_descriptor() {
    init_logging();
    let (state, _) = update(HarvestState::new(settings(10, 3), 2), Msg::Start);
    let (state, _) = update(state, Msg::TokenAcquired);
    let (state, effects) = update(
        state,
        Msg::PageFetched {
            descriptor: 0,
            records: vec![listing("a"), listing("b")],
        },
    );

    assert_eq!(state.collected(), 2);
    assert_eq!(
        effects,
        vec![Effect::Wait {
            reason: WaitReason::RequestPacing,
            duration: Duration::from_millis(500),
        }]
    );

    let (state, effects) = update(state, Msg::WaitElapsed);
    assert_eq!(
        effects,
        vec![Effect::Fetch {
            session: 1,
            descriptor: 1
        }]
    );
    assert_eq!(
        state.phase(),
        Phase::Fetching {
            session: 1,
            descriptor: 1
        }
    );
}

#[test]
fn last_descriptor_ends_session_with_new_record_count() {
    init_logging();
    let (state, _) = update(HarvestState::new(settings(10, 3), 1), Msg::Start);
    let (state, _) = update(state, Msg::TokenAcquired);
    let (state, effects) = update(
        state,
        Msg::PageFetched {
            descriptor: 0,
            records: vec![listing("a"), listing("a"), listing("b")],
        },
    );

    assert_eq!(
        effects,
        vec![
            Effect::EndSession {
                session: 1,
                new_records: 2,
                reason: SessionEnd::CatalogExhausted,
            },
            Effect::Wait {
                reason: WaitReason::BetweenSessions,
                duration: Duration::from_secs(2),
            },
        ]
    );
    assert_eq!(state.phase(), Phase::BetweenSessions);
}

#[test]
fn auth_rejection_ends_session_early() {
    init_logging();
    let (state, _) = update(HarvestState::new(settings(10, 3), 3), Msg::Start);
    let (state, _) = update(state, Msg::TokenAcquired);
    let (state, effects) = update(state, Msg::AuthRejected { descriptor: 0 });

    assert_eq!(
        effects[0],
        Effect::EndSession {
            session: 1,
            new_records: 0,
            reason: SessionEnd::TokenRejected,
        }
    );
    assert_eq!(state.view().auth_rejections, 1);

    // next iteration re-evaluates the loop and acquires a fresh token
    let (state, effects) = update(state, Msg::WaitElapsed);
    assert_eq!(effects, vec![Effect::AcquireToken { session: 2 }]);
    assert_eq!(state.sessions_attempted(), 2);
}

#[test]
fn transient_failure_moves_on_to_next_descriptor() {
    init_logging();
    let (state, _) = update(HarvestState::new(settings(10, 3), 2), Msg::Start);
    let (state, _) = update(state, Msg::TokenAcquired);
    let (state, effects) = update(state, Msg::TransientFailure { descriptor: 0 });

    assert_eq!(state.view().transient_failures, 1);
    assert_eq!(state.phase(), Phase::Pacing { session: 1, next: 1 });
    assert!(matches!(
        effects.as_slice(),
        [Effect::Wait {
            reason: WaitReason::RequestPacing,
            ..
        }]
    ));
}

#[test]
fn failed_acquisition_cools_down_and_consumes_budget() {
    init_logging();
    let (state, _) = update(HarvestState::new(settings(10, 2), 2), Msg::Start);
    let (state, effects) = update(state, Msg::TokenUnavailable);
    assert_eq!(
        effects,
        vec![Effect::Wait {
            reason: WaitReason::AcquisitionCooldown,
            duration: Duration::from_secs(5),
        }]
    );

    let (state, effects) = update(state, Msg::WaitElapsed);
    assert_eq!(effects, vec![Effect::AcquireToken { session: 2 }]);

    let (state, _) = update(state, Msg::TokenUnavailable);
    let (state, effects) = update(state, Msg::WaitElapsed);
    assert!(effects.is_empty());
    assert!(state.is_finished());
    assert_eq!(state.view().acquisition_failures, 2);
    assert_eq!(state.sessions_attempted(), 2);
}

#[test]
fn stale_messages_are_ignored() {
    init_logging();
    let (state, _) = update(HarvestState::new(settings(10, 3), 3), Msg::Start);
    let before = state.clone();

    let (state, effects) = update(
        state,
        Msg::PageFetched {
            descriptor: 0,
            records: vec![listing("a")],
        },
    );
    assert!(effects.is_empty());
    assert_eq!(state, before);

    let (state, _) = update(state, Msg::TokenAcquired);
    let (state, effects) = update(state, Msg::AuthRejected { descriptor: 2 });
    assert!(effects.is_empty());
    assert_eq!(state.view().auth_rejections, 0);

    let (_, effects) = update(state, Msg::Start);
    assert!(effects.is_empty());
}

#[test]
fn empty_catalog_ends_session_right_after_acquisition() {
    init_logging();
    let (state, _) = update(HarvestState::new(settings(10, 1), 0), Msg::Start);
    let (state, effects) = update(state, Msg::TokenAcquired);
    assert_eq!(
        effects[0],
        Effect::EndSession {
            session: 1,
            new_records: 0,
            reason: SessionEnd::CatalogExhausted,
        }
    );
    let (state, effects) = update(state, Msg::WaitElapsed);
    assert!(effects.is_empty());
    assert!(state.is_finished());
}
