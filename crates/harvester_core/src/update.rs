use crate::{Effect, HarvestState, Msg, Phase, SessionEnd, SessionId, WaitReason};

/// Pure update function: applies a message to state and returns the effects
/// the runner must perform next. Messages that do not fit the current phase
/// are ignored.
pub fn update(mut state: HarvestState, msg: Msg) -> (HarvestState, Vec<Effect>) {
    let effects = match msg {
        Msg::Start => match state.phase() {
            Phase::Idle => begin_session_or_finish(&mut state),
            _ => Vec::new(),
        },
        Msg::TokenAcquired => match state.phase() {
            Phase::Acquiring { session } => {
                if state.catalog_len() == 0 {
                    end_session(&mut state, session, SessionEnd::CatalogExhausted)
                } else {
                    fetch(&mut state, session, 0)
                }
            }
            _ => Vec::new(),
        },
        Msg::TokenUnavailable => match state.phase() {
            Phase::Acquiring { .. } => {
                state.counters_mut().acquisition_failures += 1;
                state.set_phase(Phase::Cooldown);
                vec![Effect::Wait {
                    reason: WaitReason::AcquisitionCooldown,
                    duration: state.settings().acquisition_cooldown,
                }]
            }
            _ => Vec::new(),
        },
        Msg::PageFetched {
            descriptor,
            records,
        } => match state.phase() {
            Phase::Fetching {
                session,
                descriptor: current,
            } if current == descriptor => {
                state.counters_mut().requests_issued += 1;
                state.merge(records);
                advance(&mut state, session, descriptor)
            }
            _ => Vec::new(),
        },
        Msg::TransientFailure { descriptor } => match state.phase() {
            Phase::Fetching {
                session,
                descriptor: current,
            } if current == descriptor => {
                state.counters_mut().requests_issued += 1;
                state.counters_mut().transient_failures += 1;
                advance(&mut state, session, descriptor)
            }
            _ => Vec::new(),
        },
        Msg::AuthRejected { descriptor } => match state.phase() {
            Phase::Fetching {
                session,
                descriptor: current,
            } if current == descriptor => {
                state.counters_mut().requests_issued += 1;
                state.counters_mut().auth_rejections += 1;
                end_session(&mut state, session, SessionEnd::TokenRejected)
            }
            _ => Vec::new(),
        },
        Msg::WaitElapsed => match state.phase() {
            Phase::Pacing { session, next } => fetch(&mut state, session, next),
            Phase::BetweenSessions | Phase::Cooldown => begin_session_or_finish(&mut state),
            _ => Vec::new(),
        },
        Msg::CancelRequested => cancel(&mut state),
    };

    (state, effects)
}

fn begin_session_or_finish(state: &mut HarvestState) -> Vec<Effect> {
    if !state.should_start_session() {
        state.set_phase(Phase::Finished);
        return Vec::new();
    }
    let session = state.open_session();
    state.set_phase(Phase::Acquiring { session });
    vec![Effect::AcquireToken { session }]
}

fn fetch(state: &mut HarvestState, session: SessionId, descriptor: usize) -> Vec<Effect> {
    state.set_phase(Phase::Fetching {
        session,
        descriptor,
    });
    vec![Effect::Fetch {
        session,
        descriptor,
    }]
}

fn advance(state: &mut HarvestState, session: SessionId, descriptor: usize) -> Vec<Effect> {
    let next = descriptor + 1;
    if next >= state.catalog_len() {
        return end_session(state, session, SessionEnd::CatalogExhausted);
    }
    state.set_phase(Phase::Pacing { session, next });
    vec![Effect::Wait {
        reason: WaitReason::RequestPacing,
        duration: state.settings().request_delay,
    }]
}

fn end_session(state: &mut HarvestState, session: SessionId, reason: SessionEnd) -> Vec<Effect> {
    let mut effects = vec![Effect::EndSession {
        session,
        new_records: state.take_session_new_records(),
        reason,
    }];
    if state.is_cancelled() {
        state.set_phase(Phase::Finished);
    } else {
        state.set_phase(Phase::BetweenSessions);
        effects.push(Effect::Wait {
            reason: WaitReason::BetweenSessions,
            duration: state.settings().session_delay,
        });
    }
    effects
}

fn cancel(state: &mut HarvestState) -> Vec<Effect> {
    let already = state.is_cancelled();
    state.mark_cancelled();
    match state.phase() {
        Phase::Fetching { session, .. } | Phase::Pacing { session, .. } if !already => {
            end_session(state, session, SessionEnd::Cancelled)
        }
        // Only reachable before the acquisition effect runs.
        Phase::Acquiring { .. } => {
            state.abandon_session();
            state.set_phase(Phase::Finished);
            Vec::new()
        }
        _ => {
            state.set_phase(Phase::Finished);
            Vec::new()
        }
    }
}
