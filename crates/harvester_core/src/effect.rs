use std::time::Duration;

use crate::SessionId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Run one token acquisition attempt for this session.
    AcquireToken { session: SessionId },
    /// Issue the request for `descriptor` (catalog index) with the session token.
    Fetch { session: SessionId, descriptor: usize },
    /// Sleep, then report `Msg::WaitElapsed`.
    Wait { reason: WaitReason, duration: Duration },
    /// The session is over; its token must be dropped.
    EndSession {
        session: SessionId,
        new_records: usize,
        reason: SessionEnd,
    },
}

impl Effect {
    /// Effects that begin new upstream work or a delay. These are the points
    /// where a cancellation request is honoured.
    pub fn starts_work(&self) -> bool {
        !matches!(self, Effect::EndSession { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitReason {
    RequestPacing,
    BetweenSessions,
    AcquisitionCooldown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    CatalogExhausted,
    TokenRejected,
    Cancelled,
}
