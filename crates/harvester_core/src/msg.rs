use crate::ListingRecord;

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Begin the run.
    Start,
    /// The pending acquisition produced a token.
    TokenAcquired,
    /// The pending acquisition ended without a token.
    TokenUnavailable,
    /// The request for `descriptor` returned a page; `records` are already mapped.
    PageFetched {
        descriptor: usize,
        records: Vec<ListingRecord>,
    },
    /// The upstream rejected the session token on `descriptor`.
    AuthRejected { descriptor: usize },
    /// The request for `descriptor` failed in a way worth skipping over.
    TransientFailure { descriptor: usize },
    /// The pending `Effect::Wait` finished.
    WaitElapsed,
    /// Stop cooperatively. Sent instead of running the next pending effect,
    /// or when a wait is interrupted.
    CancelRequested,
}
