use std::fmt;

use harvester_core::{HarvestSummary, SessionEnd, SessionId};

/// One untyped listing exactly as the API returned it.
pub type RawRecord = serde_json::Value;

/// Result of one listings request.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Page(Vec<RawRecord>),
    /// The upstream no longer accepts the session token.
    AuthRejected { status: u16 },
    Transient(FetchError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for FetchError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    InvalidHeader,
    HttpStatus(u16),
    Timeout,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    MalformedBody,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::InvalidHeader => write!(f, "invalid header value"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::MalformedBody => write!(f, "malformed response body"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    Page {
        records: usize,
        new_records: usize,
        rejected: usize,
    },
    AuthRejected {
        status: u16,
    },
    Failed(FailureKind),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    SessionStarted {
        session: SessionId,
    },
    TokenAcquired {
        session: SessionId,
        fingerprint: String,
    },
    AcquisitionFailed {
        session: SessionId,
    },
    RequestCompleted {
        session: SessionId,
        descriptor: usize,
        outcome: RequestOutcome,
    },
    SessionEnded {
        session: SessionId,
        new_records: usize,
        reason: SessionEnd,
    },
    Finished(HarvestSummary),
}
