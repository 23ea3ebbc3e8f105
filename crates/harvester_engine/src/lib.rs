//! Harvester engine: token acquisition, listings IO, result export and
//! effect execution for the pure harvest state machine.
mod acquire;
mod browser;
mod engine;
mod export;
mod fetch;
mod filename;
mod mapper;
mod persist;
mod progress;
mod token;
mod types;

pub use acquire::{
    extract_bearer, AcquireError, AcquireStage, AcquisitionPlan, AcquisitionReport,
    BrowserBackend, BrowserSession, BrowserTokenProvider, TriggerAction,
};
pub use browser::{BrowserSettings, ChromiumBackend};
pub use engine::{HarvestEngine, HarvestReport};
pub use export::{ExportError, ExportOptions, FileResultSink, ResultSink};
pub use fetch::{FetchSettings, ListingsClient, ReqwestListingsClient, DESKTOP_USER_AGENT};
pub use filename::run_filename;
pub use mapper::{Clock, DealListingMapper, MapError, RecordMapper};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use progress::{ChannelProgressSink, LogProgressSink, NoopProgressSink, ProgressSink};
pub use token::{Token, TokenProvider};
pub use types::{EngineEvent, FailureKind, FetchError, FetchOutcome, RawRecord, RequestOutcome};
