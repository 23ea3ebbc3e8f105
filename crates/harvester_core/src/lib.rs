//! Harvester core: the pure harvest state machine and its data model.
//!
//! Every decision of a run (when to acquire a token, which descriptor to
//! request next, when a session ends, when the run stops) is made by
//! [`update`]. The engine performs the returned [`Effect`]s and reports
//! their outcome back as a [`Msg`].
mod dedup;
mod effect;
mod msg;
mod query;
mod record;
mod settings;
mod state;
mod summary;
mod update;

pub use dedup::DedupStore;
pub use effect::{Effect, SessionEnd, WaitReason};
pub use msg::Msg;
pub use query::{default_catalog, QueryDescriptor, DEFAULT_CITY_ID};
pub use record::{ListingRecord, LISTING_SOURCE};
pub use settings::HarvestSettings;
pub use state::{HarvestState, Phase, SessionId};
pub use summary::{HarvestSummary, ListingStats};
pub use update::update;
