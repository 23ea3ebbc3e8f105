use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;
use engine_logging::{engine_debug, engine_error, engine_info, engine_warn};
use harvester_core::{
    update, Effect, HarvestSettings, HarvestState, HarvestSummary, ListingRecord, ListingStats,
    Msg, QueryDescriptor, SessionEnd, SessionId,
};
use tokio_util::sync::CancellationToken;

use crate::export::{ExportError, ResultSink};
use crate::fetch::ListingsClient;
use crate::mapper::RecordMapper;
use crate::progress::{NoopProgressSink, ProgressSink};
use crate::token::{Token, TokenProvider};
use crate::types::{EngineEvent, FetchOutcome, RawRecord, RequestOutcome};

/// Everything a finished run leaves behind.
#[derive(Debug)]
pub struct HarvestReport {
    pub summary: HarvestSummary,
    /// Accumulated collection in first-seen order.
    pub records: Vec<ListingRecord>,
    /// Files written by the result sink; empty when nothing was collected.
    pub output_paths: Vec<PathBuf>,
    /// Set when the sink failed. The records above are still intact.
    pub persist_error: Option<ExportError>,
}

impl HarvestReport {
    pub fn cancelled(&self) -> bool {
        self.summary.cancelled
    }
}

/// Executes the effects produced by [`harvester_core::update`] against real
/// (or fake) token, listings and sink implementations.
pub struct HarvestEngine {
    settings: HarvestSettings,
    catalog: Vec<QueryDescriptor>,
    tokens: Box<dyn TokenProvider>,
    client: Box<dyn ListingsClient>,
    mapper: Box<dyn RecordMapper>,
    sink: Box<dyn ResultSink>,
    progress: Box<dyn ProgressSink>,
}

/// What a single effect produced, before it is fed back into the state.
enum Step {
    Feed(Msg),
    /// Feed the page and report it once the store has absorbed it.
    FeedPage {
        session: SessionId,
        descriptor: usize,
        records: Vec<ListingRecord>,
        rejected: usize,
    },
    /// Feed the message and report the request outcome as-is.
    FeedRequest {
        session: SessionId,
        descriptor: usize,
        msg: Msg,
        outcome: RequestOutcome,
    },
    Nothing,
}

impl HarvestEngine {
    pub fn new(
        settings: HarvestSettings,
        catalog: Vec<QueryDescriptor>,
        tokens: Box<dyn TokenProvider>,
        client: Box<dyn ListingsClient>,
        mapper: Box<dyn RecordMapper>,
        sink: Box<dyn ResultSink>,
    ) -> Self {
        Self {
            settings,
            catalog,
            tokens,
            client,
            mapper,
            sink,
            progress: Box::new(NoopProgressSink),
        }
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Runs sessions until the target, the token budget or `cancel` stops the
    /// loop, then hands whatever was collected to the result sink.
    pub async fn run(&self, cancel: CancellationToken) -> HarvestReport {
        engine_info!(
            "Starting harvest: target {} listings, up to {} tokens, {} queries per token",
            self.settings.target_count,
            self.settings.token_budget,
            self.catalog.len()
        );

        let mut state = HarvestState::new(self.settings.clone(), self.catalog.len());
        let mut effects: VecDeque<Effect> = VecDeque::new();
        let mut inbox: VecDeque<Msg> = VecDeque::from([Msg::Start]);
        let mut token: Option<Token> = None;

        loop {
            while let Some(msg) = inbox.pop_front() {
                let (next, produced) = update(state, msg);
                state = next;
                effects.extend(produced);
            }
            let Some(effect) = effects.pop_front() else {
                break;
            };

            if effect.starts_work() && cancel.is_cancelled() {
                effects.clear();
                if !state.is_cancelled() {
                    engine_warn!("Cancellation requested, stopping after the current step");
                    inbox.push_back(Msg::CancelRequested);
                }
                continue;
            }

            match self.execute(effect, &mut token, &cancel).await {
                Step::Feed(msg) => inbox.push_back(msg),
                Step::FeedPage {
                    session,
                    descriptor,
                    records,
                    rejected,
                } => {
                    let before = state.collected();
                    let fetched = records.len();
                    let (next, produced) =
                        update(state, Msg::PageFetched { descriptor, records });
                    state = next;
                    effects.extend(produced);
                    let new_records = state.collected().saturating_sub(before);
                    engine_info!(
                        session = session;
                        "Query {}/{}: {} listings, {} new, total {}",
                        descriptor + 1,
                        self.catalog.len(),
                        fetched,
                        new_records,
                        state.collected()
                    );
                    self.progress.emit(EngineEvent::RequestCompleted {
                        session,
                        descriptor,
                        outcome: RequestOutcome::Page {
                            records: fetched,
                            new_records,
                            rejected,
                        },
                    });
                }
                Step::FeedRequest {
                    session,
                    descriptor,
                    msg,
                    outcome,
                } => {
                    inbox.push_back(msg);
                    self.progress.emit(EngineEvent::RequestCompleted {
                        session,
                        descriptor,
                        outcome,
                    });
                }
                Step::Nothing => {}
            }
        }

        self.finish(state)
    }

    async fn execute(
        &self,
        effect: Effect,
        token: &mut Option<Token>,
        cancel: &CancellationToken,
    ) -> Step {
        match effect {
            Effect::AcquireToken { session } => {
                engine_info!(
                    session = session;
                    "Acquiring token ({}/{})",
                    session,
                    self.settings.token_budget
                );
                self.progress.emit(EngineEvent::SessionStarted { session });
                *token = self.tokens.acquire().await;
                match token {
                    Some(acquired) => {
                        let fingerprint = acquired.fingerprint();
                        engine_info!(session = session; "Token acquired: {}", fingerprint);
                        self.progress.emit(EngineEvent::TokenAcquired {
                            session,
                            fingerprint,
                        });
                        Step::Feed(Msg::TokenAcquired)
                    }
                    None => {
                        engine_warn!(
                            session = session;
                            "Token acquisition failed, retrying in {:?}",
                            self.settings.acquisition_cooldown
                        );
                        self.progress.emit(EngineEvent::AcquisitionFailed { session });
                        Step::Feed(Msg::TokenUnavailable)
                    }
                }
            }
            Effect::Fetch {
                session,
                descriptor,
            } => self.fetch(session, descriptor, token.as_ref()).await,
            Effect::Wait { reason, duration } => {
                engine_debug!("Waiting {:?} ({:?})", duration, reason);
                if wait_or_cancel(duration, cancel).await {
                    Step::Feed(Msg::WaitElapsed)
                } else {
                    Step::Feed(Msg::CancelRequested)
                }
            }
            Effect::EndSession {
                session,
                new_records,
                reason,
            } => {
                *token = None;
                match reason {
                    SessionEnd::CatalogExhausted => engine_info!(
                        session = session;
                        "Session complete: {} new listings",
                        new_records
                    ),
                    SessionEnd::TokenRejected => engine_warn!(
                        session = session;
                        "Token rejected, session ended with {} new listings",
                        new_records
                    ),
                    SessionEnd::Cancelled => engine_warn!(
                        session = session;
                        "Session cancelled with {} new listings",
                        new_records
                    ),
                }
                self.progress.emit(EngineEvent::SessionEnded {
                    session,
                    new_records,
                    reason,
                });
                Step::Nothing
            }
        }
    }

    async fn fetch(&self, session: SessionId, descriptor: usize, token: Option<&Token>) -> Step {
        let (Some(query), Some(token)) = (self.catalog.get(descriptor), token) else {
            engine_error!(session = session; "No token or query for request {}", descriptor);
            return Step::Feed(Msg::TransientFailure { descriptor });
        };
        engine_debug!(session = session; "Requesting {}", query);

        match self.client.fetch(token, query).await {
            FetchOutcome::Page(raw) => {
                let (records, rejected) = self.map_page(session, &raw);
                Step::FeedPage {
                    session,
                    descriptor,
                    records,
                    rejected,
                }
            }
            FetchOutcome::AuthRejected { status } => {
                engine_warn!(session = session; "Token expired or invalid (HTTP {})", status);
                Step::FeedRequest {
                    session,
                    descriptor,
                    msg: Msg::AuthRejected { descriptor },
                    outcome: RequestOutcome::AuthRejected { status },
                }
            }
            FetchOutcome::Transient(err) => {
                engine_warn!(session = session; "Query {} failed: {}", query, err);
                Step::FeedRequest {
                    session,
                    descriptor,
                    msg: Msg::TransientFailure { descriptor },
                    outcome: RequestOutcome::Failed(err.kind),
                }
            }
        }
    }

    fn map_page(&self, session: SessionId, raw: &[RawRecord]) -> (Vec<ListingRecord>, usize) {
        let mut records = Vec::with_capacity(raw.len());
        let mut rejected = 0;
        for item in raw {
            match self.mapper.map(item) {
                Ok(record) => records.push(record),
                Err(err) => {
                    rejected += 1;
                    engine_warn!(session = session; "Skipping listing: {}", err);
                }
            }
        }
        (records, rejected)
    }

    fn finish(&self, state: HarvestState) -> HarvestReport {
        let summary = state.view();
        let records = state.into_records();

        if summary.cancelled {
            engine_warn!("Harvest interrupted");
        }
        engine_info!(
            "Harvest finished: {}/{} listings from {} sessions ({} requests)",
            summary.collected,
            summary.target_count,
            summary.sessions_attempted,
            summary.requests_issued
        );
        log_stats(&ListingStats::from_records(&records));

        let (output_paths, persist_error) = match self.sink.persist(&records, Local::now()) {
            Ok(paths) => (paths, None),
            Err(err) => {
                engine_error!("Failed to save listings: {}", err);
                (Vec::new(), Some(err))
            }
        };

        self.progress.emit(EngineEvent::Finished(summary));
        HarvestReport {
            summary,
            records,
            output_paths,
            persist_error,
        }
    }
}

fn log_stats(stats: &ListingStats) {
    engine_info!("Total listings: {}", stats.total);
    engine_info!("Unique districts: {}", stats.unique_districts);
    if let Some((min, max)) = stats.price_range {
        engine_info!("Price range: {:.0} - {:.0} SAR", min, max);
    }
    if let Some(average) = stats.average_price {
        engine_info!("Average price: {:.0} SAR", average);
    }
}

/// `true` when the full duration elapsed, `false` when cancelled first.
async fn wait_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    if duration.is_zero() {
        return !cancel.is_cancelled();
    }
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = cancel.cancelled() => false,
    }
}
