//! Browser-driven token acquisition.
//!
//! One call to [`BrowserTokenProvider::run`] walks
//! `Idle -> Launching -> EstablishingContext -> Navigating -> AwaitingCapture`
//! and ends in `Captured` or `Failed`. The browser session is released on
//! every path out of the machine, and no error crosses its boundary: callers
//! only see a token or its absence.

use std::time::Duration;

use engine_logging::{engine_debug, engine_error, engine_info, engine_warn};

use crate::token::{Token, TokenProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireStage {
    Idle,
    Launching,
    EstablishingContext,
    Navigating,
    AwaitingCapture,
    Captured,
    Failed,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AcquireError {
    #[error("browser launch failed: {0}")]
    Launch(String),
    #[error("browser context setup failed: {0}")]
    Context(String),
    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },
    #[error("no element with text {0:?}")]
    ElementNotFound(String),
    #[error("{action} timed out after {timeout:?}")]
    Timeout { action: String, timeout: Duration },
    #[error("browser release failed: {0}")]
    Release(String),
}

/// Best-effort action that should make the site call its API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerAction {
    /// Click the first element whose text contains `text`, then wait `settle`.
    ClickText { text: String, settle: Duration },
    /// Navigate to `url`, then wait `settle`.
    Navigate {
        url: String,
        timeout: Duration,
        settle: Duration,
    },
}

impl TriggerAction {
    fn settle(&self) -> Duration {
        match self {
            TriggerAction::ClickText { settle, .. } | TriggerAction::Navigate { settle, .. } => {
                *settle
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionPlan {
    pub site_url: String,
    pub navigation_attempts: u32,
    pub navigation_timeout: Duration,
    /// Pause after the landing page loads, before any trigger runs.
    pub settle_delay: Duration,
    pub triggers: Vec<TriggerAction>,
}

impl Default for AcquisitionPlan {
    fn default() -> Self {
        Self {
            site_url: "https://dealapp.sa".to_string(),
            navigation_attempts: 3,
            navigation_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_secs(3),
            triggers: vec![
                TriggerAction::ClickText {
                    text: "السوق".to_string(),
                    settle: Duration::from_secs(2),
                },
                TriggerAction::Navigate {
                    url: "https://dealapp.sa/ar/السوق/الاعلانات".to_string(),
                    timeout: Duration::from_secs(10),
                    settle: Duration::from_secs(2),
                },
            ],
        }
    }
}

/// Launches isolated browser sessions.
#[async_trait::async_trait]
pub trait BrowserBackend: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, AcquireError>;
}

/// One running browser with a request listener attached once the context is open.
#[async_trait::async_trait]
pub trait BrowserSession: Send {
    async fn open_context(&mut self) -> Result<(), AcquireError>;
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), AcquireError>;
    async fn click_text(&mut self, text: &str) -> Result<(), AcquireError>;
    /// Latest bearer token seen on outgoing API traffic.
    fn captured_token(&self) -> Option<Token>;
    /// Tears the browser down. Safe to call more than once.
    async fn release(&mut self) -> Result<(), AcquireError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionReport {
    pub token: Option<Token>,
    pub stages: Vec<AcquireStage>,
    /// One entry per trigger that ran, `true` when it succeeded.
    pub triggers: Vec<bool>,
}

struct StageTrace {
    stages: Vec<AcquireStage>,
}

impl StageTrace {
    fn new() -> Self {
        Self {
            stages: vec![AcquireStage::Idle],
        }
    }

    fn enter(&mut self, stage: AcquireStage) {
        engine_debug!("Token acquisition: {:?}", stage);
        self.stages.push(stage);
    }

    fn current(&self) -> AcquireStage {
        self.stages.last().copied().unwrap_or(AcquireStage::Idle)
    }
}

pub struct BrowserTokenProvider<B> {
    backend: B,
    plan: AcquisitionPlan,
}

impl<B: BrowserBackend> BrowserTokenProvider<B> {
    pub fn new(backend: B, plan: AcquisitionPlan) -> Self {
        Self { backend, plan }
    }

    pub async fn run(&self) -> AcquisitionReport {
        let mut trace = StageTrace::new();
        let mut triggers = Vec::new();

        trace.enter(AcquireStage::Launching);
        let mut session = match self.backend.launch().await {
            Ok(session) => session,
            Err(err) => {
                engine_error!("Critical error in token harvesting: {}", err);
                trace.enter(AcquireStage::Failed);
                return AcquisitionReport {
                    token: None,
                    stages: trace.stages,
                    triggers,
                };
            }
        };

        let outcome = self
            .drive(session.as_mut(), &mut trace, &mut triggers)
            .await;

        if let Err(err) = session.release().await {
            engine_warn!("Browser did not shut down cleanly: {}", err);
        }

        let token = match outcome {
            Ok(Some(token)) => {
                engine_info!("Successfully captured token");
                trace.enter(AcquireStage::Captured);
                Some(token)
            }
            Ok(None) => {
                engine_warn!("Failed to capture token from requests");
                trace.enter(AcquireStage::Failed);
                None
            }
            Err(err) => {
                engine_error!(
                    "Error during token harvesting ({:?}): {}",
                    trace.current(),
                    err
                );
                trace.enter(AcquireStage::Failed);
                None
            }
        };

        AcquisitionReport {
            token,
            stages: trace.stages,
            triggers,
        }
    }

    async fn drive(
        &self,
        session: &mut dyn BrowserSession,
        trace: &mut StageTrace,
        triggers: &mut Vec<bool>,
    ) -> Result<Option<Token>, AcquireError> {
        trace.enter(AcquireStage::EstablishingContext);
        session.open_context().await?;

        trace.enter(AcquireStage::Navigating);
        self.navigate_with_retries(session).await?;

        trace.enter(AcquireStage::AwaitingCapture);
        tokio::time::sleep(self.plan.settle_delay).await;

        for trigger in &self.plan.triggers {
            if session.captured_token().is_some() {
                break;
            }
            let result = match trigger {
                TriggerAction::ClickText { text, .. } => session.click_text(text).await,
                TriggerAction::Navigate { url, timeout, .. } => {
                    session.navigate(url, *timeout).await
                }
            };
            match result {
                Ok(()) => {
                    engine_debug!("Trigger {:?} succeeded", trigger);
                    tokio::time::sleep(trigger.settle()).await;
                    triggers.push(true);
                }
                Err(err) => {
                    engine_debug!("Trigger {:?} failed: {}", trigger, err);
                    triggers.push(false);
                }
            }
        }

        Ok(session.captured_token())
    }

    async fn navigate_with_retries(
        &self,
        session: &mut dyn BrowserSession,
    ) -> Result<(), AcquireError> {
        let attempts = self.plan.navigation_attempts.max(1);
        let mut last_error = None;
        for attempt in 1..=attempts {
            match session
                .navigate(&self.plan.site_url, self.plan.navigation_timeout)
                .await
            {
                Ok(()) => return Ok(()),
                Err(err) => {
                    engine_warn!("Navigation attempt {} failed: {}", attempt, err);
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| AcquireError::Navigation {
            url: self.plan.site_url.clone(),
            message: "no attempts made".to_string(),
        }))
    }
}

#[async_trait::async_trait]
impl<B: BrowserBackend + 'static> TokenProvider for BrowserTokenProvider<B> {
    async fn acquire(&self) -> Option<Token> {
        self.run().await.token
    }
}

/// Returns the bearer token from `headers` if the request targets `api_host`.
///
/// Header names are matched case-insensitively; CDP reports them as sent.
pub fn extract_bearer(url: &str, headers: &serde_json::Value, api_host: &str) -> Option<String> {
    if !url.contains(api_host) {
        return None;
    }
    let headers = headers.as_object()?;
    let value = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("authorization"))
        .and_then(|(_, value)| value.as_str())?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
