use std::sync::{Arc, Mutex};
use std::time::Duration;

use harvester_engine::{
    AcquireError, AcquireStage, AcquisitionPlan, BrowserBackend, BrowserSession,
    BrowserTokenProvider, Token, TokenProvider, TriggerAction,
};
use pretty_assertions::assert_eq;

/// Which step of the script makes the site send an authorized request.
#[derive(Clone, Copy, PartialEq)]
enum CaptureOn {
    Landing,
    Click,
    TriggerNavigation,
    Never,
}

#[derive(Clone)]
struct Script {
    fail_launch: bool,
    fail_context: bool,
    landing_failures: u32,
    click_fails: bool,
    capture_on: CaptureOn,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            fail_launch: false,
            fail_context: false,
            landing_failures: 0,
            click_fails: false,
            capture_on: CaptureOn::Landing,
        }
    }
}

#[derive(Default)]
struct Journal {
    launches: u32,
    releases: u32,
    navigations: Vec<String>,
    clicks: Vec<String>,
}

#[derive(Clone)]
struct FakeBackend {
    script: Script,
    journal: Arc<Mutex<Journal>>,
}

impl FakeBackend {
    fn new(script: Script) -> Self {
        Self {
            script,
            journal: Arc::new(Mutex::new(Journal::default())),
        }
    }

    fn journal(&self) -> std::sync::MutexGuard<'_, Journal> {
        self.journal.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl BrowserBackend for FakeBackend {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, AcquireError> {
        self.journal().launches += 1;
        if self.script.fail_launch {
            return Err(AcquireError::Launch("no chromium".to_string()));
        }
        Ok(Box::new(FakeSession {
            script: self.script.clone(),
            journal: Arc::clone(&self.journal),
            landing_failures_left: self.script.landing_failures,
            captured: None,
            released: false,
        }))
    }
}

struct FakeSession {
    script: Script,
    journal: Arc<Mutex<Journal>>,
    landing_failures_left: u32,
    captured: Option<Token>,
    released: bool,
}

impl FakeSession {
    fn capture_if(&mut self, step: CaptureOn) {
        if self.script.capture_on == step {
            self.captured = Some(Token::new("captured-token"));
        }
    }
}

#[async_trait::async_trait]
impl BrowserSession for FakeSession {
    async fn open_context(&mut self) -> Result<(), AcquireError> {
        if self.script.fail_context {
            return Err(AcquireError::Context("context refused".to_string()));
        }
        Ok(())
    }

    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), AcquireError> {
        self.journal.lock().unwrap().navigations.push(url.to_string());
        if url == "https://site.test" {
            if self.landing_failures_left > 0 {
                self.landing_failures_left -= 1;
                return Err(AcquireError::Timeout {
                    action: format!("navigation to {url}"),
                    timeout,
                });
            }
            self.capture_if(CaptureOn::Landing);
        } else {
            self.capture_if(CaptureOn::TriggerNavigation);
        }
        Ok(())
    }

    async fn click_text(&mut self, text: &str) -> Result<(), AcquireError> {
        self.journal.lock().unwrap().clicks.push(text.to_string());
        if self.script.click_fails {
            return Err(AcquireError::ElementNotFound(text.to_string()));
        }
        self.capture_if(CaptureOn::Click);
        Ok(())
    }

    fn captured_token(&self) -> Option<Token> {
        self.captured.clone()
    }

    async fn release(&mut self) -> Result<(), AcquireError> {
        if !self.released {
            self.released = true;
            self.journal.lock().unwrap().releases += 1;
        }
        Ok(())
    }
}

fn plan() -> AcquisitionPlan {
    AcquisitionPlan {
        site_url: "https://site.test".to_string(),
        navigation_attempts: 3,
        navigation_timeout: Duration::from_millis(50),
        settle_delay: Duration::ZERO,
        triggers: vec![
            TriggerAction::ClickText {
                text: "market".to_string(),
                settle: Duration::ZERO,
            },
            TriggerAction::Navigate {
                url: "https://site.test/market".to_string(),
                timeout: Duration::from_millis(50),
                settle: Duration::ZERO,
            },
        ],
    }
}

fn provider(script: Script) -> (BrowserTokenProvider<FakeBackend>, FakeBackend) {
    let backend = FakeBackend::new(script);
    (BrowserTokenProvider::new(backend.clone(), plan()), backend)
}

#[tokio::test]
async fn token_seen_on_landing_skips_triggers() {
    let (provider, backend) = provider(Script::default());

    let report = provider.run().await;

    assert_eq!(report.token, Some(Token::new("captured-token")));
    assert_eq!(
        report.stages,
        vec![
            AcquireStage::Idle,
            AcquireStage::Launching,
            AcquireStage::EstablishingContext,
            AcquireStage::Navigating,
            AcquireStage::AwaitingCapture,
            AcquireStage::Captured,
        ]
    );
    assert!(report.triggers.is_empty());
    let journal = backend.journal();
    assert!(journal.clicks.is_empty());
    assert_eq!((journal.launches, journal.releases), (1, 1));
}

#[tokio::test]
async fn failed_trigger_is_tolerated_and_next_trigger_captures() {
    let (provider, backend) = provider(Script {
        click_fails: true,
        capture_on: CaptureOn::TriggerNavigation,
        ..Script::default()
    });

    let report = provider.run().await;

    assert_eq!(report.token, Some(Token::new("captured-token")));
    assert_eq!(report.triggers, vec![false, true]);
    let journal = backend.journal();
    assert_eq!(journal.clicks, vec!["market".to_string()]);
    assert_eq!(
        journal.navigations,
        vec!["https://site.test".to_string(), "https://site.test/market".to_string()]
    );
    assert_eq!(journal.releases, 1);
}

#[tokio::test]
async fn capture_after_click_stops_the_trigger_list() {
    let (provider, backend) = provider(Script {
        capture_on: CaptureOn::Click,
        ..Script::default()
    });

    let report = provider.run().await;

    assert!(report.token.is_some());
    assert_eq!(report.triggers, vec![true]);
    assert_eq!(backend.journal().navigations.len(), 1);
}

#[tokio::test]
async fn landing_navigation_is_retried() {
    let (provider, backend) = provider(Script {
        landing_failures: 2,
        ..Script::default()
    });

    let report = provider.run().await;

    assert!(report.token.is_some());
    assert_eq!(backend.journal().navigations.len(), 3);
}

#[tokio::test]
async fn exhausted_navigation_retries_fail_and_release_the_browser() {
    let (provider, backend) = provider(Script {
        landing_failures: 3,
        ..Script::default()
    });

    let report = provider.run().await;

    assert_eq!(report.token, None);
    assert_eq!(report.stages.last(), Some(&AcquireStage::Failed));
    assert!(!report.stages.contains(&AcquireStage::AwaitingCapture));
    let journal = backend.journal();
    assert_eq!(journal.navigations.len(), 3);
    assert_eq!((journal.launches, journal.releases), (1, 1));
}

#[tokio::test]
async fn no_api_traffic_means_no_token() {
    let (provider, backend) = provider(Script {
        capture_on: CaptureOn::Never,
        ..Script::default()
    });

    let report = provider.run().await;

    assert_eq!(report.token, None);
    assert_eq!(report.triggers, vec![true, true]);
    assert_eq!(report.stages.last(), Some(&AcquireStage::Failed));
    assert_eq!(backend.journal().releases, 1);
}

#[tokio::test]
async fn context_failure_still_releases() {
    let (provider, backend) = provider(Script {
        fail_context: true,
        ..Script::default()
    });

    let report = provider.run().await;

    assert_eq!(report.token, None);
    assert_eq!(
        report.stages,
        vec![
            AcquireStage::Idle,
            AcquireStage::Launching,
            AcquireStage::EstablishingContext,
            AcquireStage::Failed,
        ]
    );
    assert_eq!(backend.journal().releases, 1);
}

#[tokio::test]
async fn launch_failure_yields_no_token() {
    let (provider, backend) = provider(Script {
        fail_launch: true,
        ..Script::default()
    });

    assert_eq!(provider.acquire().await, None);
    let journal = backend.journal();
    assert_eq!((journal.launches, journal.releases), (1, 0));
}

#[tokio::test]
async fn every_acquisition_uses_a_fresh_browser() {
    let (provider, backend) = provider(Script::default());

    assert!(provider.acquire().await.is_some());
    assert!(provider.acquire().await.is_some());

    let journal = backend.journal();
    assert_eq!((journal.launches, journal.releases), (2, 2));
}
