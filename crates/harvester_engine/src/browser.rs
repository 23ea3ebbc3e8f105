use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::{
    SetLocaleOverrideParams, SetTimezoneOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventRequestWillBeSent, Headers, SetExtraHttpHeadersParams,
};
use chromiumoxide::Page;
use engine_logging::{engine_debug, engine_trace, engine_warn};
use futures_util::StreamExt;
use tokio::task::JoinHandle;

use crate::acquire::{extract_bearer, AcquireError, BrowserBackend, BrowserSession};
use crate::fetch::DESKTOP_USER_AGENT;
use crate::token::Token;

const CHROMIUM_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-dev-shm-usage",
    "--disable-setuid-sandbox",
    "--no-sandbox",
    "--disable-gpu",
    "--disable-web-security",
    "--disable-features=IsolateOrigins,site-per-process",
];

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub headless: bool,
    pub launch_timeout: Duration,
    /// Upper bound for CDP commands, including page loads.
    pub request_timeout: Duration,
    /// Upper bound for locating and clicking a trigger element.
    pub action_timeout: Duration,
    /// Upper bound for a graceful close; the process is killed after it.
    pub shutdown_timeout: Duration,
    pub window_size: (u32, u32),
    pub user_agent: String,
    pub accept_language: String,
    pub locale: String,
    pub timezone: String,
    /// Host whose bearer header is captured.
    pub api_host: String,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            launch_timeout: Duration::from_secs(20),
            request_timeout: Duration::from_secs(30),
            action_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(10),
            window_size: (1920, 1080),
            user_agent: DESKTOP_USER_AGENT.to_string(),
            accept_language: "ar,en;q=0.9".to_string(),
            locale: "ar-SA".to_string(),
            timezone: "Asia/Riyadh".to_string(),
            api_host: "api.dealapp.sa".to_string(),
        }
    }
}

/// Chromium over CDP, one fresh browser process per acquisition.
#[derive(Debug, Clone, Default)]
pub struct ChromiumBackend {
    settings: BrowserSettings,
}

impl ChromiumBackend {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }

    fn config(&self) -> Result<BrowserConfig, AcquireError> {
        let (width, height) = self.settings.window_size;
        let mut builder = BrowserConfig::builder()
            .window_size(width, height)
            .launch_timeout(self.settings.launch_timeout)
            .request_timeout(self.settings.request_timeout)
            .args(CHROMIUM_ARGS.iter().copied());
        if !self.settings.headless {
            builder = builder.with_head();
        }
        builder.build().map_err(AcquireError::Launch)
    }
}

#[async_trait::async_trait]
impl BrowserBackend for ChromiumBackend {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, AcquireError> {
        let config = self.config()?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| AcquireError::Launch(err.to_string()))?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        engine_debug!("Chromium launched (headless: {})", self.settings.headless);
        Ok(Box::new(ChromiumSession {
            settings: self.settings.clone(),
            browser: Some(browser),
            page: None,
            handler_task: Some(handler_task),
            capture_task: None,
            captured: Arc::new(Mutex::new(None)),
        }))
    }
}

struct ChromiumSession {
    settings: BrowserSettings,
    browser: Option<Browser>,
    page: Option<Page>,
    handler_task: Option<JoinHandle<()>>,
    capture_task: Option<JoinHandle<()>>,
    captured: Arc<Mutex<Option<String>>>,
}

impl ChromiumSession {
    fn page(&self) -> Result<&Page, AcquireError> {
        self.page
            .as_ref()
            .ok_or_else(|| AcquireError::Context("no page open".to_string()))
    }

    async fn prepare_page(&self, page: &Page) -> Result<(), chromiumoxide::error::CdpError> {
        page.set_user_agent(self.settings.user_agent.as_str()).await?;
        page.execute(SetExtraHttpHeadersParams::new(Headers::new(
            serde_json::json!({ "Accept-Language": self.settings.accept_language }),
        )))
        .await?;
        page.execute(SetLocaleOverrideParams {
            locale: Some(self.settings.locale.clone()),
        })
        .await?;
        page.execute(SetTimezoneOverrideParams::new(self.settings.timezone.clone()))
            .await?;
        page.execute(EnableParams::default()).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl BrowserSession for ChromiumSession {
    async fn open_context(&mut self) -> Result<(), AcquireError> {
        let context_err = |err: chromiumoxide::error::CdpError| AcquireError::Context(err.to_string());
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| AcquireError::Context("browser already released".to_string()))?;
        let page = browser.new_page("about:blank").await.map_err(context_err)?;
        self.prepare_page(&page).await.map_err(context_err)?;

        let mut requests = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(context_err)?;
        let captured = Arc::clone(&self.captured);
        let api_host = self.settings.api_host.clone();
        self.capture_task = Some(tokio::spawn(async move {
            while let Some(event) = requests.next().await {
                let Some(token) =
                    extract_bearer(&event.request.url, event.request.headers.inner(), &api_host)
                else {
                    continue;
                };
                engine_trace!("Token captured from request to: {}", event.request.url);
                if let Ok(mut slot) = captured.lock() {
                    *slot = Some(token);
                }
            }
        }));

        self.page = Some(page);
        Ok(())
    }

    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), AcquireError> {
        let page = self.page()?;
        match tokio::time::timeout(timeout, page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(err)) => Err(AcquireError::Navigation {
                url: url.to_string(),
                message: err.to_string(),
            }),
            Err(_) => Err(AcquireError::Timeout {
                action: format!("navigation to {url}"),
                timeout,
            }),
        }
    }

    async fn click_text(&mut self, text: &str) -> Result<(), AcquireError> {
        let page = self.page()?;
        let timeout = self.settings.action_timeout;
        let xpath = format!("//*[contains(normalize-space(text()), '{text}')]");
        let click = async {
            let element = page
                .find_xpath(xpath)
                .await
                .map_err(|_| AcquireError::ElementNotFound(text.to_string()))?;
            element
                .click()
                .await
                .map_err(|err| AcquireError::Context(err.to_string()))?;
            Ok::<(), AcquireError>(())
        };
        tokio::time::timeout(timeout, click)
            .await
            .map_err(|_| AcquireError::Timeout {
                action: format!("click on {text:?}"),
                timeout,
            })?
    }

    fn captured_token(&self) -> Option<Token> {
        self.captured
            .lock()
            .ok()
            .and_then(|slot| slot.clone())
            .map(Token::new)
    }

    async fn release(&mut self) -> Result<(), AcquireError> {
        if let Some(task) = self.capture_task.take() {
            task.abort();
        }
        let mut result = Ok(());
        let page = self.page.take();
        if let Some(mut browser) = self.browser.take() {
            let graceful = async {
                if let Some(page) = page {
                    page.close().await.map_err(|err| err.to_string())?;
                }
                browser.close().await.map_err(|err| err.to_string())?;
                browser.wait().await.map_err(|err| err.to_string())?;
                Ok::<(), String>(())
            };
            if let Err(err) = shutdown_within(self.settings.shutdown_timeout, graceful).await {
                result = Err(err);
                if let Some(Err(kill_err)) = browser.kill().await {
                    engine_warn!("Killing Chromium failed: {}", kill_err);
                }
            }
        }
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
        engine_debug!("Chromium released");
        result
    }
}

/// Runs a graceful shutdown, giving up once `limit` has passed.
async fn shutdown_within<F>(limit: Duration, graceful: F) -> Result<(), AcquireError>
where
    F: Future<Output = Result<(), String>>,
{
    match tokio::time::timeout(limit, graceful).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(message)) => Err(AcquireError::Release(message)),
        Err(_) => Err(AcquireError::Timeout {
            action: "browser shutdown".to_string(),
            timeout: limit,
        }),
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        // Process teardown needs async; only the background tasks stop here.
        if let Some(task) = self.capture_task.take() {
            task.abort();
        }
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
    }
}
