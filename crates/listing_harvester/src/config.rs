use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::builder::BoolishValueParser;
use clap::Parser;
use harvester_core::{default_catalog, HarvestSettings, QueryDescriptor};
use harvester_engine::{AcquisitionPlan, BrowserSettings, ExportOptions, FetchSettings};
use log::LevelFilter;
use serde_json::Value;

/// Harvest DealApp listings with rotating browser-captured tokens.
#[derive(Debug, Clone, Parser)]
#[command(name = "listing-harvester", version, about)]
pub struct Args {
    /// Stop starting new sessions once this many unique listings are collected.
    #[arg(long, env = "TARGET_PROPERTIES", default_value_t = 500)]
    pub target: usize,

    /// Maximum number of token sessions.
    #[arg(long, env = "MAX_TOKENS", default_value_t = 20)]
    pub max_tokens: u32,

    /// Seconds between requests of one session.
    #[arg(long, env = "REQUEST_DELAY", default_value = "0.5", value_parser = parse_seconds)]
    pub request_delay: Duration,

    /// Seconds between sessions.
    #[arg(long, env = "TOKEN_DELAY", default_value = "2", value_parser = parse_seconds)]
    pub token_delay: Duration,

    /// Seconds to wait after a failed token acquisition.
    #[arg(long, env = "TOKEN_RETRY_DELAY", default_value = "5", value_parser = parse_seconds)]
    pub token_retry_delay: Duration,

    /// Run the browser without a window.
    #[arg(
        long,
        env = "HEADLESS",
        default_value = "true",
        action = clap::ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub headless: bool,

    /// Browser navigation timeout in milliseconds.
    #[arg(long, env = "BROWSER_TIMEOUT", default_value_t = 30_000)]
    pub browser_timeout_ms: u64,

    /// Listings request timeout in seconds.
    #[arg(long, env = "REQUEST_TIMEOUT", default_value = "30", value_parser = parse_seconds)]
    pub request_timeout: Duration,

    #[arg(long, env = "DEALAPP_BASE_URL", default_value = "https://api.dealapp.sa/production")]
    pub base_url: String,

    #[arg(long, env = "OUTPUT_DIR", default_value = "data")]
    pub output_dir: PathBuf,

    /// Directory for run log files; empty disables file logging.
    #[arg(long, env = "LOG_DIR", default_value = "logs")]
    pub log_dir: PathBuf,

    /// JSON file with an array of query objects replacing the built-in catalog.
    #[arg(long, env = "QUERY_CATALOG")]
    pub query_catalog: Option<PathBuf>,

    #[arg(long, env = "LOG_LEVEL", default_value = "info", value_parser = parse_level)]
    pub log_level: LevelFilter,
}

impl Args {
    pub fn harvest_settings(&self) -> HarvestSettings {
        HarvestSettings {
            target_count: self.target,
            token_budget: self.max_tokens,
            request_delay: self.request_delay,
            session_delay: self.token_delay,
            acquisition_cooldown: self.token_retry_delay,
        }
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            base_url: self.base_url.clone(),
            request_timeout: self.request_timeout,
            ..FetchSettings::default()
        }
    }

    pub fn browser_settings(&self) -> BrowserSettings {
        BrowserSettings {
            headless: self.headless,
            request_timeout: self.browser_timeout(),
            ..BrowserSettings::default()
        }
    }

    pub fn acquisition_plan(&self) -> AcquisitionPlan {
        AcquisitionPlan {
            navigation_timeout: self.browser_timeout(),
            ..AcquisitionPlan::default()
        }
    }

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            output_dir: self.output_dir.clone(),
            ..ExportOptions::default()
        }
    }

    pub fn catalog(&self) -> Result<Vec<QueryDescriptor>> {
        match &self.query_catalog {
            Some(path) => load_catalog(path),
            None => Ok(default_catalog()),
        }
    }

    fn browser_timeout(&self) -> Duration {
        Duration::from_millis(self.browser_timeout_ms)
    }
}

fn parse_seconds(raw: &str) -> Result<Duration, String> {
    let secs: f64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("{raw:?} is not a number of seconds"))?;
    Duration::try_from_secs_f64(secs).map_err(|err| format!("{raw:?}: {err}"))
}

fn parse_level(raw: &str) -> Result<LevelFilter, String> {
    raw.parse()
        .map_err(|_| format!("{raw:?} is not one of off, error, warn, info, debug, trace"))
}

/// Reads a catalog file: a JSON array of flat objects whose values become
/// query parameters, in file order.
pub fn load_catalog(path: &Path) -> Result<Vec<QueryDescriptor>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading query catalog {}", path.display()))?;
    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("parsing query catalog {}", path.display()))?;
    let Value::Array(entries) = value else {
        bail!("query catalog {} must be a JSON array", path.display());
    };

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let Value::Object(fields) = entry else {
                bail!("catalog entry {index} is not an object");
            };
            let params = fields
                .iter()
                .map(|(name, value)| match value {
                    Value::String(text) => Ok((name.clone(), text.clone())),
                    Value::Number(number) => Ok((name.clone(), number.to_string())),
                    Value::Bool(flag) => Ok((name.clone(), flag.to_string())),
                    _ => bail!("catalog entry {index}: parameter {name:?} must be a scalar"),
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(QueryDescriptor::new(params))
        })
        .collect()
}
