//! Pipeline configuration, loaded from one YAML file.
//!
//! Everything the pipeline reads is declared here: scrape sources with
//! their extraction hints, proxy identities, recipient groups, message
//! templates, platform credentials, and the knobs for retries and
//! concurrency. The pipeline never mutates configuration; administrators
//! edit the file, the next run picks it up.
//!
//! [`AppConfig::load`] parses and structurally validates the file. Selector
//! and regex hints are compiled separately at startup (see
//! [`crate::scrape::strategy::compile_sources`]) so a typo in a selector
//! aborts the run before any network activity.

use std::collections::BTreeMap;

use serde::Deserialize;
use url::Url;

use crate::errors::ConfigError;
use crate::models::{Lottery, Platform};

/// Retry, concurrency and timeout knobs. Every field has a default so a
/// minimal config file can omit the whole section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScrapeSettings {
    /// Additional attempts after the first failed fetch+parse cycle.
    pub max_retries: u32,
    /// Concurrent per-source scrape machines in flight.
    pub max_in_flight: usize,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Consecutive failures before a proxy identity is disabled for the run.
    pub proxy_failure_threshold: u32,
    /// Base delay for retry backoff, in milliseconds. Doubles per attempt,
    /// capped at ten times the base; jitter is proportional.
    pub backoff_base_ms: u64,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            max_retries: 2,
            max_in_flight: 4,
            request_timeout_secs: 15,
            proxy_failure_threshold: 3,
            backoff_base_ms: 500,
        }
    }
}

/// Where the result store keeps its data.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: "results.json".to_string(),
        }
    }
}

/// Extraction hints for one source, tried in the order given. Structured
/// markup is expected first; a pattern fallback catches pages that render
/// the same data without the markup.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionHints {
    /// CSS-selector extraction. `row_selector` matches one element per
    /// rank, in document order; the inner selectors pick fields out of
    /// each row.
    StructuredMarkup {
        row_selector: String,
        digit_selector: String,
        #[serde(default)]
        prize_selector: Option<String>,
        #[serde(default)]
        date_selector: Option<String>,
    },
    /// Regex extraction over the raw document. `position_pattern` needs
    /// named captures `rank` and `digits`; `prize_pattern` needs `rank`
    /// and `label`; `date_pattern` needs `date`.
    PatternMatch {
        position_pattern: String,
        #[serde(default)]
        prize_pattern: Option<String>,
        #[serde(default)]
        date_pattern: Option<String>,
    },
}

impl ExtractionHints {
    /// Fixed priority order: structured markup before pattern fallback.
    pub fn priority(&self) -> u8 {
        match self {
            ExtractionHints::StructuredMarkup { .. } => 0,
            ExtractionHints::PatternMatch { .. } => 1,
        }
    }
}

/// Static scraping configuration for one lottery source.
#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeSourceConfig {
    pub lottery_id: Lottery,
    pub url: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Route requests through the proxy rotator. Off means always-direct.
    #[serde(default = "default_true")]
    pub proxy_enabled: bool,
    /// Fixed request headers sent on top of the browser-like defaults.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub strategies: Vec<ExtractionHints>,
}

/// One proxy egress identity. The per-run failure counter lives in the
/// rotator, not here.
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyIdentity {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl ProxyIdentity {
    /// Stable label for logs and failure accounting.
    pub fn label(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Proxy URL for the HTTP client, credentials excluded (those are
    /// attached via basic auth).
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// A message template with named `{placeholder}` slots.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageTemplate {
    pub id: String,
    pub content: String,
    /// Placeholder names the renderer will substitute.
    pub variables: Vec<String>,
    /// Lotteries this template applies to. Empty means all.
    #[serde(default)]
    pub lottery_types: Vec<Lottery>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl MessageTemplate {
    /// Whether this template may render results for `lottery`.
    pub fn applies_to(&self, lottery: Lottery) -> bool {
        self.lottery_types.is_empty() || self.lottery_types.contains(&lottery)
    }
}

/// One recipient chat group.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupConfig {
    pub id: String,
    pub platform: Platform,
    /// Opaque recipient handle: Telegram chat id or WhatsApp group handle.
    pub group_id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Subscription set. Empty means the group receives nothing.
    #[serde(default)]
    pub lottery_types: Vec<Lottery>,
    /// Template reference; the built-in default is used when absent or
    /// unknown.
    #[serde(default)]
    pub template_id: Option<String>,
    /// Cron expression read by the external scheduler. Carried for
    /// completeness; the pipeline ignores it.
    #[serde(default)]
    pub schedule: Option<String>,
}

impl GroupConfig {
    pub fn subscribes_to(&self, lottery: Lottery) -> bool {
        self.lottery_types.contains(&lottery)
    }
}

/// Telegram bot credentials.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelegramSettings {
    #[serde(default)]
    pub bot_token: Option<String>,
}

/// WhatsApp HTTP-gateway settings (self-hosted bridge style).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WhatsappSettings {
    #[serde(default)]
    pub gateway_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// The whole configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub settings: ScrapeSettings,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub sources: Vec<ScrapeSourceConfig>,
    #[serde(default)]
    pub proxies: Vec<ProxyIdentity>,
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
    #[serde(default)]
    pub templates: Vec<MessageTemplate>,
    #[serde(default)]
    pub telegram: TelegramSettings,
    #[serde(default)]
    pub whatsapp: WhatsappSettings,
}

impl AppConfig {
    /// Load and structurally validate a configuration file.
    pub async fn load(path: &str) -> Result<Self, ConfigError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_string(),
                source,
            })?;
        let config: AppConfig = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Structural checks that do not require compiling hints: every
    /// enabled source must have a parseable URL and at least one strategy.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for source in self.sources.iter().filter(|s| s.enabled) {
            if source.strategies.is_empty() {
                return Err(ConfigError::NoStrategies {
                    lottery: source.lottery_id.id_str().to_string(),
                });
            }
            if Url::parse(&source.url).is_err() {
                return Err(ConfigError::BadUrl {
                    lottery: source.lottery_id.id_str().to_string(),
                    url: source.url.clone(),
                });
            }
        }
        Ok(())
    }

    /// Enabled sources, in config order.
    pub fn enabled_sources(&self) -> impl Iterator<Item = &ScrapeSourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }
}

fn default_true() -> bool {
    true
}
