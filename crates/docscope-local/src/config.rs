//! Viewer configuration: defaults, overridden by `DOCSCOPE_*` environment variables.
//!
//! Empty values count as unset. Numeric values are clamped to sane bounds.

use docscope_core::{RankingPolicy, TokenizerMode};
use std::time::Duration;

pub const ENV_TOKENIZER: &str = "DOCSCOPE_TOKENIZER";
pub const ENV_RANKING: &str = "DOCSCOPE_RANKING";
pub const ENV_DEBOUNCE_MS: &str = "DOCSCOPE_DEBOUNCE_MS";
pub const ENV_NOTICE_TTL_MS: &str = "DOCSCOPE_NOTICE_TTL_MS";
pub const ENV_DOC_CONVERSION: &str = "DOCSCOPE_DOC_CONVERSION";
pub const ENV_CONVERT_ENDPOINT: &str = "DOCSCOPE_CONVERT_ENDPOINT";
pub const ENV_CONVERT_API_KEY: &str = "DOCSCOPE_CONVERT_API_KEY";
pub const ENV_CONVERT_POLL_MS: &str = "DOCSCOPE_CONVERT_POLL_MS";
pub const ENV_CONVERT_TIMEOUT_MS: &str = "DOCSCOPE_CONVERT_TIMEOUT_MS";
pub const ENV_FILE: &str = "DOCSCOPE_ENV_FILE";

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_bool(key: &str) -> Option<bool> {
    let v = env_nonempty(key)?;
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

fn env_u64_clamped(key: &str, default: u64, min: u64, max: u64) -> u64 {
    env_nonempty(key)
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
        .clamp(min, max)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            poll_interval: Duration::from_millis(1_500),
            timeout: Duration::from_millis(120_000),
        }
    }
}

impl ConvertConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            endpoint: env_nonempty(ENV_CONVERT_ENDPOINT),
            api_key: env_nonempty(ENV_CONVERT_API_KEY),
            poll_interval: Duration::from_millis(env_u64_clamped(
                ENV_CONVERT_POLL_MS,
                d.poll_interval.as_millis() as u64,
                50,
                60_000,
            )),
            timeout: Duration::from_millis(env_u64_clamped(
                ENV_CONVERT_TIMEOUT_MS,
                d.timeout.as_millis() as u64,
                1_000,
                30 * 60_000,
            )),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some() && self.api_key.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerConfig {
    pub tokenizer: TokenizerMode,
    pub ranking: RankingPolicy,
    pub debounce: Duration,
    pub notice_ttl: Duration,
    /// Whether `.doc` files go through the remote conversion service.
    pub doc_conversion: bool,
    pub convert: ConvertConfig,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            tokenizer: TokenizerMode::default(),
            ranking: RankingPolicy::default(),
            debounce: Duration::from_millis(250),
            notice_ttl: Duration::from_millis(5_000),
            doc_conversion: false,
            convert: ConvertConfig::default(),
        }
    }
}

impl ViewerConfig {
    /// Unparseable values fall back to the default with a warning.
    pub fn from_env() -> Self {
        let d = Self::default();
        let tokenizer = match env_nonempty(ENV_TOKENIZER).map(|v| v.parse()) {
            Some(Ok(m)) => m,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "ignoring {ENV_TOKENIZER}");
                d.tokenizer
            }
            None => d.tokenizer,
        };
        let ranking = match env_nonempty(ENV_RANKING).map(|v| v.parse()) {
            Some(Ok(p)) => p,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "ignoring {ENV_RANKING}");
                d.ranking
            }
            None => d.ranking,
        };
        Self {
            tokenizer,
            ranking,
            debounce: Duration::from_millis(env_u64_clamped(ENV_DEBOUNCE_MS, 250, 0, 10_000)),
            notice_ttl: Duration::from_millis(env_u64_clamped(
                ENV_NOTICE_TTL_MS,
                5_000,
                500,
                600_000,
            )),
            doc_conversion: env_bool(ENV_DOC_CONVERSION).unwrap_or(d.doc_conversion),
            convert: ConvertConfig::from_env(),
        }
    }
}

/// Load `KEY=VALUE` lines from the file named by `DOCSCOPE_ENV_FILE`.
///
/// Variables already present in the process environment win. Values are never logged.
/// Returns the number of variables set.
pub fn load_env_file() -> usize {
    let Some(path) = env_nonempty(ENV_FILE) else {
        return 0;
    };
    let Ok(txt) = std::fs::read_to_string(&path) else {
        tracing::warn!(path = %path, "env file not readable");
        return 0;
    };
    let mut set = 0;
    for raw in txt.lines() {
        let s = raw.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let s = s.strip_prefix("export ").unwrap_or(s);
        let Some((k, v)) = s.split_once('=') else {
            continue;
        };
        let k = k.trim();
        let v = v.trim().trim_matches('"');
        if k.is_empty() {
            continue;
        }
        if std::env::var_os(k).is_none() {
            std::env::set_var(k, v);
            set += 1;
        }
    }
    set
}
