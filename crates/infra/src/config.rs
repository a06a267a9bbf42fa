//! Deployment configuration.
//!
//! Built in code with the `with_*` methods or read from `OUTPOST_*`
//! environment variables.

use outpost_core::BinName;
use outpost_core::id::DEFAULT_BIN;
use thiserror::Error;
use tracing::warn;

use crate::replay::DeadLetterPolicy;

pub const ENV_BIN: &str = "OUTPOST_BIN";
pub const ENV_PAYLOAD_BUCKET: &str = "OUTPOST_PAYLOAD_BUCKET";
pub const ENV_REPLAY_PAGE_SIZE: &str = "OUTPOST_REPLAY_PAGE_SIZE";
pub const ENV_DEAD_LETTER_AFTER: &str = "OUTPOST_DEAD_LETTER_AFTER";
pub const ENV_DEAD_LETTER_QUEUE: &str = "OUTPOST_DEAD_LETTER_QUEUE";
pub const ENV_CRASH_REPORTING: &str = "OUTPOST_CRASH_REPORTING";

pub const DEFAULT_REPLAY_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutpostConfig {
    /// Bin that failures of this deployment are queued under.
    pub bin: BinName,
    /// Store failed payloads in this bucket instead of inline.
    pub payload_bucket: Option<String>,
    /// Entries drained per replay run.
    pub replay_page_size: usize,
    pub dead_letter: DeadLetterPolicy,
    pub crash_reporting: bool,
}

impl Default for OutpostConfig {
    fn default() -> Self {
        Self {
            bin: BinName::default(),
            payload_bucket: None,
            replay_page_size: DEFAULT_REPLAY_PAGE_SIZE,
            dead_letter: DeadLetterPolicy::disabled(),
            crash_reporting: false,
        }
    }
}

impl OutpostConfig {
    pub fn new(bin: BinName) -> Self {
        Self {
            bin,
            ..Self::default()
        }
    }

    pub fn with_bin(mut self, bin: BinName) -> Self {
        self.bin = bin;
        self
    }

    pub fn with_payload_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.payload_bucket = Some(bucket.into());
        self
    }

    pub fn with_replay_page_size(mut self, page_size: usize) -> Self {
        self.replay_page_size = page_size.max(1);
        self
    }

    pub fn with_dead_letter(mut self, policy: DeadLetterPolicy) -> Self {
        self.dead_letter = policy;
        self
    }

    pub fn with_crash_reporting(mut self, enabled: bool) -> Self {
        self.crash_reporting = enabled;
        self
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bin = match get(ENV_BIN) {
            Some(raw) => BinName::new(raw.trim()).map_err(|e| ConfigError::Invalid {
                key: ENV_BIN,
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => {
                warn!("{ENV_BIN} not set; queuing failures under `{DEFAULT_BIN}`");
                BinName::default()
            }
        };

        let replay_page_size = match get(ENV_REPLAY_PAGE_SIZE) {
            Some(raw) => match parse_number::<usize>(ENV_REPLAY_PAGE_SIZE, &raw)? {
                0 => {
                    return Err(ConfigError::Invalid {
                        key: ENV_REPLAY_PAGE_SIZE,
                        value: raw,
                        reason: "must be at least 1".to_string(),
                    });
                }
                n => n,
            },
            None => DEFAULT_REPLAY_PAGE_SIZE,
        };

        let max_run_count = get(ENV_DEAD_LETTER_AFTER)
            .map(|raw| parse_number::<u32>(ENV_DEAD_LETTER_AFTER, &raw))
            .transpose()?;
        let dead_letter = DeadLetterPolicy {
            max_run_count,
            queue: get(ENV_DEAD_LETTER_QUEUE),
        };
        if dead_letter.queue.is_some() && max_run_count.is_none() {
            warn!("{ENV_DEAD_LETTER_QUEUE} set without {ENV_DEAD_LETTER_AFTER}; dead-lettering stays off");
        }

        let crash_reporting = get(ENV_CRASH_REPORTING)
            .map(|raw| matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            bin,
            payload_bucket: get(ENV_PAYLOAD_BUCKET),
            replay_page_size,
            dead_letter,
            crash_reporting,
        })
    }
}

fn parse_number<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: core::str::FromStr,
    T::Err: core::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}
