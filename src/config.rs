//! Environment-driven configuration.
//!
//! Every loader takes a lookup closure so tests can feed a map instead of
//! touching the process environment. `from_env` wraps `std::env::var`.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::services::retry::RetryPolicy;

pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3002";

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}

/// Generative-AI vendor connection.
#[derive(Debug, Clone)]
pub struct VendorConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
    pub image_model: String,
    pub timeout: Duration,
}

impl VendorConfig {
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(VendorConfig {
            api_key: lookup("GEMINI_API_KEY"),
            api_url: lookup("GEMINI_API_URL")
                .unwrap_or_else(|| DEFAULT_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: lookup("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            image_model: lookup("GEMINI_IMAGE_MODEL")
                .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
            timeout: Duration::from_secs(parse_or(&lookup, "LLM_TIMEOUT_SECS", 120u64)?),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_lookup)
    }
}

/// Relay server settings.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind_addr: String,
    pub vendor: VendorConfig,
}

impl RelayConfig {
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(RelayConfig {
            bind_addr: lookup("RELAY_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            vendor: VendorConfig::from_lookup(&lookup)?,
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_lookup)
    }
}

/// Workflow pacing: retry policy and the TOC synthesis delay.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    pub retry: RetryPolicy,
    pub toc_delay: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationConfig {
            retry: RetryPolicy::default(),
            toc_delay: Duration::from_millis(800),
        }
    }
}

impl GenerationConfig {
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = GenerationConfig::default();
        Ok(GenerationConfig {
            retry: RetryPolicy {
                max_attempts: parse_or(&lookup, "RETRY_MAX_ATTEMPTS", defaults.retry.max_attempts)?,
                base_delay: Duration::from_millis(parse_or(
                    &lookup,
                    "RETRY_BASE_DELAY_MS",
                    defaults.retry.base_delay.as_millis() as u64,
                )?),
            },
            toc_delay: Duration::from_millis(parse_or(
                &lookup,
                "TOC_DELAY_MS",
                defaults.toc_delay.as_millis() as u64,
            )?),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_lookup)
    }
}

/// Remote database and local fallback location.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub supabase_url: Option<String>,
    pub supabase_key: Option<String>,
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(StorageConfig {
            supabase_url: lookup("SUPABASE_URL").map(|u| u.trim_end_matches('/').to_string()),
            supabase_key: lookup("SUPABASE_ANON_KEY"),
            data_dir: lookup("EBOOK_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data")),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(env_lookup)
    }
}
