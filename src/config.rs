//! Runtime configuration
//!
//! Read from the environment (after `.env` is loaded). Every field has a
//! default so the server starts with no configuration at all.

use alloy_primitives::U256;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::amount_math::{AutoAdjustPolicy, DEFAULT_AUTO_ADJUST_TOLERANCE_WEI};
use crate::engine::planner::PlannerSettings;
use crate::engine::store::DEFAULT_KEY_PREFIX;
use crate::engine::transport::RetryPolicy;
use crate::engine::types::decimal;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub slippage_bps: u16,
    pub max_batch_size: usize,
    pub auto_adjust_tolerance_wei: U256,
    pub cart_store_dir: PathBuf,
    pub cart_key_prefix: String,
    pub min_call_interval_ms: u64,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub confirmations: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3001)),
            slippage_bps: 50,
            max_batch_size: 50,
            auto_adjust_tolerance_wei: U256::from(DEFAULT_AUTO_ADJUST_TOLERANCE_WEI),
            cart_store_dir: PathBuf::from("./data/carts"),
            cart_key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            min_call_interval_ms: 50,
            max_retries: 3,
            retry_base_delay_ms: 200,
            confirmations: 1,
        }
    }
}

impl AppConfig {
    /// Defaults overridden by `VOTECART_*` variables. Unparseable values are
    /// logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("VOTECART_BIND") {
            config.bind_addr = parse_or_warn("VOTECART_BIND", &v, config.bind_addr);
        }
        if let Some(v) = get("VOTECART_SLIPPAGE_BPS") {
            config.slippage_bps = parse_or_warn("VOTECART_SLIPPAGE_BPS", &v, config.slippage_bps);
        }
        if let Some(v) = get("VOTECART_MAX_BATCH_SIZE") {
            config.max_batch_size =
                parse_or_warn("VOTECART_MAX_BATCH_SIZE", &v, config.max_batch_size);
        }
        if let Some(v) = get("VOTECART_AUTO_ADJUST_TOLERANCE_WEI") {
            match decimal::parse(&v) {
                Ok(tolerance) => config.auto_adjust_tolerance_wei = tolerance,
                Err(e) => tracing::warn!("Ignoring VOTECART_AUTO_ADJUST_TOLERANCE_WEI: {}", e),
            }
        }
        if let Some(v) = get("VOTECART_STORE_DIR") {
            config.cart_store_dir = PathBuf::from(v);
        }
        if let Some(v) = get("VOTECART_KEY_PREFIX") {
            config.cart_key_prefix = v;
        }
        if let Some(v) = get("VOTECART_MIN_CALL_INTERVAL_MS") {
            config.min_call_interval_ms =
                parse_or_warn("VOTECART_MIN_CALL_INTERVAL_MS", &v, config.min_call_interval_ms);
        }
        if let Some(v) = get("VOTECART_MAX_RETRIES") {
            config.max_retries = parse_or_warn("VOTECART_MAX_RETRIES", &v, config.max_retries);
        }
        if let Some(v) = get("VOTECART_RETRY_BASE_DELAY_MS") {
            config.retry_base_delay_ms =
                parse_or_warn("VOTECART_RETRY_BASE_DELAY_MS", &v, config.retry_base_delay_ms);
        }
        if let Some(v) = get("VOTECART_CONFIRMATIONS") {
            config.confirmations = parse_or_warn("VOTECART_CONFIRMATIONS", &v, config.confirmations);
        }
        config
    }

    pub fn planner_settings(&self) -> PlannerSettings {
        PlannerSettings {
            slippage_bps: self.slippage_bps,
            max_batch_size: self.max_batch_size,
            auto_adjust: AutoAdjustPolicy {
                tolerance_wei: self.auto_adjust_tolerance_wei,
            },
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            ..RetryPolicy::default()
        }
    }

    pub fn min_call_interval(&self) -> Duration {
        Duration::from_millis(self.min_call_interval_ms)
    }
}

fn parse_or_warn<T: std::str::FromStr>(key: &str, raw: &str, fallback: T) -> T
where
    T::Err: std::fmt::Display,
{
    match raw.trim().parse() {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("Ignoring {}={:?}: {}", key, raw, e);
            fallback
        }
    }
}
