// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! once at startup into [`AppConfig`].
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `DATA_DIR` | Directory holding the request database | `./data` |
//! | `SOLANA_RPC_URL` | Solana JSON-RPC endpoint | mainnet-beta |
//! | `PROVIDER_SOL_ADDRESS` | Wallet receiving payments | Required |
//! | `PAYMENT_TOKEN` | Payment asset symbol | `USDC` |
//! | `PAYMENT_MEMO_NAMESPACE` | Memo prefix binding payments | `Escalatex402` |
//! | `PAYMENT_INTENT_TTL_SECS` | Intent expiry, `0` disables | `3600` |
//! | `PAYMENT_SCAN_LIMIT` | Signatures inspected per scan | `25` |
//! | `PAYMENT_POLL_INTERVAL_SECS` | Background poll period, `0` disables | `30` |
//! | `PAYMENT_POLL_MAX_AGE_SECS` | Oldest awaiting request the poller scans | `86400` |
//! | `MIN_QUOTE_USD` | Minimum quote, must be positive | `25` |
//! | `PAYMENT_TIERS` | Priced tiers as `key=price,...` | `24h=10,2h=50,15m=200` |
//! | `MAX_OPEN_REQUESTS` | Open requests before intake answers `busy`, `0` = unlimited | `0` |
//! | `PROVIDER_HANDLE` | Provider handle in discovery | `neojack` |
//! | `PROVIDER_DISPLAY_NAME` | Provider name in discovery and pay URLs | `Neojack` |
//! | `WORKING_HOURS_START` / `WORKING_HOURS_END` | Availability window (UTC hours) | `0` / `24` |
//! | `TELEGRAM_BOT_TOKEN` / `TELEGRAM_CHAT_ID` | Telegram notifications | Optional |
//! | `OPERATOR_TOKEN` | Bearer token for operator routes | Optional (routes disabled) |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files for HTTPS | Optional |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::inbox::tiers::{default_tiers, parse_tiers, PricingTier};
use crate::payment::amount::parse_amount;
use crate::payment::intent::DEFAULT_MEMO_NAMESPACE;
use crate::payment::types::{Asset, SOLANA_MAINNET};

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Directory for the redb file.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

pub const SOLANA_RPC_URL_ENV: &str = "SOLANA_RPC_URL";

/// Recipient wallet address (base58). Payments are credited to token
/// accounts owned by this address.
pub const PROVIDER_SOL_ADDRESS_ENV: &str = "PROVIDER_SOL_ADDRESS";

pub const PAYMENT_TOKEN_ENV: &str = "PAYMENT_TOKEN";
pub const PAYMENT_MEMO_NAMESPACE_ENV: &str = "PAYMENT_MEMO_NAMESPACE";
pub const PAYMENT_INTENT_TTL_SECS_ENV: &str = "PAYMENT_INTENT_TTL_SECS";
pub const PAYMENT_SCAN_LIMIT_ENV: &str = "PAYMENT_SCAN_LIMIT";
pub const PAYMENT_POLL_INTERVAL_SECS_ENV: &str = "PAYMENT_POLL_INTERVAL_SECS";
pub const PAYMENT_POLL_MAX_AGE_SECS_ENV: &str = "PAYMENT_POLL_MAX_AGE_SECS";
pub const MIN_QUOTE_USD_ENV: &str = "MIN_QUOTE_USD";
pub const PAYMENT_TIERS_ENV: &str = "PAYMENT_TIERS";

/// Awaiting (unexpired) plus paid-but-unnotified requests allowed at once.
pub const MAX_OPEN_REQUESTS_ENV: &str = "MAX_OPEN_REQUESTS";
pub const PROVIDER_HANDLE_ENV: &str = "PROVIDER_HANDLE";
pub const PROVIDER_DISPLAY_NAME_ENV: &str = "PROVIDER_DISPLAY_NAME";
pub const WORKING_HOURS_START_ENV: &str = "WORKING_HOURS_START";
pub const WORKING_HOURS_END_ENV: &str = "WORKING_HOURS_END";
pub const TELEGRAM_BOT_TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";
pub const TELEGRAM_CHAT_ID_ENV: &str = "TELEGRAM_CHAT_ID";

/// Bearer token guarding `/v1/operator/*`. When unset those routes answer 503.
pub const OPERATOR_TOKEN_ENV: &str = "OPERATOR_TOKEN";

pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";

/// `json` for production log shipping, anything else is human-readable.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_PAYMENT_TOKEN: &str = "USDC";
pub const DEFAULT_INTENT_TTL_SECS: u64 = 3600;
pub const DEFAULT_SCAN_LIMIT: usize = 25;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_POLL_MAX_AGE_SECS: u64 = 86_400;
pub const DEFAULT_MIN_QUOTE_USD: &str = "25";
pub const DEFAULT_MAX_OPEN_REQUESTS: usize = 0;
pub const DEFAULT_PROVIDER_HANDLE: &str = "neojack";
pub const DEFAULT_PROVIDER_DISPLAY_NAME: &str = "Neojack";
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{name} has an invalid value `{value}`: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(name: &'static str, value: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Telegram bot credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

/// PEM file locations for HTTPS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Fully validated runtime configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub data_dir: PathBuf,
    pub rpc_url: String,
    pub pay_to: String,
    pub asset: Asset,
    pub memo_namespace: String,
    /// `None` when intents never expire.
    pub intent_ttl: Option<Duration>,
    pub scan_limit: usize,
    /// `None` when the background poller is off.
    pub poll_interval: Option<Duration>,
    pub poll_max_age: Duration,
    pub min_quote: String,
    pub tiers: Vec<PricingTier>,
    /// `None` when intake is never busy.
    pub max_open_requests: Option<usize>,
    pub provider_handle: String,
    pub provider_display_name: String,
    pub working_hours_start: u8,
    pub working_hours_end: u8,
    pub telegram: Option<TelegramConfig>,
    pub operator_token: Option<String>,
    pub tls: Option<TlsPaths>,
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let host = get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = parse_or(&get, PORT_ENV, DEFAULT_PORT)?;
        let bind_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|e: std::net::AddrParseError| {
                ConfigError::invalid(HOST_ENV, &host, e.to_string())
            })?;

        let pay_to = get(PROVIDER_SOL_ADDRESS_ENV).ok_or(ConfigError::Missing(PROVIDER_SOL_ADDRESS_ENV))?;
        validate_address(&pay_to)?;

        let token = get(PAYMENT_TOKEN_ENV).unwrap_or_else(|| DEFAULT_PAYMENT_TOKEN.to_string());
        let asset = Asset::from_symbol(&token)
            .ok_or_else(|| ConfigError::invalid(PAYMENT_TOKEN_ENV, &token, "unsupported token"))?;

        let min_quote = get(MIN_QUOTE_USD_ENV).unwrap_or_else(|| DEFAULT_MIN_QUOTE_USD.to_string());
        let min_quote_base = parse_amount(&min_quote, asset.decimals)
            .map_err(|e| ConfigError::invalid(MIN_QUOTE_USD_ENV, &min_quote, e.to_string()))?;
        if min_quote_base == 0 {
            return Err(ConfigError::invalid(
                MIN_QUOTE_USD_ENV,
                &min_quote,
                "minimum quote must be greater than zero",
            ));
        }

        let tiers = match get(PAYMENT_TIERS_ENV) {
            Some(spec) => parse_tiers(&spec, asset.decimals)
                .map_err(|e| ConfigError::invalid(PAYMENT_TIERS_ENV, &spec, e.to_string()))?,
            None => default_tiers(),
        };
        let max_open: usize = parse_or(&get, MAX_OPEN_REQUESTS_ENV, DEFAULT_MAX_OPEN_REQUESTS)?;

        let working_hours_start: u8 = parse_or(&get, WORKING_HOURS_START_ENV, 0)?;
        let working_hours_end: u8 = parse_or(&get, WORKING_HOURS_END_ENV, 24)?;
        if working_hours_start > 23 || working_hours_end > 24 {
            return Err(ConfigError::invalid(
                WORKING_HOURS_START_ENV,
                &format!("{working_hours_start}-{working_hours_end}"),
                "hours must be within 0..=24",
            ));
        }

        let telegram = match (get(TELEGRAM_BOT_TOKEN_ENV), get(TELEGRAM_CHAT_ID_ENV)) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramConfig { bot_token, chat_id }),
            _ => None,
        };

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: PathBuf::from(cert),
                key: PathBuf::from(key),
            }),
            (None, None) => None,
            _ => {
                return Err(ConfigError::invalid(
                    TLS_CERT_PATH_ENV,
                    "",
                    "TLS_CERT_PATH and TLS_KEY_PATH must be set together",
                ))
            }
        };

        let seconds = |secs: u64| (secs > 0).then(|| Duration::from_secs(secs));

        Ok(Self {
            bind_addr,
            data_dir: PathBuf::from(get(DATA_DIR_ENV).unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())),
            rpc_url: get(SOLANA_RPC_URL_ENV).unwrap_or_else(|| SOLANA_MAINNET.rpc_url.to_string()),
            pay_to,
            asset,
            memo_namespace: get(PAYMENT_MEMO_NAMESPACE_ENV)
                .unwrap_or_else(|| DEFAULT_MEMO_NAMESPACE.to_string()),
            intent_ttl: seconds(parse_or(&get, PAYMENT_INTENT_TTL_SECS_ENV, DEFAULT_INTENT_TTL_SECS)?),
            scan_limit: parse_or(&get, PAYMENT_SCAN_LIMIT_ENV, DEFAULT_SCAN_LIMIT)?,
            poll_interval: seconds(parse_or(&get, PAYMENT_POLL_INTERVAL_SECS_ENV, DEFAULT_POLL_INTERVAL_SECS)?),
            poll_max_age: Duration::from_secs(parse_or(
                &get,
                PAYMENT_POLL_MAX_AGE_SECS_ENV,
                DEFAULT_POLL_MAX_AGE_SECS,
            )?),
            min_quote,
            tiers,
            max_open_requests: (max_open > 0).then_some(max_open),
            provider_handle: get(PROVIDER_HANDLE_ENV)
                .unwrap_or_else(|| DEFAULT_PROVIDER_HANDLE.to_string()),
            provider_display_name: get(PROVIDER_DISPLAY_NAME_ENV)
                .unwrap_or_else(|| DEFAULT_PROVIDER_DISPLAY_NAME.to_string()),
            working_hours_start,
            working_hours_end,
            telegram,
            operator_token: get(OPERATOR_TOKEN_ENV),
            tls,
        })
    }

    /// Path of the redb file inside `data_dir`.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(crate::storage::DATABASE_FILE)
    }

    /// Configuration for tests: USDC to a fixed recipient, no background work.
    #[cfg(test)]
    pub fn for_tests(pay_to: &str) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            rpc_url: SOLANA_MAINNET.rpc_url.to_string(),
            pay_to: pay_to.to_string(),
            asset: Asset::usdc(),
            memo_namespace: DEFAULT_MEMO_NAMESPACE.to_string(),
            intent_ttl: Some(Duration::from_secs(DEFAULT_INTENT_TTL_SECS)),
            scan_limit: DEFAULT_SCAN_LIMIT,
            poll_interval: None,
            poll_max_age: Duration::from_secs(DEFAULT_POLL_MAX_AGE_SECS),
            min_quote: DEFAULT_MIN_QUOTE_USD.to_string(),
            tiers: default_tiers(),
            max_open_requests: None,
            provider_handle: DEFAULT_PROVIDER_HANDLE.to_string(),
            provider_display_name: DEFAULT_PROVIDER_DISPLAY_NAME.to_string(),
            working_hours_start: 0,
            working_hours_end: 24,
            telegram: None,
            operator_token: None,
            tls: None,
        }
    }
}

fn parse_or<T, G>(get: &G, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        Some(raw) => raw
            .parse()
            .map_err(|e: T::Err| ConfigError::invalid(name, &raw, e.to_string())),
        None => Ok(default),
    }
}

/// A Solana address is 32 bytes in base58.
fn validate_address(address: &str) -> Result<(), ConfigError> {
    match bs58::decode(address).into_vec() {
        Ok(bytes) if bytes.len() == 32 => Ok(()),
        _ => Err(ConfigError::invalid(
            PROVIDER_SOL_ADDRESS_ENV,
            address,
            "expected a base58 Solana address",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const ADDRESS: &str = "Bt6CgWWuvV2qjkbbVuwXhLptwMajZVerhAZCF7NA4VWW";

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_only_recipient_is_set() {
        let config = load(&[(PROVIDER_SOL_ADDRESS_ENV, ADDRESS)]).unwrap();

        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.asset, Asset::usdc());
        assert_eq!(config.memo_namespace, "Escalatex402");
        assert_eq!(config.intent_ttl, Some(Duration::from_secs(3600)));
        assert_eq!(config.scan_limit, 25);
        assert_eq!(config.poll_interval, Some(Duration::from_secs(30)));
        assert_eq!(config.min_quote, "25");
        assert_eq!(config.tiers.len(), 3);
        assert!(config.max_open_requests.is_none());
        assert_eq!(config.working_hours_end, 24);
        assert!(config.telegram.is_none());
        assert!(config.operator_token.is_none());
        assert!(config.database_path().ends_with("inbox.redb"));
    }

    #[test]
    fn recipient_is_required() {
        assert_eq!(
            load(&[]).unwrap_err(),
            ConfigError::Missing(PROVIDER_SOL_ADDRESS_ENV)
        );
        assert!(load(&[(PROVIDER_SOL_ADDRESS_ENV, "   ")]).is_err());
    }

    #[test]
    fn recipient_must_be_a_solana_address() {
        let err = load(&[(PROVIDER_SOL_ADDRESS_ENV, "0xabc")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name, .. } if name == PROVIDER_SOL_ADDRESS_ENV));
    }

    #[test]
    fn zero_disables_ttl_and_poller() {
        let config = load(&[
            (PROVIDER_SOL_ADDRESS_ENV, ADDRESS),
            (PAYMENT_INTENT_TTL_SECS_ENV, "0"),
            (PAYMENT_POLL_INTERVAL_SECS_ENV, "0"),
        ])
        .unwrap();
        assert!(config.intent_ttl.is_none());
        assert!(config.poll_interval.is_none());
    }

    #[test]
    fn rejects_unknown_token_and_bad_numbers() {
        assert!(load(&[(PROVIDER_SOL_ADDRESS_ENV, ADDRESS), (PAYMENT_TOKEN_ENV, "DOGE")]).is_err());
        assert!(load(&[(PROVIDER_SOL_ADDRESS_ENV, ADDRESS), (PORT_ENV, "eighty")]).is_err());
        assert!(load(&[(PROVIDER_SOL_ADDRESS_ENV, ADDRESS), (MIN_QUOTE_USD_ENV, "-5")]).is_err());
        assert!(load(&[(PROVIDER_SOL_ADDRESS_ENV, ADDRESS), (WORKING_HOURS_END_ENV, "25")]).is_err());
    }

    #[test]
    fn zero_minimum_quote_is_refused() {
        for zero in ["0", "0.0", "0.000000"] {
            let err = load(&[(PROVIDER_SOL_ADDRESS_ENV, ADDRESS), (MIN_QUOTE_USD_ENV, zero)]).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { name, .. } if name == MIN_QUOTE_USD_ENV));
        }
        let config = load(&[(PROVIDER_SOL_ADDRESS_ENV, ADDRESS), (MIN_QUOTE_USD_ENV, "0.01")]).unwrap();
        assert_eq!(config.min_quote, "0.01");
    }

    #[test]
    fn tiers_and_open_limit_from_env() {
        let config = load(&[
            (PROVIDER_SOL_ADDRESS_ENV, ADDRESS),
            (PAYMENT_TIERS_ENV, "24h=30,15m=500"),
            (MAX_OPEN_REQUESTS_ENV, "5"),
        ])
        .unwrap();
        assert_eq!(config.tiers.len(), 2);
        assert_eq!(config.tiers[1].price_usd, "500");
        assert_eq!(config.max_open_requests, Some(5));

        assert!(load(&[(PROVIDER_SOL_ADDRESS_ENV, ADDRESS), (PAYMENT_TIERS_ENV, "24h=0")]).is_err());
    }

    #[test]
    fn telegram_needs_both_values() {
        let partial = load(&[(PROVIDER_SOL_ADDRESS_ENV, ADDRESS), (TELEGRAM_BOT_TOKEN_ENV, "t")]).unwrap();
        assert!(partial.telegram.is_none());

        let full = load(&[
            (PROVIDER_SOL_ADDRESS_ENV, ADDRESS),
            (TELEGRAM_BOT_TOKEN_ENV, "t"),
            (TELEGRAM_CHAT_ID_ENV, "42"),
        ])
        .unwrap();
        assert_eq!(full.telegram.unwrap().chat_id, "42");
    }

    #[test]
    fn tls_paths_must_be_paired() {
        assert!(load(&[(PROVIDER_SOL_ADDRESS_ENV, ADDRESS), (TLS_CERT_PATH_ENV, "cert.pem")]).is_err());
        let config = load(&[
            (PROVIDER_SOL_ADDRESS_ENV, ADDRESS),
            (TLS_CERT_PATH_ENV, "cert.pem"),
            (TLS_KEY_PATH_ENV, "key.pem"),
        ])
        .unwrap();
        assert!(config.tls.is_some());
    }
}
