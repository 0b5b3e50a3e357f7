//! Staking parameter configuration
//!
//! Loads the covenant committee, threshold, timelock and network from a TOML
//! file. A few values can be overridden from the environment:
//!
//! - `BTCSTAKING_NETWORK` - "mainnet", "testnet", "signet" or "regtest"
//! - `BTCSTAKING_TIMELOCK_BLOCKS` - relative timelock in blocks
//!
//! ```toml
//! network = "signet"
//! covenant_threshold = 2
//! timelock_blocks = 1008
//! covenant_keys = ["<hex>", "<hex>", "<hex>"]
//! validator_keys = ["<hex>"]
//! ```
//!
//! The string parsers here are shared with the command-line tooling.

use std::env;
use std::path::Path;

use bitcoin::secp256k1::schnorr;
use bitcoin::{Amount, Network, XOnlyPublicKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ConfigurationError;
use crate::keys::{normalize_key, KeyRole, KeySet, LockParams};

pub const NETWORK_ENV: &str = "BTCSTAKING_NETWORK";
pub const TIMELOCK_ENV: &str = "BTCSTAKING_TIMELOCK_BLOCKS";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error(transparent)]
    Staking(#[from] ConfigurationError),
}

fn default_network() -> String {
    "regtest".to_string()
}

/// Staking parameters shared by every delegation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingConfig {
    #[serde(default = "default_network")]
    pub network: String,

    /// Hex-encoded covenant committee keys (x-only or compressed)
    pub covenant_keys: Vec<String>,

    pub covenant_threshold: u32,

    pub timelock_blocks: u16,

    /// Hex-encoded validator keys every delegation restakes to
    #[serde(default)]
    pub validator_keys: Vec<String>,
}

impl StakingConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Read a file and apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(network) = env::var(NETWORK_ENV) {
            parse_network(&network)?;
            self.network = network;
        }
        if let Ok(blocks) = env::var(TIMELOCK_ENV) {
            self.timelock_blocks = parse_lock_time(&blocks)
                .map_err(|e| ConfigError::InvalidValue(TIMELOCK_ENV.to_string(), e.to_string()))?;
        }
        Ok(())
    }

    pub fn network(&self) -> Result<Network, ConfigError> {
        parse_network(&self.network)
    }

    pub fn covenant(&self) -> Result<Vec<XOnlyPublicKey>, ConfigError> {
        decode_keys(&self.covenant_keys, KeyRole::Covenant)
    }

    pub fn validators(&self) -> Result<Vec<XOnlyPublicKey>, ConfigError> {
        decode_keys(&self.validator_keys, KeyRole::Validator)
    }

    /// Key set for one staker, restaking to the configured validators plus
    /// `extra_validators`
    pub fn key_set(
        &self,
        staker: XOnlyPublicKey,
        extra_validators: &[XOnlyPublicKey],
    ) -> Result<KeySet, ConfigError> {
        let mut validators = self.validators()?;
        validators.extend_from_slice(extra_validators);
        Ok(KeySet::new(
            staker,
            validators,
            self.covenant()?,
            self.covenant_threshold,
        )?)
    }

    pub fn lock_params(&self, staking_amount: Amount) -> Result<LockParams, ConfigError> {
        Ok(LockParams::new(
            staking_amount,
            self.timelock_blocks,
            self.network()?,
        )?)
    }
}

fn decode_keys(keys: &[String], role: KeyRole) -> Result<Vec<XOnlyPublicKey>, ConfigError> {
    keys.iter()
        .enumerate()
        .map(|(i, s)| -> Result<XOnlyPublicKey, ConfigError> {
            let bytes = hex::decode(s.trim()).map_err(|e| ConfigurationError::KeySerialization {
                role,
                index: i,
                reason: e.to_string(),
            })?;
            Ok(normalize_key(&bytes, role, i)?)
        })
        .collect()
}

/// Parse a network name
pub fn parse_network(s: &str) -> Result<Network, ConfigError> {
    match s.to_lowercase().as_str() {
        "mainnet" | "bitcoin" => Ok(Network::Bitcoin),
        "testnet" => Ok(Network::Testnet),
        "signet" => Ok(Network::Signet),
        "regtest" => Ok(Network::Regtest),
        _ => Err(ConfigError::InvalidValue(
            "network".to_string(),
            format!("unknown network: {}", s),
        )),
    }
}

/// Parse a relative timelock in blocks
pub fn parse_lock_time(s: &str) -> Result<u16, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidValue("staking time".to_string(), reason);

    let value: i128 = s
        .trim()
        .parse()
        .map_err(|_| invalid(format!("invalid staking time: {}", s)))?;
    if value < 0 {
        return Err(invalid("staking time is not a valid unsigned integer".to_string()));
    }

    u16::try_from(value)
        .map_err(|_| invalid(format!("staking time is too large, max is {}", u16::MAX)))
}

/// Parse a staking amount in satoshis
pub fn parse_btc_amount(s: &str) -> Result<Amount, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidValue("staking value".to_string(), reason);

    let value: i128 = s
        .trim()
        .parse()
        .map_err(|_| invalid(format!("invalid staking value: {}", s)))?;
    if value < 0 {
        return Err(invalid("staking value is negative".to_string()));
    }

    i64::try_from(value)
        .map(|sats| Amount::from_sat(sats as u64))
        .map_err(|_| invalid("staking value does not fit in 64 bits".to_string()))
}

/// Parse a hex-encoded public key, x-only or compressed
pub fn parse_x_only_pubkey(s: &str) -> Result<XOnlyPublicKey, ConfigError> {
    let bytes = hex::decode(s.trim())
        .map_err(|e| ConfigError::InvalidValue("public key".to_string(), e.to_string()))?;
    Ok(normalize_key(&bytes, KeyRole::Staker, 0)?)
}

/// Parse a hex-encoded 64-byte BIP-340 signature
pub fn parse_schnorr_signature(s: &str) -> Result<schnorr::Signature, ConfigError> {
    let bytes = hex::decode(s.trim())
        .map_err(|e| ConfigError::InvalidValue("signature".to_string(), e.to_string()))?;
    schnorr::Signature::from_slice(&bytes)
        .map_err(|e| ConfigError::InvalidValue("signature".to_string(), e.to_string()))
}
