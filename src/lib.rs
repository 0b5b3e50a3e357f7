//! Bitcoin staking outputs
//!
//! Builds Taproot outputs that lock a staker's BTC under three script paths:
//!
//! - **timelock**: the staker alone, after a relative timelock
//! - **unbonding**: the staker plus k-of-n covenant committee signatures
//! - **slashing**: the staker, one restaked validator and the covenant threshold
//!
//! The key path is disabled by an unspendable internal key.
//!
//! # Usage
//!
//! ```rust,ignore
//! let keys = KeySet::new(staker, validators, covenant, 3)?;
//! let params = LockParams::new(Amount::from_sat(100_000), 1008, Network::Signet)?;
//! let descriptor = StakingOutputDescriptor::new(keys, params)?;
//!
//! let info = descriptor.unbonding_spend_info()?;
//! let staker_sig = sign_single_input(&tx, descriptor.output(), info.leaf_script(), &staker_kp)?;
//! let witness = unbonding_witness(&info, &covenant_slots, &staker_sig)?;
//! ```

pub mod adaptor;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod keys;
pub mod logging;
pub mod scripts;
pub mod sighash;
pub mod tree;
pub mod witness;

pub use adaptor::{decrypt_slots, encrypt_sign_script_spend, AdaptorSignatureScheme};
pub use config::{ConfigError, StakingConfig};
pub use descriptor::{SpendInfo, SpendPath, StakingOutputDescriptor, StakingOutputSummary};
pub use error::{
    ConfigurationError, CryptographicError, Result, StakingError, WitnessAssemblyError,
};
pub use keys::{witness_order, KeyRole, KeySet, LockParams};
pub use scripts::LeafScripts;
pub use sighash::{sign_input, sign_single_input, verify_signature, PrevoutResolver};
pub use tree::ScriptTree;
pub use witness::{
    slashing_witness, slots_by_key, timelock_witness, unbonding_witness, SignatureSlot,
};
