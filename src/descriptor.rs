//! Staking output descriptor
//!
//! Owns the staking `TxOut` and its script tree, and hands out per-path
//! [`SpendInfo`] for signing and witness assembly.

use std::fmt;

use bitcoin::taproot::{ControlBlock, LeafVersion, TapLeafHash};
use bitcoin::{Address, Amount, Network, OutPoint, ScriptBuf, TxOut, XOnlyPublicKey};
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::keys::{witness_order, KeySet, LockParams};
use crate::scripts::LeafScripts;
use crate::sighash::PrevoutResolver;
use crate::tree::ScriptTree;

/// Spend path of a staking output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpendPath {
    TimeLock,
    Unbonding,
    Slashing,
}

impl SpendPath {
    pub const ALL: [SpendPath; 3] = [SpendPath::TimeLock, SpendPath::Unbonding, SpendPath::Slashing];
}

impl fmt::Display for SpendPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpendPath::TimeLock => write!(f, "timelock"),
            SpendPath::Unbonding => write!(f, "unbonding"),
            SpendPath::Slashing => write!(f, "slashing"),
        }
    }
}

/// Everything needed to spend one leaf of a staking output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendInfo {
    path: SpendPath,
    leaf_script: ScriptBuf,
    leaf_version: LeafVersion,
    control_block: ControlBlock,
    /// Covenant keys in witness order. Empty on the timelock path.
    covenant_order: Vec<XOnlyPublicKey>,
    /// Validator keys in witness order. Only set on the slashing path.
    validator_order: Vec<XOnlyPublicKey>,
}

impl SpendInfo {
    pub fn path(&self) -> SpendPath {
        self.path
    }

    pub fn leaf_script(&self) -> &ScriptBuf {
        &self.leaf_script
    }

    pub fn leaf_version(&self) -> LeafVersion {
        self.leaf_version
    }

    pub fn control_block(&self) -> &ControlBlock {
        &self.control_block
    }

    /// Serialized control block, as it appears in the witness
    pub fn control_block_bytes(&self) -> Vec<u8> {
        self.control_block.serialize()
    }

    /// BIP-341 tapleaf hash of the leaf script
    pub fn leaf_hash(&self) -> TapLeafHash {
        TapLeafHash::from_script(&self.leaf_script, self.leaf_version)
    }

    pub fn covenant_order(&self) -> &[XOnlyPublicKey] {
        &self.covenant_order
    }

    pub fn validator_order(&self) -> &[XOnlyPublicKey] {
        &self.validator_order
    }
}

/// A staking output: the `TxOut` plus the tree it commits to
#[derive(Debug, Clone)]
pub struct StakingOutputDescriptor {
    keys: KeySet,
    params: LockParams,
    tree: ScriptTree,
    output: TxOut,
}

impl StakingOutputDescriptor {
    /// Build the descriptor from validated keys and lock parameters
    pub fn new(keys: KeySet, params: LockParams) -> Result<Self, ConfigurationError> {
        let leaves = LeafScripts::new(&keys, &params);
        let tree = ScriptTree::new(leaves)?;
        let output = TxOut {
            value: params.staking_amount(),
            script_pubkey: tree.script_pubkey(),
        };

        tracing::debug!(
            script_pubkey = %output.script_pubkey.to_hex_string(),
            value_sats = output.value.to_sat(),
            network = %params.network(),
            "Built staking output"
        );

        Ok(Self {
            keys,
            params,
            tree,
            output,
        })
    }

    /// Build the descriptor from serialized keys
    #[allow(clippy::too_many_arguments)]
    pub fn from_raw<S: AsRef<[u8]>>(
        staker: &[u8],
        validators: &[S],
        covenant: &[S],
        covenant_threshold: u32,
        staking_amount: Amount,
        timelock_blocks: u16,
        network: Network,
    ) -> Result<Self, ConfigurationError> {
        let keys = KeySet::from_slices(staker, validators, covenant, covenant_threshold)?;
        let params = LockParams::new(staking_amount, timelock_blocks, network)?;
        Self::new(keys, params)
    }

    pub fn keys(&self) -> &KeySet {
        &self.keys
    }

    pub fn params(&self) -> &LockParams {
        &self.params
    }

    pub fn tree(&self) -> &ScriptTree {
        &self.tree
    }

    pub fn output(&self) -> &TxOut {
        &self.output
    }

    pub fn script_pubkey(&self) -> &ScriptBuf {
        &self.output.script_pubkey
    }

    pub fn value(&self) -> Amount {
        self.output.value
    }

    /// P2TR address of the staking output on the configured network
    pub fn address(&self) -> Address {
        Address::p2tr_tweaked(self.tree.spend_info().output_key(), self.params.network())
    }

    /// Resolver mapping `outpoint` to this staking output
    pub fn prevout_fetcher(&self, outpoint: OutPoint) -> StakingPrevout {
        StakingPrevout {
            outpoint,
            output: self.output.clone(),
        }
    }

    /// Spend info for the given path
    pub fn spend_info(&self, path: SpendPath) -> Result<SpendInfo, ConfigurationError> {
        let leaves = self.tree.leaves();
        let (leaf_script, covenant_order, validator_order) = match path {
            SpendPath::TimeLock => (leaves.timelock.clone(), Vec::new(), Vec::new()),
            SpendPath::Unbonding => (
                leaves.unbonding.clone(),
                witness_order(self.keys.covenant()),
                Vec::new(),
            ),
            SpendPath::Slashing => (
                leaves.slashing.clone(),
                witness_order(self.keys.covenant()),
                witness_order(self.keys.validators()),
            ),
        };

        let control_block = self.tree.control_block(&leaf_script).ok_or_else(|| {
            ConfigurationError::TaprootBuild(format!("no control block for {} leaf", path))
        })?;

        Ok(SpendInfo {
            path,
            leaf_script,
            leaf_version: LeafScripts::leaf_version(),
            control_block,
            covenant_order,
            validator_order,
        })
    }

    pub fn timelock_spend_info(&self) -> Result<SpendInfo, ConfigurationError> {
        self.spend_info(SpendPath::TimeLock)
    }

    pub fn unbonding_spend_info(&self) -> Result<SpendInfo, ConfigurationError> {
        self.spend_info(SpendPath::Unbonding)
    }

    pub fn slashing_spend_info(&self) -> Result<SpendInfo, ConfigurationError> {
        self.spend_info(SpendPath::Slashing)
    }

    /// Serializable view for tooling and external consumers
    pub fn summary(&self) -> Result<StakingOutputSummary, ConfigurationError> {
        let leaves = SpendPath::ALL
            .iter()
            .map(|path| {
                let info = self.spend_info(*path)?;
                Ok(LeafSummary {
                    path: *path,
                    script_hex: info.leaf_script.to_hex_string(),
                    script_asm: info.leaf_script.to_asm_string(),
                    leaf_hash: info.leaf_hash().to_string(),
                    control_block_hex: hex::encode(info.control_block_bytes()),
                })
            })
            .collect::<Result<Vec<_>, ConfigurationError>>()?;

        Ok(StakingOutputSummary {
            network: self.params.network().to_string(),
            address: self.address().to_string(),
            script_pubkey_hex: self.output.script_pubkey.to_hex_string(),
            value_sats: self.output.value.to_sat(),
            internal_key: hex::encode(self.tree.internal_key().serialize()),
            output_key: hex::encode(self.tree.spend_info().output_key().serialize()),
            merkle_root: self.tree.merkle_root().map(|root| root.to_string()),
            timelock_blocks: self.params.timelock_blocks(),
            covenant_threshold: self.keys.covenant_threshold(),
            staker_key: hex::encode(self.keys.staker().serialize()),
            covenant_keys: hex_keys(&witness_order(self.keys.covenant())),
            validator_keys: hex_keys(&witness_order(self.keys.validators())),
            leaves,
        })
    }
}

fn hex_keys(keys: &[XOnlyPublicKey]) -> Vec<String> {
    keys.iter().map(|k| hex::encode(k.serialize())).collect()
}

/// [`PrevoutResolver`] that knows a single staking outpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakingPrevout {
    outpoint: OutPoint,
    output: TxOut,
}

impl StakingPrevout {
    pub fn outpoint(&self) -> OutPoint {
        self.outpoint
    }
}

impl PrevoutResolver for StakingPrevout {
    fn resolve(&self, outpoint: &OutPoint) -> Option<TxOut> {
        (*outpoint == self.outpoint).then(|| self.output.clone())
    }
}

/// Staking output summary. Keys are listed in witness order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StakingOutputSummary {
    pub network: String,
    pub address: String,
    pub script_pubkey_hex: String,
    pub value_sats: u64,
    pub internal_key: String,
    pub output_key: String,
    pub merkle_root: Option<String>,
    pub timelock_blocks: u16,
    pub covenant_threshold: u32,
    pub staker_key: String,
    pub covenant_keys: Vec<String>,
    pub validator_keys: Vec<String>,
    pub leaves: Vec<LeafSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeafSummary {
    pub path: SpendPath,
    pub script_hex: String,
    pub script_asm: String,
    pub leaf_hash: String,
    pub control_block_hex: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::hashes::Hash;
    use bitcoin::secp256k1::{Keypair, Secp256k1};
    use bitcoin::Txid;

    fn key(seed: u8) -> XOnlyPublicKey {
        let secp = Secp256k1::new();
        Keypair::from_seckey_slice(&secp, &[seed; 32])
            .unwrap()
            .x_only_public_key()
            .0
    }

    fn descriptor() -> StakingOutputDescriptor {
        let keys = KeySet::new(
            key(1),
            vec![key(10), key(11)],
            (40..45).map(key).collect(),
            3,
        )
        .unwrap();
        let params = LockParams::new(Amount::from_sat(250_000), 1_000, Network::Regtest).unwrap();
        StakingOutputDescriptor::new(keys, params).unwrap()
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_descriptor_is_deterministic() {
        let a = descriptor();
        let b = descriptor();
        assert_eq!(a.script_pubkey(), b.script_pubkey());
        assert_eq!(a.value(), Amount::from_sat(250_000));
        assert!(a.script_pubkey().is_p2tr());
    }

    #[test]
    fn test_public_types_are_send_sync() {
        assert_send_sync::<StakingOutputDescriptor>();
        assert_send_sync::<SpendInfo>();
        assert_send_sync::<StakingOutputSummary>();
    }

    #[test]
    fn test_spend_info_orders() {
        let desc = descriptor();

        let timelock = desc.timelock_spend_info().unwrap();
        assert_eq!(timelock.path(), SpendPath::TimeLock);
        assert!(timelock.covenant_order().is_empty());
        assert!(timelock.validator_order().is_empty());

        let unbonding = desc.unbonding_spend_info().unwrap();
        assert_eq!(unbonding.covenant_order().len(), 5);
        assert!(unbonding.validator_order().is_empty());

        let slashing = desc.slashing_spend_info().unwrap();
        assert_eq!(slashing.covenant_order(), unbonding.covenant_order());
        assert_eq!(slashing.validator_order().len(), 2);
        assert!(slashing.validator_order()[0].serialize() >= slashing.validator_order()[1].serialize());
    }

    #[test]
    fn test_control_block_matches_leaf() {
        let secp = Secp256k1::verification_only();
        let desc = descriptor();
        let output_key = desc.tree().spend_info().output_key().to_inner();

        for path in SpendPath::ALL {
            let info = desc.spend_info(path).unwrap();
            assert!(info
                .control_block()
                .verify_taproot_commitment(&secp, output_key, info.leaf_script()));
            assert_eq!(info.control_block_bytes(), info.control_block().serialize());
        }
    }

    #[test]
    fn test_address_uses_network() {
        let desc = descriptor();
        assert!(desc.address().to_string().starts_with("bcrt1p"));
        assert_eq!(desc.address().script_pubkey(), *desc.script_pubkey());
    }

    #[test]
    fn test_prevout_fetcher() {
        let desc = descriptor();
        let outpoint = OutPoint::new(Txid::all_zeros(), 1);
        let fetcher = desc.prevout_fetcher(outpoint);

        assert_eq!(fetcher.resolve(&outpoint), Some(desc.output().clone()));
        assert_eq!(fetcher.resolve(&OutPoint::new(Txid::all_zeros(), 0)), None);
    }

    #[test]
    fn test_summary_serializes() {
        let desc = descriptor();
        let summary = desc.summary().unwrap();

        assert_eq!(summary.leaves.len(), 3);
        assert_eq!(summary.covenant_keys.len(), 5);
        assert_eq!(summary.network, "regtest");
        assert_eq!(
            summary.internal_key,
            "50929b74c1a04954b78b4b6035e97a5e078a5a0f28ec96d547bfee9ace803ac0"
        );

        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"path\":\"time_lock\""));
        let back: StakingOutputSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, summary);
    }

    #[test]
    fn test_from_raw_rejects_bad_threshold() {
        let staker = key(1).serialize();
        let validators = vec![key(2).serialize()];
        let covenant = vec![key(3).serialize(), key(4).serialize()];

        let err = StakingOutputDescriptor::from_raw(
            &staker,
            &validators,
            &covenant,
            3,
            Amount::from_sat(10_000),
            10,
            Network::Regtest,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidThreshold { .. }));
    }
}
