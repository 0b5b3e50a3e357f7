//! Taproot tree assembler
//!
//! Merkleizes the three staking leaves under the BIP-341 NUMS internal key,
//! so the output has no key-path spend:
//!
//! ```text
//!            root
//!           /    \
//!       branch   slashing
//!       /    \
//!  timelock  unbonding
//! ```

use bitcoin::key::Secp256k1;
use bitcoin::taproot::{ControlBlock, TapNodeHash, TaprootBuilder, TaprootSpendInfo};
use bitcoin::{ScriptBuf, XOnlyPublicKey};

use crate::error::ConfigurationError;
use crate::scripts::LeafScripts;

/// BIP-341 "nothing up my sleeve" point: lift_x(SHA256(G)). No known discrete log.
pub const UNSPENDABLE_KEY_BYTES: [u8; 32] = [
    0x50, 0x92, 0x9b, 0x74, 0xc1, 0xa0, 0x49, 0x54, 0xb7, 0x8b, 0x4b, 0x60, 0x35, 0xe9, 0x7a, 0x5e,
    0x07, 0x8a, 0x5a, 0x0f, 0x28, 0xec, 0x96, 0xd5, 0x47, 0xbf, 0xee, 0x9a, 0xce, 0x80, 0x3a, 0xc0,
];

/// The unspendable internal key used by every staking output
pub fn unspendable_internal_key() -> Result<XOnlyPublicKey, ConfigurationError> {
    XOnlyPublicKey::from_slice(&UNSPENDABLE_KEY_BYTES)
        .map_err(|e| ConfigurationError::TaprootBuild(format!("NUMS point error: {}", e)))
}

/// Committed script tree of a staking output
#[derive(Debug, Clone)]
pub struct ScriptTree {
    leaves: LeafScripts,
    spend_info: TaprootSpendInfo,
}

impl ScriptTree {
    /// Assemble the tree from compiled leaves
    pub fn new(leaves: LeafScripts) -> Result<Self, ConfigurationError> {
        let secp = Secp256k1::verification_only();
        let internal_key = unspendable_internal_key()?;

        let builder = TaprootBuilder::new()
            .add_leaf(2, leaves.timelock.clone())
            .and_then(|b| b.add_leaf(2, leaves.unbonding.clone()))
            .and_then(|b| b.add_leaf(1, leaves.slashing.clone()))
            .map_err(|e| ConfigurationError::TaprootBuild(e.to_string()))?;

        let spend_info = builder
            .finalize(&secp, internal_key)
            .map_err(|_| ConfigurationError::TaprootBuild("incomplete script tree".to_string()))?;

        tracing::debug!(
            output_key = %spend_info.output_key(),
            "Assembled staking script tree"
        );

        Ok(Self { leaves, spend_info })
    }

    pub fn leaves(&self) -> &LeafScripts {
        &self.leaves
    }

    pub fn internal_key(&self) -> XOnlyPublicKey {
        self.spend_info.internal_key()
    }

    pub fn merkle_root(&self) -> Option<TapNodeHash> {
        self.spend_info.merkle_root()
    }

    /// P2TR output script committing to the tree
    pub fn script_pubkey(&self) -> ScriptBuf {
        ScriptBuf::new_p2tr_tweaked(self.spend_info.output_key())
    }

    pub fn spend_info(&self) -> &TaprootSpendInfo {
        &self.spend_info
    }

    /// Control block proving `script` is a leaf of this tree
    pub fn control_block(&self, script: &ScriptBuf) -> Option<ControlBlock> {
        self.spend_info
            .control_block(&(script.clone(), LeafScripts::leaf_version()))
    }
}
