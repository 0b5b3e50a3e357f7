//! Adaptor signature capability
//!
//! Covenant members may pre-sign unbonding and slashing transactions with
//! signatures encrypted under the staker's or validator's key. Decryption
//! yields an ordinary BIP-340 signature that fits a [`SignatureSlot`], and
//! publishing it lets the counterparty extract the decryption secret.
//!
//! Only the capability is defined here. Schemes plug in by implementing
//! [`AdaptorSignatureScheme`].

use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{schnorr, Keypair, Message, PublicKey};
use bitcoin::{Script, Transaction, TxOut};

use crate::error::CryptographicError;
use crate::sighash::script_spend_sighash;
use crate::witness::SignatureSlot;

/// A Schnorr adaptor signature scheme
pub trait AdaptorSignatureScheme {
    type EncryptedSignature: Clone;
    type Secret;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Sign `msg` so the result only verifies after decryption with the
    /// secret behind `encryption_key`
    fn encrypt_sign(
        &self,
        msg: &Message,
        keypair: &Keypair,
        encryption_key: &PublicKey,
    ) -> Result<Self::EncryptedSignature, Self::Error>;

    fn decrypt(
        &self,
        encrypted: &Self::EncryptedSignature,
        secret: &Self::Secret,
    ) -> Result<schnorr::Signature, Self::Error>;

    /// Recover the decryption secret from a published signature
    fn extract_secret(
        &self,
        signature: &schnorr::Signature,
        encrypted: &Self::EncryptedSignature,
        encryption_key: &PublicKey,
    ) -> Result<Self::Secret, Self::Error>;
}

/// Encrypt-sign the only input of `tx` spending `prevout` through `leaf_script`
pub fn encrypt_sign_script_spend<S: AdaptorSignatureScheme>(
    scheme: &S,
    tx: &Transaction,
    prevout: &TxOut,
    leaf_script: &Script,
    keypair: &Keypair,
    encryption_key: &PublicKey,
) -> Result<S::EncryptedSignature, CryptographicError> {
    if tx.input.len() != 1 {
        return Err(CryptographicError::SighashComputation(format!(
            "single-input signing requires exactly one input, transaction has {}",
            tx.input.len()
        )));
    }

    let sighash = script_spend_sighash(tx, 0, std::slice::from_ref(prevout), leaf_script)?;
    let msg = Message::from_digest(sighash.to_byte_array());

    scheme
        .encrypt_sign(&msg, keypair, encryption_key)
        .map_err(|e| CryptographicError::Signing(e.to_string()))
}

/// Decrypt positional encrypted slots into witness slots
pub fn decrypt_slots<S: AdaptorSignatureScheme>(
    scheme: &S,
    slots: &[Option<S::EncryptedSignature>],
    secret: &S::Secret,
) -> Result<Vec<SignatureSlot>, S::Error> {
    slots
        .iter()
        .map(|slot| slot.as_ref().map(|enc| scheme.decrypt(enc, secret)).transpose())
        .collect()
}
