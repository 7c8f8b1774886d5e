//! Seams to the outside world: the chain client and the signer.
//!
//! The orchestration core only ever talks to a [`ChainClient`] and a
//! [`TxSigner`]. [`crate::rpc::RpcClient`] and
//! [`alloy_signer_local::PrivateKeySigner`] are the production implementations.

use std::future::Future;

use alloy_consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy_core::primitives::{Address, Bytes, TxHash, TxKind, U256};
use alloy_eips::eip2718::Encodable2718;
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    network::NetworkId,
};

/// An unsigned transaction as the core builds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRequest {
    pub chain_id: NetworkId,
    pub nonce: u64,
    pub gas_price: u64,
    pub gas_limit: u64,
    /// `None` creates a contract.
    pub to: Option<Address>,
    pub input: Bytes,
}

/// A signed transaction ready for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTx {
    pub request: TxRequest,
    pub from: Address,
    pub hash: TxHash,
    pub raw: Bytes,
}

/// The part of a transaction receipt the core cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub success: bool,
    pub contract_address: Option<Address>,
    pub gas_used: u64,
}

/// Why `eth_sendRawTransaction` did not return a hash.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// The node answered and refused the transaction.
    #[error("rejected by node: {0}")]
    Rejected(String),
    /// No answer was received; the node may still hold the transaction.
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

/// Opaque signing capability.
pub trait TxSigner: Send + Sync {
    fn address(&self) -> Address;

    fn sign(&self, request: TxRequest) -> Result<SignedTx>;
}

/// Minimal chain access needed to run a recipe.
///
/// Transport errors are reported as [`anyhow::Error`]; the deployer and the
/// wiring executor classify them. Submission distinguishes a refusal from a
/// lost response with [`SendError`].
pub trait ChainClient: Send + Sync {
    fn chain_id(&self) -> impl Future<Output = anyhow::Result<u64>> + Send;

    /// Transaction count of `account` including pending transactions.
    fn transaction_count(&self, account: Address) -> impl Future<Output = anyhow::Result<u64>> + Send;

    /// Hand a signed transaction to the node.
    fn send_raw_transaction(
        &self,
        tx: &SignedTx,
    ) -> impl Future<Output = std::result::Result<TxHash, SendError>> + Send;

    /// `None` while the transaction is not yet included.
    fn transaction_receipt(
        &self,
        hash: TxHash,
    ) -> impl Future<Output = anyhow::Result<Option<Receipt>>> + Send;

    /// Best-effort revert reason for a transaction that failed in `block`.
    fn revert_reason(
        &self,
        tx: &SignedTx,
        block: u64,
    ) -> impl Future<Output = Option<String>> + Send {
        let _ = (tx, block);
        async { None }
    }
}

impl TxSigner for PrivateKeySigner {
    fn address(&self) -> Address {
        alloy_signer::Signer::address(self)
    }

    /// Signs an EIP-155 legacy transaction; the networks in the registry all
    /// price gas with a fixed gas price.
    fn sign(&self, request: TxRequest) -> Result<SignedTx> {
        let tx = TxLegacy {
            chain_id: Some(request.chain_id.0),
            nonce: request.nonce,
            gas_price: u128::from(request.gas_price),
            gas_limit: request.gas_limit,
            to: request.to.map_or(TxKind::Create, TxKind::Call),
            value: U256::ZERO,
            input: request.input.clone(),
        };

        let signature = self
            .sign_hash_sync(&tx.signature_hash())
            .map_err(|e| Error::Signing(e.to_string()))?;
        let envelope = TxEnvelope::from(tx.into_signed(signature));

        Ok(SignedTx {
            from: TxSigner::address(self),
            hash: *envelope.tx_hash(),
            raw: envelope.encoded_2718().into(),
            request,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_core::primitives::{address, keccak256};

    // First Anvil/Hardhat development account.
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn request(to: Option<Address>) -> TxRequest {
        TxRequest {
            chain_id: NetworkId(97),
            nonce: 7,
            gas_price: 20_000_000_000,
            gas_limit: 3_000_000,
            to,
            input: Bytes::from_static(&[0x60, 0x80]),
        }
    }

    #[test]
    fn test_private_key_signer_address() {
        let signer: PrivateKeySigner = DEV_KEY.parse().unwrap();
        assert_eq!(
            TxSigner::address(&signer),
            address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266")
        );
    }

    #[test]
    fn test_sign_legacy_transaction() {
        let signer: PrivateKeySigner = DEV_KEY.parse().unwrap();
        let signed = signer.sign(request(None)).unwrap();

        // Legacy transactions are a bare RLP list.
        assert!(signed.raw[0] >= 0xc0);
        assert_eq!(signed.hash, keccak256(&signed.raw));
        assert_eq!(signed.request.nonce, 7);
    }

    #[test]
    fn test_sign_is_deterministic_and_nonce_sensitive() {
        let signer: PrivateKeySigner = DEV_KEY.parse().unwrap();
        let target = Some(address!("0xC232Ce0b83b3B320CdA3ec78c57A0D101A4Ac5cD"));

        let a = signer.sign(request(target)).unwrap();
        let b = signer.sign(request(target)).unwrap();
        assert_eq!(a.hash, b.hash);

        let mut bumped = request(target);
        bumped.nonce += 1;
        assert_ne!(signer.sign(bumped).unwrap().hash, a.hash);
    }
}
