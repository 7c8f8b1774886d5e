//! Unit deployer: creates one contract instance.

use alloy_core::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::{
    abi::ArgValue,
    artifacts::Artifact,
    chain::{ChainClient, Receipt, TxRequest, TxSigner},
    error::{Error, Result},
    network::{ConfirmationPolicy, GasParams, NetworkId},
    submit::submit_and_confirm,
};

/// A confirmed contract creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedUnit {
    pub address: Address,
    pub receipt: Receipt,
}

pub struct UnitDeployer<'a, C, S> {
    client: &'a C,
    signer: &'a S,
    chain_id: NetworkId,
}

impl<'a, C, S> UnitDeployer<'a, C, S>
where
    C: ChainClient,
    S: TxSigner,
{
    pub fn new(client: &'a C, signer: &'a S, chain_id: NetworkId) -> Self {
        Self {
            client,
            signer,
            chain_id,
        }
    }

    /// Deploy `artifact` with `args` using `nonce`, and wait for the receipt.
    ///
    /// The deployed address is taken from the receipt. The nonce is consumed
    /// whatever the outcome.
    pub async fn deploy(
        &self,
        artifact: &Artifact,
        args: &[ArgValue],
        nonce: u64,
        gas: GasParams,
        policy: ConfirmationPolicy,
    ) -> Result<DeployedUnit> {
        let input = artifact.creation_code(args)?;

        tracing::info!(
            contract = %artifact.contract_name,
            nonce,
            gas_limit = gas.gas_limit,
            "Deploying contract..."
        );

        let request = TxRequest {
            chain_id: self.chain_id,
            nonce,
            gas_price: gas.gas_price,
            gas_limit: gas.gas_limit,
            to: None,
            input,
        };

        let receipt = submit_and_confirm(self.client, self.signer, request, policy).await?;

        let address = receipt
            .contract_address
            .ok_or_else(|| Error::ConfirmationError {
                tx_hash: receipt.tx_hash,
                reason: Some("receipt carries no contract address".to_string()),
            })?;

        let expected = self.signer.address().create(nonce);
        if address != expected {
            tracing::warn!(%address, %expected, nonce, "Deployed address differs from sender/nonce derivation");
        }

        tracing::info!(contract = %artifact.contract_name, %address, "Contract deployed");

        Ok(DeployedUnit { address, receipt })
    }
}
