//! Wiring step executor: one state-changing call on a deployed contract.

use alloy_core::primitives::Address;

use crate::{
    abi::{ArgValue, encode_call},
    chain::{ChainClient, Receipt, TxRequest, TxSigner},
    error::Result,
    network::{ConfirmationPolicy, GasParams, NetworkId},
    submit::submit_and_confirm,
};

pub struct WiringExecutor<'a, C, S> {
    client: &'a C,
    signer: &'a S,
    chain_id: NetworkId,
}

impl<'a, C, S> WiringExecutor<'a, C, S>
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

    /// Call `method` (a Solidity signature) on `target` and wait for the receipt.
    ///
    /// Whether calling the same method twice is harmless depends on the target
    /// contract; nothing here retries. A permission check that rejects the
    /// signer comes back as a confirmation error with the revert reason.
    pub async fn call(
        &self,
        target: Address,
        method: &str,
        args: &[ArgValue],
        nonce: u64,
        gas: GasParams,
        policy: ConfirmationPolicy,
    ) -> Result<Receipt> {
        let input = encode_call(method, args)?;

        tracing::info!(%target, method, nonce, "Calling contract...");

        let request = TxRequest {
            chain_id: self.chain_id,
            nonce,
            gas_price: gas.gas_price,
            gas_limit: gas.gas_limit,
            to: Some(target),
            input,
        };

        submit_and_confirm(self.client, self.signer, request, policy).await
    }
}
