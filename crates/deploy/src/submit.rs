//! Sign, submit and wait: the path every transaction of a run takes.

use alloy_core::primitives::TxHash;

use crate::{
    chain::{ChainClient, Receipt, SendError, TxRequest, TxSigner},
    error::{Error, Result},
    network::ConfirmationPolicy,
};

/// Submit `request` and block until it is confirmed, reverted or timed out.
///
/// Once the transaction may have reached the node it cannot be withdrawn, so
/// this waits for an outcome unless the node explicitly refused it. A lost
/// response to the submission is waited on like an accepted one.
pub(crate) async fn submit_and_confirm<C, S>(
    client: &C,
    signer: &S,
    request: TxRequest,
    policy: ConfirmationPolicy,
) -> Result<Receipt>
where
    C: ChainClient,
    S: TxSigner,
{
    let nonce = request.nonce;
    let signed = signer.sign(request)?;

    match client.send_raw_transaction(&signed).await {
        Ok(tx_hash) => {
            if tx_hash != signed.hash {
                tracing::warn!(local = %signed.hash, node = %tx_hash, "Node reported a different transaction hash");
            }
            tracing::info!(nonce, %tx_hash, "Transaction submitted, waiting for confirmation...");
        }
        Err(SendError::Rejected(message)) => {
            return Err(Error::SubmissionError { nonce, message });
        }
        Err(SendError::Transport(e)) => {
            let error = format!("{e:#}");
            tracing::warn!(
                nonce,
                tx_hash = %signed.hash,
                %error,
                "No answer to submission, waiting for the transaction anyway..."
            );
        }
    }

    let receipt = wait_for_receipt(client, signed.hash, policy).await?;

    if !receipt.success {
        let reason = client.revert_reason(&signed, receipt.block_number).await;
        tracing::warn!(nonce, tx_hash = %signed.hash, reason = ?reason, "Transaction reverted");
        return Err(Error::ConfirmationError {
            tx_hash: signed.hash,
            reason,
        });
    }

    tracing::debug!(
        nonce,
        tx_hash = %signed.hash,
        block = receipt.block_number,
        gas_used = receipt.gas_used,
        "Transaction confirmed"
    );

    Ok(receipt)
}

/// Poll for a receipt until one shows up or the policy's timeout elapses.
///
/// Query errors are treated like "not yet included"; only the timeout ends
/// the wait.
pub(crate) async fn wait_for_receipt<C: ChainClient>(
    client: &C,
    tx_hash: TxHash,
    policy: ConfirmationPolicy,
) -> Result<Receipt> {
    let poll = async {
        loop {
            match client.transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => return receipt,
                Ok(None) => {
                    tracing::trace!(%tx_hash, "Transaction not yet included");
                }
                Err(e) => {
                    tracing::trace!(error = %e, %tx_hash, "Receipt query failed, retrying...");
                }
            }

            tokio::time::sleep(policy.poll_interval).await;
        }
    };

    tokio::time::timeout(policy.timeout, poll)
        .await
        .map_err(|_| Error::ConfirmationTimeout {
            tx_hash,
            timeout: policy.timeout,
        })
}
