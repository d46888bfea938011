use super::*;

/// A share that also met the network target, ready for `submitblock`.
#[derive(Debug, Clone)]
pub(crate) struct FoundBlock {
    pub(crate) block: Block,
    pub(crate) address: String,
    pub(crate) worker: String,
    pub(crate) height: u64,
}

/// Drains solved blocks off a channel and hands them to the node, keeping
/// node I/O away from the session actors. A rejected block is logged and
/// never retried; the share that produced it stays accepted.
pub(crate) fn spawn(
    bitcoin_rpc_client: Arc<bitcoincore_rpc::Client>,
    ledger: Arc<Ledger>,
    mut receiver: mpsc::Receiver<FoundBlock>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                found = receiver.recv() => {
                    let Some(FoundBlock { block, address, worker, height }) = found else {
                        break;
                    };

                    let block_hash = block.block_hash();

                    info!("Submitting block {block_hash} at height {height} for {address}.{worker}");

                    let rpc = bitcoin_rpc_client.clone();
                    let result = task::spawn_blocking(move || rpc.submit_block(&block)).await;

                    match result {
                        Ok(Ok(())) => info!("Node accepted block {block_hash}"),
                        Ok(Err(err)) => error!("Node rejected block {block_hash}: {err}"),
                        Err(err) => error!("Block submission task failed: {err}"),
                    }

                    ledger.record_block_found(&address, &worker, height);
                }
            }
        }
        info!("Shutting down block submitter");
    })
}
