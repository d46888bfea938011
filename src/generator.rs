use super::*;

/// Polls the node for fresh block templates and publishes the derived job.
/// Publication is atomic: readers of the watch channel see either the
/// previous job or the fully constructed new one.
pub(crate) struct Generator {
    bitcoin_rpc_client: Arc<bitcoincore_rpc::Client>,
    options: Arc<Options>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Generator {
    pub(crate) fn new(
        bitcoin_rpc_client: Arc<bitcoincore_rpc::Client>,
        options: Arc<Options>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            bitcoin_rpc_client,
            options,
            cancel,
            handle: None,
        }
    }

    pub(crate) fn spawn(&mut self) -> watch::Receiver<Option<Arc<Job>>> {
        let rpc = self.bitcoin_rpc_client.clone();
        let cancel = self.cancel.clone();
        let update_interval = self.options.update_interval();

        let (job_sender, job_receiver) = watch::channel(None);

        let handle = tokio::spawn({
            info!("Spawning template generator");

            let mut ticker = interval(update_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            let mut next_id = JobId::new(0);

            async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => {
                            let rpc = rpc.clone();

                            let template = match task::spawn_blocking(move || get_block_template(&rpc)).await {
                                Ok(Ok(template)) => template,
                                Ok(Err(err)) => {
                                    warn!("Failed to fetch block template: {err}");
                                    continue;
                                }
                                Err(err) => {
                                    error!("Template fetch task failed: {err}");
                                    continue;
                                }
                            };

                            let clean_jobs =
                                clean_jobs(job_sender.borrow().as_deref(), &template);

                            let job_id = next_id;
                            next_id = next_id.next();

                            match Job::new(Arc::new(template), job_id, clean_jobs) {
                                Ok(job) => {
                                    debug!(
                                        "Publishing job {job_id} for height {} (clean: {clean_jobs})",
                                        job.height(),
                                    );
                                    job_sender.send_replace(Some(Arc::new(job)));
                                }
                                Err(err) => warn!("Failed to derive job from template: {err}"),
                            }
                        }
                    }
                }
                info!("Shutting down template generator");
            }
        });

        self.handle = Some(handle);

        job_receiver
    }

    pub(crate) async fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

/// A job wipes its predecessors exactly when the chain tip moved; a same-tip
/// refresh only adds transactions, so miners may finish what they started.
fn clean_jobs(previous: Option<&Job>, template: &BlockTemplate) -> bool {
    previous
        .map(|job| job.template.previous_block_hash != template.previous_block_hash)
        .unwrap_or(true)
}

fn get_block_template(
    bitcoin_rpc_client: &bitcoincore_rpc::Client,
) -> Result<BlockTemplate> {
    let params = json!({"rules": ["segwit"]});

    let template = bitcoin_rpc_client.call::<BlockTemplate>("getblocktemplate", &[params])?;

    info!("New block template for height {}", template.height);

    Ok(template)
}
