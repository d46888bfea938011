use super::*;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub(crate) enum State {
    Connected,
    Subscribed,
    Authorized,
}

/// One session actor per TCP connection. All session state lives here and is
/// only ever touched from this task, so message order within the session is
/// the loop order.
pub(crate) struct Connection<R, W> {
    options: Arc<Options>,
    ledger: Arc<Ledger>,
    extranonces: Arc<ExtranonceCounter>,
    block_sender: mpsc::Sender<FoundBlock>,
    socket_addr: SocketAddr,
    reader: FramedRead<R, LinesCodec>,
    writer: FramedWrite<W, LinesCodec>,
    job_receiver: watch::Receiver<Option<Arc<Job>>>,
    cancel_token: CancellationToken,
    jobs: Jobs,
    state: State,
    difficulty: Difficulty,
    extranonce1: Option<Extranonce>,
    username: Option<Username>,
    payout_script: Option<ScriptBuf>,
    version_mask: Option<Version>,
    user_agent: Option<String>,
    last_notified: Option<JobId>,
}

impl<R, W> Connection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        options: Arc<Options>,
        ledger: Arc<Ledger>,
        extranonces: Arc<ExtranonceCounter>,
        block_sender: mpsc::Sender<FoundBlock>,
        socket_addr: SocketAddr,
        reader: R,
        writer: W,
        job_receiver: watch::Receiver<Option<Arc<Job>>>,
        cancel_token: CancellationToken,
    ) -> Self {
        let difficulty = options.difficulty();

        Self {
            options,
            ledger,
            extranonces,
            block_sender,
            socket_addr,
            reader: FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_MESSAGE_SIZE)),
            writer: FramedWrite::new(writer, LinesCodec::new()),
            job_receiver,
            cancel_token,
            jobs: Jobs::new(),
            state: State::Connected,
            difficulty,
            extranonce1: None,
            username: None,
            payout_script: None,
            version_mask: None,
            user_agent: None,
            last_notified: None,
        }
    }

    pub(crate) async fn serve(&mut self) -> Result {
        let mut job_receiver = self.job_receiver.clone();
        let cancel_token = self.cancel_token.clone();

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    info!("Disconnecting from {}", self.socket_addr);
                    break;
                }
                line = self.reader.next() => {
                    match line {
                        Some(Ok(line)) => {
                            let message = match serde_json::from_str::<Message>(&line) {
                                Ok(message) => message,
                                Err(err) => {
                                    debug!(
                                        "Discarding malformed line from {}: {err}; line={line:?}",
                                        self.socket_addr
                                    );
                                    continue;
                                }
                            };

                            let Message::Request { id, method, params } = message else {
                                debug!(
                                    "Ignoring non-request message from {}",
                                    self.socket_addr
                                );
                                continue;
                            };

                            self.handle_request(id, &method, params).await?;
                        }
                        Some(Err(err)) => {
                            warn!("Read error from {}: {err}", self.socket_addr);
                            break;
                        }
                        None => {
                            info!("Connection {} disconnected", self.socket_addr);
                            break;
                        }
                    }
                }
                changed = job_receiver.changed() => {
                    if changed.is_err() {
                        warn!(
                            "Job channel dropped, closing connection with {}",
                            self.socket_addr
                        );
                        break;
                    }

                    let job = job_receiver.borrow_and_update().clone();

                    if self.state != State::Authorized {
                        continue;
                    }

                    if let Some(job) = job {
                        self.notify(job, false).await?;
                    }
                }
            }
        }

        Ok(())
    }

    async fn handle_request(&mut self, id: Id, method: &str, params: Value) -> Result {
        match method {
            "mining.configure" => {
                debug!("CONFIGURE from {} with {params}", self.socket_addr);

                match serde_json::from_value::<Configure>(params) {
                    Ok(configure) => self.configure(id, configure).await,
                    Err(err) => {
                        debug!("Bad configure params from {}: {err}", self.socket_addr);
                        self.send_error(id, StratumError::Internal).await
                    }
                }
            }
            "mining.subscribe" => {
                debug!("SUBSCRIBE from {} with {params}", self.socket_addr);

                match serde_json::from_value::<Subscribe>(params) {
                    Ok(subscribe) => self.subscribe(id, subscribe).await,
                    Err(err) => {
                        debug!("Bad subscribe params from {}: {err}", self.socket_addr);
                        self.send_error(id, StratumError::Internal).await
                    }
                }
            }
            "mining.authorize" => {
                debug!("AUTHORIZE from {} with {params}", self.socket_addr);

                match serde_json::from_value::<Authorize>(params) {
                    Ok(authorize) => self.authorize(id, authorize).await,
                    Err(err) => {
                        debug!("Bad authorize params from {}: {err}", self.socket_addr);
                        self.send_error(id, StratumError::Internal).await
                    }
                }
            }
            "mining.submit" => {
                debug!("SUBMIT from {} with {params}", self.socket_addr);

                if self.state != State::Authorized {
                    return self.send_error(id, StratumError::Unauthorized).await;
                }

                match serde_json::from_value::<Submit>(params) {
                    Ok(submit) => self.submit(id, submit).await,
                    Err(err) => {
                        debug!("Bad submit params from {}: {err}", self.socket_addr);
                        self.send_error(id, StratumError::Internal).await
                    }
                }
            }
            "mining.extranonce.subscribe" => self.send_result(id, json!(true)).await,
            method => {
                debug!(
                    "Ignoring unknown method {method} from {}",
                    self.socket_addr
                );
                Ok(())
            }
        }
    }

    /// Acknowledges every requested extension; `version-rolling` negotiates
    /// the fixed mask, everything else gets a bare `true`. Never fails the
    /// connection.
    async fn configure(&mut self, id: Id, configure: Configure) -> Result {
        let mut result = serde_json::Map::new();

        for extension in &configure.extensions {
            if extension == "version-rolling" {
                result.insert("version-rolling".into(), json!(true));
                result.insert("version-rolling.mask".into(), json!(*VERSION_MASK));
                self.version_mask = Some(*VERSION_MASK);
            } else {
                result.insert(extension.clone(), json!(true));
            }
        }

        self.send_result(id, Value::Object(result)).await
    }

    /// Assigns the session its extranonce1 and pushes the starting
    /// difficulty. No work is sent yet; the payout address is still unknown.
    async fn subscribe(&mut self, id: Id, subscribe: Subscribe) -> Result {
        if let Some(suggested) = &subscribe.extranonce1 {
            debug!("Ignoring suggested extranonce1 {suggested} from {}", self.socket_addr);
        }

        let extranonce1 = match &self.extranonce1 {
            Some(extranonce1) => extranonce1.clone(),
            None => {
                let extranonce1 = self.extranonces.assign();
                self.extranonce1 = Some(extranonce1.clone());
                extranonce1
            }
        };

        self.user_agent = subscribe.user_agent;

        if let Some(user_agent) = &self.user_agent {
            debug!("{} subscribed with user agent {user_agent}", self.socket_addr);
        }

        let token = extranonce1.to_hex();

        let result = SubscribeResult {
            subscriptions: vec![
                ("mining.set_difficulty".to_string(), token.clone()),
                ("mining.notify".to_string(), token),
            ],
            extranonce1,
            extranonce2_size: EXTRANONCE2_SIZE,
        };

        self.send_result(id, json!(result)).await?;

        if self.state == State::Connected {
            self.state = State::Subscribed;
        }

        debug!("Sending SET DIFFICULTY to {}", self.socket_addr);

        self.send(Message::Notification {
            method: "mining.set_difficulty".into(),
            params: json!(SetDifficulty(self.difficulty)),
        })
        .await
    }

    /// Splits the dotted username, derives the payout script, and replies
    /// `true` unconditionally; a miner with a bad address burns its reward
    /// but still gets work. Sends the first notify iff a job exists.
    async fn authorize(&mut self, id: Id, authorize: Authorize) -> Result {
        if self.state == State::Connected || self.extranonce1.is_none() {
            debug!("AUTHORIZE before SUBSCRIBE from {}", self.socket_addr);
            return self.send_error(id, StratumError::Unauthorized).await;
        }

        let username = authorize.username;
        let payout_script = script_pubkey(username.address());

        if payout_script.as_bytes() == [0x6a] {
            warn!(
                "Address {} does not decode; rewards for {} will be burned",
                username.address(),
                self.socket_addr
            );
        }

        self.send_result(id, json!(true)).await?;

        if self.state == State::Subscribed {
            if let Some(key) = self.session_key() {
                self.ledger.register_session(
                    key,
                    username.address(),
                    username.worker(),
                    now_ms(),
                );
            }
            self.state = State::Authorized;
        } else if let Some(key) = self.session_key() {
            // re-authorize: the session keeps its counters but mines for the
            // new identity from here on
            self.ledger
                .update_session_identity(key, username.address(), username.worker());
        }

        self.username = Some(username);
        self.payout_script = Some(payout_script);

        let job = self.job_receiver.borrow().clone();

        match job {
            Some(job) => self.notify(job, true).await,
            None => {
                debug!(
                    "No block template yet; deferring notify for {}",
                    self.socket_addr
                );
                Ok(())
            }
        }
    }

    /// Sends one `mining.notify` for the job, with the coinbase halves built
    /// around this session's extranonce1. Broadcasts deduplicate against the
    /// last job sent, so a refresh racing an authorize never double-sends.
    /// An authorize-time notify always goes out with `clean_jobs` forced
    /// true: the coinbase may now pay a different address.
    async fn notify(&mut self, job: Arc<Job>, authorize_resend: bool) -> Result {
        if !authorize_resend && self.last_notified == Some(job.job_id) {
            return Ok(());
        }

        let (coinb1, coinb2) = self.coinbase_halves(&job)?;

        let clean_jobs = authorize_resend || job.clean_jobs;

        self.jobs.insert_with_clean(job.clone(), clean_jobs);
        self.last_notified = Some(job.job_id);

        debug!(
            "Sending NOTIFY for job {} to {} (clean: {clean_jobs})",
            job.job_id, self.socket_addr
        );

        self.send(Message::Notification {
            method: "mining.notify".into(),
            params: json!(job.notify(coinb1, coinb2, clean_jobs)),
        })
        .await
    }

    /// Scores a submitted share: rebuild the exact coinbase the miner used,
    /// fold it through the merkle branch, reassemble the 80-byte header, and
    /// compare the double-SHA256 against both targets.
    async fn submit(&mut self, id: Id, submit: Submit) -> Result {
        let now = now_ms();

        let Some(job) = self.jobs.get(&submit.job_id) else {
            debug!("Unknown job {} from {}", submit.job_id, self.socket_addr);
            return self.reject(id, StratumError::Internal, now).await;
        };

        if submit.extranonce2.len() != EXTRANONCE2_SIZE {
            debug!(
                "Bad extranonce2 length from {}: got {}, expected {}",
                self.socket_addr,
                submit.extranonce2.len(),
                EXTRANONCE2_SIZE
            );
            return self.reject(id, StratumError::Internal, now).await;
        }

        let Some((username, extranonce1)) = self.worker_info() else {
            debug!("SUBMIT before AUTHORIZE from {}", self.socket_addr);
            return self.reject(id, StratumError::Internal, now).await;
        };

        let (coinb1, coinb2) = match self.coinbase_halves(&job) {
            Ok(halves) => halves,
            Err(err) => {
                debug!("Failed to rebuild coinbase for {}: {err}", self.socket_addr);
                return self.reject(id, StratumError::Internal, now).await;
            }
        };

        let merkle_root = match stratum::merkle_root(
            &coinb1,
            &coinb2,
            &extranonce1,
            &submit.extranonce2,
            &job.merkle_branches,
        ) {
            Ok(merkle_root) => merkle_root,
            Err(err) => {
                debug!("Merkle root failure for {}: {err}", self.socket_addr);
                return self.reject(id, StratumError::Internal, now).await;
            }
        };

        let version = match (self.version_mask, submit.version_bits) {
            (Some(mask), Some(bits)) => job.version() ^ (bits & mask),
            _ => job.version(),
        };

        let header = Header {
            version: version.into(),
            prev_blockhash: job.template.previous_block_hash,
            merkle_root: merkle_root.into(),
            time: submit.ntime.into(),
            bits: job.nbits().to_compact(),
            nonce: submit.nonce.into(),
        };

        let hash = header.block_hash();
        let share_difficulty = stratum::share_difficulty(hash);

        if share_difficulty < self.difficulty.as_f64() {
            debug!(
                "Low difficulty share from {}: {share_difficulty} < {}",
                self.socket_addr, self.difficulty
            );
            return self.reject(id, StratumError::LowDifficulty, now).await;
        }

        self.send_result(id, json!(true)).await?;

        if let Some(key) = self.session_key() {
            self.ledger.session_share_accepted(key, share_difficulty, now);
        }
        self.ledger
            .record_share(username.address(), username.worker(), share_difficulty, true, now);
        self.ledger
            .update_best_difficulty(username.address(), share_difficulty);

        debug!(
            "Share accepted from {} at difficulty {share_difficulty}",
            self.socket_addr
        );

        if job.network_target.is_met_by(hash) {
            info!(
                "Share {hash} from {} meets network difficulty {}",
                self.socket_addr,
                stratum::network_difficulty(job.nbits()),
            );

            let coinbase_bin = hex::decode(format!(
                "{coinb1}{extranonce1}{}{coinb2}",
                submit.extranonce2
            ))?;

            match assemble_block(&job, header, &coinbase_bin) {
                Ok(block) => {
                    let found = FoundBlock {
                        block,
                        address: username.address().to_string(),
                        worker: username.worker().to_string(),
                        height: job.height(),
                    };

                    if self.block_sender.send(found).await.is_err() {
                        error!("Block submitter is gone; dropping solved block {hash}");
                    }
                }
                Err(err) => error!("Failed to assemble block {hash}: {err}"),
            }
        }

        Ok(())
    }

    async fn reject(&mut self, id: Id, error: StratumError, now: u64) -> Result {
        self.send_error(id, error).await?;

        if let Some(key) = self.session_key() {
            self.ledger.session_share_rejected(key);
        }

        if let Some(username) = &self.username {
            self.ledger
                .record_share(username.address(), username.worker(), 0.0, false, now);
        }

        Ok(())
    }

    /// The halves are deterministic in the session and job, so share
    /// verification rebuilds byte-for-byte what `mining.notify` sent.
    fn coinbase_halves(&self, job: &Job) -> Result<(String, String)> {
        let (payout_script, extranonce1) = match (&self.payout_script, &self.extranonce1) {
            (Some(payout_script), Some(extranonce1)) => {
                (payout_script.clone(), extranonce1.clone())
            }
            _ => bail!("coinbase requested before authorize"),
        };

        let (_, coinb1, coinb2) = job
            .coinbase_builder(self.options.pool_name(), payout_script, extranonce1)
            .build()?;

        Ok((coinb1, coinb2))
    }

    fn worker_info(&self) -> Option<(Username, Extranonce)> {
        match (&self.username, &self.extranonce1) {
            (Some(username), Some(extranonce1)) => {
                Some((username.clone(), extranonce1.clone()))
            }
            _ => None,
        }
    }

    async fn send(&mut self, message: Message) -> Result {
        let frame = serde_json::to_string(&message)?;
        self.writer.send(frame).await?;
        Ok(())
    }

    async fn send_result(&mut self, id: Id, result: Value) -> Result {
        self.send(Message::Response {
            id,
            result: Some(result),
            error: None,
        })
        .await
    }

    async fn send_error(&mut self, id: Id, error: StratumError) -> Result {
        self.send(Message::Response {
            id,
            result: None,
            error: Some(error.into_response()),
        })
        .await
    }
}

impl<R, W> Connection<R, W> {
    fn session_key(&self) -> Option<u32> {
        self.extranonce1.as_ref().and_then(|extranonce1| {
            extranonce1
                .as_bytes()
                .try_into()
                .ok()
                .map(u32::from_be_bytes)
        })
    }
}

impl<R, W> Drop for Connection<R, W> {
    fn drop(&mut self) {
        if let Some(key) = self.session_key() {
            self.ledger.remove_session(key);
        }
        info!("Connection {} closed", self.socket_addr);
    }
}

fn assemble_block(job: &Job, header: Header, coinbase_bin: &[u8]) -> Result<Block> {
    let coinbase = coinbase::segwit_coinbase(coinbase_bin)?;

    let txdata = std::iter::once(coinbase)
        .chain(
            job.template
                .transactions
                .iter()
                .map(|tx| tx.transaction.clone()),
        )
        .collect();

    Ok(Block { header, txdata })
}
