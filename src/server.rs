use super::*;

pub(crate) async fn run(options: Options, cancel_token: CancellationToken) -> Result {
    let options = Arc::new(options);
    let bitcoin_rpc_client = Arc::new(options.bitcoin_rpc_client()?);
    let ledger = Arc::new(Ledger::new());
    let extranonces = Arc::new(ExtranonceCounter::new());

    let mut generator = Generator::new(
        bitcoin_rpc_client.clone(),
        options.clone(),
        cancel_token.clone(),
    );
    let job_receiver = generator.spawn();

    let (block_sender, block_receiver) = mpsc::channel(16);
    let submitter = submitter::spawn(
        bitcoin_rpc_client,
        ledger.clone(),
        block_receiver,
        cancel_token.clone(),
    );

    let address = options.stratum_address();
    let port = options.stratum_port();

    let listener = TcpListener::bind((address.clone(), port))
        .await
        .with_context(|| format!("failed to bind stratum listener on {address}:{port}"))?;

    info!("Listening for miners on {address}:{port}");

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => {
                info!("Shutting down stratum server");
                break;
            }
            accepted = listener.accept() => {
                let (stream, socket_addr) = match accepted {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        warn!("Failed to accept connection: {err}");
                        continue;
                    }
                };

                stream.set_nodelay(true)?;

                info!("Accepted connection from {socket_addr}");

                let (reader, writer) = stream.into_split();

                let mut connection = Connection::new(
                    options.clone(),
                    ledger.clone(),
                    extranonces.clone(),
                    block_sender.clone(),
                    socket_addr,
                    reader,
                    writer,
                    job_receiver.clone(),
                    cancel_token.clone(),
                );

                tokio::task::spawn(async move {
                    if let Err(err) = connection.serve().await {
                        error!("Connection error from {socket_addr}: {err}");
                    }
                });
            }
        }
    }

    generator.shutdown().await;
    let _ = submitter.await;

    Ok(())
}
