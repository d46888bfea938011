use {super::*, tokio::signal::ctrl_c};

pub(crate) fn setup_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let handler_token = token.clone();

    tokio::spawn(async move {
        if ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            handler_token.cancel();
        }
    });

    token
}
