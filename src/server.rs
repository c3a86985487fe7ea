use std::sync::Arc;

use anyhow::{Context as _, Result};
use tokio::net::{TcpListener, TcpSocket};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::handle_connection;

/// Bind the listening socket with address reuse and the configured backlog.
pub fn bind(cfg: &Config) -> Result<TcpListener> {
    let addr = cfg.listen_addr();

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()
    } else {
        TcpSocket::new_v6()
    }
    .context("create TCP socket")?;

    socket.set_reuseaddr(true).context("set SO_REUSEADDR")?;
    socket
        .bind(addr)
        .with_context(|| format!("bind TCP socket to {addr}"))?;

    socket.listen(cfg.backlog()).context("listen on TCP socket")
}

/// Accept and serve connections one at a time until a shutdown signal arrives.
pub async fn run(cfg: &Config) -> Result<()> {
    let listener = bind(cfg)?;
    serve(listener, cfg).await
}

pub async fn serve(listener: TcpListener, cfg: &Config) -> Result<()> {
    let addr = listener.local_addr().context("listener address")?;
    info!(%addr, root = %cfg.document_root().display(), "server is ready to accept connections");

    let cfg = Arc::new(cfg.clone());

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            stream = listener.accept() => match stream {
                Ok((stream, peer)) => {
                    info!(%peer, "accepted connection");

                    if let Err(error) = stream.set_nodelay(true) {
                        warn!(%peer, %error, "cannot set TCP_NODELAY");
                    }

                    // a panicking handler only takes its own connection down
                    let cfg = Arc::clone(&cfg);
                    let handler = tokio::spawn(async move {
                        handle_connection(stream, peer, &cfg).await
                    });

                    match handler.await {
                        Ok(Ok(())) => {}
                        Ok(Err(error)) => error!(%peer, "connection failed: {error:#}"),
                        Err(error) => error!(%peer, %error, "connection handler crashed"),
                    }
                }
                Err(error) => warn!(%error, "cannot accept client"),
            },

            signal = &mut shutdown => {
                signal.context("listen for shutdown signal")?;
                info!("shutting down server");
                return Ok(());
            }
        }
    }
}

#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;

    tokio::select! {
        res = tokio::signal::ctrl_c() => res,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
