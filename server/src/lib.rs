//! Library surface shared by the `server` binary and its integration
//! tests: everything below the acceptor loop itself.

pub mod cli;
pub mod client_registry;
pub mod error;
pub mod invitation;
pub mod player;
pub mod player_registry;
pub mod rating;
pub mod service;
pub mod session;

use std::sync::Arc;

use client_registry::ClientRegistry;
use game_core::Game;
use player_registry::PlayerRegistry;
use tokio::net::TcpListener;
use tokio::signal::unix::Signal;

/// Runs the accept loop against an already-bound listener until `hup`
/// fires, then returns the registry so the caller can drive the shutdown
/// choreography (cancel in-flight connections, wait for drain).
///
/// Split out from `main` so integration tests can bind an ephemeral port
/// and drive shutdown explicitly instead of sending a real signal.
pub async fn serve<G: Game + 'static>(
    listener: TcpListener,
    registry: Arc<ClientRegistry<G>>,
    mut hup: Signal,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _addr)) => {
                        let registry = registry.clone();
                        tokio::spawn(async move {
                            service::handle_connection(stream, registry).await;
                        });
                    }
                    Err(err) => {
                        tracing::warn!(%err, "failed to accept connection");
                    }
                }
            }
            _ = hup.recv() => {
                tracing::info!("HUP received, shutting down");
                break;
            }
        }
    }
}

pub fn new_registry<G: Game + 'static>() -> Arc<ClientRegistry<G>> {
    ClientRegistry::new(Arc::new(PlayerRegistry::new()))
}
