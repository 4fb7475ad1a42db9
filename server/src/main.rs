use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use server::cli;

/// This server hosts exactly one game kind; swapping it is a one-line
/// change, not a runtime option (spec explicitly excludes multi-game
/// support).
type MatchGame = tic_tac_toe::TicTacToe;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{}=trace", env!("CARGO_CRATE_NAME")).into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true),
        )
        .init();

    let args = cli::Args::parse();

    let registry = server::new_registry::<MatchGame>();

    let listener = match TcpListener::bind(("0.0.0.0", args.port)).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(port = args.port, %err, "failed to bind listener");
            std::process::exit(1);
        }
    };
    tracing::info!(port = args.port, "listening");

    let hup_signal = signal(SignalKind::hangup()).expect("failed to register SIGHUP handler");

    // `serve` owns the listener, so it stops taking new connections the
    // moment it returns. From here: cancel every in-flight service loop,
    // then wait for the registry to drain before exiting.
    server::serve(listener, registry.clone(), hup_signal).await;

    registry.shutdown_all();
    registry.wait_for_empty().await;
    tracing::info!("shutdown complete");
}
