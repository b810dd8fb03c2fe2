use clap::Parser;
use dentistry_gateway::config::Args;
use dentistry_gateway::{build_app, error, telemetry};
use std::error::Error;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    telemetry::init();

    // parse cli arguments
    let args = Args::parse();
    args.validate()?;
    error::expose_internal_errors(args.environment.is_development());

    let (app, state) = build_app(&args)?;

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(%addr, environment = args.environment.as_str(), "gateway running");
    info!(
        max_body_bytes = args.max_body_bytes,
        batch_size = args.analytics_batch_size,
        flush_delay_ms = args.analytics_flush_delay_ms,
        "limits"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await?;

    // last chance for queued analytics
    if let Some(queue) = state.analytics.queue() {
        let report = queue.flush().await;
        info!(delivered = report.delivered, dropped = report.dropped, "final analytics flush");
    }
    Ok(())
}
