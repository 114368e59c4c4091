use anyhow::Result;
use std::sync::Arc;
use tablescout::{analysis::Analyzer, config::Config, server};
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) config + logging ─────────────────────────────────────────
    let cfg = Config::from_env();
    fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(cfg.log_level.parse().unwrap_or(Level::INFO.into())),
        )
        .init();
    info!("starting table analysis service");

    // ─── 2) shared analyzer ──────────────────────────────────────────
    let analyzer = Arc::new(Analyzer::from_config(&cfg)?);
    let routes = server::routes(analyzer);

    // ─── 3) serve until ctrl-c ───────────────────────────────────────
    let (addr, serving) =
        warp::serve(routes).bind_with_graceful_shutdown((cfg.bind_addr, cfg.port), async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        });

    info!("Server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);
    info!("Analysis endpoint: POST http://{}/api/", addr);

    serving.await;
    info!("all done");
    Ok(())
}
