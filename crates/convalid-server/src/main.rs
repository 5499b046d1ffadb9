use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::{info, warn};

use convalid_core::{config::Config, DateRange};
use convalid_server::state::AppState;

/// `convalid health` - liveness probe for Docker HEALTHCHECK.
///
/// Calls `GET http://localhost:$CONVALID_PORT/health`.
/// Exits 0 if the server responds with HTTP 200, exits 1 otherwise.
fn run_health_check() -> ! {
    let port = std::env::var("CONVALID_PORT").unwrap_or_else(|_| "3000".to_string());
    let url = format!("http://localhost:{}/health", port);
    match ureq::get(&url).call() {
        Ok(resp) if resp.status() == 200 => std::process::exit(0),
        _ => std::process::exit(1),
    }
}

fn init_logging(to_stderr: bool) -> Result<()> {
    let filter =
        tracing_subscriber::EnvFilter::from_default_env().add_directive("convalid=info".parse()?);
    let builder = tracing_subscriber::fmt().with_env_filter(filter).json();
    if to_stderr {
        builder.with_writer(std::io::stderr).init();
    } else {
        builder.init();
    }
    Ok(())
}

/// `convalid validate [customer_id] [start_date] [end_date]` - one-shot
/// comparison; prints the insights, one per line.
async fn run_validate(state: &AppState, args: &[String]) -> Result<()> {
    let customer_id = state
        .customer_id(args.first().map(String::as_str))
        .ok_or_else(|| anyhow!("customer_id is required (or set GOOGLE_ADS_CUSTOMER_ID)"))?;
    let range = DateRange::parse(
        args.get(1).map(String::as_str),
        args.get(2).map(String::as_str),
        state.today(),
    )?;

    let result = state.comparator.compare(&customer_id, range).await;
    for line in &result.insights {
        println!("{line}");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str);
    if command == Some("health") {
        run_health_check();
    }

    // Keep stdout clean for the insight lines in CLI mode.
    init_logging(command == Some("validate"))?;

    let cfg = Config::from_env().map_err(|e| anyhow!(e))?;
    let state = Arc::new(AppState::from_config(cfg.clone())?);

    if state.enabled_sources().is_empty() {
        warn!("No conversion sources configured. Set GOOGLE_ADS_*, GA4_* or POSTHOG_* credentials.");
    }

    if command == Some("validate") {
        return run_validate(&state, &args[2..]).await;
    }

    let addr = format!("0.0.0.0:{}", cfg.port);
    let app = convalid_server::app::build_app(Arc::clone(&state));

    info!(
        port = cfg.port,
        timezone = %cfg.timezone,
        fetch_timeout_secs = cfg.fetch_timeout_secs,
        "convalid listening on {}",
        addr
    );

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    Ok(())
}
