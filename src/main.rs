use clap::Parser;
use std::sync::Arc;

use warden::config::{AppState, Config, DEFAULT_CONFIG_PATH};
use warden::control::{self, Controller};
use warden::{logger, server};

#[derive(Debug, Parser)]
#[command(name = "warden", version, about = "Static file server with IP and host access control")]
struct Args {
    /// Configuration file, created with defaults when missing
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Do not read control commands from stdin
    #[arg(long)]
    no_console: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let cfg = Config::load_from(&args.config)?;
    logger::init(&cfg)?;

    let state = AppState::new(cfg, &args.config)?;
    match state.config_store.save_if_missing() {
        Ok(true) => logger::info(&format!("Created default configuration at {}", args.config)),
        Ok(false) => {}
        Err(e) => logger::warning(&format!("Could not write {}: {e}", args.config)),
    }

    // Worker thread count comes from the configuration
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = state.config.server.workers {
        runtime_builder.worker_threads(workers.max(1));
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(Arc::new(state), args.no_console))
}

async fn async_main(
    state: Arc<AppState>,
    no_console: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = state.config.get_socket_addr()?;
    let listener = server::create_listener(addr)?;
    logger::log_server_start(&addr, &state.config);

    if !no_console {
        control::spawn_console(Controller::new(
            Arc::clone(&state.security),
            Arc::clone(&state.access),
        ));
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            logger::severe(&format!("Failed to listen for Ctrl+C: {e}"));
            std::future::pending::<()>().await;
        }
    };
    server::serve(listener, &state, shutdown).await?;
    Ok(())
}
