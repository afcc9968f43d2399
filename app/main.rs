/// Leafscan browser app.
///
/// Serves the welcome, try-now and check screens over a synchronous
/// tiny_http server. Open the printed address, pick a leaf photo from the
/// camera or gallery, and run a detection against the configured model.
///
/// Run with:
///   leafscan-app --config leafscan.json

mod state;
mod render;
mod routes;
mod handlers;
mod util;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use clap::Parser;
use tiny_http::Server;
use tracing::{error, info};

use leafscan::{logging, Config};
use state::AppState;

#[derive(Parser, Debug)]
#[command(name = "leafscan-app")]
#[command(version, about = "Plant leaf disease checker in the browser", long_about = None)]
struct Args {
    /// JSON config file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the config.
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,

    /// Enable debug logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    logging::init(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let mut config = Config::load_or_default(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    let addr = config.bind_addr.clone();
    let server = Server::http(&addr).map_err(|e| anyhow!("failed to bind {}: {}", addr, e))?;
    info!(model = %config.model_path.display(), "open http://{} in your browser", addr);

    let shared_state = Arc::new(Mutex::new(AppState::new(config)));

    // One thread per request so a slow upload does not stall page loads.
    for request in server.incoming_requests() {
        let state_clone = shared_state.clone();
        std::thread::spawn(move || {
            routes::dispatch(request, state_clone);
        });
    }
    Ok(())
}
