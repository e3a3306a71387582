use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use leak_lab::driver::{DEFAULT_SERVER_URL, Driver, HttpLeakApi, default_plan};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "leak-driver")]
#[command(about = "Replays leak scenarios against a running leak-lab server", long_about = None)]
struct Cli {
    /// Base URL of the server
    #[arg(long, env = "LEAK_LAB_URL", default_value = DEFAULT_SERVER_URL)]
    server_url: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the built-in leak timeline (default)
    Plan,
    /// Call one scenario repeatedly
    Run {
        /// One of: root, leak, snap, snap-gc, list, create
        scenario: String,
        #[arg(short, long, default_value_t = 1)]
        times: u32,
        /// Seconds to wait after each call
        #[arg(short, long, default_value_t = 1)]
        delay: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let driver = Driver::new(HttpLeakApi::new(cli.server_url.as_str()));
    info!(server = %cli.server_url, "driver started");

    match cli.command.unwrap_or(Commands::Plan) {
        Commands::Plan => {
            let results = driver.run_plan(&default_plan()).await;
            let skipped = results.iter().filter(|result| result.is_err()).count();
            if skipped > 0 {
                warn!(skipped, "some plan steps were skipped");
            }
        }
        Commands::Run {
            scenario,
            times,
            delay,
        } => {
            // unknown scenarios are already logged by the driver
            let _ = driver
                .run_scenario(&scenario, times, Duration::from_secs(delay))
                .await;
        }
    }

    Ok(())
}
