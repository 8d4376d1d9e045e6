//! Feed client entry point
//!
//! Run with:
//! ```bash
//! cargo run -p feed-client
//! ```
//!
//! Configuration is loaded from environment variables or a `.env` file.

use feed_common::{try_init_tracing_with_config, AppConfig, TracingConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = AppConfig::from_env();

    let tracing_config = match &config {
        Ok(config) => TracingConfig::for_environment(config.app.env),
        Err(_) => TracingConfig::default(),
    };
    if let Err(e) = try_init_tracing_with_config(&tracing_config) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", feed_client::setup_message(&e));
            error!(error = %e, "Configuration incomplete");
            std::process::exit(2);
        }
    };

    info!(
        env = ?config.app.env,
        mode = config.mode.name(),
        cache = config.cache.backend.name(),
        "Starting feed client"
    );

    if let Err(e) = feed_client::run(config).await {
        error!(error = %e, code = e.error_code(), "Feed client stopped");
        eprintln!("{e}");
        std::process::exit(e.exit_code());
    }
}
