//! rover-io daemon entry point
//!
//! Loads the TOML configuration, initializes the devices and runs the
//! acquisition tasks until SIGINT or SIGTERM.

use rover_io::app::RoverApp;
use rover_io::config::AppConfig;
use std::env;
use std::process;

/// Configuration path on the rover image
const DEFAULT_CONFIG_PATH: &str = "/etc/rover-io/config.toml";

/// Parse config path from command line arguments.
///
/// Supports:
/// - `rover-io <path>` (positional)
/// - `rover-io --config <path>` (flag-based)
/// - `rover-io -c <path>` (short flag)
fn parse_config_path() -> String {
    let args: Vec<String> = env::args().collect();

    // Look for --config or -c flag
    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }

    // Fall back to first positional argument (if it doesn't start with -)
    if args.len() > 1 && !args[1].starts_with('-') {
        return args[1].clone();
    }

    DEFAULT_CONFIG_PATH.to_string()
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("rover-io v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = parse_config_path();
    log::info!("Using config: {}", config_path);
    let config = match AppConfig::from_file(&config_path) {
        Ok(config) => config,
        Err(e) => {
            log::warn!("{}; using defaults", e);
            AppConfig::default()
        }
    };

    let mut app = match RoverApp::new(config) {
        Ok(app) => app,
        Err(e) => {
            log::error!("Initialization failed: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = app.run() {
        log::error!("{}", e);
        process::exit(1);
    }

    log::info!("rover-io stopped");
}
