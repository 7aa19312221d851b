//! Sluice Demo - Entry point

use std::path::PathBuf;

use tracing::{error, info};

use sluice_config::{ConfigLoader, SluiceConfig};
use sluice_demo::{DemoApp, DemoResult, ENV_PREFIX, VERSION};
use sluice_server::ShutdownSignal;
use sluice_telemetry::{init_logging, LogConfig};

/// Command-line arguments.
struct Args {
    /// Path to configuration file.
    config: Option<PathBuf>,
    /// Start from the development preset.
    dev: bool,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut config = None;
        let mut dev = false;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    config = args.next().map(PathBuf::from);
                }
                "--dev" => dev = true,
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("sluice-demo {VERSION}");
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    eprintln!("Use --help for usage information");
                    std::process::exit(1);
                }
            }
        }

        Self { config, dev }
    }
}

fn print_help() {
    println!(
        r"Sluice Demo - request pipeline demo service

USAGE:
    sluice-demo [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Path to configuration file (TOML or JSON)
        --dev              Start from the development preset
    -h, --help             Print help information
    -v, --version          Print version information

ENVIRONMENT VARIABLES:
    SLUICE__SERVER__HTTP_ADDR          Bind address (default: 0.0.0.0:8080)
    SLUICE__THROTTLE__LIMIT            Managed calls per window (default: 2)
    SLUICE__THROTTLE__WINDOW_MS        Throttle window (default: 3000)
    SLUICE__API_KEY__KEYS              Comma-separated accepted keys (default: 12345)
    SLUICE__DISPATCH__THREADS          Dispatch pool size (default: 2 x cores)
    SLUICE__LOGGING__FORMAT            json or pretty (default: json)
    RUST_LOG                           Log filter, overrides the configured level

A .env file in the working directory is read before the environment.
"
    );
}

fn load_config(args: &Args) -> DemoResult<SluiceConfig> {
    let mut loader = ConfigLoader::new();
    if args.dev {
        loader = loader.with_development();
    }
    if let Some(path) = &args.config {
        loader = loader.with_file(path)?;
    }
    Ok(loader.with_dotenv()?.with_env_prefix(ENV_PREFIX).load()?)
}

async fn run(config: SluiceConfig) -> DemoResult<()> {
    let app = DemoApp::new(config)?;
    app.run(ShutdownSignal::with_os_signals()).await
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logging(&LogConfig::from(&config.logging)) {
        eprintln!("Failed to initialize logging: {e}");
        std::process::exit(1);
    }

    info!("Starting Sluice demo v{}", VERSION);

    if let Err(e) = run(config).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }

    info!("Sluice demo stopped");
}
