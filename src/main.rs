use clap::Parser;
use tracing_subscriber::EnvFilter;

use rrc_drive_runtime::config::{DriveConfig, MOTOR_PORT};
use rrc_drive_runtime::motor::transport::DEFAULT_BAUDRATE;
use rrc_drive_runtime::runtime::{self, RunOptions};

/// Drive a two-wheeled base on the RRC board from zenoh velocity commands
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Serial port of the controller board
    #[arg(long, default_value = MOTOR_PORT)]
    port: String,

    #[arg(long, default_value_t = DEFAULT_BAUDRATE)]
    baud: u32,

    /// JSON file overriding wiring and tuning defaults
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Run without the motor board
    #[arg(long)]
    simulate: bool,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init(); // installs the subscriber globally

    let args = Args::parse();

    let drive = match args.config.as_deref().map(|path| DriveConfig::from_json_file(path)) {
        Some(Ok(config)) => config,
        Some(Err(e)) => {
            eprintln!("Config error: {}", e);
            std::process::exit(2);
        }
        None => DriveConfig::default(),
    };

    let options = RunOptions {
        port: args.port,
        baudrate: args.baud,
        drive,
        simulate: args.simulate,
    };

    if let Err(e) = runtime::run(options).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
