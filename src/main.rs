//! Connector binary.
//!
//! ```bash
//! # Read every node
//! zwave-connector -r -1 -1
//!
//! # Read nodes 2, 3 and 4
//! zwave-connector --config zwave.json --snapshot network.json -r 2 5
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgGroup, Parser};
use tracing::{error, info};

use zwave_connector::{
    CancelToken, Command, ConfiguredPublisher, ConnectorConfig, Error, NetworkController, Result,
    SimulatedController, acquisition, logging,
};

/// Z-Wave sensor connector
#[derive(Parser, Debug)]
#[command(name = "zwave-connector")]
#[command(author, version, about, long_about = None, allow_negative_numbers = true)]
#[command(group(ArgGroup::new("mode").required(true).args(["read", "write"])))]
struct Cli {
    /// Read sensor values from nodes [START, END)
    #[arg(short, long)]
    read: bool,

    /// Write actuator values (not implemented)
    #[arg(short, long)]
    write: bool,

    /// First node id, or -1 for all nodes
    #[arg(allow_negative_numbers = true)]
    start: i64,

    /// Node id after the last one, or -1 for all nodes
    #[arg(allow_negative_numbers = true)]
    end: i64,

    /// Path to configuration file
    #[arg(short, long, default_value = "zwave.json")]
    config: PathBuf,

    /// Network snapshot served by the simulated controller
    #[arg(short, long, default_value = "network.json")]
    snapshot: PathBuf,

    /// Log level, overrides the configuration file
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    const fn command(&self) -> Command {
        if self.write {
            Command::Write
        } else {
            Command::Read {
                start: self.start,
                end: self.end,
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match prepare(&cli).await {
        Ok(config) => config,
        Err(e) => {
            let _ = logging::init("info", None);
            error!("{}", e);
            return ExitCode::from(e.exit_code());
        }
    };

    if let Err(e) = logging::init(&config.log_level, config.log_file.as_deref()) {
        eprintln!("{e}");
        return ExitCode::from(e.exit_code());
    }

    match run(&cli, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

/// Rejects unsupported commands, then loads the configuration.
async fn prepare(cli: &Cli) -> Result<ConnectorConfig> {
    if cli.command() == Command::Write {
        return Err(Error::NotImplemented("write"));
    }

    let mut config = ConnectorConfig::load(&cli.config).await?;
    if let Some(level) = &cli.log_level {
        config.log_level.clone_from(level);
        config.validate("--log-level")?;
    }
    Ok(config)
}

async fn run(cli: &Cli, config: &ConnectorConfig) -> Result<()> {
    let command = cli.command();
    let driver = SimulatedController::from_file(&cli.snapshot).await?;
    let mut controller = NetworkController::with_policy(driver, config.wait_policy());
    let mut publisher = ConfiguredPublisher::from_config(config)?;

    let (handle, mut cancel) = CancelToken::pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, cancelling");
            handle.cancel();
        }
    });

    let report =
        acquisition::execute(&mut controller, config, command, &mut publisher, &mut cancel)
            .await?;
    info!(
        "visited {} nodes: {} emitted, {} skipped, {} failed",
        report.visited.len(),
        report.emitted.len(),
        report.skipped.len(),
        report.failed.len()
    );
    Ok(())
}
