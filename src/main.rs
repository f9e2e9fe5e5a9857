use std::path::{Path, PathBuf};

use anyhow::Result;
use cellsense::{
    config,
    pull::{sense_once, PullSensor, SensorContext},
    sensors::PhoneRadioSensor,
};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run sense cycles and print each batch as a JSON line
    Scan {
        #[arg(short = 'n', long, default_value_t = 1)]
        cycles: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = match cli.config.as_deref() {
        Some(x) => x,
        None => Path::new("config.toml"),
    };
    let config = config::load(path)?;

    let directive = config.log.as_deref().unwrap_or("info");
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let context = SensorContext::current(config.platform.into_context(), config.sensor);

    match cli.command {
        Command::Scan { cycles } => {
            let sensor = PhoneRadioSensor::get(&context)?;
            for i in 0..cycles {
                if i != 0 {
                    let sleep = sensor.base().sensor_config().post_sense_sleep_length();
                    info!("sleeping {sleep:?} before next cycle");
                    tokio::time::sleep(sleep).await;
                }
                let batch = sense_once(&sensor).await?;
                println!("{}", serde_json::to_string(&*batch)?);
            }
        }
    };

    Ok(())
}
