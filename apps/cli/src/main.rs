mod device;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use denki_core::codec::{DeviceFamily, DeviceProfile, HachiNi, Omx27};
use denki_core::session::SessionConfig;
use denki_core::state::HandleResult;
use denki_core::transport::list_ports;
use serde::Serialize;
use tracing::{error, info};

use device::Device;

#[derive(Parser, Debug)]
#[command(author, version, about = "8x2 / OMX-27 config tool", long_about = None)]
struct Args {
    /// Session config file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Device family: 8x2 or omx-27
    #[arg(long)]
    family: Option<DeviceFamily>,

    /// MIDI port name substring (overrides the family default)
    #[arg(long)]
    port: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List MIDI input and output ports
    Ports,
    /// Request the device config and print it
    Dump {
        #[arg(long, default_value_t = 2000)]
        timeout_ms: u64,
    },
    /// Switch the device to a bank and print its config
    Bank {
        bank: u8,
        #[arg(long, default_value_t = 2000)]
        timeout_ms: u64,
    },
    /// Log device traffic until interrupted
    Monitor,
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {e}");
    }

    if let Err(e) = run(args) {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::load_from_file(path)?,
        None => SessionConfig::default(),
    };
    if let Some(family) = args.family {
        config.family = family;
    }
    if let Some(port) = args.port {
        config.port_name = Some(port);
    }
    config.validate()?;

    match config.family {
        DeviceFamily::HachiNi => run_command(HachiNi, config, args.command),
        DeviceFamily::Omx27 => run_command(Omx27, config, args.command),
    }
}

fn run_command<P>(profile: P, mut config: SessionConfig, command: Command) -> Result<()>
where
    P: DeviceProfile,
    P::Config: Serialize,
{
    match command {
        Command::Ports => {
            let (inputs, outputs) = list_ports()?;
            println!("Inputs:");
            for name in inputs {
                println!("  {name}");
            }
            println!("Outputs:");
            for name in outputs {
                println!("  {name}");
            }
            Ok(())
        }
        Command::Dump { timeout_ms } => {
            info!(family = %config.family, port = %config.port_pattern(), "Requesting config");
            let mut device = Device::open(profile, config)?;
            device.wait_for(Duration::from_millis(timeout_ms), |session, _| {
                session.is_connected()
            })?;
            print_current(&device)?;
            device.close();
            Ok(())
        }
        Command::Bank { bank, timeout_ms } => {
            let banks = config.family.banks();
            if !(1..=banks).contains(&bank) {
                return Err(anyhow!("bank {bank} outside 1..={banks}"));
            }
            let mut device = Device::open(profile, config)?;
            device.session.select_bank(bank)?;
            device.wait_for(Duration::from_millis(timeout_ms), |_, result| {
                matches!(result, HandleResult::ConfigCached { bank: b } if b.get() == bank)
            })?;
            print_current(&device)?;
            device.close();
            Ok(())
        }
        Command::Monitor => {
            config.log_packets = true;
            info!(family = %config.family, port = %config.port_pattern(), "Monitoring");
            let mut device = Device::open(profile, config)?;
            device.run()?;
            device.close();
            Ok(())
        }
    }
}

fn print_current<P>(device: &Device<P>) -> Result<()>
where
    P: DeviceProfile,
    P::Config: Serialize,
{
    let config = device
        .session
        .current_config()
        .ok_or_else(|| anyhow!("no config received"))?;
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
