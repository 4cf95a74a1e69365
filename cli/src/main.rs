use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};
use mytek_usb::config::CommConfig;
use mytek_usb::mytek::MytekChip;
use mytek_usb::{find_devices, open_device, LibUsbTransport, MytekDevice};
use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use crate::cli::{Cli, Commands, LevelFilter};

mod cli;

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    CombinedLogger::init(vec![TermLogger::new(
        match args.log_level {
            LevelFilter::Off => log::LevelFilter::Off,
            LevelFilter::Error => log::LevelFilter::Error,
            LevelFilter::Warn => log::LevelFilter::Warn,
            LevelFilter::Info => log::LevelFilter::Info,
            LevelFilter::Debug => log::LevelFilter::Debug,
            LevelFilter::Trace => log::LevelFilter::Trace,
        },
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )])
    .context("Could not configure the logger")?;

    if let Commands::List = args.command {
        let Some(vendor_id) = args.vendor_id else {
            bail!("--vendor-id is required to list devices");
        };
        let devices = find_devices(vendor_id, args.product_id);
        if devices.is_empty() {
            info!("No devices found");
        }
        for device in devices {
            println!(
                "Bus {:03} Device {:03}",
                device.bus_number(),
                device.address()
            );
        }
        return Ok(());
    }

    let device = locate_device(&args)?;
    let handle = open_device(device, args.interface)?;

    let config = CommConfig {
        write_timeout: Duration::from_millis(args.timeout_ms),
        ..CommConfig::default()
    };
    let mut chip = MytekChip::new(Arc::new(LibUsbTransport::new(handle)), config);
    chip.init_comm().context("Unable to start device communication")?;

    let result = run_command(&mut chip, &args.command);

    // Shut the receiver down in order, even if the command failed..
    chip.shutdown();
    chip.abort_comm();
    chip.destroy_comm();

    result
}

fn locate_device(args: &Cli) -> Result<MytekDevice> {
    if let (Some(bus), Some(address)) = (args.bus, args.address) {
        return Ok(MytekDevice::new(bus, address));
    }

    let Some(vendor_id) = args.vendor_id else {
        bail!("Either --vendor-id or --bus and --address must be provided");
    };

    let devices = find_devices(vendor_id, args.product_id);
    match devices.len() {
        0 => bail!("No device found with vendor id {:#06x}", vendor_id),
        1 => Ok(devices[0]),
        count => {
            warn!("Found {} matching devices, using the first", count);
            Ok(devices[0])
        }
    }
}

fn run_command(chip: &mut MytekChip, command: &Commands) -> Result<()> {
    let Some(comm) = chip.comm() else {
        bail!("Device communication isn't running");
    };

    match *command {
        Commands::List => {}
        Commands::Write8 {
            request,
            register,
            value,
        } => {
            comm.write8(request, register, value).with_context(|| {
                format!("Failed to send {} to register {:#04x}", request, register)
            })?;
            info!("Sent {} {:#04x} = {:#04x}", request, register, value);
        }
        Commands::Write16 {
            request,
            register,
            value_low,
            value_high,
        } => {
            comm.write16(request, register, value_low, value_high)
                .with_context(|| {
                    format!("Failed to send {} to register {:#04x}", request, register)
                })?;
            info!(
                "Sent {} {:#04x} = {:#04x} {:#04x}",
                request, register, value_low, value_high
            );
        }
        Commands::Listen { duration_ms } => {
            info!("Status receiver running for {}ms", duration_ms);
            sleep(Duration::from_millis(duration_ms));
        }
    }
    Ok(())
}
