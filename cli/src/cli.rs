use clap::{Parser, Subcommand, ValueEnum};
use mytek_usb::commands::Request;

#[derive(Parser, Debug)]
#[clap(about, version, author)]
pub struct Cli {
    /// Minimum log level to print out
    #[clap(long, value_enum, default_value = "info")]
    pub log_level: LevelFilter,

    /// USB Vendor ID of the DAC (decimal or 0x prefixed hex)
    #[clap(long, value_parser = parse_u16)]
    pub vendor_id: Option<u16>,

    /// USB Product ID of the DAC, used to narrow down the device search
    #[clap(long, value_parser = parse_u16)]
    pub product_id: Option<u16>,

    /// Bus number of the device, used with --address instead of searching by ID
    #[clap(long, requires = "address")]
    pub bus: Option<u8>,

    /// Address of the device on its bus
    #[clap(long, requires = "bus")]
    pub address: Option<u8>,

    /// Interface to claim before communicating, leave unset if the sound driver is bound
    #[clap(long)]
    pub interface: Option<u8>,

    /// Timeout for a single command write, in milliseconds
    #[clap(long, default_value = "1000")]
    pub timeout_ms: u64,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List devices matching --vendor-id / --product-id
    List,

    /// Send a command with a single value byte
    Write8 {
        #[clap(value_parser = parse_request)]
        request: Request,
        #[clap(value_parser = parse_u8)]
        register: u8,
        #[clap(value_parser = parse_u8)]
        value: u8,
    },

    /// Send a command with a low and a high value byte
    Write16 {
        #[clap(value_parser = parse_request)]
        request: Request,
        #[clap(value_parser = parse_u8)]
        register: u8,
        #[clap(value_parser = parse_u8)]
        value_low: u8,
        #[clap(value_parser = parse_u8)]
        value_high: u8,
    },

    /// Keep the status receiver running for a while, then tear it down
    Listen {
        #[clap(long, default_value = "5000")]
        duration_ms: u64,
    },
}

#[repr(usize)]
#[derive(ValueEnum, Copy, Clone, Eq, PartialEq, Debug)]
pub enum LevelFilter {
    /// A level lower than all log levels.
    Off,
    /// Corresponds to the `Error` log level.
    Error,
    /// Corresponds to the `Warn` log level.
    Warn,
    /// Corresponds to the `Info` log level.
    Info,
    /// Corresponds to the `Debug` log level.
    Debug,
    /// Corresponds to the `Trace` log level.
    Trace,
}

fn parse_u16(value: &str) -> Result<u16, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| format!("Invalid value '{}': {}", value, e))
}

fn parse_u8(value: &str) -> Result<u8, String> {
    let parsed = parse_u16(value)?;
    u8::try_from(parsed).map_err(|_| format!("Value '{}' doesn't fit in a byte", value))
}

fn parse_request(value: &str) -> Result<Request, String> {
    Request::try_from(parse_u8(value)?).map_err(|e| e.to_string())
}
