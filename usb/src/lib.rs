pub use rusb;
pub mod channel;
pub mod commands;
pub mod config;
pub mod device;
pub mod error;
pub mod mytek;
pub mod receiver;

pub use device::base::{MytekDevice, Transfer, Transport};
pub use device::libusb::device::{find_devices, open_device, LibUsbTransport};
