#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum FrameError {
    #[error("Unknown request id: {0:#04x}")]
    UnknownRequest(u8),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum TransportError {
    #[error("USB error: {0}")]
    Io(#[from] rusb::Error),

    #[error("Short write to device, expected {expected} bytes, sent {actual}")]
    ShortWrite { expected: usize, actual: usize },
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Io(rusb::Error::Timeout))
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum InitError {
    #[error("Unable to allocate the receive buffer")]
    OutOfMemory,

    #[error("Unable to submit the receive transfer: {0}")]
    SubmissionFailed(rusb::Error),

    #[error("Communication has already been initialised for this device")]
    AlreadyInitialised,
}

#[derive(thiserror::Error, Debug)]
pub enum ConnectError {
    #[error("No Mytek device was found")]
    DeviceNotFound,

    #[error("USB error: {0}")]
    UsbError(#[from] rusb::Error),

    #[error("Unable to Claim Interface {0}")]
    DeviceNotClaimed(u8),
}
