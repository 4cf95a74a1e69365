use std::time::Duration;

pub const COMM_ENDPOINT: u8 = 1;
pub const RECEIVER_BUFFER_SIZE: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommConfig {
    /// Endpoint number used for commands (OUT) and status (IN).
    pub endpoint: u8,

    /// Polling interval of the status transfer.
    pub interval: Duration,

    /// Upper bound on a single command transmission.
    pub write_timeout: Duration,

    pub receiver_buffer_size: usize,
}

impl Default for CommConfig {
    fn default() -> Self {
        Self {
            endpoint: COMM_ENDPOINT,
            interval: Duration::from_millis(1),
            write_timeout: Duration::from_secs(1),
            receiver_buffer_size: RECEIVER_BUFFER_SIZE,
        }
    }
}
