use crate::device::base::{Transfer, Transport};
use crate::error::InitError;
use log::warn;
use rusb::Direction;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Set once when the owning device is going away, the receiver stops re-arming after it
/// observes this.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ReceiverState {
    Armed,
    Quiesced,
}

pub struct ReceiveContext {
    transport: Arc<dyn Transport>,
    transfer: Arc<Transfer>,
    state: ReceiverState,
}

impl ReceiveContext {
    /// Allocates the receive buffer, and submits the first transfer. Nothing is returned
    /// unless the transfer was accepted.
    pub fn arm(
        transport: Arc<dyn Transport>,
        shutdown: ShutdownFlag,
        endpoint: u8,
        interval: Duration,
        buffer_size: usize,
    ) -> Result<Self, InitError> {
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(buffer_size)
            .map_err(|_| InitError::OutOfMemory)?;
        buffer.resize(buffer_size, 0);

        let handler_transport = transport.clone();
        let transfer = Arc::new(Transfer::new(
            Direction::In,
            endpoint,
            interval,
            buffer,
            Box::new(move |transfer: &Arc<Transfer>| {
                receiver_handler(handler_transport.as_ref(), &shutdown, transfer)
            }),
        ));

        transport
            .submit(transfer.clone())
            .map_err(InitError::SubmissionFailed)?;

        Ok(Self {
            transport,
            transfer,
            state: ReceiverState::Armed,
        })
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    /// Blocks until the transport guarantees the completion handler won't be called again.
    pub fn abort(&mut self) {
        if self.state == ReceiverState::Quiesced {
            return;
        }

        self.transport.cancel_and_wait(&self.transfer);
        self.state = ReceiverState::Quiesced;
    }
}

// Runs on the transport's completion context, so this must never block. The received data
// is drained and dropped, it's not needed by anything.
fn receiver_handler(
    transport: &dyn Transport,
    shutdown: &ShutdownFlag,
    transfer: &Arc<Transfer>,
) {
    if shutdown.is_set() {
        return;
    }

    transfer.reset();
    if let Err(error) = transport.submit(transfer.clone()) {
        warn!("comm data receiver aborted: {}", error);
    }
}
