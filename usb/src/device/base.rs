use rusb::Direction;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const ENDPOINT_IN: u8 = 0x80;

pub type CompletionHandler = Box<dyn Fn(&Arc<Transfer>) + Send + Sync>;

// This is the interface to whatever is actually moving bytes to and from the device.
pub trait Transport: Send + Sync {
    /// Queues an asynchronous transfer. Once the transfer completes (successfully or not) the
    /// transport records the outcome on it, and calls its completion handler from the
    /// transport's own context.
    fn submit(&self, transfer: Arc<Transfer>) -> Result<(), rusb::Error>;

    /// Performs a blocking interrupt OUT transfer, returning the number of bytes written.
    fn write_interrupt(
        &self,
        endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, rusb::Error>;

    /// Cancels the transfer, and blocks until its completion handler can no longer be called.
    /// Any later submission of that transfer is rejected, other transfers can still be submitted.
    fn cancel_and_wait(&self, transfer: &Arc<Transfer>);
}

#[derive(Debug)]
struct TransferState {
    buffer: Vec<u8>,
    status: Option<rusb::Error>,
}

// A reusable transfer descriptor, the buffer stays attached for the life of the transfer.
pub struct Transfer {
    direction: Direction,
    endpoint: u8,
    interval: Duration,
    state: Mutex<TransferState>,
    actual_length: AtomicUsize,
    cancelled: AtomicBool,
    handler: CompletionHandler,
}

impl Transfer {
    pub fn new(
        direction: Direction,
        endpoint: u8,
        interval: Duration,
        buffer: Vec<u8>,
        handler: CompletionHandler,
    ) -> Self {
        Self {
            direction,
            endpoint,
            interval,
            state: Mutex::new(TransferState {
                buffer,
                status: None,
            }),
            actual_length: AtomicUsize::new(0),
            cancelled: AtomicBool::new(false),
            handler,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn endpoint(&self) -> u8 {
        self.endpoint
    }

    /// The endpoint number with the direction bit applied, as libusb expects it.
    pub fn address(&self) -> u8 {
        match self.direction {
            Direction::In => self.endpoint | ENDPOINT_IN,
            Direction::Out => self.endpoint,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn buffer_len(&self) -> usize {
        self.lock().buffer.len()
    }

    pub fn status(&self) -> Option<rusb::Error> {
        self.lock().status
    }

    pub fn actual_length(&self) -> usize {
        self.actual_length.load(Ordering::Acquire)
    }

    /// Gives the transport access to the transfer buffer.
    pub fn with_buffer<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> R {
        f(&mut self.lock().buffer)
    }

    /// Records the outcome of a transfer, called by the transport prior to completion.
    pub fn set_result(&self, result: Result<usize, rusb::Error>) {
        let mut state = self.lock();
        match result {
            Ok(length) => {
                state.status = None;
                self.actual_length.store(length, Ordering::Release);
            }
            Err(error) => {
                state.status = Some(error);
                self.actual_length.store(0, Ordering::Release);
            }
        }
    }

    /// Flags the transfer as killed, transports refuse to submit it from here on.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.set_result(Ok(0));
    }

    pub fn complete(self: &Arc<Self>) {
        (self.handler)(self);
    }

    fn lock(&self) -> MutexGuard<'_, TransferState> {
        // The state has no invariants a panicking holder could break..
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transfer")
            .field("direction", &self.direction)
            .field("endpoint", &self.endpoint)
            .field("interval", &self.interval)
            .field("status", &self.status())
            .field("actual_length", &self.actual_length())
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MytekDevice {
    pub(crate) bus_number: u8,
    pub(crate) address: u8,
}

impl MytekDevice {
    pub fn new(bus_number: u8, address: u8) -> Self {
        Self {
            bus_number,
            address,
        }
    }

    pub fn bus_number(&self) -> u8 {
        self.bus_number
    }

    pub fn address(&self) -> u8 {
        self.address
    }
}
