use crate::device::base::{MytekDevice, Transfer, Transport};
use crate::error::ConnectError;
use log::{debug, info, warn};
use rusb::{DeviceHandle, GlobalContext};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedSender};

// How long a single status read blocks before checking whether it's been cancelled, this is
// the upper bound on how long an abort can take.
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// The blocking read behind the receive poller.
trait InterruptReader: Send + Sync + 'static {
    fn read_interrupt(
        &self,
        endpoint: u8,
        buffer: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, rusb::Error>;
}

impl InterruptReader for DeviceHandle<GlobalContext> {
    fn read_interrupt(
        &self,
        endpoint: u8,
        buffer: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, rusb::Error> {
        DeviceHandle::read_interrupt(self, endpoint, buffer, timeout)
    }
}

struct PollerThread {
    sender: UnboundedSender<Arc<Transfer>>,
    thread: JoinHandle<()>,
}

// Services submitted transfers one at a time on a thread of its own. The thread is started on
// the first submission, and stopped again when a transfer is cancelled.
struct InterruptPoller<R: InterruptReader> {
    reader: Arc<R>,
    poll_timeout: Duration,
    thread: Mutex<Option<PollerThread>>,
    disconnected: Arc<AtomicBool>,
}

impl<R: InterruptReader> InterruptPoller<R> {
    fn new(reader: Arc<R>, poll_timeout: Duration) -> Self {
        Self {
            reader,
            poll_timeout,
            thread: Mutex::new(None),
            disconnected: Arc::new(AtomicBool::new(false)),
        }
    }

    fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::Acquire)
    }

    fn lock_thread(&self) -> MutexGuard<'_, Option<PollerThread>> {
        self.thread.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spawn(&self) -> Result<PollerThread, rusb::Error> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Arc<Transfer>>();
        let reader = self.reader.clone();
        let poll_timeout = self.poll_timeout;
        let disconnected = self.disconnected.clone();

        let thread = thread::Builder::new()
            .name("mytek-comm-receiver".to_string())
            .spawn(move || {
                let mut failed = false;
                while let Some(transfer) = receiver.blocking_recv() {
                    if failed && !transfer.is_cancelled() {
                        thread::sleep(transfer.interval());
                    }
                    failed =
                        poll_transfer(reader.as_ref(), poll_timeout, &disconnected, &transfer);
                }
                debug!("Comm receiver thread stopped");
            })
            .map_err(|error| {
                warn!("Unable to spawn the comm receiver thread: {}", error);
                rusb::Error::NoMem
            })?;

        Ok(PollerThread { sender, thread })
    }

    fn submit(&self, transfer: Arc<Transfer>) -> Result<(), rusb::Error> {
        if self.is_disconnected() {
            return Err(rusb::Error::NoDevice);
        }

        let mut poller = self.lock_thread();

        // This has to be checked under the lock, cancel_and_wait flags first then takes it.
        if transfer.is_cancelled() {
            return Err(rusb::Error::Interrupted);
        }

        if poller.is_none() {
            *poller = Some(self.spawn()?);
        }

        match poller.as_ref() {
            Some(poller) => poller
                .sender
                .send(transfer)
                .map_err(|_| rusb::Error::Interrupted),
            None => Err(rusb::Error::Other),
        }
    }

    fn cancel_and_wait(&self, transfer: &Arc<Transfer>) {
        transfer.cancel();

        let Some(poller) = self.lock_thread().take() else {
            return;
        };

        // Dropping the sender lets the thread drain what's queued and exit.
        drop(poller.sender);

        if poller.thread.thread().id() == thread::current().id() {
            warn!("Attempted to cancel the comm receiver from its own completion handler");
            return;
        }

        if poller.thread.join().is_err() {
            warn!("Comm receiver thread panicked during shutdown");
        }
    }
}

// Reads until the device sends something, fails, or the transfer is cancelled. A cancelled
// transfer still completes, once, with an Interrupted status. Returns true if the read failed.
fn poll_transfer<R: InterruptReader + ?Sized>(
    reader: &R,
    poll_timeout: Duration,
    disconnected: &AtomicBool,
    transfer: &Arc<Transfer>,
) -> bool {
    let mut failed = false;

    loop {
        if transfer.is_cancelled() {
            transfer.set_result(Err(rusb::Error::Interrupted));
            break;
        }

        let address = transfer.address();
        let result =
            transfer.with_buffer(|buffer| reader.read_interrupt(address, buffer, poll_timeout));

        match result {
            Err(rusb::Error::Timeout) => continue,
            Err(rusb::Error::NoDevice) => {
                debug!("Device has gone away, refusing further submissions");
                disconnected.store(true, Ordering::Release);
                transfer.set_result(Err(rusb::Error::NoDevice));
                break;
            }
            Err(error) => {
                debug!("Status read from {:#04x} failed: {}", address, error);
                transfer.set_result(Err(error));
                failed = true;
                break;
            }
            Ok(length) => {
                transfer.set_result(Ok(length));
                break;
            }
        }
    }

    transfer.complete();
    failed
}

pub struct LibUsbTransport {
    handle: Arc<DeviceHandle<GlobalContext>>,
    poller: InterruptPoller<DeviceHandle<GlobalContext>>,
}

impl LibUsbTransport {
    pub fn new(handle: DeviceHandle<GlobalContext>) -> Self {
        let handle = Arc::new(handle);
        Self {
            poller: InterruptPoller::new(handle.clone(), POLL_TIMEOUT),
            handle,
        }
    }

    pub fn handle(&self) -> &DeviceHandle<GlobalContext> {
        &self.handle
    }
}

impl Transport for LibUsbTransport {
    fn submit(&self, transfer: Arc<Transfer>) -> Result<(), rusb::Error> {
        self.poller.submit(transfer)
    }

    fn write_interrupt(
        &self,
        endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, rusb::Error> {
        self.handle.write_interrupt(endpoint, data, timeout)
    }

    fn cancel_and_wait(&self, transfer: &Arc<Transfer>) {
        self.poller.cancel_and_wait(transfer);
    }
}

pub fn find_devices(vendor_id: u16, product_id: Option<u16>) -> Vec<MytekDevice> {
    let mut found_devices: Vec<MytekDevice> = Vec::new();

    if let Ok(devices) = rusb::devices() {
        for device in devices.iter() {
            if let Ok(descriptor) = device.device_descriptor() {
                if descriptor.vendor_id() == vendor_id
                    && product_id.is_none_or(|product_id| descriptor.product_id() == product_id)
                {
                    found_devices.push(MytekDevice {
                        bus_number: device.bus_number(),
                        address: device.address(),
                    });
                }
            }
        }
    }

    found_devices
}

pub fn open_device(
    device: MytekDevice,
    interface: Option<u8>,
) -> Result<DeviceHandle<GlobalContext>, ConnectError> {
    let devices = rusb::devices()?;
    let usb_device = devices
        .iter()
        .find(|usb_device| {
            usb_device.bus_number() == device.bus_number && usb_device.address() == device.address
        })
        .ok_or(ConnectError::DeviceNotFound)?;

    let handle = usb_device.open()?;
    info!("Connected to possible Mytek device at {:?}", usb_device);

    // The sound driver normally owns the audio interfaces, so only claim when asked to.
    if let Some(interface) = interface {
        if let Err(error) = handle.set_auto_detach_kernel_driver(true) {
            debug!("Kernel driver auto-detach unavailable: {}", error);
        }
        if handle.claim_interface(interface).is_err() {
            return Err(ConnectError::DeviceNotClaimed(interface));
        }
    }

    Ok(handle)
}
