use crate::device::base::{Transfer, Transport};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    pub endpoint: u8,
    pub data: Vec<u8>,
    pub timeout: Duration,
}

// An in-memory transport, completions only happen when a test calls `fire`.
#[derive(Default)]
pub struct MockTransport {
    sent: Mutex<Vec<SentFrame>>,
    write_results: Mutex<VecDeque<Result<usize, rusb::Error>>>,
    submit_errors: Mutex<VecDeque<rusb::Error>>,
    pending: Mutex<Option<Arc<Transfer>>>,
    submissions: AtomicUsize,
    completions: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues the result of the next blocking write, otherwise writes report the full length.
    pub fn push_write_result(&self, result: Result<usize, rusb::Error>) {
        self.write_results.lock().unwrap().push_back(result);
    }

    pub fn push_submit_error(&self, error: rusb::Error) {
        self.submit_errors.lock().unwrap().push_back(error);
    }

    pub fn sent(&self) -> Vec<SentFrame> {
        self.sent.lock().unwrap().clone()
    }

    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub fn completions(&self) -> usize {
        self.completions.load(Ordering::SeqCst)
    }

    pub fn pending(&self) -> Option<Arc<Transfer>> {
        self.pending.lock().unwrap().clone()
    }

    /// Completes the outstanding transfer as if the device had sent `data`. Returns false if
    /// nothing was armed.
    pub fn fire(&self, data: &[u8]) -> bool {
        let Some(transfer) = self.pending.lock().unwrap().take() else {
            return false;
        };

        let length = transfer.with_buffer(|buffer| {
            let length = data.len().min(buffer.len());
            buffer[..length].copy_from_slice(&data[..length]);
            length
        });
        transfer.set_result(Ok(length));
        self.completions.fetch_add(1, Ordering::SeqCst);
        transfer.complete();
        true
    }

    pub fn fail(&self, error: rusb::Error) -> bool {
        let Some(transfer) = self.pending.lock().unwrap().take() else {
            return false;
        };

        transfer.set_result(Err(error));
        self.completions.fetch_add(1, Ordering::SeqCst);
        transfer.complete();
        true
    }
}

impl Transport for MockTransport {
    fn submit(&self, transfer: Arc<Transfer>) -> Result<(), rusb::Error> {
        if transfer.is_cancelled() {
            return Err(rusb::Error::Interrupted);
        }
        if let Some(error) = self.submit_errors.lock().unwrap().pop_front() {
            return Err(error);
        }

        self.submissions.fetch_add(1, Ordering::SeqCst);
        *self.pending.lock().unwrap() = Some(transfer);
        Ok(())
    }

    fn write_interrupt(
        &self,
        endpoint: u8,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, rusb::Error> {
        self.sent.lock().unwrap().push(SentFrame {
            endpoint,
            data: data.to_vec(),
            timeout,
        });

        self.write_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(data.len()))
    }

    fn cancel_and_wait(&self, transfer: &Arc<Transfer>) {
        transfer.cancel();

        let in_flight = {
            let mut pending = self.pending.lock().unwrap();
            let is_current = pending
                .as_ref()
                .is_some_and(|current| Arc::ptr_eq(current, transfer));
            if is_current {
                pending.take()
            } else {
                None
            }
        };

        // A killed transfer still completes, once, with an error status.
        if let Some(transfer) = in_flight {
            transfer.set_result(Err(rusb::Error::Interrupted));
            self.completions.fetch_add(1, Ordering::SeqCst);
            transfer.complete();
        }
    }
}
