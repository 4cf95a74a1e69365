use crate::commands::{CommandFrame, Request};
use crate::device::base::Transport;
use crate::error::TransportError;
use log::debug;
use std::sync::Arc;
use std::time::Duration;

pub struct TransferChannel {
    transport: Arc<dyn Transport>,
    endpoint: u8,
    timeout: Duration,
    sequence_id: u8,
}

impl TransferChannel {
    pub fn new(transport: Arc<dyn Transport>, endpoint: u8, timeout: Duration) -> Self {
        Self {
            transport,
            endpoint,
            timeout,
            sequence_id: 0,
        }
    }

    /// The id that will be stamped on the next frame.
    pub fn sequence_id(&self) -> u8 {
        self.sequence_id
    }

    pub fn write8(
        &mut self,
        request: Request,
        register: u8,
        value: u8,
    ) -> Result<(), TransportError> {
        self.write16(request, register, value, 0x00)
    }

    pub fn write16(
        &mut self,
        request: Request,
        register: u8,
        value_low: u8,
        value_high: u8,
    ) -> Result<(), TransportError> {
        let frame = CommandFrame::encode(self.sequence_id, request, register, value_low, value_high);

        // The id moves on per attempt, a failed send still consumes it.
        self.sequence_id = self.sequence_id.wrapping_add(1);

        self.send(&frame)
    }

    fn send(&self, frame: &CommandFrame) -> Result<(), TransportError> {
        let expected = frame.wire_length();
        let actual = self
            .transport
            .write_interrupt(self.endpoint, frame.as_bytes(), self.timeout)
            .inspect_err(|error| {
                debug!("Error sending frame {}: {}", frame.sequence_id(), error);
            })?;

        if actual != expected {
            debug!(
                "Short write for frame {}, Expected: {}, Sent: {}",
                frame.sequence_id(),
                expected,
                actual
            );
            return Err(TransportError::ShortWrite { expected, actual });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mock::MockTransport;

    fn channel(transport: &Arc<MockTransport>) -> TransferChannel {
        TransferChannel::new(transport.clone(), 1, Duration::from_secs(1))
    }

    #[test]
    fn write8_sends_a_single_frame() {
        let transport = MockTransport::new();
        let mut channel = channel(&transport);

        channel.write8(Request::Word, 0x10, 0x01).unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].endpoint, 1);
        assert_eq!(sent[0].timeout, Duration::from_secs(1));
        assert_eq!(sent[0].data, vec![0x01, 0x05, 0x02, 0x00, 0x10, 0x01, 0x00]);
    }

    #[test]
    fn write16_carries_the_high_byte() {
        let transport = MockTransport::new();
        let mut channel = channel(&transport);

        channel.write16(Request::Word, 0x22, 0x34, 0x12).unwrap();
        channel.write16(Request::Prefixed, 0x07, 0x03, 0xff).unwrap();

        let sent = transport.sent();
        assert_eq!(sent[0].data, vec![0x01, 0x05, 0x02, 0x00, 0x22, 0x34, 0x12]);
        assert_eq!(
            sent[1].data,
            vec![0x01, 0x0b, 0x12, 0x01, 0x00, 0x18, 0x05, 0x00, 0x01, 0x00, 0x9e, 0x07, 0x03]
        );
    }

    #[test]
    fn sequence_counts_calls() {
        let transport = MockTransport::new();
        let mut channel = channel(&transport);

        for k in 0..200u16 {
            assert_eq!(channel.sequence_id() as u16, k);
            channel.write8(Request::Byte20, 0x00, 0x00).unwrap();
        }
        assert_eq!(channel.sequence_id(), 200);
    }

    #[test]
    fn sequence_wraps_after_256_writes_even_when_sends_fail() {
        let transport = MockTransport::new();
        let mut channel = channel(&transport);

        for i in 0..256 {
            if i % 3 == 0 {
                transport.push_write_result(Err(rusb::Error::Timeout));
            }
            let _ = channel.write8(Request::Byte22, 0x01, 0x02);
        }
        assert_eq!(channel.sequence_id(), 0);

        let sent = transport.sent();
        assert_eq!(sent.len(), 256);
        for (i, frame) in sent.iter().enumerate() {
            assert_eq!(frame.data[3] as usize, i);
        }
    }

    #[test]
    fn transport_error_is_reported() {
        let transport = MockTransport::new();
        let mut channel = channel(&transport);

        transport.push_write_result(Err(rusb::Error::Timeout));
        let error = channel.write8(Request::Word, 0x10, 0x01).unwrap_err();
        assert_eq!(error, TransportError::Io(rusb::Error::Timeout));
        assert!(error.is_timeout());

        transport.push_write_result(Err(rusb::Error::NoDevice));
        let error = channel.write8(Request::Word, 0x10, 0x01).unwrap_err();
        assert!(!error.is_timeout());
        assert_eq!(channel.sequence_id(), 2);
    }

    #[test]
    fn short_write_is_not_retried() {
        let transport = MockTransport::new();
        let mut channel = channel(&transport);

        transport.push_write_result(Ok(4));
        let result = channel.write16(Request::Prefixed, 0x07, 0x03, 0x00);

        assert_eq!(
            result,
            Err(TransportError::ShortWrite {
                expected: 13,
                actual: 4
            })
        );
        assert_eq!(transport.sent().len(), 1);
    }
}
