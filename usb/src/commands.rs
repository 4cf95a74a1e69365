use crate::error::FrameError;
use strum::{Display, EnumIter};

pub const FRAME_MARKER: u8 = 0x01;

// The 0x12 request is the longest one the device knows about..
pub const MAX_FRAME_LENGTH: usize = 13;

// Fixed header carried by every 0x12 request ahead of the register / value pair.
const PREFIXED_HEADER: [u8; 7] = [0x00, 0x18, 0x05, 0x00, 0x01, 0x00, 0x9e];

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum Request {
    Word,
    Prefixed,
    Byte20,
    Byte21,
    Byte22,
}

impl Request {
    pub fn id(&self) -> u8 {
        match self {
            Request::Word => 0x02,
            Request::Prefixed => 0x12,
            Request::Byte20 => 0x20,
            Request::Byte21 => 0x21,
            Request::Byte22 => 0x22,
        }
    }

    /// The value of the length byte, which counts from the request byte to the end of the
    /// payload (so the marker and the length byte itself are excluded).
    pub fn declared_length(&self) -> u8 {
        match self {
            Request::Word => 0x05,
            Request::Prefixed => 0x0b,
            Request::Byte20 | Request::Byte21 | Request::Byte22 => 0x04,
        }
    }
}

impl TryFrom<u8> for Request {
    type Error = FrameError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x02 => Ok(Request::Word),
            0x12 => Ok(Request::Prefixed),
            0x20 => Ok(Request::Byte20),
            0x21 => Ok(Request::Byte21),
            0x22 => Ok(Request::Byte22),
            other => Err(FrameError::UnknownRequest(other)),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CommandFrame {
    data: [u8; MAX_FRAME_LENGTH],
}

impl CommandFrame {
    pub fn encode(
        sequence_id: u8,
        request: Request,
        register: u8,
        value_low: u8,
        value_high: u8,
    ) -> Self {
        let mut data = [0; MAX_FRAME_LENGTH];
        data[0] = FRAME_MARKER;
        data[1] = request.declared_length();
        data[2] = request.id();
        data[3] = sequence_id;

        match request {
            Request::Word => {
                data[4] = register;
                data[5] = value_low;
                data[6] = value_high;
            }
            Request::Prefixed => {
                data[4..11].copy_from_slice(&PREFIXED_HEADER);
                data[11] = register;
                data[12] = value_low;
            }
            Request::Byte20 | Request::Byte21 | Request::Byte22 => {
                data[4] = register;
                data[5] = value_low;
            }
        }

        Self { data }
    }

    pub fn declared_length(&self) -> u8 {
        self.data[1]
    }

    /// Total number of bytes that go on the wire.
    pub fn wire_length(&self) -> usize {
        self.declared_length() as usize + 2
    }

    pub fn sequence_id(&self) -> u8 {
        self.data[3]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.wire_length()]
    }
}
