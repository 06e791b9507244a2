//! Opcodes of the client/server query protocol
//!
//! The directory does not speak this protocol; the hosting server exposes
//! directory state over it. Opcodes travel as big-endian `u16`.


use std::fmt;

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Opcode {
    Hello = 0x5e00,
    Ping = 0x0001,
    Error = 0x0002,
    Ack = 0x0003,
    Kill = 0x0004,
    Killed = 0x0005,
    Query = 0x0006,
    QueryResult = 0x0007,
    QueryContinue = 0x0008,
    QueryProgress = 0x0009,
    Ready = 0x0010,
}

impl Opcode {
    /// Shares the wire value of `QueryContinue`; the two cannot be told apart
    pub const QUERY_DISCARD: Opcode = Opcode::QueryContinue;

    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn to_be_bytes(self) -> [u8; 2] {
        self.code().to_be_bytes()
    }

    pub fn from_be_bytes(bytes: [u8; 2]) -> Result<Self, Error> {
        Self::try_from(u16::from_be_bytes(bytes))
    }
}

impl TryFrom<u16> for Opcode {
    type Error = Error;

    fn try_from(code: u16) -> Result<Self, Error> {
        let opcode = match code {
            0x5e00 => Opcode::Hello,
            0x0001 => Opcode::Ping,
            0x0002 => Opcode::Error,
            0x0003 => Opcode::Ack,
            0x0004 => Opcode::Kill,
            0x0005 => Opcode::Killed,
            0x0006 => Opcode::Query,
            0x0007 => Opcode::QueryResult,
            0x0008 => Opcode::QueryContinue,
            0x0009 => Opcode::QueryProgress,
            0x0010 => Opcode::Ready,
            other => return Err(Error::InvalidArgument(format!("unknown opcode {other:#06x}"))),
        };
        Ok(opcode)
    }
}

impl From<Opcode> for u16 {
    fn from(opcode: Opcode) -> Self {
        opcode.code()
    }
}

impl fmt::Display for Opcode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{self:?}({:#06x})", self.code())
    }
}
