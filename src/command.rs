use bilge::prelude::*;

use crate::pack::{MessageOut, PackError};
use crate::unpack::MessageIn;
use crate::{Decode, Encode};

/// Framing marker: bit 7 of every byte on the wire. Clear on a frame's first
/// byte, set on every continuation byte.
pub const FRAME_MARK: u8 = 0x80;

/// The seven data bits of a byte.
pub const DATA_MASK: u8 = 0x7f;

pub const fn is_frame_start(byte: u8) -> bool {
    byte & FRAME_MARK == 0
}

/// Power-on default device id.
pub const DEFAULT_ID: u8 = 0;

/// Broadcast id reserved for firmware update; the flash query header byte
/// comes out as 0x7f.
pub const FLASH_ID: u8 = 15;

/// Command codes. 2..=4 are reserved and map to `Reserved`.
#[bitsize(3)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBits)]
pub enum Command {
    Control = 0,
    Info = 1,
    Write = 5,
    Read = 6,
    Flash = 7,
    #[fallback]
    Reserved = 2,
}

/// Header byte of a device-addressed query: marker 0, command in bits 6:4,
/// device id in bits 3:0.
#[bitsize(8)]
#[derive(DebugBits, Clone, Copy, FromBits)]
pub struct QueryHeader {
    pub id: u4,
    pub cmd: Command,
    pub marker: u1,
}

/// Total query frame length per command code, checksum included. A zero
/// entry means the code is unused and a scanner must treat it as desync.
/// This table is the only way a delimiter-free stream reveals frame ends.
pub const QUERY_LENGTHS: [usize; 8] = [5, 2, 0, 0, 0, 9, 5, 12];

/// Total answer frame length per command code, checksum included. Answers
/// carry no header byte, so the receiver keys the length off the query it
/// sent.
pub const ANSWER_LENGTHS: [usize; 8] = [6, 8, 0, 0, 0, 6, 6, 7];

impl Command {
    pub const fn query_len(self) -> usize {
        QUERY_LENGTHS[self as usize]
    }

    pub const fn answer_len(self) -> usize {
        ANSWER_LENGTHS[self as usize]
    }
}

/// Flash answer status: no error.
pub const FLASH_OK: u8 = 0;
/// Flash answer status: switching into update mode failed.
pub const FLASH_ERR_SWITCH: u8 = 1;
/// Flash answer status: memory erase failed.
pub const FLASH_ERR_ERASE: u8 = 2;
/// Flash answer status: programming failed at the reported address.
pub const FLASH_ERR_ADDRESS: u8 = 100;

/// Reserved control values.
///
/// The usable actuation range does not cover the full i16 span, so a band at
/// the positive extreme carries out-of-band requests instead of a target
/// value. The codec moves these as plain integers; what a device does with
/// them is firmware's business.
pub mod control {
    /// Drive output released.
    pub const FREE: i16 = 32767;
    /// Hold the current position.
    pub const HOLD: i16 = 32766;
    /// Hold the current position but yield to external force.
    pub const SOFT_HOLD: i16 = 32765;
    /// No value set.
    pub const UNSET: i16 = 32764;
    /// Latch the current position as zero.
    pub const SET_ZERO: i16 = 32763;
    /// Release the zero-position latch.
    pub const ZERO_UNLOCK: i16 = 32762;
    /// Enable zero-point adjustment.
    pub const ZERO_POINT_UNLOCK: i16 = 32761;
    /// Disable zero-point adjustment.
    pub const ZERO_POINT_LOCK: i16 = 32760;
    /// Restore the factory zero angle and range.
    pub const ZERO_POINT_FACTORY: i16 = 32759;
    /// Set the zero angle relative to the factory zero.
    pub const ZERO_POINT_SET_NULL: i16 = 32758;
    /// Set the lower travel limit relative to zero.
    pub const ZERO_POINT_SET_BEGIN: i16 = 32757;
    /// Set the upper travel limit relative to zero.
    pub const ZERO_POINT_SET_END: i16 = 32756;

    /// Smallest reserved value; everything below is an ordinary target.
    pub const SENTINEL_MIN: i16 = ZERO_POINT_SET_END;

    pub const fn is_sentinel(value: i16) -> bool {
        value >= SENTINEL_MIN
    }
}

#[derive(Debug)]
pub enum DecodeError {
    /// Logical byte 0 has its marker bit set; the origin is mid-frame.
    NotFrameStart { byte: u8 },
    /// The length table has no entry for this code.
    UnknownCommand { code: u8 },
    CrcMismatch,
}

/// A device-addressed query, one variant per command. Encoding and decoding
/// these variants is the single statement of each command's field layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    Control { id: u8, value: i16 },
    Info { id: u8 },
    Write { id: u8, index: u16, value: i32 },
    Read { id: u8, index: u16 },
    Flash { id: u8, addr: u32, word: u32 },
}

impl Query {
    pub const fn command(&self) -> Command {
        match self {
            Query::Control { .. } => Command::Control,
            Query::Info { .. } => Command::Info,
            Query::Write { .. } => Command::Write,
            Query::Read { .. } => Command::Read,
            Query::Flash { .. } => Command::Flash,
        }
    }
}

impl Encode for Query {
    type Error = PackError;

    fn encode(&self, out: &mut MessageOut) -> Result<(), Self::Error> {
        match *self {
            Query::Control { id, value } => out.make_query_control(id, value),
            Query::Info { id } => out.make_query_info(id),
            Query::Write { id, index, value } => out.make_query_write(id, index, value),
            Query::Read { id, index } => out.make_query_read(id, index),
            Query::Flash { id, addr, word } => out.make_query_flash(id, addr, word),
        }
    }
}

impl<'a> Decode<'a> for Query {
    type Error = DecodeError;

    fn decode(src: &mut MessageIn<'a>) -> Result<Self, Self::Error> {
        let head = src.peek(0);
        if !is_frame_start(head) {
            return Err(DecodeError::NotFrameStart { byte: head });
        }
        let cmd = src.cmd();
        if cmd.query_len() == 0 {
            return Err(DecodeError::UnknownCommand {
                code: (head >> 4) & 0x07,
            });
        }
        if !src.check_crc(cmd.query_len()) {
            return Err(DecodeError::CrcMismatch);
        }
        let id = src.id();
        // payload starts on the byte after the header
        src.seek(1);
        let query = match cmd {
            Command::Control => Query::Control {
                id,
                value: src.get_i16(),
            },
            Command::Info => Query::Info { id },
            Command::Write => Query::Write {
                id,
                index: src.get_u16(),
                value: src.get_i32(),
            },
            Command::Read => Query::Read {
                id,
                index: src.get_u16(),
            },
            Command::Flash => Query::Flash {
                id,
                addr: src.get_u32(),
                word: src.get_u32(),
            },
            Command::Reserved => {
                return Err(DecodeError::UnknownCommand {
                    code: (head >> 4) & 0x07,
                });
            }
        };
        Ok(query)
    }
}

/// An answer frame. Answers have no header byte; the first payload field
/// lands on logical byte 0 and the receiver supplies the command it is
/// waiting on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Answer {
    Control { angle: i16, moment: i16 },
    Info { values: [i16; 3] },
    Write { value: i32 },
    Read { value: i32 },
    Flash { status: u8, value: u32 },
}

impl Answer {
    pub fn decode(cmd: Command, src: &mut MessageIn<'_>) -> Result<Self, DecodeError> {
        let head = src.peek(0);
        if !is_frame_start(head) {
            return Err(DecodeError::NotFrameStart { byte: head });
        }
        let len = cmd.answer_len();
        if len == 0 {
            return Err(DecodeError::UnknownCommand { code: cmd as u8 });
        }
        if !src.check_crc(len) {
            return Err(DecodeError::CrcMismatch);
        }
        src.seek(0);
        let answer = match cmd {
            Command::Control => Answer::Control {
                angle: src.get_i16(),
                moment: src.get_i16(),
            },
            Command::Info => Answer::Info {
                values: [src.get_i16(), src.get_i16(), src.get_i16()],
            },
            Command::Write => Answer::Write {
                value: src.get_i32(),
            },
            Command::Read => Answer::Read {
                value: src.get_i32(),
            },
            Command::Flash => Answer::Flash {
                status: src.get_u8(),
                value: src.get_u32(),
            },
            Command::Reserved => {
                return Err(DecodeError::UnknownCommand { code: cmd as u8 });
            }
        };
        Ok(answer)
    }
}

impl Encode for Answer {
    type Error = PackError;

    fn encode(&self, out: &mut MessageOut) -> Result<(), Self::Error> {
        match *self {
            Answer::Control { angle, moment } => out.make_answer_control(angle, moment),
            Answer::Info { values } => out.make_answer_info(values[0], values[1], values[2]),
            Answer::Write { value } => out.make_answer_write(value),
            Answer::Read { value } => out.make_answer_read(value),
            Answer::Flash { status, value } => out.make_answer_flash(status, value),
        }
    }
}
