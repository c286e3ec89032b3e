#![no_std]

mod checksum;
mod command;
mod link;
mod pack;
mod unpack;

/// Builds itself into an outgoing frame.
pub trait Encode {
    type Error;

    fn encode(&self, out: &mut MessageOut) -> Result<(), Self::Error>;
}

/// Reads itself out of a positioned decoder view.
pub trait Decode<'a>
where
    Self: Sized,
{
    type Error;

    fn decode(src: &mut MessageIn<'a>) -> Result<Self, Self::Error>;
}

pub use checksum::checksum;
pub use command::{
    ANSWER_LENGTHS, Answer, Command, DATA_MASK, DEFAULT_ID, DecodeError, FLASH_ERR_ADDRESS,
    FLASH_ERR_ERASE, FLASH_ERR_SWITCH, FLASH_ID, FLASH_OK, FRAME_MARK, QUERY_LENGTHS, Query,
    QueryHeader, control, is_frame_start,
};
pub use link::{RingRx, send_message};
pub use pack::{MessageOut, OUT_CAPACITY, PackError};
pub use unpack::MessageIn;
