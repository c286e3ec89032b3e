use std::collections::VecDeque;
use std::convert::Infallible;

use embedded_hal_nb::serial::{ErrorType, Read};
use servo_bus_codec::{
    Answer, Command, Decode, Encode, MessageIn, MessageOut, Query, RingRx, control, send_message,
};

/// Collects transmitted bytes, standing in for a UART tx.
#[derive(Debug, Default)]
struct TxBuffer(Vec<u8>);

impl embedded_io::ErrorType for TxBuffer {
    type Error = Infallible;
}

impl embedded_io::Write for TxBuffer {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.0.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Hands previously captured bytes back out, standing in for a UART rx.
#[derive(Debug)]
struct ReadBuffer(VecDeque<u8>);

impl ReadBuffer {
    fn from_iter(data: impl Iterator<Item = u8>) -> ReadBuffer {
        ReadBuffer(VecDeque::from_iter(data))
    }
}

impl ErrorType for ReadBuffer {
    type Error = Infallible;
}

impl Read for ReadBuffer {
    fn read(&mut self) -> nb::Result<u8, Self::Error> {
        self.0.pop_front().ok_or(nb::Error::WouldBlock)
    }
}

fn main() {
    // Host side: a burst of queries for the servo at id 3.
    let queries = [
        Query::Control { id: 3, value: 100 },
        Query::Control {
            id: 3,
            value: control::HOLD,
        },
        Query::Info { id: 3 },
        Query::Write {
            id: 3,
            index: 20,
            value: 123_456,
        },
        Query::Read { id: 3, index: 20 },
    ];

    let mut uart = TxBuffer::default();
    let mut out = MessageOut::new();
    for q in &queries {
        q.encode(&mut out).unwrap();
        send_message(&mut uart, &out).unwrap();
    }
    // A line hit: clobber one byte in the middle of the burst.
    uart.0[9] ^= 0x04;
    println!("wire carries {} bytes (one corrupted)", uart.0.len());

    // Device side: the intake runs independently, the scan loop walks it.
    let mut port = ReadBuffer::from_iter(uart.0.into_iter());
    let mut ring: RingRx<64> = RingRx::new();
    ring.fill(&mut port).unwrap();

    while ring.sync() {
        let mut msg = ring.reader();
        let cmd = msg.cmd();
        let len = cmd.query_len();
        if len == 0 {
            // reserved code: not really a frame start, skip the byte
            ring.consume(1);
            continue;
        }
        if ring.available() < len {
            break; // rest of the frame is still in flight
        }
        match Query::decode(&mut msg) {
            Ok(query) => {
                println!("accepted {query:?}");
                reply(cmd);
                ring.consume(len);
            }
            Err(reject) => {
                println!("rejected frame at {}: {reject:?}", ring.start());
                ring.consume(1);
            }
        }
    }
}

/// Encode the answer a device would send back, then decode it as the host
/// would, length keyed off the command the host is waiting on.
fn reply(cmd: Command) {
    let answer = match cmd {
        Command::Control => Answer::Control {
            angle: 1200,
            moment: -40,
        },
        Command::Info => Answer::Info {
            values: [1946, 1, 3],
        },
        Command::Write => Answer::Write { value: 123_456 },
        Command::Read => Answer::Read { value: 123_456 },
        _ => return,
    };
    let mut out = MessageOut::new();
    answer.encode(&mut out).unwrap();

    let mut back = MessageIn::new(out.as_bytes(), 0);
    let decoded = Answer::decode(cmd, &mut back).unwrap();
    println!("  answered {decoded:?}");
}
