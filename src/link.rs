use embedded_hal_nb::serial::Read;

use crate::command::is_frame_start;
use crate::pack::MessageOut;
use crate::unpack::MessageIn;

/// Write a finished frame to the transport. No framing is added here; the
/// marker bits already delimit the frame on the wire.
pub fn send_message<W: embedded_io::Write>(tx: &mut W, msg: &MessageOut) -> Result<(), W::Error> {
    log::trace!("tx frame, {} bytes", msg.len());
    tx.write_all(msg.as_bytes())
}

/// Fixed-capacity circular receive buffer with a validity window.
///
/// Stands in for the hardware intake on hosts that poll a UART instead:
/// `fill` drains the port into the ring, and `sync`/`reader`/`consume` give
/// a scan loop the same buffer-region-plus-window contract a free-running
/// hardware engine provides. The scan policy itself (lengths, dispatch,
/// retry) stays with the caller.
#[derive(Debug)]
pub struct RingRx<const N: usize> {
    buf: [u8; N],
    write: usize,
    start: usize,
    avail: usize,
}

impl<const N: usize> RingRx<N> {
    pub const fn new() -> Self {
        RingRx {
            buf: [0; N],
            write: 0,
            start: 0,
            avail: 0,
        }
    }

    /// Valid bytes between the scan origin and the producer's write point.
    pub fn available(&self) -> usize {
        self.avail
    }

    /// Physical index of the scan origin.
    pub fn start(&self) -> usize {
        self.start
    }

    pub fn push(&mut self, byte: u8) {
        self.buf[self.write] = byte;
        self.write = (self.write + 1) % N;
        if self.avail == N {
            // the producer lapped the scanner; the oldest byte is gone
            log::warn!("rx ring overrun, oldest byte dropped");
            self.start = self.write;
        } else {
            self.avail += 1;
        }
    }

    /// Drain the port until it would block. Returns how many bytes came in.
    pub fn fill<R: Read>(&mut self, rx: &mut R) -> Result<usize, R::Error> {
        let mut taken = 0;
        loop {
            match rx.read() {
                Ok(byte) => {
                    self.push(byte);
                    taken += 1;
                }
                Err(nb::Error::WouldBlock) => return Ok(taken),
                Err(nb::Error::Other(e)) => return Err(e),
            }
        }
    }

    /// Advance the origin past continuation bytes to the next byte whose
    /// marker reads frame-start. Returns whether one is now at the origin.
    ///
    /// A rejected frame's own first byte is a frame start; drop it with
    /// `consume(1)` before calling this again.
    pub fn sync(&mut self) -> bool {
        let mut skipped = 0usize;
        while self.avail > 0 && !is_frame_start(self.buf[self.start]) {
            self.start = (self.start + 1) % N;
            self.avail -= 1;
            skipped += 1;
        }
        if skipped > 0 {
            log::debug!("resync skipped {skipped} continuation bytes");
        }
        self.avail > 0
    }

    /// Release `n` logical bytes after a decode.
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.avail);
        self.start = (self.start + n) % N;
        self.avail -= n;
    }

    /// Decoder view over the ring at the current origin.
    pub fn reader(&self) -> MessageIn<'_> {
        MessageIn::new(&self.buf, self.start)
    }
}

impl<const N: usize> Default for RingRx<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Command, FRAME_MARK};
    use crate::{Decode, Query};
    use core::convert::Infallible;
    use embedded_hal_nb::serial::ErrorType;

    /// Non-blocking port that hands out a canned byte sequence.
    struct SlicePort<'a> {
        data: &'a [u8],
        pos: usize,
    }

    impl<'a> SlicePort<'a> {
        fn new(data: &'a [u8]) -> Self {
            SlicePort { data, pos: 0 }
        }
    }

    impl ErrorType for SlicePort<'_> {
        type Error = Infallible;
    }

    impl Read for SlicePort<'_> {
        fn read(&mut self) -> nb::Result<u8, Self::Error> {
            match self.data.get(self.pos) {
                Some(&byte) => {
                    self.pos += 1;
                    Ok(byte)
                }
                None => Err(nb::Error::WouldBlock),
            }
        }
    }

    #[test]
    fn fill_drains_the_port_until_it_blocks() {
        let mut port = SlicePort::new(&[1, 2, 3]);
        let mut ring = RingRx::<8>::new();
        assert_eq!(ring.fill(&mut port), Ok(3));
        assert_eq!(ring.available(), 3);
        assert_eq!(ring.fill(&mut port), Ok(0));
    }

    #[test]
    fn sync_skips_mid_frame_garbage() {
        let mut ring = RingRx::<8>::new();
        for b in [FRAME_MARK | 0x11, FRAME_MARK | 0x22, 0x03, FRAME_MARK] {
            ring.push(b);
        }
        assert!(ring.sync());
        assert_eq!(ring.available(), 2);
        assert_eq!(ring.reader().peek(0), 0x03);
    }

    #[test]
    fn sync_reports_an_empty_window() {
        let mut ring = RingRx::<4>::new();
        ring.push(FRAME_MARK | 0x7f);
        assert!(!ring.sync());
        assert_eq!(ring.available(), 0);
    }

    #[test]
    fn overrun_drops_the_oldest_bytes() {
        let mut ring = RingRx::<4>::new();
        for b in 0..6u8 {
            ring.push(b);
        }
        assert_eq!(ring.available(), 4);
        let msg = ring.reader();
        assert_eq!(msg.peek(0), 2);
        assert_eq!(msg.peek(3), 5);
    }

    #[test]
    fn frames_flow_end_to_end_through_the_ring() {
        let mut out = MessageOut::new();
        out.make_query_write(5, 20, 123_456).unwrap();

        // preceded by stray continuation bytes from a lost frame tail
        let mut wire = [0u8; 16];
        wire[0] = FRAME_MARK | 0x05;
        wire[1] = FRAME_MARK | 0x50;
        wire[2..11].copy_from_slice(out.as_bytes());
        let mut port = SlicePort::new(&wire[..11]);

        let mut ring = RingRx::<16>::new();
        ring.fill(&mut port).unwrap();
        assert!(ring.sync());

        let mut msg = ring.reader();
        let cmd = msg.cmd();
        assert_eq!(cmd, Command::Write);
        assert!(ring.available() >= cmd.query_len());
        let q = Query::decode(&mut msg).unwrap();
        assert_eq!(
            q,
            Query::Write {
                id: 5,
                index: 20,
                value: 123_456
            }
        );
        ring.consume(cmd.query_len());
        assert_eq!(ring.available(), 0);
    }

    #[test]
    fn send_message_writes_the_exact_frame() {
        let mut out = MessageOut::new();
        out.make_query_info(4).unwrap();
        let mut buf = [0u8; 8];
        let mut dst: &mut [u8] = &mut buf;
        send_message(&mut dst, &out).unwrap();
        assert_eq!(&buf[..2], out.as_bytes());
    }
}
