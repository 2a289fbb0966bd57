//! HDLC frame transfer through the 32 byte FIFOs.

use std::collections::VecDeque;
use std::time::Instant;

use isac_pac::device::{Bus, FIFO_BURST_SIZE};
use isac_pac::register::CMDR;
use tracing::{trace, warn};

use crate::dchannel::Hardware;
use crate::error::Result;
use crate::event::Event;
use crate::primitive::Frame;

/// Longest D-channel frame handled in either direction.
pub const MAX_DFRAME_LEN_L1: usize = 300;

/// Frame being assembled from receive FIFO blocks.
pub(crate) struct ReceiveBuffer {
    pub(crate) data: Vec<u8>,
    /// The frame grew past `MAX_DFRAME_LEN_L1`. The rest of it is flushed
    /// and the frame is dropped at its end.
    pub(crate) overrun: bool,
}

impl ReceiveBuffer {
    fn allocate() -> Option<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(MAX_DFRAME_LEN_L1).ok()?;
        Some(Self {
            data,
            overrun: false,
        })
    }
}

/// Frame being fed to the transmit FIFO. `idx` is how much of it has been
/// written so far.
pub(crate) struct TransmitBuffer {
    data: Box<[u8; MAX_DFRAME_LEN_L1]>,
    pub(crate) len: usize,
    pub(crate) idx: usize,
}

impl TransmitBuffer {
    fn new() -> Self {
        Self {
            data: Box::new([0; MAX_DFRAME_LEN_L1]),
            len: 0,
            idx: 0,
        }
    }

    pub(crate) fn load(&mut self, frame: &[u8]) {
        assert!(frame.len() <= MAX_DFRAME_LEN_L1);
        self.data[..frame.len()].copy_from_slice(frame);
        self.len = frame.len();
        self.idx = 0;
    }

    pub(crate) fn remaining(&self) -> usize {
        self.len.saturating_sub(self.idx)
    }

    pub(crate) fn restart(&mut self) {
        self.idx = 0;
    }

    pub(crate) fn clear(&mut self) {
        self.len = 0;
        self.idx = 0;
    }
}

/// Frame handed down while the transmitter was busy.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) enum NextFrame {
    #[default]
    Empty,
    /// Waiting for the frame in flight to finish.
    Queued(Frame),
    /// Moved to the transmitter. Confirmed upward by the bottom half.
    Sent(Frame),
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorCounters {
    /// Frames lost to RDO (receive FIFO overflow).
    pub receive_overrun: u32,
    /// Frames with a bad CRC.
    pub crc: u32,
    /// Transmit FIFO ran dry mid frame (XDU).
    pub transmit_underrun: u32,
    /// Frames dropped for growing past `MAX_DFRAME_LEN_L1`.
    pub oversized: u32,
}

pub(crate) struct Transfer {
    pub(crate) rx: Option<ReceiveBuffer>,
    pub(crate) tx: TransmitBuffer,
    /// A frame is in flight.
    pub(crate) busy: bool,
    /// The busy timer found the transmitter still active: the D channel is
    /// occupied by another terminal.
    pub(crate) link_busy: bool,
    pub(crate) next: NextFrame,
    /// Complete frames waiting for the bottom half.
    pub(crate) queue: VecDeque<Frame>,
    pub(crate) errors: ErrorCounters,
}

impl Transfer {
    pub(crate) fn new() -> Self {
        Self {
            rx: None,
            tx: TransmitBuffer::new(),
            busy: false,
            link_busy: false,
            next: NextFrame::Empty,
            queue: VecDeque::new(),
            errors: ErrorCounters::default(),
        }
    }

    pub(crate) fn has_next(&self) -> bool {
        self.next != NextFrame::Empty
    }

    pub(crate) fn take_sent(&mut self) -> Option<Frame> {
        match std::mem::take(&mut self.next) {
            NextFrame::Sent(frame) => Some(frame),
            other => {
                self.next = other;
                None
            },
        }
    }
}

impl<B> Hardware<B>
where B: Bus,
{
    /// Give the current receive block back to the chip.
    pub(crate) fn release_receive_fifo(&self) -> Result<()> {
        self.isac.cmdr().set(CMDR::receive_message_complete())?;
        Ok(())
    }

    /// Move `count` bytes from the receive FIFO into the frame being
    /// assembled. A count of zero means a full block.
    pub(crate) fn drain_fifo(&mut self, count: usize) -> Result<()> {
        let count = if count == 0 { FIFO_BURST_SIZE } else { count };
        assert!(count <= FIFO_BURST_SIZE);

        let mut rx = match self.transfer.rx.take() {
            Some(rx) => rx,
            None => match ReceiveBuffer::allocate() {
                Some(rx) => rx,
                None => {
                    warn!("D receive out of memory");
                    return self.release_receive_fifo();
                },
            },
        };

        let result = self.drain_into(&mut rx, count);
        self.transfer.rx = Some(rx);
        result
    }

    fn drain_into(&self, rx: &mut ReceiveBuffer, count: usize) -> Result<()> {
        if rx.overrun {
            return self.release_receive_fifo();
        }

        let start = rx.data.len();
        if start + count >= MAX_DFRAME_LEN_L1 {
            warn!(length = start + count, "D receive frame overrun");
            rx.overrun = true;
            return self.release_receive_fifo();
        }

        rx.data.resize(start + count, 0);
        if let Err(e) = self.isac.fifo().read(&mut rx.data[start..]) {
            rx.data.truncate(start);
            return Err(e.into());
        }
        self.release_receive_fifo()?;

        trace!("D rx {:02x?}", &rx.data[start..]);
        Ok(())
    }

    /// Write the next block of the frame in flight and start it. Arms the
    /// busy timer.
    pub(crate) fn fill_fifo(&mut self) -> Result<()> {
        let remaining = self.transfer.tx.remaining();
        if remaining == 0 {
            return Ok(());
        }

        let (count, command) = if remaining > FIFO_BURST_SIZE {
            (FIFO_BURST_SIZE, CMDR::transmit_continue())
        } else {
            (remaining, CMDR::transmit_last())
        };

        let start = self.transfer.tx.idx;
        let chunk = &self.transfer.tx.data[start..start + count];
        self.isac.fifo().write(chunk)?;
        trace!("D tx {:02x?}", chunk);
        self.transfer.tx.idx += count;

        self.isac.cmdr().set(command)?;

        if self.timer.arm(Instant::now()) {
            warn!("D fill_fifo: busy timer was already running");
        }
        Ok(())
    }

    /// Move a queued frame to the transmitter. Returns whether there was one.
    pub(crate) fn promote_next(&mut self) -> Result<bool> {
        match std::mem::take(&mut self.transfer.next) {
            NextFrame::Queued(frame) => {
                self.transfer.tx.load(&frame);
                self.transfer.next = NextFrame::Sent(frame);
                self.events.schedule(Event::TransmitBufferReady);
                self.fill_fifo()?;
                Ok(true)
            },
            other => {
                self.transfer.next = other;
                Ok(false)
            },
        }
    }

    /// Drop the link busy condition, telling the bottom half about it.
    pub(crate) fn clear_link_busy(&mut self) {
        if self.transfer.link_busy {
            self.transfer.link_busy = false;
            self.events.schedule(Event::ClearBusy);
        }
    }
}
