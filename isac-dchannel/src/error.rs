use thiserror::Error;

use crate::primitive::Frame;

#[derive(Error, Debug)]
pub enum Error {
    /// A frame is already queued behind the one in flight. The rejected
    /// frame is handed back.
    #[error("transmit queue occupied")]
    Busy(Frame),
    #[error("frame of {} bytes exceeds the D-channel maximum", .0.len())]
    FrameTooLong(Frame),
    /// The first block never reached the chip. The transmitter is left idle
    /// and the frame is handed back.
    #[error("D frame of {} bytes not sent", .frame.len())]
    SendFailed {
        frame: Frame,
        #[source]
        source: isac_pac::device::Error,
    },
    #[error("monitor channel {0} transmit already in progress")]
    MonitorBusy(usize),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("hardware access lock poisoned")]
    LockPoisoned,
    #[error(transparent)]
    Bus(#[from] isac_pac::device::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
