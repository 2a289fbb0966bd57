//! Primitives exchanged with the layer above (layer 2 / the layer 1 state
//! machine of the ISDN stack).
//!
//! Parameters carry the numeric codes of the layer 1 interface, so a stack
//! speaking raw codes can convert with `TryFrom<u32>`.

use std::fmt;

use crate::error::Error;

/// One D-channel frame, without flags and CRC.
pub type Frame = Vec<u8>;

/// Line signal parameters (`PH_SIGNAL`).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Signal {
    Info0,
    Info1,
    Info2,
    Info3P8,
    Info3P10,
    Info4P8,
    Info4P10,
    AnySignal,
}

impl Signal {
    const TABLE: [(Signal, u32); 8] = [
        (Signal::Info0,     0x8000),
        (Signal::Info1,     0x8100),
        (Signal::Info2,     0x8200),
        (Signal::Info3P8,   0x8308),
        (Signal::Info3P10,  0x830a),
        (Signal::Info4P8,   0x8408),
        (Signal::Info4P10,  0x840a),
        (Signal::AnySignal, 0x8900),
    ];

    pub fn code(&self) -> u32 {
        Self::TABLE.iter()
            .find(|(signal, _)| signal == self)
            .map(|&(_, code)| code)
            .unwrap_or_default()
    }
}

impl TryFrom<u32> for Signal {
    type Error = Error;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        Self::TABLE.iter()
            .find(|&&(_, c)| c == code)
            .map(|&(signal, _)| signal)
            .ok_or_else(|| Error::InvalidArgument(format!("signal {code:#06x}")))
    }
}

/// Hardware control parameters (`PH_CONTROL`).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Control {
    HwReset,
    PowerDown,
    PowerUp,
    Deactivate,
    Activate,
    /// B-channel loops towards the IOM interface.
    TestLoop { b1: bool, b2: bool },
}

const HW_TESTLOOP: u32 = 0xff00;

impl Control {
    pub fn code(&self) -> u32 {
        match *self {
            Control::HwReset    => 0x0000,
            Control::PowerDown  => 0x0100,
            Control::PowerUp    => 0x0200,
            Control::Deactivate => 0x0300,
            Control::Activate   => 0x0400,
            Control::TestLoop { b1, b2 } => HW_TESTLOOP | (b1 as u32) | ((b2 as u32) << 1),
        }
    }
}

impl TryFrom<u32> for Control {
    type Error = Error;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            0x0000 => Ok(Control::HwReset),
            0x0100 => Ok(Control::PowerDown),
            0x0200 => Ok(Control::PowerUp),
            0x0300 => Ok(Control::Deactivate),
            0x0400 => Ok(Control::Activate),
            c if c & !0x3 == HW_TESTLOOP => Ok(Control::TestLoop {
                b1: c & 1 != 0,
                b2: c & 2 != 0,
            }),
            c => Err(Error::InvalidArgument(format!("control {c:#06x}"))),
        }
    }
}

/// Work handed down by the upper layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Request {
    /// `PH_DATA | REQUEST`
    Data(Frame),
    /// `PH_SIGNAL | REQUEST`
    Signal(Signal),
    /// `PH_CONTROL | REQUEST`
    Control(Control),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MonitorEvent {
    /// Receive buffer could not be allocated or ran full. Reception on the
    /// channel has been switched off.
    ReceiveOverflow,
    /// The far end ended its message.
    ReceiveEnd,
    /// The declared number of bytes has been acknowledged by the far end.
    TransmitComplete,
    /// The far end aborted the transfer.
    TransmitEnd,
}

/// Notifications delivered to the upper layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Indication {
    /// `PH_DATA | INDICATION`: a complete, valid frame.
    Data(Frame),
    /// `PH_DATA | CONFIRM`: the frame has been handed to the transmitter.
    DataConfirm(Frame),
    /// `PH_SIGNAL | INDICATION`
    Signal(Signal),
    /// `PH_CONTROL | INDICATION`
    Control(Control),
    /// `PH_CONTROL | CONFIRM`
    ControlConfirm(Control),
    Monitor(usize, MonitorEvent),
}

impl fmt::Display for Indication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Indication::Data(frame) => write!(f, "PH_DATA_IND len {}", frame.len()),
            Indication::DataConfirm(frame) => write!(f, "PH_DATA_CNF len {}", frame.len()),
            Indication::Signal(s) => write!(f, "PH_SIGNAL_IND {:#06x}", s.code()),
            Indication::Control(c) => write!(f, "PH_CONTROL_IND {:#06x}", c.code()),
            Indication::ControlConfirm(c) => write!(f, "PH_CONTROL_CNF {:#06x}", c.code()),
            Indication::Monitor(channel, event) => write!(f, "MONITOR{channel} {event:?}"),
        }
    }
}
