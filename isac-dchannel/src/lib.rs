//! D-channel layer 1 control for the ISAC-S.
//!
//! [`DChannel`] owns the chip and moves HDLC frames between the upper layer
//! and the FIFOs, follows the layer 1 state reported over the C/I channel
//! and drives the two IOM-2 monitor channels. Card glue supplies the
//! register access ([`isac_pac::device::Bus`]), calls
//! [`DChannel::poll_interrupt`] or [`DChannel::interrupt`] from its
//! interrupt path and [`DChannel::bottom_half`] afterwards. Indications
//! arrive on the channel passed to [`DChannel::attach`].

mod command;
mod dchannel;
mod event;
mod fifo;
mod interrupt;
mod monitor;

pub mod config;
pub mod error;
pub mod primitive;
pub mod state;
pub mod timer;

#[cfg(test)]
mod mock;

pub use config::{Config, InterfaceMode};
pub use dchannel::{DChannel, Status};
pub use error::{Error, Result};
pub use fifo::{ErrorCounters, MAX_DFRAME_LEN_L1};
pub use monitor::MAX_MON_FRAME;
pub use primitive::{Control, Frame, Indication, MonitorEvent, Request, Signal};
pub use state::LineState;
pub use timer::{BusyTimerThread, TimerOutcome};
