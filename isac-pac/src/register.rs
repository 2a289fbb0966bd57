#![allow(non_snake_case)]
#![allow(non_camel_case_types)]
#![allow(clippy::upper_case_acronyms)]

use modular_bitfield_msb::prelude::*;

///////////////////////////////////////////////////////////////////////
// HDLC controller

/// Interrupt Status Register (ISTA) - 0x20 (read)
///
/// * RME: Receive Message End
///   One complete frame of length less than or equal to the defined block
///   size (32 bytes) or the last part of a frame of length greater than
///   the block size has been received. The contents are available in the
///   receive FIFO. The message length and additional information may be
///   obtained from RBCH, RBCL and RSTA.
/// * RPF: Receive Pool Full
///   A data block of 32 bytes is stored in the receive FIFO. The frame has
///   not yet been completely received.
/// * RSC: Receive Status Change
///   Only used in auto mode. Never expected here.
/// * XPR: Transmit Pool Ready
///   A data block of up to 32 bytes can be written to the transmit FIFO.
/// * TIN: Timer Interrupt
/// * CISQ: C/I or S/Q channel change
///   A change in C/I channel 0 or C/I channel 1 has been recognized. The
///   actual value can be read from CIR0 or CIR1.
/// * SIN: Synchronous Transfer Interrupt
///   Never enabled here.
/// * EXI: Extended Interrupt
///   The cause is indicated in EXIR.
///
#[bitfield(bits=8)]
#[repr(u8)]
#[derive(Copy, Clone, Debug)]
pub struct ISTA {
    pub RME: B1,
    pub RPF: B1,
    pub RSC: B1,
    pub XPR: B1,
    pub TIN: B1,
    pub CISQ: B1,
    pub SIN: B1,
    pub EXI: B1,
}

/// Mask Register (MASK) - 0x20 (write)
///
/// Each interrupt source of ISTA can be selectively masked by setting the
/// corresponding bit to "1".
///
#[bitfield(bits=8)]
#[repr(u8)]
#[derive(Copy, Clone, Debug)]
pub struct MASK {
    pub RME: B1,
    pub RPF: B1,
    pub RSC: B1,
    pub XPR: B1,
    pub TIN: B1,
    pub CISQ: B1,
    pub SIN: B1,
    pub EXI: B1,
}

impl MASK {
    /// All interrupt sources masked.
    pub fn all() -> Self {
        MASK::from(0xff)
    }

    /// All interrupt sources enabled.
    pub fn none() -> Self {
        MASK::from(0x00)
    }
}

/// Status Register (STAR) - 0x21 (read)
///
/// * XDOV: Transmit Data Overflow
/// * XFW: Transmit FIFO Write Enable
/// * XRNR: Transmit RNR
/// * RRNR: Receive RNR
/// * MBR: Message Buffer Ready
/// * MAC1: Monitor transmit channel 1 active
/// * BVS: B-channel Valid on SIP
/// * MAC0: Monitor transmit channel 0 active
///
#[bitfield(bits=8)]
#[repr(u8)]
#[derive(Copy, Clone, Debug)]
pub struct STAR {
    pub XDOV: B1,
    pub XFW: B1,
    pub XRNR: B1,
    pub RRNR: B1,
    pub MBR: B1,
    pub MAC1: B1,
    pub BVS: B1,
    pub MAC0: B1,
}

/// Command Register (CMDR) - 0x21 (write)
///
/// Strobes only. Every write acts on the bits set and nothing is latched.
///
/// * RMC: Receive Message Complete
///   Confirms the receive FIFO block has been read and releases it.
/// * RRES: Receiver Reset
///   The HDLC receiver is reset and the receive FIFO is cleared.
/// * RNR: Receiver Not Ready (auto mode only)
/// * STI: Start Timer
/// * XTF: Transmit Transparent Frame
///   After having written up to 32 bytes into the transmit FIFO, the
///   processor initiates the transmission by setting this bit.
/// * XIF: Transmit I Frame (auto mode only)
/// * XME: Transmit Message End
///   Together with XTF, the block written last is the end of the frame.
/// * XRES: Transmitter Reset
///   The HDLC transmitter is reset and the transmit FIFO is cleared.
///
#[bitfield(bits=8)]
#[repr(u8)]
#[derive(Copy, Clone, Debug)]
pub struct CMDR {
    pub RMC: B1,
    pub RRES: B1,
    pub RNR: B1,
    pub STI: B1,
    pub XTF: B1,
    pub XIF: B1,
    pub XME: B1,
    pub XRES: B1,
}

impl CMDR {
    /// 0x80: release the receive FIFO.
    pub fn receive_message_complete() -> Self {
        CMDR::new().with_RMC(1)
    }

    /// 0x08: a transmit block follows this one.
    pub fn transmit_continue() -> Self {
        CMDR::new().with_XTF(1)
    }

    /// 0x0a: the block just written ends the frame.
    pub fn transmit_last() -> Self {
        CMDR::new().with_XTF(1).with_XME(1)
    }

    /// 0x01
    pub fn transmitter_reset() -> Self {
        CMDR::new().with_XRES(1)
    }

    /// 0x41
    pub fn receiver_transmitter_reset() -> Self {
        CMDR::new().with_RRES(1).with_XRES(1)
    }
}

/// Extended Interrupt Register (EXIR) - 0x24 (read)
///
/// * XMR: Transmit Message Repeat
///   The transmission of the last frame has to be repeated because a
///   collision has been detected after the first 32 bytes.
/// * XDU: Transmit Data Underrun
///   The current transmission of a frame is aborted by transmitting seven
///   "1"s because the transmit FIFO holds no further data. The frame has to
///   be retransmitted from the beginning.
/// * PCE: Protocol Error (auto mode only)
/// * RFO: Receive Frame Overflow
/// * SOV: Synchronous Transfer Overflow
/// * MOS: Monitor Status
///   A change in the monitor status register MOSR has occurred.
/// * SAW: Subscriber Awake
/// * WOV: Watchdog Timer Overflow
///
#[bitfield(bits=8)]
#[repr(u8)]
#[derive(Copy, Clone, Debug)]
pub struct EXIR {
    pub XMR: B1,
    pub XDU: B1,
    pub PCE: B1,
    pub RFO: B1,
    pub SOV: B1,
    pub MOS: B1,
    pub SAW: B1,
    pub WOV: B1,
}

/// Receive Byte Count Low (RBCL) - 0x25 (read)
///
/// Only the low five bits are meaningful once RME has fired: they give the
/// number of bytes left in the receive FIFO, where zero means a full block.
///
#[bitfield(bits=8)]
#[repr(u8)]
#[derive(Copy, Clone, Debug)]
pub struct RBCL {
    #[skip] __: B3,
    pub RBC: B5,
}

/// Receive Status Register (RSTA) - 0x27 (read)
///
/// * VFR: Valid Frame
/// * RDO: Receive Data Overflow
///   At least one byte of the frame has been lost because it could not be
///   stored in the receive FIFO.
/// * CRC: CRC check
///   "1" when the CRC is correct.
/// * RAB: Receive Message Aborted
/// * SA1, SA0: SAPI address identification
/// * CR: Command/Response
/// * TA: TEI address identification
///
#[bitfield(bits=8)]
#[repr(u8)]
#[derive(Copy, Clone, Debug)]
pub struct RSTA {
    pub VFR: B1,
    pub RDO: B1,
    pub CRC: B1,
    pub RAB: B1,
    pub SA1: B1,
    pub SA0: B1,
    pub CR: B1,
    pub TA: B1,
}

impl RSTA {
    /// A frame is clean when no overflow happened, the CRC is good and the
    /// frame was not aborted.
    pub fn frame_valid(&self) -> bool {
        self.RDO() == 0 && self.CRC() != 0 && self.RAB() == 0
    }
}

/// Receive Byte Count High (RBCH) - 0x2a (read)
///
/// * XAC: Transmitter Active
///   The HDLC transmitter is active. Still set while the D channel is busy.
/// * VN: Version Number of the chip
/// * OV: Overflow of the 12 bit byte counter
/// * RBC: bits 11..8 of the receive byte count
///
#[bitfield(bits=8)]
#[repr(u8)]
#[derive(Copy, Clone, Debug)]
pub struct RBCH {
    pub XAC: B1,
    pub VN: B2,
    pub OV: B1,
    pub RBC: B4,
}

///////////////////////////////////////////////////////////////////////
// Special purpose / IOM

/// Serial Port Control Register (SPCR) - 0x30
///
/// * SPU: Software Power Up
/// * SPM: Serial Port Timing Mode
/// * TLP: Test Loop
/// * C1C: B1 channel connect. `0b11` loops B1 back towards the IOM port.
/// * C2C: B2 channel connect. `0b11` loops B2 back towards the IOM port.
///
#[bitfield(bits=8)]
#[repr(u8)]
#[derive(Copy, Clone, Debug)]
pub struct SPCR {
    pub SPU: B1,
    #[skip] __: B1,
    pub SPM: B1,
    pub TLP: B1,
    pub C1C: B2,
    pub C2C: B2,
}

/// Command/Indication Receive 0 (CIR0) - 0x31 (read)
///
/// * SQC: S/Q channel change
/// * BAS: Bus Access Status
/// * CODR: C/I code received in channel 0 (the layer 1 indication)
/// * CIC0: C/I code 0 change
///   A change in the received C/I channel 0 code has been recognized.
/// * CIC1: C/I code 1 change
///   A change in the received C/I channel 1 code has been recognized. CIR1
///   holds the new value.
///
#[bitfield(bits=8)]
#[repr(u8)]
#[derive(Copy, Clone, Debug)]
pub struct CIR0 {
    pub SQC: B1,
    pub BAS: B1,
    pub CODR: B4,
    pub CIC0: B1,
    pub CIC1: B1,
}

/// Layer 1 commands, written to CIX0.CODX
#[derive(Copy, Clone, BitfieldSpecifier, Debug, PartialEq, Eq)]
#[bits=4]
pub enum Command {
    /// TIM: Timing. Requests the IOM clocks.
    Timing = 0x0,
    /// RS: Reset of the layer 1 state machine.
    Reset = 0x1,
    /// SSZ: Send Single Zeros (test mode).
    SendSingleZeros = 0x2,
    /// SCZ: Send Continuous Zeros (test mode).
    SendContinuousZeros = 0x4,
    /// AR8: Activation Request, priority class 8. Transmits INFO 3.
    ActivateRequest8 = 0x8,
    /// AR10: Activation Request, priority class 10. Transmits INFO 3.
    ActivateRequest10 = 0x9,
    /// ARL: Activation Request Loop.
    ActivateRequestLoop = 0xa,
    /// DUI: Deactivate, Upstream Indication. Releases the IOM clocks.
    DeactivateIndication = 0xf,
}

/// Command/Indication Transmit 0 (CIX0) - 0x31 (write)
///
/// * RSS: Reset Source Select
/// * BAC: Bus Access Control
/// * CODX: C/I code transmitted in channel 0
/// * TBA: TIC bus address, "1"s during normal operation
///
#[bitfield(bits=8)]
#[repr(u8)]
#[derive(Copy, Clone, Debug)]
pub struct CIX0 {
    pub RSS: B1,
    pub BAC: B1,
    pub CODX: Command,
    pub TBA: B2,
}

impl CIX0 {
    pub fn command(command: Command) -> Self {
        CIX0::new().with_CODX(command).with_TBA(0b11)
    }
}

///////////////////////////////////////////////////////////////////////
// Monitor channel

/// Per-channel half of MOSR.
///
/// * MDR: Monitor channel Data Received
/// * MER: Monitor channel End of Reception
/// * MDA: Monitor channel Data Acknowledged. The far end has read the last
///   byte written to MOX and the next one may be written.
/// * MAB: Monitor channel Data Abort. The far end has ended the transfer.
///
#[bitfield(bits=4)]
#[derive(Copy, Clone, BitfieldSpecifier, Debug)]
pub struct MonitorStatus {
    pub MDR: B1,
    pub MER: B1,
    pub MDA: B1,
    pub MAB: B1,
}

/// Monitor Status Register (MOSR) - 0x3a (read)
///
#[bitfield(bits=8)]
#[repr(u8)]
#[derive(Copy, Clone, Debug)]
pub struct MOSR {
    pub MOS1: MonitorStatus,
    pub MOS0: MonitorStatus,
}

impl MOSR {
    pub fn channel(&self, index: usize) -> MonitorStatus {
        assert!(index < MONITOR_CHANNELS_COUNT);
        match index {
            0 => self.MOS0(),
            _ => self.MOS1(),
        }
    }
}

/// Per-channel half of MOCR.
///
/// * MRE: Monitor Receive interrupt Enable
/// * MRC: MR bit Control. Acknowledges received bytes towards the far end,
///   which tells it reception has begun.
/// * MIE: Monitor transmit Interrupt Enable
/// * MXC: MX bit Control. Enables the transmit handshake.
///
#[bitfield(bits=4)]
#[derive(Copy, Clone, BitfieldSpecifier, Debug)]
pub struct MonitorControl {
    pub MRE: B1,
    pub MRC: B1,
    pub MIE: B1,
    pub MXC: B1,
}

impl MonitorControl {
    /// Interrupts enabled, neither direction handshaking.
    pub fn idle() -> Self {
        MonitorControl::new().with_MRE(1).with_MIE(1)
    }

    /// Everything off.
    pub fn off() -> Self {
        MonitorControl::new()
    }
}

/// Monitor Control Register (MOCR) - 0x3a (write)
///
/// Write-only, so software has to keep a shadow copy and rewrite both
/// channel halves on every change.
///
#[bitfield(bits=8)]
#[repr(u8)]
#[derive(Copy, Clone, Debug)]
pub struct MOCR {
    pub MOC1: MonitorControl,
    pub MOC0: MonitorControl,
}

impl Default for MOCR {
    fn default() -> Self {
        MOCR::from(0xaa)
    }
}

impl MOCR {
    pub fn channel(&self, index: usize) -> MonitorControl {
        assert!(index < MONITOR_CHANNELS_COUNT);
        match index {
            0 => self.MOC0(),
            _ => self.MOC1(),
        }
    }

    pub fn with_channel(self, index: usize, value: MonitorControl) -> Self {
        assert!(index < MONITOR_CHANNELS_COUNT);
        match index {
            0 => self.with_MOC0(value),
            _ => self.with_MOC1(value),
        }
    }
}

pub const MONITOR_CHANNELS_COUNT: usize = 2;
