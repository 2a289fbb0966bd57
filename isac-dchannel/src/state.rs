use crate::primitive::{Control, Indication, Signal};

/// Layer 1 state as reported by the C/I indication code in CIR0.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum LineState {
    /// DR: Deactivation Request
    DeactivationRequest,
    /// RS: Reset
    #[default]
    Reset,
    /// SD: Send Single Zeros
    SendSingleZeros,
    /// DIS: Disconnected
    Disconnected,
    /// RSY: Resynchronizing
    Resynchronizing,
    /// EI: Error Indication
    ErrorIndication,
    /// PU: Power Up
    PowerUp,
    /// ARD: Activation Request Downstream (INFO 2 received)
    ActivationRequest,
    /// TI: Test Indication
    TestIndication,
    /// ATI: Awake Test Indication
    AwakeTestIndication,
    /// AI8: Activation Indication, priority class 8 (INFO 4)
    ActivatedP8,
    /// AI10: Activation Indication, priority class 10 (INFO 4)
    ActivatedP10,
    /// DID: Deactivation Indication Downstream (deactivation confirmed)
    DeactivationConfirm,
    Unassigned(u8),
}

impl LineState {
    pub fn from_code(code: u8) -> Self {
        match code & 0xf {
            0x0 => LineState::DeactivationRequest,
            0x1 => LineState::Reset,
            0x2 => LineState::SendSingleZeros,
            0x3 => LineState::Disconnected,
            0x4 => LineState::Resynchronizing,
            0x6 => LineState::ErrorIndication,
            0x7 => LineState::PowerUp,
            0x8 => LineState::ActivationRequest,
            0xa => LineState::TestIndication,
            0xb => LineState::AwakeTestIndication,
            0xc => LineState::ActivatedP8,
            0xd => LineState::ActivatedP10,
            0xf => LineState::DeactivationConfirm,
            c => LineState::Unassigned(c),
        }
    }

    pub fn code(&self) -> u8 {
        match *self {
            LineState::DeactivationRequest => 0x0,
            LineState::Reset => 0x1,
            LineState::SendSingleZeros => 0x2,
            LineState::Disconnected => 0x3,
            LineState::Resynchronizing => 0x4,
            LineState::ErrorIndication => 0x6,
            LineState::PowerUp => 0x7,
            LineState::ActivationRequest => 0x8,
            LineState::TestIndication => 0xa,
            LineState::AwakeTestIndication => 0xb,
            LineState::ActivatedP8 => 0xc,
            LineState::ActivatedP10 => 0xd,
            LineState::DeactivationConfirm => 0xf,
            LineState::Unassigned(c) => c,
        }
    }

    /// States after which the chip holds the IOM clocks until told
    /// otherwise with DUI.
    pub fn needs_deactivate_indication(&self) -> bool {
        matches!(self, LineState::Reset | LineState::ErrorIndication)
    }

    /// States in which a reset request only needs the clocks back (TIM)
    /// rather than a full layer 1 restart (RS).
    pub fn resets_with_timing(&self) -> bool {
        matches!(self,
            LineState::ErrorIndication |
            LineState::DeactivationRequest |
            LineState::Reset
        )
    }

    /// What the upper layer hears about this state, if anything.
    pub fn indication(&self) -> Option<Indication> {
        match self {
            LineState::Reset |
            LineState::ErrorIndication     => Some(Indication::Control(Control::HwReset)),
            LineState::DeactivationConfirm => Some(Indication::ControlConfirm(Control::Deactivate)),
            LineState::DeactivationRequest => Some(Indication::Control(Control::Deactivate)),
            LineState::PowerUp             => Some(Indication::Control(Control::PowerUp)),
            LineState::Resynchronizing     => Some(Indication::Signal(Signal::AnySignal)),
            LineState::ActivationRequest   => Some(Indication::Signal(Signal::Info2)),
            LineState::ActivatedP8         => Some(Indication::Signal(Signal::Info4P8)),
            LineState::ActivatedP10        => Some(Indication::Signal(Signal::Info4P10)),
            _ => None,
        }
    }
}
