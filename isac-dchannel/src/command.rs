//! Requests from the upper layer.

use isac_pac::device::Bus;
use isac_pac::register::{Command, SPCR};
use tracing::{debug, warn};

use crate::config::InterfaceMode;
use crate::dchannel::Hardware;
use crate::error::{Error, Result};
use crate::fifo::{NextFrame, MAX_DFRAME_LEN_L1};
use crate::primitive::{Control, Frame, Signal};

impl<B> Hardware<B>
where B: Bus,
{
    /// Start `frame` if the transmitter is idle, otherwise queue it behind
    /// the one in flight. Returns the frame when it should be confirmed
    /// right away.
    pub(crate) fn send_frame(&mut self, frame: Frame) -> Result<Option<Frame>> {
        if self.transfer.has_next() {
            debug!("D frame already queued");
            return Err(Error::Busy(frame));
        }
        if frame.len() >= MAX_DFRAME_LEN_L1 {
            return Err(Error::FrameTooLong(frame));
        }
        if frame.is_empty() {
            return Err(Error::InvalidArgument("empty D frame".into()));
        }

        if self.transfer.busy {
            self.transfer.next = NextFrame::Queued(frame);
            return Ok(None);
        }

        self.transfer.busy = true;
        self.transfer.tx.load(&frame);
        if let Err(e) = self.fill_fifo() {
            self.transfer.busy = false;
            self.transfer.tx.clear();
            self.timer.disarm();
            return match e {
                Error::Bus(source) => Err(Error::SendFailed { frame, source }),
                other => Err(other),
            };
        }
        Ok(Some(frame))
    }

    pub(crate) fn signal_request(&mut self, signal: Signal) -> Result<()> {
        let command = match signal {
            Signal::Info3P8 => Command::ActivateRequest8,
            Signal::Info3P10 => Command::ActivateRequest10,
            other => {
                warn!(?other, "unsupported signal request");
                return Err(Error::InvalidArgument(format!("signal request {:#06x}", other.code())));
            },
        };
        self.ph_command(command)
    }

    pub(crate) fn control_request(&mut self, control: Control) -> Result<()> {
        match control {
            Control::HwReset => {
                if self.line_state.resets_with_timing() {
                    self.ph_command(Command::Timing)
                } else {
                    self.ph_command(Command::Reset)
                }
            },
            Control::PowerUp => self.ph_command(Command::Timing),
            Control::Deactivate => {
                self.deactivate();
                Ok(())
            },
            Control::TestLoop { b1, b2 } => self.test_loop(b1, b2),
            other => {
                warn!(?other, "unsupported control request");
                Err(Error::InvalidArgument(format!("control request {:#06x}", other.code())))
            },
        }
    }

    /// Forget every frame in either direction and stop the busy timer.
    pub(crate) fn deactivate(&mut self) {
        self.transfer.queue.clear();
        self.transfer.next = NextFrame::Empty;
        self.transfer.busy = false;
        self.transfer.tx.clear();
        self.transfer.rx = None;
        self.timer.disarm();
        self.clear_link_busy();
        self.monitor.release_buffers();
    }

    fn test_loop(&mut self, b1: bool, b2: bool) -> Result<()> {
        let looped = b1 || b2;
        let spcr = SPCR::new()
            .with_C1C(if b1 { 0b11 } else { 0b00 })
            .with_C2C(if b2 { 0b11 } else { 0b00 });

        match self.config.mode {
            InterfaceMode::Iom1 if !looped => {
                self.isac.spcr().set(SPCR::new().with_C1C(0b10).with_C2C(0b10))?;
                self.isac.adf1().set(0x02)?;
            },
            InterfaceMode::Iom1 => {
                self.isac.spcr().set(spcr)?;
                self.isac.adf1().set(0x0a)?;
            },
            InterfaceMode::Iom2 => {
                self.isac.spcr().set(spcr)?;
                self.isac.adf1().set(if looped { 0x08 } else { 0x00 })?;
            },
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{Config, InterfaceMode};
    use crate::dchannel::tests::attached;
    use crate::error::Error;
    use crate::fifo::MAX_DFRAME_LEN_L1;
    use crate::mock::Op;
    use crate::primitive::{Control, Indication, Request, Signal};

    const XPR: u8 = 0x10;

    #[test]
    fn send_idle_confirms_immediately() {
        let (dchannel, bus, receiver) = attached(Config::default());
        dchannel.request(Request::Data(vec![1, 2, 3])).unwrap();

        assert_eq!(bus.fifo_writes(), vec![vec![1, 2, 3]]);
        assert_eq!(bus.writes_to(0x21), vec![0x0a]);
        assert_eq!(receiver.try_recv().unwrap(), Indication::DataConfirm(vec![1, 2, 3]));
        assert!(dchannel.status().unwrap().transmit_busy);
    }

    #[test]
    fn send_while_busy_queues_and_promotes() {
        let (dchannel, bus, receiver) = attached(Config::default());
        dchannel.request(Request::Data(vec![1])).unwrap();
        receiver.try_recv().unwrap();

        dchannel.request(Request::Data(vec![2, 2])).unwrap();
        assert!(receiver.try_recv().is_err());
        assert!(dchannel.status().unwrap().transmit_queued);
        assert_eq!(bus.fifo_writes(), vec![vec![1]]);

        dchannel.interrupt(XPR).unwrap();
        assert_eq!(bus.fifo_writes(), vec![vec![1], vec![2, 2]]);

        dchannel.bottom_half().unwrap();
        assert_eq!(receiver.try_recv().unwrap(), Indication::DataConfirm(vec![2, 2]));
        assert!(!dchannel.status().unwrap().transmit_queued);

        dchannel.interrupt(XPR).unwrap();
        assert!(!dchannel.status().unwrap().transmit_busy);
    }

    #[test]
    fn send_rejected_while_frame_queued() {
        let (dchannel, bus, _receiver) = attached(Config::default());
        dchannel.request(Request::Data(vec![1])).unwrap();
        dchannel.request(Request::Data(vec![2])).unwrap();
        bus.take_ops();

        match dchannel.request(Request::Data(vec![3])) {
            Err(Error::Busy(frame)) => assert_eq!(frame, vec![3]),
            other => panic!("unexpected {other:?}"),
        }
        assert!(bus.ops().is_empty());

        // Still refused after the queued frame moved to the transmitter but
        // before its confirmation went out.
        dchannel.interrupt(XPR).unwrap();
        assert!(matches!(dchannel.request(Request::Data(vec![3])), Err(Error::Busy(_))));
        dchannel.bottom_half().unwrap();
        dchannel.request(Request::Data(vec![3])).unwrap();
    }

    #[test]
    fn send_rejects_bad_lengths() {
        let (dchannel, bus, receiver) = attached(Config::default());
        assert!(matches!(
            dchannel.request(Request::Data(vec![0; MAX_DFRAME_LEN_L1])),
            Err(Error::FrameTooLong(f)) if f.len() == MAX_DFRAME_LEN_L1
        ));
        assert!(matches!(dchannel.request(Request::Data(vec![])), Err(Error::InvalidArgument(_))));
        assert!(bus.ops().is_empty());
        assert!(receiver.try_recv().is_err());

        dchannel.request(Request::Data(vec![0; MAX_DFRAME_LEN_L1 - 1])).unwrap();
    }

    #[test]
    fn failed_first_block_leaves_transmitter_idle() {
        let (dchannel, bus, receiver) = attached(Config::default());
        bus.fail_fifo_write(true);
        match dchannel.request(Request::Data(vec![4, 5])) {
            Err(Error::SendFailed { frame, .. }) => assert_eq!(frame, vec![4, 5]),
            other => panic!("unexpected {other:?}"),
        }
        let status = dchannel.status().unwrap();
        assert!(!status.transmit_busy);
        assert!(!status.transmit_queued);
        assert!(!status.busy_timer_armed);
        assert!(receiver.try_recv().is_err());

        bus.fail_fifo_write(false);
        dchannel.request(Request::Data(vec![6])).unwrap();
        assert_eq!(bus.fifo_writes(), vec![vec![6]]);
        assert_eq!(receiver.try_recv().unwrap(), Indication::DataConfirm(vec![6]));

        dchannel.request(Request::Data(vec![7])).unwrap();
        assert!(dchannel.status().unwrap().transmit_queued);
    }

    #[test]
    fn long_frame_goes_out_in_blocks() {
        let (dchannel, bus, _receiver) = attached(Config::default());
        let frame: Vec<u8> = (0..100).collect();
        dchannel.request(Request::Data(frame.clone())).unwrap();
        for _ in 0..4 {
            dchannel.interrupt(XPR).unwrap();
        }

        let writes = bus.fifo_writes();
        assert_eq!(writes.iter().map(Vec::len).collect::<Vec<_>>(), vec![32, 32, 32, 4]);
        assert_eq!(writes.concat(), frame);
        assert_eq!(bus.writes_to(0x21), vec![0x08, 0x08, 0x08, 0x0a]);
        assert!(!dchannel.status().unwrap().transmit_busy);
    }

    #[test]
    fn activation_requests() {
        let (dchannel, bus, _receiver) = attached(Config::default());
        dchannel.request(Request::Signal(Signal::Info3P8)).unwrap();
        dchannel.request(Request::Signal(Signal::Info3P10)).unwrap();
        assert_eq!(bus.writes(), vec![(0x31, 0x23), (0x31, 0x27)]);
    }

    #[test]
    fn unsupported_signal() {
        let (dchannel, bus, _receiver) = attached(Config::default());
        assert!(matches!(
            dchannel.request(Request::Signal(Signal::Info4P8)),
            Err(Error::InvalidArgument(_))
        ));
        assert!(bus.ops().is_empty());
    }

    #[test]
    fn reset_depends_on_line_state() {
        // Attached with CIR0 reading zero: deactivation requested, so the
        // clocks are enough.
        let (dchannel, bus, _receiver) = attached(Config::default());
        dchannel.request(Request::Control(Control::HwReset)).unwrap();
        assert_eq!(bus.take_ops(), vec![Op::Write(0x31, 0x03)]);

        bus.push(0x31, (0xc << 2) | 0x02);
        dchannel.interrupt(0x04).unwrap();
        bus.take_ops();
        dchannel.request(Request::Control(Control::HwReset)).unwrap();
        assert_eq!(bus.writes(), vec![(0x31, 0x07)]);
    }

    #[test]
    fn power_up_writes_tim() {
        let (dchannel, bus, _receiver) = attached(Config::default());
        dchannel.request(Request::Control(Control::PowerUp)).unwrap();
        assert_eq!(bus.writes(), vec![(0x31, 0x03)]);
    }

    #[test]
    fn unsupported_control() {
        let (dchannel, bus, _receiver) = attached(Config::default());
        assert!(matches!(
            dchannel.request(Request::Control(Control::PowerDown)),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            dchannel.request(Request::Control(Control::Activate)),
            Err(Error::InvalidArgument(_))
        ));
        assert!(bus.ops().is_empty());
    }

    #[test]
    fn deactivate_clears_everything() {
        let (dchannel, bus, receiver) = attached(Config::default());
        dchannel.request(Request::Data(vec![1; 40])).unwrap();
        dchannel.request(Request::Data(vec![2])).unwrap();
        receiver.try_recv().unwrap();

        bus.push(0x27, 0x20);
        bus.push(0x25, 3);
        dchannel.interrupt(0x80).unwrap();
        dchannel.interrupt(0x40).unwrap();
        bus.take_ops();

        dchannel.request(Request::Control(Control::Deactivate)).unwrap();
        assert!(bus.ops().is_empty());

        let status = dchannel.status().unwrap();
        assert!(!status.transmit_busy);
        assert!(!status.transmit_queued);
        assert!(!status.busy_timer_armed);
        assert_eq!(status.receive_queue, 0);

        assert_eq!(dchannel.bottom_half().unwrap(), 0);
        assert!(receiver.try_recv().is_err());

        // A transmit interrupt arriving late finds nothing to send.
        dchannel.interrupt(XPR).unwrap();
        assert!(bus.fifo_writes().is_empty());

        dchannel.request(Request::Data(vec![3])).unwrap();
        assert_eq!(bus.fifo_writes(), vec![vec![3]]);
    }

    #[test]
    fn test_loop_iom2() {
        let (dchannel, bus, _receiver) = attached(Config::default());
        dchannel.request(Request::Control(Control::TestLoop { b1: true, b2: false })).unwrap();
        dchannel.request(Request::Control(Control::TestLoop { b1: true, b2: true })).unwrap();
        dchannel.request(Request::Control(Control::TestLoop { b1: false, b2: false })).unwrap();
        assert_eq!(bus.writes(), vec![
            (0x30, 0x0c), (0x38, 0x08),
            (0x30, 0x0f), (0x38, 0x08),
            (0x30, 0x00), (0x38, 0x00),
        ]);
    }

    #[test]
    fn test_loop_iom1() {
        let (dchannel, bus, _receiver) = attached(Config::default().with_mode(InterfaceMode::Iom1));
        dchannel.request(Request::Control(Control::TestLoop { b1: false, b2: true })).unwrap();
        dchannel.request(Request::Control(Control::TestLoop { b1: false, b2: false })).unwrap();
        assert_eq!(bus.writes(), vec![
            (0x30, 0x03), (0x38, 0x0a),
            (0x30, 0x0a), (0x38, 0x02),
        ]);
    }
}
