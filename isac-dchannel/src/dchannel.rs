use std::sync::{Mutex, MutexGuard, TryLockError};
use std::time::{Duration, Instant};

use crossbeam::channel::Sender;
use isac_pac::device::{Bus, Isac, Version};
use isac_pac::register::*;
use tracing::{debug, info, trace, warn};

use crate::config::{Config, InterfaceMode};
use crate::error::{Error, Result};
use crate::event::{Event, EventSet};
use crate::fifo::{ErrorCounters, Transfer};
use crate::interrupt::keep_first_error;
use crate::monitor::Monitor;
use crate::primitive::{Frame, Indication, MonitorEvent, Request};
use crate::state::LineState;
use crate::timer::{BusyTimer, TimerOutcome};

/// Everything that may only be touched with the hardware access lock held:
/// the chip itself and the per-channel state that has to stay consistent
/// with it.
pub(crate) struct Hardware<B>
where B: Bus,
{
    pub(crate) isac: Isac<B>,
    pub(crate) config: Config,
    pub(crate) line_state: LineState,
    pub(crate) transfer: Transfer,
    pub(crate) timer: BusyTimer,
    pub(crate) monitor: Monitor,
    pub(crate) events: EventSet,
}

impl<B> Hardware<B>
where B: Bus,
{
    pub(crate) fn new(isac: Isac<B>, config: Config) -> Self {
        Self {
            isac,
            timer: BusyTimer::new(config.busy_timeout),
            config,
            line_state: LineState::default(),
            transfer: Transfer::new(),
            monitor: Monitor::default(),
            events: EventSet::default(),
        }
    }

    /// Mask everything and log whatever the chip had pending. Seeds the
    /// line state from CIR0.
    pub(crate) fn clear_pending_interrupts(&mut self) -> Result<()> {
        self.isac.mask().set(MASK::all())?;

        let star = self.isac.star().read()?;
        debug!("ISAC STAR {:02x}", u8::from(star));
        let mode = self.isac.mode().read()?;
        debug!("ISAC MODE {:02x}", mode);
        let adf2 = self.isac.adf2().read()?;
        debug!("ISAC ADF2 {:02x}", adf2);
        let ista = self.isac.ista().read()?;
        debug!("ISAC ISTA {:02x}", u8::from(ista));
        if ista.EXI() != 0 {
            let exir = self.isac.exir().read()?;
            debug!("ISAC EXIR {:02x}", u8::from(exir));
        }
        let cir0 = self.isac.cir0().read()?;
        debug!("ISAC CIR0 {:02x}", u8::from(cir0));
        self.line_state = LineState::from_code(cir0.CODR());

        Ok(())
    }

    pub(crate) fn init(&mut self) -> Result<()> {
        self.isac.mask().set(MASK::all())?;

        let rbch = self.isac.rbch().read()?;
        info!("ISAC version ({:02x}): {}", u8::from(rbch), Version::from_rbch(rbch).name());

        self.monitor.mocr = MOCR::default();

        match self.config.mode {
            InterfaceMode::Iom1 => {
                self.isac.adf2().set(0x00)?;
                self.isac.spcr().set(SPCR::new().with_C1C(0b10).with_C2C(0b10))?;
                self.isac.adf1().set(0x02)?;
                self.isac.stcr().set(0x70)?;
                self.isac.mode().set(0xc9)?;
            },
            InterfaceMode::Iom2 => {
                self.isac.adf2().set(self.config.adf2)?;
                self.isac.sqxr().set(0x2f)?;
                self.isac.spcr().set(SPCR::new())?;
                self.isac.stcr().set(0x70)?;
                self.isac.mode().set(0xc9)?;
                self.isac.timr().set(0x00)?;
                self.isac.adf1().set(0x00)?;
            },
        }

        self.events.schedule(Event::LineStateChange);
        self.ph_command(Command::Reset)?;
        self.isac.mask().set(MASK::none())?;

        self.isac.cmdr().set(CMDR::receiver_transmitter_reset())?;

        Ok(())
    }

    pub(crate) fn ph_command(&self, command: Command) -> Result<()> {
        debug!(?command, "ph_command");
        self.isac.command(command)?;
        Ok(())
    }

    /// Turn pending events into indications. Runs with the lock held but
    /// never calls upward itself. The indications are returned even when a
    /// register write on the way failed.
    fn collect_indications(&mut self) -> (Vec<Indication>, Result<()>) {
        let events = self.events.take();
        if !events.is_empty() {
            trace!(?events, "bottom half");
        }

        let mut result = Ok(());
        let mut indications = Vec::new();
        for event in events.iter() {
            match event {
                Event::ClearBusy => {
                    debug!("D-channel busy cleared");
                },
                Event::TransmitBufferReady => {
                    if let Some(frame) = self.transfer.take_sent() {
                        indications.push(Indication::DataConfirm(frame));
                    }
                },
                Event::ReceiveBufferReady => {
                    indications.extend(self.transfer.queue.drain(..).map(Indication::Data));
                },
                Event::LineStateChange => {
                    if self.line_state.needs_deactivate_indication() {
                        keep_first_error(&mut result, self.ph_command(Command::DeactivateIndication));
                    }
                    if let Some(indication) = self.line_state.indication() {
                        indications.push(indication);
                    }
                },
                Event::MonitorReceiveOverflow0 => indications.push(Indication::Monitor(0, MonitorEvent::ReceiveOverflow)),
                Event::MonitorReceiveOverflow1 => indications.push(Indication::Monitor(1, MonitorEvent::ReceiveOverflow)),
                Event::MonitorReceiveEnd0 => indications.push(Indication::Monitor(0, MonitorEvent::ReceiveEnd)),
                Event::MonitorReceiveEnd1 => indications.push(Indication::Monitor(1, MonitorEvent::ReceiveEnd)),
                Event::MonitorTransmitComplete0 => indications.push(Indication::Monitor(0, MonitorEvent::TransmitComplete)),
                Event::MonitorTransmitComplete1 => indications.push(Indication::Monitor(1, MonitorEvent::TransmitComplete)),
                Event::MonitorTransmitEnd0 => indications.push(Indication::Monitor(0, MonitorEvent::TransmitEnd)),
                Event::MonitorTransmitEnd1 => indications.push(Indication::Monitor(1, MonitorEvent::TransmitEnd)),
            }
        }

        (indications, result)
    }
}

/// Point-in-time view of one D channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Status {
    pub line_state: LineState,
    pub transmit_busy: bool,
    pub transmit_queued: bool,
    pub busy_timer_armed: bool,
    pub link_busy: bool,
    pub receive_queue: usize,
    pub errors: ErrorCounters,
}

/// One ISAC D channel.
///
/// Interrupt handling, the busy-recovery timer and requests from the upper
/// layer all serialize on one hardware access lock. Notifications for the
/// upper layer are only recorded while that lock is held and go out from
/// [`DChannel::bottom_half`].
pub struct DChannel<B>
where B: Bus,
{
    hw: Mutex<Hardware<B>>,
    upstream: Sender<Indication>,
    pub(crate) timer_tick: Duration,
}

impl<B> DChannel<B>
where B: Bus,
{
    /// Bring the chip up. Interrupts are unmasked on return, and a line
    /// state notification is already pending for the bottom half.
    pub fn attach(bus: B, config: Config, upstream: Sender<Indication>) -> Result<Self> {
        let timer_tick = config.timer_tick;
        let mut hw = Hardware::new(Isac::new(bus), config);
        hw.clear_pending_interrupts()?;
        hw.init()?;

        Ok(Self {
            hw: Mutex::new(hw),
            upstream,
            timer_tick,
        })
    }

    /// Mask interrupts, stop the timer and drop every buffer. Hands the bus
    /// back.
    pub fn detach(self) -> Result<B> {
        let mut hw = self.hw.into_inner().map_err(|_| Error::LockPoisoned)?;
        hw.isac.mask().set(MASK::all())?;
        hw.timer.disarm();
        hw.deactivate();
        Ok(hw.isac.into_bus())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Hardware<B>>> {
        self.hw.lock().map_err(|_| Error::LockPoisoned)
    }

    fn deliver(&self, indication: Indication) {
        debug!(%indication, "upstream");
        if let Err(e) = self.upstream.send(indication) {
            warn!("upstream gone, dropping {}", e.into_inner());
        }
    }

    /// Interrupt phase: handle an ISTA value the caller has already read.
    pub fn interrupt(&self, ista: u8) -> Result<()> {
        self.lock()?.interrupt(ISTA::from(ista))
    }

    /// Interrupt phase: read ISTA and handle it if anything is pending.
    /// Returns whether there was anything to do.
    pub fn poll_interrupt(&self) -> Result<bool> {
        let mut hw = self.lock()?;
        let ista = hw.isac.ista().read()?;
        if u8::from(ista) == 0 {
            return Ok(false);
        }
        hw.interrupt(ista)?;
        Ok(true)
    }

    /// Deferred phase: deliver every notification recorded since the last
    /// call. Returns the number of indications sent upward. A failed
    /// register write is reported only after everything was delivered.
    pub fn bottom_half(&self) -> Result<usize> {
        let (indications, result) = self.lock()?.collect_indications();
        let count = indications.len();
        for indication in indications {
            self.deliver(indication);
        }
        result.map(|()| count)
    }

    /// Busy-recovery timer callback. Never waits for the lock: when it is
    /// taken the tick is skipped and the next one retries.
    pub fn busy_timer_tick(&self, now: Instant) -> Result<TimerOutcome> {
        let mut hw = match self.hw.try_lock() {
            Ok(hw) => hw,
            Err(TryLockError::WouldBlock) => {
                trace!("busy timer: lock held, retry next tick");
                return Ok(TimerOutcome::Rescheduled);
            },
            Err(TryLockError::Poisoned(_)) => return Err(Error::LockPoisoned),
        };

        if !hw.timer.is_armed() {
            return Ok(TimerOutcome::Idle);
        }
        if !hw.timer.expired(now) {
            return Ok(TimerOutcome::Pending);
        }
        hw.busy_timer_expired()
    }

    /// Handle a request from the upper layer.
    ///
    /// A frame sent while the transmitter is idle is confirmed right away.
    /// A frame sent while another is in flight is queued and confirmed by
    /// the bottom half once it reaches the transmitter.
    pub fn request(&self, request: Request) -> Result<()> {
        match request {
            Request::Data(frame) => {
                let confirm = self.lock()?.send_frame(frame)?;
                if let Some(frame) = confirm {
                    self.deliver(Indication::DataConfirm(frame));
                }
                Ok(())
            },
            Request::Signal(signal) => self.lock()?.signal_request(signal),
            Request::Control(control) => self.lock()?.control_request(control),
        }
    }

    /// Start sending `data` on monitor channel `channel`. With a `target`,
    /// the channel reports [`MonitorEvent::TransmitComplete`] once that many
    /// bytes have gone out.
    pub fn monitor_transmit(&self, channel: usize, data: Frame, target: Option<usize>) -> Result<()> {
        self.lock()?.monitor_transmit(channel, data, target)
    }

    /// Take whatever monitor channel `channel` has received so far.
    pub fn monitor_receive(&self, channel: usize) -> Result<Option<Frame>> {
        self.lock()?.monitor_receive(channel)
    }

    pub fn status(&self) -> Result<Status> {
        let hw = self.lock()?;
        Ok(Status {
            line_state: hw.line_state,
            transmit_busy: hw.transfer.busy,
            transmit_queued: hw.transfer.has_next(),
            busy_timer_armed: hw.timer.is_armed(),
            link_busy: hw.transfer.link_busy,
            receive_queue: hw.transfer.queue.len(),
            errors: hw.transfer.errors,
        })
    }
}
