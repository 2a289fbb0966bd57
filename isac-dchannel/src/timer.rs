//! D-channel busy recovery.
//!
//! Every FIFO fill arms a deadline. If no transmit interrupt disarms it in
//! time, either the line is occupied by another terminal (the transmitter
//! is still active) or the transmitter got stuck, in which case it is reset
//! and the frame goes out again from the start.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, select, Sender};
use isac_pac::device::Bus;
use isac_pac::register::CMDR;
use tracing::{debug, error, trace, warn};

use crate::dchannel::{DChannel, Hardware};
use crate::error::Result;

pub(crate) struct BusyTimer {
    timeout: Duration,
    deadline: Option<Instant>,
}

impl BusyTimer {
    pub(crate) fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: None,
        }
    }

    /// Returns whether the timer was already armed.
    pub(crate) fn arm(&mut self, now: Instant) -> bool {
        self.deadline.replace(now + self.timeout).is_some()
    }

    /// Returns whether the timer was armed.
    pub(crate) fn disarm(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub(crate) fn expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }
}

/// What one timer tick did.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TimerOutcome {
    /// Not armed.
    Idle,
    /// Armed, deadline not reached.
    Pending,
    /// The hardware lock was taken. Retried on the next tick.
    Rescheduled,
    /// Transmitter still active: the D channel is busy.
    LinkBusy,
    /// Transmitter was reset. The frame restarts from its first byte.
    Recovered,
}

impl<B> Hardware<B>
where B: Bus,
{
    pub(crate) fn busy_timer_expired(&mut self) -> Result<TimerOutcome> {
        // Left armed if either read fails.
        let rbch = self.isac.rbch().read()?;
        let star = self.isac.star().read()?;
        debug!("D-channel busy RBCH {:02x} STAR {:02x}", u8::from(rbch), u8::from(star));
        self.timer.disarm();

        if rbch.XAC() != 0 {
            self.transfer.link_busy = true;
            return Ok(TimerOutcome::LinkBusy);
        }

        if self.transfer.tx.idx == 0 {
            warn!("D-channel busy: nothing written yet");
        }
        self.transfer.tx.restart();
        self.isac.cmdr().set(CMDR::transmitter_reset())?;

        Ok(TimerOutcome::Recovered)
    }
}

/// Thread driving [`DChannel::busy_timer_tick`] every
/// [`Config::timer_tick`](crate::Config::timer_tick).
pub struct BusyTimerThread {
    shutdown: Sender<()>,
    handle: JoinHandle<()>,
}

impl BusyTimerThread {
    pub fn spawn<B>(dchannel: Arc<DChannel<B>>) -> std::io::Result<Self>
    where B: Bus + Send + 'static,
    {
        let (shutdown, shutdown_receiver) = channel::bounded::<()>(1);
        let tick = dchannel.timer_tick;

        let handle = thread::Builder::new()
            .name("isac_dbusy".into())
            .spawn(move || {
                let ticker = channel::tick(tick);
                loop {
                    select! {
                        recv(shutdown_receiver) -> _ => break,
                        recv(ticker) -> now => {
                            let Ok(now) = now else { break };
                            match dchannel.busy_timer_tick(now) {
                                Ok(TimerOutcome::Idle) | Ok(TimerOutcome::Pending) => {},
                                Ok(outcome) => trace!(?outcome, "busy timer"),
                                Err(e) => error!("busy timer: {e}"),
                            }
                        },
                    }
                }
            })?;

        Ok(Self {
            shutdown,
            handle,
        })
    }

    pub fn stop(self) {
        let _ = self.shutdown.send(());
        if self.handle.join().is_err() {
            error!("busy timer thread panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crossbeam::channel::unbounded;

    use crate::config::Config;
    use crate::dchannel::tests::attached;
    use crate::primitive::Request;

    fn after_timeout() -> Instant {
        Instant::now() + Config::default().busy_timeout + Duration::from_millis(1)
    }

    #[test]
    fn arm_reports_previous_state() {
        let mut timer = BusyTimer::new(Duration::from_millis(80));
        let now = Instant::now();
        assert!(!timer.arm(now));
        assert!(timer.arm(now));
        assert!(!timer.expired(now));
        assert!(timer.expired(now + Duration::from_millis(80)));
        assert!(timer.disarm());
        assert!(!timer.disarm());
        assert!(!timer.expired(now + Duration::from_secs(1)));
    }

    #[test]
    fn tick_idle_and_pending() {
        let (dchannel, bus, _receiver) = attached(Config::default());
        assert_eq!(dchannel.busy_timer_tick(after_timeout()).unwrap(), TimerOutcome::Idle);

        dchannel.request(Request::Data(vec![1, 2, 3])).unwrap();
        bus.take_ops();
        assert_eq!(dchannel.busy_timer_tick(Instant::now()).unwrap(), TimerOutcome::Pending);
        assert!(bus.ops().is_empty());
    }

    #[test]
    fn expiry_with_transmitter_active_marks_link_busy() {
        let (dchannel, bus, _receiver) = attached(Config::default());
        dchannel.request(Request::Data(vec![1, 2, 3])).unwrap();
        bus.take_ops();
        bus.push(0x2a, 0x80);

        assert_eq!(dchannel.busy_timer_tick(after_timeout()).unwrap(), TimerOutcome::LinkBusy);
        let status = dchannel.status().unwrap();
        assert!(status.link_busy);
        assert!(!status.busy_timer_armed);
        assert!(bus.writes().is_empty());
    }

    #[test]
    fn expiry_without_activity_resets_transmitter() {
        let (dchannel, bus, _receiver) = attached(Config::default());
        dchannel.request(Request::Data(vec![0x11; 50])).unwrap();
        bus.take_ops();

        assert_eq!(dchannel.busy_timer_tick(after_timeout()).unwrap(), TimerOutcome::Recovered);
        assert_eq!(bus.writes(), vec![(0x21, 0x01)]);
        assert!(!dchannel.status().unwrap().busy_timer_armed);

        // The transmitter reports ready after the reset and the frame
        // starts over.
        dchannel.interrupt(0x10).unwrap();
        assert_eq!(bus.fifo_writes(), vec![vec![0x11; 32]]);
    }

    #[test]
    fn expiry_retried_after_failed_status_read() {
        let (dchannel, bus, _receiver) = attached(Config::default());
        dchannel.request(Request::Data(vec![1, 2, 3])).unwrap();
        bus.take_ops();

        bus.fail_register_read(Some(0x2a));
        assert!(dchannel.busy_timer_tick(after_timeout()).is_err());
        assert!(dchannel.status().unwrap().busy_timer_armed);
        assert!(bus.writes().is_empty());

        bus.fail_register_read(None);
        assert_eq!(dchannel.busy_timer_tick(after_timeout()).unwrap(), TimerOutcome::Recovered);
        assert!(!dchannel.status().unwrap().busy_timer_armed);
    }

    #[test]
    fn link_busy_cleared_by_transmit_ready() {
        let (dchannel, bus, receiver) = attached(Config::default());
        dchannel.request(Request::Data(vec![1, 2, 3])).unwrap();
        receiver.try_recv().unwrap();
        bus.push(0x2a, 0x80);
        dchannel.busy_timer_tick(after_timeout()).unwrap();

        dchannel.interrupt(0x10).unwrap();
        assert!(!dchannel.status().unwrap().link_busy);
        // ClearBusy only logs.
        assert_eq!(dchannel.bottom_half().unwrap(), 0);
    }

    #[test]
    fn thread_stops() {
        let (sender, _receiver) = unbounded();
        let bus = crate::mock::MockBus::new();
        let config = Config::default().with_timer_tick(Duration::from_millis(1));
        let dchannel = Arc::new(DChannel::attach(bus, config, sender).unwrap());
        let thread = BusyTimerThread::spawn(dchannel.clone()).unwrap();
        thread::sleep(Duration::from_millis(5));
        thread.stop();
        assert_eq!(Arc::strong_count(&dchannel), 1);
    }
}
