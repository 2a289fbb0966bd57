//! IOM-2 monitor channels.
//!
//! Byte-wise handshaked message exchange with the layer 1 transceiver, one
//! direction at a time per channel. MOCR is write-only and covers both
//! channels, so every change goes through the shadow copy.

use isac_pac::device::Bus;
use isac_pac::register::{MonitorControl, MOCR, MOSR, MONITOR_CHANNELS_COUNT};
use tracing::{debug, warn};

use crate::dchannel::Hardware;
use crate::error::{Error, Result};
use crate::event::Event;
use crate::interrupt::keep_first_error;
use crate::primitive::Frame;

/// Capacity of a monitor receive buffer.
pub const MAX_MON_FRAME: usize = 32;

struct MonitorTransmit {
    data: Frame,
    pos: usize,
    target: Option<usize>,
}

impl MonitorTransmit {
    fn target_reached(&self) -> bool {
        self.target.is_some_and(|target| self.pos >= target)
    }

    fn exhausted(&self) -> bool {
        self.pos >= self.data.len()
    }
}

#[derive(Default)]
struct MonitorChannel {
    rx: Option<Frame>,
    tx: Option<MonitorTransmit>,
}

#[derive(Default)]
pub(crate) struct Monitor {
    pub(crate) mocr: MOCR,
    channels: [MonitorChannel; MONITOR_CHANNELS_COUNT],
}

impl Monitor {
    pub(crate) fn release_buffers(&mut self) {
        for channel in self.channels.iter_mut() {
            channel.rx = None;
            channel.tx = None;
        }
    }
}

fn check_channel(channel: usize) -> Result<()> {
    if channel < MONITOR_CHANNELS_COUNT {
        Ok(())
    } else {
        Err(Error::InvalidArgument(format!("monitor channel {channel}")))
    }
}

impl<B> Hardware<B>
where B: Bus,
{
    fn monitor_control(&mut self, channel: usize, control: MonitorControl) -> Result<()> {
        self.monitor.mocr = self.monitor.mocr.with_channel(channel, control);
        self.isac.mocr().set(self.monitor.mocr)?;
        Ok(())
    }

    /// Drop the handshake, then go back to listening.
    fn monitor_stop(&mut self, channel: usize) -> Result<()> {
        self.monitor_control(channel, MonitorControl::off())?;
        self.monitor_control(channel, MonitorControl::idle())
    }

    /// Handle one MOSR value. Receive events of both channels are handled
    /// before any transmit event.
    pub(crate) fn monitor_status(&mut self, mosr: MOSR) -> Result<()> {
        debug!("ISAC MOSR {:02x}", u8::from(mosr));

        let mut result = Ok(());
        for channel in 0..MONITOR_CHANNELS_COUNT {
            if mosr.channel(channel).MDR() != 0 {
                keep_first_error(&mut result, self.monitor_data_received(channel));
            }
        }
        for channel in 0..MONITOR_CHANNELS_COUNT {
            if mosr.channel(channel).MER() != 0 {
                keep_first_error(&mut result, self.monitor_receive_end(channel));
            }
        }
        for channel in 0..MONITOR_CHANNELS_COUNT {
            let status = mosr.channel(channel);
            if status.MDA() != 0 {
                keep_first_error(&mut result, self.monitor_data_acknowledged(channel, status.MDR() != 0));
            }
        }
        for channel in 0..MONITOR_CHANNELS_COUNT {
            if mosr.channel(channel).MAB() != 0 {
                keep_first_error(&mut result, self.monitor_abort(channel));
            }
        }
        result
    }

    fn monitor_receive_overflow(&mut self, channel: usize) -> Result<()> {
        self.events.schedule(Event::monitor_receive_overflow(channel));
        self.monitor_control(channel, MonitorControl::idle())
    }

    fn monitor_data_received(&mut self, channel: usize) -> Result<()> {
        if self.monitor.channels[channel].rx.is_none() {
            let mut buffer = Vec::new();
            if buffer.try_reserve_exact(MAX_MON_FRAME).is_err() {
                warn!(channel, "monitor receive out of memory");
                return self.monitor_receive_overflow(channel);
            }
            self.monitor.channels[channel].rx = Some(buffer);
        }

        let len = self.monitor.channels[channel].rx.as_ref().map_or(0, Vec::len);
        if len >= MAX_MON_FRAME {
            warn!(channel, "monitor receive overflow");
            if let Some(rx) = self.monitor.channels[channel].rx.as_mut() {
                rx.clear();
            }
            return self.monitor_receive_overflow(channel);
        }

        let byte = self.isac.mor(channel).read()?;
        if let Some(rx) = self.monitor.channels[channel].rx.as_mut() {
            rx.push(byte);
        }
        debug!(channel, "monitor rx {:02x}", byte);

        if len == 0 {
            let control = self.monitor.mocr.channel(channel).with_MRC(1);
            self.monitor_control(channel, control)?;
        }
        Ok(())
    }

    fn monitor_receive_end(&mut self, channel: usize) -> Result<()> {
        self.events.schedule(Event::monitor_receive_end(channel));
        self.monitor_stop(channel)
    }

    /// The far end took the last byte. `receiving` is set when the same
    /// status also reported data for this channel.
    fn monitor_data_acknowledged(&mut self, channel: usize, receiving: bool) -> Result<()> {
        let (active, reached, exhausted) = match &self.monitor.channels[channel].tx {
            Some(tx) => (true, tx.target_reached(), tx.exhausted()),
            None => (false, false, false),
        };

        if reached {
            self.monitor.channels[channel].tx = None;
            self.events.schedule(Event::monitor_transmit_complete(channel));
            if receiving {
                return Ok(());
            }
            return self.monitor_stop(channel);
        }

        if !active || exhausted {
            self.monitor.channels[channel].tx = None;
            return self.monitor_stop(channel);
        }

        let Some(tx) = self.monitor.channels[channel].tx.as_mut() else {
            return Ok(());
        };
        let byte = tx.data[tx.pos];
        tx.pos += 1;
        self.isac.mox(channel).set(byte)?;
        debug!(channel, "monitor tx {:02x}", byte);
        Ok(())
    }

    fn monitor_abort(&mut self, channel: usize) -> Result<()> {
        self.monitor.channels[channel].tx = None;
        self.events.schedule(Event::monitor_transmit_end(channel));
        self.monitor_stop(channel)
    }

    pub(crate) fn monitor_transmit(&mut self, channel: usize, data: Frame, target: Option<usize>) -> Result<()> {
        check_channel(channel)?;
        if data.is_empty() {
            return Err(Error::InvalidArgument("empty monitor message".into()));
        }
        if target == Some(0) {
            return Err(Error::InvalidArgument("monitor target of zero bytes".into()));
        }
        if self.monitor.channels[channel].tx.is_some() {
            return Err(Error::MonitorBusy(channel));
        }

        let target = target.map(|target| target.min(data.len()));

        self.monitor_control(channel, MonitorControl::idle())?;
        let mosr = self.isac.mosr().read()?;
        debug!(channel, "monitor tx start, MOSR {:02x}", u8::from(mosr));
        self.isac.mox(channel).set(data[0])?;
        self.monitor.channels[channel].tx = Some(MonitorTransmit {
            data,
            pos: 1,
            target,
        });

        let control = self.monitor.mocr.channel(channel).with_MXC(1);
        self.monitor_control(channel, control)
    }

    pub(crate) fn monitor_receive(&mut self, channel: usize) -> Result<Option<Frame>> {
        check_channel(channel)?;
        Ok(self.monitor.channels[channel].rx.take())
    }
}
