//! Interrupt dispatch.
//!
//! Sources are handled in ISTA bit order, receive first. A bus error in one
//! handler does not keep the others from running; the first error is
//! returned once all of them had their turn.

use isac_pac::device::Bus;
use isac_pac::register::*;
use tracing::{debug, warn};

use crate::dchannel::Hardware;
use crate::error::Result;
use crate::event::Event;
use crate::state::LineState;

pub(crate) fn keep_first_error(result: &mut Result<()>, next: Result<()>) {
    if let Err(e) = next {
        warn!("{e}");
        if result.is_ok() {
            *result = Err(e);
        }
    }
}

impl<B> Hardware<B>
where B: Bus,
{
    pub(crate) fn interrupt(&mut self, ista: ISTA) -> Result<()> {
        debug!("ISAC ISTA {:02x}", u8::from(ista));

        let mut result = Ok(());
        if ista.RME() != 0 {
            keep_first_error(&mut result, self.receive_message_end());
        }
        if ista.RPF() != 0 {
            keep_first_error(&mut result, self.drain_fifo(0));
        }
        if ista.RSC() != 0 {
            warn!("ISAC RSC interrupt");
        }
        if ista.XPR() != 0 {
            keep_first_error(&mut result, self.transmit_pool_ready());
        }
        if ista.CISQ() != 0 {
            keep_first_error(&mut result, self.ci_change());
        }
        if ista.SIN() != 0 {
            warn!("ISAC SIN interrupt");
        }
        if ista.EXI() != 0 {
            keep_first_error(&mut result, self.extended_interrupt());
        }
        result
    }

    /// RME: end of frame. Whatever is left of it is in the FIFO.
    fn receive_message_end(&mut self) -> Result<()> {
        let rsta = self.isac.rsta().read()?;

        let result = if rsta.frame_valid() {
            self.receive_frame_end()
        } else {
            if rsta.RDO() != 0 {
                warn!("ISAC RDO");
                self.transfer.errors.receive_overrun += 1;
            }
            if rsta.CRC() == 0 {
                warn!("ISAC CRC error");
                self.transfer.errors.crc += 1;
            }
            if rsta.RAB() != 0 {
                debug!("ISAC RAB");
            }
            self.release_receive_fifo()
        };

        self.transfer.rx = None;
        self.events.schedule(Event::ReceiveBufferReady);
        result
    }

    fn receive_frame_end(&mut self) -> Result<()> {
        let count = self.isac.rbcl().read()?.RBC() as usize;
        self.drain_fifo(count)?;

        if let Some(rx) = self.transfer.rx.take() {
            if rx.overrun {
                warn!("dropping oversized D frame");
                self.transfer.errors.oversized += 1;
            } else {
                self.transfer.queue.push_back(rx.data);
            }
        }
        Ok(())
    }

    /// XPR: room for the next block, or the frame is out.
    fn transmit_pool_ready(&mut self) -> Result<()> {
        self.timer.disarm();
        self.clear_link_busy();

        if self.transfer.tx.remaining() > 0 {
            return self.fill_fifo();
        }
        if !self.promote_next()? {
            self.transfer.busy = false;
        }
        Ok(())
    }

    fn ci_change(&mut self) -> Result<()> {
        let cir0 = self.isac.cir0().read()?;
        debug!("ISAC CIR0 {:02x}", u8::from(cir0));

        if cir0.CIC0() != 0 {
            self.line_state = LineState::from_code(cir0.CODR());
            debug!(state = ?self.line_state, "ph_state");
            self.events.schedule(Event::LineStateChange);
        }
        if cir0.CIC1() != 0 {
            let cir1 = self.isac.cir1().read()?;
            debug!("ISAC CIR1 {:02x}", cir1);
        }
        Ok(())
    }

    fn extended_interrupt(&mut self) -> Result<()> {
        let exir = self.isac.exir().read()?;
        debug!("ISAC EXIR {:02x}", u8::from(exir));

        let mut result = Ok(());
        if exir.XMR() != 0 {
            warn!("ISAC XMR");
        }
        if exir.XDU() != 0 {
            keep_first_error(&mut result, self.transmit_underrun());
        }
        if exir.MOS() != 0 {
            let mosr = self.isac.mosr().read();
            let next = mosr.map_err(Into::into).and_then(|mosr| self.monitor_status(mosr));
            keep_first_error(&mut result, next);
        }
        result
    }

    /// XDU: the FIFO ran dry mid frame. Send the whole frame again.
    fn transmit_underrun(&mut self) -> Result<()> {
        warn!("ISAC XDU");
        self.transfer.errors.transmit_underrun += 1;
        self.timer.disarm();
        self.clear_link_busy();

        if self.transfer.busy {
            self.transfer.tx.restart();
            return self.fill_fifo();
        }

        warn!("ISAC XDU no frame in flight");
        if !self.promote_next()? {
            warn!("ISAC XDU nothing queued either");
        }
        Ok(())
    }
}
