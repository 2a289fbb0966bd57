//! Deferred notifications.
//!
//! Interrupt handling only records which notifications are owed. The bottom
//! half drains the set afterwards and talks to the upper layer, always in
//! the order of `Event::ALL`.

use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Event {
    ClearBusy,
    TransmitBufferReady,
    ReceiveBufferReady,
    LineStateChange,
    MonitorReceiveOverflow0,
    MonitorReceiveOverflow1,
    MonitorReceiveEnd0,
    MonitorReceiveEnd1,
    MonitorTransmitComplete0,
    MonitorTransmitComplete1,
    MonitorTransmitEnd0,
    MonitorTransmitEnd1,
}

impl Event {
    pub const ALL: [Event; 12] = [
        Event::ClearBusy,
        Event::TransmitBufferReady,
        Event::ReceiveBufferReady,
        Event::LineStateChange,
        Event::MonitorReceiveOverflow0,
        Event::MonitorReceiveOverflow1,
        Event::MonitorReceiveEnd0,
        Event::MonitorReceiveEnd1,
        Event::MonitorTransmitComplete0,
        Event::MonitorTransmitComplete1,
        Event::MonitorTransmitEnd0,
        Event::MonitorTransmitEnd1,
    ];

    fn bit(self) -> u16 {
        1 << (self as u8)
    }

    pub(crate) fn monitor_receive_overflow(channel: usize) -> Self {
        [Event::MonitorReceiveOverflow0, Event::MonitorReceiveOverflow1][channel]
    }

    pub(crate) fn monitor_receive_end(channel: usize) -> Self {
        [Event::MonitorReceiveEnd0, Event::MonitorReceiveEnd1][channel]
    }

    pub(crate) fn monitor_transmit_complete(channel: usize) -> Self {
        [Event::MonitorTransmitComplete0, Event::MonitorTransmitComplete1][channel]
    }

    pub(crate) fn monitor_transmit_end(channel: usize) -> Self {
        [Event::MonitorTransmitEnd0, Event::MonitorTransmitEnd1][channel]
    }
}

/// Set of pending events. Scheduling an event that is already pending is a
/// no-op, as with the bit-per-event word it models.
#[derive(Copy, Clone, Default, PartialEq, Eq)]
pub struct EventSet(u16);

impl EventSet {
    pub fn schedule(&mut self, event: Event) {
        self.0 |= event.bit();
    }

    pub fn contains(&self, event: Event) -> bool {
        self.0 & event.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Take every pending event, leaving the set empty.
    pub fn take(&mut self) -> EventSet {
        std::mem::take(self)
    }

    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        Event::ALL.into_iter().filter(move |&e| self.contains(e))
    }
}

impl fmt::Debug for EventSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_is_idempotent() {
        let mut set = EventSet::default();
        set.schedule(Event::ReceiveBufferReady);
        set.schedule(Event::ReceiveBufferReady);
        assert_eq!(set.iter().count(), 1);
    }

    #[test]
    fn drains_in_fixed_order() {
        let mut set = EventSet::default();
        set.schedule(Event::MonitorTransmitEnd1);
        set.schedule(Event::LineStateChange);
        set.schedule(Event::ClearBusy);
        set.schedule(Event::ReceiveBufferReady);

        let taken = set.take();
        assert!(set.is_empty());
        assert_eq!(taken.iter().collect::<Vec<_>>(), vec![
            Event::ClearBusy,
            Event::ReceiveBufferReady,
            Event::LineStateChange,
            Event::MonitorTransmitEnd1,
        ]);
    }

    #[test]
    fn monitor_events_per_channel() {
        assert_eq!(Event::monitor_receive_end(0), Event::MonitorReceiveEnd0);
        assert_eq!(Event::monitor_transmit_complete(1), Event::MonitorTransmitComplete1);
        assert_ne!(Event::monitor_receive_overflow(0), Event::monitor_receive_overflow(1));
    }
}
