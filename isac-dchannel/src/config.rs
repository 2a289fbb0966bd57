use std::time::Duration;

/// How the ISAC is connected to the rest of the card.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InterfaceMode {
    /// IOM-1 timing.
    Iom1,
    /// IOM-2 timing. The common case.
    Iom2,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub mode: InterfaceMode,

    /// ADF2 value written in IOM-2 mode. Cards that need something other
    /// than plain IOM-2 terminal mode override it.
    pub adf2: u8,

    /// How long a FIFO fill may stay outstanding before the busy-recovery
    /// timer steps in.
    pub busy_timeout: Duration,

    /// Granularity of the busy-recovery timer. A timer callback that finds
    /// the hardware lock taken retries one tick later.
    pub timer_tick: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: InterfaceMode::Iom2,
            adf2: 0x80,
            busy_timeout: Duration::from_millis(80),
            timer_tick: Duration::from_millis(10),
        }
    }
}

impl Config {
    pub fn with_mode(mut self, mode: InterfaceMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_adf2(mut self, adf2: u8) -> Self {
        // Zero would select IOM-1 framing behind the mode's back.
        self.adf2 = if adf2 == 0 { 0x80 } else { adf2 };
        self
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub fn with_timer_tick(mut self, timer_tick: Duration) -> Self {
        self.timer_tick = timer_tick;
        self
    }
}
