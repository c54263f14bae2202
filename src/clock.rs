use std::time::{Duration, Instant};

use crate::error::{Result, WsprError};
use crate::sink::StatusSink;

/// Tick interval, deliberately a touch longer than one second so the mirror
/// lags the once-per-second GPS reports instead of outrunning them.
const TICK_INTERVAL: Duration = Duration::from_millis(1005);

/// A locally advancing UTC clock disciplined by the device's GPS time.
///
/// The transmitter stops emitting GPS time frames during each transmit
/// burst. The mirror keeps the displayed clock moving through those gaps
/// and re-locks the moment a fresh authoritative value arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorClock {
    hour: u8,
    minute: u8,
    second: u8,
    /// Deadline of the pending tick; `None` until the first valid set.
    next_tick: Option<Instant>,
}

impl MirrorClock {
    pub fn new() -> Self {
        Self {
            hour: 0,
            minute: 0,
            second: 0,
            next_tick: None,
        }
    }

    /// True once a valid time has been set and the tick is armed.
    pub fn is_armed(&self) -> bool {
        self.next_tick.is_some()
    }

    /// Discipline the clock to an authoritative `hh:mm:ss` value.
    ///
    /// Cancels the pending tick and arms a new one. A malformed or
    /// out-of-range string leaves the previous state untouched, pending
    /// tick included.
    pub fn set_time(&mut self, text: &str, now: Instant) -> Result<()> {
        let fields: Vec<&str> = text.split(':').collect();
        let [h, m, s] = fields.as_slice() else {
            return Err(WsprError::ClockParse(text.to_string()));
        };
        let (hour, minute, second) = match (h.parse::<u8>(), m.parse::<u8>(), s.parse::<u8>()) {
            (Ok(h), Ok(m), Ok(s)) if h <= 23 && m <= 59 && s <= 59 => (h, m, s),
            _ => return Err(WsprError::ClockParse(text.to_string())),
        };

        self.hour = hour;
        self.minute = minute;
        self.second = second;
        self.next_tick = Some(now + TICK_INTERVAL);
        Ok(())
    }

    /// Advance the clock if the pending tick has come due, pushing the new
    /// time to the sink and re-arming. Called from the engine's loop.
    pub fn poll(&mut self, now: Instant, sink: &mut dyn StatusSink) {
        let Some(deadline) = self.next_tick else {
            return;
        };
        if now < deadline {
            return;
        }
        self.tick();
        self.next_tick = Some(now + TICK_INTERVAL);
        sink.time(&self.time_string());
    }

    /// One carry-propagating step: 59 seconds carries into minutes, 59
    /// minutes into hours, hour 23 wraps to 0.
    fn tick(&mut self) {
        self.second += 1;
        if self.second > 59 {
            self.second = 0;
            self.minute += 1;
            if self.minute > 59 {
                self.minute = 0;
                self.hour += 1;
                if self.hour > 23 {
                    self.hour = 0;
                }
            }
        }
    }

    /// Current time as `hh:mm:ss`.
    pub fn time_string(&self) -> String {
        format!("{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

impl Default for MirrorClock {
    fn default() -> Self {
        Self::new()
    }
}
