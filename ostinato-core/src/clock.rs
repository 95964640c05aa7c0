//! Unit-period estimation from external MIDI clock pulses.

use std::time::Instant;

/// MIDI clock convention: 24 pulses per quarter note.
const PULSES_PER_QUARTER: f64 = 24.0;

/// Jitter threshold in seconds. Period changes smaller than this are not
/// propagated, so tempo wobble does not thrash every tape's period.
const CHANGE_HYSTERESIS: f64 = 0.01;

/// Converts periodic clock pulses into a smoothed unit-period estimate.
///
/// The first pulse after startup only establishes the reference timestamp;
/// no estimate is published until the second pulse, since the initial delta
/// would be an arbitrary span of wall-clock time.
#[derive(Debug)]
pub struct MidiClock {
    last_tick: Option<Instant>,
    period: f64,
    prev_period: f64,
    changed: bool,
}

impl MidiClock {
    pub fn new() -> Self {
        Self {
            last_tick: None,
            period: 1.0,
            prev_period: 1.0,
            changed: false,
        }
    }

    /// Register a clock pulse at `now`.
    pub fn tick(&mut self, now: Instant) {
        let last = match self.last_tick.replace(now) {
            Some(last) => last,
            None => return, // no signal yet
        };

        let dt = now.duration_since(last).as_secs_f64();
        self.period = PULSES_PER_QUARTER * dt;

        if (self.period - self.prev_period).abs() > CHANGE_HYSTERESIS {
            self.changed = true;
            self.prev_period = self.period;
        }
    }

    /// Current quarter-note period estimate in seconds.
    pub fn period(&self) -> f64 {
        self.period
    }

    /// If the estimate moved past the hysteresis threshold since the last
    /// call, returns the new period and clears the flag.
    pub fn take_changed(&mut self) -> Option<f64> {
        if self.changed {
            self.changed = false;
            Some(self.period)
        } else {
            None
        }
    }
}

impl Default for MidiClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_first_tick_publishes_nothing() {
        let mut clock = MidiClock::new();
        clock.tick(Instant::now());
        assert!(clock.take_changed().is_none());
    }

    #[test]
    fn test_second_tick_derives_period() {
        let mut clock = MidiClock::new();
        let t0 = Instant::now();
        clock.tick(t0);
        // 20.833ms between pulses = 120 BPM quarter note
        clock.tick(t0 + Duration::from_secs_f64(0.5 / 24.0));
        let period = clock.take_changed().expect("period should change");
        assert!((period - 0.5).abs() < 1e-9);
        // flag is cleared after take
        assert!(clock.take_changed().is_none());
    }

    #[test]
    fn test_jitter_below_hysteresis_not_published() {
        let mut clock = MidiClock::new();
        let t0 = Instant::now();
        clock.tick(t0);
        let t1 = t0 + Duration::from_secs_f64(0.5 / 24.0);
        clock.tick(t1);
        assert!(clock.take_changed().is_some());

        // next pulse wobbles by a fraction of a millisecond of quarter-note
        // period: under the 10ms threshold, so no new publish
        let t2 = t1 + Duration::from_secs_f64(0.5001 / 24.0);
        clock.tick(t2);
        assert!(clock.take_changed().is_none());

        // a real tempo change gets through
        let t3 = t2 + Duration::from_secs_f64(0.6 / 24.0);
        clock.tick(t3);
        let period = clock.take_changed().expect("tempo change should publish");
        assert!((period - 0.6).abs() < 1e-9);
    }
}
