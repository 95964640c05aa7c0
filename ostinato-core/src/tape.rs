//! Per-key circular event timeline.
//!
//! A tape is one loop period mapped onto the ring [0, 1). Recorded note
//! on/off events sit at normalized positions on that ring; the cursor
//! `npos` sweeps it once per period, firing every event the sweep passes.
//! A fired event plays back when the key is up, and is erased when the key
//! is held (overdub punch-in erases what it sweeps over).

use std::time::{Duration, Instant};

/// Notes shorter than this are treated as key chatter and dropped.
const MIN_NOTE_SECONDS: f64 = 0.01;

pub type EventId = u64;

/// On/off sense of a recorded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteSense {
    On,
    Off,
}

/// One recorded event on the tape.
///
/// `partner` is the id of the paired on/off event, used for cascading
/// deletion only. Pairing is symmetric: an event's partner always refers
/// back to it, and no event pairs with more than one partner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TapeEvent {
    pub id: EventId,
    /// Position on the ring, in [0, 1) of one period.
    pub ntime: f64,
    pub sense: NoteSense,
    pub velocity: u8,
    pub partner: Option<EventId>,
}

/// A timestamped half of a note, created at key press or release and
/// paired into the tape by [`Tape::add_note`].
#[derive(Debug, Clone, Copy)]
pub struct PendingNote {
    pub at: Instant,
    pub ntime: f64,
    pub velocity: u8,
}

/// The circular timeline for one key.
pub struct Tape {
    /// Sorted ascending by `ntime`; ties keep insertion order.
    events: Vec<TapeEvent>,
    /// Scanner: index of the next unfired event relative to `npos`.
    index: usize,
    /// Cursor position in [0, 1).
    npos: f64,
    /// Loop period in seconds, always > 0.
    period: f64,
    /// Wall-clock start of the current loop pass.
    clip_start: Instant,
    next_id: EventId,
}

impl Tape {
    pub fn new(now: Instant) -> Self {
        Self {
            events: Vec::new(),
            index: 0,
            npos: 0.0,
            period: 1.0,
            clip_start: now,
            next_id: 0,
        }
    }

    pub fn period(&self) -> f64 {
        self.period
    }

    pub fn npos(&self) -> f64 {
        self.npos
    }

    pub fn events(&self) -> &[TapeEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Change the loop period, rescaling the loop epoch so the cursor keeps
    /// its normalized position (a live quantization change warps time rather
    /// than snapping the cursor).
    pub fn set_period(&mut self, seconds: f64, now: Instant) {
        if seconds <= 0.0 || seconds == self.period {
            return;
        }
        let elapsed = now.saturating_duration_since(self.clip_start).as_secs_f64();
        self.clip_start = now - Duration::from_secs_f64(seconds * elapsed / self.period);
        self.period = seconds;
    }

    /// Timestamp one half of a note at the tape's current position.
    pub fn stamp(&self, now: Instant, velocity: u8) -> PendingNote {
        let ntime = now.saturating_duration_since(self.clip_start).as_secs_f64() / self.period;
        PendingNote {
            at: now,
            ntime,
            velocity,
        }
    }

    /// Record a complete note. The pair is inserted only when the measured
    /// duration fits the loop: chatter-short and longer-than-period notes
    /// are dropped silently by policy.
    pub fn add_note(&mut self, on: PendingNote, off: PendingNote) {
        let duration = off.at.saturating_duration_since(on.at).as_secs_f64();
        if duration <= MIN_NOTE_SECONDS || duration >= self.period {
            log::debug!(
                target: "tape",
                "dropping note: duration {:.4}s outside ({}, {:.3})",
                duration,
                MIN_NOTE_SECONDS,
                self.period
            );
            return;
        }

        let on_id = self.alloc_id();
        let off_id = self.alloc_id();
        self.insert_event(TapeEvent {
            id: on_id,
            ntime: on.ntime,
            sense: NoteSense::On,
            velocity: on.velocity,
            partner: Some(off_id),
        });
        self.insert_event(TapeEvent {
            id: off_id,
            ntime: off.ntime,
            sense: NoteSense::Off,
            velocity: off.velocity,
            partner: Some(on_id),
        });
    }

    /// Advance the cursor by `dt` seconds and return the events swept over,
    /// in traversal order. While the key is held the swept events are erased
    /// from the tape instead (active overdub), and nothing is returned.
    ///
    /// A delta longer than the whole period means the scheduler stalled;
    /// skipping a full loop would fire everything spuriously, so it is a
    /// no-op.
    pub fn update(&mut self, dt: f64, held: bool) -> Vec<TapeEvent> {
        if dt > self.period {
            return Vec::new();
        }

        let old = self.npos;
        let mut new = self.npos + dt / self.period;
        let wrapped = new >= 1.0;
        if wrapped {
            new -= 1.0;
            self.clip_start += Duration::from_secs_f64(self.period);
        }
        self.npos = new;

        if self.events.is_empty() {
            self.index = 0;
            return Vec::new();
        }

        let swept = self.traversed(old, new, wrapped);
        let result = if held {
            for id in swept {
                // partner cascade may have removed it already; erase is benign then
                self.erase_event(id);
            }
            Vec::new()
        } else {
            swept
                .iter()
                .filter_map(|id| self.events.iter().find(|e| e.id == *id).copied())
                .collect()
        };
        // re-aim the scanner at the first event ahead of the new cursor
        self.index = self
            .events
            .iter()
            .position(|e| e.ntime >= new)
            .unwrap_or(0);
        result
    }

    /// Punch-in: if the current position falls inside a recorded note (the
    /// event immediately preceding the cursor is a note-on), erase that
    /// note's pair. Re-pressing a key while its tape sounds a note deletes
    /// the in-flight recording.
    pub fn cut(&mut self, now: Instant) {
        if self.events.is_empty() {
            return;
        }
        let ntime = now.saturating_duration_since(self.clip_start).as_secs_f64() / self.period;
        let point = self.insertion_point(ntime);
        let preceding = if point == 0 {
            self.events.len() - 1
        } else {
            point - 1
        };
        let ev = self.events[preceding];
        if ev.sense == NoteSense::On {
            self.erase_event(ev.id);
        }
    }

    /// Remove an event and, if paired, its partner. On/off halves never
    /// survive alone. Erasing an id no longer present is a no-op.
    pub fn erase_event(&mut self, id: EventId) {
        let Some(pos) = self.events.iter().position(|e| e.id == id) else {
            return;
        };
        let partner = self.events[pos].partner;
        self.events.remove(pos);
        if pos < self.index {
            self.index -= 1;
        }

        if let Some(pid) = partner {
            if let Some(ppos) = self.events.iter().position(|e| e.id == pid) {
                self.events.remove(ppos);
                if ppos < self.index {
                    self.index -= 1;
                }
            }
        }
    }

    /// Drop every event and rewind the scanner. Used when loop mode is
    /// switched off globally.
    pub fn clear(&mut self) {
        self.events.clear();
        self.index = 0;
    }

    fn alloc_id(&mut self) -> EventId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// First index whose event lies strictly after `ntime`; equal times
    /// insert after, preserving arrival order for ties.
    fn insertion_point(&self, ntime: f64) -> usize {
        self.events
            .iter()
            .position(|e| e.ntime > ntime)
            .unwrap_or(self.events.len())
    }

    fn insert_event(&mut self, ev: TapeEvent) {
        let point = self.insertion_point(ev.ntime);
        self.events.insert(point, ev);
        // keep the scanner aimed at the first event ahead of the cursor
        self.index = self
            .events
            .iter()
            .position(|e| e.ntime >= self.npos)
            .unwrap_or(0);
    }

    /// Ids of the events inside the swept interval [old, new), circularly,
    /// in traversal order starting from the scanner.
    fn traversed(&self, old: f64, new: f64, wrapped: bool) -> Vec<EventId> {
        let n = self.events.len();
        let start = if self.index < n { self.index } else { 0 };

        let mut out = Vec::new();
        for k in 0..n {
            let ev = &self.events[(start + k) % n];
            if in_swept_interval(old, ev.ntime, new, wrapped) {
                out.push(ev.id);
            } else {
                break;
            }
        }
        out
    }
}

/// Membership in the half-open circular interval [old, new). A wrap with
/// old == new means a full period was traversed and everything is swept.
fn in_swept_interval(old: f64, t: f64, new: f64, wrapped: bool) -> bool {
    if wrapped {
        t >= old || t < new
    } else {
        t >= old && t < new
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tape_with_period(period: f64) -> (Tape, Instant) {
        let t0 = Instant::now();
        let mut tape = Tape::new(t0);
        tape.set_period(period, t0);
        (tape, t0)
    }

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    fn record(tape: &mut Tape, t0: Instant, on_at: f64, off_at: f64) {
        let on = tape.stamp(t0 + secs(on_at), 100);
        let off = tape.stamp(t0 + secs(off_at), 64);
        tape.add_note(on, off);
    }

    #[test]
    fn test_add_note_pairs_and_sorts() {
        let (mut tape, t0) = tape_with_period(1.0);
        record(&mut tape, t0, 0.0, 0.5);

        let events = tape.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].sense, NoteSense::On);
        assert!((events[0].ntime - 0.0).abs() < 1e-9);
        assert_eq!(events[1].sense, NoteSense::Off);
        assert!((events[1].ntime - 0.5).abs() < 1e-9);
        // symmetric pairing
        assert_eq!(events[0].partner, Some(events[1].id));
        assert_eq!(events[1].partner, Some(events[0].id));
    }

    #[test]
    fn test_add_note_keeps_sort_order() {
        let (mut tape, t0) = tape_with_period(1.0);
        record(&mut tape, t0, 0.6, 0.8);
        record(&mut tape, t0, 0.1, 0.3);

        let times: Vec<f64> = tape.events().iter().map(|e| e.ntime).collect();
        let mut sorted = times.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(times, sorted);
        assert_eq!(tape.events().len(), 4);
    }

    #[test]
    fn test_chatter_note_dropped() {
        let (mut tape, t0) = tape_with_period(1.0);
        record(&mut tape, t0, 0.2, 0.205);
        assert!(tape.is_empty());
    }

    #[test]
    fn test_overlong_note_dropped() {
        let (mut tape, t0) = tape_with_period(1.0);
        let on = tape.stamp(t0, 100);
        let off = tape.stamp(t0 + secs(1.0), 64);
        tape.add_note(on, off);
        assert!(tape.is_empty());
    }

    #[test]
    fn test_erase_event_removes_pair() {
        let (mut tape, t0) = tape_with_period(1.0);
        record(&mut tape, t0, 0.1, 0.4);
        let on_id = tape.events()[0].id;
        tape.erase_event(on_id);
        assert!(tape.is_empty());
    }

    #[test]
    fn test_erase_missing_event_is_noop() {
        let (mut tape, t0) = tape_with_period(1.0);
        record(&mut tape, t0, 0.1, 0.4);
        tape.erase_event(999);
        assert_eq!(tape.events().len(), 2);
    }

    #[test]
    fn test_update_fires_only_swept_events() {
        let (mut tape, t0) = tape_with_period(1.0);
        record(&mut tape, t0, 0.1, 0.4);
        record(&mut tape, t0, 0.7, 0.9);

        // sweep [0, 0.5): fires the on at 0.1 and off at 0.4 only
        let fired = tape.update(0.5, false);
        assert_eq!(fired.len(), 2);
        assert_eq!(fired[0].sense, NoteSense::On);
        assert_eq!(fired[1].sense, NoteSense::Off);

        // sweep [0.5, 1.0): fires the later pair
        let fired = tape.update(0.4999, false);
        assert_eq!(fired.len(), 2);
        assert!((fired[0].ntime - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_update_full_period_fires_in_order() {
        let (mut tape, t0) = tape_with_period(1.0);
        record(&mut tape, t0, 0.0, 0.5);

        let fired = tape.update(1.0, false);
        assert_eq!(fired.len(), 2);
        assert_eq!(fired[0].sense, NoteSense::On);
        assert_eq!(fired[1].sense, NoteSense::Off);
        // cursor wrapped back to where it started
        assert!(tape.npos() < 1e-9);
    }

    #[test]
    fn test_update_stall_guard() {
        let (mut tape, t0) = tape_with_period(1.0);
        record(&mut tape, t0, 0.1, 0.4);
        let fired = tape.update(3.0, false);
        assert!(fired.is_empty());
        assert!(tape.npos() < 1e-9);
    }

    #[test]
    fn test_update_while_held_erases() {
        let (mut tape, t0) = tape_with_period(1.0);
        record(&mut tape, t0, 0.1, 0.4);
        record(&mut tape, t0, 0.7, 0.9);

        let fired = tape.update(0.5, true);
        assert!(fired.is_empty());
        // swept pair gone, unswept pair (and its partner) intact
        assert_eq!(tape.events().len(), 2);
        assert!((tape.events()[0].ntime - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_update_wraparound_interval() {
        let (mut tape, t0) = tape_with_period(1.0);
        // park the cursor at 0.9 before anything is recorded
        assert!(tape.update(0.9, false).is_empty());
        record(&mut tape, t0, 0.05, 0.3);

        // sweep [0.9, 0.2) through the wrap: only the on at 0.05 fires
        let fired = tape.update(0.3, false);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].sense, NoteSense::On);
    }

    #[test]
    fn test_set_period_preserves_cursor() {
        let (mut tape, t0) = tape_with_period(2.0);
        tape.update(0.5, false); // npos = 0.25
        let before = tape.npos();

        tape.set_period(1.0, t0 + secs(0.5));
        assert!((tape.npos() - before).abs() < 1e-9);
        // and the wall-clock position agrees with the warped epoch
        let stamped = tape.stamp(t0 + secs(0.5), 0);
        assert!((stamped.ntime - before).abs() < 1e-6);
    }

    #[test]
    fn test_cut_inside_sounding_note() {
        let (mut tape, t0) = tape_with_period(1.0);
        record(&mut tape, t0, 0.1, 0.6);
        record(&mut tape, t0, 0.7, 0.9);

        // 0.3 lies between the on at 0.1 and the off at 0.6
        tape.cut(t0 + secs(0.3));
        assert_eq!(tape.events().len(), 2);
        assert!((tape.events()[0].ntime - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_cut_outside_note_is_noop() {
        let (mut tape, t0) = tape_with_period(1.0);
        record(&mut tape, t0, 0.1, 0.3);

        // 0.5 lies after the off: preceding event is a note-off
        tape.cut(t0 + secs(0.5));
        assert_eq!(tape.events().len(), 2);
    }

    #[test]
    fn test_clear() {
        let (mut tape, t0) = tape_with_period(1.0);
        record(&mut tape, t0, 0.1, 0.3);
        tape.clear();
        assert!(tape.is_empty());
    }
}
