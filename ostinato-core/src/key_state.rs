//! Held/sounding state machine for one (channel, note) key.

use std::time::Instant;

use ostinato_types::MidiEvent;

use crate::midi::MidiSink;
use crate::repeater::Modifiers;
use crate::tape::{NoteSense, PendingNote, Tape};

/// Velocity for synthesized releases (notes we turn off ourselves).
const RELEASE_VELOCITY: u8 = 64;

/// One key's state: whether it is physically held, whether it is currently
/// sounding, its tape, and the unmatched note-on waiting for its release.
pub struct KeyState {
    note: u8,
    channel: u8,
    /// Physical key currently down.
    pub held: bool,
    /// Currently sounding (live or from tape).
    pub on: bool,
    tape: Tape,
    /// Open note-on, present only between a live press and its release.
    current: Option<PendingNote>,
}

impl KeyState {
    pub fn new(channel: u8, note: u8, now: Instant) -> Self {
        Self {
            note,
            channel,
            held: false,
            on: false,
            tape: Tape::new(now),
            current: None,
        }
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn tape(&self) -> &Tape {
        &self.tape
    }

    pub fn clear_tape(&mut self) {
        self.tape.clear();
    }

    /// Key pressed. Under loop mode a press while the tape is sounding this
    /// key is a punch-in: the in-flight recorded note is cut before the new
    /// press starts. Under sustain/lock a sounding note is released first so
    /// the retrigger never double-sounds.
    pub fn note_on(
        &mut self,
        velocity: u8,
        mods: &Modifiers,
        out: &mut dyn MidiSink,
        now: Instant,
    ) {
        self.held = true;

        if mods.looping {
            if self.on {
                self.tape.cut(now);
                self.turn_off(out);
            }
        } else if (mods.sustain || mods.lock) && self.on {
            self.turn_off(out);
        }

        out.send(&MidiEvent::note_on(self.channel, self.note, velocity));
        self.on = true;
        self.current = Some(self.tape.stamp(now, velocity));
    }

    /// Key released. Under loop mode the completed note is committed to the
    /// tape. Otherwise the release passes through unless sustain or lock is
    /// holding the note open.
    pub fn note_off(
        &mut self,
        velocity: u8,
        mods: &Modifiers,
        out: &mut dyn MidiSink,
        now: Instant,
    ) {
        self.held = false;

        if mods.looping {
            if let Some(on) = self.current.take() {
                let off = self.tape.stamp(now, velocity);
                self.tape.add_note(on, off);
            }
            out.send(&MidiEvent::note_off(self.channel, self.note, velocity));
            self.on = false;
        } else if !(mods.sustain || mods.lock) {
            out.send(&MidiEvent::note_off(self.channel, self.note, velocity));
            self.on = false;
        }

        self.current = None;
    }

    /// Stop sounding now, synthesizing the release.
    pub fn turn_off(&mut self, out: &mut dyn MidiSink) {
        self.on = false;
        out.send(&MidiEvent::note_off(self.channel, self.note, RELEASE_VELOCITY));
    }

    /// Advance this key's tape; fired events become output and move the
    /// sounding flag, which is how tape-held notes speak without the key
    /// being touched.
    pub fn update(&mut self, dt: f64, out: &mut dyn MidiSink) {
        for ev in self.tape.update(dt, self.held) {
            self.on = ev.sense == NoteSense::On;
            let msg = match ev.sense {
                NoteSense::On => MidiEvent::note_on(self.channel, self.note, ev.velocity),
                NoteSense::Off => MidiEvent::note_off(self.channel, self.note, ev.velocity),
            };
            out.send(&msg);
        }
    }

    /// Loop period from pitch: semitones from middle C map linearly onto
    /// the [low_q, high_q] exponent range, floored so every period is a
    /// power-of-two multiple or division of the unit period.
    pub fn set_quantized_period(&mut self, low_q: f64, high_q: f64, unit: f64, now: Instant) {
        let exponent = (((self.note as f64 - 60.0) / 60.0) * (high_q - low_q) + low_q).floor();
        self.tape.set_period(unit * exponent.exp2(), now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::CaptureSink;
    use std::time::Duration;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    fn looping() -> Modifiers {
        Modifiers {
            looping: true,
            ..Modifiers::default()
        }
    }

    #[test]
    fn test_passthrough_without_modifiers() {
        let t0 = Instant::now();
        let mut key = KeyState::new(0, 60, t0);
        let mut out = CaptureSink::default();
        let mods = Modifiers::default();

        key.note_on(100, &mods, &mut out, t0);
        assert!(key.held && key.on);
        key.note_off(20, &mods, &mut out, t0 + secs(0.2));
        assert!(!key.held && !key.on);

        assert_eq!(
            out.sent,
            vec![
                MidiEvent::note_on(0, 60, 100),
                MidiEvent::note_off(0, 60, 20)
            ]
        );
    }

    #[test]
    fn test_sustain_holds_release() {
        let t0 = Instant::now();
        let mut key = KeyState::new(0, 60, t0);
        let mut out = CaptureSink::default();
        let mods = Modifiers {
            sustain: true,
            ..Modifiers::default()
        };

        key.note_on(100, &mods, &mut out, t0);
        key.note_off(0, &mods, &mut out, t0 + secs(0.2));
        // release swallowed: the note keeps sounding
        assert!(!key.held);
        assert!(key.on);
        assert_eq!(out.sent.len(), 1);
    }

    #[test]
    fn test_sustain_retrigger_releases_first() {
        let t0 = Instant::now();
        let mut key = KeyState::new(0, 60, t0);
        let mut out = CaptureSink::default();
        let mods = Modifiers {
            sustain: true,
            ..Modifiers::default()
        };

        key.note_on(100, &mods, &mut out, t0);
        key.note_off(0, &mods, &mut out, t0 + secs(0.2));
        key.note_on(90, &mods, &mut out, t0 + secs(0.4));

        // on, then synthesized off, then the retriggered on
        assert_eq!(out.sent.len(), 3);
        assert!(matches!(out.sent[1], MidiEvent::NoteOff { .. }));
        assert!(matches!(out.sent[2], MidiEvent::NoteOn { velocity: 90, .. }));
    }

    #[test]
    fn test_loop_records_to_tape() {
        let t0 = Instant::now();
        let mut key = KeyState::new(0, 60, t0);
        let mut out = CaptureSink::default();
        let mods = looping();

        key.set_quantized_period(0.0, 0.0, 1.0, t0);
        key.note_on(100, &mods, &mut out, t0);
        key.note_off(64, &mods, &mut out, t0 + secs(0.5));

        assert_eq!(key.tape().events().len(), 2);
        assert!(!key.on);
        // both live messages passed through while recording
        assert_eq!(out.sent.len(), 2);
    }

    #[test]
    fn test_loop_replays_when_key_up() {
        let t0 = Instant::now();
        let mut key = KeyState::new(0, 60, t0);
        let mut out = CaptureSink::default();
        let mods = looping();

        key.set_quantized_period(0.0, 0.0, 1.0, t0);
        key.note_on(100, &mods, &mut out, t0);
        key.note_off(64, &mods, &mut out, t0 + secs(0.5));
        out.sent.clear();

        // one full pass replays on then off and tracks the sounding flag
        key.update(1.0, &mut out);
        assert_eq!(
            out.sent,
            vec![
                MidiEvent::note_on(0, 60, 100),
                MidiEvent::note_off(0, 60, 64)
            ]
        );
        assert!(!key.on);
    }

    #[test]
    fn test_loop_punch_in_cuts_playing_note() {
        let t0 = Instant::now();
        let mut key = KeyState::new(0, 60, t0);
        let mut out = CaptureSink::default();
        let mods = looping();

        key.set_quantized_period(0.0, 0.0, 1.0, t0);
        key.note_on(100, &mods, &mut out, t0);
        key.note_off(64, &mods, &mut out, t0 + secs(0.5));

        // sweep into the middle of the recorded note so it is sounding
        key.update(0.25, &mut out);
        assert!(key.on);
        out.sent.clear();

        // re-press at 0.25, inside the recorded note: the pair is cut,
        // the key forced off, then the new press passes through
        key.note_on(80, &mods, &mut out, t0 + secs(0.25));
        assert!(key.tape().is_empty());
        assert!(matches!(out.sent[0], MidiEvent::NoteOff { .. }));
        assert!(matches!(out.sent[1], MidiEvent::NoteOn { velocity: 80, .. }));
    }

    #[test]
    fn test_note_off_without_note_on_records_nothing() {
        let t0 = Instant::now();
        let mut key = KeyState::new(0, 60, t0);
        let mut out = CaptureSink::default();
        let mods = looping();

        key.note_off(64, &mods, &mut out, t0);
        assert!(key.tape().is_empty());
        assert_eq!(out.sent.len(), 1);
    }

    #[test]
    fn test_quantized_period_center_and_octaves() {
        let t0 = Instant::now();
        let mut center = KeyState::new(0, 60, t0);
        center.set_quantized_period(0.0, 0.0, 1.0, t0);
        assert!((center.tape().period() - 1.0).abs() < 1e-9);

        // middle C sits at the low exponent bound; five octaves up reaches
        // the high bound, and notes below extrapolate past it
        let mut high = KeyState::new(0, 120, t0);
        high.set_quantized_period(-4.0, 4.0, 1.0, t0);
        assert!((high.tape().period() - 16.0).abs() < 1e-9);

        let mut low = KeyState::new(0, 0, t0);
        low.set_quantized_period(-4.0, 4.0, 1.0, t0);
        assert!((low.tape().period() - 2f64.powi(-12)).abs() < 1e-12);
    }
}
