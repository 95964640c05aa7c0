//! Plain hold-pedal passthrough — the non-looping little sibling of the
//! repeater. No timelines: just a playing set held open by the pedal,
//! plus a latch CC that pins sustain on.

use std::collections::HashSet;

use ostinato_types::{MidiEvent, NoteKey};

use crate::midi::MidiSink;

const RELEASE_VELOCITY: u8 = 64;

pub struct Sustainer {
    /// Notes sounding because sustain is holding them.
    playing: HashSet<NoteKey>,
    /// Keys physically down right now.
    held: HashSet<NoteKey>,
    sustain: bool,
    latched: bool,
    sustain_cc: u8,
    latch_cc: u8,
}

impl Sustainer {
    pub fn new(sustain_cc: u8, latch_cc: u8) -> Self {
        Self {
            playing: HashSet::new(),
            held: HashSet::new(),
            sustain: false,
            latched: false,
            sustain_cc,
            latch_cc,
        }
    }

    pub fn sustain(&self) -> bool {
        self.sustain
    }

    /// Route one inbound message.
    pub fn handle(&mut self, event: &MidiEvent, out: &mut dyn MidiSink) {
        match *event {
            MidiEvent::ControlChange {
                controller, value, ..
            } if controller == self.sustain_cc => {
                if value == 127 {
                    self.sustain_on();
                } else {
                    self.sustain_off(out);
                }
            }
            MidiEvent::ControlChange {
                controller, value, ..
            } if controller == self.latch_cc => {
                if value == 127 {
                    self.latch_on();
                } else {
                    self.latch_off(out);
                }
            }
            MidiEvent::NoteOn {
                channel,
                note,
                velocity,
            } => self.note_on(channel, note, velocity, out),
            MidiEvent::NoteOff {
                channel,
                note,
                velocity,
            } => self.note_off(channel, note, velocity, out),
            ref other => out.send(other),
        }
    }

    fn note_on(&mut self, channel: u8, note: u8, velocity: u8, out: &mut dyn MidiSink) {
        let key = NoteKey::new(channel, note);
        self.held.insert(key);

        if self.sustain {
            // retrigger: release the sustained copy before the new press
            if self.playing.contains(&key) {
                out.send(&MidiEvent::note_off(channel, note, RELEASE_VELOCITY));
            }
            self.playing.insert(key);
        }
        out.send(&MidiEvent::note_on(channel, note, velocity));
    }

    fn note_off(&mut self, channel: u8, note: u8, velocity: u8, out: &mut dyn MidiSink) {
        let key = NoteKey::new(channel, note);
        self.held.remove(&key);

        // releases pass through verbatim only while the pedal is up
        if !self.sustain {
            out.send(&MidiEvent::note_off(channel, note, velocity));
        }
    }

    fn sustain_on(&mut self) {
        if !self.latched {
            self.playing = self.held.clone();
        }
        self.sustain = true;
    }

    fn sustain_off(&mut self, out: &mut dyn MidiSink) {
        if self.latched {
            return;
        }
        self.sustain = false;

        for key in &self.playing {
            if !self.held.contains(key) {
                out.send(&MidiEvent::note_off(key.channel, key.note, RELEASE_VELOCITY));
            }
        }
        self.playing.clear();
    }

    fn latch_on(&mut self) {
        if !self.sustain {
            self.playing = self.held.clone();
            self.sustain = true;
        }
        self.latched = true;
    }

    fn latch_off(&mut self, out: &mut dyn MidiSink) {
        self.latched = false;
        if self.sustain {
            self.sustain_off(out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::CaptureSink;

    const SUSTAIN_CC: u8 = 64;
    const LATCH_CC: u8 = 3;

    fn sustainer() -> Sustainer {
        Sustainer::new(SUSTAIN_CC, LATCH_CC)
    }

    fn pedal(value: u8) -> MidiEvent {
        MidiEvent::ControlChange {
            channel: 0,
            controller: SUSTAIN_CC,
            value,
        }
    }

    #[test]
    fn test_passthrough_with_pedal_up() {
        let mut s = sustainer();
        let mut out = CaptureSink::default();

        s.handle(&MidiEvent::note_on(0, 60, 100), &mut out);
        s.handle(&MidiEvent::note_off(0, 60, 23), &mut out);
        // the release is forwarded verbatim, velocity included
        assert_eq!(
            out.sent,
            vec![
                MidiEvent::note_on(0, 60, 100),
                MidiEvent::note_off(0, 60, 23)
            ]
        );
    }

    #[test]
    fn test_pedal_holds_releases() {
        let mut s = sustainer();
        let mut out = CaptureSink::default();

        s.handle(&pedal(127), &mut out);
        s.handle(&MidiEvent::note_on(0, 60, 100), &mut out);
        s.handle(&MidiEvent::note_off(0, 60, 0), &mut out);
        // only the note-on went through
        assert_eq!(out.sent, vec![MidiEvent::note_on(0, 60, 100)]);

        // pedal release lets go of the unheld note
        s.handle(&pedal(0), &mut out);
        assert_eq!(out.sent.len(), 2);
        assert!(matches!(out.sent[1], MidiEvent::NoteOff { note: 60, .. }));
    }

    #[test]
    fn test_pedal_release_keeps_held_keys() {
        let mut s = sustainer();
        let mut out = CaptureSink::default();

        s.handle(&pedal(127), &mut out);
        s.handle(&MidiEvent::note_on(0, 60, 100), &mut out);
        s.handle(&pedal(0), &mut out);
        // key still down: nothing released
        assert_eq!(out.sent.len(), 1);
    }

    #[test]
    fn test_retrigger_under_sustain() {
        let mut s = sustainer();
        let mut out = CaptureSink::default();

        s.handle(&pedal(127), &mut out);
        s.handle(&MidiEvent::note_on(0, 60, 100), &mut out);
        s.handle(&MidiEvent::note_off(0, 60, 0), &mut out);
        s.handle(&MidiEvent::note_on(0, 60, 90), &mut out);

        // on, synthesized off, retriggered on
        assert_eq!(out.sent.len(), 3);
        assert!(matches!(out.sent[1], MidiEvent::NoteOff { .. }));
        assert!(matches!(out.sent[2], MidiEvent::NoteOn { velocity: 90, .. }));
    }

    #[test]
    fn test_latch_pins_sustain() {
        let mut s = sustainer();
        let mut out = CaptureSink::default();

        s.handle(
            &MidiEvent::ControlChange {
                channel: 0,
                controller: LATCH_CC,
                value: 127,
            },
            &mut out,
        );
        assert!(s.sustain());

        s.handle(&MidiEvent::note_on(0, 60, 100), &mut out);
        s.handle(&MidiEvent::note_off(0, 60, 0), &mut out);
        // pedal-off is ignored while latched
        s.handle(&pedal(0), &mut out);
        assert!(s.sustain());
        assert_eq!(out.sent.len(), 1);

        // dropping the latch releases everything
        s.handle(
            &MidiEvent::ControlChange {
                channel: 0,
                controller: LATCH_CC,
                value: 0,
            },
            &mut out,
        );
        assert!(!s.sustain());
        assert_eq!(out.sent.len(), 2);
    }

    #[test]
    fn test_unrelated_messages_forwarded() {
        let mut s = sustainer();
        let mut out = CaptureSink::default();
        let bend = MidiEvent::Other(vec![0xE0, 0, 64]);
        s.handle(&bend, &mut out);
        assert_eq!(out.sent, vec![bend]);
    }
}
