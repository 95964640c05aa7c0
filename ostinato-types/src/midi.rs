/// A parsed MIDI message.
///
/// Note On with velocity 0 is normalized to `NoteOff` at parse time.
/// Messages the engine does not interpret are kept verbatim in `Other`
/// so they can be forwarded byte-for-byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn {
        channel: u8,
        note: u8,
        velocity: u8,
    },
    NoteOff {
        channel: u8,
        note: u8,
        velocity: u8,
    },
    ControlChange {
        channel: u8,
        controller: u8,
        value: u8,
    },
    /// System realtime timing clock (0xF8), 24 pulses per quarter note.
    Clock,
    /// Anything else, raw bytes preserved for passthrough.
    Other(Vec<u8>),
}

impl MidiEvent {
    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        MidiEvent::NoteOn {
            channel,
            note,
            velocity,
        }
    }

    pub fn note_off(channel: u8, note: u8, velocity: u8) -> Self {
        MidiEvent::NoteOff {
            channel,
            note,
            velocity,
        }
    }

    /// Parse a raw MIDI message. Returns `None` for empty or truncated input.
    pub fn parse(data: &[u8]) -> Option<MidiEvent> {
        let status = *data.first()?;
        let channel = status & 0x0F;

        match status & 0xF0 {
            0x80 => {
                if data.len() >= 3 {
                    Some(MidiEvent::NoteOff {
                        channel,
                        note: data[1],
                        velocity: data[2],
                    })
                } else {
                    None
                }
            }
            0x90 => {
                if data.len() >= 3 {
                    if data[2] == 0 {
                        // Note On with velocity 0 is a release
                        Some(MidiEvent::NoteOff {
                            channel,
                            note: data[1],
                            velocity: 0,
                        })
                    } else {
                        Some(MidiEvent::NoteOn {
                            channel,
                            note: data[1],
                            velocity: data[2],
                        })
                    }
                } else {
                    None
                }
            }
            0xB0 => {
                if data.len() >= 3 {
                    Some(MidiEvent::ControlChange {
                        channel,
                        controller: data[1],
                        value: data[2],
                    })
                } else {
                    None
                }
            }
            0xF0 if status == 0xF8 => Some(MidiEvent::Clock),
            _ => Some(MidiEvent::Other(data.to_vec())),
        }
    }

    /// Encode back to wire bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            MidiEvent::NoteOn {
                channel,
                note,
                velocity,
            } => vec![0x90 | (channel & 0x0F), *note, *velocity],
            MidiEvent::NoteOff {
                channel,
                note,
                velocity,
            } => vec![0x80 | (channel & 0x0F), *note, *velocity],
            MidiEvent::ControlChange {
                channel,
                controller,
                value,
            } => vec![0xB0 | (channel & 0x0F), *controller, *value],
            MidiEvent::Clock => vec![0xF8],
            MidiEvent::Other(bytes) => bytes.clone(),
        }
    }
}

impl std::fmt::Display for MidiEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MidiEvent::NoteOn {
                channel,
                note,
                velocity,
            } => write!(f, "note_on ch={} note={} vel={}", channel, note, velocity),
            MidiEvent::NoteOff {
                channel,
                note,
                velocity,
            } => write!(f, "note_off ch={} note={} vel={}", channel, note, velocity),
            MidiEvent::ControlChange {
                channel,
                controller,
                value,
            } => write!(f, "control_change ch={} cc={} val={}", channel, controller, value),
            MidiEvent::Clock => write!(f, "clock"),
            MidiEvent::Other(bytes) => write!(f, "other {:02x?}", bytes),
        }
    }
}
