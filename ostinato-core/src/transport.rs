//! Transport surface: a bank-select CC plus a single button CC whose value
//! identifies which pad moved. Pads map, per bank, either to a note we
//! press and release on the output, or to a built-in engine action.

use std::collections::HashMap;

use ostinato_types::MidiEvent;

use crate::midi::MidiSink;

const BUTTON_VELOCITY: u8 = 64;

/// Engine-side actions a pad can trigger instead of a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinAction {
    /// Hard output reset.
    Panic,
}

/// What a pad does when it moves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportOutput {
    Note { channel: u8, note: u8 },
    Builtin(BuiltinAction),
}

/// One configured pad: the CC values its hardware emits for press and
/// release, the bank it lives in, and what it drives.
#[derive(Debug, Clone)]
pub struct ButtonBinding {
    pub off_value: u8,
    pub on_value: u8,
    pub bank: u8,
    pub output: TransportOutput,
}

pub struct TransportControl {
    bank_cc: u8,
    button_cc: u8,
    /// Last bank-select value seen; button values resolve against this.
    bank: u8,
    bindings: HashMap<(u8, u8), (TransportOutput, bool)>,
}

impl TransportControl {
    pub fn new(
        bank_cc: u8,
        button_cc: u8,
        default_bank: u8,
        buttons: impl IntoIterator<Item = ButtonBinding>,
    ) -> Self {
        let mut bindings = HashMap::new();
        for b in buttons {
            bindings.insert((b.bank, b.on_value), (b.output.clone(), true));
            bindings.insert((b.bank, b.off_value), (b.output, false));
        }
        Self {
            bank_cc,
            button_cc,
            bank: default_bank,
            bindings,
        }
    }

    pub fn bank(&self) -> u8 {
        self.bank
    }

    /// Interpret one control change from the transport surface.
    pub fn interpret(&mut self, controller: u8, value: u8, out: &mut dyn MidiSink) {
        if controller == self.bank_cc {
            self.bank = value;
            return;
        }
        if controller != self.button_cc {
            return;
        }

        match self.bindings.get(&(self.bank, value)) {
            Some((TransportOutput::Note { channel, note }, is_on)) => {
                let msg = if *is_on {
                    MidiEvent::note_on(*channel, *note, BUTTON_VELOCITY)
                } else {
                    MidiEvent::note_off(*channel, *note, BUTTON_VELOCITY)
                };
                out.send(&msg);
            }
            // actions run on press only; the release edge is inert
            Some((TransportOutput::Builtin(BuiltinAction::Panic), true)) => out.reset(),
            Some((TransportOutput::Builtin(_), false)) => {}
            None => {
                log::debug!(target: "transport", "unmapped pad value {} in bank {}", value, self.bank)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::CaptureSink;

    const BANK_CC: u8 = 15;
    const BUTTON_CC: u8 = 47;

    fn surface() -> TransportControl {
        TransportControl::new(
            BANK_CC,
            BUTTON_CC,
            0,
            vec![
                ButtonBinding {
                    off_value: 10,
                    on_value: 11,
                    bank: 0,
                    output: TransportOutput::Note {
                        channel: 9,
                        note: 36,
                    },
                },
                ButtonBinding {
                    off_value: 10,
                    on_value: 11,
                    bank: 1,
                    output: TransportOutput::Builtin(BuiltinAction::Panic),
                },
            ],
        )
    }

    #[test]
    fn test_pad_press_and_release_drive_note() {
        let mut t = surface();
        let mut out = CaptureSink::default();

        t.interpret(BUTTON_CC, 11, &mut out);
        t.interpret(BUTTON_CC, 10, &mut out);
        assert_eq!(
            out.sent,
            vec![
                MidiEvent::note_on(9, 36, 64),
                MidiEvent::note_off(9, 36, 64)
            ]
        );
    }

    #[test]
    fn test_bank_select_switches_binding() {
        let mut t = surface();
        let mut out = CaptureSink::default();

        t.interpret(BANK_CC, 1, &mut out);
        assert_eq!(t.bank(), 1);

        // same pad now fires the panic action, press edge only
        t.interpret(BUTTON_CC, 11, &mut out);
        t.interpret(BUTTON_CC, 10, &mut out);
        assert!(out.sent.is_empty());
        assert_eq!(out.resets, 1);
    }

    #[test]
    fn test_unmapped_value_ignored() {
        let mut t = surface();
        let mut out = CaptureSink::default();
        t.interpret(BUTTON_CC, 99, &mut out);
        assert!(out.sent.is_empty());
    }

    #[test]
    fn test_other_controllers_ignored() {
        let mut t = surface();
        let mut out = CaptureSink::default();
        t.interpret(74, 127, &mut out);
        assert!(out.sent.is_empty());
        assert_eq!(t.bank(), 0);
    }
}
