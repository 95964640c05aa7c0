//! Aggregate over all key timelines plus the global performance modifiers.

use std::collections::HashMap;
use std::time::Instant;

use ostinato_types::NoteKey;

use crate::key_state::KeyState;
use crate::midi::MidiSink;

/// Global performance modifiers. Owned by the [`Repeater`] and passed by
/// reference into every key operation so all keys see one consistent view.
#[derive(Debug, Clone, Copy, Default)]
pub struct Modifiers {
    /// Hold-pedal: note-offs are swallowed until released.
    pub sustain: bool,
    /// Latch with the same release semantics as sustain, different source.
    pub lock: bool,
    /// Record/replay mode: notes go onto their key's tape.
    pub looping: bool,
}

/// Pitch-to-period quantization parameters.
#[derive(Debug, Clone, Copy)]
pub struct Quantization {
    /// Exponent at middle C.
    pub low_q: f64,
    /// Exponent five octaves above middle C.
    pub high_q: f64,
    /// Tempo-derived base period in seconds.
    pub unit_period: f64,
}

impl Default for Quantization {
    fn default() -> Self {
        Self {
            low_q: 0.0,
            high_q: 0.0,
            unit_period: 1.0,
        }
    }
}

/// Owns every per-key state, the modifiers, and the quantization range.
/// All mutation flows through here from the dispatcher.
pub struct Repeater {
    keys: HashMap<NoteKey, KeyState>,
    mods: Modifiers,
    quant: Quantization,
}

impl Repeater {
    pub fn new() -> Self {
        Self {
            keys: HashMap::new(),
            mods: Modifiers::default(),
            quant: Quantization::default(),
        }
    }

    pub fn modifiers(&self) -> &Modifiers {
        &self.mods
    }

    pub fn quantization(&self) -> &Quantization {
        &self.quant
    }

    pub fn key(&self, key: NoteKey) -> Option<&KeyState> {
        self.keys.get(&key)
    }

    pub fn note_on(
        &mut self,
        channel: u8,
        note: u8,
        velocity: u8,
        out: &mut dyn MidiSink,
        now: Instant,
    ) {
        let quant = self.quant;
        let state = self
            .keys
            .entry(NoteKey::new(channel, note))
            .or_insert_with(|| {
                let mut ks = KeyState::new(channel, note, now);
                ks.set_quantized_period(quant.low_q, quant.high_q, quant.unit_period, now);
                ks
            });
        state.note_on(velocity, &self.mods, out, now);
    }

    pub fn note_off(
        &mut self,
        channel: u8,
        note: u8,
        velocity: u8,
        out: &mut dyn MidiSink,
        now: Instant,
    ) {
        let quant = self.quant;
        let state = self
            .keys
            .entry(NoteKey::new(channel, note))
            .or_insert_with(|| {
                let mut ks = KeyState::new(channel, note, now);
                ks.set_quantized_period(quant.low_q, quant.high_q, quant.unit_period, now);
                ks
            });
        state.note_off(velocity, &self.mods, out, now);
    }

    pub fn sustain_on(&mut self) {
        self.mods.sustain = true;
    }

    /// Releasing sustain lets go of every artificially held note, unless
    /// lock is still holding them.
    pub fn sustain_off(&mut self, out: &mut dyn MidiSink) {
        self.mods.sustain = false;
        if !self.mods.lock {
            self.turn_off_unheld(out);
        }
    }

    pub fn lock_on(&mut self) {
        self.mods.lock = true;
    }

    pub fn lock_off(&mut self, out: &mut dyn MidiSink) {
        self.mods.lock = false;
        if !self.mods.sustain {
            self.turn_off_unheld(out);
        }
    }

    pub fn loop_on(&mut self) {
        self.mods.looping = true;
    }

    /// Leaving loop mode wipes every tape and stops whatever the tapes were
    /// sounding, rather than letting in-flight events keep firing.
    pub fn loop_off(&mut self, out: &mut dyn MidiSink) {
        self.mods.looping = false;
        for ks in self.keys.values_mut() {
            ks.clear_tape();
        }
        self.turn_off_unheld(out);
    }

    pub fn set_low_q(&mut self, low_q: f64, now: Instant) {
        self.quant.low_q = low_q;
        self.reset_periods(now);
    }

    pub fn set_high_q(&mut self, high_q: f64, now: Instant) {
        self.quant.high_q = high_q;
        self.reset_periods(now);
    }

    pub fn set_unit_period(&mut self, period: f64, now: Instant) {
        self.quant.unit_period = period;
        self.reset_periods(now);
    }

    /// Advance every key's timeline by the elapsed wall-clock delta.
    pub fn update(&mut self, dt: f64, out: &mut dyn MidiSink) {
        for ks in self.keys.values_mut() {
            ks.update(dt, out);
        }
    }

    /// Release every note that sounds without its key being down. Keys that
    /// are physically held are untouched.
    pub fn turn_off_unheld(&mut self, out: &mut dyn MidiSink) {
        for ks in self.keys.values_mut() {
            if ks.on && !ks.held {
                ks.turn_off(out);
            }
        }
    }

    /// Hard output reset, bypassing all tape state. Recovery only.
    pub fn panic(&self, out: &mut dyn MidiSink) {
        out.reset();
    }

    fn reset_periods(&mut self, now: Instant) {
        for ks in self.keys.values_mut() {
            ks.set_quantized_period(self.quant.low_q, self.quant.high_q, self.quant.unit_period, now);
        }
    }
}

impl Default for Repeater {
    fn default() -> Self {
        Self::new()
    }
}
