//! Routes drained input events to the engine by source role.
//!
//! Clock-role ports drive tempo tracking, main-role ports carry the
//! performance (notes, modifier CCs, quantization CCs), and meta-role
//! ports speak to the transport surface. Anything not claimed by a
//! mapping is forwarded to the output untouched.

use std::time::Instant;

use ostinato_types::{MidiEvent, SourceRole};

use crate::clock::MidiClock;
use crate::midi::MidiSink;
use crate::repeater::Repeater;
use crate::transport::TransportControl;

/// CC numbers and ranges the main-role port is interpreted through.
#[derive(Debug, Clone, Copy)]
pub struct ControlMap {
    pub sustain_cc: u8,
    pub lock_cc: u8,
    pub loop_cc: u8,
    pub low_q_cc: u8,
    pub high_q_cc: u8,
    /// Exponent magnitude reached at the ends of the low-q knob.
    pub low_q_limit: f64,
    /// Exponent magnitude reached at the ends of the high-q knob.
    pub high_q_limit: f64,
}

pub struct Dispatcher {
    pub clock: MidiClock,
    pub repeater: Repeater,
    pub transport: TransportControl,
    controls: ControlMap,
}

impl Dispatcher {
    pub fn new(controls: ControlMap, transport: TransportControl) -> Self {
        Self {
            clock: MidiClock::new(),
            repeater: Repeater::new(),
            transport,
            controls,
        }
    }

    pub fn dispatch(
        &mut self,
        role: SourceRole,
        event: MidiEvent,
        out: &mut dyn MidiSink,
        now: Instant,
    ) {
        match role {
            SourceRole::Clock => self.dispatch_clock(event, out, now),
            SourceRole::Main => self.dispatch_main(event, out, now),
            SourceRole::Meta => self.dispatch_meta(event, out),
        }
    }

    fn dispatch_clock(&mut self, event: MidiEvent, out: &mut dyn MidiSink, now: Instant) {
        // only the timing pulses count; anything else on this port is noise
        if let MidiEvent::Clock = event {
            self.clock.tick(now);
            if let Some(period) = self.clock.take_changed() {
                log::info!(target: "clock", "unit period now {:.4}s", period);
                self.repeater.set_unit_period(period, now);
            }
            out.send(&event);
        } else {
            log::debug!(target: "clock", "dropping non-clock message: {}", event);
        }
    }

    fn dispatch_main(&mut self, event: MidiEvent, out: &mut dyn MidiSink, now: Instant) {
        match event {
            MidiEvent::NoteOn {
                channel,
                note,
                velocity,
            } => self.repeater.note_on(channel, note, velocity, out, now),
            MidiEvent::NoteOff {
                channel,
                note,
                velocity,
            } => self.repeater.note_off(channel, note, velocity, out, now),
            MidiEvent::ControlChange {
                controller, value, ..
            } => self.dispatch_control(controller, value, out, now, &event),
            other => out.send(&other),
        }
    }

    fn dispatch_control(
        &mut self,
        controller: u8,
        value: u8,
        out: &mut dyn MidiSink,
        now: Instant,
        event: &MidiEvent,
    ) {
        let c = self.controls;
        if controller == c.sustain_cc {
            if value == 127 {
                self.repeater.sustain_on();
            } else {
                self.repeater.sustain_off(out);
            }
        } else if controller == c.lock_cc {
            if value == 127 {
                self.repeater.lock_on();
            } else {
                self.repeater.lock_off(out);
            }
        } else if controller == c.loop_cc {
            if value == 127 {
                self.repeater.loop_on();
            } else {
                self.repeater.loop_off(out);
            }
        } else if controller == c.low_q_cc {
            self.repeater
                .set_low_q(cc_bipolar(value) * c.low_q_limit, now);
        } else if controller == c.high_q_cc {
            self.repeater
                .set_high_q(cc_bipolar(value) * c.high_q_limit, now);
        } else {
            out.send(event);
        }
    }

    fn dispatch_meta(&mut self, event: MidiEvent, out: &mut dyn MidiSink) {
        if let MidiEvent::ControlChange {
            controller, value, ..
        } = event
        {
            self.transport.interpret(controller, value, out);
        }
    }

    /// Advance all key timelines by the elapsed control-loop delta.
    pub fn update(&mut self, dt: f64, out: &mut dyn MidiSink) {
        self.repeater.update(dt, out);
    }
}

/// Map a 0..=127 CC value onto [-1, 1) centered on 64.
fn cc_bipolar(value: u8) -> f64 {
    (value as f64 - 64.0) / 64.0
}
