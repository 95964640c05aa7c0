//! # ostinato-core
//!
//! Engine library for the ostinato MIDI looper. For each physically held
//! key the engine records note on/off pairs onto a per-key circular
//! timeline (a "tape") whose period is quantized from the key's pitch,
//! then replays that timeline while the key is up — an auto-repeat that
//! behaves like an arpeggiator crossed with a step sequencer.
//!
//! ## Module Overview
//!
//! - [`clock`] — smoothed unit-period estimate from external MIDI clock pulses
//! - [`tape`] — the per-key circular event timeline
//! - [`key_state`] — held/sounding state machine owning one tape
//! - [`repeater`] — aggregate over all keys plus the global modifiers
//! - [`sustainer`] — the plain non-looping hold-pedal variant
//! - [`transport`] — secondary control-surface button mapping
//! - [`dispatch`] — routes inbound messages by source role
//! - [`config`] — TOML configuration (embedded defaults + user override)
//! - [`midi`] — midir port matching, input drain, output sink

pub mod clock;
pub mod config;
pub mod dispatch;
pub mod key_state;
pub mod midi;
pub mod repeater;
pub mod sustainer;
pub mod tape;
pub mod transport;
