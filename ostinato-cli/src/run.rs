//! The control loops behind each mode. All of them are single threaded:
//! drain whatever the input callbacks queued, dispatch it, advance the
//! timelines, sleep one poll interval.

use std::error::Error;
use std::thread;
use std::time::Instant;

use log::info;

use ostinato_core::config::Config;
use ostinato_core::dispatch::Dispatcher;
use ostinato_core::midi::{open_output, MidiSink, MidiSources};
use ostinato_core::sustainer::Sustainer;
use ostinato_types::{MidiEvent, SourceRole};

use crate::signal;

/// The full looper: clock, repeater, transport.
pub fn repeater(config: &Config) -> Result<(), Box<dyn Error>> {
    let sources = MidiSources::open(&config.inputs())?;
    let mut out = open_output(config.output_pattern())?;
    let mut dispatcher = Dispatcher::new(config.controls(), config.transport_control());
    let poll = config.poll_interval();

    let mut last = Instant::now();
    while !signal::interrupted() {
        for (role, event) in sources.drain() {
            dispatcher.dispatch(role, event, &mut out, Instant::now());
        }
        let now = Instant::now();
        dispatcher.update(now.duration_since(last).as_secs_f64(), &mut out);
        last = now;
        thread::sleep(poll);
    }

    info!("interrupted, silencing output");
    out.reset();
    Ok(())
}

/// Hold-pedal passthrough without any looping.
pub fn sustain(config: &Config) -> Result<(), Box<dyn Error>> {
    let controls = config.controls();
    let sources = MidiSources::open(&config.inputs())?;
    let mut out = open_output(config.output_pattern())?;
    let mut sustainer = Sustainer::new(controls.sustain_cc, controls.lock_cc);
    let poll = config.poll_interval();

    while !signal::interrupted() {
        for (role, event) in sources.drain() {
            if role == SourceRole::Main {
                sustainer.handle(&event, &mut out);
            } else {
                out.send(&event);
            }
        }
        thread::sleep(poll);
    }

    info!("interrupted, silencing output");
    out.reset();
    Ok(())
}

/// Print every inbound event with its source role. No output port needed.
pub fn monitor(config: &Config) -> Result<(), Box<dyn Error>> {
    let sources = MidiSources::open(&config.inputs())?;
    let poll = config.poll_interval();

    while !signal::interrupted() {
        for (role, event) in sources.drain() {
            println!("{:<6} {}", role.to_string(), event);
        }
        thread::sleep(poll);
    }
    Ok(())
}

/// Forward every inbound event except clock pulses to the output.
pub fn proxy(config: &Config) -> Result<(), Box<dyn Error>> {
    let sources = MidiSources::open(&config.inputs())?;
    let mut out = open_output(config.output_pattern())?;
    let poll = config.poll_interval();

    while !signal::interrupted() {
        for (_, event) in sources.drain() {
            if matches!(event, MidiEvent::Clock) {
                continue;
            }
            log::debug!(target: "proxy", "{}", event);
            out.send(&event);
        }
        thread::sleep(poll);
    }

    out.reset();
    Ok(())
}
