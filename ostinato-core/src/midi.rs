//! MIDI port matching and I/O.
//!
//! Ports are matched by regex against the system port list; a pattern must
//! match exactly one port, anything else is a configuration error. Every
//! opened input feeds parsed events, tagged with the port's role, into a
//! single channel the control loop drains without blocking.

use crossbeam_channel::{unbounded, Receiver, Sender};
use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use regex::Regex;

use ostinato_types::{MidiEvent, SourceRole};

#[derive(Debug, thiserror::Error)]
pub enum MidiPortError {
    #[error("no {direction} port matching `{pattern}`")]
    NoMatch {
        direction: &'static str,
        pattern: String,
    },
    #[error("multiple {direction} ports match `{pattern}`: {matches:?}")]
    Ambiguous {
        direction: &'static str,
        pattern: String,
        matches: Vec<String>,
    },
    #[error("invalid device pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("midi backend init failed: {0}")]
    Init(#[from] midir::InitError),
    #[error("could not connect to `{name}`: {detail}")]
    Connect { name: String, detail: String },
}

/// The single output the engine writes to.
pub trait MidiSink {
    /// Fire-and-forget send; delivery failures are logged, not surfaced.
    fn send(&mut self, event: &MidiEvent);
    /// Hard recovery: silence everything downstream.
    fn reset(&mut self);
}

/// Production sink wrapping a midir output connection.
pub struct MidirSink {
    conn: MidiOutputConnection,
    name: String,
}

impl MidirSink {
    pub fn port_name(&self) -> &str {
        &self.name
    }
}

impl MidiSink for MidirSink {
    fn send(&mut self, event: &MidiEvent) {
        if let Err(e) = self.conn.send(&event.to_bytes()) {
            log::warn!(target: "midi", "send to {} failed: {}", self.name, e);
        }
    }

    fn reset(&mut self) {
        // All Sound Off + All Notes Off on every channel
        for channel in 0u8..16 {
            let _ = self.conn.send(&[0xB0 | channel, 120, 0]);
            let _ = self.conn.send(&[0xB0 | channel, 123, 0]);
        }
    }
}

/// Sink that records everything it is given, in place of a hardware port.
/// The test suites assert against its transcript.
#[derive(Debug, Default)]
pub struct CaptureSink {
    pub sent: Vec<MidiEvent>,
    pub resets: usize,
}

impl MidiSink for CaptureSink {
    fn send(&mut self, event: &MidiEvent) {
        self.sent.push(event.clone());
    }

    fn reset(&mut self) {
        self.resets += 1;
    }
}

/// One input port to open: a display name, the regex to find it by, and
/// the role its messages dispatch under.
#[derive(Debug, Clone)]
pub struct InputSpec {
    pub name: String,
    pub pattern: String,
    pub role: SourceRole,
}

/// All opened inputs, funneled into one non-blocking drain point.
pub struct MidiSources {
    rx: Receiver<(SourceRole, MidiEvent)>,
    _connections: Vec<MidiInputConnection<()>>,
}

impl MidiSources {
    pub fn open(specs: &[InputSpec]) -> Result<Self, MidiPortError> {
        let (tx, rx) = unbounded();
        let mut connections = Vec::with_capacity(specs.len());
        for spec in specs {
            connections.push(connect_input(spec, tx.clone())?);
            log::info!(target: "midi", "opened input `{}` as {}", spec.name, spec.role);
        }
        Ok(Self {
            rx,
            _connections: connections,
        })
    }

    /// Everything that arrived since the last drain. Never blocks.
    pub fn drain(&self) -> Vec<(SourceRole, MidiEvent)> {
        self.rx.try_iter().collect()
    }
}

fn connect_input(
    spec: &InputSpec,
    tx: Sender<(SourceRole, MidiEvent)>,
) -> Result<MidiInputConnection<()>, MidiPortError> {
    let mut midi_in = MidiInput::new("ostinato")?;
    // keep timing bytes: the clock role runs on 0xF8 pulses
    midi_in.ignore(Ignore::ActiveSense);

    let ports = midi_in.ports();
    let named: Vec<(midir::MidiInputPort, String)> = ports
        .into_iter()
        .filter_map(|p| midi_in.port_name(&p).ok().map(|n| (p, n)))
        .collect();
    let (port, port_name) = match_one(named, &spec.pattern, "input")?;

    let role = spec.role;
    midi_in
        .connect(
            &port,
            "ostinato-input",
            move |_timestamp, bytes, _| {
                if let Some(event) = MidiEvent::parse(bytes) {
                    let _ = tx.send((role, event));
                }
            },
            (),
        )
        .map_err(|e| MidiPortError::Connect {
            name: port_name,
            detail: e.to_string(),
        })
}

/// Open the single output port matching `pattern`.
pub fn open_output(pattern: &str) -> Result<MidirSink, MidiPortError> {
    let midi_out = MidiOutput::new("ostinato")?;
    let ports = midi_out.ports();
    let named: Vec<(midir::MidiOutputPort, String)> = ports
        .into_iter()
        .filter_map(|p| midi_out.port_name(&p).ok().map(|n| (p, n)))
        .collect();
    let (port, name) = match_one(named, pattern, "output")?;

    let conn = midi_out
        .connect(&port, "ostinato-output")
        .map_err(|e| MidiPortError::Connect {
            name: name.clone(),
            detail: e.to_string(),
        })?;
    log::info!(target: "midi", "opened output `{}`", name);
    Ok(MidirSink { conn, name })
}

/// Names of every input port on the system.
pub fn list_inputs() -> Result<Vec<String>, MidiPortError> {
    let midi_in = MidiInput::new("ostinato")?;
    Ok(midi_in
        .ports()
        .iter()
        .filter_map(|p| midi_in.port_name(p).ok())
        .collect())
}

/// Names of every output port on the system.
pub fn list_outputs() -> Result<Vec<String>, MidiPortError> {
    let midi_out = MidiOutput::new("ostinato")?;
    Ok(midi_out
        .ports()
        .iter()
        .filter_map(|p| midi_out.port_name(p).ok())
        .collect())
}

/// Pick the single port whose name matches `pattern`. Zero or several
/// matches are startup configuration errors.
fn match_one<P>(
    named_ports: Vec<(P, String)>,
    pattern: &str,
    direction: &'static str,
) -> Result<(P, String), MidiPortError> {
    let regex = Regex::new(pattern).map_err(|source| MidiPortError::Pattern {
        pattern: pattern.to_string(),
        source,
    })?;

    let mut matching: Vec<(P, String)> = named_ports
        .into_iter()
        .filter(|(_, name)| regex.is_match(name))
        .collect();

    match matching.len() {
        1 => Ok(matching.remove(0)),
        0 => Err(MidiPortError::NoMatch {
            direction,
            pattern: pattern.to_string(),
        }),
        _ => Err(MidiPortError::Ambiguous {
            direction,
            pattern: pattern.to_string(),
            matches: matching.into_iter().map(|(_, name)| name).collect(),
        }),
    }
}
