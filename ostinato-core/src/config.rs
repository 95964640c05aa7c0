//! Layered configuration: an embedded default file, overridden field by
//! field from the user's config directory when one exists.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use ostinato_types::SourceRole;

use crate::dispatch::ControlMap;
use crate::midi::InputSpec;
use crate::transport::{BuiltinAction, ButtonBinding, TransportControl, TransportOutput};

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    devices: DevicesConfig,
    #[serde(default)]
    controls: ControlsConfig,
    #[serde(default)]
    runtime: RuntimeConfig,
    #[serde(default)]
    mod_host: ModHostConfig,
    #[serde(default)]
    transport: TransportConfig,
}

#[derive(Deserialize, Default)]
struct DevicesConfig {
    output: Option<String>,
    #[serde(default)]
    inputs: HashMap<String, InputEntry>,
}

#[derive(Deserialize, Clone)]
struct InputEntry {
    pattern: String,
    role: SourceRole,
}

#[derive(Deserialize, Default)]
struct ControlsConfig {
    sustain_cc: Option<u8>,
    lock_cc: Option<u8>,
    loop_cc: Option<u8>,
    low_q_cc: Option<u8>,
    high_q_cc: Option<u8>,
    low_q_limit: Option<f64>,
    high_q_limit: Option<f64>,
}

#[derive(Deserialize, Default)]
struct RuntimeConfig {
    poll_interval_ms: Option<u64>,
}

#[derive(Deserialize, Default)]
struct ModHostConfig {
    address: Option<String>,
    bundles: Option<Vec<String>>,
    plugins: Option<Vec<String>>,
}

#[derive(Deserialize, Default)]
struct TransportConfig {
    bank_cc: Option<u8>,
    button_cc: Option<u8>,
    default_bank: Option<u8>,
    buttons: Option<Vec<ButtonEntry>>,
}

#[derive(Deserialize, Clone)]
struct ButtonEntry {
    bank: u8,
    off: u8,
    on: u8,
    note: Option<[u8; 2]>,
    action: Option<String>,
}

pub struct Config {
    devices: DevicesConfig,
    controls: ControlsConfig,
    runtime: RuntimeConfig,
    mod_host: ModHostConfig,
    transport: TransportConfig,
}

impl Config {
    pub fn load() -> Self {
        let mut base: ConfigFile =
            toml::from_str(DEFAULT_CONFIG).expect("Failed to parse embedded config.toml");

        if let Some(path) = user_config_path() {
            if path.exists() {
                match std::fs::read_to_string(&path) {
                    Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
                        Ok(user) => merge(&mut base, user),
                        Err(e) => {
                            log::warn!(target: "config", "ignoring malformed config {}: {}", path.display(), e)
                        }
                    },
                    Err(e) => {
                        log::warn!(target: "config", "could not read config {}: {}", path.display(), e)
                    }
                }
            }
        }

        Config {
            devices: base.devices,
            controls: base.controls,
            runtime: base.runtime,
            mod_host: base.mod_host,
            transport: base.transport,
        }
    }

    pub fn output_pattern(&self) -> &str {
        self.devices.output.as_deref().unwrap_or(".*")
    }

    /// All configured input ports, in name order so startup logs are stable.
    pub fn inputs(&self) -> Vec<InputSpec> {
        let mut specs: Vec<InputSpec> = self
            .devices
            .inputs
            .iter()
            .map(|(name, entry)| InputSpec {
                name: name.clone(),
                pattern: entry.pattern.clone(),
                role: entry.role,
            })
            .collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    pub fn controls(&self) -> ControlMap {
        ControlMap {
            sustain_cc: self.controls.sustain_cc.unwrap_or(64),
            lock_cc: self.controls.lock_cc.unwrap_or(3),
            loop_cc: self.controls.loop_cc.unwrap_or(2),
            low_q_cc: self.controls.low_q_cc.unwrap_or(74),
            high_q_cc: self.controls.high_q_cc.unwrap_or(71),
            low_q_limit: self.controls.low_q_limit.unwrap_or(4.0),
            high_q_limit: self.controls.high_q_limit.unwrap_or(4.0),
        }
    }

    /// Control loop sleep (clamped to 1..1000ms).
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.runtime.poll_interval_ms.unwrap_or(16).clamp(1, 1000))
    }

    pub fn mod_host_address(&self) -> &str {
        self.mod_host.address.as_deref().unwrap_or("127.0.0.1:5555")
    }

    pub fn mod_host_bundles(&self) -> &[String] {
        self.mod_host.bundles.as_deref().unwrap_or(&[])
    }

    pub fn mod_host_plugins(&self) -> &[String] {
        self.mod_host.plugins.as_deref().unwrap_or(&[])
    }

    pub fn transport_control(&self) -> TransportControl {
        let buttons = self
            .transport
            .buttons
            .as_deref()
            .unwrap_or(&[])
            .iter()
            .filter_map(parse_button)
            .collect::<Vec<_>>();
        TransportControl::new(
            self.transport.bank_cc.unwrap_or(15),
            self.transport.button_cc.unwrap_or(47),
            self.transport.default_bank.unwrap_or(0),
            buttons,
        )
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ostinato").join("config.toml"))
}

fn merge(base: &mut ConfigFile, user: ConfigFile) {
    if user.devices.output.is_some() {
        base.devices.output = user.devices.output;
    }
    // user inputs override by name and may add new ports
    for (name, entry) in user.devices.inputs {
        base.devices.inputs.insert(name, entry);
    }

    merge_controls(&mut base.controls, user.controls);

    if user.runtime.poll_interval_ms.is_some() {
        base.runtime.poll_interval_ms = user.runtime.poll_interval_ms;
    }

    if user.mod_host.address.is_some() {
        base.mod_host.address = user.mod_host.address;
    }
    if user.mod_host.bundles.is_some() {
        base.mod_host.bundles = user.mod_host.bundles;
    }
    if user.mod_host.plugins.is_some() {
        base.mod_host.plugins = user.mod_host.plugins;
    }

    if user.transport.bank_cc.is_some() {
        base.transport.bank_cc = user.transport.bank_cc;
    }
    if user.transport.button_cc.is_some() {
        base.transport.button_cc = user.transport.button_cc;
    }
    if user.transport.default_bank.is_some() {
        base.transport.default_bank = user.transport.default_bank;
    }
    if user.transport.buttons.is_some() {
        base.transport.buttons = user.transport.buttons;
    }
}

fn merge_controls(base: &mut ControlsConfig, user: ControlsConfig) {
    if user.sustain_cc.is_some() {
        base.sustain_cc = user.sustain_cc;
    }
    if user.lock_cc.is_some() {
        base.lock_cc = user.lock_cc;
    }
    if user.loop_cc.is_some() {
        base.loop_cc = user.loop_cc;
    }
    if user.low_q_cc.is_some() {
        base.low_q_cc = user.low_q_cc;
    }
    if user.high_q_cc.is_some() {
        base.high_q_cc = user.high_q_cc;
    }
    if user.low_q_limit.is_some() {
        base.low_q_limit = user.low_q_limit;
    }
    if user.high_q_limit.is_some() {
        base.high_q_limit = user.high_q_limit;
    }
}

fn parse_button(entry: &ButtonEntry) -> Option<ButtonBinding> {
    let output = match (&entry.note, entry.action.as_deref()) {
        (Some([channel, note]), None) => TransportOutput::Note {
            channel: *channel,
            note: *note,
        },
        (None, Some(action)) => TransportOutput::Builtin(parse_action(action)?),
        _ => {
            log::warn!(
                target: "config",
                "transport button {}:{} needs exactly one of `note` or `action`, skipping",
                entry.bank,
                entry.on
            );
            return None;
        }
    };
    Some(ButtonBinding {
        off_value: entry.off,
        on_value: entry.on,
        bank: entry.bank,
        output,
    })
}

fn parse_action(s: &str) -> Option<BuiltinAction> {
    match s {
        "panic" => Some(BuiltinAction::Panic),
        _ => {
            log::warn!(target: "config", "unknown transport action `{}`, skipping", s);
            None
        }
    }
}
