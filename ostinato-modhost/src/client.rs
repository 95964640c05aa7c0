//! Synchronous mod-host connection.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use log::{debug, info};

use crate::protocol::{parse_response, ModHostError, Response};

const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// One open connection to a mod-host instance. Plugin instance numbers
/// are assigned sequentially by this client.
pub struct ModHost {
    stream: TcpStream,
    next_instance: i32,
    live: Vec<i32>,
}

impl ModHost {
    pub fn connect(addr: &str) -> Result<Self, ModHostError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(Some(READ_TIMEOUT))?;
        info!(target: "modhost", "connected to mod-host at {}", addr);
        Ok(Self {
            stream,
            next_instance: 0,
            live: Vec::new(),
        })
    }

    /// Instance numbers currently loaded through this client.
    pub fn instances(&self) -> &[i32] {
        &self.live
    }

    /// Load an LV2 plugin and return its assigned instance number.
    pub fn add_plugin(&mut self, uri: &str) -> Result<i32, ModHostError> {
        let instance = self.next_instance;
        self.command(&format!("add {} {}", uri, instance))?;
        self.next_instance += 1;
        self.live.push(instance);
        Ok(instance)
    }

    pub fn remove_plugin(&mut self, instance: i32) -> Result<(), ModHostError> {
        self.command(&format!("remove {}", instance))?;
        self.live.retain(|&i| i != instance);
        Ok(())
    }

    /// Remove every instance this client loaded, then drop the connection.
    /// Removal failures are logged, not propagated: the host may already
    /// have discarded the instance.
    pub fn disconnect(mut self) {
        for instance in std::mem::take(&mut self.live) {
            if let Err(e) = self.command(&format!("remove {}", instance)) {
                log::warn!(target: "modhost", "remove {} during disconnect: {}", instance, e);
            }
        }
    }

    pub fn bypass(&mut self, instance: i32, bypassed: bool) -> Result<(), ModHostError> {
        self.command(&format!("bypass {} {}", instance, bypassed as u8))
            .map(|_| ())
    }

    pub fn preset_load(&mut self, instance: i32, preset_uri: &str) -> Result<(), ModHostError> {
        self.command(&format!("preset_load {} {}", instance, preset_uri))
            .map(|_| ())
    }

    pub fn param_set(
        &mut self,
        instance: i32,
        symbol: &str,
        value: f32,
    ) -> Result<(), ModHostError> {
        self.command(&format!("param_set {} {} {}", instance, symbol, value))
            .map(|_| ())
    }

    pub fn param_get(&mut self, instance: i32, symbol: &str) -> Result<f32, ModHostError> {
        let resp = self.command(&format!("param_get {} {}", instance, symbol))?;
        resp.payload
            .trim()
            .parse()
            .map_err(|_| ModHostError::MalformedResponse(resp.payload))
    }

    /// Bind a plugin parameter to a MIDI CC.
    pub fn midi_map(
        &mut self,
        instance: i32,
        symbol: &str,
        channel: u8,
        controller: u8,
    ) -> Result<(), ModHostError> {
        self.command(&format!(
            "midi_map {} {} {} {}",
            instance, symbol, channel, controller
        ))
        .map(|_| ())
    }

    pub fn midi_unmap(&mut self, instance: i32, symbol: &str) -> Result<(), ModHostError> {
        self.command(&format!("midi_unmap {} {}", instance, symbol))
            .map(|_| ())
    }

    /// Make an LV2 bundle's plugins visible to the host.
    pub fn bundle_add(&mut self, path: &str) -> Result<(), ModHostError> {
        self.command(&format!("bundle_add {}", path)).map(|_| ())
    }

    pub fn bundle_remove(&mut self, path: &str) -> Result<(), ModHostError> {
        self.command(&format!("bundle_remove {}", path)).map(|_| ())
    }

    pub fn connect_ports(&mut self, from: &str, to: &str) -> Result<(), ModHostError> {
        self.command(&format!("connect {} {}", from, to)).map(|_| ())
    }

    pub fn disconnect_ports(&mut self, from: &str, to: &str) -> Result<(), ModHostError> {
        self.command(&format!("disconnect {} {}", from, to))
            .map(|_| ())
    }

    fn command(&mut self, cmd: &str) -> Result<Response, ModHostError> {
        debug!(target: "modhost", "> {}", cmd);
        // One write per command: mod-host treats each recv as one message,
        // so the trailing newline must not land in its own segment.
        self.stream.write_all(format!("{}\n", cmd).as_bytes())?;

        let mut buf = [0u8; 1024];
        let n = self.stream.read(&mut buf)?;
        let raw = String::from_utf8_lossy(&buf[..n]);
        debug!(target: "modhost", "< {}", raw.trim_end_matches('\0').trim_end());
        parse_response(&raw)
    }
}
