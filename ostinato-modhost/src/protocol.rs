//! Response parsing and the mod-host error code taxonomy.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum ModHostError {
    #[error("mod-host connection error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed mod-host response: `{0}`")]
    MalformedResponse(String),
    #[error("mod-host error {code} ({name})")]
    Host { code: i32, name: &'static str },
}

/// A successfully parsed `resp` line: the non-negative status value and
/// whatever trailing payload followed it (parameter values, for one).
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: i32,
    pub payload: String,
}

/// Parse one raw response buffer. mod-host null-terminates its replies,
/// so trailing NULs and whitespace are stripped before parsing.
pub fn parse_response(raw: &str) -> Result<Response, ModHostError> {
    let line = raw.trim_matches(|c: char| c == '\0' || c.is_whitespace());

    let rest = line
        .strip_prefix("resp ")
        .ok_or_else(|| ModHostError::MalformedResponse(line.to_string()))?;

    let (status_str, payload) = match rest.split_once(' ') {
        Some((s, p)) => (s, p),
        None => (rest, ""),
    };
    let status: i32 = status_str
        .parse()
        .map_err(|_| ModHostError::MalformedResponse(line.to_string()))?;

    if status < 0 {
        return Err(ModHostError::Host {
            code: status,
            name: error_name(status),
        });
    }
    Ok(Response {
        status,
        payload: payload.to_string(),
    })
}

/// mod-host's documented error codes.
pub fn error_name(code: i32) -> &'static str {
    match code {
        -1 => "ERR_INSTANCE_INVALID",
        -2 => "ERR_INSTANCE_ALREADY_EXISTS",
        -3 => "ERR_INSTANCE_NON_EXISTS",
        -4 => "ERR_INSTANCE_UNLICENSED",
        -101 => "ERR_LV2_INVALID_URI",
        -102 => "ERR_LV2_INSTANTIATION",
        -103 => "ERR_LV2_INVALID_PARAM_SYMBOL",
        -104 => "ERR_LV2_INVALID_PRESET_URI",
        -105 => "ERR_LV2_CANT_LOAD_STATE",
        -201 => "ERR_JACK_CLIENT_CREATION",
        -202 => "ERR_JACK_CLIENT_ACTIVATION",
        -203 => "ERR_JACK_CLIENT_DEACTIVATION",
        -204 => "ERR_JACK_PORT_REGISTER",
        -205 => "ERR_JACK_PORT_CONNECTION",
        -206 => "ERR_JACK_PORT_DISCONNECTION",
        -301 => "ERR_ASSIGNMENT_ALREADY_EXISTS",
        -302 => "ERR_ASSIGNMENT_INVALID_OP",
        -303 => "ERR_ASSIGNMENT_LIST_FULL",
        -304 => "ERR_ASSIGNMENT_FAILED",
        -401 => "ERR_CONTROL_CHAIN_UNAVAILABLE",
        -402 => "ERR_LINK_UNAVAILABLE",
        -901 => "ERR_MEMORY_ALLOCATION",
        -902 => "ERR_INVALID_OPERATION",
        _ => "ERR_UNKNOWN",
    }
}
