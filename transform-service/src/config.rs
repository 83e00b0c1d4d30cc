//! Live-endpoint configuration, read from the process environment.
//!
//! Each OEM is configured through `ODS_LIVE_<OEM>_*` variables:
//! `URL` (required), plus optional `METHOD`, `HEADERS` (JSON object),
//! `BODY`, `TIMEOUT` (seconds), and `TRANSFORM_KWARGS` (JSON object
//! deserialized into [`TransformOptions`]). Fronius inverters on a
//! local network can instead set `ODS_LIVE_FRONIUS_HOST`, which expands
//! to the inverter's power-flow endpoint.

use std::collections::BTreeMap;
use std::env;
use std::path::Path;
use std::time::Duration;

use crate::transform::TransformOptions;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Everything needed to issue one live request for one OEM.
#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub url: String,
    pub method: HttpMethod,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    pub timeout: Duration,
    pub transform_options: TransformOptions,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("[{oem}] invalid {var}: {detail}")]
    Invalid {
        oem: String,
        var: &'static str,
        detail: String,
    },
}

/// Live configuration for a source, or `None` when no `ODS_LIVE_<OEM>`
/// variables are set for it. Partial or unparseable configuration is an
/// error rather than a silent fallback.
pub fn live_config(source: &str) -> Result<Option<LiveConfig>, ConfigError> {
    let oem = source.to_ascii_uppercase();
    let invalid = |var: &'static str, detail: String| ConfigError::Invalid {
        oem: source.to_string(),
        var,
        detail,
    };

    let url = match live_var(&oem, "URL") {
        Some(url) => url,
        None => match fronius_host_url(source, &oem) {
            Some(url) => url,
            None => return Ok(None),
        },
    };

    let method = match live_var(&oem, "METHOD").as_deref() {
        None => HttpMethod::Get,
        Some(m) if m.eq_ignore_ascii_case("get") => HttpMethod::Get,
        Some(m) if m.eq_ignore_ascii_case("post") => HttpMethod::Post,
        Some(m) => return Err(invalid("METHOD", format!("unsupported method '{m}'"))),
    };

    let headers = match live_var(&oem, "HEADERS") {
        None => BTreeMap::new(),
        Some(raw) => serde_json::from_str::<BTreeMap<String, String>>(&raw)
            .map_err(|e| invalid("HEADERS", e.to_string()))?,
    };

    let timeout = match live_var(&oem, "TIMEOUT") {
        None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        Some(raw) => {
            let secs: f64 = raw
                .trim()
                .parse()
                .map_err(|_| invalid("TIMEOUT", format!("'{raw}' is not a number of seconds")))?;
            if !(secs > 0.0) {
                return Err(invalid("TIMEOUT", format!("{secs} is not positive")));
            }
            Duration::from_secs_f64(secs)
        }
    };

    let transform_options = match live_var(&oem, "TRANSFORM_KWARGS") {
        None => TransformOptions::default(),
        Some(raw) => serde_json::from_str(&raw)
            .map_err(|e| invalid("TRANSFORM_KWARGS", e.to_string()))?,
    };

    Ok(Some(LiveConfig {
        url,
        method,
        headers,
        body: live_var(&oem, "BODY"),
        timeout,
        transform_options,
    }))
}

fn live_var(oem: &str, suffix: &str) -> Option<String> {
    env::var(format!("ODS_LIVE_{oem}_{suffix}"))
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Fronius-only convenience: a bare host expands to the local Solar API
/// power-flow endpoint. `FRONIUS_HOST` is the documented variable;
/// `ODS_LIVE_FRONIUS_HOST` is accepted as a prefixed alias.
fn fronius_host_url(source: &str, oem: &str) -> Option<String> {
    if source != "fronius" {
        return None;
    }
    live_var(oem, "HOST")
        .or_else(|| {
            env::var("FRONIUS_HOST")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        })
        .map(|host| format!("http://{host}/solar_api/v1/GetPowerFlowRealtimeData.fcgi"))
}

/// Load `KEY=VALUE` lines from an env file into the process
/// environment. Variables already set in the environment win over the
/// file. A missing file is not an error.
pub fn load_env_file(path: &Path) -> std::io::Result<usize> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut loaded = 0;
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim().trim_start_matches("export ").trim();
        if key.is_empty() || env::var_os(key).is_some() {
            continue;
        }
        let value = value.trim().trim_matches('"').trim_matches('\'');
        env::set_var(key, value);
        loaded += 1;
    }
    Ok(loaded)
}
