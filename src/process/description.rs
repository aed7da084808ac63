//! Normalization of pm2 process descriptions
//!
//! `pm2 jlist` prints one large JSON object per process. Only a handful of
//! fields matter to callers; they are lifted into [`ProcessInfo`] with
//! memory converted to megabytes and uptime computed from `created_at`.

use crate::core::error::ProcessManagerError;
use crate::core::traits::ProcessInfo;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
struct RawProcess {
    pid: Option<u32>,
    name: Option<String>,
    pm_id: Option<u32>,
    #[serde(default)]
    pm2_env: RawEnv,
    #[serde(default)]
    monit: RawMonit,
}

#[derive(Debug, Default, Deserialize)]
struct RawEnv {
    status: Option<String>,
    version: Option<String>,
    /// Milliseconds since the epoch
    created_at: Option<f64>,
    namespace: Option<String>,
    autorestart: Option<bool>,
    /// Either a flag or a list of watched paths
    watch: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMonit {
    /// Bytes
    memory: Option<f64>,
    cpu: Option<f64>,
}

fn watch_enabled(value: Option<&serde_json::Value>) -> bool {
    match value {
        Some(serde_json::Value::Bool(flag)) => *flag,
        Some(serde_json::Value::Array(paths)) => !paths.is_empty(),
        Some(serde_json::Value::String(path)) => !path.is_empty(),
        _ => false,
    }
}

fn normalize(raw: RawProcess, now: DateTime<Utc>) -> ProcessInfo {
    let created_ms = raw.pm2_env.created_at.map(|ms| ms as i64);
    let created_at = created_ms.and_then(|ms| Utc.timestamp_millis_opt(ms).single());
    let uptime_ms = created_ms
        .map(|ms| (now.timestamp_millis() - ms).max(0))
        .unwrap_or(0);

    ProcessInfo {
        status: raw.pm2_env.status,
        pid: raw.pid,
        name: raw.name,
        version: raw.pm2_env.version,
        pm_id: raw.pm_id,
        created_at,
        uptime_ms,
        namespace: raw.pm2_env.namespace,
        autorestart: raw.pm2_env.autorestart.unwrap_or(false),
        watch: watch_enabled(raw.pm2_env.watch.as_ref()),
        memory_mb: raw.monit.memory.unwrap_or(0.0) / 1_000_000.0,
        cpu: raw.monit.cpu.unwrap_or(0.0),
    }
}

/// Parse `pm2 jlist` output into normalized descriptions.
///
/// pm2 may print notices (some of them bracketed, like `[PM2] ...`) before
/// the JSON array, so parsing starts at the first `[` that opens valid JSON.
pub fn parse_process_list(
    output: &str,
    now: DateTime<Utc>,
) -> Result<Vec<ProcessInfo>, ProcessManagerError> {
    let mut last_error = None;

    for (start, _) in output.match_indices('[') {
        match serde_json::from_str::<Vec<RawProcess>>(output[start..].trim_end()) {
            Ok(raw) => return Ok(raw.into_iter().map(|p| normalize(p, now)).collect()),
            Err(e) => last_error = Some(e.to_string()),
        }
    }

    Err(ProcessManagerError::InvalidResponse(
        last_error.unwrap_or_else(|| "no JSON array in output".to_string()),
    ))
}
