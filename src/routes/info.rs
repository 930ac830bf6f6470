//! Remote system introspection.
//!
//! Both endpoints shell out on the remote machine; they describe the machine
//! at the far end of the session, never the gateway host. Probes that fail
//! on the remote (missing tool, unreadable /proc) drop their field from the
//! response instead of failing the request.

use axum::extract::State;
use axum::Json;
use russh::client;
use serde::Serialize;
use serde_json::{json, Map, Value};

use super::{gateway_error, ApiError};
use crate::ssh::client::GatewayHandler;
use crate::ssh::exec::run_command;
use crate::AppState;

/// Filesystems that are memory- or kernel-backed and not worth reporting.
const PSEUDO_FILESYSTEMS: &[&str] = &["tmpfs", "devtmpfs", "udev", "none"];

/// One mounted filesystem, sizes in bytes.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct DiskInfo {
    pub filesystem: String,
    pub total: u64,
    pub used: u64,
    pub available: u64,
    pub use_percent: u8,
    pub mounted_on: String,
}

/// `GET /api/info` — snapshot of the remote machine.
///
/// Fields: `hostname`, `os`, `kernel`, `arch`, `uptime`, `cpu`, `cores`,
/// `ram` (bytes), `load` (1/5/15 min), `ip`. Each comes from its own probe
/// command; a probe that fails omits its field.
pub async fn info(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let pair = state
        .sessions
        .checkout()
        .await
        .map_err(|e| gateway_error(&e))?;
    let handle = &pair.handle;

    let mut out = Map::new();
    let mut put = |key: &str, value: Option<Value>| {
        if let Some(v) = value {
            out.insert(key.to_string(), v);
        }
    };

    put("hostname", probe(handle, "hostname").await.map(Value::from));
    put("os", probe(handle, "uname -s").await.map(Value::from));
    put("kernel", probe(handle, "uname -r").await.map(Value::from));
    put("arch", probe(handle, "uname -m").await.map(Value::from));
    put("uptime", probe(handle, "uptime -p").await.map(Value::from));
    put(
        "cpu",
        probe(handle, "grep -m1 'model name' /proc/cpuinfo")
            .await
            .and_then(|line| parse_cpu_model(&line))
            .map(Value::from),
    );
    put(
        "cores",
        probe(handle, "nproc")
            .await
            .and_then(|s| s.parse::<u64>().ok())
            .map(Value::from),
    );
    put(
        "ram",
        probe(handle, "free -b").await.and_then(|s| {
            parse_free_total(&s).map(Value::from)
        }),
    );
    put(
        "load",
        probe(handle, "cat /proc/loadavg")
            .await
            .and_then(|s| parse_loadavg(&s))
            .map(Value::from),
    );
    put(
        "ip",
        probe(handle, "hostname -I")
            .await
            .and_then(|s| s.split_whitespace().next().map(ToString::to_string))
            .map(Value::from),
    );

    Ok(Json(Value::Object(out)))
}

/// `GET /api/disks` — mounted filesystems on the remote, via POSIX `df`.
/// Pseudo-filesystems (tmpfs and friends) are filtered out.
pub async fn disks(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let pair = state
        .sessions
        .checkout()
        .await
        .map_err(|e| gateway_error(&e))?;

    let result = run_command(&pair.handle, "df -kP")
        .await
        .map_err(|e| gateway_error(&e))?;
    if result.exit_code.is_some_and(|c| c != 0) {
        return Err(gateway_error(&crate::ssh::GatewayError::Remote(format!(
            "df failed: {}",
            result.output.trim()
        ))));
    }

    Ok(Json(json!({"disks": parse_df(&result.output)})))
}

/// Run a probe command and hand back its trimmed output, or `None` when the
/// probe fails or prints nothing.
async fn probe(handle: &client::Handle<GatewayHandler>, command: &str) -> Option<String> {
    let result = run_command(handle, command).await.ok()?;
    if result.exit_code.is_some_and(|c| c != 0) {
        return None;
    }
    let trimmed = result.output.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Extract the model from a `model name : ...` cpuinfo line.
fn parse_cpu_model(line: &str) -> Option<String> {
    line.split_once(':')
        .map(|(_, model)| model.trim().to_string())
        .filter(|m| !m.is_empty())
}

/// Total memory in bytes from `free -b` output.
fn parse_free_total(output: &str) -> Option<u64> {
    let mem_line = output
        .lines()
        .find(|line| line.trim_start().starts_with("Mem:"))?;
    mem_line.split_whitespace().nth(1)?.parse().ok()
}

/// 1/5/15 minute load averages from `/proc/loadavg`.
fn parse_loadavg(output: &str) -> Option<Vec<f64>> {
    let loads: Vec<f64> = output
        .split_whitespace()
        .take(3)
        .filter_map(|f| f.parse().ok())
        .collect();
    (loads.len() == 3).then_some(loads)
}

/// Parse `df -kP` output. The header and any malformed lines are skipped;
/// mount points containing spaces are re-joined.
fn parse_df(output: &str) -> Vec<DiskInfo> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 6 {
                return None;
            }
            if PSEUDO_FILESYSTEMS.contains(&fields[0]) {
                return None;
            }
            let total_kb: u64 = fields[1].parse().ok()?;
            let used_kb: u64 = fields[2].parse().ok()?;
            let available_kb: u64 = fields[3].parse().ok()?;
            let use_percent: u8 = fields[4].trim_end_matches('%').parse().ok()?;
            Some(DiskInfo {
                filesystem: fields[0].to_string(),
                total: total_kb * 1024,
                used: used_kb * 1024,
                available: available_kb * 1024,
                use_percent,
                mounted_on: fields[5..].join(" "),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Filesystem     1024-blocks      Used Available Capacity Mounted on
/dev/sda1         41152832  12345678  26700000      32% /
tmpfs              8160768         0   8160768       0% /dev/shm
/dev/sdb1        103081248  51540624  46296528      53% /mnt/my data
";

    #[test]
    fn parses_standard_df_output() {
        let disks = parse_df(SAMPLE);
        assert_eq!(disks.len(), 2);
        assert_eq!(disks[0].filesystem, "/dev/sda1");
        assert_eq!(disks[0].total, 41_152_832 * 1024);
        assert_eq!(disks[0].used, 12_345_678 * 1024);
        assert_eq!(disks[0].use_percent, 32);
        assert_eq!(disks[0].mounted_on, "/");
    }

    #[test]
    fn skips_pseudo_filesystems() {
        let disks = parse_df(SAMPLE);
        assert!(!disks.iter().any(|d| d.filesystem == "tmpfs"));
    }

    #[test]
    fn rejoins_mount_points_with_spaces() {
        let disks = parse_df(SAMPLE);
        assert_eq!(disks[1].mounted_on, "/mnt/my data");
    }

    #[test]
    fn skips_malformed_lines() {
        let disks = parse_df("header\nnot a data row\n/dev/sda1 100 50 50 50% /\n");
        assert_eq!(disks.len(), 1);
        assert_eq!(disks[0].available, 50 * 1024);
    }

    #[test]
    fn cpu_model_takes_text_after_colon() {
        assert_eq!(
            parse_cpu_model("model name\t: AMD EPYC 7571").as_deref(),
            Some("AMD EPYC 7571")
        );
        assert_eq!(parse_cpu_model("no separator here"), None);
    }

    #[test]
    fn free_total_reads_mem_line() {
        let out = "              total        used        free\nMem:    16432998400  8216499200  8216499200\nSwap:   0 0 0\n";
        assert_eq!(parse_free_total(out), Some(16_432_998_400));
        assert_eq!(parse_free_total("garbage"), None);
    }

    #[test]
    fn loadavg_takes_three_leading_floats() {
        assert_eq!(
            parse_loadavg("0.52 0.58 0.59 1/389 12345"),
            Some(vec![0.52, 0.58, 0.59])
        );
        assert_eq!(parse_loadavg(""), None);
    }
}
