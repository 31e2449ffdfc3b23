use std::fmt;
use std::process::{Command, Stdio};

/// Result of the single-packet reachability check run after a failed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Reachable,
    Unreachable,
    /// The probe itself could not run, e.g. `ping` is not installed.
    Unavailable(String),
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reachable => f.write_str("host reachable; the failure is likely on the repository side"),
            Self::Unreachable => f.write_str("host unreachable; check the network connection"),
            Self::Unavailable(reason) => write!(f, "reachability probe unavailable: {reason}"),
        }
    }
}

pub fn probe_host(host: &str) -> ProbeOutcome {
    let count_flag = if cfg!(windows) { "-n" } else { "-c" };
    let output = Command::new("ping")
        .arg(count_flag)
        .arg("1")
        .arg(host)
        .stdin(Stdio::null())
        .output();

    match output {
        Ok(output) if output.status.success() => ProbeOutcome::Reachable,
        Ok(output) => {
            tracing::debug!(
                host,
                status = %output.status,
                "reachability probe failed"
            );
            ProbeOutcome::Unreachable
        }
        Err(err) => ProbeOutcome::Unavailable(err.to_string()),
    }
}
