use thiserror::Error;

/// Local subprocess error, per spec.md §7: genuine I/O failure launching a
/// subprocess (binary not found, permission denied). A non-zero exit code
/// from `systemctl`/`ping` is never an `ExecError` — it's the observation
/// the exit code encodes, folded into an `Ok(ServiceState::Down)` /
/// `Ok(false)` by the caller instead.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

pub type ExecResult<T> = Result<T, ExecError>;
