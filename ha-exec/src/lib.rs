//! Init-system shellouts and liveness probing (§6.5, §6.6): the only place
//! in the workspace that spawns a subprocess.

mod error;
mod fakes;
mod init_system;
mod probe;

pub use error::{ExecError, ExecResult};
pub use fakes::{FakeInitSystem, FakeLivenessProbe};
pub use init_system::{resolve_unit, InitSystem, ServiceState, SystemctlInitSystem, TIMER_PSEUDO_SERVICES};
pub use probe::{IcmpProbe, LivenessProbe};
