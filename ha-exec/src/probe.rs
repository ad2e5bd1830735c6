use async_trait::async_trait;
use tokio::process::Command;

/// Liveness probe (§6.6): `ping -c1 -w1 <ip>`, success iff exit code 0.
/// Trait-wrapped for the same reason `InitSystem` is: tests drive the
/// Refresher/Fixer/Switcher against a fake that never actually shells out.
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    async fn is_reachable(&self, ip: &str) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct IcmpProbe;

#[async_trait]
impl LivenessProbe for IcmpProbe {
    async fn is_reachable(&self, ip: &str) -> bool {
        match Command::new("ping").arg("-c1").arg("-w1").arg(ip).output().await {
            Ok(output) => output.status.success(),
            Err(source) => {
                tracing::error!(ip, error = %source, "failed to spawn ping");
                false
            }
        }
    }
}
