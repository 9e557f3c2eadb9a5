//! Health probe abstraction.

use async_trait::async_trait;

/// One liveness check run after an install.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Short name reported when the probe fails.
    fn name(&self) -> &str;

    /// Returns `Ok(())` when healthy, or a description of what is wrong.
    async fn check(&self) -> Result<(), String>;
}
