use std::sync::Arc;

use semver::Version;
use tokio_util::sync::CancellationToken;

use crate::module_system::error::ModuleSystemError;
use crate::module_system::lifecycle::LifecycleStage;
use crate::services::ServiceCollection;

/// Snapshot of the host the module sees during its pre-start validation.
///
/// `shared_services` is a copy of the host's registrations taken when the
/// manager was built; modules may inspect what the host publishes but
/// cannot mutate the live collection through it.
#[derive(Clone)]
pub struct InitializationContext {
    shell_version: Version,
    environment: String,
    shared_services: Arc<ServiceCollection>,
    token: CancellationToken,
}

impl InitializationContext {
    pub fn new(
        shell_version: Version,
        environment: String,
        shared_services: Arc<ServiceCollection>,
        token: CancellationToken,
    ) -> Self {
        Self {
            shell_version,
            environment,
            shared_services,
            token,
        }
    }

    pub fn shell_version(&self) -> &Version {
        &self.shell_version
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn shared_services(&self) -> &ServiceCollection {
        &self.shared_services
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Error out early when the host is already shutting down.
    pub fn ensure_not_cancelled(
        &self,
        module_id: &str,
        stage: LifecycleStage,
    ) -> Result<(), ModuleSystemError> {
        if self.token.is_cancelled() {
            Err(ModuleSystemError::Cancelled {
                module_id: module_id.to_string(),
                stage,
            })
        } else {
            Ok(())
        }
    }
}

impl std::fmt::Debug for InitializationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationContext")
            .field("shell_version", &self.shell_version)
            .field("environment", &self.environment)
            .field("shared_services", &self.shared_services.len())
            .finish_non_exhaustive()
    }
}
