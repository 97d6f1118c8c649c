use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// The lifecycle stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleStage {
    Discovery,
    Validation,
    Load,
    Initialization,
    Configuration,
    Start,
    Stop,
    Unload,
    /// A required dependency failed, so the module was never driven
    Dependency,
    /// The module ignored cancellation past the stop grace period
    StopTimeout,
}

impl fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleStage::Discovery => "discovery",
            LifecycleStage::Validation => "validation",
            LifecycleStage::Load => "load",
            LifecycleStage::Initialization => "initialization",
            LifecycleStage::Configuration => "configuration",
            LifecycleStage::Start => "start",
            LifecycleStage::Stop => "stop",
            LifecycleStage::Unload => "unload",
            LifecycleStage::Dependency => "dependency",
            LifecycleStage::StopTimeout => "stop-timeout",
        };
        write!(f, "{}", name)
    }
}

/// Lifecycle state of a loaded module.
///
/// The legal progression is strictly forward:
/// `Discovered -> Validated -> Loaded -> Initialized -> Configured ->
/// Started -> Stopped -> Unloaded`. `Failed` is terminal and reachable from
/// any non-terminal state. `Stopped -> Started` is not a legal transition;
/// a stopped module must be re-loaded before it can start again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum ModuleState {
    Discovered,
    Validated,
    Loaded,
    Initialized,
    Configured,
    Started,
    Stopped,
    Unloaded,
    Failed {
        stage: LifecycleStage,
        error: String,
    },
}

impl ModuleState {
    pub fn failed(stage: LifecycleStage, error: impl Into<String>) -> Self {
        ModuleState::Failed {
            stage,
            error: error.into(),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ModuleState::Failed { .. })
    }

    /// Terminal states admit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ModuleState::Unloaded | ModuleState::Failed { .. })
    }

    fn rank(&self) -> Option<u8> {
        match self {
            ModuleState::Discovered => Some(0),
            ModuleState::Validated => Some(1),
            ModuleState::Loaded => Some(2),
            ModuleState::Initialized => Some(3),
            ModuleState::Configured => Some(4),
            ModuleState::Started => Some(5),
            ModuleState::Stopped => Some(6),
            ModuleState::Unloaded => Some(7),
            ModuleState::Failed { .. } => None,
        }
    }

    /// Whether moving to `next` is legal from this state.
    pub fn can_transition_to(&self, next: &ModuleState) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next.is_failed() {
            return true;
        }
        match (self.rank(), next.rank()) {
            (Some(current), Some(next)) => next == current + 1,
            _ => false,
        }
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleState::Discovered => write!(f, "discovered"),
            ModuleState::Validated => write!(f, "validated"),
            ModuleState::Loaded => write!(f, "loaded"),
            ModuleState::Initialized => write!(f, "initialized"),
            ModuleState::Configured => write!(f, "configured"),
            ModuleState::Started => write!(f, "started"),
            ModuleState::Stopped => write!(f, "stopped"),
            ModuleState::Unloaded => write!(f, "unloaded"),
            ModuleState::Failed { stage, error } => write!(f, "failed({}: {})", stage, error),
        }
    }
}

/// What the manager does when a module fails during a bulk sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop already-started modules in reverse order and surface the error
    FailFast,
    /// Mark the module failed, skip its dependents, keep going
    #[default]
    Continue,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fail-fast" => Ok(FailurePolicy::FailFast),
            "continue" => Ok(FailurePolicy::Continue),
            other => Err(format!(
                "unknown failure policy '{}' (expected 'fail-fast' or 'continue')",
                other
            )),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::FailFast => write!(f, "fail-fast"),
            FailurePolicy::Continue => write!(f, "continue"),
        }
    }
}
