/// Shell name reported to modules and logs
pub const SHELL_NAME: &str = "keel";

/// Version advertised to modules unless overridden by configuration
pub const SHELL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Manifest document every module directory must contain
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Default grace period for module stop hooks, in seconds
pub const DEFAULT_STOP_GRACE_SECS: u64 = 30;

/// Host symbols published to modules across the isolation bridge. Each
/// entry names an export in `kernel::bridge`; nothing else in the host
/// image is shared surface.
pub const HOST_BRIDGE_SYMBOLS: &[&str] = &["keel_shell_version", "keel_shell_log_line"];
