//! System-wide constants for the CNC workspace.
//!
//! Single source of truth for numeric limits and defaults.

/// Maximum number of auxiliary outputs the registry can hold.
pub const MAX_AUXILIARY_OUTPUTS: usize = 16;

/// Default depth of the normal directive channel.
pub const DEFAULT_DIRECTIVE_QUEUE_DEPTH: usize = 32;

/// Default depth of the completion notification queue.
pub const DEFAULT_NOTIFY_QUEUE_DEPTH: usize = 16;

/// Default consecutive delivery failures before retries log as errors.
pub const DEFAULT_NOTIFY_ALERT_ATTEMPTS: u32 = 5;

/// Default first retry backoff for completion delivery [ms].
pub const DEFAULT_NOTIFY_BACKOFF_MS: u64 = 50;

/// Upper bound for a single retry backoff [ms].
pub const MAX_NOTIFY_BACKOFF_MS: u64 = 5_000;

/// Default service name reported in logs.
pub const DEFAULT_SERVICE_NAME: &str = "cnc-program-control";
