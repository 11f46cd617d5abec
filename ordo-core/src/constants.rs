//! Defaults shared across ORDO crates.

// ═══════════════════════════════════════════════════════════════════════════════
// CACHE DEFAULTS
// ═══════════════════════════════════════════════════════════════════════════════

/// TTL applied by `execute_default` when no per-call TTL is given (5 minutes).
pub const DEFAULT_TTL_SECONDS: u64 = 300;

/// Initial table capacity reserved by a bounded cache.
/// Unbounded caches start empty and grow on demand.
pub const MAX_PREALLOCATED_ENTRIES: usize = 4096;

// ═══════════════════════════════════════════════════════════════════════════════
// HOST PROGRAM
// ═══════════════════════════════════════════════════════════════════════════════

/// Environment variable naming the JSON config file.
pub const CONFIG_ENV_VAR: &str = "ORDO_CONFIG";

/// Log filter used when neither `RUST_LOG` nor the config sets one.
pub const DEFAULT_LOG_FILTER: &str = "ordo=info,warn";

/// Log filter used with `--verbose`.
pub const VERBOSE_LOG_FILTER: &str = "ordo=debug,info";

/// Separator between task name and priority on the command line (`name:priority`).
pub const TASK_SPEC_SEPARATOR: char = ':';
