//! Application-wide constants
//!
//! This module contains all constant values used throughout the application.
//! Constants are grouped by their purpose for better organization.

// =============================================================================
// STRESS RUN DEFAULTS
// =============================================================================

/// Default number of parallel workers in the stress pool
pub const DEFAULT_WORKERS: usize = 10;

/// Length of the per-run random token substituted for `$%rand%$`
pub const RANDOM_TOKEN_LENGTH: usize = 8;

/// Maximum number of characters of a token sequence or stderr shown in a report
pub const MAX_DIAGNOSTIC_CHARS: usize = 500;

/// Banner printed once every worker has stopped
pub const FINISHED_BANNER: &str = "----FINISHED----";

// =============================================================================
// TEMPLATE PLACEHOLDERS
// =============================================================================

/// Placeholders recognized in before/run/after scripts and naming patterns
pub mod placeholders {
    /// Per-run random token
    pub const RAND: &str = "$%rand%$";
    /// Directory of the source file, with trailing separator
    pub const PATH: &str = "$%path%$";
    /// File name with extension
    pub const FULL: &str = "$%full%$";
    /// File name without extension
    pub const FILE: &str = "$%file%$";
    /// Task identifier
    pub const TASK: &str = "$%task%$";
    /// Test identifier, only meaningful in the test-input naming pattern
    pub const TEST: &str = "$%test%$";
}

// =============================================================================
// DEFAULT NAMING
// =============================================================================

/// Default naming patterns for the files a stress run touches
pub mod naming {
    pub const SOLVE: &str = "$%task%$.cpp";
    pub const BRUTE: &str = "$%task%$-brute.cpp";
    pub const GENERATOR: &str = "$%task%$-gen.cpp";
    pub const TEST_INPUT: &str = "$%task%$GenTest$%test%$.in";
}

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Environment variable overriding the configuration file location
pub const CONFIG_PATH_ENV: &str = "STRESS_CONFIG";

/// Environment variable overriding the worker pool size
pub const WORKERS_ENV: &str = "STRESS_WORKERS";

/// Configuration file location relative to the home directory
pub const DEFAULT_CONFIG_RELATIVE_PATH: &str = ".st/config.json";

/// Default log filter when neither RUST_LOG nor --log-level is given
pub const DEFAULT_LOG_LEVEL: &str = "warn";

// =============================================================================
// EXIT CODES
// =============================================================================

/// Process exit code after Ctrl-C
pub const EXIT_INTERRUPTED: u8 = 130;
