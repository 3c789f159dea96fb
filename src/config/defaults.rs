//! System-wide default constants.
//!
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Server
// ============================================================================

/// HTTP bind address.
pub const SERVER_ADDR: &str = "0.0.0.0:8000";

/// Largest accepted request body (bytes). 16 MiB covers full-resolution
/// phone camera JPEGs.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

// ============================================================================
// Storage
// ============================================================================

/// Root directory for all artifacts, the counter and the index.
pub const DATA_DIR: &str = "./Server";

// ============================================================================
// Consolidation
// ============================================================================

/// Interval between background consolidation passes (seconds).
///
/// 0 disables the background task; consolidation then only runs at startup
/// and on demand.
pub const CONSOLIDATION_INTERVAL_SECS: u64 = 300;

// ============================================================================
// Severity Classification
// ============================================================================

/// Peak inertial reading strictly above which a pothole is Severe.
pub const SEVERE_PEAK_THRESHOLD: f64 = 25.0;

/// Peak inertial reading strictly above which a pothole is Moderate.
pub const MODERATE_PEAK_THRESHOLD: f64 = 13.0;
