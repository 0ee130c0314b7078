//! Tracing/logging setup shared by every hourbill binary and test.

/// Initialize process-wide logging with JSON output.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init_with(LogFormat::Json);
}

/// Subscriber configuration (filters, output format).
pub mod tracing;

pub use tracing::{LogFormat, ParseLogFormatError, init_test, init_with};
