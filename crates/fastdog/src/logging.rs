//! Console logging for binaries and tests that embed the loader.

use tracing::Level;

/// Install a global `fmt` subscriber at `level`.
///
/// Returns `false` if a global subscriber was already set; the existing one
/// stays in place.
pub fn init(level: Level) -> bool {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true)
        .try_init()
        .is_ok()
}

/// Like [`init`], but writes through the test harness's captured output.
pub fn init_for_tests(level: Level) -> bool {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_test_writer()
        .try_init()
        .is_ok()
}
