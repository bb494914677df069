//! Tracing and logging setup shared by every stockledger process.

pub mod tracing;

pub use self::tracing::ObservabilityConfig;

/// Initialize process-wide JSON logging filtered by `RUST_LOG` (default `info`).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init_with(&ObservabilityConfig::default());
}

/// Initialize with an explicit configuration.
pub fn init_with(config: &ObservabilityConfig) {
    tracing::init_with(config);
}

/// Route log output through the test harness writer so it shows up only for failing tests.
pub fn init_for_tests() {
    tracing::init_for_tests();
}
