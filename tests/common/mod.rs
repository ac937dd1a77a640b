#![allow(dead_code)]

use tracing_subscriber::EnvFilter;

/// Route `tracing` output through the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Keys `1..=n`, as every stress test pushes them.
pub fn keys(n: u32) -> Vec<u32> {
    (1..=n).collect()
}
