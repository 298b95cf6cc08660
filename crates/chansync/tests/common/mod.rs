//! Shared helpers for the guardian integration tests

#![allow(dead_code)]

use chansync::{Cleanup, Guardian};
use std::time::Duration;
use tokio::time::timeout;

/// Multi-field state that must never be observed half-updated
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Account {
    pub balance: i64,
    pub version: u64,
    pub history_len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Counter {
    pub c: i64,
}

pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Poll until the coordinating task behind `guardian` has exited
pub async fn wait_until_terminated<T>(guardian: &Guardian<T>) {
    timeout(Duration::from_secs(2), async {
        while !guardian.is_terminated() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("Coordinating task should terminate");
}

pub async fn wait_until_cleanup_observes_exit(cleanup: &Cleanup) {
    timeout(Duration::from_secs(2), async {
        while !cleanup.is_terminated() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .expect("Coordinating task should terminate");
}
