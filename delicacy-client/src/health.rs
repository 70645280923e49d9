//! Connectivity health tracker
//!
//! A single `online` flag for banners. Platform "offline" signals are only
//! believed once a probe to the backend fails too; real traffic succeeding
//! always wins.

use crate::HttpClient;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;

/// Cheap reachability check
#[async_trait]
pub trait Probe: Send + Sync {
    /// `true` when the backend answered
    async fn probe(&self) -> bool;
}

#[async_trait]
impl Probe for HttpClient {
    async fn probe(&self) -> bool {
        match self.health().await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("Health probe failed: {e}");
                false
            }
        }
    }
}

/// Online/offline state, optimistic (online) at startup
#[derive(Clone)]
pub struct ConnectivityTracker {
    online: Arc<watch::Sender<bool>>,
    probe: Arc<dyn Probe>,
}

impl ConnectivityTracker {
    pub fn new(probe: Arc<dyn Probe>) -> Self {
        let (online, _) = watch::channel(true);
        Self {
            online: Arc::new(online),
            probe,
        }
    }

    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.online.subscribe()
    }

    /// Platform says the network is back
    pub fn signal_online(&self) {
        self.set(true);
    }

    /// Platform says the network is gone: verify before believing it.
    ///
    /// Returns the resulting state.
    pub async fn signal_offline(&self) -> bool {
        let reachable = self.probe.probe().await;
        if !reachable {
            tracing::warn!("Backend unreachable, marking offline");
        }
        self.set(reachable);
        reachable
    }

    /// A real request succeeded
    pub fn record_success(&self) {
        self.set(true);
    }

    fn set(&self, online: bool) {
        self.online.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
    }
}

impl std::fmt::Debug for ConnectivityTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityTracker")
            .field("online", &self.is_online())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    struct FakeProbe {
        reachable: AtomicBool,
        calls: AtomicU32,
    }

    impl FakeProbe {
        fn new(reachable: bool) -> Arc<Self> {
            Arc::new(Self {
                reachable: AtomicBool::new(reachable),
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl Probe for FakeProbe {
        async fn probe(&self) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reachable.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn test_starts_online() {
        let tracker = ConnectivityTracker::new(FakeProbe::new(false));
        assert!(tracker.is_online());
    }

    #[tokio::test]
    async fn test_offline_signal_with_successful_probe_stays_online() {
        let probe = FakeProbe::new(true);
        let tracker = ConnectivityTracker::new(probe.clone());
        assert!(tracker.signal_offline().await);
        assert!(tracker.is_online());
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_offline_only_when_probe_fails() {
        let tracker = ConnectivityTracker::new(FakeProbe::new(false));
        let mut rx = tracker.subscribe();
        assert!(!tracker.signal_offline().await);
        assert!(!tracker.is_online());
        assert!(rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_online_signal_and_traffic_restore() {
        let tracker = ConnectivityTracker::new(FakeProbe::new(false));
        tracker.signal_offline().await;
        tracker.signal_online();
        assert!(tracker.is_online());

        tracker.signal_offline().await;
        tracker.record_success();
        assert!(tracker.is_online());
    }
}
