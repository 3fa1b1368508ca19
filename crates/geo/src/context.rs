//! # Point Context
//!
//! Shared, versioned fountain set. The map and the AR overlay both read from
//! here; writers publish a whole new snapshot instead of mutating in place.

use std::sync::Arc;
use tokio::sync::watch;

use crate::coords::{validate_points, PointOfInterest};
use crate::error::Result;

/// Immutable point set with a monotonically increasing version
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointSnapshot {
    pub version: u64,
    pub points: Vec<PointOfInterest>,
}

/// Publisher of [`PointSnapshot`]s
#[derive(Debug)]
pub struct PointContext {
    sender: watch::Sender<Arc<PointSnapshot>>,
}

impl Default for PointContext {
    fn default() -> Self {
        Self::new()
    }
}

impl PointContext {
    /// Empty context at version 0
    pub fn new() -> Self {
        let (sender, _) = watch::channel(Arc::new(PointSnapshot::default()));
        Self { sender }
    }

    /// Validate and publish a new point set, returning its version. On error
    /// the current snapshot stays in place.
    pub fn replace(&self, points: Vec<PointOfInterest>) -> Result<u64> {
        validate_points(&points)?;
        let version = self.sender.borrow().version + 1;
        let count = points.len();
        self.sender.send_replace(Arc::new(PointSnapshot { version, points }));
        tracing::info!("Published {} points as version {}", count, version);
        Ok(version)
    }

    /// Latest snapshot
    pub fn snapshot(&self) -> Arc<PointSnapshot> {
        self.sender.borrow().clone()
    }

    /// Receiver notified on every `replace`
    pub fn watch(&self) -> watch::Receiver<Arc<PointSnapshot>> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GeoError;

    #[test]
    fn test_replace_bumps_version() {
        let context = PointContext::new();
        assert_eq!(context.snapshot().version, 0);
        assert!(context.snapshot().points.is_empty());

        let v1 = context.replace(vec![PointOfInterest::new(1.0, 2.0)]).unwrap();
        let v2 = context.replace(vec![PointOfInterest::new(3.0, 4.0)]).unwrap();
        assert_eq!((v1, v2), (1, 2));
        assert_eq!(context.snapshot().points[0].position.latitude, 3.0);
    }

    #[test]
    fn test_invalid_replace_keeps_snapshot() {
        let context = PointContext::new();
        context.replace(vec![PointOfInterest::new(1.0, 2.0)]).unwrap();
        let before = context.snapshot();

        let err = context
            .replace(vec![PointOfInterest::new(0.0, 0.0), PointOfInterest::new(f64::NAN, 0.0)])
            .unwrap_err();
        assert!(matches!(err, GeoError::InvalidInput { index: 1, .. }));
        assert!(Arc::ptr_eq(&before, &context.snapshot()));
    }

    #[test]
    fn test_old_snapshot_is_unchanged() {
        let context = PointContext::new();
        context.replace(vec![PointOfInterest::new(1.0, 2.0)]).unwrap();
        let held = context.snapshot();
        context.replace(Vec::new()).unwrap();
        assert_eq!(held.points.len(), 1);
        assert_eq!(held.version, 1);
    }

    #[tokio::test]
    async fn test_watchers_are_notified() {
        let context = PointContext::new();
        let mut rx = context.watch();

        let reader = tokio::spawn(async move {
            rx.changed().await.unwrap();
            let version = rx.borrow_and_update().version;
            version
        });
        context.replace(vec![PointOfInterest::new(5.0, 5.0)]).unwrap();
        assert_eq!(reader.await.unwrap(), 1);
    }
}
