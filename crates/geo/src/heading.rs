//! # Heading Subscription
//!
//! The compass seam between the host platform and the AR overlay.
//!
//! ## Table of Contents
//! 1. HeadingSensor — Platform seam
//! 2. HeadingSubscription — Detachable listener handle
//! 3. HeadingHub — In-process sensor fed by the host
//! 4. LatestHeading — Last-value-wins cell

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::error::{GeoError, Permission, Result};
use crate::geodesy::normalize_heading;

/// Listener invoked with each heading in degrees clockwise from north
pub type HeadingCallback = Box<dyn Fn(f64) + Send + Sync>;

// ============================================================================
// 1. HeadingSensor — Platform seam
// ============================================================================

/// Device orientation source.
///
/// `request_permission` must be called from a user-interaction context on
/// platforms that gate sensor access behind a prompt.
pub trait HeadingSensor: Send + Sync {
    /// Ask for orientation access
    fn request_permission(&self) -> Result<()>;

    /// Attach a listener. It stays attached until the returned handle is
    /// unsubscribed or dropped.
    fn subscribe_heading(&self, callback: HeadingCallback) -> Result<HeadingSubscription>;
}

// ============================================================================
// 2. HeadingSubscription — Detachable listener handle
// ============================================================================

/// Handle to an attached heading listener. Detaches on drop.
#[must_use = "dropping the subscription detaches the listener"]
pub struct HeadingSubscription {
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl HeadingSubscription {
    /// Wrap the sensor-specific detach action
    pub fn new(detach: impl FnOnce() + Send + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    /// Detach the listener now
    pub fn unsubscribe(mut self) {
        self.detach_now();
    }

    fn detach_now(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for HeadingSubscription {
    fn drop(&mut self) {
        self.detach_now();
    }
}

impl std::fmt::Debug for HeadingSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeadingSubscription")
            .field("attached", &self.detach.is_some())
            .finish()
    }
}

// ============================================================================
// 3. HeadingHub — In-process sensor fed by the host
// ============================================================================

type Listener = Arc<dyn Fn(f64) + Send + Sync>;

#[derive(Default)]
struct HubInner {
    listeners: Mutex<BTreeMap<u64, Listener>>,
    next_id: AtomicU64,
    unavailable: AtomicBool,
    denied: AtomicBool,
}

/// A [`HeadingSensor`] the host drives by calling [`HeadingHub::publish`]
/// from its platform orientation callback.
///
/// Clones share the same listener set.
#[derive(Clone, Default)]
pub struct HeadingHub {
    inner: Arc<HubInner>,
}

impl HeadingHub {
    /// Available sensor with permission granted
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the platform as having (or lacking) an orientation sensor
    pub fn set_available(&self, available: bool) {
        self.inner.unavailable.store(!available, Ordering::Release);
    }

    /// Set the outcome of the next permission request
    pub fn set_permission_granted(&self, granted: bool) {
        self.inner.denied.store(!granted, Ordering::Release);
    }

    /// Deliver a heading to every attached listener. Non-finite readings are
    /// dropped; others are wrapped into [0, 360).
    pub fn publish(&self, heading_deg: f64) {
        if !heading_deg.is_finite() {
            return;
        }
        let heading = normalize_heading(heading_deg);
        // Listeners may unsubscribe from inside the callback
        let listeners: Vec<Listener> = self.inner.listeners.lock().values().cloned().collect();
        for listener in listeners {
            listener(heading);
        }
    }

    /// Number of attached listeners
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().len()
    }

    fn is_available(&self) -> bool {
        !self.inner.unavailable.load(Ordering::Acquire)
    }
}

impl HeadingSensor for HeadingHub {
    fn request_permission(&self) -> Result<()> {
        if !self.is_available() {
            return Err(GeoError::SensorUnavailable);
        }
        if self.inner.denied.load(Ordering::Acquire) {
            return Err(GeoError::PermissionDenied(Permission::Orientation));
        }
        Ok(())
    }

    fn subscribe_heading(&self, callback: HeadingCallback) -> Result<HeadingSubscription> {
        if !self.is_available() {
            return Err(GeoError::SensorUnavailable);
        }
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().insert(id, Arc::from(callback));
        tracing::debug!("Heading listener {} attached", id);

        let hub: Weak<HubInner> = Arc::downgrade(&self.inner);
        Ok(HeadingSubscription::new(move || {
            if let Some(hub) = hub.upgrade() {
                hub.listeners.lock().remove(&id);
                tracing::debug!("Heading listener {} detached", id);
            }
        }))
    }
}

impl std::fmt::Debug for HeadingHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeadingHub")
            .field("listeners", &self.listener_count())
            .field("available", &self.is_available())
            .finish()
    }
}

// ============================================================================
// 4. LatestHeading — Last-value-wins cell
// ============================================================================

/// Lock-free holder for the most recent heading. Clones share the value.
#[derive(Debug, Clone)]
pub struct LatestHeading {
    bits: Arc<AtomicU64>,
}

impl Default for LatestHeading {
    fn default() -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(f64::NAN.to_bits())),
        }
    }
}

impl LatestHeading {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored heading. Non-finite values are ignored.
    pub fn store(&self, heading_deg: f64) {
        if heading_deg.is_finite() {
            self.bits.store(normalize_heading(heading_deg).to_bits(), Ordering::Release);
        }
    }

    /// The last stored heading, if any
    pub fn load(&self) -> Option<f64> {
        let value = f64::from_bits(self.bits.load(Ordering::Acquire));
        value.is_finite().then_some(value)
    }

    /// Forget the stored heading
    pub fn clear(&self) {
        self.bits.store(f64::NAN.to_bits(), Ordering::Release);
    }

    /// A listener that stores every heading it receives into this cell
    pub fn listener(&self) -> HeadingCallback {
        let cell = self.clone();
        Box::new(move |heading| cell.store(heading))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_reaches_listeners() {
        let hub = HeadingHub::new();
        let latest = LatestHeading::new();
        let sub = hub.subscribe_heading(latest.listener()).unwrap();
        assert_eq!(hub.listener_count(), 1);

        hub.publish(-90.0);
        assert_eq!(latest.load(), Some(270.0));
        hub.publish(f64::NAN);
        assert_eq!(latest.load(), Some(270.0));

        sub.unsubscribe();
        assert_eq!(hub.listener_count(), 0);
        hub.publish(10.0);
        assert_eq!(latest.load(), Some(270.0));
    }

    #[test]
    fn test_drop_detaches() {
        let hub = HeadingHub::new();
        {
            let _a = hub.subscribe_heading(Box::new(|_| {})).unwrap();
            let _b = hub.subscribe_heading(Box::new(|_| {})).unwrap();
            assert_eq!(hub.listener_count(), 2);
        }
        assert_eq!(hub.listener_count(), 0);
    }

    #[test]
    fn test_subscription_outlives_hub() {
        let hub = HeadingHub::new();
        let sub = hub.subscribe_heading(Box::new(|_| {})).unwrap();
        drop(hub);
        sub.unsubscribe();
    }

    #[test]
    fn test_permission_and_availability() {
        let hub = HeadingHub::new();
        assert!(hub.request_permission().is_ok());

        hub.set_permission_granted(false);
        assert!(matches!(
            hub.request_permission(),
            Err(GeoError::PermissionDenied(Permission::Orientation))
        ));

        hub.set_available(false);
        assert!(matches!(hub.request_permission(), Err(GeoError::SensorUnavailable)));
        assert!(matches!(
            hub.subscribe_heading(Box::new(|_| {})),
            Err(GeoError::SensorUnavailable)
        ));
    }

    #[test]
    fn test_latest_heading_across_threads() {
        let latest = LatestHeading::new();
        assert_eq!(latest.load(), None);

        let writer = latest.clone();
        std::thread::spawn(move || {
            for h in 0..=720 {
                writer.store(h as f64);
            }
        })
        .join()
        .unwrap();
        assert_eq!(latest.load(), Some(0.0));

        latest.clear();
        assert_eq!(latest.load(), None);
    }
}
