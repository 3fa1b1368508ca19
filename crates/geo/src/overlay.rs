//! # AR Overlay Lifecycle
//!
//! Owns the camera stream and heading subscription for the AR view and turns
//! headings into [`ArFrame`]s.
//!
//! ```text
//!   Idle ──enable(gesture)──▶ Starting ──ok──▶ Active ──exit()──▶ Idle
//!    ▲                          │
//!    └──dismiss()── Error(msg) ◀┘ fail
//! ```
//!
//! Acquisition order is orientation permission, camera open, playback, then
//! heading subscription. Whatever was acquired before a failure is released
//! before `enable` returns; `Error` holds no resources and accepts a new
//! `enable` directly.
//!
//! ## Table of Contents
//! 1. OverlayState / UserGesture
//! 2. Camera seams
//! 3. ArOverlay — Lifecycle controller

use serde::{Deserialize, Serialize};

use crate::coords::{GeoPoint, PointOfInterest};
use crate::error::{GeoError, Result};
use crate::heading::{HeadingSensor, HeadingSubscription, LatestHeading};
use crate::projection::{ArFrame, Projector};

// ============================================================================
// 1. OverlayState / UserGesture
// ============================================================================

/// Lifecycle state of the AR overlay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlayState {
    Idle,
    Starting,
    Active,
    Error(String),
}

impl OverlayState {
    pub fn name(&self) -> &'static str {
        match self {
            OverlayState::Idle => "idle",
            OverlayState::Starting => "starting",
            OverlayState::Active => "active",
            OverlayState::Error(_) => "error",
        }
    }
}

impl std::fmt::Display for OverlayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverlayState::Error(message) => write!(f, "error: {}", message),
            other => f.write_str(other.name()),
        }
    }
}

/// Proof that `enable` runs inside a user-interaction callback. Hosts build
/// one only in their tap/click handler.
#[derive(Debug)]
pub struct UserGesture {
    _private: (),
}

impl UserGesture {
    pub fn from_user_interaction() -> Self {
        Self { _private: () }
    }
}

// ============================================================================
// 2. Camera seams
// ============================================================================

/// Rear-facing camera
pub trait CameraDevice: Send + Sync {
    /// Open a stream. Fails with [`GeoError::PermissionDenied`] when refused.
    fn open(&self) -> Result<Box<dyn CameraStream>>;
}

/// An open camera stream
pub trait CameraStream: Send {
    /// Start rendering frames
    fn play(&mut self) -> Result<()>;

    /// Stop all tracks. Must be safe to call on a stream that never played.
    fn stop(&mut self);
}

// ============================================================================
// 3. ArOverlay — Lifecycle controller
// ============================================================================

/// Resources held while the overlay is active
struct Session {
    stream: Box<dyn CameraStream>,
    subscription: HeadingSubscription,
}

impl Session {
    fn release(mut self) {
        self.subscription.unsubscribe();
        self.stream.stop();
    }
}

/// AR overlay controller over a heading sensor and camera
pub struct ArOverlay<S: HeadingSensor, C: CameraDevice> {
    sensor: S,
    camera: C,
    projector: Projector,
    state: OverlayState,
    session: Option<Session>,
    heading: LatestHeading,
    last_error: Option<String>,
}

impl<S: HeadingSensor, C: CameraDevice> ArOverlay<S, C> {
    pub fn new(sensor: S, camera: C, projector: Projector) -> Self {
        Self {
            sensor,
            camera,
            projector,
            state: OverlayState::Idle,
            session: None,
            heading: LatestHeading::new(),
            last_error: None,
        }
    }

    pub fn state(&self) -> &OverlayState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == OverlayState::Active
    }

    /// Message of the most recent failed `enable`
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Most recent heading received while active
    pub fn heading(&self) -> Option<f64> {
        self.heading.load()
    }

    /// Start the overlay. Valid from `Idle` or after a failed start.
    pub fn enable(&mut self, _gesture: UserGesture) -> Result<()> {
        if !matches!(self.state, OverlayState::Idle | OverlayState::Error(_)) {
            return Err(GeoError::InvalidState {
                action: "enable",
                state: self.state.name(),
            });
        }

        self.state = OverlayState::Starting;
        match self.acquire() {
            Ok(session) => {
                self.session = Some(session);
                self.state = OverlayState::Active;
                self.last_error = None;
                tracing::info!("AR overlay active");
                Ok(())
            }
            Err(err) => {
                let message = err.to_string();
                tracing::warn!("AR overlay failed to start: {}", message);
                self.state = OverlayState::Error(message.clone());
                self.last_error = Some(message);
                Err(err)
            }
        }
    }

    /// Acquire in order, releasing on the way out if a later step fails
    fn acquire(&mut self) -> Result<Session> {
        self.sensor.request_permission()?;

        let mut stream = self.camera.open()?;
        if let Err(err) = stream.play() {
            stream.stop();
            return Err(err);
        }

        self.heading.clear();
        match self.sensor.subscribe_heading(self.heading.listener()) {
            Ok(subscription) => Ok(Session { stream, subscription }),
            Err(err) => {
                stream.stop();
                Err(err)
            }
        }
    }

    /// Acknowledge a failed start and return to `Idle`. `last_error` keeps
    /// the message.
    pub fn dismiss(&mut self) -> Result<()> {
        if !matches!(self.state, OverlayState::Error(_)) {
            return Err(GeoError::InvalidState {
                action: "dismiss",
                state: self.state.name(),
            });
        }
        self.state = OverlayState::Idle;
        Ok(())
    }

    /// Leave the overlay. Detaches the heading listener and stops the camera
    /// before returning.
    pub fn exit(&mut self) -> Result<()> {
        if self.state != OverlayState::Active {
            return Err(GeoError::InvalidState {
                action: "exit",
                state: self.state.name(),
            });
        }
        if let Some(session) = self.session.take() {
            session.release();
        }
        self.heading.clear();
        self.state = OverlayState::Idle;
        tracing::info!("AR overlay closed");
        Ok(())
    }

    /// Project `points` for the latest heading. `None` until the first
    /// heading arrives.
    pub fn frame(&self, points: &[PointOfInterest], user: GeoPoint) -> Result<Option<ArFrame>> {
        if self.state != OverlayState::Active {
            return Err(GeoError::InvalidState {
                action: "render a frame",
                state: self.state.name(),
            });
        }
        Ok(self
            .heading
            .load()
            .map(|heading| self.projector.frame(user, heading, points)))
    }
}

impl<S: HeadingSensor, C: CameraDevice> Drop for ArOverlay<S, C> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            session.release();
        }
    }
}

impl<S: HeadingSensor, C: CameraDevice> std::fmt::Debug for ArOverlay<S, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArOverlay")
            .field("state", &self.state)
            .field("heading", &self.heading.load())
            .field("last_error", &self.last_error)
            .finish()
    }
}
