//! Polling driver that feeds hand-pose predictions through the classifier
//! and debouncer and reports committed gestures to a listener.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

use super::debounce::{Debouncer, DEFAULT_SETTLE};
use super::{classify, GestureSignal, GestureThresholds, HandFrame};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Camera permission denied")]
    PermissionDenied,
    #[error("Failed to load hand pose model: {0}")]
    Model(String),
}

#[derive(Error, Debug)]
pub enum EstimateError {
    #[error("No video frame available")]
    NoFrame,
    #[error("Hand pose inference failed: {0}")]
    Inference(String),
}

/// Source of hand-landmark predictions, usually a pose model reading the
/// latest camera frame.
#[async_trait]
pub trait HandPoseEstimator: Send {
    async fn load(&mut self) -> Result<(), LoadError> {
        Ok(())
    }

    /// `Ok(None)` means no hand was detected in the frame.
    async fn estimate(&mut self) -> Result<Option<HandFrame>, EstimateError>;
}

pub trait GestureListener: Send {
    fn on_gesture_detected(&mut self, signal: GestureSignal);
}

impl<F> GestureListener for F
where
    F: FnMut(GestureSignal) + Send,
{
    fn on_gesture_detected(&mut self, signal: GestureSignal) {
        self(signal);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureStatus {
    Loading,
    PermissionDenied,
    Ready(GestureSignal),
}

/// Locale strings for the camera overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayStrings {
    pub loading: String,
    pub permission: String,
    pub allow_camera: String,
    pub no_gesture: String,
    pub gesture_detected: String,
}

impl Default for DisplayStrings {
    fn default() -> Self {
        DisplayStrings {
            loading: "Loading hand detection...".to_string(),
            permission: "Camera permission is required".to_string(),
            allow_camera: "Please allow camera access to use gesture control".to_string(),
            no_gesture: "No gesture detected".to_string(),
            gesture_detected: "Gesture detected".to_string(),
        }
    }
}

impl GestureStatus {
    pub fn text(&self, strings: &DisplayStrings) -> String {
        match self {
            GestureStatus::Loading => strings.loading.clone(),
            GestureStatus::PermissionDenied => {
                format!("{}\n{}", strings.permission, strings.allow_camera)
            }
            GestureStatus::Ready(GestureSignal::NoGesture) => strings.no_gesture.clone(),
            GestureStatus::Ready(signal) => format!("{}: {signal}", strings.gesture_detected),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionOptions {
    pub poll_interval: Duration,
    pub settle: Duration,
    pub thresholds: GestureThresholds,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            poll_interval: DEFAULT_POLL_INTERVAL,
            settle: DEFAULT_SETTLE,
            thresholds: GestureThresholds::default(),
        }
    }
}

pub struct GestureSession<E, L> {
    estimator: E,
    listener: L,
    options: SessionOptions,
    debouncer: Debouncer,
    model_ready: bool,
    status: watch::Sender<GestureStatus>,
}

impl<E, L> GestureSession<E, L>
where
    E: HandPoseEstimator,
    L: GestureListener,
{
    pub fn new(estimator: E, listener: L, options: SessionOptions) -> Self {
        let (status, _) = watch::channel(GestureStatus::Loading);
        GestureSession {
            estimator,
            listener,
            debouncer: Debouncer::new(options.settle),
            options,
            model_ready: false,
            status,
        }
    }

    pub fn status(&self) -> GestureStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<GestureStatus> {
        self.status.subscribe()
    }

    pub fn into_parts(self) -> (E, L) {
        (self.estimator, self.listener)
    }

    /// Loads the estimator. A model that fails to load leaves the session
    /// ready but inert: every tick is a no-op and the gesture stays `none`.
    pub async fn initialize(&mut self) -> GestureStatus {
        let status = match self.estimator.load().await {
            Ok(()) => {
                info!("Hand pose model loaded");
                self.model_ready = true;
                GestureStatus::Ready(self.debouncer.committed())
            }
            Err(LoadError::PermissionDenied) => {
                warn!("Camera permission denied, gesture control disabled");
                GestureStatus::PermissionDenied
            }
            Err(e) => {
                warn!("{e}");
                GestureStatus::Ready(self.debouncer.committed())
            }
        };
        self.status.send_replace(status);
        status
    }

    /// Runs one poll: estimate, classify and debounce.
    pub async fn tick(&mut self) {
        if !self.model_ready {
            return;
        }

        let frame = match self.estimator.estimate().await {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Error during hand detection, skipping frame: {e}");
                return;
            }
        };

        let commit = match frame {
            None => self.debouncer.observe_no_hand(),
            Some(frame) => {
                let raw = classify(Some(&frame), &self.options.thresholds);
                self.debouncer.observe_hand(raw, Instant::now())
            }
        };
        if let Some(signal) = commit {
            self.commit(signal);
        }
    }

    /// Commits a pending gesture whose settle window ran out between polls.
    pub fn flush(&mut self) {
        if let Some(signal) = self.debouncer.poll(Instant::now()) {
            self.commit(signal);
        }
    }

    /// Polls until `shutdown` flips or its sender goes away. Each inference
    /// is awaited before the next tick is taken, so at most one is in flight.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Self {
        if self.initialize().await == GestureStatus::PermissionDenied {
            let _ = shutdown.wait_for(|stop| *stop).await;
            return self;
        }

        let mut interval = tokio::time::interval(self.options.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let deadline = self.debouncer.deadline();
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                _ = interval.tick() => self.tick().await,
                () = wait_until(deadline) => self.flush(),
            }
        }

        debug!("Gesture session stopped");
        self
    }

    fn commit(&mut self, signal: GestureSignal) {
        debug!("Committed gesture {signal}");
        self.status.send_replace(GestureStatus::Ready(signal));
        self.listener.on_gesture_detected(signal);
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
