//! Media acquisition.
//!
//! This module owns the camera lifecycle for one proctoring session:
//! - Requesting a capture stream at a modest target resolution
//! - Releasing any previously held handle before re-acquiring
//! - Discarding acquisitions that resolve after the session tore down
//!
//! Sources are selected by URI scheme:
//! - `stub://` / `stub-denied://`: synthetic stream (tests, demos)
//! - `v4l2://`: local device capture (feature: capture-v4l2)
//! - `http(s)://`: externally hosted feed (feature: remote-feed)
//!
//! Acquisition failures are never fatal: the session continues without video
//! and the source stays retryable. The acquisition layer MUST NOT leak a
//! hardware handle, including on the stale-completion path.

#[cfg(feature = "remote-feed")]
mod remote;
#[cfg(feature = "capture-v4l2")]
mod v4l2;

#[cfg(feature = "remote-feed")]
use remote::RemoteFeedCamera;
#[cfg(feature = "capture-v4l2")]
use v4l2::V4l2Camera;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::CameraState;

/// Camera orientation preference, mirroring the host-page constraint.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CameraFacing {
    #[default]
    User,
    Environment,
}

impl CameraFacing {
    pub fn as_str(self) -> &'static str {
        match self {
            CameraFacing::User => "user",
            CameraFacing::Environment => "environment",
        }
    }
}

impl std::str::FromStr for CameraFacing {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(CameraFacing::User),
            "environment" => Ok(CameraFacing::Environment),
            other => Err(anyhow!("unknown camera facing '{}'", other)),
        }
    }
}

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Source URI (e.g., "stub://candidate", "v4l2:///dev/video0").
    pub source: String,
    /// Requested frame width.
    pub width: u32,
    /// Requested frame height.
    pub height: u32,
    /// Orientation preference.
    pub facing: CameraFacing,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            source: "stub://candidate".to_string(),
            width: 320,
            height: 240,
            facing: CameraFacing::User,
        }
    }
}

// -------------------- Permission Outcomes --------------------

/// Why an acquisition attempt produced no stream.
///
/// None of these are fatal to a session; all leave the source retryable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PermissionError {
    /// The user or OS declined the permission prompt.
    Denied,
    /// No capture device is present.
    NoDevice,
    /// The device exists but is held by another process.
    DeviceBusy,
    /// Backend-specific failure (network, decode, driver).
    Unavailable(String),
}

impl std::fmt::Display for PermissionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionError::Denied => write!(f, "camera permission denied"),
            PermissionError::NoDevice => write!(f, "no camera device available"),
            PermissionError::DeviceBusy => write!(f, "camera device busy"),
            PermissionError::Unavailable(reason) => write!(f, "camera unavailable: {}", reason),
        }
    }
}

impl std::error::Error for PermissionError {}

// -------------------- Capture Handle --------------------

/// One live track within a capture stream.
#[derive(Clone, Debug)]
pub struct VideoTrack {
    label: String,
    live: Arc<AtomicBool>,
}

impl VideoTrack {
    fn new(label: String) -> Self {
        Self {
            label,
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
    }
}

/// Backend-owned resources kept alive for the duration of a stream.
enum StreamResource {
    Synthetic,
    #[cfg(feature = "capture-v4l2")]
    Device(v4l::Device),
    #[cfg(feature = "remote-feed")]
    Remote(remote::RemoteStream),
}

/// A live capture stream: a set of stoppable tracks plus whatever resource
/// the backend holds open underneath them.
///
/// Not `Clone`: exactly one owner per stream, so release cannot be split.
pub struct CaptureHandle {
    tracks: Vec<VideoTrack>,
    #[allow(dead_code)]
    resource: StreamResource,
}

impl CaptureHandle {
    fn new(tracks: Vec<VideoTrack>, resource: StreamResource) -> Self {
        Self { tracks, resource }
    }

    pub fn tracks(&self) -> &[VideoTrack] {
        &self.tracks
    }

    /// Stop every track. Idempotent; the underlying resource is freed when
    /// the handle drops.
    pub fn stop_all(&mut self) {
        for track in &self.tracks {
            track.stop();
        }
    }

    /// Liveness probe that outlives the handle. Used to verify release.
    pub fn probe(&self) -> TrackProbe {
        TrackProbe {
            flags: self.tracks.iter().map(|t| t.live.clone()).collect(),
        }
    }
}

impl std::fmt::Debug for CaptureHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureHandle")
            .field("tracks", &self.tracks)
            .finish()
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.stop_all();
    }
}

/// Observes track liveness without keeping the stream alive.
#[derive(Clone, Debug)]
pub struct TrackProbe {
    flags: Vec<Arc<AtomicBool>>,
}

impl TrackProbe {
    pub fn any_live(&self) -> bool {
        self.flags.iter().any(|f| f.load(Ordering::SeqCst))
    }
}

// -------------------- Acquisition Tickets --------------------

/// Generation token for one acquisition attempt.
///
/// Completing an acquisition with a ticket whose generation no longer matches
/// the source (a newer attempt started, or the source shut down) discards the
/// result instead of applying it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AcquisitionTicket {
    generation: u64,
}

// -------------------- Camera Source --------------------

/// Camera source for one session.
///
/// Owns at most one live [`CaptureHandle`] and the session's [`CameraState`].
/// Acquisition is serialized by construction: starting a new attempt releases
/// whatever the previous one bound.
pub struct CameraSource {
    config: CameraConfig,
    backend: CameraBackend,
    state: CameraState,
    handle: Option<CaptureHandle>,
    generation: u64,
    shut_down: bool,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "capture-v4l2")]
    V4l2(V4l2Camera),
    #[cfg(feature = "remote-feed")]
    Remote(RemoteFeedCamera),
}

impl CameraSource {
    /// Open a source for the configured URI. The stream itself is not
    /// requested until [`CameraSource::acquire`].
    pub fn open(config: CameraConfig) -> Result<Self> {
        let backend = if config.source.starts_with("stub://")
            || config.source.starts_with("stub-denied://")
        {
            CameraBackend::Synthetic(SyntheticCamera::new(&config))
        } else if config.source.starts_with("v4l2://") {
            #[cfg(feature = "capture-v4l2")]
            {
                CameraBackend::V4l2(V4l2Camera::new(&config)?)
            }
            #[cfg(not(feature = "capture-v4l2"))]
            {
                anyhow::bail!("v4l2 capture requires the capture-v4l2 feature")
            }
        } else if config.source.starts_with("http://") || config.source.starts_with("https://") {
            #[cfg(feature = "remote-feed")]
            {
                CameraBackend::Remote(RemoteFeedCamera::new(&config)?)
            }
            #[cfg(not(feature = "remote-feed"))]
            {
                anyhow::bail!("remote feeds require the remote-feed feature")
            }
        } else {
            return Err(anyhow!(
                "unsupported camera source '{}'; expected stub://, v4l2:// or http(s)://",
                config.source
            ));
        };

        Ok(Self {
            config,
            backend,
            state: CameraState::Unknown,
            handle: None,
            generation: 0,
            shut_down: false,
        })
    }

    pub fn state(&self) -> CameraState {
        self.state
    }

    pub fn handle(&self) -> Option<&CaptureHandle> {
        self.handle.as_ref()
    }

    pub fn has_live_handle(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| h.tracks().iter().any(VideoTrack::is_live))
            .unwrap_or(false)
    }

    /// Start an acquisition attempt.
    ///
    /// Any previously held handle is released first, so overlapping attempts
    /// cannot orphan a stream, and the returned ticket supersedes every
    /// earlier one.
    pub fn begin_acquisition(&mut self) -> AcquisitionTicket {
        self.release_handle();
        self.generation += 1;
        AcquisitionTicket {
            generation: self.generation,
        }
    }

    /// Hardware/stream negotiation. Does not touch session-visible state;
    /// pass the outcome to [`CameraSource::complete_acquisition`].
    pub fn negotiate(&mut self) -> Result<CaptureHandle, PermissionError> {
        match &mut self.backend {
            CameraBackend::Synthetic(camera) => camera.request_stream(&self.config),
            #[cfg(feature = "capture-v4l2")]
            CameraBackend::V4l2(camera) => camera.request_stream(&self.config),
            #[cfg(feature = "remote-feed")]
            CameraBackend::Remote(camera) => camera.request_stream(&self.config),
        }
    }

    /// Apply a completed acquisition.
    ///
    /// A stale ticket (a newer attempt started, or the source shut down
    /// while the request was in flight) discards the outcome: a
    /// just-acquired handle is stopped and [`CameraState`] is left untouched.
    pub fn complete_acquisition(
        &mut self,
        ticket: AcquisitionTicket,
        outcome: Result<CaptureHandle, PermissionError>,
    ) -> CameraState {
        if self.shut_down || ticket.generation != self.generation {
            if let Ok(mut handle) = outcome {
                log::debug!("discarding stale camera acquisition");
                handle.stop_all();
            }
            return self.state;
        }

        match outcome {
            Ok(handle) => {
                self.handle = Some(handle);
                self.state = CameraState::Granted;
                log::info!("camera stream bound from {}", self.config.source);
            }
            Err(e) => {
                log::warn!("camera acquisition failed: {}", e);
                self.state = CameraState::Denied;
            }
        }
        self.state
    }

    /// Begin, negotiate, and complete in one step: the synchronous path used
    /// for the delayed first acquisition and for manual retries.
    pub fn acquire(&mut self) -> CameraState {
        if self.shut_down {
            return self.state;
        }
        let ticket = self.begin_acquisition();
        let outcome = self.negotiate();
        self.complete_acquisition(ticket, outcome)
    }

    /// Stop and drop the held handle, if any. Idempotent; does not change
    /// [`CameraState`] (a granted-then-released camera is still "granted"
    /// until the next acquisition or teardown decides otherwise).
    fn release_handle(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.stop_all();
        }
    }

    /// Release the stream and refuse every future or in-flight acquisition.
    /// Idempotent.
    pub fn shutdown(&mut self) {
        self.shut_down = true;
        self.generation += 1;
        self.release_handle();
    }

    /// Flip the simulated permission outcome. Synthetic backend only; no
    /// effect on hardware backends.
    pub fn set_simulated_permission(&mut self, granted: bool) {
        if let CameraBackend::Synthetic(camera) = &mut self.backend {
            camera.deny = !granted;
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic camera (stub://, stub-denied://) for tests and demos
// ----------------------------------------------------------------------------

struct SyntheticCamera {
    deny: bool,
    streams_opened: u64,
}

impl SyntheticCamera {
    fn new(config: &CameraConfig) -> Self {
        Self {
            deny: config.source.starts_with("stub-denied://"),
            streams_opened: 0,
        }
    }

    fn request_stream(&mut self, config: &CameraConfig) -> Result<CaptureHandle, PermissionError> {
        self.streams_opened += 1;
        if self.deny {
            return Err(PermissionError::Denied);
        }
        let track = VideoTrack::new(format!(
            "synthetic video {}x{} ({})",
            config.width,
            config.height,
            config.facing.as_str()
        ));
        log::info!(
            "CameraSource: stream #{} opened from {} (synthetic)",
            self.streams_opened,
            config.source
        );
        Ok(CaptureHandle::new(vec![track], StreamResource::Synthetic))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config() -> CameraConfig {
        CameraConfig {
            source: "stub://candidate".to_string(),
            ..CameraConfig::default()
        }
    }

    fn denied_config() -> CameraConfig {
        CameraConfig {
            source: "stub-denied://candidate".to_string(),
            ..CameraConfig::default()
        }
    }

    #[test]
    fn acquire_binds_a_live_handle() -> Result<()> {
        let mut camera = CameraSource::open(stub_config())?;
        assert_eq!(camera.state(), CameraState::Unknown);

        assert_eq!(camera.acquire(), CameraState::Granted);
        assert!(camera.has_live_handle());
        Ok(())
    }

    #[test]
    fn denied_acquisition_holds_no_handle_and_stays_retryable() -> Result<()> {
        let mut camera = CameraSource::open(denied_config())?;

        assert_eq!(camera.acquire(), CameraState::Denied);
        assert!(!camera.has_live_handle());

        // Permission granted on retry.
        camera.set_simulated_permission(true);
        assert_eq!(camera.acquire(), CameraState::Granted);
        assert!(camera.has_live_handle());
        Ok(())
    }

    #[test]
    fn reacquisition_releases_the_previous_stream() -> Result<()> {
        let mut camera = CameraSource::open(stub_config())?;
        camera.acquire();
        let probe = camera.handle().expect("handle bound").probe();
        assert!(probe.any_live());

        camera.acquire();
        assert!(!probe.any_live(), "first stream must be stopped");
        assert!(camera.has_live_handle(), "second stream is live");
        Ok(())
    }

    #[test]
    fn stale_completion_after_shutdown_is_discarded() -> Result<()> {
        let mut camera = CameraSource::open(stub_config())?;
        let ticket = camera.begin_acquisition();
        let outcome = camera.negotiate();
        let probe = outcome.as_ref().expect("stream granted").probe();

        camera.shutdown();
        let state = camera.complete_acquisition(ticket, outcome);

        assert_eq!(state, CameraState::Unknown, "state must not change");
        assert!(!camera.has_live_handle());
        assert!(!probe.any_live(), "late stream must be stopped");
        Ok(())
    }

    #[test]
    fn superseded_ticket_is_discarded() -> Result<()> {
        let mut camera = CameraSource::open(stub_config())?;
        let stale = camera.begin_acquisition();
        let stale_outcome = camera.negotiate();

        // A newer attempt wins the race.
        camera.acquire();
        let probe = stale_outcome.as_ref().expect("stream granted").probe();
        camera.complete_acquisition(stale, stale_outcome);

        assert!(!probe.any_live());
        assert_eq!(camera.state(), CameraState::Granted);
        assert!(camera.has_live_handle());
        Ok(())
    }

    #[test]
    fn shutdown_is_idempotent() -> Result<()> {
        let mut camera = CameraSource::open(stub_config())?;
        camera.acquire();
        let probe = camera.handle().expect("handle bound").probe();

        camera.shutdown();
        camera.shutdown();

        assert!(!probe.any_live());
        assert!(!camera.has_live_handle());

        // A shut-down source refuses further acquisitions.
        camera.acquire();
        assert!(!camera.has_live_handle());
        Ok(())
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        let config = CameraConfig {
            source: "ftp://nope".to_string(),
            ..CameraConfig::default()
        };
        assert!(CameraSource::open(config).is_err());
    }
}
