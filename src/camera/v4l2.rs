//! V4L2 capture backend.
//!
//! Local device capture for the proctoring camera (feature: capture-v4l2).
//! The backend is responsible for:
//! - Opening the device node behind a `v4l2://` URI (e.g., `v4l2:///dev/video0`)
//! - Negotiating the requested geometry
//! - Handing the open device to the capture handle so release closes it
//!
//! The backend MUST NOT:
//! - Hold the device open outside a live capture handle
//! - Treat an open failure as fatal (it maps to a permission outcome)

use anyhow::Result;

use v4l::video::Capture;

use super::{CameraConfig, CaptureHandle, PermissionError, StreamResource, VideoTrack};

pub(crate) struct V4l2Camera {
    device_path: String,
}

impl V4l2Camera {
    pub(crate) fn new(config: &CameraConfig) -> Result<Self> {
        let device_path = config
            .source
            .strip_prefix("v4l2://")
            .unwrap_or(&config.source)
            .to_string();
        Ok(Self { device_path })
    }

    pub(crate) fn request_stream(
        &mut self,
        config: &CameraConfig,
    ) -> Result<CaptureHandle, PermissionError> {
        let device = v4l::Device::with_path(&self.device_path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => PermissionError::NoDevice,
            std::io::ErrorKind::PermissionDenied => PermissionError::Denied,
            std::io::ErrorKind::ResourceBusy => PermissionError::DeviceBusy,
            _ => PermissionError::Unavailable(err.to_string()),
        })?;

        let mut format = device
            .format()
            .map_err(|err| PermissionError::Unavailable(err.to_string()))?;
        format.width = config.width;
        format.height = config.height;

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                // Keep whatever the driver gives us; geometry is a preference.
                log::warn!(
                    "V4l2Camera: failed to set format on {}: {}",
                    self.device_path,
                    err
                );
                device
                    .format()
                    .map_err(|err| PermissionError::Unavailable(err.to_string()))?
            }
        };

        let track = VideoTrack::new(format!(
            "v4l2 video {}x{} ({})",
            format.width,
            format.height,
            config.facing.as_str()
        ));
        log::info!(
            "CameraSource: device {} open ({}x{})",
            self.device_path,
            format.width,
            format.height
        );
        Ok(CaptureHandle::new(
            vec![track],
            StreamResource::Device(device),
        ))
    }
}
