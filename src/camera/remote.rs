//! Remote feed backend.
//!
//! Externally hosted camera feed for the proctoring session (feature:
//! remote-feed). This covers deployments where the candidate's video is
//! streamed by a separate capture service rather than captured in-process.
//!
//! The backend is responsible for:
//! - Connecting to an `http(s)://` MJPEG stream or JPEG snapshot endpoint
//! - Decoding one frame in-memory to verify the feed and learn its geometry
//! - Keeping the open stream inside the capture handle so release drops it
//!
//! The backend MUST NOT:
//! - Store fetched frames to disk
//! - Treat a connect failure as fatal (it maps to a permission outcome)

use std::io::Read;

use anyhow::Result;
use image::GenericImageView;
use url::Url;

use super::{CameraConfig, CaptureHandle, PermissionError, StreamResource, VideoTrack};

const MAX_JPEG_BYTES: usize = 5 * 1024 * 1024;

pub(crate) struct RemoteFeedCamera {
    url: String,
}

/// Open remote stream kept alive by the capture handle.
pub(crate) enum RemoteStream {
    Mjpeg(MjpegStream),
    Snapshot,
}

impl RemoteFeedCamera {
    pub(crate) fn new(config: &CameraConfig) -> Result<Self> {
        let url = Url::parse(&config.source)?;
        Ok(Self {
            url: url.to_string(),
        })
    }

    pub(crate) fn request_stream(
        &mut self,
        config: &CameraConfig,
    ) -> Result<CaptureHandle, PermissionError> {
        let response = ureq::get(&self.url).call().map_err(|err| match err {
            ureq::Error::Status(401 | 403, _) => PermissionError::Denied,
            ureq::Error::Status(404, _) => PermissionError::NoDevice,
            other => PermissionError::Unavailable(other.to_string()),
        })?;

        let content_type = response.header("Content-Type").unwrap_or("").to_lowercase();
        let (stream, jpeg) = if content_type.contains("multipart") {
            let mut mjpeg = MjpegStream::new(response.into_reader());
            let jpeg = mjpeg
                .read_next_jpeg()
                .map_err(|err| PermissionError::Unavailable(err.to_string()))?;
            (RemoteStream::Mjpeg(mjpeg), jpeg)
        } else {
            let mut bytes = Vec::new();
            response
                .into_reader()
                .take(MAX_JPEG_BYTES as u64)
                .read_to_end(&mut bytes)
                .map_err(|err| PermissionError::Unavailable(err.to_string()))?;
            if bytes.is_empty() {
                return Err(PermissionError::Unavailable(
                    "empty snapshot response".to_string(),
                ));
            }
            (RemoteStream::Snapshot, bytes)
        };

        // Decode once to confirm the feed carries video and learn its
        // geometry; the frame itself is not retained.
        let (width, height) = decode_dimensions(&jpeg)
            .map_err(|err| PermissionError::Unavailable(err.to_string()))?;

        let track = VideoTrack::new(format!(
            "remote video {}x{} ({})",
            width,
            height,
            config.facing.as_str()
        ));
        log::info!(
            "CameraSource: remote feed {} connected ({}x{})",
            self.url,
            width,
            height
        );
        Ok(CaptureHandle::new(
            vec![track],
            StreamResource::Remote(stream),
        ))
    }
}

pub(crate) struct MjpegStream {
    reader: Box<dyn Read + Send>,
    buffer: Vec<u8>,
}

impl MjpegStream {
    fn new(reader: Box<dyn Read + Send>) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(64 * 1024),
        }
    }

    fn read_next_jpeg(&mut self) -> Result<Vec<u8>> {
        let mut chunk = vec![0u8; 8192];
        loop {
            if let Some((start, end)) = find_jpeg_bounds(&self.buffer) {
                let frame = self.buffer[start..end].to_vec();
                self.buffer.drain(..end);
                return Ok(frame);
            }

            let read = self.reader.read(&mut chunk)?;
            if read == 0 {
                anyhow::bail!("mjpeg stream ended");
            }
            self.buffer.extend_from_slice(&chunk[..read]);

            if self.buffer.len() > MAX_JPEG_BYTES {
                anyhow::bail!("mjpeg frame exceeded max jpeg size");
            }
        }
    }
}

fn decode_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    let image = image::load_from_memory(bytes)?;
    Ok(image.dimensions())
}

fn find_jpeg_bounds(buffer: &[u8]) -> Option<(usize, usize)> {
    let start = buffer.windows(2).position(|w| w == [0xFF, 0xD8])?;
    let end = buffer[start + 2..]
        .windows(2)
        .position(|w| w == [0xFF, 0xD9])?;
    Some((start, start + 2 + end + 2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jpeg_bounds_scan() {
        let data = [0x00, 0xFF, 0xD8, 0x01, 0x02, 0xFF, 0xD9, 0x00];
        assert_eq!(find_jpeg_bounds(&data), Some((1, 7)));
        assert_eq!(find_jpeg_bounds(&data[..5]), None);
    }
}
