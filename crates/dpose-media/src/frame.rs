//! Decoded frames and the frame source seam.

use std::path::Path;

use crate::error::{MediaError, MediaResult};

/// A decoded frame as packed RGB24, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct RgbFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl RgbFrame {
    /// Wrap raw RGB24 bytes, checking the buffer matches the dimensions.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> MediaResult<Self> {
        let expected = Self::byte_len(width, height);
        if data.len() != expected {
            return Err(MediaError::internal(format!(
                "RGB frame buffer is {} bytes, expected {} for {}x{}",
                data.len(),
                expected,
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Bytes needed for one frame of the given size.
    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 3
    }
}

/// Sequential reader of decoded frames.
pub trait FrameSource {
    /// Frame rate reported by the source, if any.
    fn fps(&self) -> Option<f64>;

    /// Next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> MediaResult<Option<RgbFrame>>;
}

/// Opens a video file as a [`FrameSource`].
pub trait VideoOpener {
    type Source: FrameSource;

    /// Open `path`, decoding at most `max_frames` frames.
    fn open(&self, path: &Path, max_frames: usize) -> MediaResult<Self::Source>;
}
