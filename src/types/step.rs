//! Procedure steps and their images

use image::{DynamicImage, GenericImageView, ImageResult};
use serde::{Deserialize, Serialize};

/// An uploaded step image.
///
/// Keeps the encoded payload exactly as uploaded together with the pixel
/// dimensions the decoder reported. Decoding back to a bitmap happens only
/// when the image is needed for export.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepImage {
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

impl StepImage {
    /// Decode an uploaded PNG/JPEG/GIF payload
    pub fn from_bytes(bytes: Vec<u8>) -> ImageResult<Self> {
        let (width, height) = image::load_from_memory(&bytes)?.dimensions();
        Ok(Self {
            width,
            height,
            bytes,
        })
    }

    /// Decode the payload into a bitmap
    pub fn to_bitmap(&self) -> ImageResult<DynamicImage> {
        image::load_from_memory(&self.bytes)
    }
}

// Image payloads can be megabytes; keep Debug output readable
impl std::fmt::Debug for StepImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .finish()
    }
}

/// One numbered unit of the procedure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub step_number: u32,
    pub image: Option<StepImage>,
    pub description: String,
}

impl Step {
    pub fn has_description(&self) -> bool {
        !self.description.trim().is_empty()
    }
}

/// Steps sorted by ascending step number.
///
/// Storage keeps insertion order; this is the order used for display and
/// export. The sort is stable, so duplicate numbers keep insertion order.
pub fn in_display_order(steps: &[Step]) -> Vec<&Step> {
    let mut sorted: Vec<&Step> = steps.iter().collect();
    sorted.sort_by_key(|s| s.step_number);
    sorted
}

/// Suggested number for the next step added after a restore
pub fn next_step_number(steps: &[Step]) -> u32 {
    steps
        .iter()
        .map(|s| s.step_number)
        .max()
        .map_or(1, |n| n.saturating_add(1))
}
