use image::{GrayImage, Luma};

use crate::error::{DetectionError, Result};

/// Foreground/background bitmap, one byte per pixel holding 0 or 1.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BinaryMask {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl BinaryMask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize],
        }
    }

    /// Wrap a row-major buffer. Any non-zero byte counts as foreground.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(DetectionError::InvalidImage(format!(
                "mask buffer holds {} bytes, {}x{} needs {}",
                data.len(),
                width,
                height,
                expected
            )));
        }
        let data = data.into_iter().map(|v| (v != 0) as u8).collect();
        Ok(Self { width, height, data })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        self.data[self.index(x, y)] != 0
    }

    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        let idx = self.index(x, y);
        self.data[idx] = value as u8;
    }

    pub fn count_foreground(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }

    /// Render ink as black on white, for debug dumps.
    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            if self.get(x, y) { Luma([0u8]) } else { Luma([255u8]) }
        })
    }
}

/// Mark pixels darker than `threshold` as foreground ("ink").
pub fn build_mask(gray: &GrayImage, threshold: u8) -> BinaryMask {
    let data = gray
        .pixels()
        .map(|p| (p[0] < threshold) as u8)
        .collect();
    BinaryMask {
        width: gray.width(),
        height: gray.height(),
        data,
    }
}
