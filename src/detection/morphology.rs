//! Binary morphology with a full k x k square structuring element.
//!
//! The square element is separable, so every operation runs a horizontal pass
//! followed by a vertical pass. Dilation ignores out-of-bounds pixels; erosion
//! treats them as background, which erodes shapes touching the border.

use super::mask::BinaryMask;

#[derive(Clone, Copy)]
enum Op {
    Dilate,
    Erode,
}

fn radius(kernel_size: u32) -> u32 {
    kernel_size / 2
}

/// Run one 1-D window pass along rows (`horizontal`) or columns.
fn pass(mask: &BinaryMask, r: u32, op: Op, horizontal: bool) -> BinaryMask {
    let (width, height) = (mask.width(), mask.height());
    let mut out = BinaryMask::new(width, height);
    let len = if horizontal { width } else { height };

    for y in 0..height {
        for x in 0..width {
            let pos = if horizontal { x } else { y };
            let lo = pos as i64 - r as i64;
            let hi = pos as i64 + r as i64;
            let clipped = lo < 0 || hi >= len as i64;
            let start = lo.max(0) as u32;
            let end = hi.min(len as i64 - 1) as u32;

            let sample = |i: u32| {
                if horizontal { mask.get(i, y) } else { mask.get(x, i) }
            };

            let value = match op {
                Op::Dilate => (start..=end).any(sample),
                Op::Erode => !clipped && (start..=end).all(sample),
            };
            if value {
                out.set(x, y, true);
            }
        }
    }
    out
}

fn apply(mask: &BinaryMask, kernel_size: u32, op: Op) -> BinaryMask {
    let r = radius(kernel_size);
    if r == 0 {
        return mask.clone();
    }
    let rows = pass(mask, r, op, true);
    pass(&rows, r, op, false)
}

pub fn dilate(mask: &BinaryMask, kernel_size: u32) -> BinaryMask {
    apply(mask, kernel_size, Op::Dilate)
}

pub fn erode(mask: &BinaryMask, kernel_size: u32) -> BinaryMask {
    apply(mask, kernel_size, Op::Erode)
}

/// Erosion then dilation: strips specks smaller than the kernel.
pub fn open(mask: &BinaryMask, kernel_size: u32) -> BinaryMask {
    dilate(&erode(mask, kernel_size), kernel_size)
}

/// Dilation then erosion: bridges gaps narrower than the kernel.
pub fn close(mask: &BinaryMask, kernel_size: u32) -> BinaryMask {
    erode(&dilate(mask, kernel_size), kernel_size)
}
