use crate::models::{BoundingBox, ConnectedComponent};

use super::mask::BinaryMask;

const NEIGHBOURS: [(i64, i64); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Components kept after size filtering, plus how many were seen in total.
#[derive(Debug, Clone)]
pub struct Labeling {
    pub components: Vec<ConnectedComponent>,
    pub total_found: usize,
    pub filtered_out: usize,
}

/// Label every 8-connected foreground region in raster order.
///
/// Each seed is grown with an explicit stack, so memory is bounded by the
/// component size rather than the recursion depth.
pub fn label_components(mask: &BinaryMask) -> Vec<ConnectedComponent> {
    let (width, height) = (mask.width(), mask.height());
    let mut visited = vec![false; width as usize * height as usize];
    let mut components = Vec::new();
    let mut stack: Vec<(u32, u32)> = Vec::new();

    for y in 0..height {
        for x in 0..width {
            let idx = y as usize * width as usize + x as usize;
            if visited[idx] || !mask.get(x, y) {
                continue;
            }

            visited[idx] = true;
            stack.push((x, y));
            let mut pixels = Vec::new();
            let (mut min_x, mut min_y, mut max_x, mut max_y) = (x, y, x, y);

            while let Some((px, py)) = stack.pop() {
                pixels.push((px, py));
                min_x = min_x.min(px);
                min_y = min_y.min(py);
                max_x = max_x.max(px);
                max_y = max_y.max(py);

                for (dx, dy) in NEIGHBOURS {
                    let nx = px as i64 + dx;
                    let ny = py as i64 + dy;
                    if nx < 0 || ny < 0 || nx >= width as i64 || ny >= height as i64 {
                        continue;
                    }
                    let (nx, ny) = (nx as u32, ny as u32);
                    let nidx = ny as usize * width as usize + nx as usize;
                    if !visited[nidx] && mask.get(nx, ny) {
                        visited[nidx] = true;
                        stack.push((nx, ny));
                    }
                }
            }

            components.push(ConnectedComponent {
                pixels,
                bbox: BoundingBox::from_extremes(min_x, min_y, max_x, max_y),
            });
        }
    }

    components
}

/// Label, then drop components whose area falls outside `[min_area, max_area]`.
pub fn find_components(mask: &BinaryMask, min_area: u32, max_area: u32) -> Labeling {
    let all = label_components(mask);
    let total_found = all.len();
    let components: Vec<ConnectedComponent> = all
        .into_iter()
        .filter(|c| c.area() >= min_area && c.area() <= max_area)
        .collect();
    let filtered_out = total_found - components.len();

    Labeling {
        components,
        total_found,
        filtered_out,
    }
}
