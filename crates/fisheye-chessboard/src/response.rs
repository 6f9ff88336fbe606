use fisheye_core::GrayView;

use crate::params::ResponseParams;

/// A coarse corner candidate at integer pixel coordinates.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Candidate {
    pub x: f64,
    pub y: f64,
    pub response: f32,
}

const RING_RADIUS: usize = 5;

/// 16 samples on a radius-5 ring, 22.5 degrees apart.
const RING: [(i32, i32); 16] = [
    (5, 0),
    (5, 2),
    (4, 4),
    (2, 5),
    (0, 5),
    (-2, 5),
    (-4, 4),
    (-5, 2),
    (-5, 0),
    (-5, -2),
    (-4, -4),
    (-2, -5),
    (0, -5),
    (2, -5),
    (4, -4),
    (5, -2),
];

/// Dense ring response.
///
/// At a checkerboard junction, samples 90 degrees apart sit in squares of
/// opposite color while samples 180 degrees apart match; the response is
/// the 90-degree contrast minus the 180-degree asymmetry minus the
/// deviation of the ring from the local mean.
fn corner_response(src: &GrayView<'_>) -> Vec<f32> {
    let (w, h) = (src.width, src.height);
    let mut resp = vec![0.0f32; w * h];
    if w <= 2 * RING_RADIUS || h <= 2 * RING_RADIUS {
        return resp;
    }

    for y in RING_RADIUS..h - RING_RADIUS {
        for x in RING_RADIUS..w - RING_RADIUS {
            let mut s = [0.0f32; 16];
            for (i, (dx, dy)) in RING.iter().enumerate() {
                let sx = (x as i32 + dx) as usize;
                let sy = (y as i32 + dy) as usize;
                s[i] = f32::from(src.data[sy * w + sx]);
            }

            let mut sum_response = 0.0f32;
            let mut diff_response = 0.0f32;
            let mut ring_sum = 0.0f32;
            for n in 0..16 {
                sum_response += (s[n] - s[(n + 4) & 15]).abs();
                diff_response += (s[n] - s[(n + 8) & 15]).abs();
                ring_sum += s[n];
            }

            let mut center_sum = 0.0f32;
            for dy in -1i32..=1 {
                for dx in -1i32..=1 {
                    let sx = (x as i32 + dx) as usize;
                    let sy = (y as i32 + dy) as usize;
                    center_sum += f32::from(src.data[sy * w + sx]);
                }
            }
            let mean_response = (ring_sum - 16.0 * center_sum / 9.0).abs();

            resp[y * w + x] = sum_response - diff_response - mean_response;
        }
    }
    resp
}

/// Thresholded, non-maximum-suppressed candidates, strongest first.
pub(crate) fn find_candidates(src: &GrayView<'_>, params: &ResponseParams) -> Vec<Candidate> {
    let (w, h) = (src.width, src.height);
    let resp = corner_response(src);

    let max = resp.iter().copied().fold(0.0f32, f32::max);
    if max <= 0.0 {
        return Vec::new();
    }
    let threshold = params.threshold_rel * max;
    let radius = params.nms_radius as i32;

    let mut picked: Vec<(usize, f32)> = Vec::new();
    for y in 0..h {
        'pixels: for x in 0..w {
            let idx = y * w + x;
            let value = resp[idx];
            if value < threshold {
                continue;
            }
            for dy in -radius..=radius {
                for dx in -radius..=radius {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = x as i32 + dx;
                    let ny = y as i32 + dy;
                    if nx < 0 || ny < 0 || nx >= w as i32 || ny >= h as i32 {
                        continue;
                    }
                    let nidx = ny as usize * w + nx as usize;
                    // ties break toward the earlier pixel in scan order
                    if resp[nidx] > value || (resp[nidx] == value && nidx < idx) {
                        continue 'pixels;
                    }
                }
            }
            picked.push((idx, value));
        }
    }

    picked.sort_unstable_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    picked.truncate(params.max_candidates);

    picked
        .into_iter()
        .map(|(idx, response)| Candidate {
            x: (idx % w) as f64,
            y: (idx / w) as f64,
            response,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker_patch(w: usize, h: usize, cx: usize, cy: usize) -> Vec<u8> {
        // four quadrants around (cx, cy) with alternating intensity
        let mut data = vec![0u8; w * h];
        for y in 0..h {
            for x in 0..w {
                let qx = x >= cx;
                let qy = y >= cy;
                data[y * w + x] = if qx ^ qy { 230 } else { 25 };
            }
        }
        data
    }

    #[test]
    fn junction_wins_the_response_map() {
        let (w, h) = (32, 32);
        let data = checker_patch(w, h, 16, 16);
        let view = GrayView {
            width: w,
            height: h,
            data: &data,
        };

        let candidates = find_candidates(&view, &ResponseParams::default());
        assert!(!candidates.is_empty());
        let best = candidates[0];
        assert!(
            (best.x - 15.5).abs() <= 1.5 && (best.y - 15.5).abs() <= 1.5,
            "strongest candidate at ({}, {}), expected near (15.5, 15.5)",
            best.x,
            best.y
        );
    }

    #[test]
    fn flat_image_yields_no_candidates() {
        let (w, h) = (32, 32);
        let data = vec![128u8; w * h];
        let view = GrayView {
            width: w,
            height: h,
            data: &data,
        };
        assert!(find_candidates(&view, &ResponseParams::default()).is_empty());
    }
}
