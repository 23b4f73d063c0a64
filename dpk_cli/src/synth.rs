//! Synthetic depth scenes for `dpk bench`.
//!
//! A room seen by a depth camera: back wall, floor, a person-sized blob that
//! walks across the view, invalid pixels along the left edge and at random,
//! and a small amount of range-dependent sensor noise.

/// Generate frame `t` of a scene. The same `(width, height, t, seed)` always
/// produces the same samples.
pub fn scene(width: u32, height: u32, t: u32, seed: u64) -> Vec<u16> {
    let mut rng = seed ^ (t as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let cx = ((width / 5 + t * 4) % width.max(1)) as i64;
    let cy = (height / 2) as i64;
    let radius = (height / 4).max(1) as i64;
    let floor_row = height * 2 / 3;

    let mut out = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            rng = rng
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            if x < width / 40 || (rng >> 33) % 211 == 0 {
                out.push(0);
                continue;
            }

            let (dx, dy) = (x as i64 - cx, y as i64 - cy);
            let depth = if dx * dx + dy * dy * 2 < radius * radius {
                1400 + (dx.abs() + dy.abs()) * 3
            } else if y > floor_row {
                // Floor gets closer towards the bottom of the image.
                1800 + (height - y) as i64 * 3000 / height as i64
            } else {
                5200 + x as i64 * 2 - y as i64
            };

            // Noise grows with range, as on time-of-flight sensors.
            let amplitude = 1 + depth / 1500;
            let noise = ((rng >> 58) as i64 % (2 * amplitude + 1)) - amplitude;
            out.push((depth + noise).clamp(1, u16::MAX as i64) as u16);
        }
    }
    out
}
