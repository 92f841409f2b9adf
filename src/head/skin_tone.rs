// Skin tone: average photo color around a few cheek/forehead landmarks.

use image::RgbaImage;
use log::debug;
use crate::engine::components::Color;
use super::landmarks::Landmarks;

/// Pixel position of a landmark in a `width x height` image.
pub fn landmark_pixel(p: glam::Vec3, width: u32, height: u32) -> (f32, f32) {
    ((0.5 - p.x) * width as f32, (0.5 - p.y) * height as f32)
}

/// Mean color of `patch x patch` crops centered on each sample landmark.
///
/// Samples whose landmark is missing or whose crop leaves the image are
/// skipped. Returns `fallback` when nothing could be sampled.
pub fn estimate_skin_tone(
    photo: &RgbaImage,
    landmarks: &Landmarks,
    samples: &[usize],
    patch: u32,
    fallback: Color,
) -> Color {
    let (w, h) = photo.dimensions();
    let patch = patch.max(1);
    let half = (patch / 2) as i64;

    let mut sum = [0.0f64; 3];
    let mut taken = 0usize;
    if w > 0 && h > 0 {
        for &index in samples {
            let Some(p) = landmarks.get(index) else { continue };
            let (px, py) = landmark_pixel(p, w, h);
            if !(px.is_finite() && py.is_finite()) {
                continue;
            }
            let x0 = px.round() as i64 - half;
            let y0 = py.round() as i64 - half;
            if x0 < 0 || y0 < 0 || x0 + patch as i64 > w as i64 || y0 + patch as i64 > h as i64 {
                continue;
            }

            let mut patch_sum = [0u64; 3];
            for y in y0 as u32..y0 as u32 + patch {
                for x in x0 as u32..x0 as u32 + patch {
                    let px = photo.get_pixel(x, y).0;
                    for c in 0..3 {
                        patch_sum[c] += px[c] as u64;
                    }
                }
            }
            let area = (patch * patch) as f64 * 255.0;
            for c in 0..3 {
                sum[c] += patch_sum[c] as f64 / area;
            }
            taken += 1;
        }
    }

    debug!("skin tone: {}/{} samples", taken, samples.len());
    if taken == 0 {
        return fallback;
    }
    let n = taken as f64;
    Color::new((sum[0] / n) as f32, (sum[1] / n) as f32, (sum[2] / n) as f32)
}
