// Face texture: skin-tone canvas with the photo composited through the
// face contour.

use glam::Vec2;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use log::debug;
use thiserror::Error;
use crate::config::TextureConfig;
use crate::engine::components::Color;
use super::landmarks::{LandmarkError, Landmarks};
use super::skin_tone::landmark_pixel;

#[derive(Error, Debug)]
pub enum BakeError {
    #[error("face contour needs at least 3 landmarks, has {0}")]
    ContourTooSmall(usize),
    #[error("texture canvas must be non-empty, got {width}x{height}")]
    EmptyCanvas { width: u32, height: u32 },
    #[error(transparent)]
    Landmark(#[from] LandmarkError),
    #[error("failed to encode texture: {0}")]
    Encode(#[from] image::ImageError),
}

/// Contour polygon in canvas pixels, each vertex pulled `inset` of the way
/// toward the mean of the vertices.
pub fn contour_polygon(
    landmarks: &Landmarks,
    contour: &[usize],
    width: u32,
    height: u32,
    inset: f32,
) -> Result<Vec<Vec2>, BakeError> {
    if contour.len() < 3 {
        return Err(BakeError::ContourTooSmall(contour.len()));
    }
    let points = contour
        .iter()
        .map(|&i| {
            let (x, y) = landmark_pixel(landmarks.point(i)?, width, height);
            Ok(Vec2::new(x, y))
        })
        .collect::<Result<Vec<_>, BakeError>>()?;
    let centroid = points.iter().copied().sum::<Vec2>() / points.len() as f32;
    Ok(points.into_iter().map(|p| p + (centroid - p) * inset).collect())
}

/// Bake the face texture at the configured canvas size.
///
/// The canvas starts filled with `fill`; photo pixels whose centers fall
/// inside the inset contour are composited over it. The photo is stretched
/// to the canvas, so the output size never depends on the photo's aspect.
pub fn bake_face_texture(
    photo: &RgbaImage,
    landmarks: &Landmarks,
    contour: &[usize],
    fill: Color,
    config: &TextureConfig,
) -> Result<RgbaImage, BakeError> {
    let (w, h) = (config.width, config.height);
    if w == 0 || h == 0 {
        return Err(BakeError::EmptyCanvas { width: w, height: h });
    }
    let polygon = contour_polygon(landmarks, contour, w, h, config.inset)?;
    let mut canvas = RgbaImage::from_pixel(w, h, Rgba(fill.to_rgba8()));

    if photo.width() == 0 || photo.height() == 0 {
        debug!("texture bake: empty photo, fill only");
        return Ok(canvas);
    }
    let scaled = if photo.dimensions() == (w, h) {
        photo.clone()
    } else {
        imageops::resize(photo, w, h, FilterType::Triangle)
    };

    let (lo, hi) = polygon
        .iter()
        .fold((polygon[0], polygon[0]), |(lo, hi), p| (lo.min(*p), hi.max(*p)));
    let x0 = lo.x.floor().max(0.0) as u32;
    let y0 = lo.y.floor().max(0.0) as u32;
    let x1 = (hi.x.ceil().max(0.0) as u32).min(w);
    let y1 = (hi.y.ceil().max(0.0) as u32).min(h);

    let mut covered = 0usize;
    for y in y0..y1 {
        for x in x0..x1 {
            let center = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            if winding_number(center, &polygon) == 0 {
                continue;
            }
            let src = scaled.get_pixel(x, y).0;
            let dst = canvas.get_pixel_mut(x, y);
            dst.0 = blend_over(src, dst.0);
            covered += 1;
        }
    }
    debug!("texture bake: {}x{}, {} pixels inside contour", w, h, covered);
    Ok(canvas)
}

/// Encode for export. Alpha is dropped.
pub fn encode_jpeg(texture: &RgbaImage, quality: u8) -> Result<Vec<u8>, BakeError> {
    let rgb = image::DynamicImage::ImageRgba8(texture.clone()).to_rgb8();
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100)).encode_image(&rgb)?;
    Ok(bytes)
}

fn blend_over(src: [u8; 4], dst: [u8; 4]) -> [u8; 4] {
    let a = src[3] as f32 / 255.0;
    let mix = |s: u8, d: u8| (s as f32 * a + d as f32 * (1.0 - a)).round() as u8;
    [mix(src[0], dst[0]), mix(src[1], dst[1]), mix(src[2], dst[2]), 255]
}

/// Nonzero winding number of `p` with respect to a closed polygon.
fn winding_number(p: Vec2, poly: &[Vec2]) -> i32 {
    let mut wn = 0;
    let mut j = poly.len() - 1;
    for i in 0..poly.len() {
        let (a, b) = (poly[j], poly[i]);
        let left = (b.x - a.x) * (p.y - a.y) - (p.x - a.x) * (b.y - a.y);
        if a.y <= p.y {
            if b.y > p.y && left > 0.0 {
                wn += 1;
            }
        } else if b.y <= p.y && left < 0.0 {
            wn -= 1;
        }
        j = i;
    }
    wn
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::head::fixtures;
    use glam::Vec3;

    const SKIN: Color = Color::new(0.8, 0.6, 0.5);

    fn small_canvas() -> TextureConfig {
        TextureConfig { width: 64, height: 64, inset: 0.02, jpeg_quality: 80 }
    }

    #[test]
    fn canvas_size_ignores_photo_aspect() {
        let (lm, topo) = fixtures::disc_face(16);
        for (pw, ph) in [(10, 200), (300, 20), (64, 64)] {
            let photo = RgbaImage::from_pixel(pw, ph, Rgba([0, 0, 255, 255]));
            let tex = bake_face_texture(&photo, &lm, &topo.face_contour, SKIN, &small_canvas()).unwrap();
            assert_eq!(tex.dimensions(), (64, 64));
        }
    }

    #[test]
    fn fill_survives_outside_contour() {
        let (lm, topo) = fixtures::disc_face(16);
        let photo = RgbaImage::from_pixel(64, 64, Rgba([0, 0, 255, 255]));
        let tex = bake_face_texture(&photo, &lm, &topo.face_contour, SKIN, &small_canvas()).unwrap();
        // Disc radius 0.3 of the canvas around the middle: corners are outside,
        // the middle is inside.
        assert_eq!(tex.get_pixel(0, 0).0, SKIN.to_rgba8());
        assert_eq!(tex.get_pixel(63, 63).0, SKIN.to_rgba8());
        assert_eq!(tex.get_pixel(32, 32).0, [0, 0, 255, 255]);
    }

    #[test]
    fn translucent_photo_blends_with_fill() {
        let (lm, topo) = fixtures::disc_face(16);
        let photo = RgbaImage::from_pixel(64, 64, Rgba([0, 0, 0, 0]));
        let tex = bake_face_texture(&photo, &lm, &topo.face_contour, SKIN, &small_canvas()).unwrap();
        assert_eq!(tex.get_pixel(32, 32).0, SKIN.to_rgba8());
    }

    #[test]
    fn empty_photo_gives_fill_only() {
        let (lm, topo) = fixtures::disc_face(16);
        let tex = bake_face_texture(&RgbaImage::new(0, 0), &lm, &topo.face_contour, SKIN, &small_canvas()).unwrap();
        assert!(tex.pixels().all(|p| p.0 == SKIN.to_rgba8()));
    }

    #[test]
    fn inset_pulls_vertices_toward_centroid() {
        let lm = Landmarks::new(vec![
            Vec3::new(0.25, 0.25, 0.0),
            Vec3::new(-0.25, 0.25, 0.0),
            Vec3::new(-0.25, -0.25, 0.0),
            Vec3::new(0.25, -0.25, 0.0),
        ]);
        let raw = contour_polygon(&lm, &[0, 1, 2, 3], 100, 100, 0.0).unwrap();
        assert_eq!(raw[0], Vec2::new(25.0, 25.0));
        let inset = contour_polygon(&lm, &[0, 1, 2, 3], 100, 100, 0.1).unwrap();
        assert!((inset[0] - Vec2::new(27.5, 27.5)).length() < 1e-4);
    }

    #[test]
    fn winding_handles_both_orientations() {
        let ccw = [Vec2::ZERO, Vec2::new(4.0, 0.0), Vec2::new(4.0, 4.0), Vec2::new(0.0, 4.0)];
        let mut cw = ccw;
        cw.reverse();
        assert_ne!(winding_number(Vec2::new(2.0, 2.0), &ccw), 0);
        assert_ne!(winding_number(Vec2::new(2.0, 2.0), &cw), 0);
        assert_eq!(winding_number(Vec2::new(5.0, 2.0), &ccw), 0);
    }

    #[test]
    fn short_contour_is_rejected() {
        let (lm, _) = fixtures::disc_face(8);
        let err = bake_face_texture(&RgbaImage::new(4, 4), &lm, &[1, 2], SKIN, &small_canvas()).unwrap_err();
        assert!(matches!(err, BakeError::ContourTooSmall(2)));
    }

    #[test]
    fn jpeg_export_has_soi_marker() {
        let tex = RgbaImage::from_pixel(16, 16, Rgba([200, 150, 120, 255]));
        let bytes = encode_jpeg(&tex, 85).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }
}
