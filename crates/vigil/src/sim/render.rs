//! Deterministic rasterization of simulated elements.
//!
//! Pixels depend only on element state, never on wall time, so snapshots
//! taken at the same logical state are byte-identical.

use super::media::MediaState;
use image::{Rgba, RgbaImage};
use std::time::Duration;

/// Width of a rendered media element
pub const MEDIA_WIDTH: u32 = 64;
/// Height of a rendered media element
pub const MEDIA_HEIGHT: u32 = 36;

const PLACEHOLDER: Rgba<u8> = Rgba([32, 32, 32, 255]);
const PLAYHEAD: Rgba<u8> = Rgba([255, 255, 255, 255]);
const SUBTITLE: Rgba<u8> = Rgba([250, 220, 90, 255]);
const PROGRESS: Rgba<u8> = Rgba([255, 75, 75, 255]);

/// 64-bit FNV-1a
#[must_use]
pub fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(0x0100_0000_01b3)
    })
}

/// Opaque color derived from `seed`
#[must_use]
pub fn color_for(seed: &str) -> Rgba<u8> {
    let [r, g, b, ..] = fnv1a(seed.as_bytes()).to_le_bytes();
    // keep away from the placeholder and playhead colors
    Rgba([64 + r / 2, 64 + g / 2, 64 + b / 2, 255])
}

/// Render one media element.
///
/// Unloaded or undecodable media is a dark placeholder with a cross. A
/// loaded element shows its source color, a playhead column keyed on the
/// whole-second position, a progress strip and optionally a subtitle band.
#[must_use]
pub fn media(state: &MediaState, now: Duration) -> RgbaImage {
    let mut img = RgbaImage::from_pixel(MEDIA_WIDTH, MEDIA_HEIGHT, PLACEHOLDER);
    if state.ready_state(now) < 2 {
        for x in 0..MEDIA_WIDTH {
            let y = x * (MEDIA_HEIGHT - 1) / (MEDIA_WIDTH - 1);
            img.put_pixel(x, y, PLAYHEAD);
            img.put_pixel(x, MEDIA_HEIGHT - 1 - y, PLAYHEAD);
        }
        return img;
    }

    let spec = state.spec();
    let background = color_for(&spec.src);
    for pixel in img.pixels_mut() {
        *pixel = background;
    }

    let position = state.current_time(now);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let second = position.max(0.0).floor() as u32;
    let column = (second * 7) % (MEDIA_WIDTH - 4);
    for x in column..column + 4 {
        for y in 0..MEDIA_HEIGHT - 4 {
            img.put_pixel(x, y, PLAYHEAD);
        }
    }

    let fraction = if spec.duration > 0.0 {
        (position / spec.duration).clamp(0.0, 1.0)
    } else {
        0.0
    };
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let filled = (fraction * f64::from(MEDIA_WIDTH)).round() as u32;
    for x in 0..filled.min(MEDIA_WIDTH) {
        for y in MEDIA_HEIGHT - 2..MEDIA_HEIGHT {
            img.put_pixel(x, y, PROGRESS);
        }
    }

    if spec.subtitles {
        for x in 8..MEDIA_WIDTH - 8 {
            for y in MEDIA_HEIGHT - 9..MEDIA_HEIGHT - 5 {
                img.put_pixel(x, y, SUBTITLE);
            }
        }
    }
    img
}

/// Render a control or chart as a flat swatch
#[must_use]
pub fn swatch(seed: &str, width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_pixel(width, height, color_for(seed))
}

/// Stack element renders vertically on a white page
#[must_use]
pub fn page(parts: &[RgbaImage]) -> RgbaImage {
    let width = parts.iter().map(RgbaImage::width).max().unwrap_or(1).max(1);
    let height = parts.iter().map(RgbaImage::height).sum::<u32>().max(1);
    let mut img = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
    let mut top = 0;
    for part in parts {
        for (x, y, pixel) in part.enumerate_pixels() {
            img.put_pixel(x, top + y, *pixel);
        }
        top += part.height();
    }
    img
}
