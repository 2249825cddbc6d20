//! RGB ↔ CIE L*u*v* conversion (D65 white point).
//!
//! RGB samples are treated as linear intensities in `0..=255`, matching the
//! classic mean-shift segmentation papers. `L` spans `0..=100`.

use image::Rgb;
use palette::white_point::D65;
use palette::{FromColor, IntoColor, LinSrgb, Luv};

/// Three range channels of a feature vector (`L, u, v` for color images).
pub type RangeVector = [f32; 3];

/// Below this lightness chroma is undefined and the color is black.
const MIN_LIGHTNESS: f32 = 0.1;

pub fn rgb_to_luv(pixel: Rgb<u8>) -> RangeVector {
    let linear: LinSrgb<f32> = LinSrgb::<u8>::new(pixel[0], pixel[1], pixel[2]).into_format();
    let luv: Luv = Luv::from_color(linear);
    if luv.l < MIN_LIGHTNESS {
        return [luv.l.max(0.0), 0.0, 0.0];
    }
    [luv.l, luv.u, luv.v]
}

pub fn luv_to_rgb(luv: RangeVector) -> Rgb<u8> {
    if luv[0] < MIN_LIGHTNESS {
        return Rgb([0, 0, 0]);
    }
    let linear: LinSrgb<f32> = Luv::<D65, f32>::new(luv[0], luv[1], luv[2]).into_color();
    Rgb([linear.red, linear.green, linear.blue]
        .map(|channel| (channel * 255.0).round().clamp(0.0, 255.0) as u8))
}
