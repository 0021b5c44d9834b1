use image::RgbaImage;
use serde::{Deserialize, Serialize};

use super::config::TrackingConfig;

/// Mean perceived brightness of the left, center and right eye bands of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BrightnessSample {
    pub left: f64,
    pub center: f64,
    pub right: f64,
}

impl BrightnessSample {
    pub fn total(&self) -> f64 {
        self.left + self.center + self.right
    }
}

/// Horizontal band as fractions of the frame width.
#[derive(Debug, Clone, Copy)]
struct Band {
    x_start: f64,
    x_end: f64,
}

const LEFT_BAND: Band = Band { x_start: 0.0, x_end: 0.3 };
const CENTER_BAND: Band = Band { x_start: 0.35, x_end: 0.65 };
const RIGHT_BAND: Band = Band { x_start: 0.7, x_end: 1.0 };
const BAND_Y_START: f64 = 0.3;
const BAND_Y_END: f64 = 0.5;

/// Throttles frame callbacks and turns every Nth frame into a [`BrightnessSample`].
#[derive(Debug, Clone)]
pub struct FrameSampler {
    frame_stride: u32,
    pixel_stride: usize,
    callbacks: u64,
}

impl FrameSampler {
    pub fn new(config: &TrackingConfig) -> Self {
        Self {
            frame_stride: config.frame_stride.max(1),
            pixel_stride: config.pixel_stride.max(1),
            callbacks: 0,
        }
    }

    /// Count one frame callback; returns true when this callback should be sampled.
    pub fn should_sample(&mut self) -> bool {
        self.callbacks = self.callbacks.wrapping_add(1);
        self.callbacks % u64::from(self.frame_stride) == 0
    }

    /// Offer the frame available at this callback. Missing frames and
    /// throttled callbacks produce nothing.
    pub fn offer(&mut self, frame: Option<&RgbaImage>) -> Option<BrightnessSample> {
        if !self.should_sample() {
            return None;
        }
        frame.map(|frame| sample_frame(frame, self.pixel_stride))
    }
}

/// Brightness of the three fixed bands of `frame`.
pub fn sample_frame(frame: &RgbaImage, pixel_stride: usize) -> BrightnessSample {
    BrightnessSample {
        left: band_brightness(frame, LEFT_BAND, pixel_stride),
        center: band_brightness(frame, CENTER_BAND, pixel_stride),
        right: band_brightness(frame, RIGHT_BAND, pixel_stride),
    }
}

fn band_brightness(frame: &RgbaImage, band: Band, pixel_stride: usize) -> f64 {
    let (width, height) = frame.dimensions();
    let x0 = scale(width, band.x_start);
    let x1 = scale(width, band.x_end);
    let y0 = scale(height, BAND_Y_START);
    let y1 = scale(height, BAND_Y_END);

    let mut sum = 0.0;
    let mut count = 0u64;
    let mut index = 0usize;

    for y in y0..y1 {
        for x in x0..x1 {
            if index % pixel_stride == 0 {
                let [r, g, b, _] = frame.get_pixel(x, y).0;
                sum += luma(r, g, b);
                count += 1;
            }
            index += 1;
        }
    }

    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn scale(extent: u32, fraction: f64) -> u32 {
    ((f64::from(extent) * fraction).floor() as u32).min(extent)
}

/// ITU-R BT.601 perceived brightness.
pub fn luma(r: u8, g: u8, b: u8) -> f64 {
    0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn banded_frame(width: u32, height: u32, left: u8, center: u8, right: u8) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, _| {
            let fx = f64::from(x) / f64::from(width);
            let v = if fx < 0.33 {
                left
            } else if fx < 0.67 {
                center
            } else {
                right
            };
            Rgba([v, v, v, 255])
        })
    }

    #[test]
    fn grey_bands_report_their_level() {
        let frame = banded_frame(100, 60, 120, 90, 80);
        let sample = sample_frame(&frame, 4);
        assert!((sample.left - 120.0).abs() < 1e-9);
        assert!((sample.center - 90.0).abs() < 1e-9);
        assert!((sample.right - 80.0).abs() < 1e-9);
        assert!((sample.total() - 290.0).abs() < 1e-9);
    }

    #[test]
    fn luma_weights_green_most() {
        assert!((luma(255, 255, 255) - 255.0).abs() < 1e-9);
        assert!(luma(0, 255, 0) > luma(255, 0, 0));
        assert!(luma(255, 0, 0) > luma(0, 0, 255));
    }

    #[test]
    fn rows_outside_the_eye_band_are_ignored() {
        // Bright everywhere except rows 30%..50%, which are black.
        let frame = RgbaImage::from_fn(40, 100, |_, y| {
            if (30..50).contains(&y) {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        let sample = sample_frame(&frame, 1);
        assert_eq!(sample, BrightnessSample::default());
    }

    #[test]
    fn degenerate_frame_samples_as_zero() {
        let frame = RgbaImage::new(1, 1);
        assert_eq!(sample_frame(&frame, 4), BrightnessSample::default());
    }

    #[test]
    fn only_every_third_callback_is_sampled() {
        let config = TrackingConfig::default();
        let mut sampler = FrameSampler::new(&config);
        let frame = banded_frame(30, 30, 10, 10, 10);

        let produced: Vec<bool> = (0..9)
            .map(|_| sampler.offer(Some(&frame)).is_some())
            .collect();
        assert_eq!(
            produced,
            vec![false, false, true, false, false, true, false, false, true]
        );
    }

    #[test]
    fn missing_frame_skips_the_tick() {
        let config = TrackingConfig {
            frame_stride: 1,
            ..TrackingConfig::default()
        };
        let mut sampler = FrameSampler::new(&config);
        assert!(sampler.offer(None).is_none());
    }
}
