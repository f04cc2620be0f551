//! Vertical placement cues.
//!
//! There is no real elevation in a stereo feed, so [`HeightStage`] fakes it
//! spectrally: sources above the room's vertical center get a high shelf
//! boost and a slightly narrower image, sources below get a low shelf boost
//! and a wider one, with everything scaled by how tall the room is. The tilt
//! moves at block rate through a slow smoother so sweeping a source up and
//! down never zippers.

use lontano_core::{
    Biquad, LinearSmoothedParam, clamp, high_shelf_coefficients, low_shelf_coefficients,
};

/// Shelf corner for the vertical tilt, Hz.
const TILT_FREQUENCY: f32 = 800.0;

/// Tilt changes below this many dB keep the current shelf coefficients.
const TILT_RECOMPUTE_DB: f32 = 0.5;

/// Spectral tilt and image-width stage driven by source height.
#[derive(Debug, Clone)]
pub struct HeightStage {
    tilt_gain: LinearSmoothedParam,
    width: LinearSmoothedParam,
    tilt_filter_left: Biquad,
    tilt_filter_right: Biquad,
    last_tilt_db: f32,
    sample_rate: f32,
}

impl HeightStage {
    /// Create a stage at `sample_rate`, settled on a vertically centered
    /// source (no tilt, unity width).
    pub fn new(sample_rate: f32) -> Self {
        Self {
            tilt_gain: LinearSmoothedParam::with_config(0.0, sample_rate, 50.0),
            width: LinearSmoothedParam::with_config(1.0, sample_rate, 30.0),
            tilt_filter_left: Biquad::new(),
            tilt_filter_right: Biquad::new(),
            last_tilt_db: 0.0,
            sample_rate,
        }
    }

    /// Process a block in place.
    ///
    /// `height_percent` is the source height as a fraction of the room
    /// (0 = floor, 1 = ceiling); `room_height` is in meters.
    pub fn process_block(
        &mut self,
        left: &mut [f32],
        right: &mut [f32],
        height_percent: f32,
        room_height: f32,
    ) {
        let height_factor = clamp(height_percent, 0.0, 1.0);
        let room_height = room_height.max(2.0);
        let actual_height = height_factor * room_height;
        let center = room_height * 0.5;
        let deviation = clamp((actual_height - center) / center, -1.0, 1.0);
        let room_height_factor = clamp(room_height / 3.0, 1.0, 2.0);

        // Saturating tilt: extremes land near the cap instead of past it,
        // taller rooms tilt harder.
        let tilt_target = clamp(
            (deviation * 1.2).tanh() * 8.0 * room_height_factor,
            -10.0,
            10.0,
        );
        self.tilt_gain.set_target(tilt_target);
        let tilt_db = self.tilt_gain.advance();

        if (tilt_db - self.last_tilt_db).abs() > TILT_RECOMPUTE_DB {
            let (b0, b1, b2, a0, a1, a2) = if tilt_db > 0.0 {
                high_shelf_coefficients(TILT_FREQUENCY, 0.707, tilt_db, self.sample_rate)
            } else {
                low_shelf_coefficients(TILT_FREQUENCY, 0.707, -tilt_db, self.sample_rate)
            };
            self.tilt_filter_left.set_coefficients(b0, b1, b2, a0, a1, a2);
            self.tilt_filter_right.set_coefficients(b0, b1, b2, a0, a1, a2);
            self.last_tilt_db = tilt_db;
        }

        self.width
            .set_target(clamp((1.0 - deviation * 0.4) * room_height_factor, 0.7, 1.3));

        let phase_amount = deviation * 0.15;
        let phase_radians = phase_amount * core::f32::consts::PI;
        let elevation_gain = 1.0 + deviation * 0.05;
        let apply_tilt = tilt_db.abs() > 0.1;

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            if apply_tilt {
                *l = self.tilt_filter_left.process(*l);
                *r = self.tilt_filter_right.process(*r);
            }

            let mid = (*l + *r) * 0.5;
            let mut side = (*l - *r) * 0.5 * self.width.advance();
            if phase_amount.abs() > 0.03 {
                side = side * 0.8 + side * phase_radians.cos() * 0.2;
            }

            *l = clamp((mid + side) * elevation_gain, -2.0, 2.0);
            *r = clamp((mid - side) * elevation_gain, -2.0, 2.0);
        }
    }

    /// Clear filter state; smoothers hold their current values.
    pub fn reset(&mut self) {
        self.tilt_filter_left.clear();
        self.tilt_filter_right.clear();
        self.tilt_gain.set_immediate(self.tilt_gain.get());
        self.width.set_immediate(self.width.get());
    }
}
