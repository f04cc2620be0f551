//! Early reflections for a shoebox room, via the image-source method.
//!
//! The first 6 taps are first-order images (four walls, floor, ceiling),
//! the next 8 are second-order corner and edge images, and the remainder
//! is a deterministic diffuse cloud seeded from the source position. All
//! taps read from one shared mono delay line.
//!
//! Coordinates: the listener sits at the origin at ear height, x spans
//! the room width (`-w/2..w/2`), y is up (`0..h`), z spans the length
//! (`-l/2..l/2`).

use libm::{atan2f, sqrtf};
use lontano_core::{InterpolatedDelay, StereoEffect, mono_sum};

const MAX_REFLECTIONS: usize = 24;
const SPEED_OF_SOUND: f32 = 343.0;
const EAR_HEIGHT: f32 = 1.7;

const WALL_ABSORPTION: f32 = 0.15;
const FLOOR_ABSORPTION: f32 = 0.25;
const CEILING_ABSORPTION: f32 = 0.35;

/// Room dimensions and source position fed to the image-source solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoomGeometry {
    pub width: f32,
    pub length: f32,
    pub height: f32,
    pub source_x: f32,
    pub source_y: f32,
    pub source_z: f32,
}

impl Default for RoomGeometry {
    /// A 6 x 8 x 3 m room with the source 2 m ahead at ear height.
    fn default() -> Self {
        Self {
            width: 6.0,
            length: 8.0,
            height: 3.0,
            source_x: 0.0,
            source_y: EAR_HEIGHT,
            source_z: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Tap {
    delay_samples: f32,
    gain: f32,
    /// -1 = hard left, +1 = hard right
    pan: f32,
}

/// Multi-tap early reflection generator.
///
/// Input is summed to mono before entering the shared line; each tap is
/// panned by side selection with a crossfeed bleed into the far channel.
#[derive(Debug, Clone)]
pub struct EarlyReflections {
    line: InterpolatedDelay,
    taps: [Tap; MAX_REFLECTIONS],
    geometry: RoomGeometry,
    level: f32,
    crossfeed: f32,
    sample_rate: f32,
}

impl EarlyReflections {
    /// Create the generator at the given sample rate with the default
    /// room loaded.
    pub fn new(sample_rate: f32) -> Self {
        let mut early = Self {
            line: InterpolatedDelay::from_time(sample_rate, 1.0),
            taps: [Tap::default(); MAX_REFLECTIONS],
            geometry: RoomGeometry::default(),
            level: 0.3,
            crossfeed: 0.0,
            sample_rate,
        };
        early.configure_geometry(early.geometry);
        early
    }

    /// Set output level, clamped to 0-1.
    pub fn set_level(&mut self, level: f32) {
        self.level = level.clamp(0.0, 1.0);
    }

    /// Get the current output level.
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Set how much each tap bleeds into the opposite channel, clamped
    /// to 0-1. At 1 the output collapses to dual mono.
    pub fn set_crossfeed(&mut self, crossfeed: f32) {
        self.crossfeed = crossfeed.clamp(0.0, 1.0);
    }

    /// Get the current crossfeed.
    pub fn crossfeed(&self) -> f32 {
        self.crossfeed
    }

    /// Rebuild the tap set for a room and source position.
    ///
    /// Images closer than 0.1 m to the listener are dropped; whatever
    /// slots remain after the deterministic images are filled with a
    /// diffuse cloud seeded from the source position, so the tap count
    /// is always [`MAX_REFLECTIONS`].
    pub fn configure_geometry(&mut self, geometry: RoomGeometry) {
        self.geometry = geometry;
        let RoomGeometry {
            width: w,
            length: l,
            height: h,
            source_x: sx,
            source_y: sy,
            source_z: sz,
        } = geometry;

        let mut count = 0usize;
        let mut add = |image: (f32, f32, f32), absorption: f32, second_order: bool| {
            if count >= MAX_REFLECTIONS {
                return;
            }
            let dx = image.0;
            let dy = image.1 - EAR_HEIGHT;
            let dz = image.2;
            let dist = sqrtf(dx * dx + dy * dy + dz * dz);
            if dist < 0.1 {
                return;
            }

            let mut gain = (1.0 - absorption) / (1.0 + dist * dist * 0.1);
            if second_order {
                gain *= 0.3;
            }
            // Crude HF loss proxy folded into the broadband gain
            let hf_loss = (1.0 - (absorption * 0.5 + dist * 0.02)).clamp(0.3, 1.0);

            let azimuth_deg = atan2f(dx, dz) * 180.0 / core::f32::consts::PI;
            self.taps[count] = Tap {
                delay_samples: dist / SPEED_OF_SOUND * self.sample_rate,
                gain: gain * hf_loss,
                pan: (azimuth_deg / 90.0).clamp(-1.0, 1.0),
            };
            count += 1;
        };

        // First order: walls, floor, ceiling
        add((-w - sx, sy, sz), WALL_ABSORPTION, false);
        add((w - sx, sy, sz), WALL_ABSORPTION, false);
        add((sx, sy, -l - sz), WALL_ABSORPTION, false);
        add((sx, sy, l - sz), WALL_ABSORPTION, false);
        add((sx, -sy, sz), FLOOR_ABSORPTION, false);
        add((sx, 2.0 * h - sy, sz), CEILING_ABSORPTION, false);

        // Second order: the four wall-wall corners
        add((-w - sx, sy, -l - sz), WALL_ABSORPTION * 1.5, true);
        add((w - sx, sy, -l - sz), WALL_ABSORPTION * 1.5, true);
        add((-w - sx, sy, l - sz), WALL_ABSORPTION * 1.5, true);
        add((w - sx, sy, l - sz), WALL_ABSORPTION * 1.5, true);

        // Floor-wall edges
        add((-w - sx, -sy, sz), (WALL_ABSORPTION + FLOOR_ABSORPTION) * 0.5, true);
        add((w - sx, -sy, sz), (WALL_ABSORPTION + FLOOR_ABSORPTION) * 0.5, true);

        // Ceiling-wall edges
        add(
            (-w - sx, 2.0 * h - sy, sz),
            (WALL_ABSORPTION + CEILING_ABSORPTION) * 0.5,
            true,
        );
        add(
            (w - sx, 2.0 * h - sy, sz),
            (WALL_ABSORPTION + CEILING_ABSORPTION) * 0.5,
            true,
        );

        // Diffuse fill, deterministic per source position
        let mut rng_state = (sx + sy + sz).to_bits();
        let mut next_random = move || {
            rng_state = rng_state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            f32::from((rng_state >> 16) as u16) / 65_536.0
        };
        while count < MAX_REFLECTIONS {
            let delay_sec = 0.020 + 0.080 * next_random();
            self.taps[count] = Tap {
                delay_samples: delay_sec * self.sample_rate,
                gain: 0.02 * (1.0 - next_random() * 0.7),
                pan: (next_random() - 0.5) * 2.0,
            };
            count += 1;
        }
    }

    /// The geometry the current tap set was built from.
    pub fn geometry(&self) -> RoomGeometry {
        self.geometry
    }
}

impl StereoEffect for EarlyReflections {
    fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        self.line.write(mono_sum(left, right));

        let mut acc_l = 0.0;
        let mut acc_r = 0.0;
        for tap in &self.taps {
            let reflection = self.line.read(tap.delay_samples);
            let gain = tap.gain * self.level;
            let g_l = gain * if tap.pan <= 0.0 { 1.0 } else { self.crossfeed };
            let g_r = gain * if tap.pan >= 0.0 { 1.0 } else { self.crossfeed };
            acc_l += reflection * g_l;
            acc_r += reflection * g_r;
        }
        (acc_l, acc_r)
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.line = InterpolatedDelay::from_time(sample_rate, 1.0);
        // Tap delays are in samples, so rebuild them at the new rate
        self.configure_geometry(self.geometry);
    }

    fn reset(&mut self) {
        self.line.clear();
    }
}
