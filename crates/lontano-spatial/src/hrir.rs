//! Synthetic head-related impulse response database.
//!
//! Entries live on a 15 degree azimuth x 15 degree elevation grid and are
//! synthesized on demand from a rigid-sphere head model: the far ear gets a
//! Woodworth interaural delay and a level cut that grows with the lateral
//! angle, plus a short tap cluster standing in for diffraction lowpassing
//! around the head. Elevation folds into the lateral angle, so cues collapse
//! smoothly toward zero at the poles; there is no pinna model.
//!
//! [`HrirDatabase::query`] interpolates the four surrounding grid entries
//! bilinearly per tap, which is cheap and artifact-free as long as the
//! consumer reloads only on meaningful direction changes (the convolver
//! applies a 0.5 degree threshold).

use lontano_core::{clamp, lerp};

/// Grid resolution of the database in degrees, both axes.
pub const GRID_STEP_DEG: f32 = 15.0;

/// Impulse response length per ear in taps.
pub const HRIR_TAPS: usize = 128;

/// Average human head radius in meters.
const HEAD_RADIUS: f32 = 0.0875;

/// Propagation speed used for the interaural delay, m/s.
const SOUND_SPEED: f32 = 343.0;

/// Taps of onset margin so the leading ear stays causal under interpolation.
const ONSET_TAPS: usize = 8;

/// One left/right pair of short impulse responses.
#[derive(Debug, Clone)]
pub struct HrirPair {
    /// Left-ear impulse response.
    pub left: [f32; HRIR_TAPS],
    /// Right-ear impulse response.
    pub right: [f32; HRIR_TAPS],
}

impl HrirPair {
    /// An all-zero pair.
    pub fn silent() -> Self {
        Self {
            left: [0.0; HRIR_TAPS],
            right: [0.0; HRIR_TAPS],
        }
    }
}

/// Wrap an azimuth in degrees into `[-180, 180)`.
///
/// 0 = front, 90 = right, 180 = back, 270 = left, so both the signed and
/// the 0-360 convention are accepted.
pub fn wrap_azimuth(azimuth_deg: f32) -> f32 {
    let mut az = azimuth_deg % 360.0;
    if az >= 180.0 {
        az -= 360.0;
    }
    if az < -180.0 {
        az += 360.0;
    }
    az
}

/// Add an impulse of `gain` at a fractional `delay` (taps), splitting it
/// linearly across the two neighboring taps. Delays past the end of the
/// response are truncated onto the last tap.
fn place(ir: &mut [f32; HRIR_TAPS], delay: f32, gain: f32) {
    let index = delay as usize;
    let frac = delay - index as f32;
    if index + 1 < HRIR_TAPS {
        ir[index] += gain * (1.0 - frac);
        ir[index + 1] += gain * frac;
    } else if index < HRIR_TAPS {
        ir[index] += gain;
    }
}

/// Synthetic far-field HRIR set for one sample rate.
///
/// Stateless apart from the rate: entries are synthesized per call, which
/// keeps the database trivially small and exactly reproducible.
#[derive(Debug, Clone)]
pub struct HrirDatabase {
    sample_rate: f32,
}

impl HrirDatabase {
    /// Create a database producing responses at `sample_rate` Hz.
    pub fn new(sample_rate: f32) -> Self {
        Self { sample_rate }
    }

    /// The sample rate responses are synthesized for.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Change the synthesis sample rate.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
    }

    /// Synthesize the response pair for an exact direction.
    ///
    /// Azimuth in degrees (any convention, wrapped), elevation clamped to
    /// -90..90. Front and rear positions at the same lateral angle share a
    /// response, as they do on a featureless sphere.
    pub fn entry(&self, azimuth_deg: f32, elevation_deg: f32) -> HrirPair {
        let az_rad = wrap_azimuth(azimuth_deg).to_radians();
        let el_rad = clamp(elevation_deg, -90.0, 90.0).to_radians();

        // Signed lateral factor: +1 fully right, -1 fully left.
        let lateral = az_rad.sin() * el_rad.cos();
        let shadow = lateral.abs();

        // Woodworth delay for a rigid sphere, on the folded lateral angle.
        let theta = clamp(shadow, 0.0, 1.0).asin();
        let itd_seconds = HEAD_RADIUS / SOUND_SPEED * (theta + theta.sin());
        // Clamped so the far tap stays inside the response at extreme rates.
        let far_delay =
            (itd_seconds * self.sample_rate).min((HRIR_TAPS - ONSET_TAPS - 4) as f32);

        let near_gain = 0.8;
        let far_gain = 0.8 * (1.0 - 0.35 * shadow);

        // Far-ear onset smeared over three taps in place of a diffraction
        // lowpass; the cluster collapses to a single tap at the median plane
        // so the two ears stay identical there.
        let k0 = 1.0 - 0.4 * shadow;
        let k1 = 0.3 * shadow;
        let k2 = 0.1 * shadow;

        let mut near = [0.0f32; HRIR_TAPS];
        let mut far = [0.0f32; HRIR_TAPS];
        place(&mut near, ONSET_TAPS as f32, near_gain);
        let far_onset = ONSET_TAPS as f32 + far_delay;
        place(&mut far, far_onset, far_gain * k0);
        place(&mut far, far_onset + 1.0, far_gain * k1);
        place(&mut far, far_onset + 2.0, far_gain * k2);

        if lateral >= 0.0 {
            HrirPair {
                left: far,
                right: near,
            }
        } else {
            HrirPair {
                left: near,
                right: far,
            }
        }
    }

    /// Fetch the response pair for an arbitrary direction by bilinear
    /// interpolation over the four surrounding grid entries, per tap.
    pub fn query(&self, azimuth_deg: f32, elevation_deg: f32) -> HrirPair {
        let az = wrap_azimuth(azimuth_deg);
        let el = clamp(elevation_deg, -90.0, 90.0);

        let az_lo = (az / GRID_STEP_DEG).floor() * GRID_STEP_DEG;
        let el_lo = (el / GRID_STEP_DEG).floor() * GRID_STEP_DEG;
        let az_t = (az - az_lo) / GRID_STEP_DEG;
        let el_t = (el - el_lo) / GRID_STEP_DEG;

        let c00 = self.entry(az_lo, el_lo);
        let c10 = self.entry(az_lo + GRID_STEP_DEG, el_lo);
        let c01 = self.entry(az_lo, el_lo + GRID_STEP_DEG);
        let c11 = self.entry(az_lo + GRID_STEP_DEG, el_lo + GRID_STEP_DEG);

        let mut out = HrirPair::silent();
        for i in 0..HRIR_TAPS {
            let bottom = lerp(c00.left[i], c10.left[i], az_t);
            let top = lerp(c01.left[i], c11.left[i], az_t);
            out.left[i] = lerp(bottom, top, el_t);

            let bottom = lerp(c00.right[i], c10.right[i], az_t);
            let top = lerp(c01.right[i], c11.right[i], az_t);
            out.right[i] = lerp(bottom, top, el_t);
        }
        out
    }
}
