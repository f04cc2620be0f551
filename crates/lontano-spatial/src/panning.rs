//! Room-aware stereo panning.
//!
//! [`RoomPanner`] turns an azimuth into interaural cues shaped by the room:
//! narrow rooms compress the usable pan range, wide rooms stretch it, and a
//! wall right next to the image narrows it. Rear positions get a head-shadow
//! shelf, a duller tone and a slow phase wobble on the side signal, which is
//! most of what distinguishes "behind" from "in front" in a stereo rendering.
//!
//! Per block the stage derives targets from the pan angle and the room, then
//! consumes them per sample through smoothers. The shadow cutoff moves at
//! block rate and its shelf is recomputed only after a 200 Hz move, so the
//! filter never churns coefficients while a source slowly orbits.
//!
//! Interaural time is applied as a micro-delay on the far ear only. A source
//! panned right leads in the right ear and the left-ear line holds a Woodworth
//! scale delay; hard left mirrors. The near ear never gets delayed.

use lontano_core::{Biquad, InterpolatedDelay, LinearSmoothedParam, clamp, high_shelf_coefficients, pan_gains};

/// Per-ear micro-delay capacity in seconds.
const EAR_DELAY_CAPACITY_SECONDS: f32 = 0.002;

/// Base interaural delay at full lateral pan, seconds, before room scaling.
const BASE_ITD_SECONDS: f32 = 0.0007;

/// Shelf recomputation threshold for the head-shadow cutoff, Hz.
const SHADOW_RECOMPUTE_HZ: f32 = 200.0;

/// Azimuth-to-stereo stage with room coupling.
#[derive(Debug, Clone)]
pub struct RoomPanner {
    shadow_cutoff: LinearSmoothedParam,
    front_back_width: LinearSmoothedParam,
    phase_shift: LinearSmoothedParam,
    brightness: LinearSmoothedParam,
    ild_gain_left: LinearSmoothedParam,
    ild_gain_right: LinearSmoothedParam,
    ear_delay_left: LinearSmoothedParam,
    ear_delay_right: LinearSmoothedParam,
    back_filter_left: Biquad,
    back_filter_right: Biquad,
    ear_line_left: InterpolatedDelay,
    ear_line_right: InterpolatedDelay,
    last_shadow_cutoff: f32,
    phase_accumulator: f32,
    sample_rate: f32,
}

impl RoomPanner {
    /// Create a panner at `sample_rate`, settled on a centered front image.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            shadow_cutoff: LinearSmoothedParam::with_config(12000.0, sample_rate, 40.0),
            front_back_width: LinearSmoothedParam::with_config(1.0, sample_rate, 35.0),
            phase_shift: LinearSmoothedParam::with_config(0.0, sample_rate, 30.0),
            brightness: LinearSmoothedParam::with_config(1.0, sample_rate, 25.0),
            ild_gain_left: LinearSmoothedParam::with_config(0.707, sample_rate, 20.0),
            ild_gain_right: LinearSmoothedParam::with_config(0.707, sample_rate, 20.0),
            ear_delay_left: LinearSmoothedParam::with_config(0.0, sample_rate, 15.0),
            ear_delay_right: LinearSmoothedParam::with_config(0.0, sample_rate, 15.0),
            back_filter_left: Biquad::new(),
            back_filter_right: Biquad::new(),
            ear_line_left: InterpolatedDelay::from_time(sample_rate, EAR_DELAY_CAPACITY_SECONDS),
            ear_line_right: InterpolatedDelay::from_time(sample_rate, EAR_DELAY_CAPACITY_SECONDS),
            last_shadow_cutoff: 12000.0,
            phase_accumulator: 0.0,
            sample_rate,
        }
    }

    /// Pan a block in place.
    ///
    /// `pan_degrees` follows the 0 = front, 90 = right convention;
    /// `room_width` and `room_length` are in meters.
    pub fn process_block(
        &mut self,
        left: &mut [f32],
        right: &mut [f32],
        pan_degrees: f32,
        room_width: f32,
        room_length: f32,
    ) {
        let azimuth = pan_degrees.to_radians();

        let max_lateral = room_width * 0.5;
        let lateral = azimuth.sin() * max_lateral;
        let closest_wall = (max_lateral + lateral).min(max_lateral - lateral);
        let room_scale = clamp(room_width / 6.0, 0.5, 2.5);
        let wall_proximity = if closest_wall < 1.0 {
            0.5 + closest_wall * 0.5
        } else {
            1.0
        };

        // Narrow rooms cannot support a full hard pan; wide rooms can
        // stretch a little past it.
        let pan_scale = if room_width <= 10.0 {
            0.7 + clamp((room_width - 2.0) / 8.0, 0.0, 1.0) * 0.3
        } else {
            1.0 + clamp((room_width - 10.0) / 10.0, 0.0, 1.0) * 0.3
        };
        let constrained_pan = clamp(pan_degrees * pan_scale, -180.0, 180.0);
        let room_azimuth = constrained_pan.to_radians();

        let front_back = room_azimuth.cos();
        let is_rear = front_back < 0.0;
        let front_back_amount = front_back.abs();

        if is_rear {
            let mut intensity = -front_back;
            if room_length > 8.0 {
                intensity *= 0.6;
            }
            if room_length < 4.0 {
                intensity *= 1.4;
            }
            intensity = clamp(intensity, 0.0, 1.0);

            let base_cutoff = 12000.0 - intensity * 4000.0;
            let room_aware = base_cutoff * (1.0 + (room_scale - 1.0) * 0.3);
            self.shadow_cutoff.set_target(clamp(room_aware, 4000.0, 15000.0));

            // Block-rate cutoff; the ramp only moves while the source is rear.
            let cutoff = self.shadow_cutoff.advance();
            if (cutoff - self.last_shadow_cutoff).abs() > SHADOW_RECOMPUTE_HZ {
                let (b0, b1, b2, a0, a1, a2) =
                    high_shelf_coefficients(cutoff, 0.707, -2.0 * intensity, self.sample_rate);
                self.back_filter_left.set_coefficients(b0, b1, b2, a0, a1, a2);
                self.back_filter_right.set_coefficients(b0, b1, b2, a0, a1, a2);
                self.last_shadow_cutoff = cutoff;
            }

            for (l, r) in left.iter_mut().zip(right.iter_mut()) {
                *l = self.back_filter_left.process(*l);
                *r = self.back_filter_right.process(*r);
            }
        }

        let width_target = if is_rear {
            (0.7 + (1.0 - front_back_amount) * 0.2) * room_scale * 0.8
        } else {
            (1.0 + front_back_amount * 0.4) * room_scale * 0.6
        } * wall_proximity;
        self.front_back_width.set_target(clamp(width_target, 0.3, 2.5));

        let phase_target = if is_rear {
            clamp(front_back_amount * 0.15 * (2.0 - room_scale * 0.5), 0.0, 0.3)
        } else {
            0.0
        };
        self.phase_shift.set_target(phase_target);

        let brightness_target = if is_rear {
            0.95 + (1.0 - front_back_amount) * 0.05 + (room_scale - 1.0) * 0.02
        } else {
            1.0 + front_back_amount * 0.05 + (room_scale - 1.0) * 0.03
        };
        self.brightness.set_target(clamp(brightness_target, 0.9, 1.15));

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let width = self.front_back_width.advance();
            let mid = (*l + *r) * 0.5;
            let mut side = (*l - *r) * 0.5 * width;

            // Rear sources get a slow amplitude wobble on the side signal,
            // a faint motion cue that never appears for frontal images.
            let shift = self.phase_shift.advance();
            if shift > 0.001 {
                self.phase_accumulator = (self.phase_accumulator + shift * 0.005) % 1.0;
                side *= 1.0 - self.phase_accumulator * 0.05;
                side = clamp(side, -2.0, 2.0);
            }

            let brightness = self.brightness.advance();
            *l = clamp((mid + side) * brightness, -2.0, 2.0);
            *r = clamp((mid - side) * brightness, -2.0, 2.0);
        }

        let pan_norm = clamp(room_azimuth.sin(), -1.0, 1.0);
        let (base_left, base_right) = pan_gains(pan_norm);

        // Bigger rooms push both the level and the time cues harder.
        let ild_intensity = 0.5 + room_scale * 0.5;
        let gain_left = clamp(0.5 + (base_left - 0.5) * ild_intensity, 0.1, 1.0);
        let gain_right = clamp(0.5 + (base_right - 0.5) * ild_intensity, 0.1, 1.0);

        let max_itd = BASE_ITD_SECONDS * (0.8 + room_scale * 0.4);
        let itd = max_itd * pan_norm;
        let delay_left = if itd > 0.0 { itd * self.sample_rate } else { 0.0 };
        let delay_right = if itd < 0.0 { -itd * self.sample_rate } else { 0.0 };

        self.ild_gain_left.set_target(gain_left);
        self.ild_gain_right.set_target(gain_right);
        self.ear_delay_left.set_target(delay_left);
        self.ear_delay_right.set_target(delay_right);

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let dl = self.ear_delay_left.advance();
            let dr = self.ear_delay_right.advance();
            let gl = self.ild_gain_left.advance();
            let gr = self.ild_gain_right.advance();

            self.ear_line_left.write(*l);
            *l = self.ear_line_left.read(dl) * gl;
            self.ear_line_right.write(*r);
            *r = self.ear_line_right.read(dr) * gr;
        }
    }

    /// Clear filter and delay state; smoothers hold their current values.
    pub fn reset(&mut self) {
        self.back_filter_left.clear();
        self.back_filter_right.clear();
        self.ear_line_left.clear();
        self.ear_line_right.clear();
        self.phase_accumulator = 0.0;
        self.collapse_ramps();
    }

    fn collapse_ramps(&mut self) {
        self.shadow_cutoff.set_immediate(self.shadow_cutoff.get());
        self.front_back_width.set_immediate(self.front_back_width.get());
        self.phase_shift.set_immediate(self.phase_shift.get());
        self.brightness.set_immediate(self.brightness.get());
        self.ild_gain_left.set_immediate(self.ild_gain_left.get());
        self.ild_gain_right.set_immediate(self.ild_gain_right.get());
        self.ear_delay_left.set_immediate(self.ear_delay_left.get());
        self.ear_delay_right.set_immediate(self.ear_delay_right.get());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f32 = 48000.0;

    fn stereo_rms(left: &[f32], right: &[f32]) -> f32 {
        let sum: f32 = left.iter().chain(right).map(|s| s * s).sum();
        (sum / (left.len() + right.len()) as f32).sqrt()
    }

    /// Run a mono sine through the panner and collect the full output.
    fn run(
        panner: &mut RoomPanner,
        pan: f32,
        width: f32,
        length: f32,
        freq: f32,
        blocks: usize,
        block_len: usize,
    ) -> (Vec<f32>, Vec<f32>) {
        let mut out_l = Vec::with_capacity(blocks * block_len);
        let mut out_r = Vec::with_capacity(blocks * block_len);
        let mut l = vec![0.0; block_len];
        let mut r = vec![0.0; block_len];
        let mut n = 0usize;
        for _ in 0..blocks {
            for i in 0..block_len {
                let s = (core::f32::consts::TAU * freq * (n + i) as f32 / SR).sin() * 0.5;
                l[i] = s;
                r[i] = s;
            }
            n += block_len;
            panner.process_block(&mut l, &mut r, pan, width, length);
            out_l.extend_from_slice(&l);
            out_r.extend_from_slice(&r);
        }
        (out_l, out_r)
    }

    fn tail(v: &[f32], n: usize) -> &[f32] {
        &v[v.len() - n..]
    }

    #[test]
    fn center_pan_stays_balanced() {
        let mut panner = RoomPanner::new(SR);
        let (l, r) = run(&mut panner, 0.0, 6.0, 8.0, 440.0, 20, 256);
        for (a, b) in l.iter().zip(&r) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn hard_right_starves_left_ear() {
        let mut panner = RoomPanner::new(SR);
        let (l, r) = run(&mut panner, 90.0, 6.0, 8.0, 440.0, 40, 256);
        let energy_l: f32 = tail(&l, 4096).iter().map(|s| s * s).sum();
        let energy_r: f32 = tail(&r, 4096).iter().map(|s| s * s).sum();
        assert!(energy_r > energy_l * 10.0, "L {energy_l} R {energy_r}");
    }

    #[test]
    fn far_ear_lags_by_the_interaural_delay() {
        let mut panner = RoomPanner::new(SR);

        // Let the ear-delay ramps land before probing with an impulse
        let mut l = vec![0.0; 256];
        let mut r = vec![0.0; 256];
        for _ in 0..10 {
            l.fill(0.0);
            r.fill(0.0);
            panner.process_block(&mut l, &mut r, 90.0, 6.0, 8.0);
        }

        l.fill(0.0);
        r.fill(0.0);
        l[0] = 1.0;
        r[0] = 1.0;
        panner.process_block(&mut l, &mut r, 90.0, 6.0, 8.0);

        let onset_r = r.iter().position(|s| s.abs() > 1e-4).unwrap();
        let onset_l = l.iter().position(|s| s.abs() > 1e-4).unwrap();
        assert_eq!(onset_r, 0, "near ear must not be delayed");

        // 6m room: pan scaled to 76.5 deg, ITD = 0.84ms * sin = about 39 samples
        let lag = onset_l - onset_r;
        assert!((38..=41).contains(&lag), "far-ear lag {lag} samples");
    }

    #[test]
    fn rear_positions_darken_high_frequencies() {
        // Block-rate cutoff ramp: run enough blocks to land it, then compare
        // front and rear level at a frequency above the shadow shelf.
        let blocks = 2200;
        let window = 4800;
        let mut front = RoomPanner::new(SR);
        let (fl, fr) = run(&mut front, 0.0, 6.0, 8.0, 13000.0, blocks, 64);
        let mut rear = RoomPanner::new(SR);
        let (rl, rr) = run(&mut rear, 180.0, 6.0, 8.0, 13000.0, blocks, 64);
        let high_ratio =
            stereo_rms(tail(&rl, window), tail(&rr, window)) / stereo_rms(tail(&fl, window), tail(&fr, window));

        let mut front = RoomPanner::new(SR);
        let (fl, fr) = run(&mut front, 0.0, 6.0, 8.0, 500.0, blocks, 64);
        let mut rear = RoomPanner::new(SR);
        let (rl, rr) = run(&mut rear, 180.0, 6.0, 8.0, 500.0, blocks, 64);
        let low_ratio =
            stereo_rms(tail(&rl, window), tail(&rr, window)) / stereo_rms(tail(&fl, window), tail(&fr, window));

        assert!(low_ratio < 1.0, "rear must be duller overall: {low_ratio}");
        assert!(
            high_ratio < low_ratio - 0.05,
            "shadow shelf missing: high {high_ratio} low {low_ratio}"
        );
    }

    #[test]
    fn wider_rooms_separate_the_ears_more() {
        let mut narrow = RoomPanner::new(SR);
        let (nl, nr) = run(&mut narrow, 60.0, 2.0, 8.0, 1000.0, 40, 256);
        let mut wide = RoomPanner::new(SR);
        let (wl, wr) = run(&mut wide, 60.0, 20.0, 8.0, 1000.0, 40, 256);

        let ratio = |l: &[f32], r: &[f32]| {
            let el: f32 = tail(l, 4096).iter().map(|s| s * s).sum::<f32>();
            let er: f32 = tail(r, 4096).iter().map(|s| s * s).sum::<f32>();
            er / el.max(1e-12)
        };
        assert!(ratio(&wl, &wr) > ratio(&nl, &nr) * 2.0);
    }

    #[test]
    fn reset_silences_the_tail() {
        let mut panner = RoomPanner::new(SR);
        run(&mut panner, 120.0, 4.0, 3.0, 700.0, 30, 128);
        panner.reset();

        let mut l = vec![0.0; 128];
        let mut r = vec![0.0; 128];
        panner.process_block(&mut l, &mut r, 120.0, 4.0, 3.0);
        assert!(l.iter().all(|s| *s == 0.0));
        assert!(r.iter().all(|s| *s == 0.0));
    }
}
