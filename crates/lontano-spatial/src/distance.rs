//! Distance spatialization engine.
//!
//! [`SpatialProcessor`] owns the whole rendering chain and drives it from
//! three controls per block: distance in meters, azimuth in degrees and an
//! [`Environment`] preset. Everything else (room geometry, air, temperature,
//! gain law) is configured through setters and held between blocks.
//!
//! The chain runs height shaping, propagation delay, distance gain, air
//! absorption, room-width M/S, room-aware panning, proximity crossfeed, the
//! late reverb blend and a final HRTF pass, in that order. Stages gate
//! themselves on the spatial amount (distance over max distance) so a source
//! at the listener position passes through untouched apart from the pan law,
//! and far sources in huge rooms fall back to a reduced chain.
//!
//! Distances fed to the stages are perceptual, not geometric: the true 3-D
//! source offset is scaled by a room-depth factor so the same slider span
//! reads as "further" in a long hall than in a booth.

use lontano_core::{
    Biquad, InterpolatedDelay, LinearSmoothedParam, SmoothedParam, StereoEffect, clamp,
    lowpass_coefficients, pan_gains, speed_of_sound,
};
use lontano_reverb::{ReverbEngine, RoomGeometry};

use crate::PrepareError;
use crate::convolver::BinauralRenderer;
use crate::environment::{Environment, RoomAcoustics};
use crate::height::HeightStage;
use crate::panning::RoomPanner;

/// Listener ear height above the floor, meters.
const LISTENER_EAR_HEIGHT: f32 = 1.7;

/// Capacity of the propagation delay lines, seconds.
const MAIN_DELAY_SECONDS: f32 = 0.5;

/// Coefficient recompute threshold for the air absorption lowpass, Hz.
const AIR_RECOMPUTE_HZ: f32 = 50.0;

/// Distance attenuation law used by the gain stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GainLaw {
    /// Unity inside 1 m, then `1/d` (-6 dB per doubling).
    #[default]
    Inverse,
    /// Linear ramp from unity at 0 m onto the `1/d` curve at 2 m.
    ///
    /// Trades the flat close field for a gentler approach: sources attenuate
    /// immediately as they leave the head instead of holding full level for
    /// the first meter.
    RampedInverse,
}

/// Real-time distance-based spatializer.
///
/// Construct with [`new`](Self::new), then call
/// [`prepare`](Self::prepare) before processing. An un-prepared processor
/// writes silence rather than stale buffer contents.
///
/// # Example
///
/// ```rust
/// use lontano_spatial::{Environment, SpatialProcessor};
///
/// let mut sp = SpatialProcessor::new();
/// sp.prepare(48000.0, 512).unwrap();
///
/// let mut left = vec![0.0f32; 512];
/// let mut right = vec![0.0f32; 512];
/// sp.process_block(&mut left, &mut right, 10.0, 45.0, Environment::Hall);
/// ```
#[derive(Debug, Clone)]
pub struct SpatialProcessor {
    sample_rate: f32,
    max_block: usize,
    prepared: bool,

    distance: f32,
    pan_degrees: f32,
    max_distance: f32,
    room_width: f32,
    room_length: f32,
    room_height: f32,
    air_absorption: f32,
    volume_compensation: f32,
    temperature: f32,
    sound_speed: f32,
    source_height: f32,
    environment: Environment,
    acoustics: RoomAcoustics,
    gain_law: GainLaw,
    distance_gain_enabled: bool,
    propagation_delay_enabled: bool,

    // Pan ramps on the sample clock but is consumed at block rate by the
    // proximity and reverb stages.
    pan: LinearSmoothedParam,
    gain: LinearSmoothedParam,
    air_cutoff: LinearSmoothedParam,
    delay_time: LinearSmoothedParam,
    stereo_width: LinearSmoothedParam,
    reverb_mix: SmoothedParam,
    hrtf_blend: SmoothedParam,

    last_air_cutoff: f32,
    air_filter_left: Biquad,
    air_filter_right: Biquad,
    main_delay_left: InterpolatedDelay,
    main_delay_right: InterpolatedDelay,

    reverb: ReverbEngine,
    binaural: BinauralRenderer,
    panner: RoomPanner,
    height_stage: HeightStage,

    // Sentinels force a geometry push on the first reverb block.
    last_geometry_room: [f32; 3],
    last_geometry_source: [f32; 3],

    scratch_left: Vec<f32>,
    scratch_right: Vec<f32>,
}

impl SpatialProcessor {
    /// Create a processor with default settings: a 6 x 8 x 3 m room, 20 m
    /// range, moderate air and volume compensation, 20 C.
    ///
    /// The instance is un-prepared; see [`prepare`](Self::prepare).
    pub fn new() -> Self {
        let sample_rate = 44100.0;
        let acoustics = RoomAcoustics::derive(6.0, 8.0, 3.0, 0.5);
        let mut sp = Self {
            sample_rate,
            max_block: 512,
            prepared: false,
            distance: 0.0,
            pan_degrees: 0.0,
            max_distance: 20.0,
            room_width: 6.0,
            room_length: 8.0,
            room_height: 3.0,
            air_absorption: 0.5,
            volume_compensation: 0.3,
            temperature: 20.0,
            sound_speed: speed_of_sound(20.0),
            source_height: 0.5,
            environment: Environment::Room,
            acoustics,
            gain_law: GainLaw::Inverse,
            distance_gain_enabled: true,
            propagation_delay_enabled: true,
            pan: LinearSmoothedParam::with_config(0.0, sample_rate, 15.0),
            gain: LinearSmoothedParam::with_config(1.0, sample_rate, 20.0),
            air_cutoff: LinearSmoothedParam::with_config(20000.0, sample_rate, 25.0),
            delay_time: LinearSmoothedParam::with_config(0.0, sample_rate, 25.0),
            stereo_width: LinearSmoothedParam::with_config(1.0, sample_rate, 30.0),
            reverb_mix: SmoothedParam::with_config(0.0, sample_rate, 20.0),
            hrtf_blend: SmoothedParam::with_config(0.0, sample_rate, 20.0),
            last_air_cutoff: 20000.0,
            air_filter_left: Biquad::new(),
            air_filter_right: Biquad::new(),
            main_delay_left: InterpolatedDelay::from_time(sample_rate, MAIN_DELAY_SECONDS),
            main_delay_right: InterpolatedDelay::from_time(sample_rate, MAIN_DELAY_SECONDS),
            reverb: ReverbEngine::new(sample_rate),
            binaural: BinauralRenderer::new(sample_rate),
            panner: RoomPanner::new(sample_rate),
            height_stage: HeightStage::new(sample_rate),
            last_geometry_room: [-1.0; 3],
            last_geometry_source: [f32::INFINITY; 3],
            scratch_left: Vec::new(),
            scratch_right: Vec::new(),
        };
        sp.apply_acoustics();
        sp
    }

    /// Allocate for `sample_rate` and a maximum block length, reset all
    /// state and mark the processor ready.
    ///
    /// Rejects non-finite or out-of-range rates (8-384 kHz) and block sizes
    /// outside 1-65536. A failed call leaves the processor un-prepared, so
    /// subsequent [`process_block`](Self::process_block) calls write silence.
    ///
    /// Larger blocks than `max_block` are handled by chunking, so the bound
    /// only has to cover the common case, not the worst.
    pub fn prepare(&mut self, sample_rate: f32, max_block: usize) -> Result<(), PrepareError> {
        self.prepared = false;
        if !sample_rate.is_finite() || !(8000.0..=384000.0).contains(&sample_rate) {
            return Err(PrepareError::SampleRate(sample_rate));
        }
        if max_block == 0 || max_block > 65536 {
            return Err(PrepareError::BlockSize(max_block));
        }

        self.sample_rate = sample_rate;
        self.max_block = max_block;

        self.pan = LinearSmoothedParam::with_config(self.pan_degrees, sample_rate, 15.0);
        self.gain = LinearSmoothedParam::with_config(1.0, sample_rate, 20.0);
        self.air_cutoff = LinearSmoothedParam::with_config(20000.0, sample_rate, 25.0);
        self.delay_time = LinearSmoothedParam::with_config(0.0, sample_rate, 25.0);
        self.stereo_width = LinearSmoothedParam::with_config(1.0, sample_rate, 30.0);
        self.reverb_mix = SmoothedParam::with_config(0.0, sample_rate, 20.0);
        self.hrtf_blend = SmoothedParam::with_config(0.0, sample_rate, 20.0);

        self.last_air_cutoff = 20000.0;
        self.air_filter_left.clear();
        self.air_filter_right.clear();
        self.main_delay_left = InterpolatedDelay::from_time(sample_rate, MAIN_DELAY_SECONDS);
        self.main_delay_right = InterpolatedDelay::from_time(sample_rate, MAIN_DELAY_SECONDS);

        self.reverb.set_sample_rate(sample_rate);
        self.reverb.reset();
        self.binaural.set_sample_rate(sample_rate);
        self.binaural.reset();
        self.panner = RoomPanner::new(sample_rate);
        self.height_stage = HeightStage::new(sample_rate);

        self.last_geometry_room = [-1.0; 3];
        self.last_geometry_source = [f32::INFINITY; 3];

        self.scratch_left.clear();
        self.scratch_left.resize(max_block, 0.0);
        self.scratch_right.clear();
        self.scratch_right.resize(max_block, 0.0);

        self.apply_acoustics();
        self.prepared = true;

        #[cfg(feature = "tracing")]
        tracing::debug!("spatial prepare: {sample_rate} Hz, block {max_block}");

        Ok(())
    }

    /// Clear every delay line, filter and ramp without touching parameters.
    ///
    /// Idempotent; processing silence afterwards yields silence.
    pub fn reset(&mut self) {
        self.pan.snap_to_target();
        self.gain.snap_to_target();
        self.air_cutoff.snap_to_target();
        self.delay_time.snap_to_target();
        self.stereo_width.snap_to_target();
        self.reverb_mix.snap_to_target();
        self.hrtf_blend.snap_to_target();

        self.air_filter_left.clear();
        self.air_filter_right.clear();
        self.main_delay_left.clear();
        self.main_delay_right.clear();

        self.reverb.reset();
        self.binaural.reset();
        self.panner.reset();
        self.height_stage.reset();
    }

    /// Render a block in place.
    ///
    /// `distance` is meters from the listener, `pan_degrees` follows the
    /// 0 = front, 90 = right convention and `environment` selects the room
    /// preset; passing a different variant than last time adopts its
    /// geometry before rendering. Both slices are processed up to the
    /// shorter length. Blocks longer than the prepared maximum are split
    /// internally.
    pub fn process_block(
        &mut self,
        left: &mut [f32],
        right: &mut [f32],
        distance: f32,
        pan_degrees: f32,
        environment: Environment,
    ) {
        let n = left.len().min(right.len());
        if n == 0 {
            return;
        }
        let (left, right) = (&mut left[..n], &mut right[..n]);

        if !self.prepared {
            left.fill(0.0);
            right.fill(0.0);
            return;
        }

        self.set_environment(environment);
        self.set_distance(distance);
        self.set_pan_degrees(pan_degrees);

        let mut start = 0;
        while start < n {
            let len = (n - start).min(self.max_block);
            let end = start + len;
            self.process_chunk(&mut left[start..end], &mut right[start..end]);
            start = end;
        }
    }

    fn process_chunk(&mut self, left: &mut [f32], right: &mut [f32]) {
        let n = left.len();
        let distance = self.distance;
        let pan_degrees = self.pan_degrees;
        let pan_rad = pan_degrees.to_radians();

        self.pan.set_target(pan_degrees);
        self.pan.skip(n as u32);

        let spatial = if self.max_distance > 0.0 {
            clamp(distance / self.max_distance, 0.0, 1.0)
        } else {
            0.0
        };

        // At the listener position only the pan law applies.
        if spatial <= 0.0 {
            let pan_norm = clamp(pan_rad.sin(), -1.0, 1.0);
            let (gain_l, gain_r) = pan_gains(pan_norm);
            for sample in left.iter_mut() {
                *sample *= gain_l;
            }
            for sample in right.iter_mut() {
                *sample *= gain_r;
            }
            return;
        }

        // Perceptual distance: the true 3-D offset scaled so depth reads
        // against the room, not in absolute meters.
        let room_depth = self.room_length.max(1.0);
        let forward = spatial * room_depth;
        let lateral = pan_rad.sin() * (self.room_width * 0.5).max(0.5);
        let source_y = self.source_height * self.room_height.max(2.0);
        let vertical = source_y - LISTENER_EAR_HEIGHT;
        let true_3d = (forward * forward + lateral * lateral + vertical * vertical).sqrt();
        let perceptual = clamp(1.0 + (room_depth - 3.0) * 0.15, 0.5, 2.5);
        let effective = true_3d * perceptual;

        let elevation = (self.source_height - 0.5) * 60.0;

        // Very far sources in very long rooms drop to a reduced chain.
        if effective > 30.0 || self.room_length > 50.0 {
            if self.distance_gain_enabled {
                self.process_gain(left, right, effective);
            }
            self.binaural.set_direction(pan_degrees, elevation);
            self.panner
                .process_block(left, right, pan_degrees, self.room_width, self.room_length);
            self.process_air(left, right, effective);
            self.height_stage
                .process_block(left, right, self.source_height, self.room_height);
            return;
        }

        let scaled = effective * spatial;

        self.height_stage
            .process_block(left, right, self.source_height, self.room_height);

        if self.propagation_delay_enabled && spatial > 0.01 {
            self.process_delay(left, right, scaled);
        }
        if self.distance_gain_enabled && spatial > 0.01 {
            self.process_gain(left, right, scaled);
        }
        if spatial > 0.01 {
            self.process_air(left, right, scaled);
        }

        self.process_room_width(left, right, pan_rad, spatial);

        self.binaural.set_direction(pan_degrees, elevation);
        self.panner
            .process_block(left, right, pan_degrees, self.room_width, self.room_length);

        if spatial > 0.01 {
            self.process_proximity(left, right, scaled);
        }
        if spatial > 0.1 {
            self.process_reverb(left, right, scaled, spatial);
        }
        if spatial > 0.2 {
            self.hrtf_blend.set_target(spatial * 0.3);
            for i in 0..n {
                let amount = self.hrtf_blend.advance();
                let (wet_l, wet_r) = self.binaural.process(left[i], right[i]);
                left[i] = clamp(wet_l * amount + left[i] * (1.0 - amount), -1.2, 1.2);
                right[i] = clamp(wet_r * amount + right[i] * (1.0 - amount), -1.2, 1.2);
            }
        }
    }

    /// Propagation delay with a gradual onset over the first meter.
    fn process_delay(&mut self, left: &mut [f32], right: &mut [f32], distance: f32) {
        if distance <= 0.0 {
            self.delay_time.set_immediate(0.0);
            return;
        }

        // Cubic ease-in keeps the first meter from gating on and off.
        let strength = if distance <= 1.0 {
            clamp(distance * distance * distance, 0.0, 1.0)
        } else {
            1.0
        };

        let delay_seconds = distance / self.sound_speed + 0.001;
        let delay_samples = delay_seconds * self.sample_rate;

        // Sub-sample moves snap; anything bigger rides the ramp.
        if (delay_samples - self.delay_time.get()).abs() < 1.0 {
            self.delay_time.set_immediate(delay_samples);
        } else {
            self.delay_time.set_target(delay_samples);
        }

        let wet = strength * 0.1;
        let dry = 1.0 - wet;
        for i in 0..left.len() {
            let delay = self.delay_time.advance();
            let delayed_l = self.main_delay_left.read_write(left[i], delay);
            let delayed_r = self.main_delay_right.read_write(right[i], delay);
            left[i] = left[i] * dry + delayed_l * wet;
            right[i] = right[i] * dry + delayed_r * wet;
        }
    }

    /// Distance attenuation with optional volume compensation.
    fn process_gain(&mut self, left: &mut [f32], right: &mut [f32], distance: f32) {
        if distance <= 0.0 {
            self.gain.set_immediate(1.0);
            return;
        }

        let mut final_gain = match self.gain_law {
            GainLaw::Inverse => {
                if distance > 1.0 {
                    1.0 / distance
                } else {
                    1.0
                }
            }
            GainLaw::RampedInverse => {
                if distance < 2.0 {
                    1.0 - distance * 0.25
                } else {
                    1.0 / distance
                }
            }
        };

        // Compensation flattens the curve by scaling the exponent, never by
        // boosting above unity.
        if self.volume_compensation > 0.0 {
            let exponent = 1.0 - clamp(self.volume_compensation, 0.0, 1.0);
            final_gain = final_gain.powf(exponent);
        }
        final_gain = final_gain.max(0.001);

        self.gain.set_target(final_gain);
        for i in 0..left.len() {
            let g = self.gain.advance();
            left[i] *= g;
            right[i] *= g;
        }
    }

    /// High-frequency rolloff from air absorption.
    ///
    /// The cutoff moves at block rate and the lowpass is recomputed only
    /// after a 50 Hz move. Above 18 kHz the filter is not applied at all.
    fn process_air(&mut self, left: &mut [f32], right: &mut [f32], distance: f32) {
        if distance <= 0.0 || self.air_absorption <= 1.0e-4 {
            self.air_cutoff.set_immediate(20000.0);
            self.air_filter_left.clear();
            self.air_filter_right.clear();
            self.last_air_cutoff = 20000.0;
            return;
        }

        let mut target_cutoff = 20000.0;
        if distance > 1.0 {
            let factor = clamp(distance.ln() / 20.0f32.ln(), 0.0, 1.0);
            target_cutoff -= factor * 12000.0;
        }
        let distance_ratio = if self.max_distance > 0.0 {
            clamp(distance / self.max_distance, 0.0, 1.0)
        } else {
            0.0
        };
        target_cutoff -= self.air_absorption * 0.3 * 3000.0 * distance_ratio;
        let target_cutoff = clamp(target_cutoff, 5000.0, 20000.0);

        self.air_cutoff.set_target(target_cutoff);
        let cutoff = self.air_cutoff.advance();
        if (cutoff - self.last_air_cutoff).abs() > AIR_RECOMPUTE_HZ {
            let (b0, b1, b2, a0, a1, a2) = lowpass_coefficients(cutoff, 0.5, self.sample_rate);
            self.air_filter_left.set_coefficients(b0, b1, b2, a0, a1, a2);
            self.air_filter_right.set_coefficients(b0, b1, b2, a0, a1, a2);
            self.last_air_cutoff = cutoff;
        }

        if cutoff < 18000.0 {
            for i in 0..left.len() {
                left[i] = self.air_filter_left.process(left[i]);
                right[i] = self.air_filter_right.process(right[i]);
            }
        }
    }

    /// Stereo width from the room, engaged with lateral pan.
    fn process_room_width(
        &mut self,
        left: &mut [f32],
        right: &mut [f32],
        pan_rad: f32,
        spatial: f32,
    ) {
        // 2-20 m of room maps onto 0.6x-1.8x of width.
        let width_norm = clamp((self.room_width - 2.0) / 18.0, 0.0, 1.0);
        let mut room_stereo_width = clamp(0.6 + width_norm * 1.2, 0.6, 1.8);

        // Width reads only off-center.
        room_stereo_width = 1.0 + (room_stereo_width - 1.0) * pan_rad.sin().abs();

        if (room_stereo_width - 1.0).abs() <= 0.05 {
            return;
        }

        let target_width = 1.0 + (room_stereo_width - 1.0) * spatial;
        self.stereo_width.set_target(target_width);

        for i in 0..left.len() {
            let mid = (left[i] + right[i]) * 0.5;
            let side = (left[i] - right[i]) * 0.5;

            let width = self.stereo_width.advance();
            let wide_side = side * width;

            let norm = 1.0 / 1.0f32.max(((width * width + 1.0) * 0.5).sqrt());
            left[i] = clamp((mid + wide_side) * norm, -2.0, 2.0);
            right[i] = clamp((mid - wide_side) * norm, -2.0, 2.0);
        }
    }

    /// Crossfeed and near-ear emphasis inside the first meter.
    fn process_proximity(&mut self, left: &mut [f32], right: &mut [f32], distance: f32) {
        let crossfeed = clamp(0.07 * (1.0 - (-distance * 0.3).exp()), 0.0, 0.07);
        let closeness = clamp(1.0 - distance, 0.0, 1.0);
        if crossfeed <= 0.0 && closeness <= 0.0 {
            return;
        }

        let right_is_near = self.pan.get().to_radians().sin() >= 0.0;
        let near_boost = 1.0 + 0.3 * closeness;
        let far_cut = 1.0 / near_boost;

        for i in 0..left.len() {
            let l = left[i];
            let r = right[i];
            let mut new_l = l + r * crossfeed;
            let mut new_r = r + l * crossfeed;
            if closeness > 0.0 {
                if right_is_near {
                    new_r *= near_boost;
                    new_l *= far_cut;
                } else {
                    new_l *= near_boost;
                    new_r *= far_cut;
                }
            }
            left[i] = new_l;
            right[i] = new_r;
        }
    }

    /// Position-aware reverb, blended conservatively.
    ///
    /// The engine parameters are restaged every block from the acoustics
    /// bundle, the source position and the room volume; geometry is pushed
    /// only on real movement. The stage output mixes twice: a distance wet
    /// level inside the stage, then a small smoothed blend (at most 10%)
    /// against the pre-stage signal.
    fn process_reverb(&mut self, left: &mut [f32], right: &mut [f32], distance: f32, spatial: f32) {
        if distance <= 0.0 {
            return;
        }
        let n = left.len();

        // Source position follows the smoothed pan heading.
        let pan_rad = self.pan.get().to_radians();
        let source_x = pan_rad.sin() * distance;
        let source_z = pan_rad.cos() * distance;
        let source_y = self.source_height * self.room_height;

        let room = [self.room_width, self.room_length, self.room_height];
        let source = [source_x, source_y, source_z];
        let room_moved = room
            .iter()
            .zip(&self.last_geometry_room)
            .any(|(a, b)| (a - b).abs() > 0.05);
        let source_moved = source
            .iter()
            .zip(&self.last_geometry_source)
            .any(|(a, b)| (a - b).abs() > 0.02);
        if room_moved || source_moved {
            self.reverb.configure_room(RoomGeometry {
                width: self.room_width,
                length: self.room_length,
                height: self.room_height,
                source_x,
                source_y,
                source_z,
            });
            self.last_geometry_room = room;
            self.last_geometry_source = source;
            #[cfg(feature = "tracing")]
            tracing::debug!(
                "reverb geometry: room {room:?}, source ({source_x:.2}, {source_y:.2}, {source_z:.2})"
            );
        }

        let distance_ratio = clamp(distance / self.max_distance, 0.0, 1.0);

        // Level grows in three stages: fast inside 2 m, steady to 10 m,
        // then saturating.
        let level_scale = if distance < 2.0 {
            0.1 + (distance / 2.0) * 0.4
        } else if distance < 10.0 {
            0.5 + ((distance - 2.0) / 8.0) * 0.4
        } else {
            0.9 + ((distance - 10.0).min(10.0) / 10.0) * 0.1
        };

        // Early/late balance shifts toward late with distance, and toward
        // early for frontal sources.
        let front_back = pan_rad.cos();
        let mut ratio = clamp(0.8 - distance_ratio * 0.6, 0.2, 0.8);
        ratio *= if front_back < 0.0 { 0.5 } else { 1.3 };
        let ratio = clamp(ratio, 0.1, 0.9);

        let early = self.acoustics.reverb_level * level_scale * ratio;
        let late = self.acoustics.reverb_level * level_scale * (1.0 - ratio);

        let pre_delay_scale = clamp(0.3 + distance_ratio * 0.7, 0.3, 1.0);
        let diffusion_scale = clamp(0.4 + distance_ratio * 0.6, 0.4, 1.0);
        let decay_scale = clamp(0.7 + distance_ratio * 0.6, 0.7, 1.3);

        let volume = self.room_width * self.room_length * self.room_height;
        let room_size_factor = clamp(volume / 100.0, 0.1, 3.0);

        self.reverb
            .set_size(clamp(self.acoustics.room_size * room_size_factor, 0.1, 1.0));
        self.reverb
            .set_early_level(clamp(early * room_size_factor * 0.2, 0.0, 0.3));
        self.reverb
            .set_late_level(clamp(late * room_size_factor * 0.3, 0.0, 0.4));
        self.reverb
            .set_pre_delay(self.acoustics.pre_delay_ms * pre_delay_scale * room_size_factor.min(1.5));
        self.reverb.set_diffusion(clamp(
            self.acoustics.diffusion * diffusion_scale * room_size_factor.min(1.2),
            0.3,
            0.8,
        ));
        self.reverb.set_decay(clamp(
            self.acoustics.decay_time * decay_scale * room_size_factor.min(2.0),
            0.1,
            8.0,
        ));
        self.reverb.set_damping(clamp(
            self.acoustics.damping * (1.0 / room_size_factor).max(0.5),
            0.1,
            0.9,
        ));

        self.scratch_left[..n].copy_from_slice(left);
        self.scratch_right[..n].copy_from_slice(right);
        self.reverb
            .process_block(&mut self.scratch_left[..n], &mut self.scratch_right[..n]);

        // Inner mix: distance-dependent wet against the stage input.
        let wet = clamp(distance_ratio * 0.4 + 0.05, 0.0, 0.6);
        let dry = 1.0 - wet * 0.3;
        for i in 0..n {
            let rev_l = clamp(self.scratch_left[i], -1.0, 1.0);
            let rev_r = clamp(self.scratch_right[i], -1.0, 1.0);
            self.scratch_left[i] = clamp(left[i] * dry + rev_l * wet, -1.5, 1.5);
            self.scratch_right[i] = clamp(right[i] * dry + rev_r * wet, -1.5, 1.5);
        }

        // Outer blend: never more than 10% of the stage result.
        self.reverb_mix.set_target(clamp(spatial * 0.08, 0.0, 0.1));
        for i in 0..n {
            let mix = self.reverb_mix.advance();
            let rev_l = clamp(self.scratch_left[i], -1.0, 1.0);
            let rev_r = clamp(self.scratch_right[i], -1.0, 1.0);
            left[i] = clamp(left[i] * (1.0 - mix) + rev_l * mix, -1.2, 1.2);
            right[i] = clamp(right[i] * (1.0 - mix) + rev_r * mix, -1.2, 1.2);
        }
    }

    fn apply_acoustics(&mut self) {
        self.reverb.set_size(self.acoustics.room_size);
        self.reverb.set_decay(self.acoustics.decay_time);
        self.reverb.set_damping(self.acoustics.damping);
        self.reverb.set_diffusion(self.acoustics.diffusion);
        self.reverb.set_pre_delay(self.acoustics.pre_delay_ms);
        self.reverb.set_high_cut(self.acoustics.high_cut);
        self.reverb.set_low_cut(self.acoustics.low_cut);
        self.reverb.set_early_level(self.acoustics.early_level);
        self.reverb.set_late_level(self.acoustics.late_level);
    }

    /// Source distance in meters, clamped to 0 through the max distance.
    pub fn set_distance(&mut self, distance: f32) {
        self.distance = clamp(distance, 0.0, self.max_distance);
    }

    /// Distance that maps to full spatial processing, clamped 5-100 m.
    pub fn set_max_distance(&mut self, max_distance: f32) {
        self.max_distance = clamp(max_distance, 5.0, 100.0);
    }

    /// Azimuth in degrees, wrapped into 0-360 (0 front, 90 right).
    pub fn set_pan_degrees(&mut self, pan_degrees: f32) {
        if pan_degrees.is_finite() {
            self.pan_degrees = pan_degrees.rem_euclid(360.0);
        }
    }

    /// Room width in meters, clamped 2-100.
    ///
    /// Width couples into the acoustics: wider rooms diffuse more and
    /// reflect more level.
    pub fn set_room_width(&mut self, width: f32) {
        self.room_width = clamp(width, 2.0, 100.0);

        let width_factor = clamp(self.room_width / 6.0, 0.5, 1.5);
        self.acoustics.diffusion = clamp(width_factor, 0.1, 1.0);
        self.acoustics.reverb_level = clamp(width_factor * 0.2, 0.05, 0.5);

        self.reverb.set_diffusion(self.acoustics.diffusion);
        self.reverb
            .set_early_level(clamp(width_factor * 0.2, 0.05, 0.4));
    }

    /// Room length in meters, clamped 2-100.
    ///
    /// Length scales the tank size multiplicatively on top of the height
    /// anchor and steps the early reflection level down as rooms stretch.
    pub fn set_room_length(&mut self, length: f32) {
        self.room_length = clamp(length, 2.0, 100.0);

        let length_factor = clamp(self.room_length / 10.0, 0.5, 3.0);
        let size_multiplier = clamp(length_factor, 0.7, 1.5);
        self.acoustics.room_size = clamp(self.acoustics.room_size * size_multiplier, 0.1, 4.0);

        self.reverb.set_size(self.acoustics.room_size);
        self.reverb
            .set_late_level(clamp(length_factor * 0.1, 0.1, 0.6));
        self.reverb.set_early_level(if length_factor > 2.0 {
            0.3
        } else if length_factor > 1.0 {
            0.2
        } else {
            0.1
        });
    }

    /// Room height in meters, clamped 2-20.
    ///
    /// Height anchors the tank size and decay, lifts the reverb level floor
    /// for tall rooms and sets pre-delay from the ceiling bounce.
    pub fn set_room_height(&mut self, height: f32) {
        self.room_height = clamp(height, 2.0, 20.0);

        let height_factor = clamp(self.room_height / 3.0, 0.5, 3.0);
        let size = clamp(height_factor, 0.5, 2.0);
        self.acoustics.room_size = size;
        let decay = clamp(height_factor * 2.5, 0.5, 6.0);
        self.acoustics.decay_time = decay;

        let reverb_floor = clamp((height_factor - 0.5) * 0.1, 0.0, 0.6);
        self.acoustics.reverb_level = self.acoustics.reverb_level.max(reverb_floor);

        let pre_delay = clamp(self.room_height * 4.0, 2.0, 80.0);
        let damping = clamp(1.0 - height_factor * 0.1, 0.2, 0.8);
        self.acoustics.damping = damping;

        self.reverb.set_size(size);
        self.reverb.set_decay(decay);
        self.reverb.set_pre_delay(pre_delay);
        self.reverb.set_damping(damping);
    }

    /// Air absorption amount, 0-1.
    pub fn set_air_absorption(&mut self, amount: f32) {
        self.air_absorption = clamp(amount, 0.0, 1.0);
        self.acoustics.air_absorption = self.air_absorption;
    }

    /// Volume compensation amount, 0-1. Zero keeps the raw gain law.
    pub fn set_volume_compensation(&mut self, amount: f32) {
        self.volume_compensation = clamp(amount, 0.0, 1.0);
    }

    /// Air temperature in Celsius, clamped -40 to 60.
    ///
    /// Recomputes the speed of sound (330-360 m/s) and tilts the reverb:
    /// cold air darkens the tail, hot air brightens it.
    pub fn set_temperature(&mut self, celsius: f32) {
        self.temperature = clamp(celsius, -40.0, 60.0);
        self.sound_speed = speed_of_sound(self.temperature);

        let norm = clamp(self.temperature / 50.0, -1.0, 1.0);

        let high_cut = clamp(15000.0 + norm * 5000.0, 5000.0, 20000.0);
        self.acoustics.high_cut = high_cut;
        self.reverb.set_high_cut(high_cut);

        let damping = clamp(0.7 - norm * 0.2, 0.2, 0.8);
        self.acoustics.damping = damping;
        self.reverb.set_damping(damping);

        let wet_mult = clamp(1.0 + norm * 0.5, 0.5, 1.5);
        self.reverb
            .set_late_level(clamp(self.acoustics.reverb_level * wet_mult, 0.0, 1.0));
    }

    /// Source height as a fraction of the room height, 0-1.
    pub fn set_source_height(&mut self, height_percent: f32) {
        self.source_height = clamp(height_percent, 0.0, 1.0);
    }

    /// Select the room preset; a change adopts its geometry through the
    /// coupled room setters.
    pub fn set_environment(&mut self, environment: Environment) {
        if environment == self.environment {
            return;
        }
        self.environment = environment;
        let (width, length, height) = environment.geometry();
        self.set_room_width(width);
        self.set_room_height(height);
        self.set_room_length(length);
        #[cfg(feature = "tracing")]
        tracing::debug!("environment {environment:?}: {width} x {length} x {height} m");
    }

    /// Select the distance attenuation law.
    pub fn set_gain_law(&mut self, law: GainLaw) {
        self.gain_law = law;
    }

    /// Enable or disable the distance gain stage.
    pub fn set_distance_gain_enabled(&mut self, enabled: bool) {
        self.distance_gain_enabled = enabled;
    }

    /// Enable or disable the propagation delay stage.
    pub fn set_propagation_delay_enabled(&mut self, enabled: bool) {
        self.propagation_delay_enabled = enabled;
    }

    /// Override the reverb decay base, seconds.
    pub fn set_reverb_decay(&mut self, seconds: f32) {
        self.acoustics.decay_time = clamp(seconds, 0.1, 30.0);
        self.reverb.set_decay(self.acoustics.decay_time);
    }

    /// Override the reverb size base.
    pub fn set_reverb_size(&mut self, size: f32) {
        self.acoustics.room_size = clamp(size, 0.1, 4.0);
        self.reverb.set_size(self.acoustics.room_size);
    }

    /// Override the reverb diffusion base, 0-1.
    pub fn set_reverb_diffusion(&mut self, diffusion: f32) {
        self.acoustics.diffusion = clamp(diffusion, 0.0, 1.0);
        self.reverb.set_diffusion(self.acoustics.diffusion);
    }

    /// Override the reverb damping base, 0-1.
    pub fn set_reverb_damping(&mut self, damping: f32) {
        self.acoustics.damping = clamp(damping, 0.0, 1.0);
        self.reverb.set_damping(self.acoustics.damping);
    }

    /// Reverb stereo width, forwarded to the tank.
    pub fn set_reverb_width(&mut self, width: f32) {
        self.reverb.set_width(width);
    }

    /// Override the early reflection level base.
    pub fn set_reverb_early_level(&mut self, level: f32) {
        self.acoustics.early_level = clamp(level, 0.0, 1.0);
        self.reverb.set_early_level(self.acoustics.early_level);
    }

    /// Override the late tail level base.
    pub fn set_reverb_late_level(&mut self, level: f32) {
        self.acoustics.late_level = clamp(level, 0.0, 1.0);
        self.reverb.set_late_level(self.acoustics.late_level);
    }

    /// Override the pre-delay base, milliseconds.
    pub fn set_reverb_pre_delay(&mut self, pre_delay_ms: f32) {
        self.acoustics.pre_delay_ms = clamp(pre_delay_ms, 0.0, 500.0);
        self.reverb.set_pre_delay(self.acoustics.pre_delay_ms);
    }

    /// Reverb high-cut frequency, Hz.
    pub fn set_reverb_high_cut(&mut self, frequency_hz: f32) {
        self.acoustics.high_cut = clamp(frequency_hz, 1000.0, 20000.0);
        self.reverb.set_high_cut(self.acoustics.high_cut);
    }

    /// Reverb low-cut frequency, Hz.
    pub fn set_reverb_low_cut(&mut self, frequency_hz: f32) {
        self.acoustics.low_cut = clamp(frequency_hz, 20.0, 2000.0);
        self.reverb.set_low_cut(self.acoustics.low_cut);
    }

    /// Enable the shimmer layer in the reverb tank.
    pub fn set_shimmer_enabled(&mut self, enabled: bool) {
        self.reverb.set_shimmer_enabled(enabled);
    }

    /// Shimmer pitch shift in semitones.
    pub fn set_shimmer_pitch(&mut self, semitones: f32) {
        self.reverb.set_shimmer_pitch(semitones);
    }

    /// Shimmer feedback amount.
    pub fn set_shimmer_feedback(&mut self, feedback: f32) {
        self.reverb.set_shimmer_feedback(feedback);
    }

    /// Shimmer wet mix.
    pub fn set_shimmer_mix(&mut self, mix: f32) {
        self.reverb.set_shimmer_mix(mix);
    }

    /// Current source distance in meters.
    pub fn distance(&self) -> f32 {
        self.distance
    }

    /// Current azimuth in degrees.
    pub fn pan_degrees(&self) -> f32 {
        self.pan_degrees
    }

    /// Current maximum distance in meters.
    pub fn max_distance(&self) -> f32 {
        self.max_distance
    }

    /// Room width in meters.
    pub fn room_width(&self) -> f32 {
        self.room_width
    }

    /// Room length in meters.
    pub fn room_length(&self) -> f32 {
        self.room_length
    }

    /// Room height in meters.
    pub fn room_height(&self) -> f32 {
        self.room_height
    }

    /// Air absorption amount.
    pub fn air_absorption(&self) -> f32 {
        self.air_absorption
    }

    /// Volume compensation amount.
    pub fn volume_compensation(&self) -> f32 {
        self.volume_compensation
    }

    /// Air temperature in Celsius.
    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Speed of sound at the current temperature, m/s.
    pub fn sound_speed(&self) -> f32 {
        self.sound_speed
    }

    /// Source height fraction.
    pub fn source_height(&self) -> f32 {
        self.source_height
    }

    /// Active room preset.
    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Current acoustics bundle.
    pub fn acoustics(&self) -> &RoomAcoustics {
        &self.acoustics
    }

    /// Active distance attenuation law.
    pub fn gain_law(&self) -> GainLaw {
        self.gain_law
    }

    /// Whether [`prepare`](Self::prepare) has succeeded.
    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// Prepared sample rate, Hz.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }
}

impl Default for SpatialProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl StereoEffect for SpatialProcessor {
    fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        let mut l = [left];
        let mut r = [right];
        let (distance, pan, env) = (self.distance, self.pan_degrees, self.environment);
        self.process_block(&mut l, &mut r, distance, pan, env);
        (l[0], r[0])
    }

    fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        let (distance, pan, env) = (self.distance, self.pan_degrees, self.environment);
        self.process_block(left, right, distance, pan, env);
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        let _ = self.prepare(sample_rate, self.max_block);
    }

    fn reset(&mut self) {
        SpatialProcessor::reset(self);
    }
}
