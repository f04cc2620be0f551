//! Analytic room-acoustics derivation.
//!
//! Instead of hand-tuned reverb presets, the control bundle is derived from
//! the room itself: Sabine's formula turns volume and surface absorption into
//! an RT60, and the remaining controls (damping, levels, pre-delay, diffusion,
//! tone) follow from the same geometric quantities. [`Environment`] supplies a
//! few representative geometries as starting points; the explicit room setters
//! on the processor refine from there.

use lontano_core::clamp;

/// Reverb and absorption parameters derived from room geometry.
///
/// Produced by [`RoomAcoustics::derive`] and pushed into the reverb engine by
/// the spatial processor whenever geometry or air absorption changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoomAcoustics {
    /// Room size factor for the reverb tank (0.1-4.0).
    pub room_size: f32,
    /// RT60 decay time in seconds (0.2-8.0).
    pub decay_time: f32,
    /// High-frequency damping amount (0.02-0.95).
    pub damping: f32,
    /// Late reverb send level (0-0.4).
    pub reverb_level: f32,
    /// Allpass diffusion amount (0.1-1.0).
    pub diffusion: f32,
    /// Gap before the reverb onset in milliseconds (1-100).
    pub pre_delay_ms: f32,
    /// Air absorption input the bundle was derived from (0-1).
    pub air_absorption: f32,
    /// Reverb high-cut frequency in Hz (2000-20000).
    pub high_cut: f32,
    /// Reverb low-cut frequency in Hz (20-200).
    pub low_cut: f32,
    /// Early reflection level (0.1-0.6).
    pub early_level: f32,
    /// Late tail level (0.3-0.8).
    pub late_level: f32,
}

impl RoomAcoustics {
    /// Derive the full bundle from room dimensions (meters) and an air
    /// absorption amount in 0-1.
    ///
    /// `RT60 = 0.161 V / (S a)` with mean absorption `a = 0.1 + air * 0.4`,
    /// so more absorptive air (and walls, which track it here) shortens the
    /// tail. Size follows the cube root of volume against a 150 m^3
    /// reference; larger rooms also push the low cut down and shift energy
    /// from the early field into the late tail.
    pub fn derive(width: f32, length: f32, height: f32, air_absorption: f32) -> Self {
        let volume = width * length * height;
        let surface = 2.0 * (width * length + width * height + length * height);

        let absorption = 0.1 + air_absorption * 0.4;
        let rt60 = 0.161 * volume / (surface * absorption);

        let room_size = clamp((volume / 150.0).powf(0.33), 0.1, 4.0);
        // High frequencies are absorbed more than the mean
        let hf_absorption = absorption * (1.0 + air_absorption * 2.0);

        let max_dimension = width.max(length).max(height);
        let aspect_ratio = width.max(length) / width.min(length);

        Self {
            room_size,
            decay_time: clamp(rt60, 0.2, 8.0),
            damping: clamp(hf_absorption, 0.02, 0.95),
            reverb_level: clamp((1.0 - absorption) * room_size * 0.15, 0.0, 0.4),
            diffusion: clamp(1.0 / aspect_ratio, 0.1, 1.0),
            pre_delay_ms: clamp(max_dimension * 2.9, 1.0, 100.0),
            air_absorption,
            high_cut: clamp(20000.0 - air_absorption * 15000.0, 2000.0, 20000.0),
            low_cut: clamp(200.0 - room_size * 50.0, 20.0, 200.0),
            early_level: clamp(0.4 - room_size * 0.1, 0.1, 0.6),
            late_level: clamp(0.5 + room_size * 0.1, 0.3, 0.8),
        }
    }
}

impl Default for RoomAcoustics {
    /// The bundle for the default 6 x 8 x 3 m room at 0.5 air absorption.
    fn default() -> Self {
        Self::derive(6.0, 8.0, 3.0, 0.5)
    }
}

/// Preset listening environments carrying representative room geometry.
///
/// Passing a different variant to `process_block` adopts its geometry;
/// explicit room setters override afterwards as usual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    /// Domestic living room, 6 x 8 x 3 m.
    #[default]
    Room,
    /// Treated control room, 4 x 5 x 2.5 m.
    Studio,
    /// Concert hall, 15 x 30 x 10 m.
    Hall,
    /// Large irregular cavern, 30 x 60 x 14 m.
    Cave,
}

impl Environment {
    /// Preset room dimensions in meters as `(width, length, height)`.
    pub fn geometry(self) -> (f32, f32, f32) {
        match self {
            Self::Room => (6.0, 8.0, 3.0),
            Self::Studio => (4.0, 5.0, 2.5),
            Self::Hall => (15.0, 30.0, 10.0),
            Self::Cave => (30.0, 60.0, 14.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_room_matches_sabine_by_hand() {
        let a = RoomAcoustics::derive(6.0, 8.0, 3.0, 0.5);

        // V = 144, S = 180, absorption = 0.3
        let rt60 = 0.161 * 144.0 / (180.0 * 0.3);
        assert!((a.decay_time - rt60).abs() < 1e-4, "decay {}", a.decay_time);
        assert!((a.damping - 0.6).abs() < 1e-5);
        assert!((a.pre_delay_ms - 8.0 * 2.9).abs() < 1e-4);
        assert!((a.diffusion - 6.0 / 8.0).abs() < 1e-5);
        assert!((a.high_cut - 12500.0).abs() < 1.0);
    }

    #[test]
    fn larger_rooms_decay_longer() {
        let (w, l, h) = Environment::Studio.geometry();
        let studio = RoomAcoustics::derive(w, l, h, 0.3);
        let (w, l, h) = Environment::Hall.geometry();
        let hall = RoomAcoustics::derive(w, l, h, 0.3);

        assert!(hall.decay_time > studio.decay_time);
        assert!(hall.room_size > studio.room_size);
        assert!(hall.late_level >= studio.late_level);
        assert!(hall.low_cut <= studio.low_cut);
    }

    #[test]
    fn absorption_shortens_and_darkens() {
        let dry = RoomAcoustics::derive(10.0, 12.0, 4.0, 0.9);
        let live = RoomAcoustics::derive(10.0, 12.0, 4.0, 0.1);

        assert!(dry.decay_time < live.decay_time);
        assert!(dry.high_cut < live.high_cut);
        assert!(dry.damping > live.damping);
        assert!(dry.reverb_level < live.reverb_level);
    }

    #[test]
    fn square_rooms_are_more_diffuse() {
        let square = RoomAcoustics::derive(8.0, 8.0, 3.0, 0.5);
        let corridor = RoomAcoustics::derive(3.0, 30.0, 3.0, 0.5);

        assert!((square.diffusion - 1.0).abs() < 1e-6);
        assert!(corridor.diffusion < 0.2);
    }

    #[test]
    fn extreme_geometry_stays_clamped() {
        let tiny = RoomAcoustics::derive(2.0, 2.0, 2.0, 1.0);
        assert!(tiny.decay_time >= 0.2);
        assert!(tiny.room_size >= 0.1);
        assert!(tiny.early_level <= 0.6);

        let vast = RoomAcoustics::derive(100.0, 100.0, 20.0, 0.0);
        assert!(vast.decay_time <= 8.0);
        assert!(vast.room_size <= 4.0);
        assert!(vast.damping >= 0.02);
        assert!(vast.late_level <= 0.8);
    }

    #[test]
    fn presets_cover_distinct_scales() {
        let sizes: Vec<f32> = [
            Environment::Studio,
            Environment::Room,
            Environment::Hall,
            Environment::Cave,
        ]
        .iter()
        .map(|e| {
            let (w, l, h) = e.geometry();
            RoomAcoustics::derive(w, l, h, 0.5).room_size
        })
        .collect();

        for pair in sizes.windows(2) {
            assert!(pair[0] < pair[1], "presets should grow: {sizes:?}");
        }
    }
}
