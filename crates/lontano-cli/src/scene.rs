//! Scene description files for the offline renderer.
//!
//! A [`Scene`] carries everything `lontano render` needs besides the audio:
//! where the source sits, how big the room is, what the air is like and any
//! reverb overrides. Scenes load from TOML; command-line flags overlay
//! individual values afterwards.

use std::path::Path;

use anyhow::Context;
use lontano_core::{clamp, lerp};
use lontano_spatial::{Environment, GainLaw, SpatialProcessor};
use serde::{Deserialize, Serialize};

/// Environment preset names accepted in scene files and on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EnvironmentName {
    /// Domestic living room.
    #[default]
    Room,
    /// Treated control room.
    Studio,
    /// Concert hall.
    Hall,
    /// Large irregular cavern.
    Cave,
}

impl From<EnvironmentName> for Environment {
    fn from(name: EnvironmentName) -> Self {
        match name {
            EnvironmentName::Room => Environment::Room,
            EnvironmentName::Studio => Environment::Studio,
            EnvironmentName::Hall => Environment::Hall,
            EnvironmentName::Cave => Environment::Cave,
        }
    }
}

impl std::fmt::Display for EnvironmentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Room => "room",
            Self::Studio => "studio",
            Self::Hall => "hall",
            Self::Cave => "cave",
        };
        f.write_str(name)
    }
}

/// Distance attenuation law names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GainLawName {
    /// Unity inside 1 m, `1/d` beyond.
    #[default]
    Inverse,
    /// Linear ramp into the `1/d` curve over the first 2 m.
    Ramped,
}

impl From<GainLawName> for GainLaw {
    fn from(name: GainLawName) -> Self {
        match name {
            GainLawName::Inverse => GainLaw::Inverse,
            GainLawName::Ramped => GainLaw::RampedInverse,
        }
    }
}

fn default_distance() -> f32 {
    0.5
}

fn default_height() -> f32 {
    0.5
}

fn default_absorption() -> f32 {
    0.5
}

fn default_temperature() -> f32 {
    20.0
}

fn default_volume_compensation() -> f32 {
    0.3
}

fn default_shimmer_pitch() -> f32 {
    12.0
}

fn default_shimmer_feedback() -> f32 {
    0.3
}

fn default_shimmer_mix() -> f32 {
    0.1
}

fn default_true() -> bool {
    true
}

/// Source position, with optional end values for a sweep across the file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Distance as a fraction 0-1 of the scene's reach.
    #[serde(default = "default_distance")]
    pub distance: f32,

    /// Distance fraction at the end of the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_end: Option<f32>,

    /// Azimuth in degrees: 0 front, 90 right, 180 behind, 270 left.
    #[serde(default)]
    pub pan: f32,

    /// Azimuth at the end of the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pan_end: Option<f32>,

    /// Height as a fraction 0-1 of the room height.
    #[serde(default = "default_height")]
    pub height: f32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            distance: default_distance(),
            distance_end: None,
            pan: 0.0,
            pan_end: None,
            height: default_height(),
        }
    }
}

/// Explicit room dimensions in meters. Overrides the environment preset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Room width in meters.
    pub width: f32,
    /// Room length in meters.
    pub length: f32,
    /// Room height in meters.
    pub height: f32,
}

/// Air properties.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AirConfig {
    /// Air absorption amount, 0-1.
    #[serde(default = "default_absorption")]
    pub absorption: f32,

    /// Air temperature in Celsius.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for AirConfig {
    fn default() -> Self {
        Self {
            absorption: default_absorption(),
            temperature: default_temperature(),
        }
    }
}

/// Rendering options.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptionsConfig {
    /// Distance loudness compensation, 0-1. Zero keeps the raw gain law.
    #[serde(default = "default_volume_compensation")]
    pub volume_compensation: f32,

    /// Distance attenuation law.
    #[serde(default)]
    pub gain_law: GainLawName,

    /// Whether the distance gain stage runs.
    #[serde(default = "default_true")]
    pub distance_gain: bool,

    /// Whether the propagation delay stage runs.
    #[serde(default = "default_true")]
    pub propagation_delay: bool,
}

impl Default for OptionsConfig {
    fn default() -> Self {
        Self {
            volume_compensation: default_volume_compensation(),
            gain_law: GainLawName::default(),
            distance_gain: true,
            propagation_delay: true,
        }
    }
}

/// Reverb overrides. Absent fields keep the values derived from geometry.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ReverbConfig {
    /// Decay time in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decay: Option<f32>,
    /// Room size factor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f32>,
    /// Allpass diffusion amount, 0-1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diffusion: Option<f32>,
    /// High-frequency damping, 0-1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damping: Option<f32>,
    /// Stereo width of the tail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
    /// Early reflection level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub early_level: Option<f32>,
    /// Late tail level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub late_level: Option<f32>,
    /// Pre-delay in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_delay: Option<f32>,
    /// High-cut frequency in Hz.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high_cut: Option<f32>,
    /// Low-cut frequency in Hz.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low_cut: Option<f32>,
}

/// Shimmer layer settings. Writing the table enables the layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShimmerConfig {
    /// Whether the shimmer layer runs.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Pitch shift in semitones, clamped to plus or minus 24.
    #[serde(default = "default_shimmer_pitch")]
    pub pitch: f32,
    /// Regeneration into the tank, 0-0.95.
    #[serde(default = "default_shimmer_feedback")]
    pub feedback: f32,
    /// Blend into the late tail, 0-1.
    #[serde(default = "default_shimmer_mix")]
    pub mix: f32,
}

impl Default for ShimmerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pitch: default_shimmer_pitch(),
            feedback: default_shimmer_feedback(),
            mix: default_shimmer_mix(),
        }
    }
}

/// A complete render scene.
///
/// # TOML format
///
/// ```toml
/// name = "hall walk"
/// environment = "hall"
///
/// [source]
/// distance = 0.2
/// distance_end = 0.9
/// pan = 0.0
/// pan_end = 180.0
/// height = 0.5
///
/// [air]
/// absorption = 0.4
/// temperature = 12.0
///
/// [reverb]
/// decay = 3.5
/// pre_delay = 40.0
///
/// [shimmer]
/// pitch = 12.0
/// mix = 0.15
/// ```
///
/// An explicit `[room]` table (width/length/height in meters) takes
/// precedence over the environment preset's geometry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Scene {
    /// Optional scene name, echoed when rendering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Environment preset.
    #[serde(default)]
    pub environment: EnvironmentName,

    /// Source position and sweep.
    #[serde(default)]
    pub source: SourceConfig,

    /// Explicit room geometry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<RoomConfig>,

    /// Air properties.
    #[serde(default)]
    pub air: AirConfig,

    /// Rendering options.
    #[serde(default)]
    pub options: OptionsConfig,

    /// Reverb overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverb: Option<ReverbConfig>,

    /// Shimmer layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shimmer: Option<ShimmerConfig>,
}

impl Scene {
    /// Load a scene from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading scene file {}", path.display()))?;
        let scene: Scene = toml::from_str(&content)
            .with_context(|| format!("parsing scene file {}", path.display()))?;
        Ok(scene)
    }

    /// Resolved room dimensions in meters as `(width, length, height)`.
    pub fn dimensions(&self) -> (f32, f32, f32) {
        match &self.room {
            Some(room) => (room.width, room.length, room.height),
            None => Environment::from(self.environment).geometry(),
        }
    }

    /// Replace geometry from command-line overrides.
    ///
    /// An explicit environment drops the scene's room table; dimension
    /// overrides then start from whatever geometry is in effect.
    pub fn override_geometry(
        &mut self,
        environment: Option<EnvironmentName>,
        width: Option<f32>,
        length: Option<f32>,
        height: Option<f32>,
    ) {
        if let Some(environment) = environment {
            self.environment = environment;
            self.room = None;
        }
        if width.is_some() || length.is_some() || height.is_some() {
            let (w, l, h) = self.dimensions();
            self.room = Some(RoomConfig {
                width: width.unwrap_or(w),
                length: length.unwrap_or(l),
                height: height.unwrap_or(h),
            });
        }
    }

    /// Meters of reach a distance fraction of 1.0 maps to at an azimuth.
    ///
    /// Pointing down the room the reach is the length; at 90 or 270 degrees
    /// it is the width, with a sine blend between and a 2 m floor.
    pub fn effective_max_distance(&self, pan_degrees: f32) -> f32 {
        let (width, length, _) = self.dimensions();
        let lateral = pan_degrees.to_radians().sin().abs();
        (length + lateral * (width - length)).max(2.0)
    }

    /// Source position at normalized file position `t` in 0-1, as
    /// `(distance_fraction, pan_degrees)`.
    pub fn position_at(&self, t: f32) -> (f32, f32) {
        let source = &self.source;
        let distance = match source.distance_end {
            Some(end) => lerp(source.distance, end, t),
            None => source.distance,
        };
        let pan = match source.pan_end {
            Some(end) => lerp(source.pan, end, t),
            None => source.pan,
        };
        (clamp(distance, 0.0, 1.0), pan)
    }

    /// Push every scene parameter into the processor.
    ///
    /// Geometry is applied width, height then length so the coupled room
    /// setters see the same order as interactive use; reverb and shimmer
    /// overrides land last so they win over the derived values.
    pub fn apply(&self, processor: &mut SpatialProcessor) {
        processor.set_environment(self.environment.into());
        let (width, length, height) = self.dimensions();
        processor.set_room_width(width);
        processor.set_room_height(height);
        processor.set_room_length(length);

        processor.set_air_absorption(self.air.absorption);
        processor.set_temperature(self.air.temperature);
        processor.set_source_height(self.source.height);
        processor.set_volume_compensation(self.options.volume_compensation);
        processor.set_gain_law(self.options.gain_law.into());
        processor.set_distance_gain_enabled(self.options.distance_gain);
        processor.set_propagation_delay_enabled(self.options.propagation_delay);

        if let Some(reverb) = &self.reverb {
            if let Some(decay) = reverb.decay {
                processor.set_reverb_decay(decay);
            }
            if let Some(size) = reverb.size {
                processor.set_reverb_size(size);
            }
            if let Some(diffusion) = reverb.diffusion {
                processor.set_reverb_diffusion(diffusion);
            }
            if let Some(damping) = reverb.damping {
                processor.set_reverb_damping(damping);
            }
            if let Some(width) = reverb.width {
                processor.set_reverb_width(width);
            }
            if let Some(level) = reverb.early_level {
                processor.set_reverb_early_level(level);
            }
            if let Some(level) = reverb.late_level {
                processor.set_reverb_late_level(level);
            }
            if let Some(pre_delay) = reverb.pre_delay {
                processor.set_reverb_pre_delay(pre_delay);
            }
            if let Some(high_cut) = reverb.high_cut {
                processor.set_reverb_high_cut(high_cut);
            }
            if let Some(low_cut) = reverb.low_cut {
                processor.set_reverb_low_cut(low_cut);
            }
        }

        if let Some(shimmer) = &self.shimmer {
            processor.set_shimmer_enabled(shimmer.enabled);
            processor.set_shimmer_pitch(shimmer.pitch);
            processor.set_shimmer_feedback(shimmer.feedback);
            processor.set_shimmer_mix(shimmer.mix);
        }
    }
}
