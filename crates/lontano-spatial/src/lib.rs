//! Lontano Spatial - Distance-based binaural spatializer
//!
//! This crate renders a mono or stereo source at a position in a room:
//! distance, azimuth and height in, a two-ear image out. Built on
//! lontano-core primitives and the lontano-reverb engine:
//!
//! - [`SpatialProcessor`] - The full chain, driven per block
//! - [`RoomPanner`] - Room-aware azimuth cues (ILD, ITD, rear shadow)
//! - [`HeightStage`] - Spectral tilt and width from source elevation
//! - [`BinauralRenderer`] - HRIR convolution with crossfeed
//! - [`HrirDatabase`] - Synthetic spherical-head impulse responses
//! - [`RoomAcoustics`] / [`Environment`] - Derived reverb bundles and presets
//!
//! ## Example
//!
//! ```rust
//! use lontano_spatial::{Environment, SpatialProcessor};
//!
//! let mut sp = SpatialProcessor::new();
//! sp.prepare(48000.0, 256).unwrap();
//! sp.set_source_height(0.8);
//!
//! let mut left = vec![0.1f32; 256];
//! let mut right = vec![0.1f32; 256];
//! sp.process_block(&mut left, &mut right, 12.0, 120.0, Environment::Hall);
//! ```

pub mod convolver;
pub mod distance;
pub mod environment;
pub mod height;
pub mod hrir;
pub mod panning;

// Re-export main types at crate root
pub use convolver::{BinauralRenderer, Fir};
pub use distance::{GainLaw, SpatialProcessor};
pub use environment::{Environment, RoomAcoustics};
pub use height::HeightStage;
pub use hrir::{HrirDatabase, HrirPair};
pub use panning::RoomPanner;

/// Why [`SpatialProcessor::prepare`] refused a configuration.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum PrepareError {
    /// Sample rate outside 8-384 kHz or not finite.
    #[error("unsupported sample rate {0} Hz (expected 8000-384000)")]
    SampleRate(f32),
    /// Block size zero or above 65536.
    #[error("unsupported block size {0} (expected 1-65536)")]
    BlockSize(usize),
}
