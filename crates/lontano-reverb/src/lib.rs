//! Lontano Reverb - Room acoustics engine
//!
//! This crate provides the reverberation half of lontano, built on
//! lontano-core:
//!
//! - [`ReverbEngine`] - The complete wet chain, ready to use
//! - [`EarlyReflections`] - Image-source echoes for a shoebox room
//! - [`DiffusionSection`] - Cascaded allpass diffusers
//! - [`FdnTank`] - Eight-line feedback delay network tail
//! - [`ShimmerEffect`] - Pitch-shifted tail regeneration
//!
//! ## Example
//!
//! ```rust
//! use lontano_core::StereoEffect;
//! use lontano_reverb::{ReverbEngine, RoomGeometry};
//!
//! let mut reverb = ReverbEngine::new(48000.0);
//! reverb.set_decay(3.5);
//! reverb.set_pre_delay(20.0);
//! reverb.configure_room(RoomGeometry::default());
//!
//! let (wet_l, wet_r) = reverb.process(0.5, 0.5);
//! assert!(wet_l.is_finite() && wet_r.is_finite());
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod diffusion;
pub mod early_reflections;
pub mod engine;
pub mod fdn;
pub mod shimmer;

// Re-export main types at crate root
pub use diffusion::DiffusionSection;
pub use early_reflections::{EarlyReflections, RoomGeometry};
pub use engine::ReverbEngine;
pub use fdn::FdnTank;
pub use shimmer::ShimmerEffect;
