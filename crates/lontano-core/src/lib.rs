//! Core DSP primitives for the lontano spatializer.
//!
//! Allocation happens at construction and reconfiguration only; every
//! `process` path is allocation-free and suitable for real-time use.
//! The crate is `no_std`-compatible (disable the default `std` feature);
//! float math goes through `libm` either way.
//!
//! # Modules
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`delay`] | Interpolated circular delay line |
//! | [`param`] | Linear and exponential parameter smoothers |
//! | [`one_pole`] | One-pole lowpass for damping |
//! | [`biquad`] | RBJ biquad: lowpass, highpass, shelves |
//! | [`allpass`] | Sinusoidally modulated Schroeder allpass |
//! | [`math`] | dB/linear, pan law, speed of sound, denormal flush |
//! | [`effect`] | Stereo processing trait |

#![cfg_attr(not(feature = "std"), no_std)]

pub mod allpass;
pub mod biquad;
pub mod delay;
pub mod effect;
pub mod math;
pub mod one_pole;
pub mod param;

pub use allpass::ModulatedAllpass;
pub use biquad::{
    Biquad, high_shelf_coefficients, highpass_coefficients, low_shelf_coefficients,
    lowpass_coefficients,
};
pub use delay::{Interpolation, InterpolatedDelay};
pub use effect::StereoEffect;
pub use math::{
    clamp, db_to_linear, flush_denormal, hz_to_omega, lerp, linear_to_db, mono_sum,
    ms_to_samples, pan_gains, samples_to_ms, speed_of_sound, wet_dry_mix, wet_dry_mix_stereo,
};
pub use one_pole::OnePole;
pub use param::{LinearSmoothedParam, SmoothedParam};
