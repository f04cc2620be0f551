//! Offline spatialization command.
//!
//! Drives a [`SpatialProcessor`] over a WAV file in block-sized chunks.
//! The source position comes from a scene file and/or flags; optional end
//! values sweep it linearly across the file. Distance is given as a
//! fraction 0-1 of the scene's reach, which follows the room geometry and
//! the current azimuth, so `1.0` always lands on the far wall.

use anyhow::Context;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use lontano_core::linear_to_db;
use lontano_spatial::SpatialProcessor;
use std::path::PathBuf;

use crate::scene::{EnvironmentName, GainLawName, ReverbConfig, Scene};
use crate::wav::{StereoSamples, WavSpec, read_wav_stereo, write_wav_stereo};

#[derive(Args)]
pub struct RenderArgs {
    /// Input WAV file (mono or stereo)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output WAV file (stereo)
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Scene file (TOML); flags override its values
    #[arg(short, long)]
    scene: Option<PathBuf>,

    /// Source distance as a fraction 0-1 of the scene's reach
    #[arg(short, long)]
    distance: Option<f32>,

    /// Distance fraction at the end of the file (linear sweep)
    #[arg(long)]
    distance_end: Option<f32>,

    /// Azimuth in degrees: 0 front, 90 right, 180 behind, 270 left
    #[arg(short, long)]
    pan: Option<f32>,

    /// Azimuth at the end of the file (linear sweep)
    #[arg(long)]
    pan_end: Option<f32>,

    /// Environment preset (replaces the scene's room table)
    #[arg(short, long, value_enum)]
    environment: Option<EnvironmentName>,

    /// Room width in meters
    #[arg(long)]
    room_width: Option<f32>,

    /// Room length in meters
    #[arg(long)]
    room_length: Option<f32>,

    /// Room height in meters
    #[arg(long)]
    room_height: Option<f32>,

    /// Air absorption amount 0-1
    #[arg(long)]
    air: Option<f32>,

    /// Air temperature in Celsius
    #[arg(long)]
    temperature: Option<f32>,

    /// Source height as a fraction 0-1 of the room height
    #[arg(long)]
    height: Option<f32>,

    /// Distance loudness compensation 0-1
    #[arg(long)]
    volume_compensation: Option<f32>,

    /// Distance attenuation law
    #[arg(long, value_enum)]
    gain_law: Option<GainLawName>,

    /// Reverb decay override in seconds
    #[arg(long)]
    reverb_decay: Option<f32>,

    /// Reverb pre-delay override in milliseconds
    #[arg(long)]
    pre_delay: Option<f32>,

    /// Extra seconds appended so the reverb tail can ring out
    #[arg(long, default_value = "0.0")]
    tail: f32,

    /// Processing block size
    #[arg(long, default_value = "512")]
    block_size: usize,

    /// Output bit depth (16, 24, or 32)
    #[arg(long, default_value = "32")]
    bit_depth: u16,
}

fn merge_flags(scene: &mut Scene, args: &RenderArgs) {
    scene.override_geometry(
        args.environment,
        args.room_width,
        args.room_length,
        args.room_height,
    );

    if let Some(distance) = args.distance {
        scene.source.distance = distance;
    }
    if args.distance_end.is_some() {
        scene.source.distance_end = args.distance_end;
    }
    if let Some(pan) = args.pan {
        scene.source.pan = pan;
    }
    if args.pan_end.is_some() {
        scene.source.pan_end = args.pan_end;
    }
    if let Some(height) = args.height {
        scene.source.height = height;
    }
    if let Some(air) = args.air {
        scene.air.absorption = air;
    }
    if let Some(temperature) = args.temperature {
        scene.air.temperature = temperature;
    }
    if let Some(compensation) = args.volume_compensation {
        scene.options.volume_compensation = compensation;
    }
    if let Some(gain_law) = args.gain_law {
        scene.options.gain_law = gain_law;
    }
    if let Some(decay) = args.reverb_decay {
        scene.reverb.get_or_insert_with(ReverbConfig::default).decay = Some(decay);
    }
    if let Some(pre_delay) = args.pre_delay {
        scene
            .reverb
            .get_or_insert_with(ReverbConfig::default)
            .pre_delay = Some(pre_delay);
    }
}

pub fn run(args: RenderArgs) -> anyhow::Result<()> {
    let mut scene = match &args.scene {
        Some(path) => Scene::load(path)?,
        None => Scene::default(),
    };
    merge_flags(&mut scene, &args);
    tracing::debug!("merged scene: {scene:?}");

    println!("Reading {}...", args.input.display());
    let (input, spec) = read_wav_stereo(&args.input)?;
    anyhow::ensure!(!input.is_empty(), "input file has no samples");

    let sample_rate = spec.sample_rate as f32;
    let input_len = input.len();

    println!(
        "  {} frames, {} Hz, {:.2}s",
        input_len,
        spec.sample_rate,
        input_len as f32 / sample_rate
    );
    if let Some(name) = &scene.name {
        println!("Scene: {name}");
    }

    let mut processor = SpatialProcessor::new();
    processor
        .prepare(sample_rate, args.block_size)
        .context("preparing the spatializer")?;
    scene.apply(&mut processor);

    let tail_frames = (args.tail.max(0.0) * sample_rate) as usize;
    let total = input_len + tail_frames;

    let mut left = input.left;
    let mut right = input.right;
    left.resize(total, 0.0);
    right.resize(total, 0.0);

    let input_rms = stereo_rms(&left[..input_len], &right[..input_len]);
    let input_peak = stereo_peak(&left[..input_len], &right[..input_len]);

    println!("Rendering...");

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap()
            .progress_chars("##-"),
    );

    let environment = scene.environment.into();
    let span = input_len.max(1) as f32;

    let mut start = 0;
    while start < total {
        let end = (start + args.block_size).min(total);
        let t = (start as f32 / span).min(1.0);
        let (fraction, pan) = scene.position_at(t);
        let reach = scene.effective_max_distance(pan);
        processor.set_max_distance(reach);
        processor.process_block(
            &mut left[start..end],
            &mut right[start..end],
            fraction * reach,
            pan,
            environment,
        );
        pb.set_position(end as u64);
        start = end;
    }

    pb.finish_with_message("done");

    let output_rms = stereo_rms(&left, &right);
    let output_peak = stereo_peak(&left, &right);

    println!("\nStats:");
    println!(
        "  Input:  RMS {:.1} dB, Peak {:.1} dB",
        linear_to_db(input_rms),
        linear_to_db(input_peak)
    );
    println!(
        "  Output: RMS {:.1} dB, Peak {:.1} dB",
        linear_to_db(output_rms),
        linear_to_db(output_peak)
    );

    let out_spec = WavSpec {
        channels: 2,
        sample_rate: spec.sample_rate,
        bits_per_sample: args.bit_depth,
    };

    println!("\nWriting {}...", args.output.display());
    write_wav_stereo(&args.output, &StereoSamples::new(left, right), out_spec)?;
    println!("Done!");

    Ok(())
}

fn stereo_rms(left: &[f32], right: &[f32]) -> f32 {
    let n = left.len() + right.len();
    if n == 0 {
        return 0.0;
    }
    let sum: f32 = left.iter().chain(right.iter()).map(|s| s * s).sum();
    (sum / n as f32).sqrt()
}

fn stereo_peak(left: &[f32], right: &[f32]) -> f32 {
    left.iter()
        .chain(right.iter())
        .map(|s| s.abs())
        .fold(0.0, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::RoomConfig;

    fn base_args() -> RenderArgs {
        RenderArgs {
            input: PathBuf::new(),
            output: PathBuf::new(),
            scene: None,
            distance: None,
            distance_end: None,
            pan: None,
            pan_end: None,
            environment: None,
            room_width: None,
            room_length: None,
            room_height: None,
            air: None,
            temperature: None,
            height: None,
            volume_compensation: None,
            gain_law: None,
            reverb_decay: None,
            pre_delay: None,
            tail: 0.0,
            block_size: 512,
            bit_depth: 32,
        }
    }

    #[test]
    fn flags_override_scene_values() {
        let mut scene = Scene::default();
        scene.source.distance = 0.2;
        scene.source.pan = 10.0;

        let mut args = base_args();
        args.distance = Some(0.8);
        args.pan = Some(120.0);
        args.air = Some(0.9);
        args.temperature = Some(-10.0);
        args.height = Some(1.0);
        args.volume_compensation = Some(0.0);
        args.gain_law = Some(GainLawName::Ramped);

        merge_flags(&mut scene, &args);

        assert!((scene.source.distance - 0.8).abs() < 1e-6);
        assert!((scene.source.pan - 120.0).abs() < 1e-6);
        assert!((scene.air.absorption - 0.9).abs() < 1e-6);
        assert!((scene.air.temperature + 10.0).abs() < 1e-6);
        assert!((scene.source.height - 1.0).abs() < 1e-6);
        assert!(scene.options.volume_compensation.abs() < 1e-6);
        assert_eq!(scene.options.gain_law, GainLawName::Ramped);
    }

    #[test]
    fn environment_flag_replaces_the_scene_room() {
        let mut scene = Scene {
            room: Some(RoomConfig {
                width: 3.0,
                length: 4.0,
                height: 2.0,
            }),
            ..Scene::default()
        };

        let mut args = base_args();
        args.environment = Some(EnvironmentName::Cave);
        merge_flags(&mut scene, &args);

        assert!(scene.room.is_none());
        assert_eq!(scene.environment, EnvironmentName::Cave);
        assert_eq!(scene.dimensions(), (30.0, 60.0, 14.0));
    }

    #[test]
    fn partial_room_flags_extend_current_geometry() {
        let mut scene = Scene::default();

        let mut args = base_args();
        args.room_length = Some(20.0);
        merge_flags(&mut scene, &args);

        assert_eq!(scene.dimensions(), (6.0, 20.0, 3.0));
    }

    #[test]
    fn reverb_flags_create_the_override_table() {
        let mut scene = Scene::default();
        assert!(scene.reverb.is_none());

        let mut args = base_args();
        args.reverb_decay = Some(2.5);
        args.pre_delay = Some(30.0);
        merge_flags(&mut scene, &args);

        let reverb = scene.reverb.expect("override table");
        assert_eq!(reverb.decay, Some(2.5));
        assert_eq!(reverb.pre_delay, Some(30.0));
        assert!(reverb.damping.is_none());
    }

    #[test]
    fn sweep_end_flags_overlay() {
        let mut scene = Scene::default();

        let mut args = base_args();
        args.distance_end = Some(0.9);
        args.pan_end = Some(270.0);
        merge_flags(&mut scene, &args);

        assert_eq!(scene.source.distance_end, Some(0.9));
        assert_eq!(scene.source.pan_end, Some(270.0));
    }

    #[test]
    fn stereo_stats_cover_both_channels() {
        let rms = stereo_rms(&[1.0, 1.0], &[0.0, 0.0]);
        assert!((rms - (0.5f32).sqrt()).abs() < 1e-6);

        let peak = stereo_peak(&[0.1, -0.2], &[0.9, -0.4]);
        assert!((peak - 0.9).abs() < 1e-6);

        assert_eq!(stereo_rms(&[], &[]), 0.0);
        assert_eq!(stereo_peak(&[], &[]), 0.0);
    }
}
