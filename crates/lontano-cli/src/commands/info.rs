//! Derived room acoustics inspection.

use clap::Args;
use lontano_spatial::RoomAcoustics;
use std::path::PathBuf;

use crate::scene::{EnvironmentName, Scene};

/// Show the acoustics bundle derived from a room geometry.
#[derive(Args)]
pub struct InfoArgs {
    /// Scene file supplying the geometry and air settings
    #[arg(short, long)]
    scene: Option<PathBuf>,

    /// Environment preset supplying the geometry
    #[arg(short, long, value_enum)]
    environment: Option<EnvironmentName>,

    /// Room width in meters
    #[arg(long)]
    width: Option<f32>,

    /// Room length in meters
    #[arg(long)]
    length: Option<f32>,

    /// Room height in meters
    #[arg(long)]
    height: Option<f32>,

    /// Air absorption amount 0-1
    #[arg(long)]
    air: Option<f32>,

    /// Emit JSON instead of the table
    #[arg(long)]
    json: bool,
}

pub fn run(args: InfoArgs) -> anyhow::Result<()> {
    let mut scene = match &args.scene {
        Some(path) => Scene::load(path)?,
        None => Scene::default(),
    };
    scene.override_geometry(args.environment, args.width, args.length, args.height);
    if let Some(air) = args.air {
        scene.air.absorption = air;
    }

    let (width, length, height) = scene.dimensions();
    let acoustics = RoomAcoustics::derive(width, length, height, scene.air.absorption);
    let front = scene.effective_max_distance(0.0);
    let side = scene.effective_max_distance(90.0);

    if args.json {
        let value = serde_json::json!({
            "environment": scene.environment,
            "room": {
                "width": width,
                "length": length,
                "height": height,
                "volume": width * length * height,
            },
            "air_absorption": acoustics.air_absorption,
            "rt60": acoustics.decay_time,
            "size": acoustics.room_size,
            "pre_delay_ms": acoustics.pre_delay_ms,
            "damping": acoustics.damping,
            "diffusion": acoustics.diffusion,
            "high_cut": acoustics.high_cut,
            "low_cut": acoustics.low_cut,
            "early_level": acoustics.early_level,
            "late_level": acoustics.late_level,
            "reverb_level": acoustics.reverb_level,
            "reach": { "front": front, "side": side },
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!(
            "Room:        {:.1} x {:.1} x {:.1} m ({:.0} m^3)",
            width,
            length,
            height,
            width * length * height
        );
        println!("Environment: {}", scene.environment);
        println!("Air:         {:.2}", acoustics.air_absorption);
        println!();
        println!("RT60:        {:.2} s", acoustics.decay_time);
        println!("Size factor: {:.2}", acoustics.room_size);
        println!("Pre-delay:   {:.1} ms", acoustics.pre_delay_ms);
        println!("Damping:     {:.2}", acoustics.damping);
        println!("Diffusion:   {:.2}", acoustics.diffusion);
        println!("High cut:    {:.0} Hz", acoustics.high_cut);
        println!("Low cut:     {:.0} Hz", acoustics.low_cut);
        println!("Early level: {:.2}", acoustics.early_level);
        println!("Late level:  {:.2}", acoustics.late_level);
        println!("Reverb send: {:.2}", acoustics.reverb_level);
        println!();
        println!("Reach:       {:.1} m ahead, {:.1} m to the side", front, side);
    }

    Ok(())
}
