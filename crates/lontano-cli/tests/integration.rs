//! Integration tests for the lontano binary.
//!
//! Cover CLI invocation, WAV round trips through the renderer and the
//! derived-acoustics info output.

use std::process::Command;

/// Helper to get the path to the `lontano` binary built by cargo.
fn lontano_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_lontano"))
}

// ---------------------------------------------------------------------------
// CLI binary tests -- help and version
// ---------------------------------------------------------------------------

#[test]
fn cli_help_works() {
    let output = lontano_bin()
        .arg("--help")
        .output()
        .expect("failed to run lontano --help");

    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Lontano spatializer CLI"));
    assert!(stdout.contains("render"));
    assert!(stdout.contains("generate"));
    assert!(stdout.contains("info"));
}

#[test]
fn cli_version_works() {
    let output = lontano_bin()
        .arg("--version")
        .output()
        .expect("failed to run lontano --version");

    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("lontano"),
        "version output should contain 'lontano'"
    );
}

// ---------------------------------------------------------------------------
// CLI binary tests -- `lontano generate`
// ---------------------------------------------------------------------------

#[test]
fn cli_generate_tone_writes_wav() {
    use tempfile::TempDir;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tone.wav");

    let output = lontano_bin()
        .args([
            "generate",
            "tone",
            path.to_str().unwrap(),
            "--freq",
            "440",
            "--duration",
            "0.25",
        ])
        .output()
        .expect("failed to run lontano generate");

    assert!(
        output.status.success(),
        "lontano generate failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let reader = hound::WavReader::open(&path).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, 48000);

    let samples: Vec<f32> = reader.into_samples::<f32>().map(Result::unwrap).collect();
    assert_eq!(samples.len(), 12000);

    let peak = samples.iter().map(|s| s.abs()).fold(0.0, f32::max);
    assert!(peak > 0.5, "tone should be audible, peak {peak}");
}

// ---------------------------------------------------------------------------
// CLI binary tests -- `lontano render` (end-to-end file processing)
// ---------------------------------------------------------------------------

#[test]
fn cli_render_spatializes_a_tone() {
    use tempfile::TempDir;

    let dir = TempDir::new().unwrap();
    let input_path = dir.path().join("input.wav");
    let output_path = dir.path().join("output.wav");

    let status = lontano_bin()
        .args([
            "generate",
            "tone",
            input_path.to_str().unwrap(),
            "--duration",
            "0.25",
        ])
        .status()
        .expect("failed to run lontano generate");
    assert!(status.success());

    let output = lontano_bin()
        .args([
            "render",
            input_path.to_str().unwrap(),
            output_path.to_str().unwrap(),
            "--distance",
            "0.6",
            "--pan",
            "120",
            "--environment",
            "hall",
            "--tail",
            "0.5",
        ])
        .output()
        .expect("failed to run lontano render");

    assert!(
        output.status.success(),
        "lontano render failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Stats:"), "should print level stats");

    let reader = hound::WavReader::open(&output_path).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 2);
    assert_eq!(spec.sample_rate, 48000);

    // 0.25 s of input plus the 0.5 s tail, both channels interleaved.
    let samples: Vec<f32> = reader.into_samples::<f32>().map(Result::unwrap).collect();
    assert_eq!(samples.len(), (12000 + 24000) * 2);

    assert!(samples.iter().all(|s| s.is_finite()));
    let energy: f32 = samples.iter().map(|s| s * s).sum();
    assert!(energy > 0.0, "render should not be silent");
}

#[test]
fn cli_render_reads_scene_files() {
    use tempfile::TempDir;

    let dir = TempDir::new().unwrap();
    let input_path = dir.path().join("input.wav");
    let output_path = dir.path().join("output.wav");
    let scene_path = dir.path().join("scene.toml");

    let status = lontano_bin()
        .args([
            "generate",
            "noise",
            input_path.to_str().unwrap(),
            "--duration",
            "0.25",
        ])
        .status()
        .expect("failed to run lontano generate");
    assert!(status.success());

    std::fs::write(
        &scene_path,
        r#"
name = "integration hall"
environment = "hall"

[source]
distance = 0.4
pan = 90.0
pan_end = 270.0

[air]
absorption = 0.6
temperature = 5.0

[reverb]
decay = 2.0

[shimmer]
pitch = 12.0
mix = 0.15
"#,
    )
    .unwrap();

    let output = lontano_bin()
        .args([
            "render",
            input_path.to_str().unwrap(),
            output_path.to_str().unwrap(),
            "--scene",
            scene_path.to_str().unwrap(),
        ])
        .output()
        .expect("failed to run lontano render");

    assert!(
        output.status.success(),
        "lontano render --scene failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("integration hall"), "should echo the scene name");
    assert!(output_path.exists());
}

#[test]
fn cli_render_missing_input_fails() {
    let output = lontano_bin()
        .args([
            "render",
            "/tmp/nonexistent_lontano_test_file_12345.wav",
            "/tmp/nonexistent_lontano_test_out_12345.wav",
        ])
        .output()
        .expect("failed to run lontano");

    assert!(!output.status.success(), "missing input should fail");
}

#[test]
fn cli_render_rejects_a_bad_scene() {
    use tempfile::TempDir;

    let dir = TempDir::new().unwrap();
    let input_path = dir.path().join("input.wav");
    let scene_path = dir.path().join("scene.toml");

    let status = lontano_bin()
        .args([
            "generate",
            "impulse",
            input_path.to_str().unwrap(),
            "--length",
            "100",
        ])
        .status()
        .expect("failed to run lontano generate");
    assert!(status.success());

    std::fs::write(&scene_path, "environment = \"arena\"\n").unwrap();

    let output = lontano_bin()
        .args([
            "render",
            input_path.to_str().unwrap(),
            dir.path().join("out.wav").to_str().unwrap(),
            "--scene",
            scene_path.to_str().unwrap(),
        ])
        .output()
        .expect("failed to run lontano render");

    assert!(!output.status.success(), "unknown environment should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("scene"),
        "error should mention the scene file, got: {stderr}"
    );
}

// ---------------------------------------------------------------------------
// CLI binary tests -- `lontano info`
// ---------------------------------------------------------------------------

#[test]
fn cli_info_prints_the_bundle() {
    let output = lontano_bin()
        .args(["info", "--environment", "hall"])
        .output()
        .expect("failed to run lontano info");

    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("RT60"));
    assert!(stdout.contains("hall"));
    assert!(stdout.contains("15.0 x 30.0 x 10.0 m"));
}

#[test]
fn cli_info_json_parses() {
    let output = lontano_bin()
        .args([
            "info",
            "--json",
            "--width",
            "6",
            "--length",
            "8",
            "--height",
            "3",
            "--air",
            "0.5",
        ])
        .output()
        .expect("failed to run lontano info --json");

    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let value: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");

    assert_eq!(value["room"]["width"].as_f64().unwrap(), 6.0);
    assert_eq!(value["room"]["volume"].as_f64().unwrap(), 144.0);
    assert_eq!(value["environment"].as_str().unwrap(), "room");

    let rt60 = value["rt60"].as_f64().unwrap();
    assert!(rt60 > 0.1 && rt60 < 2.0, "8x6x3 room RT60 was {rt60}");

    // Reach at pan 0 is the room length.
    assert_eq!(value["reach"]["front"].as_f64().unwrap(), 8.0);
}
