//! Integration tests for the conversion pipeline
//!
//! Exercises the orchestrator end to end against stub external tools:
//! a cooperative stub that honors the manifest contract, a failing
//! stub, and a hanging stub that must be killed on timeout.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use voicemorph::{
    AudioBuffer, AudioNormalizer, AudioOutput, ConversionRequest, ConversionStatus,
    ConverterConfig, Orchestrator, VcError,
};

fn write_sine_wav(path: &Path, freq: f32, rate: u32, len: usize) {
    let samples: Vec<f32> = (0..len)
        .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin() * 0.5)
        .collect();
    let buffer = AudioBuffer::new(samples, rate).unwrap();
    AudioOutput::save(&buffer, path).unwrap();
}

/// Config isolated to a scratch directory, fallback-capable, no fetch
fn isolated_config(dir: &Path) -> ConverterConfig {
    ConverterConfig::default()
        .with_tool_dir(dir.join("tool"))
        .with_work_dir(dir.join("work"))
        .without_auto_fetch()
}

/// Install a stub tool: creates the tool dir, a weight artifact so the
/// prober reports a usable engine, and a shell script as the tool
#[cfg(unix)]
fn install_stub_tool(config: &ConverterConfig, script_body: &str) -> ConverterConfig {
    let model_dir = config.model_dir();
    std::fs::create_dir_all(&model_dir).unwrap();
    std::fs::write(model_dir.join("G_0.pth"), b"weights").unwrap();
    std::fs::write(config.tool_dir.join("convert.sh"), script_body).unwrap();
    config
        .clone()
        .with_tool_command(vec!["sh".to_string(), "convert.sh".to_string()])
}

fn make_request(dir: &Path) -> ConversionRequest {
    let source = dir.join("source.wav");
    let target = dir.join("target.wav");
    write_sine_wav(&source, 440.0, 22050, 22050);
    write_sine_wav(&target, 180.0, 16000, 8000);
    ConversionRequest::new(source, target, dir.join("converted.wav"))
}

#[test]
fn absent_tool_routes_to_fallback_without_spawning() {
    let tmp = tempfile::tempdir().unwrap();
    let marker = tmp.path().join("tool_was_run");

    // If anything ever ran the tool command, the marker would appear
    let config = isolated_config(tmp.path()).with_tool_command(vec![
        "sh".to_string(),
        "-c".to_string(),
        format!("touch {}", marker.display()),
    ]);

    let request = make_request(tmp.path());
    let result = Orchestrator::new(config).convert(&request);

    assert!(result.is_success(), "message: {}", result.message);
    assert!(request.destination.exists());
    assert!(!marker.exists(), "subprocess was spawned with no tool installed");
}

#[cfg(unix)]
#[test]
fn cooperative_stub_tool_converts_via_manifest() {
    let tmp = tempfile::tempdir().unwrap();
    let config = install_stub_tool(
        &isolated_config(tmp.path()),
        "#!/bin/sh\n\
         line=$(cat \"$1\")\n\
         src=${line%%|*}\n\
         rest=${line#*|}\n\
         out=${rest#*|}\n\
         cp \"$src\" \"$out\"\n",
    );

    let request = make_request(tmp.path());
    let result = Orchestrator::new(config.clone()).convert(&request);

    assert!(result.is_success(), "message: {}", result.message);
    assert!(result.message.contains("external"));
    assert!(request.destination.exists());

    // Destination must hold decodable canonical-rate audio
    let out = AudioNormalizer::new(16000)
        .normalize_file(&request.destination)
        .unwrap();
    assert_eq!(out.sample_rate(), 16000);

    // Per-request interchange files are cleaned up afterwards
    let leftover_manifests: Vec<PathBuf> = std::fs::read_dir(&config.tool_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("convert_") && n.ends_with(".txt"))
        })
        .collect();
    assert!(leftover_manifests.is_empty(), "{:?}", leftover_manifests);
}

#[cfg(unix)]
#[test]
fn failing_stub_tool_falls_back_and_still_succeeds() {
    let tmp = tempfile::tempdir().unwrap();
    let config = install_stub_tool(
        &isolated_config(tmp.path()),
        "#!/bin/sh\necho 'model exploded' >&2\nexit 1\n",
    );

    let request = make_request(tmp.path());
    let result = Orchestrator::new(config).convert(&request);

    // Not ExternalToolError: the fallback tier absorbed the failure
    assert!(result.is_success(), "message: {}", result.message);
    assert!(result.message.contains("fallback"));
    assert!(request.destination.exists());
}

#[cfg(unix)]
#[test]
fn stub_exiting_zero_without_output_falls_back() {
    let tmp = tempfile::tempdir().unwrap();
    // Exit 0 but never write the declared output file
    let config = install_stub_tool(&isolated_config(tmp.path()), "#!/bin/sh\nexit 0\n");

    let request = make_request(tmp.path());
    let result = Orchestrator::new(config).convert(&request);

    assert!(result.is_success(), "message: {}", result.message);
    assert!(result.message.contains("fallback"));
}

#[cfg(unix)]
#[test]
fn hanging_stub_tool_times_out_into_fallback() {
    let tmp = tempfile::tempdir().unwrap();
    // The backgrounded sleep outlives the killed shell while holding
    // the inherited pipes open; the deadline must hold anyway
    let config = install_stub_tool(&isolated_config(tmp.path()), "#!/bin/sh\nsleep 30 & wait\n")
        .with_tool_timeout(std::time::Duration::from_secs(1));

    let request = make_request(tmp.path());
    let start = std::time::Instant::now();
    let result = Orchestrator::new(config).convert(&request);

    assert!(result.is_success(), "message: {}", result.message);
    assert!(result.message.contains("fallback"));
    // Bounded: killed at the 1s deadline, not after 30s
    assert!(start.elapsed() < std::time::Duration::from_secs(15));
}

#[cfg(unix)]
#[test]
fn unspawnable_tool_command_falls_back() {
    let tmp = tempfile::tempdir().unwrap();
    // Tool dir and weights exist, but the configured interpreter does
    // not; the spawn failure must route to the fallback tier
    let config = install_stub_tool(&isolated_config(tmp.path()), "#!/bin/sh\nexit 0\n")
        .with_tool_command(vec![
            "voicemorph-no-such-interpreter".to_string(),
            "convert.sh".to_string(),
        ]);

    let request = make_request(tmp.path());
    let result = Orchestrator::new(config).convert(&request);

    assert!(result.is_success(), "message: {}", result.message);
    assert!(result.message.contains("fallback"));
    assert!(request.destination.exists());
}

#[test]
fn fallback_output_respects_peak_bound() {
    let tmp = tempfile::tempdir().unwrap();
    let request = make_request(tmp.path());
    let result = Orchestrator::new(isolated_config(tmp.path())).convert(&request);
    assert!(result.is_success());

    let out = AudioNormalizer::new(16000)
        .normalize_file(&request.destination)
        .unwrap();
    // 0.9 target plus 16-bit quantization headroom
    assert!(out.peak() <= 0.91, "peak was {}", out.peak());
}

#[test]
fn silent_inputs_surface_silent_signal() {
    let tmp = tempfile::tempdir().unwrap();
    let source = tmp.path().join("source.wav");
    let target = tmp.path().join("target.wav");
    let silence = AudioBuffer::new(vec![0.0; 8000], 16000).unwrap();
    AudioOutput::save(&silence, &source).unwrap();
    AudioOutput::save(&silence, &target).unwrap();

    let request = ConversionRequest::new(&source, &target, tmp.path().join("out.wav"));
    let result = Orchestrator::new(isolated_config(tmp.path())).convert(&request);

    assert!(!result.is_success());
    assert!(matches!(
        result.status,
        ConversionStatus::Failure(VcError::SilentSignal)
    ));
    assert!(!request.destination.exists());
}

#[test]
fn concurrent_requests_are_isolated() {
    let tmp = tempfile::tempdir().unwrap();
    let orchestrator = Arc::new(Orchestrator::new(isolated_config(tmp.path())));

    let source = tmp.path().join("source.wav");
    let target = tmp.path().join("target.wav");
    write_sine_wav(&source, 440.0, 16000, 16000);
    write_sine_wav(&target, 180.0, 16000, 8000);

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let orchestrator = Arc::clone(&orchestrator);
            let request = ConversionRequest::new(
                &source,
                &target,
                tmp.path().join(format!("out_{}.wav", i)),
            );
            std::thread::spawn(move || {
                let result = orchestrator.convert(&request);
                (request, result)
            })
        })
        .collect();

    for handle in handles {
        let (request, result) = handle.join().unwrap();
        assert!(result.is_success(), "message: {}", result.message);
        assert!(request.destination.exists());
    }
}
