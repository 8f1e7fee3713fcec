//! Integration Tests
//!
//! End-to-end tests for the Refmaster processing pipeline through the
//! public API: load → match level → master → render.

use approx::assert_relative_eq;
use refmaster::dsp::{master, match_level, MasteringParams, Preset, StageSet};
use refmaster::engine::{load_audio, resample, write_wav, ExportFormat, SampleBuffer, SAFETY_PEAK};
use refmaster::render::{decimate, render, QualityMode};

/// Helper to create a test sine wave buffer
fn create_sine_buffer(
    frequency: f64,
    amplitude: f64,
    sample_rate: u32,
    duration_secs: f64,
) -> SampleBuffer {
    let num_samples = (sample_rate as f64 * duration_secs) as usize;
    let samples = (0..num_samples)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            (amplitude * (2.0 * std::f64::consts::PI * frequency * t).sin()) as f32
        })
        .collect();
    SampleBuffer::new(samples, sample_rate).unwrap()
}

fn constant(value: f32, len: usize, sample_rate: u32) -> SampleBuffer {
    SampleBuffer::new(vec![value; len], sample_rate).unwrap()
}

fn gain_only(gain_db: f32) -> MasteringParams {
    MasteringParams {
        use_compressor: false,
        gain_db,
        use_limiter: false,
        ..Default::default()
    }
}

// === Level Matching Scenarios ===

#[test]
fn test_constant_level_scenario() {
    let target = constant(0.1, 44100, 44100);
    let reference = constant(0.2, 44100, 44100);

    let leveled = match_level(&target, &reference).unwrap();

    assert_eq!(leveled.len(), 44100);
    assert_eq!(leveled.sample_rate(), 44100);
    for &s in leveled.samples() {
        assert_relative_eq!(s, 0.16, epsilon = 1e-5);
    }
}

#[test]
fn test_self_match_attenuates_by_headroom() {
    let buffer = create_sine_buffer(440.0, 0.6, 44100, 0.5);
    let leveled = match_level(&buffer, &buffer).unwrap();
    assert_relative_eq!(leveled.rms(), buffer.rms() * 0.8, epsilon = 1e-6);
}

#[test]
fn test_silent_target_leveling_is_noop() {
    let silent = SampleBuffer::silent(44100, 44100).unwrap();
    let reference = create_sine_buffer(440.0, 0.5, 44100, 1.0);

    let leveled = match_level(&silent, &reference).unwrap();
    assert_eq!(leveled, silent);
    assert!(leveled.samples().iter().all(|s| s.is_finite()));
}

// === Mastering Scenarios ===

#[test]
fn test_six_db_gain_scenario() {
    let buffer = create_sine_buffer(100.0, 0.4, 44100, 0.1);
    let out = master(&buffer, &gain_only(6.0)).unwrap();

    assert!((out.peak() - 0.798).abs() < 2e-3, "peak {}", out.peak());
    assert!(out.peak() < SAFETY_PEAK);
}

#[test]
fn test_twelve_db_gain_scenario() {
    let buffer = create_sine_buffer(100.0, 0.4, 44100, 0.1);
    let out = master(&buffer, &gain_only(12.0)).unwrap();
    assert_relative_eq!(out.peak(), SAFETY_PEAK, epsilon = 1e-6);
}

#[test]
fn test_mastering_never_exceeds_safety_peak() {
    for preset in [Preset::Basic, Preset::Professional] {
        let hot = create_sine_buffer(60.0, 1.0, 48000, 0.5);
        let params = MasteringParams {
            gain_db: 18.0,
            ..preset.params()
        };
        let out = master(&hot, &params).unwrap();
        assert!(out.peak() <= SAFETY_PEAK, "{:?}: peak {}", preset, out.peak());
    }
}

#[test]
fn test_master_is_pure() {
    let buffer = create_sine_buffer(440.0, 0.7, 44100, 0.5);
    let copy = buffer.clone();

    let first = master(&buffer, &MasteringParams::professional()).unwrap();
    let second = master(&buffer, &MasteringParams::professional()).unwrap();

    assert_eq!(buffer, copy);
    assert_eq!(first, second);
}

#[test]
fn test_stage_set_decided_by_caller() {
    let buffer = create_sine_buffer(40.0, 0.5, 44100, 0.5);
    let params = MasteringParams::professional();

    let with_filters = master(&buffer, &params).unwrap();
    let without = refmaster::dsp::master_with(&buffer, &params, StageSet::DYNAMICS).unwrap();

    // The 30 Hz highpass takes some of the 40 Hz tone away
    assert!(with_filters.rms() < without.rms());
}

#[test]
fn test_empty_buffer_through_pipeline() {
    let empty = SampleBuffer::new(Vec::new(), 44100).unwrap();
    let reference = create_sine_buffer(440.0, 0.5, 44100, 0.1);

    let leveled = match_level(&empty, &reference).unwrap();
    let mastered = master(&leveled, &MasteringParams::professional()).unwrap();
    let png = render(&mastered, "Empty", QualityMode::High).unwrap();

    assert!(mastered.is_empty());
    assert!(!png.is_empty());
}

// === Resampling ===

#[test]
fn test_resample_identity() {
    let buffer = create_sine_buffer(440.0, 0.5, 44100, 0.25);
    assert_eq!(resample(&buffer, 44100).unwrap(), buffer);
}

#[test]
fn test_mismatched_rates_are_leveled_at_reference_rate() {
    let target = create_sine_buffer(440.0, 0.25, 48000, 1.0);
    let reference = create_sine_buffer(440.0, 0.5, 44100, 1.0);

    let leveled = match_level(&target, &reference).unwrap();

    assert_eq!(leveled.sample_rate(), 44100);
    assert_eq!(leveled.len(), 44100);
    assert!((leveled.rms() - reference.rms() * 0.8).abs() < 0.01);
}

// === File Round Trip ===

#[test]
fn test_load_master_export_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("input.wav");
    let mastered_path = dir.path().join("mastered.wav");

    let tone = create_sine_buffer(440.0, 0.5, 22050, 0.5);
    write_wav(&tone, &path, ExportFormat::new(24)).unwrap();

    let loaded = load_audio(&path).unwrap();
    assert_eq!(loaded.sample_rate(), 22050);
    assert_eq!(loaded.len(), tone.len());

    let mastered = master(&loaded, &MasteringParams::basic()).unwrap();
    write_wav(&mastered, &mastered_path, ExportFormat::default()).unwrap();

    let reloaded = load_audio(&mastered_path).unwrap();
    assert_eq!(reloaded.len(), mastered.len());
    assert!(reloaded.peak() <= SAFETY_PEAK + 1e-4);
}

// === Rendering ===

#[test]
fn test_decimated_series_matches_formula() {
    let len = 123_457;
    let samples: Vec<f32> = (0..len).map(|i| (i as f32 * 0.001).sin()).collect();

    for quality in [QualityMode::High, QualityMode::Fast] {
        let max_points = quality.max_points();
        let step = len / max_points;
        let points = decimate(&samples, max_points);

        assert_eq!(points.len(), (len + step - 1) / step);
        assert!(points.windows(2).all(|w| w[0].0 < w[1].0));
    }
}

#[test]
fn test_render_before_and_after() {
    let target = create_sine_buffer(220.0, 0.3, 44100, 1.0);
    let mastered = master(&target, &MasteringParams::professional()).unwrap();

    let before = render(&target, "Original Waveform", QualityMode::High).unwrap();
    let after = render(&mastered, "Mastered Waveform", QualityMode::High).unwrap();

    assert_eq!(&before[..4], b"\x89PNG");
    assert_eq!(&after[..4], b"\x89PNG");
    assert_ne!(before, after);
}
