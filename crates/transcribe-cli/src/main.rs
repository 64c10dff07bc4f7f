use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use transcribe_core::{build_report, transcribe as run_pipeline, ModelSize, PipelineConfig};
use transcribe_yin::YinEstimator;

/// Transcribe a monophonic vocal recording into MIDI and a JSON report.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Input WAV file: 16 kHz, mono.
    input: PathBuf,

    /// Output directory. Defaults to the input file's directory.
    #[arg(short, long)]
    out_dir: Option<PathBuf>,

    /// Optional TOML config file overriding pipeline defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    run(&cli)
}

fn run(cli: &Cli) -> Result<()> {
    let (knobs, sources) = match &cli.config {
        Some(path) => transcribe_config::load_from(path).context("failed to load config file")?,
        None => transcribe_config::load().context("failed to load config")?,
    };
    if let Some(file) = &sources.file {
        tracing::info!(?file, "loaded config overrides");
    }

    let (samples, sample_rate) = read_wav(&cli.input)?;
    if sample_rate != 16_000 {
        bail!("expected a 16 kHz WAV file, got {sample_rate} Hz");
    }

    let pipeline_config = PipelineConfig {
        confidence_threshold: knobs.confidence_threshold,
        energy_percentile: knobs.energy_percentile,
        pitch_median_window: knobs.pitch_median_window,
        vibrato_smooth_window: knobs.vibrato_smooth_window,
        vibrato_extent_cents: knobs.vibrato_extent_cents,
        note_merge_max_gap_s: knobs.note_merge_max_gap,
        post_merge_min_duration_s: knobs.post_merge_min_duration,
        onset_lookback_frames: knobs.onset_lookback_frames,
        key_window_seconds: knobs.key_window_seconds,
        key_overlap_seconds: knobs.key_overlap_seconds,
        key_outlier_max_duration_s: knobs.key_outlier_max_duration,
        key_outlier_max_confidence: knobs.key_outlier_max_confidence,
        enable_key_filter: true,
    };

    // The estimator runs on the same trimmed audio the pipeline will derive
    // internally; preprocessing is deterministic, so re-deriving it here
    // keeps frame alignment without threading trimmed samples through the
    // public API.
    let (trimmed, _offset) = transcribe_core::preprocess(&samples);
    let estimator = YinEstimator::new();
    let pitch_frames = estimator_frames_to_pitch_frames(&estimator, &trimmed, sample_rate);

    let audio_duration_s = samples.len() as f64 / sample_rate as f64;
    let result = run_pipeline(&samples, &pitch_frames, &pipeline_config).context("transcription failed")?;

    tracing::info!(n_notes = result.notes.len(), "transcription complete");

    let report = build_report(
        &result,
        Some(cli.input.display().to_string()),
        audio_duration_s,
        ModelSize::Full,
        pipeline_config.confidence_threshold,
    );

    let out_dir = cli
        .out_dir
        .clone()
        .or_else(|| cli.input.parent().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));
    let stem = cli
        .input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());

    let midi_path = out_dir.join(format!("{stem}.mid"));
    let json_path = out_dir.join(format!("{stem}.json"));

    let midi_bytes = transcribe_midi::notes_to_midi(&result.notes);
    std::fs::write(&midi_path, midi_bytes).with_context(|| format!("writing {}", midi_path.display()))?;

    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(&json_path, json).with_context(|| format!("writing {}", json_path.display()))?;

    println!("wrote {} notes to {}", result.notes.len(), midi_path.display());
    println!("wrote report to {}", json_path.display());

    Ok(())
}

/// Read a WAV file as mono `f32` samples in `[-1.0, 1.0]`.
fn read_wav(path: &std::path::Path) -> Result<(Vec<f32>, u32)> {
    let mut reader = hound::WavReader::open(path).with_context(|| format!("opening {}", path.display()))?;
    let spec = reader.spec();

    if spec.channels != 1 {
        bail!("expected mono audio, got {} channels", spec.channels);
    }

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<std::result::Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    Ok((samples, spec.sample_rate))
}

/// Run the estimator and zip its frames with the fixed 10 ms timestamps the
/// pipeline expects.
fn estimator_frames_to_pitch_frames(estimator: &YinEstimator, trimmed: &[f32], sample_rate: u32) -> Vec<transcribe_core::PitchFrame> {
    use transcribe_core::{EstimatedFrame, PitchFrame, PitchRange};
    let frames: Vec<EstimatedFrame> = transcribe_core::PitchEstimator::estimate(estimator, trimmed, sample_rate, PitchRange::default());

    frames
        .into_iter()
        .enumerate()
        .map(|(i, f)| PitchFrame {
            time_s: i as f64 * 0.01,
            frequency_hz: f.frequency_hz,
            confidence: f.periodicity,
        })
        .collect()
}
