use anyhow::Context;
use chrono::Utc;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::{Path, PathBuf};
use tracing::debug;

fn mono_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// Write a captured utterance into `dir` as a timestamped WAV file
pub fn dump_capture<P: AsRef<Path>>(
    dir: P,
    samples: &[i16],
    sample_rate: u32,
) -> anyhow::Result<PathBuf> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let path = dir.join(format!(
        "capture-{}.wav",
        Utc::now().format("%Y%m%d-%H%M%S%.3f")
    ));

    let mut writer = WavWriter::create(&path, mono_spec(sample_rate))
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for &sample in samples {
        writer.write_sample(sample).context("Failed to write sample")?;
    }
    writer.finalize().context("Failed to finalize WAV file")?;

    debug!("Wrote {} samples to {}", samples.len(), path.display());
    Ok(path)
}
