use anyhow::{anyhow, Context};
use std::fs;
use std::path::Path;
use xrfcore::interface::SpectrumPayload;
use xrfcore::{Spectrum, SpectrumHeader};

/// Parses flat count text: numbers separated by whitespace or commas, with
/// `#` starting a comment that runs to the end of the line.
pub fn parse_counts(text: &str) -> anyhow::Result<Vec<f64>> {
    let mut counts = Vec::new();
    for (line_index, line) in text.lines().enumerate() {
        let data = line.split('#').next().unwrap_or_default();
        for token in data
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|token| !token.is_empty())
        {
            let value: f64 = token.parse().map_err(|_| {
                anyhow!("line {}: `{}` is not a count", line_index + 1, token)
            })?;
            counts.push(value);
        }
    }
    Ok(counts)
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Loads a spectrum from a `.json` payload or a flat count file.
///
/// Flat files, and payloads without their own calibration, are calibrated at
/// `kev_per_channel`.
pub fn load_spectrum<P: AsRef<Path>>(path: P, kev_per_channel: f64) -> anyhow::Result<Spectrum> {
    let path_ref = path.as_ref();
    let contents = fs::read_to_string(path_ref)
        .with_context(|| format!("reading spectrum {}", path_ref.display()))?;

    let spectrum = if is_json(path_ref) {
        let mut payload: SpectrumPayload = serde_json::from_str(&contents)
            .with_context(|| format!("parsing spectrum payload {}", path_ref.display()))?;
        if payload.header.source_name.is_empty() {
            payload.header.source_name = file_label(path_ref);
        }
        payload.into_spectrum(kev_per_channel)
    } else {
        let counts = parse_counts(&contents)
            .with_context(|| format!("parsing counts {}", path_ref.display()))?;
        Spectrum::with_calibration(
            counts,
            kev_per_channel,
            SpectrumHeader::named(file_label(path_ref)),
        )
    };

    let spectrum =
        spectrum.with_context(|| format!("validating spectrum {}", path_ref.display()))?;
    log::debug!(
        "loaded {} ({} channels)",
        spectrum.header().source_name,
        spectrum.len()
    );
    Ok(spectrum)
}
