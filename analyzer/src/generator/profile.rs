use anyhow::{ensure, Context};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use xrfcore::prelude::CHANNEL_COUNT;
use xrfcore::{Element, Spectrum, SpectrumHeader};

/// Relative height of every line after an element's first (Kb against Ka).
const SECONDARY_LINE_RATIO: f64 = 0.15;

/// Configuration for generating synthetic XRF spectra.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Peak height in counts of each element's first line.
    pub peaks: BTreeMap<Element, f64>,
    pub sigma_kev: f64,
    /// Flat continuum under the peaks, in counts.
    pub floor: f64,
    /// Upper bound of the uniform counting noise added to every channel.
    pub noise: f64,
    /// Level of a flat background spectrum generated alongside the sample.
    pub background_level: Option<f64>,
    pub seed: u64,
    pub description: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        let peaks = [
            (Element::Mg, 60.0),
            (Element::Al, 120.0),
            (Element::Si, 400.0),
            (Element::K, 40.0),
            (Element::Ca, 150.0),
            (Element::Ti, 30.0),
            (Element::Fe, 250.0),
        ]
        .into_iter()
        .collect();
        Self {
            peaks,
            sigma_kev: 0.05,
            floor: 2.0,
            noise: 1.0,
            background_level: None,
            seed: 0,
            description: None,
        }
    }
}

impl GeneratorConfig {
    fn check(&self) -> anyhow::Result<()> {
        ensure!(
            self.sigma_kev.is_finite() && self.sigma_kev > 0.0,
            "generator sigma_kev must be positive, got {}",
            self.sigma_kev
        );
        ensure!(
            self.floor.is_finite() && self.floor >= 0.0,
            "generator floor must be non-negative, got {}",
            self.floor
        );
        ensure!(
            self.noise.is_finite() && self.noise >= 0.0,
            "generator noise must be non-negative, got {}",
            self.noise
        );
        if let Some((element, height)) = self
            .peaks
            .iter()
            .find(|(_, height)| !(height.is_finite() && **height >= 0.0))
        {
            anyhow::bail!("generator peak for {} must be non-negative, got {}", element, height);
        }
        Ok(())
    }

    pub fn source_name(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| format!("synthetic-seed-{}", self.seed))
    }
}

fn gaussian(energy: f64, center: f64, sigma: f64) -> f64 {
    (-(energy - center).powi(2) / (2.0 * sigma * sigma)).exp()
}

fn build_count_vector(config: &GeneratorConfig, kev_per_channel: f64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let lines: Vec<(f64, f64)> = config
        .peaks
        .iter()
        .flat_map(|(element, &height)| {
            element.lines().iter().enumerate().map(move |(rank, line)| {
                let scale = if rank == 0 { 1.0 } else { SECONDARY_LINE_RATIO };
                (line.energy_kev, height * scale)
            })
        })
        .collect();

    (0..CHANNEL_COUNT)
        .map(|channel| {
            let energy = channel as f64 * kev_per_channel;
            let signal: f64 = lines
                .iter()
                .map(|&(center, height)| height * gaussian(energy, center, config.sigma_kev))
                .sum();
            let jitter = if config.noise > 0.0 {
                rng.gen_range(0.0..config.noise)
            } else {
                0.0
            };
            config.floor + signal + jitter
        })
        .collect()
}

/// Builds a sample spectrum in the reference layout, calibrated at
/// `kev_per_channel`.
pub fn build_spectrum(config: &GeneratorConfig, kev_per_channel: f64) -> anyhow::Result<Spectrum> {
    config.check()?;
    let counts = build_count_vector(config, kev_per_channel);
    Spectrum::with_calibration(counts, kev_per_channel, SpectrumHeader::named(config.source_name()))
        .context("assembling synthetic spectrum")
}

/// Builds the flat background spectrum, when one is configured.
pub fn build_background(
    config: &GeneratorConfig,
    kev_per_channel: f64,
) -> anyhow::Result<Option<Spectrum>> {
    let Some(level) = config.background_level else {
        return Ok(None);
    };
    ensure!(
        level.is_finite() && level >= 0.0,
        "generator background_level must be non-negative, got {}",
        level
    );
    let header = SpectrumHeader::named(format!("{}-background", config.source_name()));
    let spectrum = Spectrum::with_calibration(vec![level; CHANNEL_COUNT], kev_per_channel, header)
        .context("assembling synthetic background")?;
    Ok(Some(spectrum))
}
