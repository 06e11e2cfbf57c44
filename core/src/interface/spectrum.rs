use crate::prelude::{XrfError, XrfResult, CHANNEL_COUNT, KEV_PER_CHANNEL, LEGACY_CHANNEL_COUNT};
use serde::{Deserialize, Serialize};

/// Latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// Ground footprint of an observation, given by its four corners `V0..V3`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Footprint {
    pub corners: [GeoPoint; 4],
}

impl Footprint {
    pub fn centroid(&self) -> GeoPoint {
        let lat = self.corners.iter().map(|c| c.lat).sum::<f64>() / 4.0;
        let lon = self.corners.iter().map(|c| c.lon).sum::<f64>() / 4.0;
        GeoPoint { lat, lon }
    }
}

/// Header metadata carried alongside the counts; never interpreted by the core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpectrumHeader {
    pub source_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footprint: Option<Footprint>,
}

impl SpectrumHeader {
    pub fn named(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            ..Default::default()
        }
    }
}

/// Per-channel counts with a linear energy calibration.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    counts: Vec<f64>,
    kev_per_channel: f64,
    header: SpectrumHeader,
}

impl Spectrum {
    /// Builds a spectrum with the reference calibration.
    pub fn new(counts: Vec<f64>, header: SpectrumHeader) -> XrfResult<Self> {
        Self::with_calibration(counts, KEV_PER_CHANNEL, header)
    }

    /// Builds a spectrum in the instrument layout, padding the legacy
    /// half-length layout with zeros.
    pub fn with_calibration(
        mut counts: Vec<f64>,
        kev_per_channel: f64,
        header: SpectrumHeader,
    ) -> XrfResult<Self> {
        match counts.len() {
            CHANNEL_COUNT => {}
            LEGACY_CHANNEL_COUNT => counts.resize(CHANNEL_COUNT, 0.0),
            other => {
                return Err(XrfError::Format {
                    source_name: header.source_name,
                    reason: format!(
                        "expected {} channels (or legacy {}), got {}",
                        CHANNEL_COUNT, LEGACY_CHANNEL_COUNT, other
                    ),
                })
            }
        }
        Self::from_counts(counts, kev_per_channel, header)
    }

    /// Builds a spectrum of any non-empty length, for detectors other than
    /// the reference one. Counts must be finite and non-negative.
    pub fn from_counts(
        counts: Vec<f64>,
        kev_per_channel: f64,
        header: SpectrumHeader,
    ) -> XrfResult<Self> {
        let format_error = |reason: String| XrfError::Format {
            source_name: header.source_name.clone(),
            reason,
        };

        if counts.is_empty() {
            return Err(format_error("no channels".into()));
        }
        if !(kev_per_channel.is_finite() && kev_per_channel > 0.0) {
            return Err(format_error(format!(
                "energy calibration must be positive, got {} keV/channel",
                kev_per_channel
            )));
        }
        if let Some((channel, value)) = counts
            .iter()
            .enumerate()
            .find(|(_, v)| !v.is_finite() || **v < 0.0)
        {
            return Err(format_error(format!(
                "channel {} holds invalid count {}",
                channel, value
            )));
        }

        Ok(Self {
            counts,
            kev_per_channel,
            header,
        })
    }

    /// Wraps counts produced by a stage; only the length is enforced.
    pub(crate) fn derived(counts: Vec<f64>, template: &Spectrum) -> Self {
        Self {
            counts,
            kev_per_channel: template.kev_per_channel,
            header: template.header.clone(),
        }
    }

    pub fn counts(&self) -> &[f64] {
        &self.counts
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn kev_per_channel(&self) -> f64 {
        self.kev_per_channel
    }

    pub fn header(&self) -> &SpectrumHeader {
        &self.header
    }

    /// Whether this spectrum was calibrated at `kev_per_channel`, up to
    /// floating-point round-off.
    pub fn is_calibrated_at(&self, kev_per_channel: f64) -> bool {
        (self.kev_per_channel - kev_per_channel).abs() <= 1e-12 * kev_per_channel.abs()
    }

    /// Energy of the lower edge of `channel` in keV.
    pub fn energy(&self, channel: usize) -> f64 {
        channel as f64 * self.kev_per_channel
    }

    /// Channel containing `energy_kev`, truncated towards zero.
    pub fn channel_of(&self, energy_kev: f64) -> usize {
        if energy_kev <= 0.0 || !energy_kev.is_finite() {
            0
        } else {
            (energy_kev / self.kev_per_channel) as usize
        }
    }
}

/// Serialized form accepted by loaders: header plus a flat count array.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpectrumPayload {
    #[serde(default)]
    pub header: SpectrumHeader,
    pub counts: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kev_per_channel: Option<f64>,
}

impl SpectrumPayload {
    /// Builds the spectrum, using `default_kev_per_channel` when the payload
    /// carries no calibration of its own.
    pub fn into_spectrum(self, default_kev_per_channel: f64) -> XrfResult<Spectrum> {
        Spectrum::with_calibration(
            self.counts,
            self.kev_per_channel.unwrap_or(default_kev_per_channel),
            self.header,
        )
    }
}
