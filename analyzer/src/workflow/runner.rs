use crate::generator::profile::{build_background, build_spectrum};
use crate::ingest::loader::load_spectrum;
use crate::workflow::config::WorkflowConfig;
use anyhow::{anyhow, Context};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use xrfcore::interface::{Footprint, GeoPoint, LineStatus};
use xrfcore::ratios::{element_ratios, ElementRatio};
use xrfcore::telemetry::{Metrics, MetricsRecorder};
use xrfcore::{AnalysisReport, Element, Spectrum, XrfPipeline};

/// Report for one sample plus its ratios against the reference element.
#[derive(Debug, Clone, Serialize)]
pub struct SampleResult {
    #[serde(flatten)]
    pub report: AnalysisReport,
    pub ratio_reference: Element,
    pub ratios: BTreeMap<Element, ElementRatio>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footprint_centroid: Option<GeoPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResult {
    pub samples: Vec<SampleResult>,
    pub metrics: Metrics,
}

/// Spectra resolved from the workflow: files first, then the synthetic one.
pub struct WorkflowInputs {
    pub samples: Vec<Spectrum>,
    pub background: Option<Spectrum>,
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
    pipeline: Arc<XrfPipeline>,
    metrics: Arc<MetricsRecorder>,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> anyhow::Result<Self> {
        let pipeline = XrfPipeline::new(config.to_analysis_config())
            .context("building quantification pipeline")?;
        Ok(Self {
            config,
            pipeline: Arc::new(pipeline),
            metrics: Arc::new(MetricsRecorder::new()),
        })
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics.snapshot()
    }

    pub fn load_inputs(&self) -> anyhow::Result<WorkflowInputs> {
        let kev_per_channel = self.config.analysis.kev_per_channel;
        let mut samples = self
            .config
            .samples
            .iter()
            .map(|path| load_spectrum(path, kev_per_channel))
            .collect::<anyhow::Result<Vec<_>>>()?;

        let mut background = match &self.config.background {
            Some(path) => Some(load_spectrum(path, kev_per_channel)?),
            None => None,
        };

        if let Some(generator) = &self.config.synthetic {
            samples.push(
                build_spectrum(generator, kev_per_channel)
                    .context("generating synthetic sample")?,
            );
            if background.is_none() {
                background = build_background(generator, kev_per_channel)
                    .context("generating synthetic background")?;
            }
        }

        if samples.is_empty() {
            anyhow::bail!("no samples to analyze; pass --sample or --synthetic");
        }
        Ok(WorkflowInputs {
            samples,
            background,
        })
    }

    /// Analyzes one sample and records the outcome in the run metrics.
    pub fn analyze(
        &self,
        sample: &Spectrum,
        background: Option<&Spectrum>,
    ) -> anyhow::Result<SampleResult> {
        let source = &sample.header().source_name;
        let outcome = self.pipeline.analyze_sample(sample, background);
        let report = match outcome {
            Ok(report) => report,
            Err(err) => {
                self.metrics.record_error();
                return Err(err).with_context(|| format!("analyzing sample {}", source));
            }
        };

        let degraded = report
            .lines
            .iter()
            .filter(|line| matches!(line.status, LineStatus::Degraded { .. }))
            .count();
        let skipped = report
            .lines
            .iter()
            .filter(|line| matches!(line.status, LineStatus::Skipped { .. }))
            .count();
        self.metrics
            .record_analysis(degraded, skipped, report.solver.converged);

        let ratio_reference = self.config.ratio_reference;
        let ratios = element_ratios(&report, ratio_reference);
        let footprint_centroid = report.header.footprint.as_ref().map(Footprint::centroid);
        Ok(SampleResult {
            report,
            ratio_reference,
            ratios,
            footprint_centroid,
        })
    }

    /// Analyzes every sample on its own scoped thread; results keep input order.
    pub fn execute(&self, inputs: &WorkflowInputs) -> anyhow::Result<WorkflowResult> {
        let background = inputs.background.as_ref();
        let outcomes: Vec<anyhow::Result<SampleResult>> = std::thread::scope(|scope| {
            let handles: Vec<_> = inputs
                .samples
                .iter()
                .map(|sample| scope.spawn(move || self.analyze(sample, background)))
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|_| Err(anyhow!("analysis worker panicked")))
                })
                .collect()
        });

        let samples = outcomes.into_iter().collect::<anyhow::Result<Vec<_>>>()?;
        Ok(WorkflowResult {
            samples,
            metrics: self.metrics.snapshot(),
        })
    }

    pub fn run(&self) -> anyhow::Result<WorkflowResult> {
        let inputs = self.load_inputs()?;
        self.execute(&inputs)
    }
}

pub fn write_results<P: AsRef<Path>>(path: P, result: &WorkflowResult) -> anyhow::Result<()> {
    let path_ref = path.as_ref();
    if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(result).context("serializing analysis results")?;
    fs::write(path_ref, json)
        .with_context(|| format!("writing analysis results {}", path_ref.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::GeneratorConfig;
    use crate::workflow::config::Overrides;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use xrfcore::interface::SpectrumPayload;
    use xrfcore::prelude::KEV_PER_CHANNEL;
    use xrfcore::XrfError;

    fn synthetic_config() -> WorkflowConfig {
        WorkflowConfig::from_args(Overrides {
            synthetic: true,
            seed: Some(5),
            ..Default::default()
        })
    }

    #[test]
    fn runner_executes_synthetic_workflow() {
        let runner = Runner::new(synthetic_config()).unwrap();
        let result = runner.run().unwrap();
        assert_eq!(result.samples.len(), 1);

        let sample = &result.samples[0];
        let total: f64 = sample.report.concentrations.values().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(sample.report.header.source_name, "synthetic-seed-5");
        assert!(sample.report.intensity(Element::Fe) > 0.0);
        assert!(!sample.ratios.contains_key(&Element::Si));
        assert_eq!(result.metrics.analyzed, 1);
        assert_eq!(result.metrics.errors, 0);
    }

    #[test]
    fn batch_preserves_input_order() {
        let runner = Runner::new(WorkflowConfig::default()).unwrap();
        let samples: Vec<Spectrum> = (0..4)
            .map(|seed| {
                build_spectrum(
                    &GeneratorConfig {
                        seed,
                        ..Default::default()
                    },
                    KEV_PER_CHANNEL,
                )
                .unwrap()
            })
            .collect();
        let inputs = WorkflowInputs {
            samples,
            background: None,
        };
        let result = runner.execute(&inputs).unwrap();
        let names: Vec<_> = result
            .samples
            .iter()
            .map(|s| s.report.header.source_name.as_str())
            .collect();
        assert_eq!(
            names,
            ["synthetic-seed-0", "synthetic-seed-1", "synthetic-seed-2", "synthetic-seed-3"]
        );
        assert_eq!(runner.metrics().analyzed, 4);
    }

    #[test]
    fn mismatched_background_fails_with_context() {
        let runner = Runner::new(WorkflowConfig::default()).unwrap();
        let sample = build_spectrum(&GeneratorConfig::default(), KEV_PER_CHANNEL).unwrap();
        let background = Spectrum::from_counts(
            vec![1.0; 100],
            KEV_PER_CHANNEL,
            xrfcore::SpectrumHeader::named("short-bg"),
        )
        .unwrap();
        let inputs = WorkflowInputs {
            samples: vec![sample],
            background: Some(background),
        };
        let err = runner.execute(&inputs).unwrap_err();
        assert!(err.to_string().contains("analyzing sample synthetic-seed-0"));
        assert!(matches!(
            err.downcast_ref::<XrfError>(),
            Some(XrfError::LengthMismatch { .. })
        ));
        assert_eq!(runner.metrics().errors, 1);
    }

    #[test]
    fn empty_workflow_is_rejected() {
        let runner = Runner::new(WorkflowConfig::default()).unwrap();
        assert!(runner.run().is_err());
    }

    #[test]
    fn invalid_analysis_config_is_rejected() {
        let mut config = WorkflowConfig::default();
        config.analysis.tolerance = -1.0;
        let err = Runner::new(config).err().unwrap();
        assert!(err.to_string().contains("building quantification pipeline"));
    }

    #[test]
    fn results_are_written_as_json() {
        let mut sample = NamedTempFile::new().unwrap();
        let counts: Vec<String> = build_spectrum(&GeneratorConfig::default(), KEV_PER_CHANNEL)
            .unwrap()
            .counts()
            .iter()
            .map(|v| format!("{:.3}", v))
            .collect();
        sample.write_all(counts.join("\n").as_bytes()).unwrap();

        let mut config = WorkflowConfig::default();
        config.samples.push(sample.path().to_path_buf());
        let runner = Runner::new(config).unwrap();
        let result = runner.run().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("reports").join("run.json");
        write_results(&output, &result).unwrap();
        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written["samples"].as_array().map(|a| a.len()), Some(1));
        assert!(written["samples"][0]["concentrations"]["Fe"].is_number());
        assert_eq!(written["samples"][0]["ratio_reference"], "Si");
        assert_eq!(written["metrics"]["analyzed"], 1);
    }

    #[test]
    fn footprint_centroid_is_reported() {
        let counts = build_spectrum(&GeneratorConfig::default(), KEV_PER_CHANNEL)
            .unwrap()
            .counts()
            .to_vec();
        let mut payload = SpectrumPayload {
            header: xrfcore::SpectrumHeader::named("orbit-12"),
            counts,
            kev_per_channel: None,
        };
        payload.header.footprint = Some(Footprint {
            corners: [
                GeoPoint { lat: 10.0, lon: 20.0 },
                GeoPoint { lat: 12.0, lon: 20.0 },
                GeoPoint { lat: 12.0, lon: 24.0 },
                GeoPoint { lat: 10.0, lon: 24.0 },
            ],
        });
        let sample = payload.into_spectrum(KEV_PER_CHANNEL).unwrap();

        let runner = Runner::new(WorkflowConfig::default()).unwrap();
        let result = runner.analyze(&sample, None).unwrap();
        assert_eq!(result.footprint_centroid, Some(GeoPoint { lat: 11.0, lon: 22.0 }));
    }

    #[test]
    fn configured_calibration_reaches_synthetic_inputs() {
        let mut config = synthetic_config();
        config.analysis.kev_per_channel = 0.02;
        let runner = Runner::new(config).unwrap();
        let inputs = runner.load_inputs().unwrap();
        assert!(inputs.samples.iter().all(|s| s.kev_per_channel() == 0.02));
        let result = runner.execute(&inputs).unwrap();
        assert!(result.samples[0].report.intensity(Element::Fe) > 0.0);
    }
}
