use crate::generator::profile::GeneratorConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use xrfcore::{AnalysisConfig, Element};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub samples: Vec<PathBuf>,
    pub background: Option<PathBuf>,
    pub output: Option<PathBuf>,
    /// Element every other concentration is reported against.
    pub ratio_reference: Element,
    /// Generated spectrum analyzed alongside the sample files.
    pub synthetic: Option<GeneratorConfig>,
    pub analysis: AnalysisConfig,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            samples: Vec::new(),
            background: None,
            output: None,
            ratio_reference: Element::Si,
            synthetic: None,
            analysis: AnalysisConfig::default(),
        }
    }
}

/// Command-line values that take precedence over the workflow file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub samples: Vec<PathBuf>,
    pub background: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub background_scale: Option<f64>,
    pub max_iterations: Option<usize>,
    pub tolerance: Option<f64>,
    pub synthetic: bool,
    pub seed: Option<u64>,
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(overrides: Overrides) -> Self {
        Self::default().with_overrides(overrides)
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.samples.extend(overrides.samples);
        if overrides.background.is_some() {
            self.background = overrides.background;
        }
        if overrides.output.is_some() {
            self.output = overrides.output;
        }
        if let Some(scale) = overrides.background_scale {
            self.analysis.background_scale = scale;
        }
        if let Some(max_iterations) = overrides.max_iterations {
            self.analysis.max_iterations = max_iterations;
        }
        if let Some(tolerance) = overrides.tolerance {
            self.analysis.tolerance = tolerance;
        }
        if overrides.synthetic && self.synthetic.is_none() {
            self.synthetic = Some(GeneratorConfig::default());
        }
        if let (Some(seed), Some(generator)) = (overrides.seed, self.synthetic.as_mut()) {
            generator.seed = seed;
        }
        self
    }

    pub fn to_analysis_config(&self) -> AnalysisConfig {
        self.analysis.clone()
    }
}
