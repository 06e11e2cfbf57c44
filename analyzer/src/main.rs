use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use workflow::config::{Overrides, WorkflowConfig};
use workflow::runner::{write_results, Runner};

mod generator;
mod ingest;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "XRF spectrum quantification driver")]
struct Args {
    /// Count files to analyze (flat text or `.json` payloads)
    #[arg(long = "sample", num_args = 1..)]
    samples: Vec<PathBuf>,
    /// Background spectrum subtracted from every sample
    #[arg(long)]
    background: Option<PathBuf>,
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    #[arg(long)]
    background_scale: Option<f64>,
    #[arg(long)]
    max_iterations: Option<usize>,
    #[arg(long)]
    tolerance: Option<f64>,
    /// Analyze a generated spectrum as well
    #[arg(long, default_value_t = false)]
    synthetic: bool,
    /// Seed for the generated spectrum
    #[arg(long)]
    seed: Option<u64>,
    /// Write JSON reports to this path
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let overrides = Overrides {
        samples: args.samples,
        background: args.background,
        output: args.output,
        background_scale: args.background_scale,
        max_iterations: args.max_iterations,
        tolerance: args.tolerance,
        synthetic: args.synthetic,
        seed: args.seed,
    };
    let workflow_config = if let Some(path) = args.workflow {
        WorkflowConfig::load(path)?.with_overrides(overrides)
    } else {
        WorkflowConfig::from_args(overrides)
    };

    let runner = Runner::new(workflow_config)?;
    let result = runner.run().context("running quantification workflow")?;

    for sample in &result.samples {
        let report = &sample.report;
        println!(
            "{} -> solver {} after {} iterations",
            report.header.source_name,
            if report.solver.converged { "converged" } else { "stopped" },
            report.solver.iterations
        );
        if let Some(centroid) = sample.footprint_centroid {
            println!("  footprint centroid {:.4}, {:.4}", centroid.lat, centroid.lon);
        }
        for (element, concentration) in &report.concentrations {
            let ratio = sample
                .ratios
                .get(element)
                .map(|ratio| format!("  {}/{} {}", element, sample.ratio_reference, ratio))
                .unwrap_or_default();
            println!(
                "  {:<2} I={:>10.3} C={:.5}{}",
                element,
                report.intensity(*element),
                concentration,
                ratio
            );
        }
    }

    if let Some(path) = &runner.config().output {
        write_results(path, &result)?;
        log::info!("reports written to {}", path.display());
    }
    log::info!("run metrics {:?}", result.metrics);

    Ok(())
}
