mod config;
mod report;
mod source;

use std::{fs::File, io::BufWriter, path::Path};

use anyhow::Context;
use config::{ModuleConfig, SourceConfig};
use report::CsvReport;
use source::{CameraSource, ImageFolderSource};
use vision::{CandleClassifier, FrameController, FrameSource};

fn main() -> anyhow::Result<()> {
    setup_logging();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading config from {path}");
            ModuleConfig::load(Path::new(&path))?
        }
        None => {
            log::info!("No config given, using defaults");
            ModuleConfig::default()
        }
    };
    let vision_config = config.vision;
    let class_names = vision_config.class_names.clone();

    log::info!("Opening frame source");
    let mut source: Box<dyn FrameSource> = match &config.source {
        SourceConfig::Camera { index, width, height } => Box::new(CameraSource::open(*index, *width, *height)?),
        SourceConfig::Images { dir } => Box::new(ImageFolderSource::open(dir, &class_names)?),
    };

    log::info!("Loading classifier");
    let classifier = CandleClassifier::load(
        &config.weights,
        vision_config.tensor.len(),
        config.hidden_dim,
        vision_config.class_count(),
    )?;
    let mut controller = FrameController::new(vision_config, classifier)?;

    let file = File::create(&config.report_path)
        .with_context(|| format!("Failed to create report {}", config.report_path.display()))?;
    let mut report = CsvReport::new(BufWriter::new(file), &class_names)?;

    log::info!("Starting main loop");
    let summary = controller.run(source.as_mut(), config.frame_limit, |record| report.write_record(record))?;
    report.write_summary(&summary)?;

    match summary.accuracy() {
        Some(accuracy) => log::info!("Accuracy over {} displayed frames: {accuracy:.2}%", summary.judged),
        None => log::info!("No labelled frames, accuracy not available"),
    }
    log::info!(
        "Frame rate {:.2} fps, processing rate {:.2} fps, classification rate {:.2} fps",
        summary.frame_rate(),
        summary.processing_rate(),
        summary.classification_rate()
    );
    log::info!(
        "Mean uncertainty time {:?} ({:?} per classification), mean window time {:?} ({:?} per classification)",
        summary.mean_uncertainty_time(),
        summary.mean_uncertainty_latency(),
        summary.mean_smoothing_time(),
        summary.mean_smoothing_latency()
    );
    log::info!("Report written to {}", config.report_path.display());

    Ok(())
}

fn setup_logging() {
    simple_log::quick!();
}
