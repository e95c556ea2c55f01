use anyhow::Result;
use std::sync::Arc;
use usage_client::domain::HourlyRecord;
use usage_prep::{
    config::AppConfig,
    metrics_export,
    observability,
    pipeline::Pipeline,
    sinks::FeatureCsvSink,
    sources::{HourlyFeatureSource, UsageCsvFileSource, WeatherCsvFileSource},
    transform::{self, FeatureOptions},
};

/// Build the model-ready hourly dataset from usage (with solar times) and
/// weather exports, as described by the config file.
#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();
    metrics_export::init();

    // Load configuration
    let cfg = AppConfig::load()?;
    let (usage, weather, output) = (cfg.usage()?, cfg.weather()?, cfg.output()?);

    let source = HourlyFeatureSource::new(
        UsageCsvFileSource::new(&usage.path),
        WeatherCsvFileSource::new(&weather.path),
        FeatureOptions {
            hour_diff: usage.hour_diff,
            rollup_hourly: cfg.features.rollup_hourly,
        },
        cfg.features.strict,
    )
    .with_usage_transforms(vec![Arc::new(transform::UsageIntervalValidation::default())]);

    let sink = FeatureCsvSink::new(&output.path);
    tracing::info!(
        usage = %usage.path.display(),
        weather = %weather.path.display(),
        output = %sink.path().display(),
        "building hourly features"
    );

    let pipeline: Pipeline<_, HourlyRecord, _> = Pipeline {
        source,
        transforms: Vec::new(),
        sink,
    };
    let result = pipeline.run().await;

    // Written for failed runs too.
    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_export::write_textfile(&metrics_cfg.textfile_path)?;
    }

    result?;
    Ok(())
}
