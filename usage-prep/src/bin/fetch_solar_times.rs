use anyhow::{bail, Result};
use std::{env, sync::Arc};
use usage_client::api::SunriseSunsetClient;
use usage_prep::{
    config::AppConfig,
    metrics_export,
    observability,
    pipeline::{Pipeline, Transform},
    sinks::CsvRecordSink,
    sources::CsvRecordFileSource,
    transform::{RecordLayout, SolarTimesAnnotation},
};

/// Annotate a usage export with sunrise/sunset for each row's date.
///
/// Usage:
///   fetch_solar_times <usage_csv_path>
///
/// Location, API endpoint and output path come from the `[solar]` config section.
#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();
    metrics_export::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: fetch_solar_times <usage_csv_path>");
    }
    let file_path = &args[1];

    let cfg = AppConfig::load()?;
    let solar = cfg.solar()?;

    let source = CsvRecordFileSource::new(file_path);
    let (layout, output_headers) = RecordLayout::for_headers(&source.headers()?)?;

    let client = SunriseSunsetClient::new(&solar.base_url, solar.latitude, solar.longitude, solar.timeout())?;
    let annotate = Arc::new(SolarTimesAnnotation::new(client, layout));

    let pipeline: Pipeline<_, csv::StringRecord, _> = Pipeline {
        source,
        transforms: vec![annotate.clone() as Arc<dyn Transform<csv::StringRecord, csv::StringRecord> + Send + Sync>],
        sink: CsvRecordSink::new(&solar.output_path, output_headers),
    };
    let result = pipeline.run().await;

    tracing::info!(
        dates = annotate.dates_fetched().await,
        latitude = solar.latitude,
        longitude = solar.longitude,
        "solar time lookups finished"
    );
    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_export::write_textfile(&metrics_cfg.textfile_path)?;
    }

    result?;
    Ok(())
}
