use std::path::PathBuf;

use csv::StringRecord;
use futures::StreamExt;

use crate::pipeline::{Envelope, PipelineError, Sink};

/// Writes untyped rows under a fixed header.
pub struct CsvRecordSink {
    path: PathBuf,
    headers: StringRecord,
}

impl CsvRecordSink {
    pub fn new<P: Into<PathBuf>>(path: P, headers: StringRecord) -> Self {
        Self {
            path: path.into(),
            headers,
        }
    }
}

#[async_trait::async_trait]
impl Sink<StringRecord> for CsvRecordSink {
    async fn run<S>(&self, mut input: S) -> Result<(), PipelineError>
    where
        S: futures::Stream<Item = Result<Envelope<StringRecord>, PipelineError>> + Send + Unpin + 'static,
    {
        // Rows are buffered so a failed run never truncates the target, which
        // may be the very file being annotated.
        let mut rows = Vec::new();
        while let Some(item) = input.next().await {
            match item {
                Ok(env) => rows.push(env.payload),
                Err(e) => {
                    tracing::error!(error = %e, "error in upstream pipeline for CsvRecordSink");
                    return Err(e);
                }
            }
        }

        let mut wtr = csv::Writer::from_path(&self.path).map_err(|e| PipelineError::Sink(e.to_string()))?;
        wtr.write_record(&self.headers)
            .map_err(|e| PipelineError::Sink(e.to_string()))?;
        for row in &rows {
            wtr.write_record(row).map_err(|e| PipelineError::Sink(e.to_string()))?;
        }
        wtr.flush().map_err(|e| PipelineError::Sink(e.to_string()))?;

        tracing::info!(path = %self.path.display(), rows = rows.len(), "annotated usage written");
        Ok(())
    }
}
