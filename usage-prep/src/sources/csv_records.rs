use std::{fs::File, path::PathBuf};

use csv::StringRecord;

use super::csv_fields::row_of;
use crate::pipeline::{Envelope, EnvelopeStream, PipelineError, Source};

/// Untyped CSV rows, passed through with every column intact.
pub struct CsvRecordFileSource {
    path: PathBuf,
}

impl CsvRecordFileSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Read just the header row.
    pub fn headers(&self) -> Result<StringRecord, PipelineError> {
        let file = File::open(&self.path)
            .map_err(|e| PipelineError::Source(format!("failed to open CSV {}: {e}", self.path.display())))?;
        let mut rdr = csv::Reader::from_reader(file);
        rdr.headers()
            .cloned()
            .map_err(|e| PipelineError::Source(format!("failed to read CSV headers: {e}")))
    }
}

#[async_trait::async_trait]
impl Source<StringRecord> for CsvRecordFileSource {
    async fn stream(&self) -> EnvelopeStream<StringRecord> {
        let path = self.path.clone();
        let s = async_stream::try_stream! {
            let file = File::open(&path)
                .map_err(|e| PipelineError::Source(format!("failed to open CSV {}: {e}", path.display())))?;
            let mut rdr = csv::Reader::from_reader(file);

            for result in rdr.records() {
                let record = result
                    .map_err(|e| PipelineError::Source(format!("failed to read CSV record: {e}")))?;
                let row = row_of(&record);
                yield Envelope::new(record, row);
            }
        };

        Box::pin(s)
    }
}
