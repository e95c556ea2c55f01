pub mod csv_records;
pub mod feature_csv;

pub use csv_records::CsvRecordSink;
pub use feature_csv::FeatureCsvSink;
