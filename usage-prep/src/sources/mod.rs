pub mod csv_fields;
pub mod csv_records;
pub mod hourly_features;
pub mod usage_csv_file;
pub mod weather_csv_file;

pub use csv_records::CsvRecordFileSource;
pub use hourly_features::HourlyFeatureSource;
pub use usage_csv_file::UsageCsvFileSource;
pub use weather_csv_file::WeatherCsvFileSource;
