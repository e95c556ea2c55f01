pub mod features;
pub mod solar_times;

use crate::pipeline::{Envelope, PipelineError, Transform};
use time::macros::datetime;
use usage_client::domain::UsageInterval;

pub use features::{build_hourly_records, FeatureOptions, FeatureSet, FeatureStats};
pub use solar_times::{RecordLayout, SolarTimesAnnotation};

/// Pure validation of a `UsageInterval` record.
///
/// Rules:
/// - kWh must be finite (net-metered exports can be negative).
/// - interval_start must be within a broad sanity window [2000-01-01, 2100-01-01).
pub fn validate_usage_interval(env: Envelope<UsageInterval>) -> Result<Envelope<UsageInterval>, PipelineError> {
    let u = &env.payload;

    if !u.interval_kwh.is_finite() {
        return Err(PipelineError::record(env.row, "interval_kWh must be finite"));
    }

    let min_ts = datetime!(2000-01-01 00:00:00);
    let max_ts = datetime!(2100-01-01 00:00:00);

    if u.interval_start < min_ts || u.interval_start >= max_ts {
        return Err(PipelineError::record(env.row, "interval_start out of allowed range"));
    }

    Ok(env)
}

#[derive(Clone, Default)]
pub struct UsageIntervalValidation;

#[async_trait::async_trait]
impl Transform<UsageInterval, UsageInterval> for UsageIntervalValidation {
    async fn apply(&self, input: Envelope<UsageInterval>) -> Result<Envelope<UsageInterval>, PipelineError> {
        match validate_usage_interval(input) {
            Ok(env) => Ok(env),
            Err(e) => {
                metrics::counter!("validation_usage_interval_rejected_total").increment(1);
                Err(e)
            }
        }
    }
}
