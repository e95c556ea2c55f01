use std::collections::HashMap;

use csv::StringRecord;
use time::Date;
use tokio::sync::Mutex;
use usage_client::{
    api::{SolarTimes, SunriseSunsetClient},
    timefmt,
};

use crate::pipeline::{Envelope, PipelineError, Transform};

/// Where the fetcher reads the date from and writes the solar times to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    interval_start: usize,
    sunrise: usize,
    sunset: usize,
    width: usize,
}

impl RecordLayout {
    /// Resolve the layout for `input` headers and return the output header.
    ///
    /// Existing `sunrise`/`sunset` columns are overwritten in place; missing
    /// ones are appended.
    pub fn for_headers(input: &StringRecord) -> Result<(Self, StringRecord), PipelineError> {
        let find = |name: &str| input.iter().position(|h| h.trim().eq_ignore_ascii_case(name));

        let interval_start = find("interval_start")
            .ok_or_else(|| PipelineError::Source("missing column 'interval_start' in CSV header".to_string()))?;

        let mut output = input.clone();
        let mut column = |name: &str| {
            find(name).unwrap_or_else(|| {
                output.push_field(name);
                output.len() - 1
            })
        };
        let sunrise = column("sunrise");
        let sunset = column("sunset");

        let width = output.len();
        Ok((
            Self {
                interval_start,
                sunrise,
                sunset,
                width,
            },
            output,
        ))
    }
}

/// Writes sunrise/sunset for each row's calendar date.
///
/// Each distinct date is looked up once; later rows for the same date reuse
/// the first answer.
pub struct SolarTimesAnnotation {
    client: SunriseSunsetClient,
    layout: RecordLayout,
    memo: Mutex<HashMap<Date, SolarTimes>>,
}

impl SolarTimesAnnotation {
    pub fn new(client: SunriseSunsetClient, layout: RecordLayout) -> Self {
        Self {
            client,
            layout,
            memo: Mutex::new(HashMap::new()),
        }
    }

    /// Number of distinct dates looked up so far.
    pub async fn dates_fetched(&self) -> usize {
        self.memo.lock().await.len()
    }

    async fn lookup(&self, date: Date) -> Result<SolarTimes, PipelineError> {
        // Held across the request so concurrent callers never fetch a date twice.
        let mut memo = self.memo.lock().await;
        if let Some(times) = memo.get(&date) {
            metrics::counter!("solar_api_cache_hits_total").increment(1);
            return Ok(*times);
        }

        metrics::counter!("solar_api_requests_total").increment(1);
        let times = self.client.solar_times(date).await.map_err(|e| {
            metrics::counter!("solar_api_errors_total").increment(1);
            PipelineError::Transform(format!("sunrise-sunset lookup failed: {e}"))
        })?;
        tracing::debug!(%date, sunrise = ?times.sunrise, sunset = ?times.sunset, "fetched solar times");

        memo.insert(date, times);
        Ok(times)
    }
}

#[async_trait::async_trait]
impl Transform<StringRecord, StringRecord> for SolarTimesAnnotation {
    async fn apply(&self, input: Envelope<StringRecord>) -> Result<Envelope<StringRecord>, PipelineError> {
        let row = input.row;
        let raw_start = input.payload.get(self.layout.interval_start).unwrap_or("");
        let date = timefmt::parse_wall_clock(raw_start)
            .map_err(|e| PipelineError::record(row, format!("invalid interval_start: {e}")))?
            .date();

        let times = self.lookup(date).await?;

        let mut fields: Vec<String> = input.payload.iter().map(str::to_string).collect();
        fields.resize(self.layout.width, String::new());
        fields[self.layout.sunrise] = times.sunrise.map(|s| s.to_string()).unwrap_or_default();
        fields[self.layout.sunset] = times.sunset.map(|s| s.to_string()).unwrap_or_default();

        Ok(Envelope::new(StringRecord::from(fields), row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        net::SocketAddr,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    };

    use axum::{extract::Query, extract::State, routing::get, Json, Router};

    async fn spawn_api(hits: Arc<AtomicUsize>) -> SocketAddr {
        async fn handler(
            State(hits): State<Arc<AtomicUsize>>,
            Query(params): Query<HashMap<String, String>>,
        ) -> Json<serde_json::Value> {
            hits.fetch_add(1, Ordering::SeqCst);
            let date = params.get("date").cloned().unwrap_or_default();
            Json(serde_json::json!({
                "results": {
                    "sunrise": format!("{date}T12:47:01+00:00"),
                    "sunset": format!("{date}T23:59:00+00:00"),
                },
                "status": "OK"
            }))
        }

        let app = Router::new().route("/json", get(handler)).with_state(hits);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service()).await.unwrap();
        });
        addr
    }

    fn record(fields: &[&str], row: u64) -> Envelope<StringRecord> {
        Envelope::new(StringRecord::from(fields.to_vec()), row)
    }

    #[test]
    fn layout_appends_missing_columns_and_reuses_existing() {
        let (layout, out) =
            RecordLayout::for_headers(&StringRecord::from(vec!["interval_start", "interval_kWh"])).unwrap();
        assert_eq!(out, StringRecord::from(vec!["interval_start", "interval_kWh", "sunrise", "sunset"]));
        assert_eq!((layout.sunrise, layout.sunset, layout.width), (2, 3, 4));

        let (layout, out) =
            RecordLayout::for_headers(&StringRecord::from(vec!["sunset", "interval_start", "sunrise"])).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!((layout.interval_start, layout.sunrise, layout.sunset), (1, 2, 0));

        assert!(RecordLayout::for_headers(&StringRecord::from(vec!["ts"])).is_err());
    }

    #[tokio::test]
    async fn one_request_per_distinct_date() {
        let hits = Arc::new(AtomicUsize::new(0));
        let addr = spawn_api(hits.clone()).await;
        let client = SunriseSunsetClient::new(format!("http://{addr}/json"), 37.77, -122.42, None).unwrap();
        let (layout, _) =
            RecordLayout::for_headers(&StringRecord::from(vec!["interval_start", "interval_kWh"])).unwrap();
        let annotate = SolarTimesAnnotation::new(client, layout);

        let rows = [
            ("2023-07-04 00:00:00-07:00", 2),
            ("2023-07-04 00:15:00-07:00", 3),
            ("2023-07-04 23:45:00-07:00", 4),
            ("2023-07-05 00:00:00-07:00", 5),
        ];
        let mut out = Vec::new();
        for (start, row) in rows {
            out.push(annotate.apply(record(&[start, "0.5"], row)).await.unwrap());
        }

        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(annotate.dates_fetched().await, 2);
        assert_eq!(&out[0].payload[2], "2023-07-04T12:47:01Z");
        assert_eq!(&out[0].payload[3], "2023-07-04T23:59:00Z");
        assert_eq!(&out[3].payload[2], "2023-07-05T12:47:01Z");
        assert_eq!(out[3].row, 5);
    }

    #[tokio::test]
    async fn bad_date_and_api_failure_are_errors() {
        let app = Router::new().route(
            "/json",
            get(|| async { Json(serde_json::json!({"status": "INVALID_REQUEST"})) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service()).await.unwrap();
        });

        let client = SunriseSunsetClient::new(format!("http://{addr}/json"), 0.0, 0.0, None).unwrap();
        let (layout, _) = RecordLayout::for_headers(&StringRecord::from(vec!["interval_start"])).unwrap();
        let annotate = SolarTimesAnnotation::new(client, layout);

        let err = annotate.apply(record(&["yesterday"], 2)).await;
        assert!(matches!(err, Err(PipelineError::Record { row: 2, .. })));

        let err = annotate.apply(record(&["2023-07-04 10:00"], 3)).await;
        assert!(matches!(err, Err(PipelineError::Transform(msg)) if msg.contains("INVALID_REQUEST")));
    }
}
