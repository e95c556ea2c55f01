use std::time::Duration;

use serde::Deserialize;
use time::{format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime};

use crate::domain::SolarClock;

pub const DEFAULT_BASE_URL: &str = "https://api.sunrise-sunset.org/json";

#[derive(thiserror::Error, Debug)]
pub enum SolarApiError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status} for {date}: {body}")]
    Status {
        status: reqwest::StatusCode,
        date: Date,
        body: String,
    },
    #[error("api returned status '{status}' for {date}")]
    Api { status: String, date: Date },
    #[error("malformed response for {date}: {source}")]
    Decode {
        date: Date,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid {field} '{value}' for {date}")]
    Time {
        field: &'static str,
        value: String,
        date: Date,
    },
}

/// Sunrise and sunset for one calendar date, in UTC.
///
/// `None` means the sun does not rise (or set) that day at this latitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolarTimes {
    pub date: Date,
    pub sunrise: Option<SolarClock>,
    pub sunset: Option<SolarClock>,
}

/// `results` is an empty string on error responses, so it is decoded only
/// once `status` is `OK`.
#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    results: serde_json::Value,
    status: String,
}

#[derive(Deserialize)]
struct ApiResults {
    sunrise: String,
    sunset: String,
}

/// Client for the sunrise-sunset.org JSON API.
pub struct SunriseSunsetClient {
    http: reqwest::Client,
    base_url: String,
    latitude: f64,
    longitude: f64,
}

impl SunriseSunsetClient {
    pub fn new(
        base_url: impl Into<String>,
        latitude: f64,
        longitude: f64,
        timeout: Option<Duration>,
    ) -> Result<Self, SolarApiError> {
        let mut builder = reqwest::Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }

        Ok(Self {
            http: builder.build()?,
            base_url: base_url.into(),
            latitude,
            longitude,
        })
    }

    /// Fetch sunrise and sunset for `date` at the configured location.
    pub async fn solar_times(&self, date: Date) -> Result<SolarTimes, SolarApiError> {
        let date_param = date
            .format(format_description!("[year]-[month]-[day]"))
            .unwrap_or_else(|_| date.to_string());

        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("lat", self.latitude.to_string()),
                ("lng", self.longitude.to_string()),
                ("date", date_param),
                ("formatted", "0".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SolarApiError::Status { status, date, body });
        }

        parse_response(date, &body)
    }
}

fn parse_response(date: Date, body: &str) -> Result<SolarTimes, SolarApiError> {
    let parsed: ApiResponse =
        serde_json::from_str(body).map_err(|source| SolarApiError::Decode { date, source })?;

    if parsed.status != "OK" {
        return Err(SolarApiError::Api {
            status: parsed.status,
            date,
        });
    }
    let results: ApiResults =
        serde_json::from_value(parsed.results).map_err(|source| SolarApiError::Decode { date, source })?;

    Ok(SolarTimes {
        date,
        sunrise: parse_instant("sunrise", &results.sunrise, date)?,
        sunset: parse_instant("sunset", &results.sunset, date)?,
    })
}

/// With `formatted=0` the API reports the unix epoch when there is no event.
fn parse_instant(field: &'static str, value: &str, date: Date) -> Result<Option<SolarClock>, SolarApiError> {
    let at = OffsetDateTime::parse(value, &Rfc3339).map_err(|_| SolarApiError::Time {
        field,
        value: value.to_string(),
        date,
    })?;

    if at.year() == 1970 {
        return Ok(None);
    }
    Ok(Some(SolarClock::Instant(at)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        collections::HashMap,
        net::SocketAddr,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    };

    use axum::{extract::Query, extract::State, routing::get, Json, Router};
    use time::macros::{date, datetime};

    const OK_BODY: &str = r#"{
        "results": {
            "sunrise": "2023-07-04T12:47:01+00:00",
            "sunset": "2023-07-05T03:31:10+00:00",
            "solar_noon": "2023-07-04T20:09:05+00:00",
            "day_length": 53049
        },
        "status": "OK",
        "tzid": "UTC"
    }"#;

    async fn spawn_api(hits: Arc<AtomicUsize>) -> SocketAddr {
        async fn handler(
            State(hits): State<Arc<AtomicUsize>>,
            Query(params): Query<HashMap<String, String>>,
        ) -> Json<serde_json::Value> {
            hits.fetch_add(1, Ordering::SeqCst);
            let date = params.get("date").cloned().unwrap_or_default();
            let formatted = params.get("formatted").cloned().unwrap_or_default();
            Json(serde_json::json!({
                "results": {
                    "sunrise": format!("{date}T12:47:01+00:00"),
                    "sunset": format!("{date}T23:59:00+00:00"),
                    "formatted": formatted,
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

    #[test]
    fn parses_ok_response() {
        let times = parse_response(date!(2023-07-04), OK_BODY).unwrap();
        assert_eq!(
            times.sunrise,
            Some(SolarClock::Instant(datetime!(2023-07-04 12:47:01 UTC)))
        );
        assert_eq!(
            times.sunset,
            Some(SolarClock::Instant(datetime!(2023-07-05 03:31:10 UTC)))
        );
    }

    #[test]
    fn rejects_non_ok_status() {
        let body = r#"{"results": "", "status": "INVALID_DATE"}"#;
        let err = parse_response(date!(2023-07-04), body);
        assert!(matches!(err, Err(SolarApiError::Api { status, .. }) if status == "INVALID_DATE"));

        let body = r#"{"status": "INVALID_REQUEST"}"#;
        let err = parse_response(date!(2023-07-04), body);
        assert!(matches!(err, Err(SolarApiError::Api { status, .. }) if status == "INVALID_REQUEST"));
    }

    #[test]
    fn ok_status_without_results_is_a_decode_error() {
        let body = r#"{"results": "", "status": "OK"}"#;
        let err = parse_response(date!(2023-07-04), body);
        assert!(matches!(err, Err(SolarApiError::Decode { .. })));
    }

    #[test]
    fn polar_days_map_to_none() {
        let body = r#"{"results": {"sunrise": "1970-01-01T00:00:01+00:00", "sunset": "1970-01-01T00:00:01+00:00"}, "status": "OK"}"#;
        let times = parse_response(date!(2023-06-21), body).unwrap();
        assert_eq!(times.sunrise, None);
        assert_eq!(times.sunset, None);
    }

    #[test]
    fn rejects_unparsable_time() {
        let body = r#"{"results": {"sunrise": "7:27:02 AM", "sunset": "8:00:00 PM"}, "status": "OK"}"#;
        let err = parse_response(date!(2023-07-04), body);
        assert!(matches!(err, Err(SolarApiError::Time { field: "sunrise", .. })));
    }

    #[tokio::test]
    async fn client_queries_date_and_parses_body() {
        let hits = Arc::new(AtomicUsize::new(0));
        let addr = spawn_api(hits.clone()).await;
        let client = SunriseSunsetClient::new(format!("http://{addr}/json"), 37.77, -122.42, None).unwrap();

        let times = client.solar_times(date!(2023-07-04)).await.unwrap();
        assert_eq!(times.date, date!(2023-07-04));
        assert_eq!(
            times.sunrise,
            Some(SolarClock::Instant(datetime!(2023-07-04 12:47:01 UTC)))
        );
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn client_surfaces_http_errors() {
        let app = Router::new().route(
            "/json",
            get(|| async { (axum::http::StatusCode::SERVICE_UNAVAILABLE, "down") }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service()).await.unwrap();
        });

        let client = SunriseSunsetClient::new(format!("http://{addr}/json"), 0.0, 0.0, None).unwrap();
        let err = client.solar_times(date!(2023-07-04)).await;
        assert!(matches!(err, Err(SolarApiError::Status { body, .. }) if body == "down"));
    }
}
