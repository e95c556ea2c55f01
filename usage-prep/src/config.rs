use serde::Deserialize;
use std::{fs, path::PathBuf, time::Duration};

pub const CONFIG_ENV: &str = "USAGE_PREP_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "usage-prep.toml";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct UsageConfig {
    pub path: PathBuf,
    /// Hours the property's local clock is behind UTC (8 for PST).
    pub hour_diff: i8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeatureConfig {
    #[serde(default)]
    pub rollup_hourly: bool,
    #[serde(default = "default_strict")]
    pub strict: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            rollup_hourly: false,
            strict: default_strict(),
        }
    }
}

fn default_strict() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct SolarConfig {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub timeout_secs: Option<u64>,
    /// Where the annotated usage file is written.
    pub output_path: PathBuf,
}

impl SolarConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

fn default_base_url() -> String {
    usage_client::api::DEFAULT_BASE_URL.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub textfile_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub usage: Option<UsageConfig>,
    pub weather: Option<WeatherConfig>,
    pub output: Option<OutputConfig>,
    #[serde(default)]
    pub features: FeatureConfig,
    pub solar: Option<SolarConfig>,
    pub metrics: Option<MetricsConfig>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        use std::env;

        let path = env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Read { path, source })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let cfg: AppConfig = toml::from_str(contents)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(usage) = &self.usage {
            if !(-14..=14).contains(&usage.hour_diff) {
                return Err(ConfigError::Invalid(format!(
                    "usage.hour_diff must be within -14..=14, got {}",
                    usage.hour_diff
                )));
            }
        }

        if let Some(solar) = &self.solar {
            if !(-90.0..=90.0).contains(&solar.latitude) {
                return Err(ConfigError::Invalid(format!(
                    "solar.latitude out of range: {}",
                    solar.latitude
                )));
            }
            if !(-180.0..=180.0).contains(&solar.longitude) {
                return Err(ConfigError::Invalid(format!(
                    "solar.longitude out of range: {}",
                    solar.longitude
                )));
            }
        }

        Ok(())
    }

    /// The `[usage]` section, required by the feature builder.
    pub fn usage(&self) -> Result<&UsageConfig, ConfigError> {
        section(&self.usage, "usage")
    }

    pub fn weather(&self) -> Result<&WeatherConfig, ConfigError> {
        section(&self.weather, "weather")
    }

    pub fn output(&self) -> Result<&OutputConfig, ConfigError> {
        section(&self.output, "output")
    }

    /// The `[solar]` section, required by the solar-time fetcher.
    pub fn solar(&self) -> Result<&SolarConfig, ConfigError> {
        section(&self.solar, "solar")
    }
}

fn section<'a, T>(value: &'a Option<T>, name: &str) -> Result<&'a T, ConfigError> {
    value
        .as_ref()
        .ok_or_else(|| ConfigError::Invalid(format!("missing [{name}] section")))
}
