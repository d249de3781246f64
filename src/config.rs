//! Configuration loader. Merges env vars, .env file, and config.toml.

use std::collections::HashSet;
use std::path::Path;

use common::config::{DashboardConfig, ForecastBasis, Units};
use common::{Error, Metric};

fn parse_positive_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    let parsed = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer > 0")))?;
    if parsed == 0 {
        return Err(Error::Config(format!("{env_name} must be an integer > 0")));
    }
    Ok(parsed)
}

fn validate_config(config: &DashboardConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    if config.resorts.is_empty() {
        issues.push("resorts must contain at least one resort".into());
    }
    let mut seen = HashSet::new();
    for resort in &config.resorts {
        if resort.id.as_str().trim().is_empty() {
            issues.push(format!("resort '{}' has an empty id", resort.name));
        } else if !seen.insert(resort.id.as_str()) {
            issues.push(format!("duplicate resort id '{}'", resort.id));
        }
        if !(-90.0..=90.0).contains(&resort.lat) || !(-180.0..=180.0).contains(&resort.lon) {
            issues.push(format!("resort '{}' has an invalid lat/lon", resort.id));
        }
    }

    if config.weather.base_url.trim().is_empty() {
        issues.push("weather.base_url must not be empty".into());
    }
    if config.weather.requests_per_minute == 0 {
        issues.push("weather.requests_per_minute must be > 0".into());
    } else if (config.weather.requests_per_minute as usize) < config.resorts.len() {
        // One request per resort per refresh.
        issues.push(format!(
            "weather.requests_per_minute ({}) must be >= the number of resorts ({})",
            config.weather.requests_per_minute,
            config.resorts.len()
        ));
    }
    if config.snow.snapshot.trim().is_empty() {
        issues.push("snow.snapshot must not be empty".into());
    }

    let t = &config.timing;
    if t.weather_refresh_secs == 0 {
        issues.push("timing.weather_refresh_secs must be > 0".into());
    }
    if t.snow_refresh_secs == 0 {
        issues.push("timing.snow_refresh_secs must be > 0".into());
    }
    if t.weather_fetch_timeout_secs == 0 {
        issues.push("timing.weather_fetch_timeout_secs must be > 0".into());
    }
    if t.snow_fetch_timeout_secs == 0 {
        issues.push("timing.snow_fetch_timeout_secs must be > 0".into());
    }
    if t.heartbeat_secs == 0 {
        issues.push("timing.heartbeat_secs must be > 0".into());
    }
    if t.weather_fetch_timeout_secs >= t.weather_refresh_secs {
        issues.push(
            "timing.weather_fetch_timeout_secs must be < timing.weather_refresh_secs".into(),
        );
    }
    if t.snow_fetch_timeout_secs >= t.snow_refresh_secs {
        issues.push("timing.snow_fetch_timeout_secs must be < timing.snow_refresh_secs".into());
    }

    if Metric::ALL
        .iter()
        .all(|m| config.weights.get(*m).unwrap_or(0.0) == 0.0)
    {
        issues.push("weights must give at least one metric a weight > 0".into());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Load dashboard configuration from environment and optional config file.
///
/// An explicit `path` must exist; otherwise `config.toml` is used when
/// present.
pub fn load_config(path: Option<&Path>) -> Result<DashboardConfig, Error> {
    // 1. Load .env file from project root or parent directories.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Start with defaults.
    let mut config = DashboardConfig::default();

    // 3. Try loading the config file.
    let config_path = path.unwrap_or_else(|| Path::new("config.toml"));
    if path.is_some() || config_path.exists() {
        let contents = std::fs::read_to_string(config_path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", config_path.display(), e))
        })?;
        config = toml::from_str(&contents).map_err(|e| {
            Error::Config(format!("Failed to parse {}: {}", config_path.display(), e))
        })?;
    }

    // 4. Override with environment variables (highest priority).
    if let Ok(key) = std::env::var("OPENWEATHER_API_KEY") {
        config.weather.api_key = key;
    }
    if let Ok(url) = std::env::var("WEATHER_API_URL") {
        config.weather.base_url = url.trim().to_string();
    }
    if let Ok(units) = std::env::var("WEATHER_UNITS") {
        config.weather.units = match units.trim().to_ascii_lowercase().as_str() {
            "imperial" => Units::Imperial,
            "metric" => Units::Metric,
            _ => {
                return Err(Error::Config(
                    "WEATHER_UNITS must be one of: imperial, metric".into(),
                ));
            }
        };
    }
    if let Ok(raw) = std::env::var("WEATHER_REQUESTS_PER_MINUTE") {
        let parsed = parse_positive_u64(&raw, "WEATHER_REQUESTS_PER_MINUTE")?;
        config.weather.requests_per_minute = u32::try_from(parsed).map_err(|_| {
            Error::Config("WEATHER_REQUESTS_PER_MINUTE is out of range".into())
        })?;
    }
    if let Ok(snapshot) = std::env::var("SNOW_SNAPSHOT") {
        config.snow.snapshot = snapshot.trim().to_string();
    }
    if let Ok(basis) = std::env::var("SNOW_FORECAST_BASIS") {
        config.snow.forecast_basis = match basis.trim().to_ascii_lowercase().as_str() {
            "cumulative" => ForecastBasis::Cumulative,
            "per_period" | "perperiod" => ForecastBasis::PerPeriod,
            _ => {
                return Err(Error::Config(
                    "SNOW_FORECAST_BASIS must be one of: cumulative, per_period".into(),
                ));
            }
        };
    }
    if let Ok(raw) = std::env::var("WEATHER_REFRESH_SECS") {
        config.timing.weather_refresh_secs = parse_positive_u64(&raw, "WEATHER_REFRESH_SECS")?;
    }
    if let Ok(raw) = std::env::var("SNOW_REFRESH_SECS") {
        config.timing.snow_refresh_secs = parse_positive_u64(&raw, "SNOW_REFRESH_SECS")?;
    }
    if let Ok(raw) = std::env::var("WEATHER_FETCH_TIMEOUT_SECS") {
        config.timing.weather_fetch_timeout_secs =
            parse_positive_u64(&raw, "WEATHER_FETCH_TIMEOUT_SECS")?;
    }
    if let Ok(raw) = std::env::var("SNOW_FETCH_TIMEOUT_SECS") {
        config.timing.snow_fetch_timeout_secs =
            parse_positive_u64(&raw, "SNOW_FETCH_TIMEOUT_SECS")?;
    }
    if let Ok(raw) = std::env::var("HEARTBEAT_SECS") {
        config.timing.heartbeat_secs = parse_positive_u64(&raw, "HEARTBEAT_SECS")?;
    }

    // 5. Validate.
    if config.weather.api_key.trim().is_empty() {
        tracing::warn!("OPENWEATHER_API_KEY is not set; weather data will stay unavailable");
    }

    validate_config(&config)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::WeightVector;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&DashboardConfig::default()).is_ok());
    }

    #[test]
    fn test_timeout_must_be_shorter_than_period() {
        let mut config = DashboardConfig::default();
        config.timing.weather_refresh_secs = 30;
        config.timing.weather_fetch_timeout_secs = 30;

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("weather_fetch_timeout_secs"));
    }

    #[test]
    fn test_all_issues_are_reported_together() {
        let mut config = DashboardConfig::default();
        let dup = config.resorts[0].clone();
        config.resorts.push(dup);
        config.timing.heartbeat_secs = 0;
        config.weights = WeightVector::new();

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("duplicate resort id 'vail'"));
        assert!(err.contains("heartbeat_secs"));
        assert!(err.contains("at least one metric"));
    }

    #[test]
    fn test_toml_document_round_trips_into_config() {
        let config: DashboardConfig = toml::from_str(
            r#"
            [snow]
            snapshot = "https://example.com/snow.json"

            [timing]
            snow_refresh_secs = 7200

            [weights]
            warmth = 0.2
            fresh_snow = 1.0

            [[resorts]]
            id = "alta"
            name = "Alta"
            lat = 40.588
            lon = -111.638
            "#,
        )
        .unwrap();

        assert!(validate_config(&config).is_ok());
        assert_eq!(config.timing.snow_refresh_secs, 7200);
        assert_eq!(config.timing.weather_refresh_secs, 60);
        assert_eq!(config.weights.get(Metric::FreshSnow), Some(1.0));
        assert_eq!(config.weights.get(Metric::BaseDepth), None);
    }

    #[test]
    fn test_request_budget_must_cover_every_resort() {
        let mut config = DashboardConfig::default();
        config.weather.requests_per_minute = 4;

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("requests_per_minute (4)"));
        assert!(err.contains("number of resorts (8)"));

        config.weather.requests_per_minute = 8;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_out_of_range_weight_fails_to_parse() {
        let parsed = toml::from_str::<DashboardConfig>(
            r#"
            [weights]
            warmth = -1.0
            "#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_parse_positive_u64() {
        assert_eq!(parse_positive_u64(" 15 ", "X").unwrap(), 15);
        assert!(parse_positive_u64("0", "X").is_err());
        assert!(parse_positive_u64("soon", "X").is_err());
    }
}
