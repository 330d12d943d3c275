use crate::hl7::MessageRouting;
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
	pub telemetry: TelemetryConfig,
	pub http: HttpClientConfig,
	pub backends: BackendsConfig,
	/// Applications and facilities written into MSH-3 to MSH-6.
	pub hl7: MessageRouting,
}

impl AppConfig {
	pub fn new() -> Result<Self, config::ConfigError> {
		use config::Config;
		let s = Config::builder()
			.add_source(config::File::from_str(
				include_str!("defaults.toml"),
				config::FileFormat::Toml,
			))
			.add_source(config::File::with_name("config.toml").required(false))
			.add_source(config::Environment::with_prefix("INTEROP_DESK").separator("__"))
			.build()?;

		let mut config: Self = s.try_deserialize()?;
		config.backends.normalize();
		Ok(config)
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
	// Also configurable via RUST_LOG and INTEROP_DESK__TELEMETRY__LEVEL
	#[serde(deserialize_with = "deserialize_level")]
	pub level: tracing::Level,
	/// Sentry DSN. Tracing and error reporting to Sentry is disabled when absent.
	pub sentry: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpClientConfig {
	/// Request timeout in seconds. No timeout is applied when absent.
	pub timeout: Option<u64>,
	pub user_agent: String,
}

impl HttpClientConfig {
	pub fn timeout(&self) -> Option<Duration> {
		self.timeout.map(Duration::from_secs)
	}
}

/// Base URLs of the exercise backends. Endpoint paths are resolved relative to these.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendsConfig {
	pub patients: Url,
	pub hl7: Url,
	pub dicomweb: Url,
	pub fhir: Url,
	/// Web UI of the OpenMRS instance behind the HL7 and FHIR exercises.
	pub openmrs: Url,
}

impl BackendsConfig {
	/// `Url::join` replaces the last path segment unless the base ends with a slash.
	fn normalize(&mut self) {
		for url in [
			&mut self.patients,
			&mut self.hl7,
			&mut self.dicomweb,
			&mut self.fhir,
			&mut self.openmrs,
		] {
			if !url.path().ends_with('/') {
				let path = format!("{}/", url.path());
				url.set_path(&path);
			}
		}
	}
}

fn deserialize_level<'de, D>(deserializer: D) -> Result<tracing::Level, D::Error>
where
	D: Deserializer<'de>,
{
	let s = String::deserialize(deserializer)?;
	s.parse().map_err(serde::de::Error::custom)
}
