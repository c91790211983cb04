//! Engine configuration, read from TOML:
//!
//! ```toml
//! endpoint = "hgIntegrator"
//! session_id = "1234_abcd"
//! undo_limit = 200
//! debug = false
//! request_timeout_ms = 30000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use pagesync_sync::HttpTransport;
use serde::Deserialize;
use tokio::runtime::Handle;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("I/O error reading {path}: {error}")]
	Io { path: PathBuf, error: std::io::Error },
	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),
	#[error("invalid configuration: {0}")]
	Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
	/// URL the sync queue posts to. May also be set at runtime.
	pub endpoint: Option<String>,
	pub session_id: String,
	/// Maximum undo depth. Unbounded when absent.
	pub undo_limit: Option<usize>,
	/// Log every issued request's fields.
	pub debug: bool,
	/// Per-request timeout of the HTTP transport.
	pub request_timeout_ms: u64,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			endpoint: None,
			session_id: String::new(),
			undo_limit: None,
			debug: false,
			request_timeout_ms: 30_000,
		}
	}
}

impl EngineConfig {
	pub fn parse(text: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(text)?;
		config.validate()?;
		Ok(config)
	}

	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let text = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		let config = Self::parse(&text)?;
		tracing::debug!(path = %path.display(), "config.loaded");
		Ok(config)
	}

	pub fn request_timeout(&self) -> Duration {
		Duration::from_millis(self.request_timeout_ms)
	}

	/// HTTP transport spawning on `runtime`, with the configured timeout.
	pub fn http_transport(&self, runtime: Handle) -> HttpTransport {
		HttpTransport::new(runtime).with_timeout(self.request_timeout())
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.undo_limit == Some(0) {
			return Err(ConfigError::Invalid("undo_limit must be at least 1".into()));
		}
		if self.request_timeout_ms == 0 {
			return Err(ConfigError::Invalid("request_timeout_ms must be positive".into()));
		}
		if self.endpoint.as_deref().is_some_and(str::is_empty) {
			return Err(ConfigError::Invalid("endpoint must not be empty".into()));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use super::*;

	#[test]
	fn parses_all_fields() {
		let config = EngineConfig::parse(
			r#"
			endpoint = "hgIntegrator"
			session_id = "42_abc"
			undo_limit = 50
			debug = true
			request_timeout_ms = 500
			"#,
		)
		.unwrap();
		assert_eq!(config.endpoint.as_deref(), Some("hgIntegrator"));
		assert_eq!(config.session_id, "42_abc");
		assert_eq!(config.undo_limit, Some(50));
		assert!(config.debug);
		assert_eq!(config.request_timeout(), Duration::from_millis(500));
	}

	#[test]
	fn empty_document_uses_defaults() {
		assert_eq!(EngineConfig::parse("").unwrap(), EngineConfig::default());
	}

	#[test]
	fn rejects_unknown_keys_and_bad_values() {
		assert!(matches!(EngineConfig::parse("cgi = \"x\""), Err(ConfigError::Toml(_))));
		assert!(matches!(
			EngineConfig::parse("undo_limit = 0"),
			Err(ConfigError::Invalid(_))
		));
		assert!(matches!(
			EngineConfig::parse("endpoint = \"\""),
			Err(ConfigError::Invalid(_))
		));
	}

	#[tokio::test]
	async fn http_transport_uses_configured_timeout() {
		let config = EngineConfig::parse("request_timeout_ms = 1500").unwrap();
		let transport = config.http_transport(Handle::current());
		assert_eq!(transport.timeout(), Duration::from_millis(1500));
	}

	#[test]
	fn load_reads_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "session_id = \"7\"").unwrap();
		let config = EngineConfig::load(file.path()).unwrap();
		assert_eq!(config.session_id, "7");
	}

	#[test]
	fn load_reports_missing_file() {
		let dir = tempfile::tempdir().unwrap();
		let err = EngineConfig::load(dir.path().join("absent.toml")).unwrap_err();
		assert!(matches!(err, ConfigError::Io { .. }));
		assert!(err.to_string().contains("absent.toml"));
	}
}
