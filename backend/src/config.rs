use std::env;
use std::path::PathBuf;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_MODEL_PATH: &str = "models/multi-class-pg.pt";
const DEFAULT_CERT_PATH: &str = "/run/cert.pem";
const DEFAULT_KEY_PATH: &str = "/run/key.pem";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub model_path: PathBuf,
    pub preprocess_config: Option<PathBuf>,
    pub tls_cert_path: PathBuf,
    pub tls_key_path: PathBuf,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let workers = parse_or(&lookup, "WORKERS", 1usize)?;
        if workers == 0 {
            return Err(ConfigError::Zero("WORKERS"));
        }
        let max_upload_bytes = parse_or(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;
        if max_upload_bytes == 0 {
            return Err(ConfigError::Zero("MAX_UPLOAD_BYTES"));
        }

        Ok(Self {
            host: lookup("BIND_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            workers,
            model_path: lookup("MODEL_PATH")
                .unwrap_or_else(|| DEFAULT_MODEL_PATH.to_string())
                .into(),
            preprocess_config: lookup("PREPROCESS_CONFIG")
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            tls_cert_path: lookup("TLS_CERT_PATH")
                .unwrap_or_else(|| DEFAULT_CERT_PATH.to_string())
                .into(),
            tls_key_path: lookup("TLS_KEY_PATH")
                .unwrap_or_else(|| DEFAULT_KEY_PATH.to_string())
                .into(),
            max_upload_bytes,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_match_reference_deployment() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:5000");
        assert_eq!(config.workers, 1);
        assert_eq!(config.model_path, PathBuf::from("models/multi-class-pg.pt"));
        assert_eq!(config.tls_cert_path, PathBuf::from("/run/cert.pem"));
        assert_eq!(config.tls_key_path, PathBuf::from("/run/key.pem"));
        assert_eq!(config.max_upload_bytes, 50 * 1024 * 1024);
        assert!(config.preprocess_config.is_none());
    }

    #[test]
    fn overrides_are_applied() {
        let config = config_from(&[
            ("BIND_HOST", "127.0.0.1"),
            ("PORT", "8443"),
            ("WORKERS", "4"),
            ("MODEL_PATH", "/models/xray.pt"),
            ("PREPROCESS_CONFIG", "config/preprocess.yaml"),
            ("MAX_UPLOAD_BYTES", "1024"),
        ])
        .unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:8443");
        assert_eq!(config.workers, 4);
        assert_eq!(config.model_path, PathBuf::from("/models/xray.pt"));
        assert_eq!(
            config.preprocess_config,
            Some(PathBuf::from("config/preprocess.yaml"))
        );
        assert_eq!(config.max_upload_bytes, 1024);
    }

    #[test]
    fn empty_preprocess_config_means_defaults() {
        let config = config_from(&[("PREPROCESS_CONFIG", "")]).unwrap();
        assert!(config.preprocess_config.is_none());
    }

    #[test]
    fn rejects_bad_numbers() {
        assert!(matches!(
            config_from(&[("PORT", "https")]),
            Err(ConfigError::InvalidValue { name: "PORT", .. })
        ));
        assert!(matches!(
            config_from(&[("WORKERS", "0")]),
            Err(ConfigError::Zero("WORKERS"))
        ));
        assert!(matches!(
            config_from(&[("MAX_UPLOAD_BYTES", "-1")]),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}
