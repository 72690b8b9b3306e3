use std::path::PathBuf;

/// Placeholder secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{0} is still a placeholder value")]
    Placeholder(&'static str),

    #[error("{key} has an invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
}

/// Process configuration, read once at boot.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub session_days: i64,
    /// Absolute base used for sitemap entries.
    pub public_url: String,
    pub upload_dir: PathBuf,
    /// Served upload URLs are prefixed with this when set.
    pub cdn_url: Option<String>,
    pub default_avatar: String,
    pub default_banner: String,
    /// Each optional secret enables the endpoints that it guards.
    pub gitlog_secret: Option<String>,
    pub github_stats_secret: Option<String>,
    pub admin_api_secret: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let jwt_secret = get("DEACONN_JWT_SECRET").ok_or(ConfigError::Missing("DEACONN_JWT_SECRET"))?;
        if PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            return Err(ConfigError::Placeholder("DEACONN_JWT_SECRET"));
        }

        let port_raw = or("DEACONN_PORT", "3000");
        let port = port_raw.parse().map_err(|_| ConfigError::Invalid {
            key: "DEACONN_PORT",
            value: port_raw.clone(),
        })?;

        let days_raw = or("DEACONN_SESSION_DAYS", "30");
        let session_days = days_raw
            .parse::<i64>()
            .ok()
            .filter(|d| *d > 0)
            .ok_or(ConfigError::Invalid {
                key: "DEACONN_SESSION_DAYS",
                value: days_raw.clone(),
            })?;

        let public_url = or("DEACONN_PUBLIC_URL", "http://localhost:3000");
        if !(public_url.starts_with("http://") || public_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                key: "DEACONN_PUBLIC_URL",
                value: public_url,
            });
        }

        Ok(Self {
            host: or("DEACONN_HOST", "0.0.0.0"),
            port,
            db_path: or("DEACONN_DB_PATH", "deaconn.db").into(),
            jwt_secret,
            session_days,
            public_url: public_url.trim_end_matches('/').to_string(),
            upload_dir: or("DEACONN_UPLOAD_DIR", "./uploads").into(),
            cdn_url: get("DEACONN_CDN_URL").map(|u| u.trim_end_matches('/').to_string()),
            default_avatar: or("DEACONN_DEFAULT_AVATAR", "/images/default_avatar.png"),
            default_banner: or("DEACONN_DEFAULT_BANNER", "/images/default_banner.png"),
            gitlog_secret: get("DEACONN_GITLOG_SECRET"),
            github_stats_secret: get("DEACONN_GITHUB_STATS_SECRET"),
            admin_api_secret: get("DEACONN_ADMIN_API_SECRET"),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn jwt_secret_is_required() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DEACONN_JWT_SECRET")));

        let err = Config::from_lookup(lookup(&[("DEACONN_JWT_SECRET", "dev-secret-change-me")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Placeholder(_)));
    }

    #[test]
    fn optional_secrets_default_to_disabled() {
        let config = Config::from_lookup(lookup(&[
            ("DEACONN_JWT_SECRET", "s3cret"),
            ("DEACONN_GITLOG_SECRET", "  "),
            ("DEACONN_PUBLIC_URL", "https://deaconn.net/"),
        ]))
        .unwrap();
        assert!(config.gitlog_secret.is_none());
        assert!(config.admin_api_secret.is_none());
        assert_eq!(config.public_url, "https://deaconn.net");
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn invalid_port_fails() {
        let err = Config::from_lookup(lookup(&[
            ("DEACONN_JWT_SECRET", "s3cret"),
            ("DEACONN_PORT", "http"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "DEACONN_PORT", .. }));
    }
}
