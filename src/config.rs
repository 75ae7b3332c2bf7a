use std::env;
use std::fmt;

/// Onde os dados ficam armazenados
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Mongo,
    Memory,
}

impl StorageBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackend::Mongo => "mongo",
            StorageBackend::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_hours: i64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub storage: StorageBackend,
    pub production: bool,
    pub jwt: JwtSettings,
    pub bcrypt_cost: u32,
    pub cors_origins: Vec<String>,
    pub listing_sweep_secs: u64,
}

#[derive(Debug)]
pub struct ConfigError(String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Configuration error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup (tests pass a map here).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let storage = match get("STORAGE_BACKEND", "mongo").to_lowercase().as_str() {
            "mongo" | "mongodb" => StorageBackend::Mongo,
            "memory" => StorageBackend::Memory,
            other => {
                return Err(ConfigError(format!(
                    "STORAGE_BACKEND must be 'mongo' or 'memory', got '{}'",
                    other
                )))
            }
        };

        let database_url = lookup("DATABASE_URL").unwrap_or_default();
        if storage == StorageBackend::Mongo && database_url.is_empty() {
            return Err(ConfigError("DATABASE_URL must be set".into()));
        }

        let production = get("APP_ENV", "development").eq_ignore_ascii_case("production");

        let jwt_secret = get("JWT_SECRET", "default-secret-change-me");
        if production && jwt_secret == "default-secret-change-me" {
            return Err(ConfigError("JWT_SECRET must be set in production".into()));
        }

        Ok(Config {
            host: get("HOST", "0.0.0.0"),
            port: parse_number("PORT", &get("PORT", "3002"))?,
            database_url,
            storage,
            production,
            jwt: JwtSettings {
                secret: jwt_secret,
                issuer: get("JWT_ISSUER", "cane-market"),
                audience: get("JWT_AUDIENCE", "cane-market-api"),
                ttl_hours: parse_number("JWT_TTL_HOURS", &get("JWT_TTL_HOURS", "24"))?,
            },
            bcrypt_cost: parse_number("BCRYPT_COST", &get("BCRYPT_COST", "12"))?,
            cors_origins: get("CORS_ORIGINS", "http://localhost:3000,http://127.0.0.1:3000")
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            listing_sweep_secs: parse_number(
                "LISTING_SWEEP_SECS",
                &get("LISTING_SWEEP_SECS", "3600"),
            )?,
        })
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError(format!("{} has invalid value '{}'", key, raw)))
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        host: "127.0.0.1".into(),
        port: 0,
        database_url: String::new(),
        storage: StorageBackend::Memory,
        production: false,
        jwt: JwtSettings {
            secret: "test-secret".into(),
            issuer: "cane-market".into(),
            audience: "cane-market-api".into(),
            ttl_hours: 1,
        },
        bcrypt_cost: 4,
        cors_origins: vec![],
        listing_sweep_secs: 60,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_with_memory_backend() {
        let config = Config::from_lookup(lookup(&[("STORAGE_BACKEND", "memory")])).unwrap();
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.port, 3002);
        assert_eq!(config.jwt.ttl_hours, 24);
        assert!(!config.production);
        assert_eq!(config.cors_origins.len(), 2);
    }

    #[test]
    fn test_mongo_requires_database_url() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
        let config =
            Config::from_lookup(lookup(&[("DATABASE_URL", "mongodb://localhost/cane")])).unwrap();
        assert_eq!(config.storage, StorageBackend::Mongo);
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        let result = Config::from_lookup(lookup(&[("STORAGE_BACKEND", "memory"), ("PORT", "abc")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_production_requires_real_secret() {
        let pairs = [("STORAGE_BACKEND", "memory"), ("APP_ENV", "production")];
        assert!(Config::from_lookup(lookup(&pairs)).is_err());

        let pairs = [
            ("STORAGE_BACKEND", "memory"),
            ("APP_ENV", "production"),
            ("JWT_SECRET", "s3cr3t"),
        ];
        assert!(Config::from_lookup(lookup(&pairs)).unwrap().production);
    }
}
