use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use anyhow::{Context, Result};
use tracing::{info, warn};

/// Runtime settings, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    pub media_root: PathBuf,
    /// Absolute origin used to build image URLs and recipe short links.
    pub public_base_url: String,
    pub ingredients_path: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        Ok(Self {
            database_url,
            bind_address: try_load("BIND_ADDRESS", "0.0.0.0:3000")?,
            media_root: try_load("MEDIA_ROOT", "media")?,
            public_base_url: try_load::<String>("PUBLIC_BASE_URL", "http://localhost:3000")?
                .trim_end_matches('/')
                .to_string(),
            ingredients_path: try_load("INGREDIENTS_PATH", "data/ingredients.json")?,
        })
    }

    /// Absolute URL for a path stored relative to the media root.
    pub fn media_url(&self, stored_path: &str) -> String {
        format!("{}/media/{}", self.public_base_url, stored_path)
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse().map_err(|e| {
        warn!("Invalid {key} value: {e}");
        anyhow::anyhow!("Invalid {key} value {raw:?}: {e}")
    })
}

#[cfg(test)]
impl Config {
    pub fn for_tests(media_root: PathBuf) -> Self {
        Self {
            database_url: String::new(),
            bind_address: "127.0.0.1:0".to_string(),
            media_root,
            public_base_url: "http://testserver".to_string(),
            ingredients_path: PathBuf::from("data/ingredients.json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_url_joins_base_and_path() {
        let config = Config::for_tests(PathBuf::from("media"));
        assert_eq!(
            config.media_url("recipes/images/abc.png"),
            "http://testserver/media/recipes/images/abc.png"
        );
    }

    #[test]
    fn test_try_load_falls_back_to_default() {
        let value: u16 = try_load("FOODGRAM_TEST_UNSET_PORT", "8080").unwrap();
        assert_eq!(value, 8080);
    }

    #[test]
    fn test_try_load_rejects_unparseable_default() {
        let value: Result<u16> = try_load("FOODGRAM_TEST_UNSET_NUMBER", "not-a-number");
        assert!(value.is_err());
    }
}
