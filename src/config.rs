use std::path::PathBuf;

use thiserror::Error;

use crate::quiz::sampler::ItemOrder;

pub const STORE_KEY: &str = "TESTING_CENTER_STORE";
pub const SHUFFLE_ITEMS_KEY: &str = "TESTING_CENTER_SHUFFLE_ITEMS";
pub const SEED_DEMO_KEY: &str = "TESTING_CENTER_SEED_DEMO";
pub const TEACHER_LOGIN_KEY: &str = "TESTING_CENTER_TEACHER_LOGIN";
pub const TEACHER_PASSWORD_KEY: &str = "TESTING_CENTER_TEACHER_PASSWORD";

const DEFAULT_STORE: &str = "testing_center.sqlite";
const MEMORY_STORE: &str = ":memory:";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a boolean, got '{value}'")]
    InvalidBool { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Memory,
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub store: StoreLocation,
    pub item_order: ItemOrder,
    /// Seed the demo test into a store without tests.
    pub seed_demo: bool,
    pub teacher_login: String,
    pub teacher_password: String,
}

impl Config {
    /// Reads the process environment. Call `dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let store = match lookup(STORE_KEY) {
            Some(value) if value == MEMORY_STORE => StoreLocation::Memory,
            Some(value) if !value.trim().is_empty() => StoreLocation::File(PathBuf::from(value)),
            _ => StoreLocation::File(PathBuf::from(DEFAULT_STORE)),
        };

        let item_order = if read_bool(&lookup, SHUFFLE_ITEMS_KEY, true)? {
            ItemOrder::Shuffled
        } else {
            ItemOrder::Stored
        };

        Ok(Config {
            store,
            item_order,
            seed_demo: read_bool(&lookup, SEED_DEMO_KEY, true)?,
            teacher_login: lookup(TEACHER_LOGIN_KEY).unwrap_or_else(|| "teacher_admin".into()),
            teacher_password: lookup(TEACHER_PASSWORD_KEY).unwrap_or_else(|| "123".into()),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            store: StoreLocation::File(PathBuf::from(DEFAULT_STORE)),
            item_order: ItemOrder::Shuffled,
            seed_demo: true,
            teacher_login: "teacher_admin".into(),
            teacher_password: "123".into(),
        }
    }
}

fn read_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(value) = lookup(key) else {
        return Ok(default);
    };
    match value.trim().to_lowercase().as_str() {
        "" => Ok(default),
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool { key, value }),
    }
}
