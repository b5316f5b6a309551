use anyhow::Result;

use crate::storage::KeyValueStore;

pub const DEFAULT_ENDPOINT: &str = "https://8n22qcrph9.execute-api.us-east-1.amazonaws.com";
pub const DEFAULT_LOOKBACK_HOURS: u32 = 24;
/// Largest window the agent backend accepts (7 days).
pub const MAX_LOOKBACK_HOURS: u32 = 168;

const KEY_API_URL: &str = "apiUrl";
const KEY_PIPELINE_NAME: &str = "pipelineName";
const KEY_HOURS_BACK: &str = "hoursBack";
const KEY_DARK_MODE: &str = "darkMode";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub endpoint_base_url: String,
    pub topic_name: Option<String>,
    pub lookback_hours: u32,
    pub dark_mode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            endpoint_base_url: DEFAULT_ENDPOINT.to_string(),
            topic_name: None,
            lookback_hours: DEFAULT_LOOKBACK_HOURS,
            dark_mode: false,
        }
    }

    /// Load the configuration, falling back to the default for every field
    /// that is absent or does not parse.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let defaults = Self::new();

        let endpoint_base_url = store
            .get(KEY_API_URL)
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or(defaults.endpoint_base_url);

        let topic_name = store
            .get(KEY_PIPELINE_NAME)
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        let lookback_hours = store
            .get(KEY_HOURS_BACK)
            .and_then(|raw| Self::parse_lookback(&raw))
            .unwrap_or(defaults.lookback_hours);

        let dark_mode = store
            .get(KEY_DARK_MODE)
            .and_then(|raw| raw.trim().parse::<bool>().ok())
            .unwrap_or(defaults.dark_mode);

        Self {
            endpoint_base_url,
            topic_name,
            lookback_hours,
            dark_mode,
        }
    }

    /// Write every field, whether or not it changed.
    pub fn save(&self, store: &mut dyn KeyValueStore) -> Result<()> {
        store.set(KEY_API_URL, self.endpoint_base_url.clone())?;
        store.set(KEY_PIPELINE_NAME, self.topic_name.clone().unwrap_or_default())?;
        store.set(KEY_HOURS_BACK, self.lookback_hours.to_string())?;
        store.set(KEY_DARK_MODE, self.dark_mode.to_string())?;
        Ok(())
    }

    /// A positive integer, or nothing.
    pub fn parse_lookback(raw: &str) -> Option<u32> {
        raw.trim().parse::<u32>().ok().filter(|hours| *hours > 0)
    }

    /// Lookback value typed into the settings panel: unparseable input falls
    /// back to the default and oversized windows are clamped.
    pub fn lookback_from_input(raw: &str) -> u32 {
        Self::parse_lookback(raw)
            .map(|hours| hours.min(MAX_LOOKBACK_HOURS))
            .unwrap_or(DEFAULT_LOOKBACK_HOURS)
    }

    pub fn chat_url(&self) -> String {
        format!("{}/chat", self.endpoint_base_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_load_empty_store_uses_defaults() {
        let store = MemoryStore::new();
        assert_eq!(Config::load(&store), Config::new());
    }

    #[test]
    fn test_load_applies_defaults_field_by_field() {
        let mut store = MemoryStore::new();
        store.set("apiUrl", "http://localhost:3000".to_string()).unwrap();
        store.set("hoursBack", "not-a-number".to_string()).unwrap();
        store.set("darkMode", "maybe".to_string()).unwrap();
        store.set("pipelineName", "nightly-etl".to_string()).unwrap();

        let config = Config::load(&store);
        assert_eq!(config.endpoint_base_url, "http://localhost:3000");
        assert_eq!(config.topic_name.as_deref(), Some("nightly-etl"));
        assert_eq!(config.lookback_hours, DEFAULT_LOOKBACK_HOURS);
        assert!(!config.dark_mode);
    }

    #[test]
    fn test_zero_lookback_falls_back() {
        let mut store = MemoryStore::new();
        store.set("hoursBack", "0".to_string()).unwrap();
        assert_eq!(Config::load(&store).lookback_hours, DEFAULT_LOOKBACK_HOURS);
    }

    #[test]
    fn test_empty_values_fall_back() {
        let mut store = MemoryStore::new();
        store.set("apiUrl", "  ".to_string()).unwrap();
        store.set("pipelineName", "".to_string()).unwrap();

        let config = Config::load(&store);
        assert_eq!(config.endpoint_base_url, DEFAULT_ENDPOINT);
        assert_eq!(config.topic_name, None);
    }

    #[test]
    fn test_save_then_load() {
        let mut store = MemoryStore::new();
        let config = Config {
            endpoint_base_url: "https://agent.example.com".to_string(),
            topic_name: Some("ingest".to_string()),
            lookback_hours: 48,
            dark_mode: true,
        };
        config.save(&mut store).unwrap();

        assert_eq!(store.get("hoursBack").as_deref(), Some("48"));
        assert_eq!(store.get("darkMode").as_deref(), Some("true"));
        assert_eq!(Config::load(&store), config);
    }

    #[test]
    fn test_save_writes_empty_topic() {
        let mut store = MemoryStore::new();
        store.set("pipelineName", "old".to_string()).unwrap();
        Config::new().save(&mut store).unwrap();
        assert_eq!(store.get("pipelineName").as_deref(), Some(""));
    }

    #[test]
    fn test_lookback_from_input() {
        assert_eq!(Config::lookback_from_input("12"), 12);
        assert_eq!(Config::lookback_from_input(" 72 "), 72);
        assert_eq!(Config::lookback_from_input("1000"), MAX_LOOKBACK_HOURS);
        assert_eq!(Config::lookback_from_input("-3"), DEFAULT_LOOKBACK_HOURS);
        assert_eq!(Config::lookback_from_input(""), DEFAULT_LOOKBACK_HOURS);
    }

    #[test]
    fn test_chat_url_trims_trailing_slash() {
        let mut config = Config::new();
        config.endpoint_base_url = "http://localhost:8080/".to_string();
        assert_eq!(config.chat_url(), "http://localhost:8080/chat");
    }
}
