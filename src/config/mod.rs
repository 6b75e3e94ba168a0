use tracing::level_filters::LevelFilter;

pub(crate) const DEFAULT_NATIVE_API_URL: &str = "http://localhost:8000";

/// Runtime settings, read once at startup from `window.ENV`.
///
/// Every key is optional. Both `API_URL` and `api_url` are accepted; the
/// upper-case form wins when both are set.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct EnvConfig {
    pub api_url: String,
    pub log_level: LevelFilter,
    pub health_poll_ms: u32,
    pub log_poll_ms: u32,
    pub task_poll_ms: u32,
    pub page_size: u32,
    pub dwell_ms: u32,
}

impl EnvConfig {
    pub fn new() -> Self {
        Self::from_lookup(default_api_url(), read_window_env)
    }

    /// Build from an arbitrary key lookup. Unparseable values fall back to
    /// their defaults.
    pub fn from_lookup(default_api_url: String, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| lookup(k))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let number = |keys: &[&str], default: u32, min: u32| {
            get(keys)
                .and_then(|v| v.parse::<u32>().ok())
                .map(|v| v.max(min))
                .unwrap_or(default)
        };

        let api_url = get(&["API_URL", "api_url"])
            .unwrap_or(default_api_url)
            .trim_end_matches('/')
            .to_string();

        let log_level = get(&["LOG_LEVEL", "log_level"])
            .and_then(|v| v.parse::<LevelFilter>().ok())
            .unwrap_or(LevelFilter::INFO);

        Self {
            api_url,
            log_level,
            health_poll_ms: number(&["HEALTH_POLL_MS"], 10_000, 1_000),
            log_poll_ms: number(&["LOG_POLL_MS"], 5_000, 1_000),
            task_poll_ms: number(&["TASK_POLL_MS"], 2_000, 500),
            page_size: number(&["PAGE_SIZE"], 6, 1),
            dwell_ms: number(&["DWELL_MS"], 600, 100),
        }
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_arch = "wasm32")]
fn default_api_url() -> String {
    web_sys::window()
        .and_then(|w| w.location().origin().ok())
        .filter(|o| !o.is_empty() && o != "null")
        .unwrap_or_else(|| DEFAULT_NATIVE_API_URL.to_string())
}

#[cfg(not(target_arch = "wasm32"))]
fn default_api_url() -> String {
    DEFAULT_NATIVE_API_URL.to_string()
}

#[cfg(target_arch = "wasm32")]
fn read_window_env(key: &str) -> Option<String> {
    let window = web_sys::window()?;
    let env = window.get("ENV")?;
    if env.is_undefined() || !env.is_object() {
        return None;
    }
    let v = js_sys::Reflect::get(&env, &key.into()).ok()?;
    // Numbers are allowed for the interval keys.
    v.as_string().or_else(|| v.as_f64().map(|n| n.to_string()))
}

#[cfg(not(target_arch = "wasm32"))]
fn read_window_env(_key: &str) -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn cfg(pairs: &[(&str, &str)]) -> EnvConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EnvConfig::from_lookup("http://origin.test".to_string(), |k| map.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let c = cfg(&[]);
        assert_eq!(c.api_url, "http://origin.test");
        assert_eq!(c.log_level, LevelFilter::INFO);
        assert_eq!(c.health_poll_ms, 10_000);
        assert_eq!(c.log_poll_ms, 5_000);
        assert_eq!(c.task_poll_ms, 2_000);
        assert_eq!(c.page_size, 6);
        assert_eq!(c.dwell_ms, 600);
    }

    #[test]
    fn test_upper_case_key_wins() {
        let c = cfg(&[("API_URL", "http://a/"), ("api_url", "http://b")]);
        assert_eq!(c.api_url, "http://a");

        let c = cfg(&[("api_url", "http://b")]);
        assert_eq!(c.api_url, "http://b");
    }

    #[test]
    fn test_numbers_are_parsed_and_floored() {
        let c = cfg(&[
            ("HEALTH_POLL_MS", "3000"),
            ("LOG_POLL_MS", "10"),
            ("PAGE_SIZE", "abc"),
            ("LOG_LEVEL", "debug"),
        ]);
        assert_eq!(c.health_poll_ms, 3_000);
        assert_eq!(c.log_poll_ms, 1_000);
        assert_eq!(c.page_size, 6);
        assert_eq!(c.log_level, LevelFilter::DEBUG);
    }
}
