use std::collections::HashMap;
use std::time::Duration;

/// A string-keyed property bag with typed accessors.
///
/// Values are stored as strings and parsed on access. A value that fails to
/// parse is treated as absent, so the caller's default applies; the failure
/// is logged.
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    properties: HashMap<String, String>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `key=value` lines. Blank lines and lines starting with `#` or
    /// `!` are skipped. A line without `=` sets the key to an empty value.
    pub fn from_properties(text: &str) -> Self {
        let mut conf = Self::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }

            match line.split_once('=') {
                Some((key, value)) => conf.set(key.trim(), value.trim()),
                None => conf.set(line, ""),
            }
        }

        conf
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn set_int(&mut self, name: impl Into<String>, value: i64) {
        self.set(name, value.to_string());
    }

    pub fn set_bool(&mut self, name: impl Into<String>, value: bool) {
        self.set(name, value.to_string());
    }

    pub fn set_duration_ms(&mut self, name: impl Into<String>, value: Duration) {
        self.set(name, value.as_millis().to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    pub fn get_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.get(name).unwrap_or(default)
    }

    pub fn get_int(&self, name: &str, default: i64) -> i64 {
        self.parse_or(name, default)
    }

    pub fn get_u32(&self, name: &str, default: u32) -> u32 {
        self.parse_or(name, default)
    }

    pub fn get_u64(&self, name: &str, default: u64) -> u64 {
        self.parse_or(name, default)
    }

    /// Only `true` and `false` (case-insensitive) are recognized.
    pub fn get_bool(&self, name: &str, default: bool) -> bool {
        match self.get(name).map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "true" => true,
            Some(v) if v == "false" => false,
            _ => default,
        }
    }

    pub fn get_duration_ms(&self, name: &str, default_ms: u64) -> Duration {
        Duration::from_millis(self.get_u64(name, default_ms))
    }

    fn parse_or<T: std::str::FromStr>(&self, name: &str, default: T) -> T {
        match self.get(name) {
            None => default,
            Some(raw) => match raw.trim().parse() {
                Ok(value) => value,
                Err(_) => {
                    tracing::warn!("Ignoring unparsable value {:?} for key {}", raw, name);
                    default
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_accessors_fall_back_to_defaults() {
        let mut conf = Configuration::new();
        conf.set_int("a.int", 42);
        conf.set("a.bad", "forty-two");
        conf.set("a.bool", "TRUE");
        conf.set("a.other", "yes");

        assert_eq!(conf.get_int("a.int", 0), 42);
        assert_eq!(conf.get_int("a.bad", 7), 7);
        assert_eq!(conf.get_int("missing", -1), -1);
        assert!(conf.get_bool("a.bool", false));
        assert!(!conf.get_bool("a.other", false));
        assert_eq!(conf.get_duration_ms("a.int", 0), Duration::from_millis(42));
    }

    #[test]
    fn parses_properties_text() {
        let conf = Configuration::from_properties(
            "# comment\n! other comment\n\nipc.client.ping = false\nipc.ping.interval=500\nflag\n",
        );

        assert!(!conf.get_bool("ipc.client.ping", true));
        assert_eq!(conf.get_u64("ipc.ping.interval", 0), 500);
        assert_eq!(conf.get("flag"), Some(""));
        assert_eq!(conf.get_or("absent", "x"), "x");
    }
}
