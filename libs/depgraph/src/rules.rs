//! Environment-variable naming conventions.

/// Prefixes that mark a variable as pointing at another container.
pub const DEFAULT_DEPENDENCY_PREFIXES: &[&str] = &["ENDPOINT_MODULE_", "URI_", "VITE_URI_", "MQTT_URI"];

/// Suffix of variables that advertise the container's own listening port.
pub const DEFAULT_PORT_SUFFIX: &str = "PORT";

/// Build-time variables that look like ports but describe something else.
pub const DEFAULT_PORT_EXCLUDE_PREFIX: &str = "VITE_";

/// Naming conventions used to infer dependencies.
///
/// Injected at startup; nothing in this crate hard-codes a prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRules {
    /// Ordered allow-list of dependency-marker prefixes.
    pub dependency_prefixes: Vec<String>,
    pub port_suffix: String,
    pub port_exclude_prefix: String,
}

impl Default for DependencyRules {
    fn default() -> Self {
        Self {
            dependency_prefixes: DEFAULT_DEPENDENCY_PREFIXES
                .iter()
                .map(|p| p.to_string())
                .collect(),
            port_suffix: DEFAULT_PORT_SUFFIX.to_string(),
            port_exclude_prefix: DEFAULT_PORT_EXCLUDE_PREFIX.to_string(),
        }
    }
}

impl DependencyRules {
    /// Does `key` name a dependency endpoint?
    pub fn is_dependency_key(&self, key: &str) -> bool {
        self.dependency_prefixes
            .iter()
            .any(|prefix| key.starts_with(prefix.as_str()))
    }

    /// Does `key` advertise a listening port?
    pub fn is_port_key(&self, key: &str) -> bool {
        key.ends_with(self.port_suffix.as_str())
            && (self.port_exclude_prefix.is_empty()
                || !key.starts_with(self.port_exclude_prefix.as_str()))
    }

    /// Keep only `KEY=value` entries whose key is a dependency marker.
    pub fn filter_env(&self, env: &[String]) -> Vec<String> {
        env.iter()
            .filter(|entry| {
                split_env(entry).is_some_and(|(key, _)| self.is_dependency_key(key))
            })
            .cloned()
            .collect()
    }
}

/// Split `KEY=value` at the first `=`.
///
/// Entries without a key are rejected. The value may be empty.
pub fn split_env(entry: &str) -> Option<(&str, &str)> {
    let (key, value) = entry.split_once('=')?;
    if key.is_empty() {
        None
    } else {
        Some((key, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prefixes() {
        let rules = DependencyRules::default();
        assert!(rules.is_dependency_key("URI_BILLING"));
        assert!(rules.is_dependency_key("ENDPOINT_MODULE_AUTH"));
        assert!(rules.is_dependency_key("VITE_URI_API"));
        assert!(rules.is_dependency_key("MQTT_URI"));
        assert!(!rules.is_dependency_key("DATABASE_URL"));
        assert!(!rules.is_dependency_key("MY_URI_X"));
    }

    #[test]
    fn test_port_keys() {
        let rules = DependencyRules::default();
        assert!(rules.is_port_key("PORT"));
        assert!(rules.is_port_key("HTTP_PORT"));
        assert!(!rules.is_port_key("VITE_DEV_PORT"));
        assert!(!rules.is_port_key("PORT_RANGE"));
    }

    #[test]
    fn test_empty_exclude_prefix_excludes_nothing() {
        let rules = DependencyRules {
            port_exclude_prefix: String::new(),
            ..DependencyRules::default()
        };
        assert!(rules.is_port_key("VITE_DEV_PORT"));
    }

    #[test]
    fn test_filter_env() {
        let rules = DependencyRules::default();
        let env = vec![
            "PATH=/usr/bin".to_string(),
            "URI_B=http://b:9000/".to_string(),
            "SOME_PORT=8080".to_string(),
            "MQTT_URI=mqtt://broker:1883".to_string(),
            "garbage".to_string(),
        ];
        assert_eq!(
            rules.filter_env(&env),
            vec!["URI_B=http://b:9000/", "MQTT_URI=mqtt://broker:1883"]
        );
    }

    #[test]
    fn test_split_env() {
        assert_eq!(split_env("A=b"), Some(("A", "b")));
        assert_eq!(split_env("A=b=c"), Some(("A", "b=c")));
        assert_eq!(split_env("A="), Some(("A", "")));
        assert_eq!(split_env("=b"), None);
        assert_eq!(split_env("novalue"), None);
    }
}
