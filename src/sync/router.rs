//! Collection routing by top-level folder.

use crate::config::Config;

/// Maps document paths to destination collections.
#[derive(Debug, Clone)]
pub struct Router {
    restricted_prefixes: Vec<String>,
    restricted_collection: String,
    default_collection: String,
}

impl Router {
    /// Create a router.
    #[must_use]
    pub fn new(
        restricted_prefixes: Vec<String>,
        restricted_collection: impl Into<String>,
        default_collection: impl Into<String>,
    ) -> Self {
        Self {
            restricted_prefixes,
            restricted_collection: restricted_collection.into(),
            default_collection: default_collection.into(),
        }
    }

    /// Build a router from configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.restricted_prefixes.clone(),
            config.restricted_collection.clone(),
            config.default_collection.clone(),
        )
    }

    /// Collection for a `/`-separated relative path.
    #[must_use]
    pub fn route(&self, rel_path: &str) -> &str {
        let top = rel_path.split('/').next().unwrap_or_default();
        if self.restricted_prefixes.iter().any(|p| p == top) {
            &self.restricted_collection
        } else {
            &self.default_collection
        }
    }

    /// Every collection this router can produce.
    #[must_use]
    pub fn collections(&self) -> [&str; 2] {
        [&self.restricted_collection, &self.default_collection]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> Router {
        Router::new(vec!["0 Work".to_string()], "work", "personal")
    }

    #[test]
    fn test_route_restricted_prefix() {
        let r = router();
        assert_eq!(r.route("0 Work/meetings/standup.md"), "work");
        assert_eq!(r.route("0 Work/readme.md"), "work");
    }

    #[test]
    fn test_route_default() {
        let r = router();
        assert_eq!(r.route("journal/2024.md"), "personal");
        assert_eq!(r.route("top.md"), "personal");
        // Only the top-level folder counts.
        assert_eq!(r.route("archive/0 Work/old.md"), "personal");
        // Prefix must match the whole component.
        assert_eq!(r.route("0 Workshop/a.md"), "personal");
    }

    #[test]
    fn test_collections() {
        assert_eq!(router().collections(), ["work", "personal"]);
    }

    #[test]
    fn test_from_config() {
        let config = Config {
            restricted_prefixes: vec!["Clients".to_string()],
            ..Config::default()
        };
        let r = Router::from_config(&config);
        assert_eq!(r.route("Clients/acme.md"), "work");
        assert_eq!(r.route("Home/acme.md"), "personal");
    }
}
