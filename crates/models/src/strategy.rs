use serde::{Deserialize, Serialize};

/// Physical layout used to isolate a storefront's rows.
///
/// - `Shared`: one database, tenant-scoped tables carry a `tenant_id`
///   column; isolation is a WHERE predicate.
/// - `Schema`: one database, one named schema per storefront; isolation
///   is a schema prefix on every table reference.
/// - `Isolated`: one database per storefront; isolation is connection
///   selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenancyStrategy {
    Shared,
    Schema,
    Isolated,
}

impl Default for TenancyStrategy {
    fn default() -> Self {
        Self::Shared
    }
}

impl TenancyStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shared => "shared",
            Self::Schema => "schema",
            Self::Isolated => "isolated",
        }
    }
}

impl From<&str> for TenancyStrategy {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "schema" => Self::Schema,
            "isolated" | "dedicated" | "silo" => Self::Isolated,
            _ => Self::Shared,
        }
    }
}

impl From<String> for TenancyStrategy {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl std::fmt::Display for TenancyStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_from_string() {
        assert_eq!(TenancyStrategy::from("shared"), TenancyStrategy::Shared);
        assert_eq!(TenancyStrategy::from("schema"), TenancyStrategy::Schema);
        assert_eq!(TenancyStrategy::from("isolated"), TenancyStrategy::Isolated);
        assert_eq!(TenancyStrategy::from("silo"), TenancyStrategy::Isolated);
        assert_eq!(TenancyStrategy::from("SCHEMA"), TenancyStrategy::Schema);
        // Unknown values fall back to shared
        assert_eq!(TenancyStrategy::from("pool"), TenancyStrategy::Shared);
        assert_eq!(TenancyStrategy::from(""), TenancyStrategy::Shared);
    }

    #[test]
    fn test_strategy_roundtrip() {
        for s in [
            TenancyStrategy::Shared,
            TenancyStrategy::Schema,
            TenancyStrategy::Isolated,
        ] {
            assert_eq!(TenancyStrategy::from(s.as_str()), s);
        }
    }
}
