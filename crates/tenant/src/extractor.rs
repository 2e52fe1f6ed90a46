// Tenant extractor implementation
// Identifies the storefront from request headers, in configured order.

use axum::http::HeaderMap;
use uuid::Uuid;

/// Header names consulted in order when identifying the storefront.
pub const DEFAULT_TENANT_HEADERS: [&str; 3] =
    ["X-Storefront-Slug", "X-Storefront-Domain", "X-Tenant-ID"];

/// How the request named its storefront. Resolution to a concrete
/// tenant id happens against the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantRef {
    Slug(String),
    Domain(String),
    Id(Uuid),
}

#[derive(Debug, Clone)]
pub struct TenantExtractor {
    headers: Vec<String>,
}

impl TenantExtractor {
    pub fn new(headers: Vec<String>) -> Self {
        Self { headers }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// First matching header wins. A malformed X-Tenant-ID value is
    /// treated as absent so a later header (or rejection) applies.
    pub fn extract(&self, headers: &HeaderMap) -> Option<TenantRef> {
        for name in &self.headers {
            let value = match headers.get(name.as_str()).and_then(|v| v.to_str().ok()) {
                Some(v) if !v.is_empty() => v,
                _ => continue,
            };
            match name.to_ascii_lowercase().as_str() {
                "x-storefront-slug" => return Some(TenantRef::Slug(value.to_string())),
                "x-storefront-domain" => return Some(TenantRef::Domain(value.to_string())),
                "x-tenant-id" => match Uuid::parse_str(value) {
                    Ok(id) => return Some(TenantRef::Id(id)),
                    Err(_) => continue,
                },
                _ => continue,
            }
        }
        None
    }
}

impl Default for TenantExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_TENANT_HEADERS.iter().map(|s| s.to_string()).collect())
    }
}
