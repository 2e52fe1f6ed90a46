// Tenant identity for request handling
// Context carried on every request plus header-based extraction.

pub mod context;
pub mod extractor;

pub use context::{TenantContext, TENANT_ID_KEY, TENANT_TYPE_KEY};
pub use extractor::{TenantExtractor, TenantRef, DEFAULT_TENANT_HEADERS};
