// Tenant context for request handling

use serde::Serialize;
use toko_models::TenancyStrategy;
use uuid::Uuid;

/// Context key for the tenant identifier, used in log fields and request
/// extensions. Entry middleware and the monitored connection must use the
/// same names.
pub const TENANT_ID_KEY: &str = "tenant_id";
/// Context key for the tenancy strategy.
pub const TENANT_TYPE_KEY: &str = "tenant_type";

/// Identity and strategy of the storefront owning the current request.
///
/// The strategy here must match the resolver's current binding for the
/// same tenant for the lifetime of an operation; middleware builds the
/// context from a fresh resolution to keep that true.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TenantContext {
    pub tenant_id: Uuid,
    pub strategy: TenancyStrategy,
}

impl TenantContext {
    pub fn new(tenant_id: Uuid, strategy: TenancyStrategy) -> Self {
        Self {
            tenant_id,
            strategy,
        }
    }

    /// Context for operations with no storefront in scope (platform-level
    /// queries against the master store).
    pub fn anonymous() -> Self {
        Self {
            tenant_id: Uuid::nil(),
            strategy: TenancyStrategy::Shared,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.tenant_id.is_nil()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_context_is_nil() {
        let ctx = TenantContext::anonymous();
        assert!(ctx.is_anonymous());
        assert_eq!(ctx.strategy, TenancyStrategy::Shared);
    }

    #[test]
    fn test_context_keys_are_stable() {
        // Part of the middleware contract; changing these breaks entry
        // middleware and monitored-connection log correlation.
        assert_eq!(TENANT_ID_KEY, "tenant_id");
        assert_eq!(TENANT_TYPE_KEY, "tenant_type");
    }
}
