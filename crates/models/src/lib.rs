// Core modules
pub mod alert;
pub mod storefront;
pub mod strategy;

// Re-export commonly used types
pub use alert::{Alert, AlertKind, AlertSeverity};
pub use storefront::{MigrationAdvice, StorefrontRecord, StorefrontUsage};
pub use strategy::TenancyStrategy;
