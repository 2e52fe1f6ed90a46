pub mod connection;
pub mod credentials;
pub mod error;
pub mod monitored;
pub mod query_builder;
pub mod resolver;

pub use connection::{Database, DatabaseConfig};
pub use credentials::CredentialCipher;
pub use error::{DatabaseError, Result};
pub use monitored::{bind_params, MonitoredConnection, TenantDirectory, TxFuture};
pub use query_builder::{params_digest, JoinKind, QueryBuilder, SqlParam, MAX_LIMIT};
pub use resolver::{
    advise, MigrationThresholds, ResolverConfig, ResolverStats, TenantBinding, TenantResolver,
};
