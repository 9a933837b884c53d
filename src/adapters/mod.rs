// Adapters layer: concrete implementations of the domain ports

#[cfg(feature = "chrome")]
pub mod chrome;
pub mod databricks;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod storage;

#[cfg(feature = "chrome")]
pub use chrome::ChromeSession;
pub use databricks::DatabricksClient;
#[cfg(feature = "postgres")]
pub use postgres::PgTableSource;
#[cfg(feature = "aws")]
pub use storage::S3Storage;
pub use storage::LocalStorage;
