pub mod error;
pub mod http;
pub mod traits;
pub mod types;

pub use error::{BackendError, ErrorClass};
pub use http::{HttpLogBackend, HttpRegistryBackend};
pub use traits::{LogBackend, RegistryBackend};
pub use types::{IndexSpec, LogLine, LogPage, LogQuery, LogStoreParams, PageProgress, RegistryToken};
