// cognos-mashup-api: Async Rust client for the IBM Cognos Mashup Service

pub mod cookies;
pub mod credentials;
pub mod error;
pub mod report;
pub mod session;
pub mod transport;

pub use cookies::PublicSuffixJar;
pub use credentials::{CredentialDocument, CredentialElement, materialize};
pub use error::Error;
pub use report::{DataSet, DataTable, Report};
pub use session::{Session, SessionConfig};
pub use transport::{TlsMode, TransportConfig};
