// Session lifecycle
//
// `client` holds the session type and URL construction; `auth` and
// `report` add the logon/logoff and report-data operations as inherent
// methods, mirroring the dispatcher's `/rds/auth` and `/rds/reportData`
// endpoint groups.

pub mod auth;
pub mod client;
pub mod report;

pub use client::{Session, SessionConfig};
