//! Clients for the services behind the gateway.
//!
//! The gateway owns no data. Groups and organizations live in the
//! attribution service, export jobs and their output files in the job
//! service. Handlers only see the traits in [`traits`]; [`http`] provides the
//! reqwest-backed implementations used in production.

pub mod error;
pub mod http;
pub mod traits;

pub use error::{ClientError, ClientResult};
pub use http::{HttpClientConfig, ServiceClient};
pub use traits::{AttributionClient, CallContext, DataClient, JobClient, ResourceKind};
