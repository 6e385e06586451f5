//! Remote resource fetching
//!
//! The [`Transport`] trait is the seam between the archiving pipeline and the
//! network. [`HttpTransport`] is the production implementation; tests plug in
//! scripted transports to control latency and failures per URL.

mod http;
mod traits;

pub use http::HttpTransport;
pub use traits::{FetchedResource, Transport, TransportError};
