//! HTTP layer: the request lane, the executor, response classification and
//! the transport seam.

pub mod classify;
pub mod executor;
pub mod queue;
pub mod transport;

pub use classify::{classify_response, GatewayFailure, GATEWAY_PAGES};
pub use executor::TransportExecutor;
pub use queue::{LaneGuard, RequestLane};
#[cfg(feature = "http")]
pub use transport::ReqwestTransport;
pub use transport::{HttpRequest, HttpResponse, Transport, TransportError};
