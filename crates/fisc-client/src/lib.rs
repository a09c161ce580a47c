//! # fisc-client — Fiscal Authority Transport
//!
//! Everything between a frozen payload and a classified authority answer:
//!
//! - [`Transport`]: the send seam, with [`HttpTransport`] (reqwest),
//!   [`SimulatedTransport`] (offline sandbox) and [`MockTransport`]
//!   (scripted), unified by [`AnyTransport`].
//! - [`authority`]: per-authority URLs and authentication headers,
//!   response classification into accepted / rejected / unauthorized /
//!   transient, and the connection test.
//!
//! The HTTP transport retries only failures that happen before a
//! connection is established. Any request that may have reached the
//! authority is reported once, and the engine decides what happens next.

pub mod authority;
pub mod error;
pub mod http;
pub mod mock;
pub(crate) mod retry;
pub mod simulated;
pub mod transport;

pub use authority::{
    classify, classify_result, health_request, submit_request, test_connection,
    AuthorityReceipt, Classification,
};
pub use error::{ClientError, TransportError};
pub use http::HttpTransport;
pub use mock::MockTransport;
pub use simulated::SimulatedTransport;
pub use transport::{AnyTransport, Delivery, Method, Transport, TransportRequest, TransportResponse};
