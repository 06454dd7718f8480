//! Client for the Quantive Results REST API.

mod client;
mod models;
mod transport;

pub use client::{QuantiveClient, RetryPolicy, ACCOUNT_ID_HEADER, DEFAULT_BASE_URL};
pub use models::{sessions_from_value, Session};
pub use transport::{RawResponse, ReqwestTransport, Transport};

#[cfg(test)]
pub(crate) use transport::testing;
