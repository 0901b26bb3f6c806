//! `multicall-http` is a concurrent outbound HTTP request executor.
//!
//! Heterogeneous requests (GET/POST/PUT/form/multipart/raw/custom method)
//! are queued under caller-chosen ids and drained together:
//! - [`MultiCallClient::execute_all`] — blocking drain, keyed result map
//! - [`MultiCallClient::on_response`] — per-request callbacks
//! - [`MultiCallClient::fire_and_forget`] — detached best-effort dispatch
//!
//! Concurrency is bounded by `max_concurrency`, retries follow a flat-delay
//! [`RetryPolicy`], and every per-request failure is carried as data in its
//! [`CallResult`] — the executor surfaces no errors for individual calls.

mod client;
mod error;
mod options;
mod request;
mod retry;
mod transport;
mod types;

pub use client::{MultiCallClient, ResponseCallback};
pub use error::CallError;
pub use options::{ClientOptions, TlsOptions};
pub use request::{Body, CallRequest};
pub use retry::RetryPolicy;
pub use types::CallResult;

pub(crate) type Result<T> = std::result::Result<T, CallError>;
