//! HTTP transport to the experimentation service.

pub mod http;

pub use http::{resolve_api_key, HttpTransport, Method, TransportError};
