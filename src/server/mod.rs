//! HTTP transport for registry lookups.

pub mod http;

pub use http::HttpServer;
