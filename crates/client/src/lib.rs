//! REST implementation of [`procura_core::ProcurementBackend`].

pub mod http;

pub use http::{HttpProcurementBackend, IDEMPOTENCY_HEADER};
