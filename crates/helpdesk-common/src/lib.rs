//! Shared domain types for the help-desk back-end.
//!
//! Everything here is plain data: the records the REST API exchanges, the
//! `{ data, message, meta? }` response envelope and the pagination math.
//! No I/O lives in this crate.

pub mod envelope;
pub mod models;
pub mod pagination;

pub use envelope::{ApiResponse, Meta};
pub use pagination::{Page, PageRequest, Pagination};
