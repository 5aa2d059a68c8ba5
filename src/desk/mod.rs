//! Help-desk back-end: storage, authentication, validation and the REST API.
//!
//! - `db`: SQLite persistence, one `impl DeskDb` block per entity
//! - `auth`: password hashing, sessions and the `CurrentAdmin` extractor
//! - `validate`: field checks shared by the handlers
//! - `api`: axum handlers mounted under `/api`
//! - `server`: router assembly and the serve loop

pub mod api;
pub mod auth;
pub mod db;
pub mod server;
pub mod validate;
