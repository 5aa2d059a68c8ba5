//! CLI command implementations.
//!
//! | Module    | Commands handled |
//! |-----------|------------------|
//! | `init`    | `Init`           |
//! | `serve`   | `Serve`          |
//! | `admin`   | `CreateAdmin`    |
//! | `config`  | `Config`         |

pub mod admin;
pub mod config;
pub mod init;
pub mod serve;

pub use admin::cmd_create_admin;
pub use config::cmd_config;
pub use init::cmd_init;
pub use serve::cmd_serve;
