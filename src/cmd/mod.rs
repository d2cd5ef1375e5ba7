//! CLI command implementations.
//!
//! | Module   | Commands handled          |
//! |----------|---------------------------|
//! | `run`    | `Run`, `All`, `Clean`     |
//! | `watch`  | `Watch`                   |
//! | `config` | `Config`                  |

pub mod config;
pub mod run;
pub mod watch;

pub use config::cmd_config;
pub use run::{cmd_all, cmd_clean, cmd_run};
pub use watch::cmd_watch;
