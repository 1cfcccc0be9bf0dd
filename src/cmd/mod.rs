//! CLI command implementations.
//!
//! | Module        | Commands handled |
//! |---------------|------------------|
//! | `run`         | `Run`            |
//! | `checkpoints` | `Checkpoints`    |
//! | `config`      | `Config`         |

pub mod checkpoints;
pub mod config;
pub mod run;

pub use checkpoints::cmd_checkpoints;
pub use config::cmd_config;
pub use run::cmd_run;
