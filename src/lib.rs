pub mod agent;
pub mod config;
pub mod errors;
pub mod logging;
pub mod util;
pub mod workflow;
