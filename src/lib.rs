pub mod config;
pub mod ipc;
pub mod readiness;
pub mod resolver;
pub mod shell;
pub mod supervisor;
