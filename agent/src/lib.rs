//! `logrelay-agent`: discovers log files by glob, tails them across
//! rotations, and streams appended bytes to a `logrelay-server` (spec
//! §4.1-§4.4).

pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod follower;
pub mod scanner;
pub mod tls;
pub mod watcher;

pub use config::Config;
pub use context::AgentContext;
