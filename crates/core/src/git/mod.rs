//! Git branch discovery for the remote mirror path.

pub mod client;

pub use client::GitClient;
