//! Core types for dirsnap.
//!
//! This crate provides the snapshot tree shared by the scanner, the binary
//! codec and the diff engine, along with scan configuration and errors.

mod config;
mod divergence;
mod error;
mod node;
mod tree;

pub use config::{ScanConfig, ScanConfigBuilder};
pub use divergence::{Divergence, DivergenceReason};
pub use error::{ScanError, ScanWarning, WarningKind};
pub use node::{DirectorySnapshot, FileSnapshot, SnapshotNode, snapshot_time};
pub use tree::{ScanStats, ScannedTree};
