//! `glassbox` - A workbench that makes runtime behavior observable
//!
//! This library provides small, instrumented demonstrations of object
//! protocols, memory layout and reclamation, retry control flow, and lazy
//! log pipelines, plus a `SQLite` ledger that records what each run measured.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod memory;
pub mod pipeline;
pub mod probe;
pub mod records;
pub mod registry;
pub mod retry;
pub mod storage;

pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use probe::{Probe, ProbeEvent, ProbeOp};
pub use records::RecordBook;
pub use registry::{Setting, SettingsRegistry};
pub use storage::{LedgerStats, RunLedger};
