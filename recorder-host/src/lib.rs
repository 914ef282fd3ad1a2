//! # recorder-host
//!
//! Desktop backends for recorder-core.
//!
//! Provides:
//! - `FsStore`: byte store backed by a directory
//! - `SimulatedSource`: tone generator standing in for the microphone
//! - `SimulatedSink`: cursor-draining thread standing in for the speaker
//! - `cli` / `console`: argument parsing, logging setup and text output for
//!   the `wav-recorder` binary
//!
//! ## Usage
//! ```ignore
//! use recorder_core::{Recorder, RecorderConfig};
//! use recorder_host::{FsStore, SimulatedSink, SimulatedSource};
//!
//! let config = RecorderConfig::default();
//! let store = std::sync::Arc::new(FsStore::open_dir("recordings")?);
//! let source = SimulatedSource::new(&config, 440.0, true);
//! let sink = SimulatedSink::new(&config, true);
//! let mut recorder = Recorder::new(config, source, sink, store)?;
//! ```

pub mod cli;
pub mod console;
pub mod error;
pub mod fs_store;
pub mod sim_sink;
pub mod sim_source;

pub use error::HostError;
pub use fs_store::FsStore;
pub use sim_sink::SimulatedSink;
pub use sim_source::SimulatedSource;
