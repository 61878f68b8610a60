//! # hypnogram-core
//!
//! Sleep-architecture analysis over a per-epoch sequence of stage labels.
//!
//! Given one staged night, the engine derives summary statistics (time in
//! bed, total sleep time, wake after sleep onset, latencies, efficiencies),
//! segments the night into NREM/REM cycles, and annotates every epoch with
//! flanking, transition, depth and elapsed-time measures. The crate performs
//! no I/O and carries no mutable global state.

#![deny(unsafe_code)]

pub mod boundary;
pub mod clock;
pub mod config;
pub mod cycles;
pub mod depth;
pub mod elapsed;
pub mod engine;
pub mod error;
pub mod stage;
pub mod transitions;
pub mod window;

pub use clock::ClockTime;
pub use config::Thresholds;
pub use engine::{EpochSequence, HypnogramAnalysis, analyze};
pub use error::{HypnoError, HypnoResult};
pub use stage::StageLabel;
