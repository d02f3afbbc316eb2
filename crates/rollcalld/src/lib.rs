//! rollcalld — Attendance daemon library.
//!
//! The binary wires camera-frame input and operator controls around the
//! [`engine::Engine`]; everything policy-bearing lives here so it can be
//! exercised without a camera or model files.

pub mod config;
pub mod engine;

pub use config::Config;
pub use engine::{
    Announcer, Attendance, CycleOutcome, Engine, EngineError, LogAnnouncer, ScanOutcome,
};
