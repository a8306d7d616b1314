//! Training metrics logging.
//!
//! ## Loggers
//!
//! - [`ConsoleLogger`]: Pretty-printed console output
//! - [`CSVLogger`]: CSV file logging for analysis
//! - [`MemoryLogger`]: In-memory history
//! - [`MultiLogger`]: Combine multiple loggers

pub mod logger;

pub use logger::{
    CSVLogger,
    ConsoleLogger,
    MemoryLogger,
    MetricsLogger,
    MultiLogger,
    TrainingSnapshot,
};
