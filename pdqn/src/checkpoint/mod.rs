//! Agent checkpointing.
//!
//! ## Example
//!
//! ```rust,ignore
//! use pdqn::checkpoint::{Checkpointer, CheckpointerConfig};
//!
//! let config = CheckpointerConfig::new("./checkpoints")
//!     .with_save_interval(10_000)
//!     .with_keep_last_n(5);
//!
//! let mut checkpointer = Checkpointer::new(config)?;
//!
//! // In training loop:
//! if checkpointer.should_save(step) {
//!     agent.save(&checkpointer.step_dir(step), step, Some(avg_reward))?;
//!     checkpointer.register(step, Some(avg_reward))?;
//! }
//!
//! // Resume training:
//! let latest = checkpointer.find_latest_checkpoint()?;
//! let (agent, meta) = agent.load(&latest.path)?;
//! ```

pub mod checkpointer;

pub use checkpointer::{
    load_module,
    load_record,
    read_meta,
    save_module,
    save_record,
    write_meta,
    CheckpointError,
    CheckpointInfo,
    CheckpointMeta,
    Checkpointer,
    CheckpointerConfig,
};
