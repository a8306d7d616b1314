//! Algorithm components.
//!
//! - `pdqn`: Parametrized deep Q-network (actor/critic traits, agent,
//!   gradient shaping, exploration)

pub mod pdqn;
