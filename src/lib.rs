//! Intent Bridge — routes chat messages through an NLU backend to
//! intent-keyed listeners.

pub mod bridge;
pub mod channels;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod identity;
pub mod nlu;
pub mod processor;
pub mod store;
