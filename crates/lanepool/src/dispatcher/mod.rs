//! Sharded dispatcher: lanes, their worker threads, and the handle producers
//! submit through.
//!
//! ## Structure
//!
//! - `manager` - [`Dispatcher`], lane selection, submission and shutdown.
//! - `lane` - one bounded MPSC buffer of task envelopes.
//! - `worker` - the loop each lane's dedicated thread runs.

mod lane;
mod manager;
mod worker;


pub use manager::*;
pub use worker::DispatcherStats;
