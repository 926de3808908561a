#![doc = include_str!("../README.md")]

mod config;
mod dispatcher;
mod error;
mod task;
mod timer;

pub use crate::config::*;
pub use crate::dispatcher::*;
pub use crate::error::*;
pub use crate::task::*;
pub use crate::timer::*;
