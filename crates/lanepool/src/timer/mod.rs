mod countdown;
mod pool;

pub use countdown::*;
pub use pool::*;
