//! Built-in drivers.

mod mem;

pub use mem::{MemDriver, MEM_DRIVER_ID};
