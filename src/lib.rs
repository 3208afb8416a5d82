#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

mod throttle;
pub use throttle::*;

mod error;
pub use error::*;

mod common;
pub use common::CallsPerMinute;

#[cfg(test)]
mod tests;
