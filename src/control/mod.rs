//! Control laws.
//!
//! - [`pump`]: pressure hysteresis with stepped drive frequency and a
//!   timed flood override.

pub mod pump;
