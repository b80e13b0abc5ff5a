//! Pure transformations: range planning and rate estimation.

mod range;
mod rate;

pub use range::{ByteRange, next_range, ranges};
pub use rate::{RateMeter, estimate_eta};
