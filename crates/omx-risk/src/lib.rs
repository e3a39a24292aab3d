//! Pre-trade risk state for the omx venue gateway.
//!
//! Three leaf structures, each with an eager-reserve / precise-release
//! discipline:
//! - `Exposure`: remaining purchasing power
//! - `ValidationOrderBook`: own resting levels + long position, for
//!   crossing and position checks
//! - `ThrottleTracker`: sliding-window order rate budget

pub mod book;
pub mod error;
pub mod exposure;
pub mod throttle;

pub use book::{Position, ValidationOrderBook};
pub use error::{RiskError, RiskResult};
pub use exposure::Exposure;
pub use throttle::ThrottleTracker;
