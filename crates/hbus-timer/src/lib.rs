//! Wall-clock aligned periodic timer, grounded on `shc.timer.Every`.

pub mod schedule;
pub mod timer;

pub use schedule::{sleep_until_logarithmic, Every, RandomFn};
pub use timer::{spawn, Timer, TimerTaskHandle};
