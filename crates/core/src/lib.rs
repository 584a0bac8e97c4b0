#![forbid(unsafe_code)]

pub mod model;
pub mod time;

pub use model::summarize;
pub use time::Clock;
