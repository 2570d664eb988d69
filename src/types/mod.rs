pub mod market;
pub mod signal;

pub use market::*;
pub use signal::*;
