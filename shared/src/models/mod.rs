//! Domain models for the Agrocast engine

mod advisory;
mod alert;
mod forecast;
mod trend;

pub use advisory::*;
pub use alert::*;
pub use forecast::*;
pub use trend::*;
