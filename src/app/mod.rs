pub mod calc;
pub mod portfolio;
pub mod utils;

pub use calc::{FifoCalculator, Position, SellOutcome};
pub use portfolio::Portfolio;
