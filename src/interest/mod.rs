pub mod penalty;

pub use penalty::{EarlyRepaymentQuote, PrepaymentPenalty};
