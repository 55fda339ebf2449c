pub mod fmp;
pub mod util;
pub mod yahoo_finance;

pub use util::{RetryPolicy, with_retry};
