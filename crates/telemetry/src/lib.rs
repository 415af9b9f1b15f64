//! Cost estimation for HikeWise assistant calls.
//!
//! Each assistant has its own per-thousand-token rate table, reflecting the
//! model behind it. The pipeline prices every successful upstream exchange
//! before handing it to the usage ledger.

pub mod pricing;

pub use pricing::{PricingTable, Rates};
