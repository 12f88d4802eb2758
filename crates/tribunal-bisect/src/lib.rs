//! Interactive bisection searches for two-party disputes.
//!
//! Both variants share the same shape: one party answers probes, the other
//! narrows the interval, and per-round deadlines let the waiting party win
//! against a silent counterparty.
//!
//! - [`time::TimeSearch`] - fan-out K search over execution time, locating
//!   the earliest step where the parties' claimed state roots diverge
//! - [`address::AddressSearch`] - binary search over memory-tree depth,
//!   narrowing a root disagreement down to a small block of words

pub mod address;
pub mod time;

pub use address::{AddressSearch, AddressSearchState};
pub use time::{TimeSearch, TimeSearchState};
