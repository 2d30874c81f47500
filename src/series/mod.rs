//! Reconciliation of upstream rolling windows with the persisted daily series.

pub mod anchor;
pub mod gaps;
pub mod merge;
pub mod referrers;
pub mod trim;

pub use anchor::{latest_date, resolve_anchor, AnchorFallback};
pub use gaps::fill_gaps;
pub use merge::{complete_series, merge};
pub use referrers::{reconcile, ReferrerBlock, REFERRER_BLOCK_WIDTH};
pub use trim::{trim, DEFAULT_RETENTION_DAYS};
