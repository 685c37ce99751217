//! Reverse auction for the cycle's pooled liquidity.
//!
//! The winner takes the whole liquidity of its cycle; bids only rank the
//! contenders.

use spiral_pool_core::{Bid, LowestBid};

/// Picks the winning bid: strictly lowest amount, ties to the lowest position id.
///
/// Returns `None` when nobody bid. The result does not depend on input order.
#[must_use]
pub fn resolve(bids: &[Bid]) -> Option<LowestBid> {
    bids.iter()
        .min_by_key(|bid| (bid.amount, bid.position_id))
        .map(|bid| LowestBid {
            position_id: bid.position_id,
            amount: bid.amount,
        })
}
