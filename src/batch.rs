//! Batch planning: split an ordered asset list into transaction-sized chunks

use crate::types::AssetSpec;

/// Split `assets` into ordered batches of at most `max_ops` entries.
///
/// The concatenation of the returned batches reproduces the input exactly:
/// nothing is dropped, duplicated or reordered. An empty input yields zero
/// batches.
pub fn plan_batches(assets: &[AssetSpec], max_ops: usize) -> Vec<Vec<AssetSpec>> {
    debug_assert!(max_ops > 0, "max_ops validated at config load");
    assets
        .chunks(max_ops.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}
