//! Free-index search.
//!
//! Entities are created with contiguous indices starting at 0, so "is index `i` used"
//! is monotone: true below some boundary `n`, false from `n` on. The search finds `n`
//! with an exponential phase that looks for an unused upper bound, followed by a
//! binary search between the last used and the first unused index seen. Each probe is
//! an existence check against the entity store, so the probe count stays logarithmic in
//! the number of existing entities.

use std::convert::Infallible;

/// First index probed after index 0 turns out to be used.
pub const FIRST_PROBE: u32 = 100;

/// Returns the first unused index, or `None` when every `u32` index is in use.
pub fn find_free_index(mut probe: impl FnMut(u32) -> bool) -> Option<u32> {
    match try_find_free_index(|index| Ok::<bool, Infallible>(probe(index))) {
        Ok(found) => found,
        Err(never) => match never {},
    }
}

/// Like [`find_free_index`] with a fallible probe. The first probe error aborts the search.
pub fn try_find_free_index<E>(
    mut probe: impl FnMut(u32) -> Result<bool, E>,
) -> Result<Option<u32>, E> {
    if !probe(0)? {
        return Ok(Some(0));
    }

    let mut last_found = 0u32;
    let mut last_failed: Option<u32> = None;
    let mut current = FIRST_PROBE;
    let mut probes = 1u32;

    loop {
        probes += 1;
        if probe(current)? {
            last_found = current;
        } else {
            last_failed = Some(current);
        }

        match last_failed {
            None => {
                if current == u32::MAX {
                    tracing::warn!("Index space exhausted after {} probes", probes);
                    return Ok(None);
                }
                current = current.saturating_mul(2);
            }
            // last_found < failed holds throughout: both only move towards each other
            Some(failed) if failed - last_found == 1 => {
                tracing::debug!("Found free index {} after {} probes", failed, probes);
                return Ok(Some(failed));
            }
            Some(failed) => {
                current = last_found + (failed - last_found) / 2;
            }
        }
    }
}
