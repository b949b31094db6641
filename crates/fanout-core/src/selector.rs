//! Weighted-random choice over a live analyzer snapshot.
//!
//! Selection is stateless: it needs no coordination across workers, produces
//! the correct long-run proportions, and stays correct when the live set
//! changes between successive picks. The cost is higher short-window variance,
//! which is acceptable for log fan-out.

use rand::Rng;

use crate::pool::Analyzer;

/// Picks one entry from `snapshot` with probability proportional to weight.
///
/// Returns `None` on an empty snapshot. A single entry is returned without
/// drawing. If every live weight is zero the first entry is returned.
#[must_use]
pub fn pick(snapshot: &[Analyzer]) -> Option<&Analyzer> {
    if snapshot.is_empty() {
        return None;
    }
    if snapshot.len() == 1 {
        return Some(&snapshot[0]);
    }

    let total: f64 = snapshot.iter().map(|a| a.weight).sum();
    if total <= 0.0 {
        return Some(&snapshot[0]);
    }

    let roll = rand::thread_rng().gen_range(0.0..total);
    Some(pick_at(snapshot, roll))
}

/// Deterministic inner walk: returns the first entry whose cumulative weight
/// exceeds `roll`.
fn pick_at(snapshot: &[Analyzer], roll: f64) -> &Analyzer {
    let mut cumulative = 0.0;
    for entry in snapshot {
        cumulative += entry.weight;
        if roll < cumulative {
            return entry;
        }
    }
    // Unreachable for roll in [0, total); guards against float rounding.
    &snapshot[0]
}
