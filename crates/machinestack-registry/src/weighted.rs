//! Weighted random choice.
//!
//! [`weighted_index`] is a pure function of the weights and a draw, which
//! keeps the distribution testable without a random source.

use rand::Rng;

/// A `weight` metadata value as a positive integer, or `None` if invalid.
pub fn valid_weight(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|&weight| weight > 0)
}

/// Parse a `weight` metadata value. Anything that isn't a positive integer
/// counts as 1.
pub fn parse_weight(raw: Option<&str>) -> u32 {
    raw.and_then(valid_weight).unwrap_or(1)
}

/// Sum of all weights, widened so many large weights cannot overflow.
pub fn total_weight(weights: &[u32]) -> u64 {
    weights.iter().map(|&w| u64::from(w)).sum()
}

/// Index of the first candidate whose cumulative weight exceeds `draw`.
///
/// `draw` must lie in `[0, total_weight)`; out of range returns `None`.
pub fn weighted_index(weights: &[u32], draw: u64) -> Option<usize> {
    let mut cumulative = 0u64;
    for (index, &weight) in weights.iter().enumerate() {
        cumulative += u64::from(weight);
        if draw < cumulative {
            return Some(index);
        }
    }
    None
}

/// Draw once from `rng` and return the chosen index.
///
/// Returns `None` when there are no candidates or every weight is zero.
pub fn choose_weighted<R: Rng + ?Sized>(weights: &[u32], rng: &mut R) -> Option<usize> {
    let total = total_weight(weights);
    if total == 0 {
        return None;
    }
    weighted_index(weights, rng.gen_range(0..total))
}
