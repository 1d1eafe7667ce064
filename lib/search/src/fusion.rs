//! Client-side score fusion
//!
//! Used when the backend leaves fused scores or rank diagnostics out of a
//! hybrid result set.

/// Reciprocal rank fusion constant
pub const RRF_K: f64 = 60.0;

/// Weighted reciprocal rank fusion: `Σ w / (K + rank)` over 1-based ranks
#[inline]
pub fn rrf_score(weighted_ranks: &[(f64, usize)]) -> f64 {
    weighted_ranks
        .iter()
        .map(|&(weight, rank)| weight / (RRF_K + rank as f64))
        .sum()
}

/// Linear fusion of vector similarity and text score
#[inline]
pub fn weighted_score(vector_weight: f64, vector_score: f64, text_weight: f64, text_score: f64) -> f64 {
    vector_weight * vector_score + text_weight * text_score
}

/// 1-based rank of every score within `scores`, highest score first. Ties
/// keep their input order.
pub fn ranks(scores: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut ranks = vec![0; scores.len()];
    for (position, index) in order.into_iter().enumerate() {
        ranks[index] = position + 1;
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rrf_score() {
        let single = rrf_score(&[(1.0, 1)]);
        assert!((single - 1.0 / 61.0).abs() < 1e-12);

        let fused = rrf_score(&[(0.6, 1), (0.4, 3)]);
        assert!((fused - (0.6 / 61.0 + 0.4 / 63.0)).abs() < 1e-12);
    }

    #[test]
    fn test_weighted_score() {
        let combined = weighted_score(0.6, 0.8, 0.4, 0.5);
        assert!((combined - 0.68).abs() < 1e-12);
    }

    #[test]
    fn test_ranks() {
        assert_eq!(ranks(&[0.2, 0.9, 0.5]), vec![3, 1, 2]);
        assert_eq!(ranks(&[0.5, 0.5, 0.1]), vec![1, 2, 3]);
        assert!(ranks(&[]).is_empty());
    }
}
