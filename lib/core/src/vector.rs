//! Dense vector math used for embedding checks and local scoring

use crate::metadata::VectorDistance;

#[inline]
#[must_use]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[inline]
#[must_use]
pub fn norm(a: &[f32]) -> f32 {
    dot(a, a).sqrt()
}

/// Cosine similarity, 0.0 for mismatched dimensions or zero vectors
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let norm_a = norm(a);
    let norm_b = norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot(a, b) / (norm_a * norm_b)
}

/// L2 (Euclidean) distance, infinite for mismatched dimensions
#[inline]
pub fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }

    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Distance between two vectors under `function`; smaller is closer.
pub fn distance(function: VectorDistance, a: &[f32], b: &[f32]) -> f32 {
    match function {
        VectorDistance::Cosine => 1.0 - cosine_similarity(a, b),
        VectorDistance::DotProduct => 1.0 - dot(a, b),
        VectorDistance::Euclidean => l2_distance(a, b),
    }
}
