//! Vector scoring used to rank chunks and tools.

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};

fn dimension_mismatch(a: usize, b: usize) -> Error {
    Error::invalid_argument(
        format!("vector dimensions must match: {} != {}", a, b),
        ErrorContext::new().with_source("similarity"),
    )
}

pub fn dot_product(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(dimension_mismatch(a.len(), b.len()));
    }
    Ok(a.iter().zip(b.iter()).map(|(x, y)| x * y).sum())
}

pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

pub fn normalize_vector(v: &[f32]) -> Vec<f32> {
    let mag = magnitude(v);
    if mag == 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / mag).collect()
}

/// Zero vectors score 0 against everything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    let dot = dot_product(a, b)?;
    let mag_a = magnitude(a);
    let mag_b = magnitude(b);
    if mag_a == 0.0 || mag_b == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (mag_a * mag_b))
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(dimension_mismatch(a.len(), b.len()));
    }
    Ok(a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    #[default]
    Cosine,
    Euclidean,
    DotProduct,
}

impl SimilarityMetric {
    pub fn score(self, a: &[f32], b: &[f32]) -> Result<f32> {
        match self {
            SimilarityMetric::Cosine => cosine_similarity(a, b),
            SimilarityMetric::Euclidean => euclidean_distance(a, b),
            SimilarityMetric::DotProduct => dot_product(a, b),
        }
    }

    /// Distances rank ascending, similarities descending.
    pub fn higher_is_better(self) -> bool {
        !matches!(self, SimilarityMetric::Euclidean)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityResult {
    pub index: usize,
    pub score: f32,
}

/// Best `top_k` candidates, best first. Ties keep candidate order.
///
/// Candidates whose dimension differs from `query` are skipped.
pub fn find_most_similar<'a, I>(
    query: &[f32],
    candidates: I,
    top_k: usize,
    metric: SimilarityMetric,
) -> Vec<SimilarityResult>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut scores: Vec<SimilarityResult> = candidates
        .into_iter()
        .enumerate()
        .filter_map(|(i, c)| {
            metric
                .score(query, c)
                .ok()
                .map(|s| SimilarityResult { index: i, score: s })
        })
        .collect();
    if metric.higher_is_better() {
        scores.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    } else {
        scores.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal));
    }
    scores.truncate(top_k);
    scores
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-6;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn cosine_basics() {
        assert!(approx_eq(cosine_similarity(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]).unwrap(), 1.0));
        assert!(approx_eq(cosine_similarity(&[1.0, 2.0], &[-1.0, -2.0]).unwrap(), -1.0));
        assert!(approx_eq(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).unwrap(), 0.0));
        assert!(approx_eq(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]).unwrap(), 0.0));
    }

    #[test]
    fn dimension_mismatch_is_invalid_argument() {
        let err = dot_product(&[1.0, 2.0], &[1.0]).unwrap_err();
        assert_eq!(err.kind(), crate::error_kind::ErrorKind::InvalidArgument);
        assert!(euclidean_distance(&[1.0], &[1.0, 2.0]).is_err());
    }

    #[test]
    fn normalize_keeps_direction() {
        let n = normalize_vector(&[3.0, 4.0]);
        assert!(approx_eq(n[0], 0.6));
        assert!(approx_eq(n[1], 0.8));
        assert_eq!(normalize_vector(&[0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn ranking_by_metric() {
        let query = [1.0f32, 0.0];
        let candidates: Vec<Vec<f32>> = vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![0.7, 0.7]];
        let top = find_most_similar(&query, candidates.iter().map(Vec::as_slice), 2, SimilarityMetric::Cosine);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].index, 1);
        assert_eq!(top[1].index, 2);

        let origin = [0.0f32, 0.0];
        let near: Vec<Vec<f32>> = vec![vec![3.0, 4.0], vec![0.5, 0.5], vec![1.0, 0.0]];
        let top = find_most_similar(&origin, near.iter().map(Vec::as_slice), 1, SimilarityMetric::Euclidean);
        assert_eq!(top[0].index, 1);
    }

    #[test]
    fn mismatched_candidates_skipped() {
        let candidates: Vec<Vec<f32>> = vec![vec![1.0], vec![1.0, 0.0]];
        let top = find_most_similar(&[1.0, 0.0], candidates.iter().map(Vec::as_slice), 5, SimilarityMetric::Cosine);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].index, 1);
    }
}
