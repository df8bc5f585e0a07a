//! Clustering quality analysis.
//!
//! Scores an externally computed partition of embedding vectors. Nothing
//! here creates, merges, or splits clusters; labels are opaque tokens that
//! are only compared for equality (their ordering is used solely to make
//! output deterministic).
//!
//! # Algorithm
//!
//! 1. Validate the vectors (shared non-zero dimension, finite, non-zero
//!    norm) and that there is exactly one label per vector.
//! 2. Compute the N×N cosine similarity matrix once.
//! 3. **Cohesion** per label: mean similarity over all unordered member
//!    pairs; `1.0` for a cluster with fewer than two members.
//! 4. **Separation**: mean similarity over all unordered pairs whose
//!    members carry different labels; `0.0` with fewer than two labels.
//!
//! Both metrics read the same matrix. Inputs are never mutated and the
//! analysis is side-effect free, so it can be repeated with different
//! assignments over the same vectors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::embedding::{cosine_similarity, l2_norm};
use crate::error::ValidationError;

/// An opaque cluster label.
pub type ClusterLabel = i64;

/// Cohesion reported for a cluster with fewer than two members.
pub const SINGLETON_COHESION: f64 = 1.0;

/// Separation reported when fewer than two labels exist.
pub const SINGLE_CLUSTER_SEPARATION: f64 = 0.0;

/// One label per vector, by index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterAssignment(Vec<ClusterLabel>);

impl ClusterAssignment {
    pub fn new(labels: Vec<ClusterLabel>) -> Self {
        Self(labels)
    }

    pub fn labels(&self) -> &[ClusterLabel] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Member indices per label, in index order.
    pub fn groups(&self) -> BTreeMap<ClusterLabel, Vec<usize>> {
        let mut groups: BTreeMap<ClusterLabel, Vec<usize>> = BTreeMap::new();
        for (idx, &label) in self.0.iter().enumerate() {
            groups.entry(label).or_default().push(idx);
        }
        groups
    }
}

impl From<Vec<ClusterLabel>> for ClusterAssignment {
    fn from(labels: Vec<ClusterLabel>) -> Self {
        Self(labels)
    }
}

/// Similarity measure used by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMetric {
    Cosine,
}

/// Cohesion and separation summary for one assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityStats {
    pub per_cluster_cohesion: BTreeMap<ClusterLabel, f64>,
    pub mean_inter_cluster_similarity: f64,
    pub metric: SimilarityMetric,
}

/// Mean similarity between the members of two specific clusters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterPairSimilarity {
    pub left: ClusterLabel,
    pub right: ClusterLabel,
    pub mean_similarity: f64,
    pub pair_count: usize,
}

/// [`SimilarityStats`] plus the per-cluster-pair separation breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    #[serde(flatten)]
    pub stats: SimilarityStats,
    pub pairwise: Vec<ClusterPairSimilarity>,
}

/// Symmetric pairwise cosine similarity matrix.
#[derive(Debug, Clone)]
pub struct SimilarityMatrix {
    n: usize,
    values: Vec<f64>,
}

impl SimilarityMatrix {
    /// Validate `vectors` and compute every pairwise similarity once.
    pub fn compute(vectors: &[Vec<f32>]) -> Result<Self, ValidationError> {
        validate_vectors(vectors)?;

        let n = vectors.len();
        let mut values = vec![0.0f64; n * n];
        for i in 0..n {
            values[i * n + i] = 1.0;
            for j in (i + 1)..n {
                let sim = cosine_similarity(&vectors[i], &vectors[j]);
                values[i * n + j] = sim;
                values[j * n + i] = sim;
            }
        }

        Ok(Self { n, values })
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.n + j]
    }
}

fn validate_vectors(vectors: &[Vec<f32>]) -> Result<(), ValidationError> {
    let Some(first) = vectors.first() else {
        return Ok(());
    };
    let expected = first.len();

    for (index, v) in vectors.iter().enumerate() {
        if v.is_empty() {
            return Err(ValidationError::EmptyVector { index });
        }
        if v.len() != expected {
            return Err(ValidationError::DimensionMismatch {
                index,
                expected,
                found: v.len(),
            });
        }
        if v.iter().any(|x| !x.is_finite()) {
            return Err(ValidationError::NonFiniteComponent { index });
        }
        if l2_norm(v) == 0.0 {
            return Err(ValidationError::ZeroNorm { index });
        }
    }
    Ok(())
}

/// Mean similarity over all unordered pairs of `members`.
pub fn cohesion(matrix: &SimilarityMatrix, members: &[usize]) -> f64 {
    if members.len() < 2 {
        return SINGLETON_COHESION;
    }

    let mut sum = 0.0;
    let mut count = 0usize;
    for (a, &i) in members.iter().enumerate() {
        for &j in &members[a + 1..] {
            sum += matrix.get(i, j);
            count += 1;
        }
    }
    sum / count as f64
}

/// Mean similarity over all unordered pairs drawn from different labels.
pub fn separation(matrix: &SimilarityMatrix, labels: &[ClusterLabel]) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for i in 0..labels.len() {
        for j in (i + 1)..labels.len() {
            if labels[i] != labels[j] {
                sum += matrix.get(i, j);
                count += 1;
            }
        }
    }

    if count == 0 {
        SINGLE_CLUSTER_SEPARATION
    } else {
        sum / count as f64
    }
}

/// Mean similarity for every pair of distinct labels, ordered by label.
pub fn separation_breakdown(
    matrix: &SimilarityMatrix,
    groups: &BTreeMap<ClusterLabel, Vec<usize>>,
) -> Vec<ClusterPairSimilarity> {
    let labels: Vec<(&ClusterLabel, &Vec<usize>)> = groups.iter().collect();
    let mut out = Vec::new();

    for (a, (&left, left_members)) in labels.iter().enumerate() {
        for (&right, right_members) in &labels[a + 1..] {
            let mut sum = 0.0;
            for &i in left_members.iter() {
                for &j in right_members.iter() {
                    sum += matrix.get(i, j);
                }
            }
            let pair_count = left_members.len() * right_members.len();
            out.push(ClusterPairSimilarity {
                left,
                right,
                mean_similarity: if pair_count == 0 {
                    SINGLE_CLUSTER_SEPARATION
                } else {
                    sum / pair_count as f64
                },
                pair_count,
            });
        }
    }

    out
}

/// Capability for scoring a partition of vectors.
pub trait ClusterQuality {
    /// Cohesion per label and overall separation.
    fn similarity_stats(
        &self,
        vectors: &[Vec<f32>],
        assignment: &ClusterAssignment,
    ) -> Result<SimilarityStats, ValidationError>;

    /// [`similarity_stats`](ClusterQuality::similarity_stats) plus the
    /// per-cluster-pair breakdown.
    fn quality_report(
        &self,
        vectors: &[Vec<f32>],
        assignment: &ClusterAssignment,
    ) -> Result<QualityReport, ValidationError>;
}

/// The cosine-similarity [`ClusterQuality`] implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct CosineQuality;

impl CosineQuality {
    fn prepare(
        vectors: &[Vec<f32>],
        assignment: &ClusterAssignment,
    ) -> Result<SimilarityMatrix, ValidationError> {
        if assignment.len() != vectors.len() {
            return Err(ValidationError::LabelCountMismatch {
                labels: assignment.len(),
                vectors: vectors.len(),
            });
        }
        SimilarityMatrix::compute(vectors)
    }

    fn stats_from(
        matrix: &SimilarityMatrix,
        assignment: &ClusterAssignment,
        groups: &BTreeMap<ClusterLabel, Vec<usize>>,
    ) -> SimilarityStats {
        let per_cluster_cohesion = groups
            .iter()
            .map(|(&label, members)| (label, cohesion(matrix, members)))
            .collect();
        SimilarityStats {
            per_cluster_cohesion,
            mean_inter_cluster_similarity: separation(matrix, assignment.labels()),
            metric: SimilarityMetric::Cosine,
        }
    }
}

impl ClusterQuality for CosineQuality {
    fn similarity_stats(
        &self,
        vectors: &[Vec<f32>],
        assignment: &ClusterAssignment,
    ) -> Result<SimilarityStats, ValidationError> {
        let matrix = Self::prepare(vectors, assignment)?;
        Ok(Self::stats_from(&matrix, assignment, &assignment.groups()))
    }

    fn quality_report(
        &self,
        vectors: &[Vec<f32>],
        assignment: &ClusterAssignment,
    ) -> Result<QualityReport, ValidationError> {
        let matrix = Self::prepare(vectors, assignment)?;
        let groups = assignment.groups();
        Ok(QualityReport {
            stats: Self::stats_from(&matrix, assignment, &groups),
            pairwise: separation_breakdown(&matrix, &groups),
        })
    }
}

/// Score `assignment` over `vectors` with [`CosineQuality`].
pub fn similarity_stats(
    vectors: &[Vec<f32>],
    assignment: &ClusterAssignment,
) -> Result<SimilarityStats, ValidationError> {
    CosineQuality.similarity_stats(vectors, assignment)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn vectors() -> Vec<Vec<f32>> {
        vec![
            vec![1.0, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![0.0, 2.0],
        ]
    }

    #[test]
    fn test_well_separated_clusters() {
        let stats = similarity_stats(&vectors(), &vec![7, 7, 3, 3].into()).unwrap();
        assert!(close(stats.per_cluster_cohesion[&7], 1.0));
        assert!(close(stats.per_cluster_cohesion[&3], 1.0));
        assert!(close(stats.mean_inter_cluster_similarity, 0.0));
        assert_eq!(stats.metric, SimilarityMetric::Cosine);
    }

    #[test]
    fn test_mixed_clusters() {
        // Cluster 0 = {e1, e2}: cohesion 0. Cluster 1 = {e1, e2 scaled}: cohesion 0.
        // Cross pairs: (0,1)=1, (0,3)=0, (2,1)=0, (2,3)=1 → 0.5.
        let stats = similarity_stats(&vectors(), &vec![0, 1, 0, 1].into()).unwrap();
        assert!(close(stats.per_cluster_cohesion[&0], 0.0));
        assert!(close(stats.per_cluster_cohesion[&1], 0.0));
        assert!(close(stats.mean_inter_cluster_similarity, 0.5));
    }

    #[test]
    fn test_single_cluster_separation_is_zero() {
        let stats = similarity_stats(&vectors(), &vec![5, 5, 5, 5].into()).unwrap();
        assert_eq!(stats.mean_inter_cluster_similarity, 0.0);
        assert_eq!(stats.per_cluster_cohesion.len(), 1);
        // Pairs: (0,1)=1, (2,3)=1, four orthogonal pairs = 0 → 2/6.
        assert!(close(stats.per_cluster_cohesion[&5], 2.0 / 6.0));
    }

    #[test]
    fn test_all_singletons_have_unit_cohesion() {
        let vs = vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![-1.0, 0.0]];
        let stats = similarity_stats(&vs, &vec![10, 20, 30].into()).unwrap();
        assert_eq!(stats.per_cluster_cohesion.len(), 3);
        for c in stats.per_cluster_cohesion.values() {
            assert_eq!(*c, SINGLETON_COHESION);
        }
        // (0,1)=0, (0,2)=-1, (1,2)=0 → -1/3.
        assert!(close(stats.mean_inter_cluster_similarity, -1.0 / 3.0));
    }

    #[test]
    fn test_empty_input() {
        let stats = similarity_stats(&[], &ClusterAssignment::new(Vec::new())).unwrap();
        assert!(stats.per_cluster_cohesion.is_empty());
        assert_eq!(stats.mean_inter_cluster_similarity, 0.0);
    }

    #[test]
    fn test_label_count_mismatch() {
        let err = similarity_stats(&vectors(), &vec![0, 1].into()).unwrap_err();
        assert_eq!(
            err,
            ValidationError::LabelCountMismatch {
                labels: 2,
                vectors: 4
            }
        );
    }

    #[test]
    fn test_rejects_malformed_vectors() {
        let mismatch = vec![vec![1.0, 0.0], vec![1.0]];
        assert!(matches!(
            SimilarityMatrix::compute(&mismatch),
            Err(ValidationError::DimensionMismatch { index: 1, .. })
        ));

        let zero = vec![vec![1.0, 0.0], vec![0.0, 0.0]];
        assert!(matches!(
            SimilarityMatrix::compute(&zero),
            Err(ValidationError::ZeroNorm { index: 1 })
        ));

        let nan = vec![vec![f32::NAN, 1.0]];
        assert!(matches!(
            SimilarityMatrix::compute(&nan),
            Err(ValidationError::NonFiniteComponent { index: 0 })
        ));

        let empty = vec![Vec::new()];
        assert!(matches!(
            SimilarityMatrix::compute(&empty),
            Err(ValidationError::EmptyVector { index: 0 })
        ));
    }

    #[test]
    fn test_matrix_symmetric_with_unit_diagonal() {
        let m = SimilarityMatrix::compute(&vectors()).unwrap();
        assert_eq!(m.len(), 4);
        for i in 0..4 {
            assert_eq!(m.get(i, i), 1.0);
            for j in 0..4 {
                assert_eq!(m.get(i, j), m.get(j, i));
                assert!((-1.0..=1.0).contains(&m.get(i, j)));
            }
        }
    }

    #[test]
    fn test_breakdown_per_label_pair() {
        let assignment: ClusterAssignment = vec![0, 1, 2, 2].into();
        let report = CosineQuality
            .quality_report(&vectors(), &assignment)
            .unwrap();
        let pairs: Vec<(i64, i64)> = report.pairwise.iter().map(|p| (p.left, p.right)).collect();
        assert_eq!(pairs, vec![(0, 1), (0, 2), (1, 2)]);
        assert!(close(report.pairwise[0].mean_similarity, 1.0));
        assert_eq!(report.pairwise[1].pair_count, 2);
        assert!(close(report.pairwise[1].mean_similarity, 0.0));
        assert_eq!(
            report.stats,
            similarity_stats(&vectors(), &assignment).unwrap()
        );
    }

    #[test]
    fn test_idempotent_and_input_untouched() {
        let vs = vectors();
        let assignment: ClusterAssignment = vec![1, 1, 2, 2].into();
        let a = similarity_stats(&vs, &assignment).unwrap();
        let b = similarity_stats(&vs, &assignment).unwrap();
        assert_eq!(a, b);
        assert_eq!(vs, vectors());
        assert_eq!(assignment.labels(), &[1, 1, 2, 2]);
    }

    #[test]
    fn test_stats_serialize_with_metric_name() {
        let stats = similarity_stats(&vectors(), &vec![0, 0, 1, 1].into()).unwrap();
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["metric"], "cosine");
        assert!(json["per_cluster_cohesion"]["0"].is_number());
    }
}
