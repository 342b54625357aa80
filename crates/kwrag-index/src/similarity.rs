use kwrag_core::{IndexError, IndexResult};
use serde::{Deserialize, Serialize};

/// A scoring function over two vectors where higher means more similar.
///
/// Implemented by [`Metric`] and by any closure or function item with the
/// signature `Fn(&[f32], &[f32]) -> IndexResult<f32>`, so search can be
/// driven by a caller-supplied metric.
pub trait Scorer: Send + Sync {
    /// Score `candidate` against `query`.
    fn score(&self, query: &[f32], candidate: &[f32]) -> IndexResult<f32>;
}

impl<F> Scorer for F
where
    F: Fn(&[f32], &[f32]) -> IndexResult<f32> + Send + Sync,
{
    fn score(&self, query: &[f32], candidate: &[f32]) -> IndexResult<f32> {
        self(query, candidate)
    }
}

/// Built-in scoring metrics, selectable from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Cosine similarity (default).
    #[default]
    Cosine,
    /// Raw dot product.
    Dot,
    /// Euclidean distance, negated so that higher is better.
    Euclidean,
}

impl Scorer for Metric {
    fn score(&self, query: &[f32], candidate: &[f32]) -> IndexResult<f32> {
        match self {
            Metric::Cosine => cosine_similarity(query, candidate),
            Metric::Dot => dot_product(query, candidate),
            Metric::Euclidean => negative_euclidean(query, candidate),
        }
    }
}

/// Euclidean norm of a vector.
pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity between two vectors: `dot(a, b) / (|a| * |b|)`.
///
/// Fails with [`IndexError::InvalidVector`] when the vectors are empty, differ
/// in length, contain a non-finite component, or either has a zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> IndexResult<f32> {
    check_pair(a, b)?;
    let na = magnitude(a);
    let nb = magnitude(b);
    if na == 0.0 || nb == 0.0 {
        return Err(IndexError::InvalidVector(
            "cosine similarity is undefined for a zero-norm vector".to_string(),
        ));
    }
    Ok(dot(a, b) / (na * nb))
}

/// Dot product of two vectors.
pub fn dot_product(a: &[f32], b: &[f32]) -> IndexResult<f32> {
    check_pair(a, b)?;
    Ok(dot(a, b))
}

/// Negated Euclidean distance, so identical vectors score `0.0` and
/// everything else scores below it.
pub fn negative_euclidean(a: &[f32], b: &[f32]) -> IndexResult<f32> {
    check_pair(a, b)?;
    let sum: f32 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
    Ok(-sum.sqrt())
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn check_pair(a: &[f32], b: &[f32]) -> IndexResult<()> {
    if a.is_empty() || b.is_empty() {
        return Err(IndexError::InvalidVector("empty vector".to_string()));
    }
    if a.len() != b.len() {
        return Err(IndexError::InvalidVector(format!(
            "dimension mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    if a.iter().chain(b).any(|x| !x.is_finite()) {
        return Err(IndexError::InvalidVector(
            "vector contains a non-finite component".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_identical() {
        let v = vec![0.3, -1.2, 4.0];
        assert!((cosine_similarity(&v, &v).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).unwrap().abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b).unwrap() + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_symmetric() {
        let pairs = [
            (vec![1.0, 2.0, 3.0], vec![-4.0, 0.5, 2.0]),
            (vec![0.1, 0.1], vec![9.0, -3.0]),
            (vec![5.0], vec![-2.0]),
        ];
        for (a, b) in &pairs {
            let ab = cosine_similarity(a, b).unwrap();
            let ba = cosine_similarity(b, a).unwrap();
            assert!((ab - ba).abs() < 1e-6, "{ab} != {ba}");
        }
    }

    #[test]
    fn test_cosine_ignores_magnitude() {
        let a = vec![1.0, 2.0];
        let b = vec![10.0, 20.0];
        assert!((cosine_similarity(&a, &b).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_norm_rejected() {
        let err = cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).unwrap_err();
        assert!(matches!(err, IndexError::InvalidVector(_)));
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        for scorer in [Metric::Cosine, Metric::Dot, Metric::Euclidean] {
            let err = scorer.score(&[1.0, 0.0], &[1.0, 0.0, 0.0]).unwrap_err();
            assert!(matches!(err, IndexError::InvalidVector(_)));
        }
    }

    #[test]
    fn test_empty_and_non_finite_rejected() {
        assert!(dot_product(&[], &[]).is_err());
        assert!(dot_product(&[f32::NAN], &[1.0]).is_err());
        assert!(negative_euclidean(&[1.0], &[f32::INFINITY]).is_err());
    }

    #[test]
    fn test_dot_product() {
        assert_eq!(dot_product(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]).unwrap(), 32.0);
    }

    #[test]
    fn test_negative_euclidean_higher_is_closer() {
        let q = [0.0, 0.0];
        let near = negative_euclidean(&q, &[1.0, 0.0]).unwrap();
        let far = negative_euclidean(&q, &[3.0, 4.0]).unwrap();
        assert_eq!(negative_euclidean(&q, &q).unwrap(), 0.0);
        assert!((far + 5.0).abs() < 1e-6);
        assert!(near > far);
    }

    #[test]
    fn test_closure_scorer() {
        let constant = |_: &[f32], _: &[f32]| -> IndexResult<f32> { Ok(0.25) };
        assert_eq!(constant.score(&[1.0], &[2.0]).unwrap(), 0.25);

        let as_dyn: &dyn Scorer = &cosine_similarity;
        assert!((as_dyn.score(&[1.0, 1.0], &[2.0, 2.0]).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_metric_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            metric: Metric,
        }
        let w: Wrapper = toml::from_str("metric = \"euclidean\"").unwrap();
        assert_eq!(w.metric, Metric::Euclidean);
        assert_eq!(Metric::default(), Metric::Cosine);
    }
}
