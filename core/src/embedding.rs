//! Text embedding seam.
//!
//! An [`Embedder`] is a pure function from text to a fixed-dimension dense
//! vector. The whole retrieval stack assumes vectors are unit-norm so that a
//! plain dot product is cosine similarity; implementations that cannot
//! guarantee normalization should run their output through [`l2_normalize`].

use core::future::Future;

/// A dense embedding vector of 32-bit floats.
pub type Embedding = Vec<f32>;

/// Converts text into a unit-norm vector of a fixed dimension.
///
/// # Implementation requirements
///
/// - [`embed`](Embedder::embed) must return vectors of length
///   [`dim`](Embedder::dim).
/// - Returned vectors must be unit-norm (‖v‖ within 1e-5 of 1.0) unless the
///   input produced a zero vector, which callers treat as "no signal".
pub trait Embedder: Send + Sync {
    /// Returns the embedding dimension.
    fn dim(&self) -> usize;

    /// Converts `text` to an embedding vector.
    fn embed(&self, text: &str) -> impl Future<Output = crate::Result<Embedding>> + Send;
}

impl<T: Embedder> Embedder for &T {
    fn dim(&self) -> usize {
        T::dim(self)
    }

    fn embed(&self, text: &str) -> impl Future<Output = crate::Result<Embedding>> + Send {
        T::embed(self, text)
    }
}

impl<T: Embedder> Embedder for std::sync::Arc<T> {
    fn dim(&self) -> usize {
        T::dim(self)
    }

    fn embed(&self, text: &str) -> impl Future<Output = crate::Result<Embedding>> + Send {
        T::embed(self, text)
    }
}

/// Scales `vec` to unit length in place.
///
/// A zero vector is left untouched; callers score it as "no signal" rather
/// than dividing by zero.
pub fn l2_normalize(vec: &mut [f32]) {
    let mag_sq: f32 = vec.iter().map(|x| x * x).sum();
    if mag_sq == 0.0 {
        return;
    }
    let mag = mag_sq.sqrt();
    for x in vec.iter_mut() {
        *x /= mag;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_to_unit_length() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
        assert!((v[0] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_unchanged() {
        let mut v = vec![0.0, 0.0, 0.0];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }

    struct FixedEmbedder {
        dimension: usize,
    }

    impl Embedder for FixedEmbedder {
        fn dim(&self) -> usize {
            self.dimension
        }

        #[allow(clippy::cast_precision_loss)]
        async fn embed(&self, text: &str) -> crate::Result<Embedding> {
            let mut v: Vec<f32> = (0..self.dimension)
                .map(|i| (text.len() + i + 1) as f32)
                .collect();
            l2_normalize(&mut v);
            Ok(v)
        }
    }

    #[tokio::test]
    async fn embedder_respects_dimension() {
        let model = FixedEmbedder { dimension: 8 };
        let v = model.embed("hello").await.unwrap();
        assert_eq!(v.len(), 8);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn embedder_through_arc() {
        let model = std::sync::Arc::new(FixedEmbedder { dimension: 3 });
        assert_eq!(model.dim(), 3);
        assert_eq!(model.embed("x").await.unwrap().len(), 3);
    }
}
