//! Vector math primitives shared by the embedder and the similarity engine

/// Dot product of two equal-length vectors.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Euclidean (L2) magnitude.
pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity between two vectors.
///
/// Defined as 0.0 when either vector has zero magnitude, so callers never
/// have to guard against division by zero. Both slices must have the same
/// length; the similarity engine enforces that before calling here.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mag_a = magnitude(a);
    let mag_b = magnitude(b);

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot(a, b) / (mag_a * mag_b)
}

/// Scales a vector to unit length in place. A zero vector stays zero.
pub fn l2_normalize(v: &mut [f32]) {
    let mag = magnitude(v);
    if mag > 0.0 {
        for x in v.iter_mut() {
            *x /= mag;
        }
    }
}
