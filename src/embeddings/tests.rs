use super::*;

#[test]
fn identical_vectors_have_similarity_one() {
    let v = [0.3, -1.2, 4.5, 0.01];
    assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
}

#[test]
fn zero_vector_has_similarity_zero() {
    let v = [0.3, -1.2, 4.5];
    let zero = [0.0, 0.0, 0.0];
    assert!(cosine_similarity(&v, &zero).abs() < f32::EPSILON);
    assert!(cosine_similarity(&zero, &zero).abs() < f32::EPSILON);
}

#[test]
fn opposite_and_orthogonal_vectors() {
    assert!((cosine_similarity(&[1.0, 2.0], &[-1.0, -2.0]) + 1.0).abs() < 1e-6);
    assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 3.0]).abs() < 1e-6);
}

#[test]
fn similarity_stays_within_bounds() {
    let vectors: Vec<Vec<f32>> = (1..20u8)
        .map(|seed| {
            (0..8u8)
                .map(|i| f32::from(seed.wrapping_mul(31).wrapping_add(i * 17) % 23) - 11.0)
                .collect()
        })
        .collect();

    for a in &vectors {
        for b in &vectors {
            let sim = cosine_similarity(a, b);
            assert!((-1.0..=1.0).contains(&sim), "similarity {} out of range", sim);
        }
    }
}

#[test]
fn mismatched_lengths_are_dissimilar() {
    assert!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]).abs() < f32::EPSILON);
}
