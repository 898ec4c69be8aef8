use ndarray::ArrayView1;

/// Scales `vector` to unit L2 length. Returns `None` for empty, zero or
/// non-finite input.
pub fn l2_normalize(vector: &[f32]) -> Option<Vec<f32>> {
    if vector.is_empty() || vector.iter().any(|x| !x.is_finite()) {
        return None;
    }

    // Divide by the largest component first so the squares neither overflow
    // nor underflow.
    let view = ArrayView1::from(vector);
    let max_abs = view.fold(0.0f32, |acc, x| acc.max(x.abs()));
    if max_abs == 0.0 {
        return None;
    }
    let scaled = view.mapv(|x| x / max_abs);
    let norm = scaled.dot(&scaled).sqrt();

    Some(scaled.mapv(|x| x / norm).to_vec())
}

pub fn l2_norm(vector: &[f32]) -> f32 {
    let view = ArrayView1::from(vector);
    view.dot(&view).sqrt()
}

pub fn cosine_similarity(query: &[f32], candidate: &[f32]) -> f32 {
    if query.len() != candidate.len() || query.is_empty() {
        return 0.0;
    }

    let query_view = ArrayView1::from(query);
    let candidate_view = ArrayView1::from(candidate);

    let dot = query_view.dot(&candidate_view);
    let denom = query_view.dot(&query_view).sqrt() * candidate_view.dot(&candidate_view).sqrt();
    if denom <= 0.0 {
        0.0
    } else {
        dot / denom
    }
}

/// Ranks candidates by cosine similarity, best first. Equal scores keep
/// their input order, so callers control the tie-break by how they order
/// `candidates`. A NaN score ranks below every real one.
pub fn rank_descending_by_cosine<V: AsRef<[f32]>>(
    query: &[f32],
    candidates: &[V],
) -> Vec<(usize, f32)> {
    let mut scores: Vec<(usize, f32)> = candidates
        .iter()
        .enumerate()
        .map(|(idx, candidate)| (idx, rank_score(cosine_similarity(query, candidate.as_ref()))))
        .collect();

    // sort_by is stable
    scores.sort_by(|left, right| right.1.total_cmp(&left.1));
    scores
}

fn rank_score(score: f32) -> f32 {
    if score.is_nan() {
        f32::NEG_INFINITY
    } else if score == 0.0 {
        // total_cmp orders -0.0 below 0.0
        0.0
    } else {
        score
    }
}
