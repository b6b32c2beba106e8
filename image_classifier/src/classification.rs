use crate::config::OutputActivation;

#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub index: usize,
    pub score: f32,
    pub label: String,
}

/// Ranked categories for one submitted frame, tagged with the timestamp the
/// frame was submitted with.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClassifierResult {
    pub categories: Vec<Category>,
    pub timestamp_ms: u64,
}

impl ClassifierResult {
    pub fn top(&self) -> Option<&Category> {
        self.categories.first()
    }
}

impl OutputActivation {
    pub fn apply(&self, scores: &mut [f32]) {
        match self {
            OutputActivation::None => {}
            OutputActivation::Sigmoid => {
                for score in scores.iter_mut() {
                    *score = 1.0 / (1.0 + (-*score).exp());
                }
            }
            OutputActivation::Softmax => {
                let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
                let mut sum = 0.0;
                for score in scores.iter_mut() {
                    *score = (*score - max).exp();
                    sum += *score;
                }
                if sum > 0.0 {
                    for score in scores.iter_mut() {
                        *score /= sum;
                    }
                }
            }
        }
    }
}

/// Keeps scores at or above `threshold`, best first, at most `max_results`
/// of them (`-1` keeps all).
pub fn rank_categories(
    scores: &[f32],
    labels: &[String],
    threshold: f32,
    max_results: i32,
) -> Vec<Category> {
    let mut categories: Vec<Category> = scores
        .iter()
        .enumerate()
        .filter(|(_, score)| **score >= threshold)
        .map(|(index, score)| Category {
            index,
            score: *score,
            label: labels
                .get(index)
                .cloned()
                .unwrap_or_else(|| format!("class_{}", index)),
        })
        .collect();

    categories.sort_by(|a, b| b.score.total_cmp(&a.score));

    if max_results >= 0 {
        categories.truncate(max_results as usize);
    }

    categories
}
