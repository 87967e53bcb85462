use similar::{Algorithm, DiffOp, TextDiff};

/// Scores how alike two album names are.
///
/// Implementations must return a value in `[0.0, 1.0]`, be symmetric and
/// return `1.0` for a name compared with itself.
pub trait NameScorer: Send + Sync {
    fn score(&self, a: &str, b: &str) -> f64;
}

/// Case-insensitive longest-common-subsequence ratio.
///
/// `2 * matched / (len(a) + len(b))` over characters, where `matched` is the
/// LCS length found by an exact Myers diff. Two empty names score `1.0`.
/// The ratio is computed in `f64` so exact fractions such as 4/5 compare
/// equal to the matching threshold literal.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceRatio;

impl NameScorer for SequenceRatio {
    fn score(&self, a: &str, b: &str) -> f64 {
        let a = a.to_lowercase();
        let b = b.to_lowercase();
        if a == b {
            return 1.0;
        }

        let diff = TextDiff::configure()
            .algorithm(Algorithm::Myers)
            .diff_chars(a.as_str(), b.as_str());
        let matched: usize = diff
            .ops()
            .iter()
            .map(|op| match op {
                DiffOp::Equal { len, .. } => *len,
                _ => 0,
            })
            .sum();

        let total = a.chars().count() + b.chars().count();
        2.0 * matched as f64 / total as f64
    }
}

impl<F> NameScorer for F
where
    F: Fn(&str, &str) -> f64 + Send + Sync,
{
    fn score(&self, a: &str, b: &str) -> f64 {
        self(a, b)
    }
}
