//! Fuzzy name suggestions.
//!
//! Pure scoring over a candidate set: normalized edit-distance similarity
//! plus substring and word-shape bonuses. The ordering is total — score,
//! then shorter name, then lexicographic — so agents iterating on an error
//! list see the same ranking on every call.

use serde::{Deserialize, Serialize};

/// Candidates scoring below this are dropped rather than padding the list.
const MIN_SIMILARITY: f64 = 0.4;

/// Default suggestion list length, shared by validation reports and the
/// tool surface so agents see consistent list lengths everywhere.
pub const SUGGESTION_LIMIT: usize = 5;

/// One ranked suggestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suggestion {
    pub name: String,
    /// Similarity in [0, 1]; 1.0 is an exact or shape-equal match.
    pub score: f64,
}

/// Rank `candidates` by similarity to `name`, best first.
pub fn suggest<'a, I>(name: &str, candidates: I, limit: usize) -> Vec<Suggestion>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut scored: Vec<Suggestion> = candidates
        .into_iter()
        .filter_map(|candidate| {
            let score = similarity(name, candidate);
            (score >= MIN_SIMILARITY).then(|| Suggestion {
                name: candidate.to_string(),
                score,
            })
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.len().cmp(&b.name.len()))
            .then_with(|| a.name.cmp(&b.name))
    });
    scored.truncate(limit);
    scored
}

/// Similarity between two names in [0, 1].
///
/// Base is normalized Levenshtein over the case-folded strings; exact
/// substring containment and equality after underscore stripping push
/// near-misses like `studyName` vs `study_name` up without inferring
/// synonyms.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a_fold = a.to_lowercase();
    let b_fold = b.to_lowercase();
    if a_fold == b_fold {
        return 1.0;
    }

    let max_len = a_fold.chars().count().max(b_fold.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    let dist = levenshtein(&a_fold, &b_fold);
    let mut score = 1.0 - dist as f64 / max_len as f64;

    if a_fold.contains(&b_fold) || b_fold.contains(&a_fold) {
        score += 0.15;
    }
    if strip_separators(&a_fold) == strip_separators(&b_fold) {
        score += 0.25;
    }

    score.clamp(0.0, 1.0)
}

fn strip_separators(s: &str) -> String {
    s.chars().filter(|c| *c != '_' && *c != '-').collect()
}

/// Two-row Levenshtein distance.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_scores_one() {
        assert_eq!(similarity("gender", "gender"), 1.0);
        assert_eq!(similarity("Gender", "gender"), 1.0);
    }

    #[test]
    fn test_gander_suggests_gender_first() {
        let candidates = ["gender", "race", "ethnicity", "age_at_enrollment"];
        let results = suggest("gander", candidates, 5);
        assert!(!results.is_empty());
        assert_eq!(results[0].name, "gender");
    }

    #[test]
    fn test_determinism() {
        let candidates = ["gender", "race", "grade", "gene_id", "ген"];
        let first = suggest("gander", candidates.iter().copied(), 5);
        for _ in 0..100 {
            let again = suggest("gander", candidates.iter().copied(), 5);
            assert_eq!(
                first.iter().map(|s| &s.name).collect::<Vec<_>>(),
                again.iter().map(|s| &s.name).collect::<Vec<_>>()
            );
        }
    }

    #[test]
    fn test_underscore_shape_match() {
        let results = suggest("submitterid", ["submitter_id", "subject_id"], 5);
        assert_eq!(results[0].name, "submitter_id");
        assert!(results[0].score > 0.9);
    }

    #[test]
    fn test_substring_bonus() {
        let with = similarity("study", "study_description");
        let without = similarity("study", "description");
        assert!(with > without);
    }

    #[test]
    fn test_floor_excludes_noise() {
        let results = suggest("gender", ["file_size", "md5sum"], 5);
        assert!(results.is_empty());
    }

    #[test]
    fn test_limit_caps_results() {
        let candidates = ["gene_a", "gene_b", "gene_c", "gene_d", "gene_e", "gene_f"];
        let results = suggest("gene", candidates, 3);
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn test_tie_break_shorter_then_lexicographic() {
        // Both are one edit away from the target and the same length.
        let results = suggest("samplx", ["sampla", "samplb"], 5);
        assert_eq!(results[0].name, "sampla");
        assert_eq!(results[1].name, "samplb");

        let results = suggest("sample", ["samples", "sample_x"], 5);
        assert_eq!(results[0].name, "samples");
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", "abc"), 0);
    }
}
