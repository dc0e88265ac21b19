use crate::types::SpellingOutcome;

/// Classifies a spelling attempt by its edit distance to the expected word.
///
/// Comparison is case-insensitive on trimmed input. An exact answer reached
/// only after a hint and a retry is downgraded to `RetrySuccess`.
pub fn classify_spelling(expected: &str, answer: &str, hint_used: bool, retried: bool) -> SpellingOutcome {
    let distance = edit_distance(
        &expected.trim().to_lowercase(),
        &answer.trim().to_lowercase(),
    );

    match distance {
        0 => match (hint_used, retried) {
            (false, false) => SpellingOutcome::Perfect,
            (true, false) => SpellingOutcome::Hinted,
            (_, true) => SpellingOutcome::RetrySuccess,
        },
        1 => SpellingOutcome::Hinted,
        2 => SpellingOutcome::RetrySuccess,
        _ => SpellingOutcome::Failed,
    }
}

/// Levenshtein distance over chars.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}
