//! Text metrics attached to every extracted edit

use std::collections::HashMap;

/// Shannon entropy of the character distribution of `text`, in bits per character.
///
/// Empty text has zero entropy.
pub fn text_entropy(text: &str) -> f64 {
    let mut counts: HashMap<char, usize> = HashMap::new();
    let mut total = 0usize;
    for ch in text.chars() {
        *counts.entry(ch).or_insert(0) += 1;
        total += 1;
    }
    if total == 0 {
        return 0.0;
    }

    // Sum in a fixed order so identical inputs give bit-identical results.
    let mut frequencies: Vec<usize> = counts.into_values().collect();
    frequencies.sort_unstable();

    let total = total as f64;
    frequencies
        .into_iter()
        .map(|count| {
            let p = count as f64 / total;
            -p * p.log2()
        })
        .sum()
}

/// Longest text, in characters, [`levenshtein`] compares against a non-empty other side
pub const MAX_LEVENSHTEIN_CHARS: usize = 4_096;

/// Levenshtein distance between `a` and `b`, counted in characters.
///
/// Returns `None` when both sides are non-empty and either exceeds
/// [`MAX_LEVENSHTEIN_CHARS`].
pub fn levenshtein(a: &str, b: &str) -> Option<usize> {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return Some(b.len());
    }
    if b.is_empty() {
        return Some(a.len());
    }
    if a.len().max(b.len()) > MAX_LEVENSHTEIN_CHARS {
        return None;
    }

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    Some(previous[b.len()])
}
