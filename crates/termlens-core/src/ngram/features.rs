//! Index-side n-gram feature extraction.

/// Separator between an n-gram and its occurrence number.
///
/// NUL never appears in normalized text, so a disambiguated feature cannot
/// collide with a real n-gram.
const OCCURRENCE_SEP: char = '\u{0}';

/// Extract the feature set of `text` for n-gram order `n`.
///
/// Features are non-padded character n-grams. The second and later
/// occurrences of the same n-gram get their occurrence number appended, so
/// the returned set represents the n-gram multiset exactly. A non-empty
/// string shorter than `n` is its own single feature. Empty text has no
/// features.
///
/// The returned features are distinct.
pub fn extract_features(text: &str, n: usize) -> Vec<String> {
    assert!(n > 0, "n-gram order must be positive");

    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    if chars.len() < n {
        return vec![text.to_string()];
    }

    let mut seen: ahash::AHashMap<&[char], usize> = ahash::AHashMap::new();
    let mut features = Vec::with_capacity(chars.len() + 1 - n);

    for window in chars.windows(n) {
        let count = seen.entry(window).or_insert(0);
        *count += 1;

        let mut feature: String = window.iter().collect();
        if *count > 1 {
            feature.push(OCCURRENCE_SEP);
            feature.push_str(&count.to_string());
        }
        features.push(feature);
    }

    features
}
