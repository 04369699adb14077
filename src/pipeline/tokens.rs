//! Search tokens and term-frequency scoring

/// Lower-cased alphanumeric runs of `text`, in order
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Space-joined token form stored next to each chunk
pub fn token_string(text: &str) -> String {
    tokenize(text).join(" ")
}

/// Distinct query terms, in first-seen order
pub fn query_terms(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for token in tokenize(query) {
        if !terms.contains(&token) {
            terms.push(token);
        }
    }
    terms
}

/// Relevance of a chunk for a query
///
/// Sum over distinct query terms of their frequency in the chunk's tokens, divided by the
/// square root of the chunk's token count when `length_normalization` is set.
pub fn score(chunk_tokens: &str, terms: &[String], length_normalization: bool) -> f64 {
    let mut total = 0usize;
    let mut matches = 0usize;
    for token in chunk_tokens.split(' ').filter(|t| !t.is_empty()) {
        total += 1;
        if terms.iter().any(|t| t == token) {
            matches += 1;
        }
    }

    if matches == 0 {
        return 0.0;
    }
    if length_normalization {
        matches as f64 / (total as f64).sqrt()
    } else {
        matches as f64
    }
}
