// BM25 relevance for the in-memory backend's text search
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Bm25Index {
    // term -> (doc -> term frequency)
    postings: HashMap<String, HashMap<usize, u32>>,
    doc_lengths: HashMap<usize, u32>,
    k1: f64,
    b: f64,
}

impl Bm25Index {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            postings: HashMap::new(),
            doc_lengths: HashMap::new(),
            k1: 1.5,
            b: 0.75,
        }
    }

    /// Lowercase terms of at least two characters, split on whitespace and
    /// punctuation
    #[inline]
    pub fn tokenize(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
            .map(|s| s.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
            .filter(|s| s.len() > 1)
            .collect()
    }

    pub fn insert(&mut self, doc: usize, text: &str) {
        let tokens = Self::tokenize(text);
        self.doc_lengths.insert(doc, tokens.len() as u32);
        for token in tokens {
            *self
                .postings
                .entry(token)
                .or_default()
                .entry(doc)
                .or_insert(0) += 1;
        }
    }

    /// Score of `doc` for `query`; zero when no query term occurs in it
    pub fn score(&self, doc: usize, query: &str) -> f64 {
        let Some(&doc_len) = self.doc_lengths.get(&doc) else {
            return 0.0;
        };
        let total = self.doc_lengths.len() as f64;
        let avgdl = self.doc_lengths.values().sum::<u32>() as f64 / total;
        if avgdl == 0.0 {
            return 0.0;
        }

        let mut terms = Self::tokenize(query);
        terms.sort();
        terms.dedup();

        terms
            .iter()
            .filter_map(|term| {
                let docs = self.postings.get(term)?;
                let tf = f64::from(*docs.get(&doc)?);
                let df = docs.len() as f64;
                // smoothed idf stays positive for terms in most documents
                let idf = (1.0 + (total - df + 0.5) / (df + 0.5)).ln();
                let norm = self.k1 * (1.0 - self.b + self.b * (f64::from(doc_len) / avgdl));
                Some(idf * (tf * (self.k1 + 1.0)) / (tf + norm))
            })
            .sum()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.doc_lengths.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.doc_lengths.is_empty()
    }
}

impl Default for Bm25Index {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        assert_eq!(
            Bm25Index::tokenize("Rust, async I/O & tokio!"),
            vec!["rust", "async", "tokio"]
        );
    }

    #[test]
    fn test_scores_rank_relevant_documents_first() {
        let mut index = Bm25Index::new();
        index.insert(0, "rust rust rust systems programming");
        index.insert(1, "rust web services");
        index.insert(2, "gardening tips for spring");
        assert_eq!(index.len(), 3);

        let heavy = index.score(0, "rust");
        let light = index.score(1, "rust");
        assert!(heavy > light);
        assert!(light > 0.0);
        assert_eq!(index.score(2, "rust"), 0.0);
        assert_eq!(index.score(9, "rust"), 0.0);
    }
}
