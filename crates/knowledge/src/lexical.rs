//! BM25 lexical scoring over the in-memory corpus.

use std::collections::HashMap;

use unicode_segmentation::UnicodeSegmentation;

/// Term-frequency saturation.
pub const DEFAULT_K1: f32 = 1.5;
/// Length normalization strength.
pub const DEFAULT_B: f32 = 0.75;

/// Lower-cased Unicode words.
pub fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words().map(|w| w.to_lowercase()).collect()
}

/// Okapi BM25 index. Documents are addressed by their insertion position.
#[derive(Debug, Clone)]
pub struct Bm25Index {
    term_freqs: Vec<HashMap<String, u32>>,
    doc_lens: Vec<usize>,
    doc_freq: HashMap<String, usize>,
    avg_doc_len: f32,
    k1: f32,
    b: f32,
}

impl Bm25Index {
    /// Index `documents` with the default parameters.
    pub fn new<'a>(documents: impl IntoIterator<Item = &'a str>) -> Self {
        Self::with_params(documents, DEFAULT_K1, DEFAULT_B)
    }

    pub fn with_params<'a>(documents: impl IntoIterator<Item = &'a str>, k1: f32, b: f32) -> Self {
        let mut term_freqs = Vec::new();
        let mut doc_lens = Vec::new();
        let mut doc_freq: HashMap<String, usize> = HashMap::new();

        for doc in documents {
            let tokens = tokenize(doc);
            doc_lens.push(tokens.len());

            let mut freqs: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *freqs.entry(token).or_insert(0) += 1;
            }
            for term in freqs.keys() {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            term_freqs.push(freqs);
        }

        let total: usize = doc_lens.iter().sum();
        let avg_doc_len = if doc_lens.is_empty() {
            0.0
        } else {
            total as f32 / doc_lens.len() as f32
        };

        Self {
            term_freqs,
            doc_lens,
            doc_freq,
            avg_doc_len,
            k1,
            b,
        }
    }

    pub fn len(&self) -> usize {
        self.doc_lens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_lens.is_empty()
    }

    /// ln((N - n + 0.5) / (n + 0.5) + 1), always positive.
    fn idf(&self, term: &str) -> f32 {
        let n = self.doc_freq.get(term).copied().unwrap_or(0) as f32;
        let total = self.len() as f32;
        ((total - n + 0.5) / (n + 0.5) + 1.0).ln()
    }

    /// Raw BM25 score of `query` against the document at `position`.
    pub fn score(&self, query: &str, position: usize) -> f32 {
        self.score_tokens(&tokenize(query), position)
    }

    /// Raw BM25 scores of `query` for every document, by position.
    pub fn scores(&self, query: &str) -> Vec<f32> {
        let tokens = tokenize(query);
        (0..self.len())
            .map(|position| self.score_tokens(&tokens, position))
            .collect()
    }

    /// Score pre-tokenized query terms against the document at `position`.
    pub fn score_tokens(&self, tokens: &[String], position: usize) -> f32 {
        let (Some(freqs), Some(&doc_len)) =
            (self.term_freqs.get(position), self.doc_lens.get(position))
        else {
            return 0.0;
        };

        let len_ratio = if self.avg_doc_len > 0.0 {
            doc_len as f32 / self.avg_doc_len
        } else {
            0.0
        };

        tokens
            .iter()
            .map(|term| {
                let tf = freqs.get(term).copied().unwrap_or(0) as f32;
                if tf == 0.0 {
                    return 0.0;
                }
                let denom = tf + self.k1 * (1.0 - self.b + self.b * len_ratio);
                self.idf(term) * tf * (self.k1 + 1.0) / denom
            })
            .sum()
    }
}

/// Scale a batch of raw lexical scores into [0, 1] relative to its maximum.
///
/// Zero stays zero. A batch whose scores are all equal and non-zero maps to
/// the neutral value 0.5 rather than a uniform 1.0.
pub fn normalize_scores(raw: &[f32]) -> Vec<f32> {
    let max = raw.iter().copied().fold(0.0f32, f32::max);
    if max <= 0.0 {
        return vec![0.0; raw.len()];
    }

    let all_equal = raw.iter().all(|&s| (s - max).abs() <= f32::EPSILON);
    if all_equal {
        return vec![0.5; raw.len()];
    }

    raw.iter().map(|&s| (s.max(0.0) / max).min(1.0)).collect()
}
