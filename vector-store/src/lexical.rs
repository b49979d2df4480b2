//! In-process BM25 ranking over full-text-filtered candidates.
//!
//! The text index on `content` handles recall; this module turns the
//! unranked candidate set into a proper BM25-ordered list (k1 = 1.2,
//! b = 0.75).

const K1: f64 = 1.2;
const B: f64 = 0.75;

/// Ranks `docs` against `query`, returning `(index, score)` pairs for the
/// top `k` documents with a positive score, best first. Ties break by index
/// so the ordering is deterministic.
pub fn bm25_rank(query: &str, docs: &[&str], k: usize) -> Vec<(usize, f64)> {
    if docs.is_empty() || k == 0 {
        return Vec::new();
    }

    let query_terms = tokenize(query);
    if query_terms.is_empty() {
        return Vec::new();
    }

    let tokenized: Vec<Vec<String>> = docs.iter().map(|d| tokenize(d)).collect();
    let n = tokenized.len() as f64;
    let avg_len = tokenized.iter().map(|t| t.len()).sum::<usize>() as f64 / n;

    // Document frequency per query term.
    let df: Vec<f64> = query_terms
        .iter()
        .map(|term| {
            tokenized
                .iter()
                .filter(|doc| doc.iter().any(|t| t == term))
                .count() as f64
        })
        .collect();

    let mut scored: Vec<(usize, f64)> = tokenized
        .iter()
        .enumerate()
        .map(|(i, doc)| {
            let len_norm = K1 * (1.0 - B + B * doc.len() as f64 / avg_len.max(1.0));
            let score = query_terms
                .iter()
                .zip(&df)
                .map(|(term, &dfi)| {
                    if dfi == 0.0 {
                        return 0.0;
                    }
                    let tf = doc.iter().filter(|t| *t == term).count() as f64;
                    if tf == 0.0 {
                        return 0.0;
                    }
                    let idf = ((n - dfi + 0.5) / (dfi + 0.5) + 1.0).ln();
                    idf * tf * (K1 + 1.0) / (tf + len_norm)
                })
                .sum::<f64>();
            (i, score)
        })
        .filter(|(_, s)| *s > 0.0)
        .collect();

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    scored.truncate(k);
    scored
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_matching_document_first() {
        let docs = [
            "the revenue grew by ten percent in the third quarter",
            "unrelated text about gardening and soil quality",
            "revenue revenue revenue and more revenue figures",
        ];
        let ranked = bm25_rank("revenue growth", &docs, 3);
        assert!(!ranked.is_empty());
        // Both matching docs rank; the gardening doc is filtered out.
        assert!(ranked.iter().all(|(i, _)| *i != 1));
        assert!(ranked[0].1 >= ranked.last().unwrap().1);
    }

    #[test]
    fn no_match_yields_empty() {
        let docs = ["alpha beta", "gamma delta"];
        assert!(bm25_rank("zeta", &docs, 5).is_empty());
        assert!(bm25_rank("", &docs, 5).is_empty());
    }

    #[test]
    fn truncates_to_k_deterministically() {
        let docs = ["apple pie", "apple tart", "apple cake"];
        let ranked = bm25_rank("apple", &docs, 2);
        assert_eq!(ranked.len(), 2);
        // Equal scores break by index.
        assert!(ranked[0].0 < ranked[1].0);
    }
}
