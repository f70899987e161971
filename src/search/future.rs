use crate::bitmap::{Coverage, CoverageRange};
use crate::model::OptionCollection;

/// Per-sentence estimate of the best achievable score for every source
/// span, built once before search and read-only thereafter.
///
/// Each span `[i, j)` is seeded with its best option score, then closed
/// under concatenation: covering `[i, j)` can never score worse than
/// covering `[i, k)` and `[k, j)` separately. Spans no option combination
/// can cover stay at negative infinity, which ranks any hypothesis still
/// needing them below every completable one.
pub struct FutureScoreTable {
    len: usize,
    // row-major [start][end], end in 0..=len
    scores: Vec<f32>,
}

impl FutureScoreTable {
    pub fn build(options: &OptionCollection) -> Self {
        let len = options.source_len();
        let mut table = Self {
            len,
            scores: vec![f32::NEG_INFINITY; len * (len + 1)],
        };

        for start in 0..len {
            for span in options.spans_from(start) {
                // ranked descending, so the first option is the span's best
                if let Some(&first) = span.ranked.first() {
                    let best = options.get(first).score;
                    let slot = table.index(start, span.end);
                    if best > table.scores[slot] {
                        table.scores[slot] = best;
                    }
                }
            }
        }

        for width in 2..=len {
            for start in 0..=len - width {
                let end = start + width;
                let mut best = table.scores[table.index(start, end)];
                for mid in start + 1..end {
                    let combined =
                        table.scores[table.index(start, mid)] + table.scores[table.index(mid, end)];
                    if combined > best {
                        best = combined;
                    }
                }
                let slot = table.index(start, end);
                table.scores[slot] = best;
            }
        }

        table
    }

    fn index(&self, start: usize, end: usize) -> usize {
        debug_assert!(start < end && end <= self.len);
        start * (self.len + 1) + end
    }

    /// Best achievable score for covering `span`.
    pub fn span_estimate(&self, span: CoverageRange) -> f32 {
        self.scores[self.index(span.start, span.end)]
    }

    /// Heuristic remaining score for a partial hypothesis: the sum over its
    /// maximal uncovered spans. Full coverage estimates 0.
    pub fn estimate(&self, coverage: &Coverage) -> f32 {
        coverage
            .uncovered_spans()
            .iter()
            .map(|&span| self.span_estimate(span))
            .sum()
    }
}
