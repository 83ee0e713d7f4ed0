//! Merges ordered segment results into one transcript.
//!
//! Normalization is purely textual: whitespace runs are collapsed and blank
//! lines capped. Words are never changed, dropped or reordered.

use crate::defaults;
use crate::pipeline::types::{SegmentError, SegmentResult, TranscriptionOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aggregator {
    /// Consecutive blank lines kept in the merged text.
    pub max_blank_lines: usize,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self {
            max_blank_lines: defaults::MAX_BLANK_LINES,
        }
    }
}

impl Aggregator {
    pub fn new(max_blank_lines: usize) -> Self {
        Self { max_blank_lines }
    }

    /// Combine per-segment results, in index order, into one outcome.
    ///
    /// Results may arrive in any order. Failed segments add nothing to the
    /// text and contribute 0 duration, but each one is listed in `errors`.
    pub fn combine(&self, mut results: Vec<SegmentResult>, segmented: bool) -> TranscriptionOutcome {
        results.sort_by_key(|r| r.index);

        let mut texts = Vec::with_capacity(results.len());
        let mut errors = Vec::new();
        let mut total_duration = 0.0;
        let mut confidence_sum = 0.0f64;
        let mut succeeded = 0usize;

        for result in &results {
            total_duration += result.duration;
            match &result.error {
                None => {
                    texts.push(result.text.as_str());
                    confidence_sum += f64::from(result.confidence);
                    succeeded += 1;
                }
                Some(message) => errors.push(SegmentError {
                    index: result.index,
                    message: message.clone(),
                }),
            }
        }

        let aggregate_confidence = if succeeded == 0 {
            0.0
        } else {
            (confidence_sum / succeeded as f64) as f32
        };

        TranscriptionOutcome {
            text: normalize_whitespace(&texts.join(" "), self.max_blank_lines),
            total_duration,
            aggregate_confidence,
            segmented,
            segments: results.len(),
            errors,
        }
    }
}

/// Collapse horizontal whitespace, trim every line, keep at most
/// `max_blank_lines` consecutive blank lines and strip the ends.
pub fn normalize_whitespace(text: &str, max_blank_lines: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut blank_run = 0;

    for raw_line in text.split('\n') {
        let line = raw_line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            blank_run += 1;
            if blank_run > max_blank_lines || lines.is_empty() {
                continue;
            }
        } else {
            blank_run = 0;
        }
        lines.push(line);
    }

    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_runs_and_trims() {
        assert_eq!(normalize_whitespace("  Hello   \t world.  ", 1), "Hello world.");
    }

    #[test]
    fn normalize_caps_blank_lines() {
        let text = "First.\n\n\n\nSecond.\r\n  \nThird.";
        assert_eq!(normalize_whitespace(text, 1), "First.\n\nSecond.\n\nThird.");
        assert_eq!(normalize_whitespace(text, 0), "First.\nSecond.\nThird.");
    }

    #[test]
    fn normalize_strips_leading_and_trailing_blank_lines() {
        assert_eq!(normalize_whitespace("\n\n  text \n\n", 1), "text");
        assert_eq!(normalize_whitespace(" \n \t ", 1), "");
    }

    #[test]
    fn normalize_is_idempotent() {
        let once = normalize_whitespace(" a  b\n\n\n c ", 1);
        assert_eq!(normalize_whitespace(&once, 1), once);
    }

    #[test]
    fn combine_two_segments() {
        let results = vec![
            SegmentResult::success(0, "Hello ", 10.0, 0.95),
            SegmentResult::success(1, "world.", 8.0, 0.9),
        ];
        let outcome = Aggregator::default().combine(results, true);

        assert_eq!(outcome.text, "Hello world.");
        assert_eq!(outcome.total_duration, 18.0);
        assert!((outcome.aggregate_confidence - 0.925).abs() < 1e-6);
        assert!(outcome.segmented);
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn combine_restores_index_order() {
        let results = vec![
            SegmentResult::success(2, "three", 1.0, 1.0),
            SegmentResult::success(0, "one", 1.0, 1.0),
            SegmentResult::success(1, "two", 1.0, 1.0),
        ];
        let outcome = Aggregator::default().combine(results, true);
        assert_eq!(outcome.text, "one two three");
    }

    #[test]
    fn combine_partial_success() {
        let results = vec![
            SegmentResult::success(0, "Blood pressure stable.", 30.0, 0.8),
            SegmentResult::failure(1, "rate limited by provider"),
            SegmentResult::success(2, "Continue ramipril.", 20.0, 0.6),
        ];
        let outcome = Aggregator::default().combine(results, true);

        assert_eq!(outcome.text, "Blood pressure stable. Continue ramipril.");
        assert_eq!(outcome.total_duration, 50.0);
        assert!((outcome.aggregate_confidence - 0.7).abs() < 1e-6);
        assert_eq!(
            outcome.errors,
            vec![SegmentError {
                index: 1,
                message: "rate limited by provider".to_string()
            }]
        );
        assert!(outcome.is_partial());
    }

    #[test]
    fn combine_total_failure() {
        let results = vec![
            SegmentResult::failure(1, "b"),
            SegmentResult::failure(0, "a"),
        ];
        let outcome = Aggregator::default().combine(results, true);

        assert_eq!(outcome.text, "");
        assert_eq!(outcome.total_duration, 0.0);
        assert_eq!(outcome.aggregate_confidence, 0.0);
        assert_eq!(outcome.errors[0].index, 0);
        assert_eq!(outcome.errors[1].index, 1);
        assert!(outcome.is_total_failure());
    }

    #[test]
    fn successful_empty_segment_adds_no_extra_space() {
        let results = vec![
            SegmentResult::success(0, "before", 1.0, 1.0),
            SegmentResult::success(1, "", 1.0, 1.0),
            SegmentResult::success(2, "after", 1.0, 1.0),
        ];
        let outcome = Aggregator::default().combine(results, true);
        assert_eq!(outcome.text, "before after");
        assert_eq!(outcome.aggregate_confidence, 1.0);
    }
}
