//! Run-scoped transformation trace.
//!
//! Every stage transition of every field of every document appends one
//! immutable entry, including failed extraction attempts: "why is this
//! field empty" must be answerable after the fact. Entries are indexed by
//! (document, field) so the audit query costs only the entries of that
//! field, and aggregate per-stage counters come for free.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::comuna::ComunaMatch;
use crate::schema::CanonicalField;

/// Pipeline stage that produced a trace entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Extract,
    Resolve,
    Normalize,
    FuzzyComuna,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Extract => "extract",
            Stage::Resolve => "resolve",
            Stage::Normalize => "normalize",
            Stage::FuzzyComuna => "fuzzy_comuna",
        }
    }
}

/// One immutable stage transition record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    pub document: String,
    pub field: CanonicalField,
    pub stage: Stage,
    pub input: String,
    pub output: String,
    /// Run-global monotone sequence number; per-(document, field) sequences
    /// are strictly increasing.
    pub seq: u64,
}

/// Aggregate per-stage counts for summary reporting.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TraceSummary {
    pub extract_attempts: u64,
    pub extract_matched: u64,
    pub extract_unmatched: u64,
    pub fields_resolved: u64,
    pub fields_unmatched: u64,
    pub normalized: u64,
    pub comuna_matched: u64,
    pub comuna_unresolved: u64,
}

#[derive(Default)]
struct TraceStore {
    seq: u64,
    entries: HashMap<(String, CanonicalField), Vec<TraceEntry>>,
    summary: TraceSummary,
}

/// Append-only recorder shared by all workers of one run.
#[derive(Default)]
pub struct TraceRecorder {
    inner: Mutex<TraceStore>,
}

impl TraceRecorder {
    pub fn new() -> TraceRecorder {
        TraceRecorder::default()
    }

    fn push(
        &self,
        document: &str,
        field: CanonicalField,
        stage: Stage,
        input: String,
        output: String,
        bump: impl FnOnce(&mut TraceSummary),
    ) {
        let mut store = self.inner.lock().expect("trace lock poisoned");
        store.seq += 1;
        let entry = TraceEntry {
            document: document.to_string(),
            field,
            stage,
            input,
            output,
            seq: store.seq,
        };
        bump(&mut store.summary);
        store
            .entries
            .entry((document.to_string(), field))
            .or_default()
            .push(entry);
    }

    /// One entry per page per field attempt; `hits` are the raw matches
    /// found on that page (possibly none).
    pub fn record_extraction(
        &self,
        document: &str,
        field: CanonicalField,
        page_index: usize,
        hits: &[String],
    ) {
        let output = if hits.is_empty() {
            "no match".to_string()
        } else {
            hits.join(" | ")
        };
        self.push(
            document,
            field,
            Stage::Extract,
            format!("page {}", page_index),
            output,
            |s| {
                s.extract_attempts += 1;
                if hits.is_empty() {
                    s.extract_unmatched += 1;
                } else {
                    s.extract_matched += 1;
                }
            },
        );
    }

    pub fn record_resolution(
        &self,
        document: &str,
        field: CanonicalField,
        candidate_count: usize,
        winner: Option<&str>,
    ) {
        self.push(
            document,
            field,
            Stage::Resolve,
            format!("{} candidate(s)", candidate_count),
            winner.unwrap_or("UNMATCHED").to_string(),
            |s| {
                if winner.is_some() {
                    s.fields_resolved += 1;
                } else {
                    s.fields_unmatched += 1;
                }
            },
        );
    }

    pub fn record_normalization(
        &self,
        document: &str,
        field: CanonicalField,
        raw: &str,
        normalized: &str,
    ) {
        self.push(
            document,
            field,
            Stage::Normalize,
            raw.to_string(),
            normalized.to_string(),
            |s| s.normalized += 1,
        );
    }

    pub fn record_fuzzy(&self, document: &str, field: CanonicalField, outcome: &ComunaMatch) {
        let output = match &outcome.matched {
            Some(name) => format!("{} (score {:.2})", name, outcome.score),
            None => format!("UNRESOLVED (score {:.2})", outcome.score),
        };
        self.push(
            document,
            field,
            Stage::FuzzyComuna,
            outcome.input.clone(),
            output,
            |s| {
                if outcome.matched.is_some() {
                    s.comuna_matched += 1;
                } else {
                    s.comuna_unresolved += 1;
                }
            },
        );
    }

    /// Full ordered trace for one (document, field).
    pub fn for_field(&self, document: &str, field: CanonicalField) -> Vec<TraceEntry> {
        let store = self.inner.lock().expect("trace lock poisoned");
        store
            .entries
            .get(&(document.to_string(), field))
            .cloned()
            .unwrap_or_default()
    }

    pub fn summary(&self) -> TraceSummary {
        self.inner.lock().expect("trace lock poisoned").summary
    }

    pub fn len(&self) -> usize {
        let store = self.inner.lock().expect("trace lock poisoned");
        store.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::CanonicalField::{Comuna, Rut};

    #[test]
    fn per_field_sequences_are_strictly_increasing() {
        let trace = TraceRecorder::new();
        trace.record_extraction("doc1", Rut, 1, &["15657067".to_string()]);
        trace.record_extraction("doc1", Rut, 2, &[]);
        trace.record_resolution("doc1", Rut, 1, Some("15657067"));
        trace.record_normalization("doc1", Rut, "15.657.067", "15657067");

        let entries = trace.for_field("doc1", Rut);
        assert_eq!(entries.len(), 4);
        assert!(entries.windows(2).all(|w| w[0].seq < w[1].seq));
        assert_eq!(entries[0].stage, Stage::Extract);
        assert_eq!(entries[3].stage, Stage::Normalize);
    }

    #[test]
    fn queries_are_scoped_to_document_and_field() {
        let trace = TraceRecorder::new();
        trace.record_extraction("doc1", Rut, 1, &[]);
        trace.record_extraction("doc2", Rut, 1, &["x".to_string()]);
        trace.record_extraction("doc1", Comuna, 1, &[]);

        assert_eq!(trace.for_field("doc1", Rut).len(), 1);
        assert_eq!(trace.for_field("doc2", Rut).len(), 1);
        assert_eq!(trace.for_field("doc3", Rut).len(), 0);
        assert_eq!(trace.len(), 3);
    }

    #[test]
    fn summary_counts_matched_and_unmatched_attempts() {
        let trace = TraceRecorder::new();
        trace.record_extraction("d", Rut, 1, &["a".to_string()]);
        trace.record_extraction("d", Rut, 2, &[]);
        trace.record_resolution("d", Rut, 1, Some("a"));
        trace.record_resolution("d", Comuna, 0, None);
        trace.record_fuzzy(
            "d",
            Comuna,
            &ComunaMatch {
                input: "ZUNIGA".to_string(),
                matched: None,
                score: 0.5,
            },
        );

        let summary = trace.summary();
        assert_eq!(summary.extract_attempts, 2);
        assert_eq!(summary.extract_matched, 1);
        assert_eq!(summary.extract_unmatched, 1);
        assert_eq!(summary.fields_resolved, 1);
        assert_eq!(summary.fields_unmatched, 1);
        assert_eq!(summary.comuna_unresolved, 1);
    }

    #[test]
    fn failed_attempts_leave_an_entry() {
        let trace = TraceRecorder::new();
        trace.record_extraction("d", Rut, 1, &[]);
        let entries = trace.for_field("d", Rut);
        assert_eq!(entries[0].output, "no match");
        assert_eq!(entries[0].input, "page 1");
    }
}
