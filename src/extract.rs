//! Field extraction and candidate resolution.
//!
//! Every pattern of the active bank runs against every page. Patterns are
//! independent: one field finding nothing never blocks another. Each match
//! is checked against its pattern's context window before becoming a
//! candidate, and every page × field attempt is traced, match or not.

use std::collections::HashMap;

use crate::config::PatternSet;
use crate::pipeline::Page;
use crate::schema::{ALL_FIELDS, CanonicalField};
use crate::trace::TraceRecorder;

/// Raw match for a field, prior to resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub field: CanonicalField,
    pub raw: String,
    pub page: usize,
    pub priority: i32,
    pub position: usize,
}

/// Bytes of surrounding text consulted for context/exclude checks.
const WINDOW: usize = 80;

/// Run the bank's pattern set over all pages, producing the candidate sets
/// per canonical field.
pub fn extract_document(
    document: &str,
    pages: &[Page],
    set: &PatternSet,
    trace: &TraceRecorder,
) -> HashMap<CanonicalField, Vec<Candidate>> {
    let mut all: HashMap<CanonicalField, Vec<Candidate>> = HashMap::new();
    for field in ALL_FIELDS {
        let patterns = set.for_field(field);
        let mut candidates = Vec::new();
        for page in pages {
            let mut hits = Vec::new();
            for pattern in patterns {
                for caps in pattern.regex.captures_iter(&page.text) {
                    let group = match caps.get(pattern.group) {
                        Some(m) => m,
                        None => continue,
                    };
                    let whole = caps.get(0).expect("group 0 always present");
                    let win = window(&page.text, whole.start(), whole.end());
                    if let Some(ctx) = &pattern.context {
                        if !ctx.is_match(win) {
                            continue;
                        }
                    }
                    if let Some(excl) = &pattern.exclude {
                        if excl.is_match(win) {
                            continue;
                        }
                    }
                    let raw = group.as_str().trim().to_string();
                    if raw.is_empty() {
                        continue;
                    }
                    hits.push(raw.clone());
                    candidates.push(Candidate {
                        field,
                        raw,
                        page: page.index,
                        priority: pattern.priority,
                        position: group.start(),
                    });
                }
            }
            trace.record_extraction(document, field, page.index, &hits);
        }
        tracing::debug!(
            document,
            field = field.header(),
            candidates = candidates.len(),
            "extraction finished"
        );
        all.insert(field, candidates);
    }
    all
}

/// Collapse a candidate set to at most one winner: highest priority, then
/// earliest page, then earliest position. The trailing raw-value comparison
/// makes the order total, so any input ordering resolves identically.
pub fn resolve(
    document: &str,
    field: CanonicalField,
    candidates: Vec<Candidate>,
    trace: &TraceRecorder,
) -> Option<Candidate> {
    let count = candidates.len();
    let mut sorted = candidates;
    sorted.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(a.page.cmp(&b.page))
            .then(a.position.cmp(&b.position))
            .then_with(|| a.raw.cmp(&b.raw))
    });
    let winner = sorted.into_iter().next();
    trace.record_resolution(document, field, count, winner.as_ref().map(|c| c.raw.as_str()));
    winner
}

/// Slice the ±WINDOW bytes around a match, snapped to char boundaries.
fn window(text: &str, start: usize, end: usize) -> &str {
    let mut s = start.saturating_sub(WINDOW);
    while s > 0 && !text.is_char_boundary(s) {
        s -= 1;
    }
    let mut e = (end + WINDOW).min(text.len());
    while e < text.len() && !text.is_char_boundary(e) {
        e += 1;
    }
    &text[s..e]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::schema::Bank;
    use crate::schema::CanonicalField::{Comuna, MontoCredito, Nombre, Rut};

    fn page(index: usize, text: &str) -> Page {
        Page {
            index,
            text: text.to_string(),
            quality: 0.9,
        }
    }

    fn cand(raw: &str, page: usize, priority: i32, position: usize) -> Candidate {
        Candidate {
            field: Rut,
            raw: raw.to_string(),
            page,
            priority,
            position,
        }
    }

    #[test]
    fn finds_candidates_across_all_pages() {
        let config = RunConfig::builtin();
        let trace = TraceRecorder::new();
        let pages = vec![
            page(1, "PAGARÉ\nC.I/RUT N°: 15.657.067-2\n"),
            page(2, "ratificado por RUT 15.657.067-2"),
        ];
        let candidates = extract_document(
            "doc",
            &pages,
            config.patterns_for(Bank::Itau),
            &trace,
        );
        let ruts = &candidates[&Rut];
        assert!(ruts.iter().any(|c| c.page == 1));
        assert!(ruts.iter().any(|c| c.page == 2));
        assert!(ruts.iter().all(|c| c.raw.contains("15.657.067")));
    }

    #[test]
    fn one_field_failing_never_blocks_another() {
        let config = RunConfig::builtin();
        let trace = TraceRecorder::new();
        let pages = vec![page(1, "la suma de $ 5.713.357 pagadera")];
        let candidates = extract_document(
            "doc",
            &pages,
            config.patterns_for(Bank::Itau),
            &trace,
        );
        assert!(candidates[&Nombre].is_empty());
        assert_eq!(candidates[&MontoCredito][0].raw, "5.713.357");
    }

    #[test]
    fn failed_attempts_are_traced_per_page() {
        let config = RunConfig::builtin();
        let trace = TraceRecorder::new();
        let pages = vec![page(1, "texto sin comuna"), page(2, "tampoco aqui")];
        extract_document("doc", &pages, config.patterns_for(Bank::Itau), &trace);
        let entries = trace.for_field("doc", Comuna);
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.output == "no match"));
    }

    #[test]
    fn excluded_windows_drop_bank_and_operation_numbers() {
        let config = RunConfig::builtin();
        let trace = TraceRecorder::new();
        // Dotted number sits next to "Operación": not a debtor RUT.
        let pages = vec![page(1, "N° Operación: 4.191.896 5")];
        let candidates = extract_document(
            "doc",
            &pages,
            config.patterns_for(Bank::Itau),
            &trace,
        );
        assert!(candidates[&Rut].is_empty(), "{:?}", candidates[&Rut]);
    }

    #[test]
    fn resolver_prefers_priority_over_page_order() {
        // Scenario: the later page carries the labelled, higher-priority hit.
        let trace = TraceRecorder::new();
        let winner = resolve(
            "doc",
            Rut,
            vec![cand("11111111", 1, 2, 0), cand("22222222", 3, 20, 500)],
            &trace,
        )
        .unwrap();
        assert_eq!(winner.raw, "22222222");
    }

    #[test]
    fn resolver_breaks_priority_ties_by_page_then_position() {
        let trace = TraceRecorder::new();
        let winner = resolve(
            "doc",
            Rut,
            vec![cand("b", 2, 5, 10), cand("a", 1, 5, 90), cand("c", 1, 5, 20)],
            &trace,
        )
        .unwrap();
        assert_eq!(winner.raw, "c");
    }

    #[test]
    fn resolver_is_invariant_under_input_reordering() {
        let base = vec![
            cand("a", 1, 5, 10),
            cand("b", 1, 5, 10),
            cand("c", 2, 5, 0),
            cand("d", 1, 9, 99),
        ];
        let trace = TraceRecorder::new();
        let expected = resolve("doc", Rut, base.clone(), &trace).unwrap();
        let mut rotated = base;
        for _ in 0..4 {
            rotated.rotate_left(1);
            let winner = resolve("doc", Rut, rotated.clone(), &trace).unwrap();
            assert_eq!(winner, expected);
        }
    }

    #[test]
    fn empty_candidate_set_resolves_to_none_and_is_traced() {
        let trace = TraceRecorder::new();
        assert!(resolve("doc", Rut, Vec::new(), &trace).is_none());
        let entries = trace.for_field("doc", Rut);
        assert_eq!(entries[0].output, "UNMATCHED");
    }

    #[test]
    fn window_respects_utf8_boundaries() {
        let text = "ñññññññññññ MATCH ñññññññññññ";
        let start = text.find("MATCH").unwrap();
        let w = window(text, start, start + 5);
        assert!(w.contains("MATCH"));
    }
}
