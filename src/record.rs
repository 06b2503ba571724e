//! Canonical record assembly.
//!
//! The assembler takes the resolved, normalized field values of one document
//! and produces the one row downstream consumers see: every canonical field
//! present (empty when unmatched), aliases resolving to the same storage,
//! warnings attached non-fatally, page quality carried as metadata.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::config::RunConfig;
use crate::error::Warning;
use crate::normalize::compute_dv;
use crate::schema::{self, ALL_FIELDS, Bank, CanonicalField};

/// Extraction outcome of one field within its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldStatus {
    Matched,
    Unmatched,
}

/// Final value of one canonical field: the resolved raw text, its normalized
/// form, and how extraction ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValue {
    pub raw: String,
    pub normalized: String,
    pub status: FieldStatus,
}

impl FieldValue {
    pub fn unmatched() -> FieldValue {
        FieldValue {
            raw: String::new(),
            normalized: String::new(),
            status: FieldStatus::Unmatched,
        }
    }
}

/// One immutable row per document.
pub struct CanonicalRecord {
    pub document: String,
    pub bank: Bank,
    values: BTreeMap<CanonicalField, FieldValue>,
    pub warnings: Vec<Warning>,
    /// (page index, quality score) as supplied by the OCR collaborator.
    pub page_quality: Vec<(usize, f64)>,
    aliases: Arc<HashMap<String, CanonicalField>>,
}

impl CanonicalRecord {
    pub fn value(&self, field: CanonicalField) -> &str {
        &self.values[&field].normalized
    }

    pub fn field(&self, field: CanonicalField) -> &FieldValue {
        &self.values[&field]
    }

    /// Look a value up by canonical header or any configured alias. The
    /// alias map is shared with the run config; values are stored once.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        let field = self
            .aliases
            .get(name.trim().to_lowercase().as_str())
            .copied()
            .or_else(|| schema::resolve_header(name))?;
        Some(self.value(field))
    }

    /// Ordered (header, value) pairs for tabular consumers.
    pub fn to_row(&self) -> Vec<(&'static str, &str)> {
        ALL_FIELDS
            .iter()
            .map(|f| (f.header(), self.value(*f)))
            .collect()
    }

    pub fn mean_quality(&self) -> f64 {
        if self.page_quality.is_empty() {
            return 0.0;
        }
        self.page_quality.iter().map(|(_, q)| q).sum::<f64>() / self.page_quality.len() as f64
    }
}

/// Assemble the final record. `product_fallback` is the detected document
/// type, used when no explicit product hint was extracted.
pub fn assemble(
    document: &str,
    bank: Bank,
    mut values: BTreeMap<CanonicalField, FieldValue>,
    mut warnings: Vec<Warning>,
    page_quality: Vec<(usize, f64)>,
    product_fallback: &str,
    config: &RunConfig,
) -> CanonicalRecord {
    for field in ALL_FIELDS {
        values.entry(field).or_insert_with(FieldValue::unmatched);
    }

    // Operation numbers are often only present in the source file name.
    if values[&CanonicalField::Operacion].normalized.is_empty() {
        if let Some(op) = operation_from_id(document) {
            values.get_mut(&CanonicalField::Operacion).expect("filled above").normalized = op;
        }
    }

    if values[&CanonicalField::Producto].normalized.is_empty() && !product_fallback.is_empty() {
        values.get_mut(&CanonicalField::Producto).expect("filled above").normalized =
            product_fallback.to_string();
    }

    // Pagarés state a single amount that is both credit and capital.
    if values[&CanonicalField::Capital].normalized.is_empty() {
        let monto = values[&CanonicalField::MontoCredito].normalized.clone();
        if !monto.is_empty() {
            values.get_mut(&CanonicalField::Capital).expect("filled above").normalized = monto;
        }
    }

    let rut = values[&CanonicalField::Rut].normalized.clone();
    let dv = values[&CanonicalField::Dv].normalized.clone();
    if !rut.is_empty() && !dv.is_empty() {
        if let Some(expected) = compute_dv(&rut) {
            if expected != dv {
                warnings.push(Warning::CheckDigitMismatch { rut, dv, expected });
            }
        }
    }

    CanonicalRecord {
        document: document.to_string(),
        bank,
        values,
        warnings,
        page_quality,
        aliases: config.aliases(),
    }
}

lazy_static! {
    static ref DIGIT_RUN: Regex = Regex::new(r"\d{6,}").unwrap();
}

/// Longest digit run of six or more in the document id; first wins on ties.
/// "4191896500082450_PP" → "4191896500082450".
fn operation_from_id(id: &str) -> Option<String> {
    let mut best: Option<&str> = None;
    for m in DIGIT_RUN.find_iter(id) {
        if best.map(|b| m.as_str().len() > b.len()).unwrap_or(true) {
            best = Some(m.as_str());
        }
    }
    best.map(str::to_string)
}
