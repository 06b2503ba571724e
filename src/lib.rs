//! Extraction core for the bank-contract OCR pipeline.
//!
//! Converts per-page OCR text from scanned Chilean bank contracts into one
//! canonical record per document: pattern-based field extraction with
//! per-bank pattern sets, deterministic candidate resolution, Ñ/accent
//! restoration, fuzzy comuna matching against the gazetteer, and a full
//! per-field transformation trace. The Python host drives it through the
//! bindings at the bottom of this file.

use pyo3::prelude::*;
use std::collections::HashMap;

pub mod comuna;
pub mod config;
pub mod dictionary;
pub mod error;
pub mod extract;
pub mod normalize;
pub mod patterns;
pub mod pipeline;
pub mod record;
pub mod schema;
pub mod trace;

pub use comuna::{ComunaGazetteer, ComunaMatch};
pub use config::{FieldPattern, MatcherConfig, PatternSet, RunConfig};
pub use dictionary::{SpellingDictionary, fold};
pub use error::{ExtractError, Warning};
pub use extract::Candidate;
pub use pipeline::{BatchOutcome, Document, FailedDocument, Page, Pipeline};
pub use record::{CanonicalRecord, FieldStatus, FieldValue};
pub use schema::{ALL_FIELDS, Bank, CanonicalField, ValueKind};
pub use trace::{Stage, TraceEntry, TraceRecorder, TraceSummary};

// =============================================================================
// Python bindings
// =============================================================================

fn value_error(e: ExtractError) -> PyErr {
    pyo3::exceptions::PyValueError::new_err(e.to_string())
}

/// Assembled record as handed to Python: canonical header → final value,
/// plus warnings and quality metadata.
#[pyclass]
#[derive(Clone)]
pub struct ExtractedRecord {
    #[pyo3(get)]
    document: String,
    #[pyo3(get)]
    bank: String,
    #[pyo3(get)]
    fields: HashMap<String, String>,
    #[pyo3(get)]
    warnings: Vec<String>,
    #[pyo3(get)]
    page_quality: Vec<(usize, f64)>,
    #[pyo3(get)]
    mean_quality: f64,
}

impl ExtractedRecord {
    fn from_record(record: &CanonicalRecord) -> ExtractedRecord {
        ExtractedRecord {
            document: record.document.clone(),
            bank: record.bank.as_str().to_string(),
            fields: record
                .to_row()
                .into_iter()
                .map(|(h, v)| (h.to_string(), v.to_string()))
                .collect(),
            warnings: record.warnings.iter().map(|w| w.to_string()).collect(),
            page_quality: record.page_quality.clone(),
            mean_quality: record.mean_quality(),
        }
    }
}

/// Pipeline handle held by the Python host for the duration of one run.
#[pyclass]
pub struct Extractor {
    pipeline: Pipeline,
}

#[pymethods]
impl Extractor {
    /// Build with the builtin configuration, optionally amended by the
    /// client's JSON config document.
    #[new]
    #[pyo3(signature = (config_json=None))]
    fn new(config_json: Option<String>) -> PyResult<Self> {
        let config = match config_json {
            Some(json) => RunConfig::from_json(&json).map_err(value_error)?,
            None => RunConfig::builtin(),
        };
        Ok(Extractor {
            pipeline: Pipeline::new(config),
        })
    }

    /// Process one document from (page index, OCR text, quality) tuples.
    fn process_document(
        &self,
        document: String,
        bank: String,
        pages: Vec<(usize, String, f64)>,
    ) -> PyResult<ExtractedRecord> {
        let bank: Bank = bank.parse().map_err(value_error)?;
        let doc = Document::from_pages(document, bank, pages);
        let record = self.pipeline.process(&doc).map_err(value_error)?;
        Ok(ExtractedRecord::from_record(&record))
    }

    /// Process a batch in parallel. Returns (records, [(document, error)]);
    /// a failing document never aborts the batch.
    #[allow(clippy::type_complexity)]
    fn process_documents(
        &self,
        docs: Vec<(String, String, Vec<(usize, String, f64)>)>,
    ) -> PyResult<(Vec<ExtractedRecord>, Vec<(String, String)>)> {
        let mut documents = Vec::with_capacity(docs.len());
        for (id, bank, pages) in docs {
            let bank: Bank = bank.parse().map_err(value_error)?;
            documents.push(Document::from_pages(id, bank, pages));
        }
        let outcome = self.pipeline.process_batch(&documents);
        Ok((
            outcome
                .records
                .iter()
                .map(ExtractedRecord::from_record)
                .collect(),
            outcome
                .failures
                .into_iter()
                .map(|f| (f.id, f.error))
                .collect(),
        ))
    }

    /// Ordered trace of one (document, field): (stage, input, output, seq).
    fn trace_for(
        &self,
        document: String,
        field: String,
    ) -> PyResult<Vec<(String, String, String, u64)>> {
        let field: CanonicalField = field.parse().map_err(value_error)?;
        Ok(self
            .pipeline
            .trace()
            .for_field(&document, field)
            .into_iter()
            .map(|e| (e.stage.as_str().to_string(), e.input, e.output, e.seq))
            .collect())
    }

    /// Aggregate stage counters for summary reporting.
    fn stage_counts(&self) -> HashMap<String, u64> {
        let s = self.pipeline.trace().summary();
        HashMap::from([
            ("extract_attempts".to_string(), s.extract_attempts),
            ("extract_matched".to_string(), s.extract_matched),
            ("extract_unmatched".to_string(), s.extract_unmatched),
            ("fields_resolved".to_string(), s.fields_resolved),
            ("fields_unmatched".to_string(), s.fields_unmatched),
            ("normalized".to_string(), s.normalized),
            ("comuna_matched".to_string(), s.comuna_matched),
            ("comuna_unresolved".to_string(), s.comuna_unresolved),
        ])
    }
}

/// Apply the builtin Ñ/accent restoration pass to free text.
#[pyfunction]
fn restore_spelling(text: String) -> PyResult<String> {
    Ok(SpellingDictionary::builtin().restore(&text))
}

/// Match a comuna string against the builtin gazetteer.
/// Returns (canonical name or None, score).
#[pyfunction]
fn match_comuna(name: String) -> PyResult<(Option<String>, f64)> {
    let m = ComunaGazetteer::builtin().match_name(&name, config::DEFAULT_ACCEPTANCE_THRESHOLD);
    Ok((m.matched, m.score))
}

/// ASCII-fold a string the way every accent-insensitive comparison does.
#[pyfunction]
fn fold_text(text: String) -> PyResult<String> {
    Ok(fold(&text))
}

#[pymodule]
fn rust_contract_extract(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(restore_spelling, m)?)?;
    m.add_function(wrap_pyfunction!(match_comuna, m)?)?;
    m.add_function(wrap_pyfunction!(fold_text, m)?)?;
    m.add_class::<Extractor>()?;
    m.add_class::<ExtractedRecord>()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracted_record_mirrors_the_canonical_row() {
        let pipeline = Pipeline::new(RunConfig::builtin());
        let doc = Document::from_pages(
            "860418",
            Bank::Itau,
            vec![(1, "Comuna: NUNOA\n".to_string(), 0.8)],
        );
        let record = pipeline.process(&doc).unwrap();
        let py_record = ExtractedRecord::from_record(&record);

        assert_eq!(py_record.document, "860418");
        assert_eq!(py_record.bank, "ITAU");
        assert_eq!(py_record.fields.len(), ALL_FIELDS.len());
        assert_eq!(py_record.fields["COMUNA"], "Ñuñoa");
        assert_eq!(py_record.fields["OPERACION_1"], "860418");
        assert_eq!(py_record.page_quality, vec![(1, 0.8)]);
        assert!(py_record.warnings.is_empty());
    }
}
