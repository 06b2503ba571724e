//! Per-document pipeline and parallel batch runner.
//!
//! A document runs extraction → resolution → normalization → fuzzy comuna
//! matching → assembly, strictly in that order per field. Documents are
//! independent: the batch runner fans them out over rayon workers against
//! one immutable config snapshot, and a failing document is recorded and
//! skipped without touching its siblings.

use lazy_static::lazy_static;
use rayon::prelude::*;
use regex::Regex;
use std::collections::BTreeMap;

use crate::config::RunConfig;
use crate::error::{ExtractError, Warning};
use crate::extract::{extract_document, resolve};
use crate::normalize::normalize_field;
use crate::record::{CanonicalRecord, FieldStatus, FieldValue, assemble};
use crate::schema::{ALL_FIELDS, Bank, CanonicalField};
use crate::trace::TraceRecorder;

/// One OCR'd page: plain text plus the collaborator's opaque quality score.
#[derive(Debug, Clone)]
pub struct Page {
    pub index: usize,
    pub text: String,
    pub quality: f64,
}

/// One source PDF after OCR.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub bank: Bank,
    pub pages: Vec<Page>,
}

impl Document {
    pub fn new(id: impl Into<String>, bank: Bank, pages: Vec<Page>) -> Document {
        Document {
            id: id.into(),
            bank,
            pages,
        }
    }

    /// Build from the (page index, text, quality) tuples the OCR collaborator
    /// hands over.
    pub fn from_pages(
        id: impl Into<String>,
        bank: Bank,
        pages: Vec<(usize, String, f64)>,
    ) -> Document {
        Document {
            id: id.into(),
            bank,
            pages: pages
                .into_iter()
                .map(|(index, text, quality)| Page {
                    index,
                    text,
                    quality,
                })
                .collect(),
        }
    }
}

/// A document that failed structurally; the run continues without it.
#[derive(Debug, Clone)]
pub struct FailedDocument {
    pub id: String,
    pub error: String,
}

/// Batch result: one record per successful document plus the failure list.
pub struct BatchOutcome {
    pub records: Vec<CanonicalRecord>,
    pub failures: Vec<FailedDocument>,
}

/// Extraction pipeline over one immutable [`RunConfig`] snapshot.
pub struct Pipeline {
    config: RunConfig,
    trace: TraceRecorder,
}

impl Pipeline {
    pub fn new(config: RunConfig) -> Pipeline {
        Pipeline {
            config,
            trace: TraceRecorder::new(),
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn trace(&self) -> &TraceRecorder {
        &self.trace
    }

    /// Process one document to its canonical record.
    pub fn process(&self, doc: &Document) -> Result<CanonicalRecord, ExtractError> {
        if doc.pages.is_empty() {
            tracing::warn!(document = %doc.id, "document has no pages");
            return Err(ExtractError::EmptyDocument(doc.id.clone()));
        }
        tracing::debug!(document = %doc.id, bank = %doc.bank, pages = doc.pages.len(), "processing");

        let mut candidates =
            extract_document(&doc.id, &doc.pages, self.config.patterns_for(doc.bank), &self.trace);

        let mut values: BTreeMap<CanonicalField, FieldValue> = BTreeMap::new();
        let mut warnings: Vec<Warning> = Vec::new();

        for field in ALL_FIELDS {
            let field_candidates = candidates.remove(&field).unwrap_or_default();
            let winner = resolve(&doc.id, field, field_candidates, &self.trace);
            let (raw, status) = match winner {
                Some(c) => (c.raw, FieldStatus::Matched),
                None => (String::new(), FieldStatus::Unmatched),
            };

            let normalized = normalize_field(field, &raw, &self.config.dictionary);
            self.trace
                .record_normalization(&doc.id, field, &raw, &normalized.value);
            warnings.extend(normalized.warnings);

            let value = if field == CanonicalField::Comuna && !normalized.value.is_empty() {
                let outcome = self
                    .config
                    .gazetteer
                    .match_name(&normalized.value, self.config.matcher.acceptance_threshold);
                self.trace.record_fuzzy(&doc.id, field, &outcome);
                match outcome.matched {
                    Some(name) => name,
                    None => {
                        warnings.push(Warning::ComunaUnresolved {
                            value: normalized.value.clone(),
                        });
                        normalized.value
                    }
                }
            } else {
                normalized.value
            };

            values.insert(
                field,
                FieldValue {
                    raw,
                    normalized: value,
                    status,
                },
            );
        }

        let product = detect_document_type(&doc.pages);
        let quality = doc.pages.iter().map(|p| (p.index, p.quality)).collect();
        Ok(assemble(
            &doc.id,
            doc.bank,
            values,
            warnings,
            quality,
            product,
            &self.config,
        ))
    }

    /// Process documents in parallel. Failures are isolated per document;
    /// no error aborts the run.
    pub fn process_batch(&self, docs: &[Document]) -> BatchOutcome {
        let results: Vec<(String, Result<CanonicalRecord, ExtractError>)> = docs
            .par_iter()
            .map(|doc| (doc.id.clone(), self.process(doc)))
            .collect();

        let mut records = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for (id, result) in results {
            match result {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(document = %id, error = %e, "document failed");
                    failures.push(FailedDocument {
                        id,
                        error: e.to_string(),
                    });
                }
            }
        }
        BatchOutcome { records, failures }
    }
}

/// Promissory-note cues. Scored by substring presence over the upper-cased
/// full text.
const PP_INDICATORS: &[&str] = &[
    "PAGARÉ",
    "PAGARE",
    "PAGARÁ",
    "DOCUMENTO MERCANTIL",
    "VALOR RECIBIDO",
    "CONTRAVALOR RECIBIDO",
    "ME OBLIGO A PAGAR",
    "VENCIMIENTO",
];

/// Consumer-credit cues.
const CC_INDICATORS: &[&str] = &[
    "CRÉDITO DE CONSUMO",
    "CREDITO DE CONSUMO",
    "LÍNEA DE CRÉDITO",
    "CONTRATO DE MUTUO",
    "CUOTAS",
    "TASA DE INTERÉS",
    "CRONOGRAMA",
    "TABLA DE DESARROLLO",
    "PLAN DE PAGOS",
];

lazy_static! {
    static ref EN_CUOTAS: Regex = Regex::new(r"(?i)\ben\s+\d+\s+cuotas\b").unwrap();
    static ref PAGARE_CC: Regex =
        Regex::new(r"(?i)pagar[ée]?\s+cr[ée]dito\s+(?:de\s+)?consumo").unwrap();
    static ref OBLIGO_PP: Regex =
        Regex::new(r"(?i)pagar[ée]|me\s+obligo\s+a\s+pagar").unwrap();
    static ref IDENT_NOMBRE: Regex =
        Regex::new(r"(?i)Nombre\s+y\s+Apellidos\s+del\s+deudor").unwrap();
    static ref IDENT_CEDULA: Regex = Regex::new(r"(?i)C[eé]dula\s+de\s+Identidad").unwrap();
}

/// Decide between pagaré ("PP") and consumer credit ("CC") from indicator
/// scores over the whole document. Ties go to CC.
pub fn detect_document_type(pages: &[Page]) -> &'static str {
    let combined: String = pages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let upper = combined.to_uppercase();

    let mut pp_score: i32 = PP_INDICATORS.iter().filter(|i| upper.contains(**i)).count() as i32;
    let mut cc_score: i32 = CC_INDICATORS.iter().filter(|i| upper.contains(**i)).count() as i32;

    if EN_CUOTAS.is_match(&combined) {
        cc_score += 3;
    }
    // "PAGARE CREDITO CONSUMO" headers are consumer credit despite the word
    // pagaré.
    if PAGARE_CC.is_match(&combined) {
        cc_score += 10;
    }
    if OBLIGO_PP.is_match(&combined) {
        pp_score += 3;
    }
    if IDENT_NOMBRE.is_match(&combined) && IDENT_CEDULA.is_match(&combined) {
        cc_score += 4;
    }

    tracing::debug!(pp_score, cc_score, "document type detection");
    if pp_score > cc_score { "PP" } else { "CC" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::CanonicalField::*;

    fn page(index: usize, text: &str) -> Page {
        Page {
            index,
            text: text.to_string(),
            quality: 0.9,
        }
    }

    const CC_SAMPLE: &str = "\
PAGARE CREDITO CONSUMO
Nombre y Apellidos del deudor: MIGUEL ALEJANDRO ROA GARCIA
Cédula de Identidad N°: 15.657.067 - 2
Domicilio: LOS PINGUINOS 0447, TEMUCO
Comuna: TEMUCO
En Santiago, a 29 de mayo de 2023
la suma de $ 21.481.761 pagadera en 60 cuotas iguales de $ 566.331
venciendo la primera cuota el día 29 de junio de 2023 y la última el 29 de mayo de 2028
";

    #[test]
    fn full_document_extracts_the_reference_row() {
        let pipeline = Pipeline::new(RunConfig::builtin());
        let doc = Document::new("60247566", Bank::Itau, vec![page(1, CC_SAMPLE)]);
        let record = pipeline.process(&doc).unwrap();

        assert_eq!(record.value(Operacion), "60247566");
        assert_eq!(record.value(Rut), "15657067");
        assert_eq!(record.value(Dv), "2");
        assert_eq!(record.value(Nombre), "Miguel Alejandro Roa Garcia");
        assert_eq!(record.value(Direccion), "Los Pinguinos 0447");
        assert_eq!(record.value(Comuna), "Temuco");
        assert_eq!(record.value(FechaSuscripcion), "29-05-2023");
        assert_eq!(record.value(MontoCredito), "21481761");
        assert_eq!(record.value(Cuotas), "60");
        assert_eq!(record.value(MontoCuota), "566331");
        assert_eq!(record.value(FechaVencimientoPrimeraCuota), "29-06-2023");
        assert_eq!(record.value(FechaVencimientoUltimaCuota), "29-05-2028");
        assert_eq!(record.value(Capital), "21481761");
        assert_eq!(record.value(Producto), "CC");
        assert!(record.warnings.is_empty(), "{:?}", record.warnings);
    }

    #[test]
    fn dropped_tilde_comuna_resolves_exactly_after_restoration() {
        let pipeline = Pipeline::new(RunConfig::builtin());
        let doc = Document::new(
            "doc-a",
            Bank::Itau,
            vec![page(1, "Domicilio: IRARRAZAVAL 2821\nComuna: NUNOA\n")],
        );
        let record = pipeline.process(&doc).unwrap();
        assert_eq!(record.value(Comuna), "Ñuñoa");
        assert!(record.warnings.is_empty(), "{:?}", record.warnings);

        let fuzzy = pipeline.trace().for_field("doc-a", Comuna);
        let entry = fuzzy
            .iter()
            .find(|e| e.stage == crate::trace::Stage::FuzzyComuna)
            .unwrap();
        assert_eq!(entry.input, "ÑUÑOA");
        assert!(entry.output.contains("1.00"));
    }

    #[test]
    fn missing_accents_fall_to_the_folded_tier() {
        let pipeline = Pipeline::new(RunConfig::builtin());
        let doc = Document::new(
            "doc-b",
            Bank::Itau,
            vec![page(1, "Comuna: Vina del mar\n")],
        );
        let record = pipeline.process(&doc).unwrap();
        assert_eq!(record.value(Comuna), "Viña del Mar");
        assert!(record.warnings.is_empty(), "{:?}", record.warnings);

        let fuzzy = pipeline.trace().for_field("doc-b", Comuna);
        let entry = fuzzy
            .iter()
            .find(|e| e.stage == crate::trace::Stage::FuzzyComuna)
            .unwrap();
        assert!(entry.output.contains("0.95"));
    }

    #[test]
    fn unknown_comuna_is_kept_with_a_warning() {
        let pipeline = Pipeline::new(RunConfig::builtin());
        let doc = Document::new(
            "doc-c",
            Bank::Itau,
            vec![page(1, "Comuna: ZUNIGA\n")],
        );
        let record = pipeline.process(&doc).unwrap();
        // Restoration still fixes the spelling; the gazetteer rejects it.
        assert_eq!(record.value(Comuna), "ZÚÑIGA");
        assert!(record
            .warnings
            .iter()
            .any(|w| w.code() == "COMUNA_UNRESOLVED"));
    }

    #[test]
    fn empty_document_fails_alone_and_the_run_continues() {
        let pipeline = Pipeline::new(RunConfig::builtin());
        let docs = vec![
            Document::new("empty-doc", Bank::Itau, Vec::new()),
            Document::new("60247566", Bank::Itau, vec![page(1, CC_SAMPLE)]),
        ];
        let outcome = pipeline.process_batch(&docs);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].id, "empty-doc");
        assert!(outcome.failures[0].error.contains("no pages"));
    }

    #[test]
    fn batch_processes_documents_in_parallel() {
        let pipeline = Pipeline::new(RunConfig::builtin());
        let docs: Vec<Document> = (0..8)
            .map(|i| Document::new(format!("doc-{i:02}-860418"), Bank::Itau, vec![page(1, CC_SAMPLE)]))
            .collect();
        let outcome = pipeline.process_batch(&docs);
        assert_eq!(outcome.records.len(), 8);
        assert!(outcome.failures.is_empty());
        for record in &outcome.records {
            assert_eq!(record.value(Rut), "15657067");
        }
    }

    #[test]
    fn page_quality_passes_through_untouched() {
        let pipeline = Pipeline::new(RunConfig::builtin());
        let doc = Document::from_pages(
            "doc-q",
            Bank::Itau,
            vec![(1, "Comuna: MACUL".to_string(), 0.42), (2, String::new(), 0.77)],
        );
        let record = pipeline.process(&doc).unwrap();
        assert_eq!(record.page_quality, vec![(1, 0.42), (2, 0.77)]);
        assert!((record.mean_quality() - 0.595).abs() < 1e-9);
    }

    #[test]
    fn detects_pagare_versus_consumer_credit() {
        let pp = vec![page(
            1,
            "PAGARÉ\nDebo y me obligo a pagar a la orden del Banco por valor recibido\ncon vencimiento al 29/05/2024",
        )];
        assert_eq!(detect_document_type(&pp), "PP");

        let cc = vec![page(
            1,
            "CRÉDITO DE CONSUMO pagadero en 48 cuotas según tabla de desarrollo",
        )];
        assert_eq!(detect_document_type(&cc), "CC");
    }

    #[test]
    fn pagare_credito_consumo_header_counts_as_consumer_credit() {
        let pages = vec![page(1, "PAGARE CREDITO CONSUMO en 60 cuotas")];
        assert_eq!(detect_document_type(&pages), "CC");
    }
}
