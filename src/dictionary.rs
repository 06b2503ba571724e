//! Spelling restoration for Chilean-Spanish OCR text.
//!
//! Scanned contracts routinely lose the Ñ tilde and vowel accents
//! ("NUNOA" for "ÑUÑOA", "MUNOZ" for "MUÑOZ"). The dictionary maps the
//! ASCII-folded form of each known word to its canonical spelling and
//! replaces matches accent- and case-insensitively, so one entry covers
//! every OCR variant and re-applying the pass changes nothing.

use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::error::ExtractError;

/// Single-word restorations, keyed by ASCII-folded form. Canonical forms are
/// stored title-cased; the replacement takes the casing shape of the matched
/// token. Multi-word comuna repairs are not listed here; the gazetteer's
/// folded tier resolves those.
const BUILTIN_ENTRIES: &[(&str, &str)] = &[
    // Surnames
    ("pena", "Peña"),
    ("munoz", "Muñoz"),
    ("nunez", "Núñez"),
    ("ibanez", "Ibañez"),
    ("yanez", "Yáñez"),
    ("acuna", "Acuña"),
    ("zuniga", "Zúñiga"),
    ("vicuna", "Vicuña"),
    ("montana", "Montaña"),
    ("castaneda", "Castañeda"),
    ("niquen", "Ñiquén"),
    // Given names
    ("nino", "Niño"),
    ("nina", "Niña"),
    ("inigo", "Iñigo"),
    ("inaki", "Iñaki"),
    // Place names
    ("espana", "España"),
    ("penalolen", "Peñalolén"),
    ("penaflor", "Peñaflor"),
    ("nunoa", "Ñuñoa"),
    ("nuble", "Ñuble"),
    ("canete", "Cañete"),
    ("nancul", "Ñancul"),
    // Contract vocabulary
    ("senor", "Señor"),
    ("senora", "Señora"),
    ("dueno", "Dueño"),
    ("ano", "Año"),
    ("anos", "Años"),
];

/// ASCII-fold a string: decompose, drop combining marks, lowercase.
/// "Ñuñoa" and "NUNOA" both fold to "nunoa".
pub fn fold(s: &str) -> String {
    s.nfd()
        .filter(|c| !unicode_normalization::char::is_combining_mark(*c))
        .flat_map(|c| c.to_lowercase())
        .collect()
}

#[derive(Debug)]
struct DictEntry {
    canonical: String,
    pattern: Regex,
}

/// Ordered table of (ascii-folded key → canonical form) pairs.
#[derive(Debug)]
pub struct SpellingDictionary {
    entries: Vec<DictEntry>,
}

impl SpellingDictionary {
    /// Shared instance holding the builtin entries only.
    pub fn builtin() -> &'static SpellingDictionary {
        lazy_static! {
            static ref BUILTIN: SpellingDictionary = SpellingDictionary::new(&[])
                .expect("builtin dictionary entries are well-formed");
        }
        &BUILTIN
    }

    /// Builtin entries plus caller additions. Extra keys are folded before
    /// compilation, so configs may list them accented or not.
    pub fn new(extra: &[(String, String)]) -> Result<Self, ExtractError> {
        let mut entries = Vec::with_capacity(BUILTIN_ENTRIES.len() + extra.len());
        for (key, canonical) in BUILTIN_ENTRIES {
            entries.push(compile_entry(key, canonical)?);
        }
        for (key, canonical) in extra {
            entries.push(compile_entry(&fold(key), canonical)?);
        }
        Ok(SpellingDictionary { entries })
    }

    /// Apply every restoration to `text`. Idempotent: canonical spellings
    /// match their own entry and are rewritten to themselves.
    pub fn restore(&self, text: &str) -> String {
        let mut result = text.to_string();
        for entry in &self.entries {
            if entry.pattern.is_match(&result) {
                result = entry
                    .pattern
                    .replace_all(&result, |caps: &regex::Captures| {
                        shape_case(caps.get(0).map(|m| m.as_str()).unwrap_or(""), &entry.canonical)
                    })
                    .into_owned();
            }
        }
        result
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Build the accent-insensitive word pattern for a folded key: each vowel or
/// n may appear with or without its mark, whitespace in the key matches any
/// run of whitespace.
fn compile_entry(key: &str, canonical: &str) -> Result<DictEntry, ExtractError> {
    let mut source = String::from(r"(?i)\b");
    for c in key.chars() {
        match c {
            'a' => source.push_str("[aá]"),
            'e' => source.push_str("[eé]"),
            'i' => source.push_str("[ií]"),
            'o' => source.push_str("[oó]"),
            'u' => source.push_str("[uúü]"),
            'n' => source.push_str("[nñ]"),
            c if c.is_whitespace() => source.push_str(r"\s+"),
            c => source.push_str(&regex::escape(&c.to_string())),
        }
    }
    source.push_str(r"\b");
    let pattern = Regex::new(&source).map_err(|e| ExtractError::BadPattern {
        field: format!("dictionary entry '{}'", key),
        source: e,
    })?;
    Ok(DictEntry {
        canonical: canonical.to_string(),
        pattern,
    })
}

/// Re-case `canonical` to the shape of the matched token: all caps stays all
/// caps, a capitalized token keeps the stored title form, lowercase stays
/// lowercase.
fn shape_case(sample: &str, canonical: &str) -> String {
    let mut letters = sample.chars().filter(|c| c.is_alphabetic()).peekable();
    let first_upper = letters.peek().map(|c| c.is_uppercase()).unwrap_or(false);
    let all_upper = first_upper && letters.all(|c| !c.is_lowercase());
    if all_upper {
        canonical.to_uppercase()
    } else if first_upper {
        canonical.to_string()
    } else {
        canonical.to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_strips_accents_and_case() {
        assert_eq!(fold("Ñuñoa"), "nunoa");
        assert_eq!(fold("VIÑA DEL MAR"), "vina del mar");
        assert_eq!(fold("Peñalolén"), "penalolen");
        assert_eq!(fold("already plain"), "already plain");
    }

    #[test]
    fn restores_tilde_in_uppercase_comuna() {
        let dict = SpellingDictionary::builtin();
        assert_eq!(dict.restore("COMUNA DE NUNOA"), "COMUNA DE ÑUÑOA");
    }

    #[test]
    fn restores_surnames_keeping_case_shape() {
        let dict = SpellingDictionary::builtin();
        assert_eq!(dict.restore("JUAN MUNOZ PENA"), "JUAN MUÑOZ PEÑA");
        assert_eq!(dict.restore("Juan Munoz"), "Juan Muñoz");
        assert_eq!(dict.restore("firma del senor nunez"), "firma del señor núñez");
    }

    #[test]
    fn restoration_is_idempotent() {
        let dict = SpellingDictionary::builtin();
        let inputs = [
            "COMUNA DE NUNOA",
            "JUAN MUÑOZ PEÑA",
            "Señora María Núñez, Peñalolén",
            "texto sin cambios",
            "60 ANOS, SENOR DUENO DE CASA EN CANETE",
        ];
        for input in inputs {
            let once = dict.restore(input);
            let twice = dict.restore(&once);
            assert_eq!(once, twice, "restoration not idempotent for {:?}", input);
        }
    }

    #[test]
    fn word_boundaries_protect_longer_words() {
        let dict = SpellingDictionary::builtin();
        // MANO contains "ano" but must not become MAÑO.
        assert_eq!(dict.restore("ENTREGADO EN MANO"), "ENTREGADO EN MANO");
        assert_eq!(dict.restore("HACE 3 ANOS"), "HACE 3 AÑOS");
    }

    #[test]
    fn accented_ocr_variants_hit_the_same_entry() {
        let dict = SpellingDictionary::builtin();
        // OCR kept the accent but lost the tilde.
        assert_eq!(dict.restore("NÚNEZ"), "NÚÑEZ");
    }

    #[test]
    fn extra_entries_extend_the_builtin_table() {
        let dict = SpellingDictionary::new(&[("hualpen".to_string(), "Hualpén".to_string())])
            .unwrap();
        assert!(dict.len() > SpellingDictionary::builtin().len());
        assert_eq!(dict.restore("HUALPEN"), "HUALPÉN");
    }
}
