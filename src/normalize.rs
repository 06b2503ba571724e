//! Value normalization per field kind: whitespace and case cleanup plus the
//! spelling-restoration pass for text, separator stripping and format
//! validation for identifiers, digit extraction for amounts, and the
//! ordered-format date parser.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

use crate::dictionary::{SpellingDictionary, fold};
use crate::error::Warning;
use crate::schema::{CanonicalField, ValueKind};

/// Result of normalizing one raw value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub value: String,
    pub warnings: Vec<Warning>,
}

impl Normalized {
    fn clean(value: String) -> Normalized {
        Normalized {
            value,
            warnings: Vec::new(),
        }
    }
}

/// Normalize `raw` according to the field's value kind. Empty input stays
/// empty and never warns.
pub fn normalize_field(
    field: CanonicalField,
    raw: &str,
    dict: &SpellingDictionary,
) -> Normalized {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Normalized::clean(String::new());
    }
    match field.kind() {
        ValueKind::Text => Normalized::clean(normalize_text(field, trimmed, dict)),
        ValueKind::Identifier => normalize_identifier(field, trimmed),
        ValueKind::Money | ValueKind::Integer => Normalized::clean(digits_only(trimmed)),
        ValueKind::Rate => Normalized::clean(normalize_rate(trimmed)),
        ValueKind::Date => normalize_date(field, trimmed),
    }
}

fn normalize_text(field: CanonicalField, raw: &str, dict: &SpellingDictionary) -> String {
    let collapsed = collapse_whitespace(raw);
    let stripped = collapsed.trim_matches(|c: char| " .,:;-".contains(c));
    let cased = match field {
        CanonicalField::Nombre
        | CanonicalField::Direccion
        | CanonicalField::NombreApoderado
        | CanonicalField::NombreApoderado2 => title_case(stripped),
        // Comunas, branch codes and product codes stay upper-cased; the
        // gazetteer supplies canonical casing for matched comunas later.
        _ => stripped.to_uppercase(),
    };
    dict.restore(&cased)
}

fn normalize_identifier(field: CanonicalField, raw: &str) -> Normalized {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '.' | ',' | '-' | '–' | '—' | ' ' | '\t'))
        .flat_map(|c| c.to_uppercase())
        .collect();
    let valid = match field {
        CanonicalField::Rut => cleaned.len() >= 7
            && cleaned.len() <= 8
            && cleaned.chars().all(|c| c.is_ascii_digit()),
        CanonicalField::Dv => {
            cleaned.len() == 1 && cleaned.chars().all(|c| c.is_ascii_digit() || c == 'K')
        }
        _ => cleaned.len() >= 6 && cleaned.chars().all(|c| c.is_ascii_digit()),
    };
    let warnings = if valid {
        Vec::new()
    } else {
        vec![Warning::MalformedIdentifier {
            field: field.header().to_string(),
            value: cleaned.clone(),
        }]
    };
    Normalized {
        value: cleaned,
        warnings,
    }
}

fn normalize_rate(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && *c != '%' && *c != '$')
        .map(|c| if c == ',' { '.' } else { c })
        .collect()
}

fn digits_only(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Title-case a Spanish phrase: capitalize each word, keep connective
/// particles lowercase unless they open the phrase.
pub fn title_case(s: &str) -> String {
    const PARTICLES: [&str; 8] = ["de", "del", "la", "las", "los", "y", "e", "en"];
    s.split_whitespace()
        .enumerate()
        .map(|(i, word)| {
            let lower = word.to_lowercase();
            if i > 0 && PARTICLES.contains(&lower.as_str()) {
                lower
            } else {
                let mut chars = lower.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => lower,
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

lazy_static! {
    static ref NUMERIC_DATE: Regex =
        Regex::new(r"\b(\d{1,2})[/\-.](\d{1,2})[/\-.](\d{2,4})\b").unwrap();
    static ref ISO_DATE: Regex =
        Regex::new(r"\b(\d{4})[/\-.](\d{1,2})[/\-.](\d{1,2})\b").unwrap();
    static ref SPANISH_DATE: Regex = Regex::new(
        r"(?i)\b(\d{1,2})\s+de\s+([a-záéíóúñ]+)\s+de\s+(\d{4})\b"
    )
    .unwrap();
}

fn normalize_date(field: CanonicalField, raw: &str) -> Normalized {
    if let Some(date) = parse_date(raw) {
        return Normalized::clean(date);
    }
    Normalized {
        value: collapse_whitespace(raw),
        warnings: vec![Warning::UnparsedDate {
            field: field.header().to_string(),
            value: collapse_whitespace(raw),
        }],
    }
}

/// Ordered date formats, first parse wins: dd/mm/yyyy (also `-` and `.`
/// separators, two-digit years), yyyy-mm-dd, then the Spanish long form
/// «29 de mayo de 2023». Output is always DD-MM-YYYY.
pub fn parse_date(text: &str) -> Option<String> {
    let flat = collapse_whitespace(text);

    if let Some(caps) = NUMERIC_DATE.captures(&flat) {
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let year = expand_year(caps[3].parse().ok()?);
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date.format("%d-%m-%Y").to_string());
        }
    }

    if let Some(caps) = ISO_DATE.captures(&flat) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date.format("%d-%m-%Y").to_string());
        }
    }

    if let Some(caps) = SPANISH_DATE.captures(&flat) {
        let day: u32 = caps[1].parse().ok()?;
        let month = spanish_month(&caps[2])?;
        let year: i32 = caps[3].parse().ok()?;
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date.format("%d-%m-%Y").to_string());
        }
    }

    None
}

fn expand_year(y: i32) -> i32 {
    if y >= 100 {
        y
    } else if y < 69 {
        2000 + y
    } else {
        1900 + y
    }
}

fn spanish_month(name: &str) -> Option<u32> {
    match fold(name).as_str() {
        "enero" => Some(1),
        "febrero" => Some(2),
        "marzo" => Some(3),
        "abril" => Some(4),
        "mayo" => Some(5),
        "junio" => Some(6),
        "julio" => Some(7),
        "agosto" => Some(8),
        "septiembre" | "setiembre" => Some(9),
        "octubre" => Some(10),
        "noviembre" => Some(11),
        "diciembre" => Some(12),
        _ => None,
    }
}

/// Modulo-11 check digit for a Chilean RUT body. Returns `None` when the
/// input is not all digits.
pub fn compute_dv(rut: &str) -> Option<String> {
    if rut.is_empty() || !rut.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    const FACTORS: [u32; 6] = [2, 3, 4, 5, 6, 7];
    let total: u32 = rut
        .chars()
        .rev()
        .enumerate()
        .map(|(i, c)| c.to_digit(10).unwrap_or(0) * FACTORS[i % FACTORS.len()])
        .sum();
    Some(match 11 - (total % 11) {
        11 => "0".to_string(),
        10 => "K".to_string(),
        d => d.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::CanonicalField::*;

    fn norm(field: crate::schema::CanonicalField, raw: &str) -> Normalized {
        normalize_field(field, raw, SpellingDictionary::builtin())
    }

    #[test]
    fn names_are_title_cased_and_restored() {
        let n = norm(Nombre, "  FERNANDO   SEGUNDO  MUNOZ CAMPOS ");
        assert_eq!(n.value, "Fernando Segundo Muñoz Campos");
        assert!(n.warnings.is_empty());
    }

    #[test]
    fn addresses_keep_numbers_and_lowercase_particles() {
        let n = norm(Direccion, "AVENIDA LOS PINGUINOS 0447,");
        assert_eq!(n.value, "Avenida los Pinguinos 0447");
    }

    #[test]
    fn comuna_text_stays_uppercase_with_tilde_restored() {
        let n = norm(Comuna, "NUNOA");
        assert_eq!(n.value, "ÑUÑOA");
    }

    #[test]
    fn rut_strips_separators_and_validates_length() {
        let n = norm(Rut, "15.657.067");
        assert_eq!(n.value, "15657067");
        assert!(n.warnings.is_empty());

        let bad = norm(Rut, "12 34");
        assert_eq!(bad.value, "1234");
        assert_eq!(bad.warnings.len(), 1);
        assert_eq!(bad.warnings[0].code(), "MALFORMED_IDENTIFIER");
    }

    #[test]
    fn dv_uppercases_the_check_letter() {
        assert_eq!(norm(Dv, "k").value, "K");
        assert!(norm(Dv, "k").warnings.is_empty());
        assert_eq!(norm(Dv, "99").warnings.len(), 1);
    }

    #[test]
    fn money_reduces_to_plain_digits() {
        assert_eq!(norm(MontoCredito, "$ 5.713.357").value, "5713357");
        assert_eq!(norm(Capital, "21.481.761").value, "21481761");
    }

    #[test]
    fn rates_drop_the_percent_sign_and_use_dot_decimals() {
        assert_eq!(norm(Tasa, "1,62 %").value, "1.62");
        assert_eq!(norm(Tasa, "0.00%").value, "0.00");
    }

    #[test]
    fn date_formats_are_tried_in_order() {
        assert_eq!(norm(FechaSuscripcion, "29/05/2023").value, "29-05-2023");
        assert_eq!(norm(FechaSuscripcion, "29-05-23").value, "29-05-2023");
        assert_eq!(norm(FechaSuscripcion, "2025-09-25").value, "25-09-2025");
        assert_eq!(
            norm(FechaSuscripcion, "29 de mayo de 2023").value,
            "29-05-2023"
        );
        assert_eq!(
            norm(FechaSuscripcion, "Santiago, a 25 de Septiembre de 2025").value,
            "25-09-2025"
        );
    }

    #[test]
    fn unparseable_date_warns_and_keeps_the_raw_text() {
        let n = norm(FechaSuscripcion, "sin fecha legible");
        assert_eq!(n.value, "sin fecha legible");
        assert_eq!(n.warnings.len(), 1);
        assert_eq!(n.warnings[0].code(), "UNPARSED_DATE");
    }

    #[test]
    fn empty_values_pass_through_silently() {
        let n = norm(Rut, "   ");
        assert_eq!(n.value, "");
        assert!(n.warnings.is_empty());
    }

    #[test]
    fn check_digit_follows_the_modulo_11_rule() {
        // 15.657.067-2 and 4.499.116-0 come from known-good reference rows.
        assert_eq!(compute_dv("15657067").as_deref(), Some("2"));
        assert_eq!(compute_dv("4499116").as_deref(), Some("0"));
        assert_eq!(compute_dv(""), None);
        assert_eq!(compute_dv("12a"), None);
    }
}
