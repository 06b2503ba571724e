//! Comuna gazetteer and fuzzy matching.
//!
//! Free-text comuna strings coming out of OCR are matched in three tiers:
//! exact (case-insensitive), ASCII-folded exact, and only then an
//! edit-distance scan. The first two tiers cover the overwhelming majority
//! of pages without computing a single distance.

use lazy_static::lazy_static;

use crate::dictionary::fold;

/// Canonical comuna names, accent-correct, title-cased. Folded lookup forms
/// are derived at construction, so the table lists each comuna once.
const BUILTIN_COMUNAS: &[&str] = &[
    // Región Metropolitana
    "Santiago",
    "Las Condes",
    "Providencia",
    "Ñuñoa",
    "La Reina",
    "Vitacura",
    "Lo Barnechea",
    "Maipú",
    "Puente Alto",
    "San Miguel",
    "La Florida",
    "Peñalolén",
    "Macul",
    "San Joaquín",
    "Pedro Aguirre Cerda",
    "San Ramón",
    "La Cisterna",
    "El Bosque",
    "La Pintana",
    "La Granja",
    "Lo Espejo",
    "San Bernardo",
    "Calera de Tango",
    "Pirque",
    "Quilicura",
    "Huechuraba",
    "Recoleta",
    "Independencia",
    "Conchalí",
    "Renca",
    "Cerro Navia",
    "Quinta Normal",
    "Lo Prado",
    "Estación Central",
    "Cerrillos",
    "Pudahuel",
    "Padre Hurtado",
    "Melipilla",
    "Talagante",
    "Peñaflor",
    "El Monte",
    "Isla de Maipo",
    "Curacaví",
    "María Pinto",
    "San Pedro",
    "Alhué",
    "Colina",
    "Buin",
    "Paine",
    // Valparaíso
    "Valparaíso",
    "Viña del Mar",
    "Concón",
    "Quilpué",
    "Villa Alemana",
    "Limache",
    "Olmué",
    "Quillota",
    "La Calera",
    "Hijuelas",
    "La Cruz",
    "Nogales",
    "San Antonio",
    "Cartagena",
    "El Tabo",
    "El Quisco",
    "Algarrobo",
    "Santo Domingo",
    // O'Higgins
    "Rancagua",
    "Machalí",
    "Graneros",
    "Codegua",
    "Requínoa",
    "Rengo",
    "Olivar",
    "Doñihue",
    "Coltauco",
    "Coinco",
    "Peumo",
    "Pichidegua",
    "San Vicente",
    "Navidad",
    "Litueche",
    "La Estrella",
    "Marchihue",
    "Paredones",
    "Pichilemu",
    // Biobío and south-central
    "Concepción",
    "Coronel",
    "Talcahuano",
    "Chiguayante",
    "Hualpén",
    "Penco",
    "Lota",
    "Tomé",
    "Cañete",
    "Chillán",
    "Talca",
    "Linares",
    "Curicó",
    "Temuco",
    "Valdivia",
    "Osorno",
    "Puerto Montt",
    "Puerto Varas",
    "Puerto Aysén",
    "Punta Arenas",
    // North
    "Arica",
    "Iquique",
    "Antofagasta",
    "Calama",
    "Copiapó",
    "La Serena",
    "Coquimbo",
    "Illapel",
];

/// Outcome of a gazetteer lookup. `matched` is the canonical name, or `None`
/// when nothing reached the acceptance threshold; `score` is the similarity
/// of the best candidate either way.
#[derive(Debug, Clone, PartialEq)]
pub struct ComunaMatch {
    pub input: String,
    pub matched: Option<String>,
    pub score: f64,
}

/// Read-only list of valid comunas with precomputed folded forms.
#[derive(Debug)]
pub struct ComunaGazetteer {
    names: Vec<String>,
    folded: Vec<String>,
}

impl ComunaGazetteer {
    /// Shared instance over the builtin comuna list.
    pub fn builtin() -> &'static ComunaGazetteer {
        lazy_static! {
            static ref BUILTIN: ComunaGazetteer =
                ComunaGazetteer::from_names(BUILTIN_COMUNAS.iter().map(|s| s.to_string()));
        }
        &BUILTIN
    }

    /// Builtin list plus caller additions (duplicates by folded form are
    /// dropped).
    pub fn new(extra: &[String]) -> ComunaGazetteer {
        ComunaGazetteer::from_names(
            BUILTIN_COMUNAS
                .iter()
                .map(|s| s.to_string())
                .chain(extra.iter().cloned()),
        )
    }

    pub fn from_names(names: impl IntoIterator<Item = String>) -> ComunaGazetteer {
        let mut gaz = ComunaGazetteer {
            names: Vec::new(),
            folded: Vec::new(),
        };
        for name in names {
            let folded = fold(&name);
            if !gaz.folded.contains(&folded) {
                gaz.names.push(name);
                gaz.folded.push(folded);
            }
        }
        gaz
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Three-tier lookup. `threshold` is the fuzzy acceptance bound on
    /// `1 - distance / max_len`; ties resolve to the shortest name, then
    /// lexically.
    pub fn match_name(&self, input: &str, threshold: f64) -> ComunaMatch {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return ComunaMatch {
                input: input.to_string(),
                matched: None,
                score: 0.0,
            };
        }

        // Tier 1: exact, case-insensitive.
        let lowered = trimmed.to_lowercase();
        for name in &self.names {
            if name.to_lowercase() == lowered {
                return ComunaMatch {
                    input: input.to_string(),
                    matched: Some(name.clone()),
                    score: 1.0,
                };
            }
        }

        // Tier 2: exact on folded forms, absorbing dropped accents.
        let input_folded = fold(trimmed);
        for (name, folded) in self.names.iter().zip(&self.folded) {
            if *folded == input_folded {
                return ComunaMatch {
                    input: input.to_string(),
                    matched: Some(name.clone()),
                    score: 0.95,
                };
            }
        }

        // Tier 3: edit distance over folded forms.
        let mut best: Option<(&String, f64)> = None;
        for (name, folded) in self.names.iter().zip(&self.folded) {
            let max_len = input_folded.chars().count().max(folded.chars().count());
            if max_len == 0 {
                continue;
            }
            let dist = levenshtein(&input_folded, folded);
            let score = 1.0 - dist as f64 / max_len as f64;
            let replace = match best {
                None => true,
                Some((current, current_score)) => {
                    let (len, cur_len) = (name.chars().count(), current.chars().count());
                    score > current_score
                        || (score == current_score
                            && (len < cur_len || (len == cur_len && name < current)))
                }
            };
            if replace {
                best = Some((name, score));
            }
        }

        match best {
            Some((name, score)) if score > threshold => ComunaMatch {
                input: input.to_string(),
                matched: Some(name.clone()),
                score,
            },
            Some((_, score)) => ComunaMatch {
                input: input.to_string(),
                matched: None,
                score,
            },
            None => ComunaMatch {
                input: input.to_string(),
                matched: None,
                score: 0.0,
            },
        }
    }
}

/// Plain Levenshtein distance over chars, two-row rolling table.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            curr[j + 1] = (prev[j + 1] + 1) // deletion
                .min(curr[j] + 1) // insertion
                .min(prev[j] + cost); // substitution
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
