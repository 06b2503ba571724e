//! Run configuration: per-bank pattern sets, dictionary and gazetteer
//! extensions, header aliases and matcher thresholds.
//!
//! Everything is validated when the config is built: unknown fields or
//! banks, malformed regexes, and out-of-range capture groups are rejected
//! up front. The resulting [`RunConfig`] is an immutable snapshot passed by
//! reference into every pipeline invocation.

use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::comuna::ComunaGazetteer;
use crate::dictionary::SpellingDictionary;
use crate::error::ExtractError;
use crate::patterns;
use crate::schema::{self, Bank, CanonicalField};

/// Default acceptance bound for the fuzzy comuna tier, on the
/// `1 - distance / max_len` similarity. Tolerates two edits on names of
/// eight characters and up.
pub const DEFAULT_ACCEPTANCE_THRESHOLD: f64 = 0.75;

/// One extraction pattern for a canonical field.
#[derive(Debug)]
pub struct FieldPattern {
    pub regex: Regex,
    /// Capture group yielding the value.
    pub group: usize,
    /// Higher priority wins at resolution time.
    pub priority: i32,
    /// When set, the window around a match must also match this.
    pub context: Option<Regex>,
    /// When set, a match whose window matches this is discarded.
    pub exclude: Option<Regex>,
}

impl FieldPattern {
    pub fn new(
        field: CanonicalField,
        pattern: &str,
        group: usize,
        priority: i32,
    ) -> Result<FieldPattern, ExtractError> {
        let regex = Regex::new(pattern).map_err(|e| ExtractError::BadPattern {
            field: field.header().to_string(),
            source: e,
        })?;
        let available = regex.captures_len() - 1;
        if group == 0 || group > available {
            return Err(ExtractError::BadCaptureGroup {
                field: field.header().to_string(),
                group,
                available,
            });
        }
        Ok(FieldPattern {
            regex,
            group,
            priority,
            context: None,
            exclude: None,
        })
    }

    pub fn with_context(
        mut self,
        field: CanonicalField,
        pattern: &str,
    ) -> Result<FieldPattern, ExtractError> {
        self.context = Some(compile(field, pattern)?);
        Ok(self)
    }

    pub fn with_exclude(
        mut self,
        field: CanonicalField,
        pattern: &str,
    ) -> Result<FieldPattern, ExtractError> {
        self.exclude = Some(compile(field, pattern)?);
        Ok(self)
    }
}

fn compile(field: CanonicalField, pattern: &str) -> Result<Regex, ExtractError> {
    Regex::new(pattern).map_err(|e| ExtractError::BadPattern {
        field: field.header().to_string(),
        source: e,
    })
}

/// Ordered extraction patterns for every canonical field of one bank.
#[derive(Debug, Default)]
pub struct PatternSet {
    by_field: HashMap<CanonicalField, Vec<FieldPattern>>,
}

impl PatternSet {
    pub fn insert(&mut self, field: CanonicalField, pattern: FieldPattern) {
        self.by_field.entry(field).or_default().push(pattern);
    }

    pub fn for_field(&self, field: CanonicalField) -> &[FieldPattern] {
        self.by_field.get(&field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn replace(&mut self, field: CanonicalField, patterns: Vec<FieldPattern>) {
        self.by_field.insert(field, patterns);
    }
}

/// Fuzzy matcher tunables.
#[derive(Debug, Clone, Copy)]
pub struct MatcherConfig {
    pub acceptance_threshold: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        MatcherConfig {
            acceptance_threshold: DEFAULT_ACCEPTANCE_THRESHOLD,
        }
    }
}

/// Immutable per-run snapshot of every configurable input.
#[derive(Debug)]
pub struct RunConfig {
    pattern_sets: HashMap<Bank, PatternSet>,
    pub dictionary: SpellingDictionary,
    pub gazetteer: ComunaGazetteer,
    pub matcher: MatcherConfig,
    aliases: Arc<HashMap<String, CanonicalField>>,
}

impl RunConfig {
    /// Builtin pattern sets for the known banks, builtin dictionary and
    /// gazetteer, default thresholds.
    pub fn builtin() -> RunConfig {
        RunConfig {
            pattern_sets: patterns::builtin_sets(),
            dictionary: SpellingDictionary::new(&[])
                .expect("builtin dictionary entries are well-formed"),
            gazetteer: ComunaGazetteer::new(&[]),
            matcher: MatcherConfig::default(),
            aliases: Arc::new(HashMap::new()),
        }
    }

    /// Builtin configuration amended by a JSON document (the shape the
    /// Python host stores per client). Bank sections replace the builtin
    /// pattern list per listed field; unlisted fields keep their builtin
    /// patterns. Dictionary entries, comunas and aliases extend the builtin
    /// tables.
    pub fn from_json(json: &str) -> Result<RunConfig, ExtractError> {
        let raw: RawConfig = serde_json::from_str(json)?;
        let mut config = RunConfig::builtin();

        for (bank_name, fields) in &raw.banks {
            let bank: Bank = bank_name.parse()?;
            let set = config.pattern_sets.entry(bank).or_default();
            for (field_name, raw_patterns) in fields {
                let field: CanonicalField = field_name.parse()?;
                let mut compiled = Vec::with_capacity(raw_patterns.len());
                for rp in raw_patterns {
                    let mut fp =
                        FieldPattern::new(field, &rp.pattern, rp.group.unwrap_or(1), rp.priority.unwrap_or(0))?;
                    if let Some(ctx) = &rp.context {
                        fp = fp.with_context(field, ctx)?;
                    }
                    if let Some(excl) = &rp.exclude {
                        fp = fp.with_exclude(field, excl)?;
                    }
                    compiled.push(fp);
                }
                set.replace(field, compiled);
            }
        }

        if !raw.dictionary.is_empty() {
            let extra: Vec<(String, String)> = raw.dictionary.into_iter().collect();
            config.dictionary = SpellingDictionary::new(&extra)?;
        }
        if !raw.comunas.is_empty() {
            config.gazetteer = ComunaGazetteer::new(&raw.comunas);
        }
        if let Some(threshold) = raw.acceptance_threshold {
            config.matcher.acceptance_threshold = threshold;
        }
        if !raw.aliases.is_empty() {
            let mut aliases = HashMap::with_capacity(raw.aliases.len());
            for (alias, field_name) in raw.aliases {
                let field: CanonicalField = field_name.parse()?;
                aliases.insert(alias.trim().to_lowercase(), field);
            }
            config.aliases = Arc::new(aliases);
        }

        Ok(config)
    }

    pub fn patterns_for(&self, bank: Bank) -> &PatternSet {
        lazy_static::lazy_static! {
            static ref EMPTY: PatternSet = PatternSet::default();
        }
        self.pattern_sets.get(&bank).unwrap_or(&EMPTY)
    }

    /// Configured aliases, shared with every assembled record.
    pub fn aliases(&self) -> Arc<HashMap<String, CanonicalField>> {
        Arc::clone(&self.aliases)
    }

    /// Resolve a header through configured aliases, then the builtin table.
    pub fn resolve_header(&self, name: &str) -> Option<CanonicalField> {
        self.aliases
            .get(name.trim().to_lowercase().as_str())
            .copied()
            .or_else(|| schema::resolve_header(name))
    }
}

#[derive(Deserialize)]
struct RawConfig {
    #[serde(default)]
    banks: HashMap<String, HashMap<String, Vec<RawPattern>>>,
    #[serde(default)]
    dictionary: HashMap<String, String>,
    #[serde(default)]
    comunas: Vec<String>,
    #[serde(default)]
    aliases: HashMap<String, String>,
    #[serde(default)]
    acceptance_threshold: Option<f64>,
}

#[derive(Deserialize)]
struct RawPattern {
    pattern: String,
    group: Option<usize>,
    priority: Option<i32>,
    context: Option<String>,
    exclude: Option<String>,
}
