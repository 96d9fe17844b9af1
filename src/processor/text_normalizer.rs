use anyhow::Result;
use polars::prelude::*;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{info, warn};
use unicode_normalization::UnicodeNormalization;

use super::columns::{has_column, set_str, str_values};
use crate::config::TextConfig;

static QUANTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d+\s*(g|kg|ml|l|mg|cl|dl|u|uds?|unidades?)\b").expect("valid quantity regex")
});
static MULTIPACK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+x\d+\b").expect("valid multipack regex"));
static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+\s*%").expect("valid percent regex"));
static SPECIAL_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\sáéíóúüñÁÉÍÓÚÜÑ]").expect("valid special chars regex"));
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Common Spanish function words.
const SPANISH_STOPWORDS: &[&str] = &[
    "de", "la", "que", "el", "en", "y", "a", "los", "del", "se", "las", "por", "un", "para",
    "con", "no", "una", "su", "al", "lo", "como", "más", "pero", "sus", "le", "ya", "o", "este",
    "sí", "porque", "esta", "entre", "cuando", "muy", "sin", "sobre", "también", "me", "hasta",
    "hay", "donde", "quien", "desde", "todo", "nos", "durante", "todos", "uno", "les", "ni",
    "contra", "otros", "ese", "eso", "ante", "ellos", "e", "esto", "mí", "antes", "algunos",
    "qué", "unos", "yo", "otro", "otras", "otra", "él", "tanto", "esa", "estos", "mucho",
    "quienes", "nada", "muchos", "cual", "poco", "ella", "estar", "estas", "algunas", "algo",
    "nosotros", "mi", "mis", "tú", "te", "ti", "tu", "tus", "ellas", "os", "es", "son", "fue",
    "ser", "era", "sea", "cada", "u",
];

/// Full cleaning of one free-text value; empty results become `None`.
pub fn clean_text(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let text: String = text.nfc().collect::<String>().to_lowercase();
    let text = QUANTITY_RE.replace_all(&text, "");
    let text = MULTIPACK_RE.replace_all(&text, "");
    let text = PERCENT_RE.replace_all(&text, "");
    let text = SPECIAL_CHARS_RE.replace_all(&text, " ");
    let text = WHITESPACE_RE.replace_all(&text, " ");

    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Comma-separated list value: each item cleaned, re-joined by spaces.
pub fn clean_categorical(text: &str) -> Option<String> {
    let items: Vec<String> = text.split(',').filter_map(clean_text).collect();
    (!items.is_empty()).then(|| items.join(" "))
}

/// Whitespace tokenizer with stopword and length filtering, plus optional
/// Spanish stemming of the surviving tokens.
pub struct TextTokenizer {
    stopwords: HashSet<String>,
    stemmer: Option<Stemmer>,
    min_token_length: usize,
    max_token_length: usize,
}

impl TextTokenizer {
    pub fn new(config: &TextConfig) -> Self {
        let stopwords = SPANISH_STOPWORDS
            .iter()
            .map(|s| s.to_string())
            .chain(config.domain_stopwords.iter().map(|s| s.to_lowercase()))
            .collect();

        Self {
            stopwords,
            stemmer: config
                .stemming
                .then(|| Stemmer::create(Algorithm::Spanish)),
            min_token_length: config.min_token_length,
            max_token_length: config.max_token_length,
        }
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.split_whitespace()
            .map(str::to_lowercase)
            .filter(|token| {
                let len = token.chars().count();
                len >= self.min_token_length && len <= self.max_token_length
            })
            .filter(|token| !self.stopwords.contains(token))
            .map(|token| match &self.stemmer {
                Some(stemmer) => stemmer.stem(&token).into_owned(),
                None => token,
            })
            .collect()
    }
}

/// Cleans configured text columns in place, optionally adding
/// `<field>_tokenized` columns.
pub struct TextNormalizer {
    config: TextConfig,
    tokenizer: TextTokenizer,
}

impl TextNormalizer {
    pub fn new(config: TextConfig) -> Self {
        let tokenizer = TextTokenizer::new(&config);
        Self { config, tokenizer }
    }

    /// Returns the number of non-empty cleaned values.
    pub fn normalize_all_fields(&self, df: &mut DataFrame) -> Result<usize> {
        let mut cleaned_total = 0;

        for field in &self.config.fields {
            if !has_column(df, field) {
                warn!("Text field '{}' not found, skipping", field);
                continue;
            }
            cleaned_total += self.normalize_field(df, field)?;
        }

        info!(
            "Normalized {} text values across {} fields",
            cleaned_total,
            self.config.fields.len()
        );
        Ok(cleaned_total)
    }

    fn normalize_field(&self, df: &mut DataFrame, field: &str) -> Result<usize> {
        let categorical = self.config.categorical_fields.iter().any(|f| f == field);

        let cleaned: Vec<Option<String>> = str_values(df, field)?
            .into_iter()
            .map(|value| {
                value.and_then(|text| {
                    if categorical {
                        clean_categorical(&text)
                    } else {
                        clean_text(&text)
                    }
                })
            })
            .collect();
        let count = cleaned.iter().flatten().count();

        if self.config.tokenize {
            let tokens = cleaned
                .iter()
                .map(|value| {
                    value
                        .as_deref()
                        .map(|text| self.tokenizer.tokenize(text).join(" "))
                        .filter(|joined| !joined.is_empty())
                })
                .collect();
            set_str(df, &format!("{}_tokenized", field), tokens)?;
        }

        set_str(df, field, cleaned)?;
        Ok(count)
    }
}
