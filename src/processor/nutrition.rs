use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::{debug, warn};

use super::numeric::{clean_numeric_str, clean_numeric_value};
use crate::config::NutritionConfig;
use crate::models::{Nutrient, NutritionFacts, Source};

static COMBINED_KJ_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([\d.,]+)\s*kj").expect("valid kJ regex"));
static COMBINED_KCAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(?([\d.,]+)\s*kcal\)?").expect("valid kcal regex"));

/// Maps a source's nutrition block onto the nine canonical nutrients.
pub struct NutritionStandardizer {
    config: NutritionConfig,
}

impl NutritionStandardizer {
    pub fn new(config: NutritionConfig) -> Self {
        Self { config }
    }

    pub fn standardize(&self, source: Source, raw: &Value) -> NutritionFacts {
        let mut facts = NutritionFacts::default();

        let fields = match raw.as_object() {
            Some(fields) if !fields.is_empty() => fields,
            _ => {
                debug!("No usable nutrition block for {} record", source);
                return facts;
            }
        };

        for (field, nutrient) in self.mapping_for(source, fields) {
            if let Some(value) = fields.get(field) {
                facts.set(*nutrient, clean_numeric_value(value));
            }
        }

        if let Some(Value::String(text)) = fields.get(&self.config.combined_energy_field) {
            let (kj, kcal) = split_combined_energy(text);
            if facts.energy_kj.is_none() {
                facts.energy_kj = kj;
            }
            if facts.energy_kcal.is_none() {
                facts.energy_kcal = kcal;
            }
        }

        if is_zero_placeholder(&facts) {
            warn!(
                "All nutrition values are 0 for {} record, treating block as missing",
                source
            );
            return NutritionFacts::default();
        }

        facts
    }

    fn mapping_for(&self, source: Source, fields: &Map<String, Value>) -> &BTreeMap<String, Nutrient> {
        match source {
            Source::Unknown => {
                let looks_like_alcampo = self
                    .config
                    .alcampo_marker_keys
                    .iter()
                    .any(|key| fields.contains_key(key));
                if looks_like_alcampo {
                    self.config.mapping_for(Source::Alcampo)
                } else {
                    self.config.mapping_for(Source::OpenFoodFacts)
                }
            }
            known => self.config.mapping_for(known),
        }
    }
}

/// Splits "1580 kJ (375 kcal)" into its kJ and kcal parts.
pub fn split_combined_energy(text: &str) -> (Option<f64>, Option<f64>) {
    let text = text.to_lowercase();
    let capture = |re: &Regex| {
        re.captures(&text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| clean_numeric_str(m.as_str()))
    };

    (capture(&COMBINED_KJ_RE), capture(&COMBINED_KCAL_RE))
}

fn is_zero_placeholder(facts: &NutritionFacts) -> bool {
    let mut populated = facts.iter().filter_map(|(_, v)| v).peekable();
    populated.peek().is_some() && populated.all(|v| v == 0.0)
}
