//! Scored rubric values.

use super::schema::{Orientation, RubricSchema};
use crate::error::{Result, SpeakeasyError};
use crate::metrics::round_hundredths;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Scores for one category, in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryScores {
    pub name: &'static str,
    pub metrics: Vec<(&'static str, f64)>,
}

/// Graded rubric. Every value is in `[0, 1]` and higher is better.
///
/// Instances only come from a [`RubricSchema`], so the key set always matches
/// the schema exactly. Serializes as a nested JSON object in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct RubricScoreSet {
    categories: Vec<CategoryScores>,
}

impl RubricScoreSet {
    /// Every declared metric at 0.0.
    pub fn zeroed(schema: &RubricSchema) -> Self {
        Self {
            categories: schema
                .categories
                .iter()
                .map(|c| CategoryScores {
                    name: c.name,
                    metrics: c.metrics.iter().map(|m| (m.name, 0.0)).collect(),
                })
                .collect(),
        }
    }

    /// Convert a raw backend payload into scores.
    ///
    /// Numeric values are clamped to `[0, 1]`, lower-is-better metrics are
    /// inverted, and results rounded to hundredths. Absent or non-numeric
    /// metrics score 0.0 without inversion. Keys the schema does not declare
    /// are ignored. Fails when the payload or a present category is not an
    /// object.
    pub fn from_raw(schema: &RubricSchema, raw: &serde_json::Value) -> Result<Self> {
        let object = raw.as_object().ok_or_else(|| {
            SpeakeasyError::malformed("rubric response is not a JSON object", raw.to_string())
        })?;

        let mut categories = Vec::with_capacity(schema.categories.len());
        for category in schema.categories {
            let values = match object.get(category.name) {
                None => None,
                Some(serde_json::Value::Object(values)) => Some(values),
                Some(_) => {
                    return Err(SpeakeasyError::malformed(
                        format!("rubric category '{}' is not an object", category.name),
                        raw.to_string(),
                    ))
                }
            };

            let metrics = category
                .metrics
                .iter()
                .map(|metric| {
                    let score = values
                        .and_then(|v| v.get(metric.name))
                        .and_then(|v| v.as_f64())
                        .map(|value| score_raw(value, metric.orientation))
                        .unwrap_or(0.0);
                    (metric.name, score)
                })
                .collect();

            categories.push(CategoryScores {
                name: category.name,
                metrics,
            });
        }

        Ok(Self { categories })
    }

    pub fn categories(&self) -> &[CategoryScores] {
        &self.categories
    }

    pub fn get(&self, category: &str, metric: &str) -> Option<f64> {
        self.categories
            .iter()
            .find(|c| c.name == category)?
            .metrics
            .iter()
            .find(|(name, _)| *name == metric)
            .map(|(_, score)| *score)
    }

    /// All scores, category by category.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.categories
            .iter()
            .flat_map(|c| c.metrics.iter().map(|(_, score)| *score))
    }

    /// Mean of all scores, rounded to hundredths; 0.0 for an empty set.
    pub fn mean(&self) -> f64 {
        let (sum, count) = self.values().fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
        if count == 0 {
            0.0
        } else {
            round_hundredths(sum / count as f64)
        }
    }

    /// Pretty JSON for embedding in prompts.
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

fn score_raw(value: f64, orientation: Orientation) -> f64 {
    let clamped = if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 };
    let oriented = match orientation {
        Orientation::HigherIsBetter => clamped,
        Orientation::LowerIsBetter => 1.0 - clamped,
    };
    round_hundredths(oriented)
}

struct MetricMap<'a>(&'a [(&'static str, f64)]);

impl Serialize for MetricMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, score) in self.0 {
            map.serialize_entry(name, score)?;
        }
        map.end()
    }
}

impl Serialize for RubricScoreSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.categories.len()))?;
        for category in &self.categories {
            map.serialize_entry(category.name, &MetricMap(&category.metrics))?;
        }
        map.end()
    }
}
