//! Cross-paper gap aggregation and direction synthesis
//!
//! Two gaps are equivalent when they share a gap type and their normalized
//! descriptions are identical or have a token Jaccard similarity at or above
//! the configured threshold. Groups are formed greedily in contribution
//! order (unit index, then gap index), each candidate being compared with
//! the first member of every existing group. The output depends only on
//! the units and their order, never on when each analysis completed.

use std::collections::{BTreeSet, HashSet};

use crate::model::{CommonGap, GapType, ResearchGap, TopicAnalysisUnit};

/// Groups equivalent gaps across analyzed papers
#[derive(Debug, Clone, Copy)]
pub struct GapAggregator {
    similarity_threshold: f64,
}

struct GapGroup<'a> {
    representative: &'a ResearchGap,
    key: String,
    tokens: HashSet<String>,
    units: BTreeSet<usize>,
    confidences: Vec<f64>,
    potential_impact: &'a str,
}

impl GapGroup<'_> {
    fn mean_confidence(&self) -> f64 {
        if self.confidences.is_empty() {
            return 0.0;
        }
        self.confidences.iter().sum::<f64>() / self.confidences.len() as f64
    }
}

impl GapAggregator {
    pub fn new(similarity_threshold: f64) -> Self {
        Self {
            similarity_threshold: similarity_threshold.clamp(0.0, 1.0),
        }
    }

    /// Aggregate gaps into common gaps and synthesize future directions
    ///
    /// Common gaps are ordered by support count descending, then mean
    /// confidence descending, then first contribution.
    pub fn aggregate(&self, units: &[TopicAnalysisUnit]) -> (Vec<CommonGap>, Vec<String>) {
        let mut groups: Vec<GapGroup<'_>> = Vec::new();

        for (unit_index, unit) in units.iter().enumerate() {
            for gap in &unit.gaps {
                let key = normalize_text(&gap.gap_description);
                let tokens = tokenize(&key);

                let group_index = groups.iter().position(|group| {
                    self.equivalent(gap.gap_type, &key, &tokens, group)
                });

                match group_index {
                    Some(idx) => {
                        let group = &mut groups[idx];
                        group.units.insert(unit_index);
                        group.confidences.push(gap.confidence_score);
                        if group.potential_impact.is_empty() {
                            group.potential_impact = &gap.potential_impact;
                        }
                    }
                    None => groups.push(GapGroup {
                        representative: gap,
                        key,
                        tokens,
                        units: BTreeSet::from([unit_index]),
                        confidences: vec![gap.confidence_score],
                        potential_impact: &gap.potential_impact,
                    }),
                }
            }
        }

        // Stable sort keeps creation order for full ties
        groups.sort_by(|a, b| {
            b.units
                .len()
                .cmp(&a.units.len())
                .then_with(|| b.mean_confidence().total_cmp(&a.mean_confidence()))
        });

        let common_gaps = groups
            .iter()
            .map(|group| CommonGap {
                gap_description: group.representative.gap_description.clone(),
                confidence_score: group.mean_confidence().clamp(0.0, 1.0),
                gap_type: group.representative.gap_type,
                potential_impact: group.potential_impact.to_string(),
                support_count: group.units.len(),
            })
            .collect();

        (common_gaps, synthesize_directions(units))
    }

    fn equivalent(
        &self,
        gap_type: GapType,
        key: &str,
        tokens: &HashSet<String>,
        group: &GapGroup<'_>,
    ) -> bool {
        if gap_type != group.representative.gap_type {
            return false;
        }
        if key == group.key {
            return true;
        }
        jaccard(tokens, &group.tokens) >= self.similarity_threshold
    }
}

/// Concatenate future directions across units, dropping duplicates and
/// keeping first-seen order
pub fn synthesize_directions(units: &[TopicAnalysisUnit]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut directions = Vec::new();

    for direction in units.iter().flat_map(|unit| &unit.future_directions) {
        let trimmed = direction.trim();
        if trimmed.is_empty() {
            continue;
        }
        let key = normalize_text(trimmed);
        let key = if key.is_empty() {
            trimmed.to_lowercase()
        } else {
            key
        };
        if seen.insert(key) {
            directions.push(trimmed.to_string());
        }
    }

    directions
}

/// Lowercase alphanumeric words joined by single spaces
fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn tokenize(normalized: &str) -> HashSet<String> {
    normalized.split_whitespace().map(str::to_string).collect()
}

/// Intersection over union of two token sets
fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}
