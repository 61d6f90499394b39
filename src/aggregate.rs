//! Risk aggregation: prefix deduplication, grouping by terminal, noisy-OR scoring.

use crate::model::{Origin, Path, RelationKind};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Lower bound of the `high` confidence level.
pub const HIGH_CONFIDENCE: f64 = 0.5;
/// Lower bound of the `medium` confidence level.
pub const MEDIUM_CONFIDENCE: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

/// Score interval of a chain: strongest single path .. combined evidence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfidenceBand {
    pub lower: f64,
    pub upper: f64,
    pub level: ConfidenceLevel,
}

impl ConfidenceBand {
    fn new(lower: f64, upper: f64) -> Self {
        let level = if lower >= HIGH_CONFIDENCE {
            ConfidenceLevel::High
        } else if lower >= MEDIUM_CONFIDENCE {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        };
        Self { lower, upper, level }
    }
}

/// What drove a chain's score.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContributingFactor {
    Relation {
        kind: RelationKind,
        occurrences: usize,
        mean_weight: f64,
    },
    Similarity {
        occurrences: usize,
        mean_similarity: f64,
    },
}

/// Ranked, explainable group of paths ending at one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskChain {
    pub rank: usize,
    pub terminal: String,
    pub aggregate_score: f64,
    /// Entity ids of the strongest contributing path.
    pub entity_path: Vec<String>,
    pub factors: Vec<ContributingFactor>,
    pub confidence: ConfidenceBand,
    /// Maximal paths ending at `terminal`, best first.
    pub paths: Vec<Path>,
    /// Shorter prefixes that outscore a contributing path.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<Path>,
}

/// Probabilistic OR: `1 - prod(1 - p)`.
pub fn aggregate_score<I>(scores: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let miss: f64 = scores
        .into_iter()
        .map(|p| 1.0 - p.clamp(0.0, 1.0))
        .product();
    1.0 - miss
}

fn contributing_factors(paths: &[Path]) -> Vec<ContributingFactor> {
    let mut relations: BTreeMap<RelationKind, (usize, f64)> = BTreeMap::new();
    let mut similarity = (0usize, 0.0f64);

    for step in paths.iter().flat_map(|p| p.steps.iter()) {
        if let Some(rel) = &step.relation {
            let entry = relations.entry(rel.kind).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += rel.weight;
        }
        if matches!(step.origin, Origin::Vector | Origin::Both) {
            similarity.0 += 1;
            similarity.1 += step.similarity;
        }
    }

    let mut factors: Vec<ContributingFactor> = relations
        .into_iter()
        .map(|(kind, (n, total))| ContributingFactor::Relation {
            kind,
            occurrences: n,
            mean_weight: total / n as f64,
        })
        .collect();
    if similarity.0 > 0 {
        factors.push(ContributingFactor::Similarity {
            occurrences: similarity.0,
            mean_similarity: similarity.1 / similarity.0 as f64,
        });
    }
    factors
}

/// Collapse reasoner paths into ranked risk chains.
///
/// A path that is a proper prefix of another path does not contribute to a
/// chain; when it scores strictly higher than an extension it is attached to
/// that extension's chain as an alternative. Chains rank by aggregate score
/// descending, ties by terminal id ascending.
pub fn aggregate(paths: &[Path]) -> Vec<RiskChain> {
    let sequences: Vec<Vec<&str>> = paths.iter().map(|p| p.entity_ids().collect()).collect();

    // proper prefix -> indexes of the paths extending it
    let mut extenders: HashMap<&[&str], Vec<usize>> = HashMap::new();
    for (idx, seq) in sequences.iter().enumerate() {
        for len in 2..seq.len() {
            extenders.entry(&seq[..len]).or_default().push(idx);
        }
    }

    let is_maximal = |idx: usize| !extenders.contains_key(sequences[idx].as_slice());

    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    let mut alternatives: HashMap<usize, Vec<usize>> = HashMap::new();
    for (idx, path) in paths.iter().enumerate() {
        if path.hops() == 0 {
            continue;
        }
        if is_maximal(idx) {
            groups.entry(path.terminal()).or_default().push(idx);
            continue;
        }
        for &ext in &extenders[sequences[idx].as_slice()] {
            if is_maximal(ext) && path.score > paths[ext].score {
                alternatives.entry(ext).or_default().push(idx);
            }
        }
    }

    let mut chains: Vec<RiskChain> = groups
        .into_iter()
        .map(|(terminal, members)| {
            let mut chain_paths: Vec<Path> = members.iter().map(|&i| paths[i].clone()).collect();
            chain_paths.sort_by(|a, b| a.rank_cmp(b));

            let mut seen = HashSet::new();
            let mut alts: Vec<Path> = members
                .iter()
                .filter_map(|i| alternatives.get(i))
                .flatten()
                .filter(|&&alt| seen.insert(alt))
                .map(|&alt| paths[alt].clone())
                .collect();
            alts.sort_by(|a, b| a.rank_cmp(b));

            let aggregate = aggregate_score(chain_paths.iter().map(|p| p.score));
            let best = chain_paths.first().map(|p| p.score).unwrap_or(0.0);
            RiskChain {
                rank: 0,
                terminal: terminal.to_string(),
                aggregate_score: aggregate,
                entity_path: chain_paths
                    .first()
                    .map(|p| p.entity_ids().map(str::to_string).collect())
                    .unwrap_or_default(),
                factors: contributing_factors(&chain_paths),
                confidence: ConfidenceBand::new(best, aggregate),
                paths: chain_paths,
                alternatives: alts,
            }
        })
        .collect();

    chains.sort_by(|a, b| {
        b.aggregate_score
            .total_cmp(&a.aggregate_score)
            .then_with(|| a.terminal.cmp(&b.terminal))
    });
    for (idx, chain) in chains.iter_mut().enumerate() {
        chain.rank = idx + 1;
    }
    chains
}
