//! Read-only lookups over the reference dataset
//!
//! Missing lookups return empty collections or `None`, never errors.

use super::records::{
    AuthorRecord, PaintingRecord, ReferenceData, ReferenceRecord, SealMapping, SealRecord,
    SegmentSimilarityTable, StandardSealRecord,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Inclusive score window for segment matches
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityRange {
    pub min: f64,
    pub max: f64,
}

impl SimilarityRange {
    pub fn new(min: f64, max: f64) -> Self {
        SimilarityRange { min, max }
    }

    /// Both bounds finite and ordered
    pub fn is_well_formed(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }

    pub fn contains(&self, score: f64) -> bool {
        score >= self.min && score <= self.max
    }
}

impl Default for SimilarityRange {
    fn default() -> Self {
        SimilarityRange { min: 0.8, max: 1.0 }
    }
}

/// One cross-painting segment match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentMatch {
    /// Image the query segment belongs to (may be a sub-image id)
    pub source_image: String,
    pub source_segment: String,
    /// Matched painting id as recorded in the table (may be a sub-image id)
    pub painting_id: String,
    pub segment_path: String,
    pub score: f64,
}

/// Standard seal matched by an observed seal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardSealMatch {
    pub seal_code: String,
    pub seal_image: Option<String>,
    pub standard: StandardSealRecord,
    /// Score recorded in the mapping, 0.0 when absent
    pub score: f64,
}

/// Strip a sub-image suffix: `D001430_1` and `D001430-1` become `D001430`
pub fn base_painting_id(id: &str) -> &str {
    id.split(|c| c == '_' || c == '-').next().unwrap_or(id)
}

fn same_base(a: &str, b: &str) -> bool {
    base_painting_id(a) == base_painting_id(b)
}

/// Immutable reference dataset, loaded once per process
#[derive(Debug, Clone, Default)]
pub struct ReferenceStore {
    paintings: IndexMap<String, PaintingRecord>,
    seals: IndexMap<String, SealRecord>,
    standard_seals: IndexMap<String, StandardSealRecord>,
    seal_mapping: IndexMap<String, SealMapping>,
    segment_similarity: SegmentSimilarityTable,
    painting_references: BTreeMap<String, Vec<ReferenceRecord>>,
    author: AuthorRecord,
}

impl ReferenceStore {
    /// Build a store from in-memory data
    pub fn from_data(data: ReferenceData) -> Self {
        ReferenceStore {
            paintings: data
                .paintings
                .into_iter()
                .map(|p| (p.id.clone(), p))
                .collect(),
            seals: data.seals.into_iter().map(|s| (s.code.clone(), s)).collect(),
            standard_seals: data
                .standard_seals
                .into_iter()
                .map(|s| (s.code.clone(), s))
                .collect(),
            seal_mapping: data
                .seal_mapping
                .into_iter()
                .map(|m| (m.seal_code.clone(), m))
                .collect(),
            segment_similarity: data.segment_similarity,
            painting_references: data.painting_references,
            author: data.author,
        }
    }

    pub fn author_record(&self) -> &AuthorRecord {
        &self.author
    }

    pub fn all_paintings(&self) -> Vec<PaintingRecord> {
        self.paintings.values().cloned().collect()
    }

    pub fn all_standard_seals(&self) -> Vec<StandardSealRecord> {
        self.standard_seals.values().cloned().collect()
    }

    /// Painting by id; sub-image ids resolve to their base painting
    pub fn painting(&self, id: &str) -> Option<&PaintingRecord> {
        self.paintings
            .get(id)
            .or_else(|| self.paintings.get(base_painting_id(id)))
    }

    /// First painting whose name occurs in `text`
    pub fn painting_by_name(&self, text: &str) -> Option<&PaintingRecord> {
        self.paintings
            .values()
            .find(|p| !p.name.is_empty() && text.contains(&p.name))
    }

    pub fn seal(&self, code: &str) -> Option<&SealRecord> {
        self.seals.get(code)
    }

    pub fn standard_seal(&self, code: &str) -> Option<&StandardSealRecord> {
        self.standard_seals.get(code)
    }

    /// Seals observed on the painting or any of its sub-images
    pub fn painting_seals(&self, painting_id: &str) -> Vec<SealRecord> {
        self.seals
            .values()
            .filter(|s| {
                s.painting_id
                    .as_deref()
                    .is_some_and(|p| same_base(p, painting_id))
            })
            .cloned()
            .collect()
    }

    /// Standard seal an observed seal maps to, if the mapping has a reference
    pub fn standard_seal_for(&self, seal_code: &str) -> Option<StandardSealMatch> {
        let mapping = self.seal_mapping.get(seal_code)?;
        if !mapping.has_reference {
            return None;
        }
        let image = mapping.standard_image.as_deref()?;
        let standard = self.standard_seals.values().find(|s| s.image == image)?;

        Some(StandardSealMatch {
            seal_code: seal_code.to_string(),
            seal_image: mapping
                .seal_image
                .clone()
                .or_else(|| self.seals.get(seal_code).and_then(|s| s.image.clone())),
            standard: standard.clone(),
            score: mapping.similarity.unwrap_or(0.0),
        })
    }

    /// Every observed seal mapped onto the given standard seal
    pub fn seals_for_standard(&self, standard_code: &str) -> Vec<StandardSealMatch> {
        let Some(standard) = self.standard_seals.get(standard_code) else {
            return Vec::new();
        };
        self.seal_mapping
            .values()
            .filter(|m| m.has_reference && m.standard_image.as_deref() == Some(standard.image.as_str()))
            .map(|m| StandardSealMatch {
                seal_code: m.seal_code.clone(),
                seal_image: m
                    .seal_image
                    .clone()
                    .or_else(|| self.seals.get(&m.seal_code).and_then(|s| s.image.clone())),
                standard: standard.clone(),
                score: m.similarity.unwrap_or(0.0),
            })
            .collect()
    }

    /// Cross-painting matches for one segment, score within `range`, best first
    ///
    /// `image_id` is looked up as given; when it is not in the table, every
    /// sub-image of the same painting that carries the segment is searched.
    pub fn segment_similarities(
        &self,
        image_id: &str,
        segment_path: &str,
        range: SimilarityRange,
    ) -> Vec<SegmentMatch> {
        let sources: Vec<&String> = match self.segment_similarity.get_key_value(image_id) {
            Some((key, _)) => vec![key],
            None => self.related_images(image_id),
        };

        let mut matches = Vec::new();
        for source in sources {
            let Some(targets) = self
                .segment_similarity
                .get(source)
                .and_then(|segments| segments.get(segment_path))
            else {
                continue;
            };
            for (painting_id, segments) in targets {
                if same_base(painting_id, source) {
                    continue;
                }
                for (target_segment, score) in segments {
                    if range.contains(*score) {
                        matches.push(SegmentMatch {
                            source_image: source.clone(),
                            source_segment: segment_path.to_string(),
                            painting_id: painting_id.clone(),
                            segment_path: target_segment.clone(),
                            score: *score,
                        });
                    }
                }
            }
        }

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches
    }

    /// Highest scoring cross-painting match over every segment of the painting
    pub fn best_segment_match(&self, painting_id: &str) -> Option<SegmentMatch> {
        let mut best: Option<SegmentMatch> = None;
        for source in self.related_images(painting_id) {
            let Some(segments) = self.segment_similarity.get(source) else {
                continue;
            };
            for (segment_path, targets) in segments {
                for (target_id, target_segments) in targets {
                    if same_base(target_id, source) {
                        continue;
                    }
                    for (target_segment, score) in target_segments {
                        if best.as_ref().map_or(true, |b| *score > b.score) {
                            best = Some(SegmentMatch {
                                source_image: source.clone(),
                                source_segment: segment_path.clone(),
                                painting_id: target_id.clone(),
                                segment_path: target_segment.clone(),
                                score: *score,
                            });
                        }
                    }
                }
            }
        }
        best
    }

    /// Table keys belonging to the painting: its base id and every sub-image
    fn related_images(&self, painting_id: &str) -> Vec<&String> {
        let base = base_painting_id(painting_id);
        self.segment_similarity
            .keys()
            .filter(|k| base_painting_id(k) == base)
            .collect()
    }

    /// Literature citations for the painting
    pub fn painting_references(&self, painting_id: &str) -> Vec<ReferenceRecord> {
        self.painting_references
            .get(base_painting_id(painting_id))
            .cloned()
            .unwrap_or_default()
    }

    pub fn painting_count(&self) -> usize {
        self.paintings.len()
    }

    pub fn seal_count(&self) -> usize {
        self.seals.len()
    }

    pub fn standard_seal_count(&self) -> usize {
        self.standard_seals.len()
    }
}
