//! Fixed template catalog, in registration order
//!
//! Registration order matters: keyword ties go to the earlier template.

use super::handlers::{
    SealsByStandardName, ShowAllPaintings, ShowAllStandardSeals, ShowCurrentPaintingSeals,
    ShowPaintingSealsByName, SimilarPaintingsByName, SimilarPaintingsBySegment,
    SmartReferenceQuery, StandardSealByCode, StandardSealBySelectedSeal,
};
use super::{Exclusion, QueryTemplate, SelectedItem, SelectionKind};
use crate::nlq::TemplateDescriptor;
use std::sync::Arc;

pub const FIND_SIMILAR_PAINTINGS_BY_SEGMENT: &str = "find_similar_paintings_by_segment";
pub const SHOW_CURRENT_PAINTING_SEALS: &str = "show_current_painting_seals";
pub const FIND_STANDARD_SEAL_BY_SELECTED_SEAL: &str = "find_standard_seal_by_selected_seal";
pub const SHOW_ALL_STANDARD_SEALS: &str = "show_all_standard_seals";
pub const FIND_SIMILAR_PAINTINGS_BY_NAME: &str = "find_similar_paintings_by_name";
pub const SHOW_PAINTING_SEALS_BY_NAME: &str = "show_painting_seals_by_name";
pub const SHOW_ALL_PAINTINGS_BY_AUTHOR: &str = "show_all_paintings_by_author";
pub const SMART_REFERENCE_QUERY: &str = "smart_reference_query";
pub const FIND_STANDARD_SEAL_BY_CODE: &str = "find_standard_seal_by_code";
pub const SHOW_SEALS_BY_STANDARD_SEAL_NAME: &str = "show_seals_by_standard_seal_name";

/// Registered query templates
#[derive(Debug, Clone)]
pub struct TemplateCatalog {
    templates: Vec<QueryTemplate>,
}

impl TemplateCatalog {
    /// The ten built-in templates
    pub fn standard() -> Self {
        let templates = vec![
            QueryTemplate {
                id: FIND_SIMILAR_PAINTINGS_BY_SEGMENT,
                description: "Find paintings whose segments resemble the selected segments",
                relationship: "P-P",
                keywords: &[
                    "相似", "切片", "类似", "比较", "similar", "segment", "resembl", "compare",
                ],
                required_selection: &[SelectionKind::Segment],
                excluded_when: None,
                handler: Arc::new(SimilarPaintingsBySegment),
            },
            QueryTemplate {
                id: SHOW_CURRENT_PAINTING_SEALS,
                description: "Show every seal found on the current painting",
                relationship: "P-S",
                keywords: &[
                    "所有印章", "全部印章", "哪些印章", "钤印", "all seals", "seals on",
                    "which seals", "seal list",
                ],
                required_selection: &[],
                excluded_when: None,
                handler: Arc::new(ShowCurrentPaintingSeals),
            },
            QueryTemplate {
                id: FIND_STANDARD_SEAL_BY_SELECTED_SEAL,
                description: "Find the standard seal matching the selected seal",
                relationship: "S-SS",
                keywords: &[
                    "标准印章", "对应", "比对", "匹配", "standard seal", "matching standard",
                    "corresponding", "authentic",
                ],
                required_selection: &[SelectionKind::Seal],
                excluded_when: Some(Exclusion::UnlessSelected(SelectionKind::Seal)),
                handler: Arc::new(StandardSealBySelectedSeal),
            },
            QueryTemplate {
                id: SHOW_ALL_STANDARD_SEALS,
                description: "List every standard seal of the author",
                relationship: "A-SS",
                keywords: &[
                    "所有标准印章", "全部标准印章", "标准印章", "all standard seals",
                    "standard seals", "every standard seal",
                ],
                required_selection: &[],
                excluded_when: Some(Exclusion::WhenSelected(SelectionKind::Seal)),
                handler: Arc::new(ShowAllStandardSeals),
            },
            QueryTemplate {
                id: FIND_SIMILAR_PAINTINGS_BY_NAME,
                description: "Find the painting most similar to a painting named in the question",
                relationship: "P-P",
                keywords: &[
                    "相似的画", "相似作品", "类似作品", "相似", "similar painting",
                    "similar work", "resembles", "like this painting",
                ],
                required_selection: &[],
                excluded_when: Some(Exclusion::WhenSelected(SelectionKind::Segment)),
                handler: Arc::new(SimilarPaintingsByName),
            },
            QueryTemplate {
                id: SHOW_PAINTING_SEALS_BY_NAME,
                description: "Show the seals of a painting named in the question",
                relationship: "P-S",
                keywords: &[
                    "的印章", "印章", "有哪些", "seals of", "seals does", "its seals",
                ],
                required_selection: &[],
                excluded_when: None,
                handler: Arc::new(ShowPaintingSealsByName),
            },
            QueryTemplate {
                id: SHOW_ALL_PAINTINGS_BY_AUTHOR,
                description: "Show every catalogued painting by the author",
                relationship: "A-P",
                keywords: &[
                    "所有作品", "全部作品", "所有画作", "作品列表", "all paintings",
                    "all works", "every painting", "paintings by",
                ],
                required_selection: &[],
                excluded_when: None,
                handler: Arc::new(ShowAllPaintings),
            },
            QueryTemplate {
                id: SMART_REFERENCE_QUERY,
                description: "Find literature citations relevant to the paintings in the graph",
                relationship: "P-R",
                keywords: &[
                    "文献", "著录", "记载", "参考", "出处", "reference", "literature",
                    "citation", "recorded in", "catalogue",
                ],
                required_selection: &[],
                excluded_when: None,
                handler: Arc::new(SmartReferenceQuery),
            },
            QueryTemplate {
                id: FIND_STANDARD_SEAL_BY_CODE,
                description: "Find the standard seal for a seal code named in the question",
                relationship: "S-SS",
                keywords: &[
                    "印章编号", "编号", "号印章", "seal code", "seal number", "seal #",
                    "code",
                ],
                required_selection: &[],
                excluded_when: None,
                handler: Arc::new(StandardSealByCode),
            },
            QueryTemplate {
                id: SHOW_SEALS_BY_STANDARD_SEAL_NAME,
                description: "Show every observed seal matching a standard seal named in the question",
                relationship: "SS-S",
                keywords: &[
                    "使用了", "用过", "哪些画", "盖了", "which paintings", "used on",
                    "stamped with", "bear",
                ],
                required_selection: &[],
                excluded_when: None,
                handler: Arc::new(SealsByStandardName),
            },
        ];
        TemplateCatalog { templates }
    }

    pub fn templates(&self) -> &[QueryTemplate] {
        &self.templates
    }

    pub fn get(&self, id: &str) -> Option<&QueryTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Templates not excluded by the current selection, in registration order
    pub fn applicable(&self, selection: &[SelectedItem]) -> Vec<&QueryTemplate> {
        self.templates
            .iter()
            .filter(|t| t.is_applicable(selection))
            .collect()
    }

    pub fn descriptors(&self) -> Vec<TemplateDescriptor> {
        self.templates.iter().map(QueryTemplate::descriptor).collect()
    }
}

/// Deterministic fallback: most keyword hits wins, ties go to the first
/// candidate, zero hits means no template
pub fn keyword_match<'a>(
    question: &str,
    candidates: &[&'a QueryTemplate],
) -> Option<(&'a QueryTemplate, usize)> {
    let mut best: Option<(&'a QueryTemplate, usize)> = None;
    for template in candidates {
        let score = template.keyword_score(question);
        if score > 0 && best.map_or(true, |(_, top)| score > top) {
            best = Some((*template, score));
        }
    }
    best
}
