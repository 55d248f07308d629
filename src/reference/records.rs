//! Dataset records
//!
//! Field aliases accept the key names used by the catalogued dataset files.

use crate::graph::{properties_from_json, PropertyMap, PropertyValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Id of the author node when the dataset does not name one
pub const DEFAULT_AUTHOR_ID: &str = "AUTHOR_SHITAO";

/// A catalogued painting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaintingRecord {
    #[serde(alias = "编号", alias = "painting_code")]
    pub id: String,

    #[serde(default, alias = "作品名", alias = "painting_name")]
    pub name: String,

    #[serde(default, alias = "作者名")]
    pub author: Option<String>,

    #[serde(default, alias = "创作时间", alias = "creation_time")]
    pub created: Option<String>,

    #[serde(default, alias = "用色")]
    pub color: Option<String>,

    #[serde(default, alias = "尺寸")]
    pub size: Option<String>,

    #[serde(default, alias = "图像url")]
    pub image_url: Option<String>,

    /// Any other catalogue columns
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PaintingRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        PaintingRecord {
            id: id.into(),
            name: name.into(),
            author: None,
            created: None,
            color: None,
            size: None,
            image_url: None,
            extra: serde_json::Map::new(),
        }
    }

    /// Name for display, falling back to the id
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    /// Node attributes for this painting
    pub fn to_properties(&self) -> PropertyMap {
        let mut props = properties_from_json(&self.extra);
        let fields = [
            ("author", &self.author),
            ("created", &self.created),
            ("color", &self.color),
            ("size", &self.size),
            ("image_url", &self.image_url),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                props.insert(key.to_string(), PropertyValue::from(value.as_str()));
            }
        }
        props
    }
}

/// A seal impression observed on a painting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SealRecord {
    #[serde(alias = "seal_code")]
    pub code: String,

    #[serde(default)]
    pub painting_id: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default, alias = "seal_image")]
    pub image: Option<String>,

    #[serde(default)]
    pub owner: Option<String>,
}

impl SealRecord {
    pub fn new(code: impl Into<String>, painting_id: impl Into<String>) -> Self {
        SealRecord {
            code: code.into(),
            painting_id: Some(painting_id.into()),
            name: None,
            image: None,
            owner: None,
        }
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn to_properties(&self) -> PropertyMap {
        let mut props = PropertyMap::new();
        if let Some(name) = &self.name {
            props.insert("name".to_string(), name.as_str().into());
        }
        if let Some(image) = &self.image {
            props.insert("image".to_string(), image.as_str().into());
        }
        if let Some(owner) = &self.owner {
            props.insert("owner".to_string(), owner.as_str().into());
        }
        if let Some(painting) = &self.painting_id {
            props.insert("painting_id".to_string(), painting.as_str().into());
        }
        props
    }
}

/// An authenticated reference seal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardSealRecord {
    #[serde(alias = "seal_code")]
    pub code: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, alias = "standard_image")]
    pub image: String,

    #[serde(default)]
    pub owner: Option<String>,
}

impl StandardSealRecord {
    pub fn new(code: impl Into<String>, name: impl Into<String>, image: impl Into<String>) -> Self {
        StandardSealRecord {
            code: code.into(),
            name: name.into(),
            image: image.into(),
            owner: None,
        }
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.code
        } else {
            &self.name
        }
    }

    pub fn to_properties(&self) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert("image".to_string(), self.image.as_str().into());
        if let Some(owner) = &self.owner {
            props.insert("owner".to_string(), owner.as_str().into());
        }
        props
    }
}

/// Link between an observed seal and the standard seal it matches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SealMapping {
    pub seal_code: String,

    #[serde(default)]
    pub seal_image: Option<String>,

    #[serde(default)]
    pub standard_image: Option<String>,

    #[serde(default)]
    pub has_reference: bool,

    #[serde(default)]
    pub similarity: Option<f64>,
}

/// A literature citation attached to a painting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRecord {
    #[serde(alias = "reference_id")]
    pub id: String,

    #[serde(default)]
    pub name: String,

    /// Citation info (title, volume...)
    #[serde(default)]
    pub info: String,

    /// Excerpt of the cited text
    #[serde(default, alias = "text_record")]
    pub text: String,
}

impl ReferenceRecord {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        info: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        ReferenceRecord {
            id: id.into(),
            name: name.into(),
            info: info.into(),
            text: text.into(),
        }
    }

    /// Citation snippet carried by reference edges
    pub fn citation(&self) -> BTreeMap<String, String> {
        let mut citation = BTreeMap::new();
        citation.insert(self.info.clone(), self.text.clone());
        citation
    }

    pub fn to_properties(&self) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert("info".to_string(), self.info.as_str().into());
        props.insert("text".to_string(), self.text.as_str().into());
        props
    }
}

/// The painter every session is anchored on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorRecord {
    #[serde(default = "default_author_id")]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_author_id() -> String {
    DEFAULT_AUTHOR_ID.to_string()
}

impl Default for AuthorRecord {
    fn default() -> Self {
        AuthorRecord {
            id: default_author_id(),
            name: "Shitao".to_string(),
            extra: serde_json::Map::new(),
        }
    }
}

impl AuthorRecord {
    pub fn to_properties(&self) -> PropertyMap {
        properties_from_json(&self.extra)
    }
}

/// source image id -> segment path -> target painting id -> target segment path -> score
pub type SegmentSimilarityTable =
    BTreeMap<String, BTreeMap<String, BTreeMap<String, BTreeMap<String, f64>>>>;

/// Everything a `ReferenceStore` is built from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceData {
    #[serde(default)]
    pub paintings: Vec<PaintingRecord>,
    #[serde(default)]
    pub seals: Vec<SealRecord>,
    #[serde(default)]
    pub standard_seals: Vec<StandardSealRecord>,
    #[serde(default)]
    pub seal_mapping: Vec<SealMapping>,
    #[serde(default)]
    pub segment_similarity: SegmentSimilarityTable,
    /// base painting id -> citations
    #[serde(default)]
    pub painting_references: BTreeMap<String, Vec<ReferenceRecord>>,
    #[serde(default)]
    pub author: AuthorRecord,
}

impl ReferenceData {
    /// Record one segment match in the similarity table
    pub fn add_segment_similarity(
        &mut self,
        source_image: &str,
        segment: &str,
        target_painting: &str,
        target_segment: &str,
        score: f64,
    ) {
        self.segment_similarity
            .entry(source_image.to_string())
            .or_default()
            .entry(segment.to_string())
            .or_default()
            .entry(target_painting.to_string())
            .or_default()
            .insert(target_segment.to_string(), score);
    }
}
