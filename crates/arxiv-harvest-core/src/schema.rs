//! Field-to-storage mapping for [`PaperRecord`].
//!
//! The record type carries no persistence annotations. Store adapters
//! consult [`RECORD_FIELDS`] to learn each field's storage key, its
//! storage kind, whether it feeds the keyword index, and which
//! text-search role (if any) it plays in a [`SearchHit`].
//!
//! | Field | Key | Kind | Full-text | Search role |
//! |-------|-----|------|-----------|-------------|
//! | id | `id` | key | | name |
//! | title | `title` | text | yes | |
//! | abstract | `abstract` | text | yes | value |
//! | published | `published` | timestamp | | |
//! | authors | `authors` | text list | | |
//! | categories | `categories` | text list | | |
//! | link | `link` | text | | link |
//! | pdf link | `pdf_link` | optional text | | |
//! | embedding | `embedding` | vector | | |

use crate::models::{PaperRecord, SearchHit};

/// Addressable fields of a [`PaperRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordField {
    Id,
    Title,
    Abstract,
    Published,
    Authors,
    Categories,
    Link,
    PdfLink,
    Embedding,
}

/// How a field is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    /// Unique record key (upsert target).
    Key,
    Text,
    OptionalText,
    /// Unix seconds.
    Timestamp,
    /// Ordered list of strings, stored as one JSON array.
    TextList,
    /// Fixed-length `f32` vector; absent until enrichment.
    Vector,
}

/// Role a field plays in a text-search result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchRole {
    Name,
    Value,
    Link,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldMapping {
    pub field: RecordField,
    pub storage_key: &'static str,
    pub kind: StorageKind,
    pub full_text: bool,
    pub search_role: Option<SearchRole>,
}

const fn map(
    field: RecordField,
    storage_key: &'static str,
    kind: StorageKind,
    full_text: bool,
    search_role: Option<SearchRole>,
) -> FieldMapping {
    FieldMapping {
        field,
        storage_key,
        kind,
        full_text,
        search_role,
    }
}

/// The single source of truth for record persistence, in column order.
pub const RECORD_FIELDS: &[FieldMapping] = &[
    map(RecordField::Id, "id", StorageKind::Key, false, Some(SearchRole::Name)),
    map(RecordField::Title, "title", StorageKind::Text, true, None),
    map(
        RecordField::Abstract,
        "abstract",
        StorageKind::Text,
        true,
        Some(SearchRole::Value),
    ),
    map(RecordField::Published, "published", StorageKind::Timestamp, false, None),
    map(RecordField::Authors, "authors", StorageKind::TextList, false, None),
    map(RecordField::Categories, "categories", StorageKind::TextList, false, None),
    map(RecordField::Link, "link", StorageKind::Text, false, Some(SearchRole::Link)),
    map(RecordField::PdfLink, "pdf_link", StorageKind::OptionalText, false, None),
    map(RecordField::Embedding, "embedding", StorageKind::Vector, false, None),
];

/// Look up the mapping for a field.
pub fn mapping(field: RecordField) -> &'static FieldMapping {
    RECORD_FIELDS
        .iter()
        .find(|m| m.field == field)
        .unwrap_or_else(|| unreachable!("every RecordField has a mapping"))
}

/// The key field's mapping.
pub fn key_mapping() -> &'static FieldMapping {
    RECORD_FIELDS
        .iter()
        .find(|m| m.kind == StorageKind::Key)
        .unwrap_or_else(|| unreachable!("RECORD_FIELDS declares a key"))
}

/// Storage keys of fields that feed the keyword index, in column order.
pub fn full_text_keys() -> Vec<&'static str> {
    RECORD_FIELDS
        .iter()
        .filter(|m| m.full_text)
        .map(|m| m.storage_key)
        .collect()
}

/// A borrowed view of one field's value, typed by its storage kind.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    OptionalText(Option<&'a str>),
    Timestamp(i64),
    TextList(Vec<&'a str>),
    Vector(Option<&'a [f32]>),
}

impl FieldValue<'_> {
    /// The value as plain text, for text-like kinds.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::OptionalText(s) => *s,
            _ => None,
        }
    }
}

impl PaperRecord {
    /// Read a field through the mapping's typed view.
    pub fn field_value(&self, field: RecordField) -> FieldValue<'_> {
        match field {
            RecordField::Id => FieldValue::Text(&self.id),
            RecordField::Title => FieldValue::Text(&self.title),
            RecordField::Abstract => FieldValue::Text(&self.abstract_text),
            RecordField::Published => FieldValue::Timestamp(self.published_at.timestamp()),
            RecordField::Authors => {
                FieldValue::TextList(self.authors.iter().map(String::as_str).collect())
            }
            RecordField::Categories => {
                FieldValue::TextList(self.categories.iter().map(String::as_str).collect())
            }
            RecordField::Link => FieldValue::Text(&self.link),
            RecordField::PdfLink => FieldValue::OptionalText(self.pdf_link.as_deref()),
            RecordField::Embedding => FieldValue::Vector(self.embedding.as_deref()),
        }
    }

    fn role_text(&self, role: SearchRole) -> String {
        RECORD_FIELDS
            .iter()
            .find(|m| m.search_role == Some(role))
            .and_then(|m| self.field_value(m.field).as_text().map(str::to_string))
            .unwrap_or_default()
    }
}

impl SearchHit {
    /// Project a stored record into a search result using its search roles.
    pub fn from_record(record: &PaperRecord, score: f64) -> Self {
        Self {
            name: record.role_text(SearchRole::Name),
            value: record.role_text(SearchRole::Value),
            link: record.role_text(SearchRole::Link),
            title: record.title.clone(),
            score,
        }
    }
}
