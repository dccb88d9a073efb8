//! Normalized listing records.
//!
//! An [`ObjectData`] is the flat, comparable form of one OpenImmo listing:
//! a fixed-schema property bag, the contact person and the attachment
//! classification. Records are produced per archive run and consumed
//! immediately by the synchronizer.

use rusqlite::ToSql;
use rusqlite::types::{ToSqlOutput, ValueRef};
use serde::Serialize;
use std::collections::BTreeMap;

/// A column value as written to and read from the listing store.
///
/// Floats and booleans never appear: booleans are encoded as `"1"` / `""`
/// and decimals keep their textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Text(String),
}

impl Value {
    /// Presence marker encoding of a boolean.
    #[must_use]
    pub fn flag(state: bool) -> Self {
        Self::Text(if state { "1" } else { "" }.to_string())
    }

    /// Read a value back from the store.
    #[must_use]
    pub fn from_sql(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Self::Null,
            ValueRef::Integer(i) => Self::Integer(i),
            ValueRef::Real(f) => Self::Text(f.to_string()),
            ValueRef::Text(t) | ValueRef::Blob(t) => {
                Self::Text(String::from_utf8_lossy(t).into_owned())
            }
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<Option<String>> for Value {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Null, Self::Text)
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Self::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Self::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

/// Column name → value.
pub type Columns = BTreeMap<String, Value>;

/// Attachment classification, taken from the attachment's `gruppe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    TitleImage,
    GalleryImage,
    /// Documents such as a PDF exposé.
    Document,
    Other,
}

impl ResourceKind {
    /// Classify by OpenImmo attachment group; unknown groups are `Other`.
    #[must_use]
    pub fn from_group(group: Option<&str>) -> Self {
        match group.map(str::trim) {
            Some("TITELBILD") => Self::TitleImage,
            Some("BILD") => Self::GalleryImage,
            Some("DOKUMENTE") => Self::Document,
            _ => Self::Other,
        }
    }
}

/// One normalized listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectData {
    provider_key: String,
    object_id: String,
    properties: Columns,
    agent: Columns,
    /// Attachment file names in document order.
    resources: Vec<(String, ResourceKind)>,
}

impl ObjectData {
    #[must_use]
    pub fn new(
        provider_key: impl Into<String>,
        object_id: impl Into<String>,
        properties: Columns,
        agent: Columns,
        resources: Vec<(String, ResourceKind)>,
    ) -> Self {
        let mut deduplicated: Vec<(String, ResourceKind)> = Vec::with_capacity(resources.len());

        // A repeated file name keeps its first position and its last kind.
        for (name, kind) in resources {
            match deduplicated.iter_mut().find(|(n, _)| *n == name) {
                Some(existing) => existing.1 = kind,
                None => deduplicated.push((name, kind)),
            }
        }

        Self {
            provider_key: provider_key.into(),
            object_id: object_id.into(),
            properties,
            agent,
            resources: deduplicated,
        }
    }

    #[must_use]
    pub fn provider_key(&self) -> &str {
        &self.provider_key
    }

    /// Stable OpenImmo object id (`openimmo_obid`).
    #[must_use]
    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    /// URL-safe alias from the listing title, falling back to the object id.
    ///
    /// Never empty: if neither yields a slug, the alias is `listing-` plus
    /// the hex-encoded object id.
    #[must_use]
    pub fn alias(&self) -> String {
        let title = self
            .properties
            .get("objekttitel")
            .and_then(Value::as_str)
            .filter(|t| !t.trim().is_empty());

        [title, Some(self.object_id.as_str())]
            .into_iter()
            .flatten()
            .map(slugify)
            .find(|alias| !alias.is_empty())
            .unwrap_or_else(|| {
                let hex: String = self
                    .object_id
                    .bytes()
                    .map(|b| format!("{b:02x}"))
                    .collect();
                format!("listing-{hex}")
            })
    }

    #[must_use]
    pub fn properties(&self) -> &Columns {
        &self.properties
    }

    #[must_use]
    pub fn agent(&self) -> &Columns {
        &self.agent
    }

    /// External id of the contact person, if any.
    #[must_use]
    pub fn agent_external_id(&self) -> Option<&str> {
        self.agent
            .get("external_id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }

    /// All attachment file names in document order.
    pub fn resource_files(&self) -> impl Iterator<Item = &str> {
        self.resources.iter().map(|(name, _)| name.as_str())
    }

    #[must_use]
    pub fn title_image(&self) -> Option<&str> {
        self.resources_of(ResourceKind::TitleImage).next()
    }

    #[must_use]
    pub fn gallery_images(&self) -> Vec<&str> {
        self.resources_of(ResourceKind::GalleryImage).collect()
    }

    #[must_use]
    pub fn documents(&self) -> Vec<&str> {
        self.resources_of(ResourceKind::Document).collect()
    }

    #[must_use]
    pub fn other_attachments(&self) -> Vec<&str> {
        self.resources_of(ResourceKind::Other).collect()
    }

    fn resources_of(&self, kind: ResourceKind) -> impl Iterator<Item = &str> {
        self.resources
            .iter()
            .filter(move |(_, k)| *k == kind)
            .map(|(name, _)| name.as_str())
    }
}

/// Lowercase ASCII slug; German umlauts are transliterated.
#[must_use]
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for c in input.chars() {
        let part = match c {
            'ä' | 'Ä' => "ae".to_string(),
            'ö' | 'Ö' => "oe".to_string(),
            'ü' | 'Ü' => "ue".to_string(),
            'ß' => "ss".to_string(),
            c if c.is_ascii_alphanumeric() => c.to_ascii_lowercase().to_string(),
            _ => {
                pending_dash = true;
                continue;
            }
        };

        if pending_dash && !slug.is_empty() {
            slug.push('-');
        }
        pending_dash = false;
        slug.push_str(&part);
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ObjectData {
        ObjectData::new(
            "anbieter-nr",
            "object-id",
            Columns::from([
                ("foo".to_string(), Value::from("bar")),
                ("bar".to_string(), Value::Integer(42)),
                ("baz".to_string(), Value::Null),
            ]),
            Columns::from([("agent".to_string(), Value::from("data"))]),
            vec![
                ("image1".into(), ResourceKind::GalleryImage),
                ("image2".into(), ResourceKind::GalleryImage),
                ("image3".into(), ResourceKind::TitleImage),
                ("image4".into(), ResourceKind::GalleryImage),
                ("expose".into(), ResourceKind::Document),
                ("other".into(), ResourceKind::Other),
            ],
        )
    }

    #[test]
    fn test_create_and_read_object_data() {
        let data = sample();

        assert_eq!(data.provider_key(), "anbieter-nr");
        assert_eq!(data.object_id(), "object-id");
        assert_eq!(data.properties().get("bar"), Some(&Value::Integer(42)));
        assert_eq!(data.properties().get("baz"), Some(&Value::Null));
        assert_eq!(data.agent().get("agent"), Some(&Value::from("data")));

        assert_eq!(
            data.resource_files().collect::<Vec<_>>(),
            ["image1", "image2", "image3", "image4", "expose", "other"]
        );
        assert_eq!(data.title_image(), Some("image3"));
        assert_eq!(data.gallery_images(), ["image1", "image2", "image4"]);
        assert_eq!(data.documents(), ["expose"]);
        assert_eq!(data.other_attachments(), ["other"]);
    }

    #[test]
    fn test_duplicate_resource_keeps_position() {
        let data = ObjectData::new(
            "p",
            "o",
            Columns::new(),
            Columns::new(),
            vec![
                ("a.jpg".into(), ResourceKind::GalleryImage),
                ("b.jpg".into(), ResourceKind::GalleryImage),
                ("a.jpg".into(), ResourceKind::TitleImage),
            ],
        );

        assert_eq!(data.resource_files().collect::<Vec<_>>(), ["a.jpg", "b.jpg"]);
        assert_eq!(data.title_image(), Some("a.jpg"));
        assert_eq!(data.gallery_images(), ["b.jpg"]);
    }

    #[test]
    fn test_alias_from_title_or_object_id() {
        let titled = ObjectData::new(
            "p",
            "AB123",
            Columns::from([("objekttitel".to_string(), Value::from("Schöne Immobilie!"))]),
            Columns::new(),
            Vec::new(),
        );
        assert_eq!(titled.alias(), "schoene-immobilie");

        let untitled = ObjectData::new(
            "p",
            "0099_10_AB123",
            Columns::from([("objekttitel".to_string(), Value::from(""))]),
            Columns::new(),
            Vec::new(),
        );
        assert_eq!(untitled.alias(), "0099-10-ab123");

        let symbols_only = |title: &str, object_id: &str| {
            ObjectData::new(
                "p",
                object_id,
                Columns::from([("objekttitel".to_string(), Value::from(title))]),
                Columns::new(),
                Vec::new(),
            )
            .alias()
        };
        assert_eq!(symbols_only("***", "X1"), "x1");
        assert_eq!(symbols_only("!!!", "#_#"), "listing-235f23");
        assert_eq!(symbols_only("!!!", "#_#"), symbols_only("", "#_#"));
    }

    #[test]
    fn test_resource_kind_from_group() {
        assert_eq!(ResourceKind::from_group(Some("TITELBILD")), ResourceKind::TitleImage);
        assert_eq!(ResourceKind::from_group(Some("BILD")), ResourceKind::GalleryImage);
        assert_eq!(ResourceKind::from_group(Some("DOKUMENTE")), ResourceKind::Document);
        assert_eq!(ResourceKind::from_group(Some("GRUNDRISS")), ResourceKind::Other);
        assert_eq!(ResourceKind::from_group(None), ResourceKind::Other);
    }
}
