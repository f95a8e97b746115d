use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

pub type JsonObject = Map<String, Value>;

/// A field of the bookmark record, as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Id,
    Url,
    Title,
    Comment,
}

impl Field {
    pub const ALL: &'static [Field] = &[Field::Id, Field::Url, Field::Title, Field::Comment];
    pub const WITHOUT_ID: &'static [Field] = &[Field::Url, Field::Title, Field::Comment];
    pub const REQUIRED: &'static [Field] = Field::WITHOUT_ID;

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::Url => "url",
            Field::Title => "title",
            Field::Comment => "comment",
        }
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => Ok(Field::Id),
            "url" => Ok(Field::Url),
            "title" => Ok(Field::Title),
            "comment" => Ok(Field::Comment),
            other => Err(format!("unknown field {other:?}")),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a JSON object could not be turned into a [`Bookmark`].
///
/// All problems found in one payload are collected, so a client sees the
/// missing and the excess fields in the same message.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub missing: Vec<Field>,
    pub excess: Vec<String>,
    pub invalid: Vec<Field>,
}

impl ValidationError {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.excess.is_empty() && self.invalid.is_empty()
    }
}

fn write_list<T: fmt::Display>(items: &[T]) -> String {
    let names: Vec<String> = items.iter().map(|i| i.to_string()).collect();
    format!("[{}]", names.join(", "))
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing fields: {}", write_list(&self.missing)));
        }
        if !self.excess.is_empty() {
            parts.push(format!("excess fields: {}", write_list(&self.excess)));
        }
        if !self.invalid.is_empty() {
            parts.push(format!("invalid fields: {}", write_list(&self.invalid)));
        }
        write!(f, "{}", parts.join(", "))
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bookmark {
    pub id: Option<i64>,
    pub url: String,
    pub title: String,
    pub comment: String,
}

impl Bookmark {
    pub fn new(url: impl Into<String>, title: impl Into<String>, comment: impl Into<String>) -> Self {
        Bookmark {
            id: None,
            url: url.into(),
            title: title.into(),
            comment: comment.into(),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    fn value_of(&self, field: Field) -> Value {
        match field {
            Field::Id => self.id.map_or(Value::Null, Value::from),
            Field::Url => Value::String(self.url.clone()),
            Field::Title => Value::String(self.title.clone()),
            Field::Comment => Value::String(self.comment.clone()),
        }
    }

    /// Projects the bookmark onto exactly the given fields.
    pub fn serialize_fields(&self, fields: &[Field]) -> JsonObject {
        fields
            .iter()
            .map(|field| (field.as_str().to_owned(), self.value_of(*field)))
            .collect()
    }

    pub fn serialize(&self) -> JsonObject {
        self.serialize_fields(Field::ALL)
    }

    pub fn serialize_without_id(&self) -> JsonObject {
        self.serialize_fields(Field::WITHOUT_ID)
    }

    /// Builds a bookmark from `data`, accepting only keys listed in `fields`.
    ///
    /// Keys outside `fields` are excess, any of `url`, `title`, `comment`
    /// absent from the accepted keys is missing. A value of the wrong JSON
    /// type is invalid. Every problem is reported in one [`ValidationError`].
    pub fn deserialize_fields(data: &JsonObject, fields: &[Field]) -> Result<Self, ValidationError> {
        let mut err = ValidationError::default();
        let mut accepted = BTreeSet::new();

        let mut excess: Vec<String> = Vec::new();
        for key in data.keys() {
            match key.parse::<Field>() {
                Ok(field) if fields.contains(&field) => {
                    accepted.insert(field);
                }
                _ => excess.push(key.clone()),
            }
        }
        excess.sort();
        err.excess = excess;

        err.missing = Field::REQUIRED
            .iter()
            .filter(|field| !accepted.contains(*field))
            .copied()
            .collect();

        let mut bookmark = Bookmark::default();
        for field in &accepted {
            let value = &data[field.as_str()];
            let ok = match field {
                Field::Id => match value {
                    Value::Null => true,
                    Value::Number(n) => match n.as_i64() {
                        Some(id) => {
                            bookmark.id = Some(id);
                            true
                        }
                        None => false,
                    },
                    _ => false,
                },
                Field::Url => assign_string(value, &mut bookmark.url),
                Field::Title => assign_string(value, &mut bookmark.title),
                Field::Comment => assign_string(value, &mut bookmark.comment),
            };
            if !ok {
                err.invalid.push(*field);
            }
        }

        if err.is_empty() {
            Ok(bookmark)
        } else {
            Err(err)
        }
    }

    pub fn deserialize(data: &JsonObject) -> Result<Self, ValidationError> {
        Self::deserialize_fields(data, Field::ALL)
    }

    /// Like [`Bookmark::deserialize`], but an `id` key counts as excess.
    pub fn deserialize_without_id(data: &JsonObject) -> Result<Self, ValidationError> {
        Self::deserialize_fields(data, Field::WITHOUT_ID)
    }

    /// Like [`Bookmark::deserialize_without_id`], but an `id` key is dropped
    /// instead of rejected. Used for request bodies on create and update.
    pub fn deserialize_ignore_id(data: &JsonObject) -> Result<Self, ValidationError> {
        let mut without_id = data.clone();
        without_id.remove(Field::Id.as_str());
        Self::deserialize_fields(&without_id, Field::WITHOUT_ID)
    }
}

fn assign_string(value: &Value, slot: &mut String) -> bool {
    match value {
        Value::String(s) => {
            *slot = s.clone();
            true
        }
        _ => false,
    }
}
