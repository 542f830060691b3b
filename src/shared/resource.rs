//! Resource paths
//!
//! Maps a request path onto the collection it touches and, for item-style
//! paths, the numeric record id. Used to decide which cached records and
//! which open detail view a write affects.

use serde_json::Value;

/// Collection and optional record id addressed by a path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    pub collection: String,
    pub id: Option<i64>,
}

impl ResourceRef {
    /// Parse a relative or absolute URL.
    ///
    /// `/complaints/` is the `complaints` collection, `/complaints/7` is record
    /// 7 in it. Query and fragment are ignored. Returns `None` for the root.
    pub fn parse(url: &str) -> Option<Self> {
        let path = match url.find("://") {
            Some(scheme_end) => {
                let rest = &url[scheme_end + 3..];
                rest.find('/').map(|i| &rest[i..]).unwrap_or("/")
            }
            None => url,
        };
        let path = path.split(['?', '#']).next().unwrap_or_default();

        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let (last, rest) = segments.split_last()?;
        match last.parse::<i64>() {
            Ok(id) => {
                let collection = rest.last()?;
                Some(Self {
                    collection: (*collection).to_string(),
                    id: Some(id),
                })
            }
            Err(_) => Some(Self {
                collection: (*last).to_string(),
                id: None,
            }),
        }
    }

    pub fn is_item(&self) -> bool {
        self.id.is_some()
    }
}

/// The numeric `id` field of a record, if it has one
pub fn record_id(record: &Value) -> Option<i64> {
    match record.get("id")? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Shallow field merge of `changes` into `target`
///
/// Object fields are merged key by key; a non-object on either side replaces
/// the target outright.
pub fn merge_fields(target: &mut Value, changes: &Value) {
    match (target, changes) {
        (Value::Object(target), Value::Object(fields)) => {
            for (name, value) in fields {
                target.insert(name.clone(), value.clone());
            }
        }
        (target, changes) => *target = changes.clone(),
    }
}
