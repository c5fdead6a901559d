use serde::Deserialize;
use serde_json::{Map, Value};

use crate::dao::document_store::{Document, DocumentChange};

pub const END_SUFFIX: &str = "\u{ffff}";
pub const ID_FIELD: &str = "_id";
pub const REV_FIELD: &str = "_rev";

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    #[serde(default)]
    pub doc: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct WriteResponse {
    pub rev: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangesResponse {
    pub results: Vec<ChangeRow>,
    pub last_seq: Value,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRow {
    pub id: String,
    pub changes: Vec<ChangeRev>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub doc: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRev {
    pub rev: String,
}

/// Split a raw CouchDB document into metadata and body.
pub fn into_document(raw: Value) -> Option<Document> {
    let Value::Object(mut fields) = raw else {
        return None;
    };
    let id = take_string(&mut fields, ID_FIELD)?;
    let rev = take_string(&mut fields, REV_FIELD)?;
    fields.retain(|key, _| !key.starts_with('_'));

    Some(Document {
        id,
        rev,
        body: Value::Object(fields),
    })
}

/// Attach CouchDB metadata to a document body.
pub fn with_metadata(id: &str, rev: Option<&str>, body: Value) -> Value {
    let mut fields = match body {
        Value::Object(fields) => fields,
        other => {
            let mut fields = Map::new();
            fields.insert("value".into(), other);
            fields
        }
    };
    fields.insert(ID_FIELD.into(), Value::String(id.to_string()));
    if let Some(rev) = rev {
        fields.insert(REV_FIELD.into(), Value::String(rev.to_string()));
    }
    Value::Object(fields)
}

impl ChangeRow {
    pub fn into_change(self) -> Option<DocumentChange> {
        let rev = self.changes.into_iter().next()?.rev;
        let body = if self.deleted {
            None
        } else {
            Some(into_document(self.doc?)?.body)
        };
        Some(DocumentChange {
            id: self.id,
            rev,
            body,
        })
    }
}

fn take_string(fields: &mut Map<String, Value>, key: &str) -> Option<String> {
    match fields.remove(key)? {
        Value::String(value) => Some(value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_metadata_from_documents() {
        let doc = into_document(json!({
            "_id": "game::main",
            "_rev": "3-abc",
            "_attachments": {},
            "round": {"timer": 30}
        }))
        .unwrap();
        assert_eq!(doc.id, "game::main");
        assert_eq!(doc.rev, "3-abc");
        assert_eq!(doc.body, json!({"round": {"timer": 30}}));
    }

    #[test]
    fn metadata_is_attached_for_writes() {
        let raw = with_metadata("question::a", Some("1-x"), json!({"prompt": "p"}));
        assert_eq!(
            raw,
            json!({"_id": "question::a", "_rev": "1-x", "prompt": "p"})
        );
    }

    #[test]
    fn deleted_change_has_no_body() {
        let row: ChangeRow = serde_json::from_value(json!({
            "seq": "7-g1",
            "id": "question::a",
            "changes": [{"rev": "2-b"}],
            "deleted": true
        }))
        .unwrap();
        let change = row.into_change().unwrap();
        assert!(change.is_deletion());
        assert_eq!(change.rev, "2-b");
    }
}
