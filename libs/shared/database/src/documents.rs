use serde_json::Value;
use uuid::Uuid;

/// Generate a new string document id.
pub fn new_document_id() -> String {
    Uuid::new_v4().to_string()
}

/// Check the format of a client-supplied document id.
pub fn valid_document_id(id: &str) -> bool {
    Uuid::parse_str(id).is_ok()
}

/// Rename the store's `_id` field to `id` in a response document.
pub fn reshape(mut document: Value) -> Value {
    if let Some(object) = document.as_object_mut() {
        if let Some(id) = object.remove("_id") {
            let id = match id {
                Value::String(id) => Value::String(id),
                other => Value::String(other.to_string()),
            };
            object.insert("id".to_string(), id);
        }
    }
    document
}

pub fn reshape_all(documents: Vec<Value>) -> Vec<Value> {
    documents.into_iter().map(reshape).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reshape_renames_underscore_id() {
        let doc = reshape(json!({ "_id": "abc", "nombre": "Ana" }));
        assert_eq!(doc.get("id"), Some(&json!("abc")));
        assert!(doc.get("_id").is_none());
        assert_eq!(doc.get("nombre"), Some(&json!("Ana")));
    }

    #[test]
    fn reshape_leaves_documents_without_id_alone() {
        let doc = reshape(json!({ "nombre": "Ana" }));
        assert!(doc.get("id").is_none());
    }

    #[test]
    fn document_id_validation() {
        assert!(valid_document_id(&new_document_id()));
        assert!(!valid_document_id("not-an-id"));
        assert!(!valid_document_id(""));
    }
}
