// src/store/documents.rs
use crate::sources::{Document, SourceError};
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use tracing::warn;

const AUTO_ID_LEN: usize = 20;

/// Random 20-character alphanumeric id, the shape document stores hand out.
pub fn auto_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(AUTO_ID_LEN)
        .map(char::from)
        .collect()
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn list_documents(conn: &Connection, collection: &str) -> Result<Vec<Document>, SourceError> {
    let mut stmt = conn.prepare(
        "SELECT id, body FROM documents WHERE collection = ? ORDER BY updated_at DESC, id",
    )?;

    let rows = stmt.query_map(params![collection], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut out = Vec::new();
    for r in rows {
        let (id, body) = r?;
        match serde_json::from_str::<Value>(&body) {
            Ok(value) => out.push(Document::from_value(id, value)),
            Err(e) => {
                // Still list it so it can be seen and deleted.
                warn!(record_id = %id, error = %e, "document body is not valid JSON");
                out.push(Document::new(id, Map::new()));
            }
        }
    }
    Ok(out)
}

pub fn get_document(
    conn: &Connection,
    collection: &str,
    id: &str,
) -> Result<Option<Document>, SourceError> {
    let body: Option<String> = conn
        .query_row(
            "SELECT body FROM documents WHERE collection = ? AND id = ?",
            params![collection, id],
            |row| row.get(0),
        )
        .optional()?;

    match body {
        Some(body) => {
            let value = serde_json::from_str(&body)
                .map_err(|e| SourceError::Malformed(format!("document {id}: {e}")))?;
            Ok(Some(Document::from_value(id, value)))
        }
        None => Ok(None),
    }
}

/// Insert or replace a whole document. Returns its id.
pub fn put_document(
    conn: &Connection,
    collection: &str,
    id: Option<&str>,
    fields: &Map<String, Value>,
) -> Result<String, SourceError> {
    let id = id.map(str::to_string).unwrap_or_else(auto_id);
    let body = serde_json::to_string(fields)
        .map_err(|e| SourceError::Malformed(format!("document {id}: {e}")))?;

    conn.execute(
        "INSERT INTO documents (collection, id, body, updated_at) VALUES (?, ?, ?, ?)
         ON CONFLICT(collection, id) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
        params![collection, id, body, now_millis()],
    )?;
    Ok(id)
}

/// Set one top-level field. Fails with `NotFound` if the document is missing.
pub fn update_document_field(
    conn: &mut Connection,
    collection: &str,
    id: &str,
    field: &str,
    value: Value,
) -> Result<(), SourceError> {
    let tx = conn.transaction()?;

    let Some(mut doc) = get_document(&tx, collection, id)? else {
        return Err(SourceError::NotFound(format!("{collection}/{id}")));
    };
    doc.fields.insert(field.to_string(), value);

    let body = serde_json::to_string(&doc.fields)
        .map_err(|e| SourceError::Malformed(format!("document {id}: {e}")))?;
    tx.execute(
        "UPDATE documents SET body = ?, updated_at = ? WHERE collection = ? AND id = ?",
        params![body, now_millis(), collection, id],
    )?;

    tx.commit()?;
    Ok(())
}

/// Returns whether a row was removed. Missing documents are not an error.
pub fn delete_document(conn: &Connection, collection: &str, id: &str) -> Result<bool, SourceError> {
    let n = conn.execute(
        "DELETE FROM documents WHERE collection = ? AND id = ?",
        params![collection, id],
    )?;
    Ok(n > 0)
}

/// Import a JSON array of objects. An object's `id` field, if any, becomes the document id.
pub fn import_documents(
    conn: &mut Connection,
    collection: &str,
    json: &str,
) -> Result<usize, SourceError> {
    let value: Value =
        serde_json::from_str(json).map_err(|e| SourceError::Malformed(e.to_string()))?;
    let Value::Array(items) = value else {
        return Err(SourceError::Malformed("seed must be a JSON array".into()));
    };

    let tx = conn.transaction()?;
    let mut imported = 0;
    for item in items {
        let Value::Object(mut fields) = item else {
            warn!("skipping seed entry that is not an object");
            continue;
        };
        let id = match fields.remove("id") {
            Some(Value::String(s)) if !s.is_empty() => Some(s),
            _ => None,
        };
        put_document(&tx, collection, id.as_deref(), &fields)?;
        imported += 1;
    }
    tx.commit()?;
    Ok(imported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(include_str!("../../sql/schema.sql")).unwrap();
        conn
    }

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn auto_ids_are_twenty_alphanumerics() {
        let id = auto_id();
        assert_eq!(id.len(), 20);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(id, auto_id());
    }

    #[test]
    fn put_list_and_collections_are_separate() {
        let conn = conn();
        put_document(&conn, "applications", Some("a"), &fields(json!({"fullName": "A"}))).unwrap();
        put_document(&conn, "other", Some("b"), &fields(json!({}))).unwrap();

        let docs = list_documents(&conn, "applications").unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "a");
        assert_eq!(docs[0].fields["fullName"], json!("A"));
    }

    #[test]
    fn update_sets_one_field_and_keeps_the_rest() {
        let mut conn = conn();
        put_document(&conn, "applications", Some("a"), &fields(json!({"fullName": "A"}))).unwrap();

        update_document_field(&mut conn, "applications", "a", "status", json!("approved")).unwrap();

        let doc = get_document(&conn, "applications", "a").unwrap().unwrap();
        assert_eq!(doc.fields["status"], json!("approved"));
        assert_eq!(doc.fields["fullName"], json!("A"));
    }

    #[test]
    fn update_of_missing_document_is_not_found() {
        let mut conn = conn();
        let err = update_document_field(&mut conn, "applications", "zz", "status", json!("approved"))
            .unwrap_err();
        assert!(matches!(err, SourceError::NotFound(_)));
    }

    #[test]
    fn delete_is_idempotent() {
        let conn = conn();
        put_document(&conn, "applications", Some("a"), &Map::new()).unwrap();
        assert!(delete_document(&conn, "applications", "a").unwrap());
        assert!(!delete_document(&conn, "applications", "a").unwrap());
    }

    #[test]
    fn import_uses_given_ids_and_generates_the_rest() {
        let mut conn = conn();
        let n = import_documents(
            &mut conn,
            "applications",
            r#"[{"id": "x1", "fullName": "X"}, {"fullName": "Y"}, 7]"#,
        )
        .unwrap();

        assert_eq!(n, 2);
        let docs = list_documents(&conn, "applications").unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().any(|d| d.id == "x1" && !d.fields.contains_key("id")));
    }

    #[test]
    fn import_rejects_non_arrays() {
        let mut conn = conn();
        let err = import_documents(&mut conn, "applications", r#"{"a": 1}"#).unwrap_err();
        assert!(matches!(err, SourceError::Malformed(_)));
    }
}
