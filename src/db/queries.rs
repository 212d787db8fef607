//! BSON document conversions for the three collections, and the
//! percent-encoding of map keys the document store reserves (`.`, `$`),
//! mirroring the original service's `mongo_user_encode`/`mongo_user_decode`.

use bson::{doc, Bson, Document};
use std::collections::HashMap;
use ws_core::{DownloadTicket, Error, ErrorKind, ObjectRecord, Permission, Result, WorkspaceRecord};

/// Percent-encodes `.` and `$`, the two characters MongoDB reserves in field
/// names, plus `%` itself so decoding is unambiguous.
pub fn encode_key(key: &str) -> String {
    key.replace('%', "%25").replace('.', "%2E").replace('$', "%24")
}

/// Reverses [`encode_key`].
pub fn decode_key(key: &str) -> String {
    key.replace("%2E", ".").replace("%24", "$").replace("%25", "%")
}

fn backing_store_error(msg: impl Into<String>) -> Error {
    Error::new(ErrorKind::BackingStore, std::io::Error::other(msg.into()))
}

fn get_str(doc: &Document, key: &str) -> Result<String> {
    doc.get_str(key).map(str::to_string).map_err(|_| backing_store_error(format!("missing or non-string field `{key}`")))
}

fn get_str_opt(doc: &Document, key: &str) -> Option<String> {
    doc.get_str(key).ok().map(str::to_string)
}

fn get_u64(doc: &Document, key: &str) -> Result<u64> {
    match doc.get(key) {
        Some(Bson::Int64(n)) => Ok(*n as u64),
        Some(Bson::Int32(n)) => Ok(*n as u64),
        _ => Err(backing_store_error(format!("missing or non-numeric field `{key}`"))),
    }
}

fn get_i64(doc: &Document, key: &str) -> Result<i64> {
    match doc.get(key) {
        Some(Bson::Int64(n)) => Ok(*n),
        Some(Bson::Int32(n)) => Ok(*n as i64),
        _ => Err(backing_store_error(format!("missing or non-numeric field `{key}`"))),
    }
}

pub(crate) fn string_map_to_document(map: &HashMap<String, String>) -> Document {
    let mut doc = Document::new();
    for (k, v) in map {
        doc.insert(k.clone(), v.clone());
    }
    doc
}

fn document_to_string_map(doc: Option<&Document>) -> HashMap<String, String> {
    doc.map(|d| d.iter().filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string()))).collect())
        .unwrap_or_default()
}

/// Serializes a [`WorkspaceRecord`] into its stored document shape, percent-encoding
/// `user_permission`'s keys.
pub fn workspace_to_document(ws: &WorkspaceRecord) -> Document {
    let mut user_permission = Document::new();
    for (user, perm) in &ws.user_permission {
        user_permission.insert(encode_key(user), perm.to_wire());
    }
    doc! {
        "uuid": &ws.uuid,
        "owner": &ws.owner,
        "name": &ws.name,
        "creation_time": &ws.creation_time,
        "global_permission": ws.global_permission.to_wire(),
        "user_permission": user_permission,
        "metadata": string_map_to_document(&ws.metadata),
    }
}

/// Parses a stored workspace document back into a [`WorkspaceRecord`].
pub fn document_to_workspace(doc: &Document) -> Result<WorkspaceRecord> {
    let mut user_permission = HashMap::new();
    if let Ok(perms) = doc.get_document("user_permission") {
        for (encoded_user, v) in perms {
            if let Some(code) = v.as_str().and_then(Permission::from_wire) {
                user_permission.insert(decode_key(encoded_user), code);
            }
        }
    }
    let global_permission = get_str_opt(doc, "global_permission")
        .and_then(|s| Permission::from_wire(&s))
        .unwrap_or(Permission::None);
    Ok(WorkspaceRecord {
        uuid: get_str(doc, "uuid")?,
        owner: get_str(doc, "owner")?,
        name: get_str(doc, "name")?,
        creation_time: get_str(doc, "creation_time")?,
        global_permission,
        user_permission,
        metadata: document_to_string_map(doc.get_document("metadata").ok()),
    })
}

/// Serializes an [`ObjectRecord`] into its stored document shape.
pub fn object_to_document(obj: &ObjectRecord) -> Document {
    doc! {
        "uuid": &obj.uuid,
        "workspace_uuid": &obj.workspace_uuid,
        "path": &obj.path,
        "name": &obj.name,
        "type": &obj.object_type,
        "owner": &obj.owner,
        "creation_time": &obj.creation_time,
        "size": obj.size as i64,
        "user_metadata": string_map_to_document(&obj.user_metadata),
        "auto_metadata": string_map_to_document(&obj.auto_metadata),
        "file_path": obj.file_path.clone(),
        "shocknode": obj.shock_url.clone(),
    }
}

/// Parses a stored object document back into an [`ObjectRecord`].
pub fn document_to_object(doc: &Document) -> Result<ObjectRecord> {
    Ok(ObjectRecord {
        uuid: get_str(doc, "uuid")?,
        workspace_uuid: get_str(doc, "workspace_uuid")?,
        path: get_str_opt(doc, "path").unwrap_or_default(),
        name: get_str(doc, "name")?,
        object_type: get_str(doc, "type")?,
        owner: get_str(doc, "owner")?,
        creation_time: get_str(doc, "creation_time")?,
        size: get_u64(doc, "size").unwrap_or(0),
        user_metadata: document_to_string_map(doc.get_document("user_metadata").ok()),
        auto_metadata: document_to_string_map(doc.get_document("auto_metadata").ok()),
        file_path: get_str_opt(doc, "file_path"),
        shock_url: get_str_opt(doc, "shocknode"),
    })
}

/// Serializes a [`DownloadTicket`] into its stored document shape.
pub fn download_to_document(ticket: &DownloadTicket) -> Document {
    doc! {
        "download_key": &ticket.download_key,
        "workspace_path": &ticket.workspace_path,
        "name": &ticket.name,
        "size": ticket.size as i64,
        "expiration_time": ticket.expiration_time,
        "file_path": ticket.file_path.clone(),
        "shock_node": ticket.shock_node.clone(),
        "token": ticket.token.clone(),
    }
}

/// Parses a stored download-ticket document back into a [`DownloadTicket`].
pub fn document_to_download(doc: &Document) -> Result<DownloadTicket> {
    Ok(DownloadTicket {
        download_key: get_str(doc, "download_key")?,
        workspace_path: get_str_opt(doc, "workspace_path").unwrap_or_default(),
        name: get_str(doc, "name")?,
        size: get_u64(doc, "size").unwrap_or(0),
        expiration_time: get_i64(doc, "expiration_time").unwrap_or(0),
        file_path: get_str_opt(doc, "file_path"),
        shock_node: get_str_opt(doc, "shock_node"),
        token: get_str_opt(doc, "token"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn key_encoding_round_trips_reserved_characters() {
        let key = "user.name$with%percent";
        let encoded = encode_key(key);
        assert!(!encoded.contains('.') && !encoded.contains('$'));
        assert_eq!(decode_key(&encoded), key);
    }

    #[test]
    fn workspace_document_round_trips() {
        let mut perms = HashMap::new();
        perms.insert("bob.smith".to_string(), Permission::Write);
        let ws = WorkspaceRecord {
            uuid: "w1".into(),
            owner: "alice".into(),
            name: "docs".into(),
            creation_time: "2026-01-01T00:00:00Z".into(),
            global_permission: Permission::Read,
            user_permission: perms,
            metadata: HashMap::new(),
        };
        let doc = workspace_to_document(&ws);
        let back = document_to_workspace(&doc).unwrap();
        assert_eq!(back.uuid, ws.uuid);
        assert_eq!(back.user_permission.get("bob.smith"), Some(&Permission::Write));
    }

    #[test]
    fn object_document_round_trips() {
        let obj = ObjectRecord {
            uuid: "o1".into(),
            workspace_uuid: "w1".into(),
            path: "a/b".into(),
            name: "c.txt".into(),
            object_type: "txt".into(),
            owner: "alice".into(),
            creation_time: "2026-01-01T00:00:00Z".into(),
            size: 5,
            user_metadata: HashMap::new(),
            auto_metadata: HashMap::new(),
            file_path: Some("alice/docs/a/b/c.txt".into()),
            shock_url: None,
        };
        let doc = object_to_document(&obj);
        let back = document_to_object(&doc).unwrap();
        assert_eq!(back.name, "c.txt");
        assert_eq!(back.size, 5);
        assert_eq!(back.file_path.as_deref(), Some("alice/docs/a/b/c.txt"));
    }
}
