use crate::permission::Permission;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashMap;

/// A top-level named container, scoping a tree of objects and their permissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceRecord {
    /// Opaque unique identifier, assigned on creation.
    pub uuid: String,
    /// Identifier of the user who created the workspace. Immutable.
    pub owner: String,
    /// Unique within `owner`, non-empty, contains no `/`.
    pub name: String,
    /// ISO-8601 UTC creation timestamp.
    pub creation_time: String,
    /// The permission granted to every caller who has no more specific grant.
    pub global_permission: Permission,
    /// Per-user permission overlay. Never contains `Public` or `Owner`.
    pub user_permission: HashMap<String, Permission>,
    /// User-supplied key/value metadata.
    pub metadata: HashMap<String, String>,
}

impl WorkspaceRecord {
    /// The effective permission for `user` against this workspace, applying the
    /// owner/public/user-overlay rules described by the metadata repository contract.
    pub fn effective_permission(&self, user: Option<&str>) -> Permission {
        if let Some(u) = user {
            if u == self.owner {
                return Permission::Owner;
            }
        }
        if self.global_permission == Permission::Public {
            return Permission::Public;
        }
        if let Some(u) = user {
            if let Some(p) = self.user_permission.get(u) {
                if p.rank() > self.global_permission.rank() {
                    return *p;
                }
            }
        }
        self.global_permission
    }
}

/// A named entry within a workspace: either a folder (has children) or a leaf
/// with a body held on the filesystem or in the external blob store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Opaque unique identifier.
    pub uuid: String,
    /// The owning workspace's uuid.
    pub workspace_uuid: String,
    /// Canonical slash-joined folder path beneath the workspace root. Empty for root objects.
    pub path: String,
    /// Non-empty, contains no `/`.
    pub name: String,
    /// A type drawn from the operator-configured whitelist. `folder`/`modelfolder` are folder-kind.
    pub object_type: String,
    /// Identifier of the user who owns this object (may differ from the workspace owner).
    pub owner: String,
    /// ISO-8601 UTC creation timestamp.
    pub creation_time: String,
    /// Size in bytes; always 0 for folder-kind objects.
    pub size: u64,
    /// User-supplied metadata.
    pub user_metadata: HashMap<String, String>,
    /// Metadata computed or set by the system (e.g. `is_folder`).
    pub auto_metadata: HashMap<String, String>,
    /// Filesystem-relative path of the body, when stored locally.
    pub file_path: Option<String>,
    /// Blob-store node URL, when the body lives in the external blob store.
    pub shock_url: Option<String>,
}

impl ObjectRecord {
    /// True for `folder` and its `modelfolder` alias.
    pub fn is_folder(&self) -> bool {
        matches!(self.object_type.as_str(), "folder" | "modelfolder")
    }
}

/// A single-use, time-limited URL binding to a workspace object's body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadTicket {
    /// Fresh uuid returned to the caller as part of the download URL.
    pub download_key: String,
    /// The original path string the ticket was issued for.
    pub workspace_path: String,
    /// The object's name, echoed in `Content-Disposition`.
    pub name: String,
    /// The object's size in bytes at the time the ticket was issued.
    pub size: u64,
    /// Absolute expiration time, seconds since the epoch.
    pub expiration_time: i64,
    /// Local filesystem path, when the object is filesystem-backed.
    pub file_path: Option<String>,
    /// Blob-store node URL, when the object is blob-backed.
    pub shock_node: Option<String>,
    /// The bearer token to present to the blob store when streaming the download.
    pub token: Option<String>,
}

/// An in-memory record of an object whose body is being uploaded out-of-band
/// to the blob store, awaiting checksum completion.
#[derive(Debug, Clone)]
pub struct PendingUpload {
    /// The object awaiting size reconciliation.
    pub object_id: String,
    /// The blob-store node URL to poll.
    pub shock_url: String,
    /// The token used to query the blob store on the uploader's behalf.
    pub auth_token: String,
    /// The most recently observed size, if any.
    pub size: u64,
    /// Set once the blob store reports a checksum for this node.
    pub updated: bool,
    /// When this entry was created (used only for diagnostics/age reporting).
    pub creation_time: std::time::Instant,
}

impl PendingUpload {
    /// Records an observed size and marks the entry ready for reconciliation.
    pub fn set_size(&mut self, size: u64) {
        self.size = size;
        self.updated = true;
    }

    /// How long this upload has been pending.
    pub fn age(&self) -> std::time::Duration {
        self.creation_time.elapsed()
    }
}

/// The metadata of a workspace or object, in the shape every JSON-RPC method
/// returns it in. Constructed internally and serialized at the wire boundary
/// via [`ObjectMeta::to_wire`]; never parsed back from the wire.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    /// Valid entries carry `Some`; `error_meta` entries carry `None` and an error string instead.
    pub name: String,
    /// The object's type, or `"folder"` for a workspace/folder entry.
    pub object_type: String,
    /// The folder path the entry lives under.
    pub path: String,
    /// ISO-8601 UTC creation timestamp.
    pub creation_time: String,
    /// Opaque unique identifier.
    pub id: String,
    /// Owning user identifier.
    pub owner: String,
    /// Size in bytes.
    pub size: u64,
    /// User-supplied metadata.
    pub user_metadata: HashMap<String, String>,
    /// System-computed metadata, always including `is_folder`.
    pub auto_metadata: HashMap<String, String>,
    /// Per-user permission overlay.
    pub user_permission: HashMap<String, Permission>,
    /// The workspace's global permission.
    pub global_permission: Permission,
    /// The blob-store node URL, if the body is blob-backed.
    pub shockurl: Option<String>,
    /// Set when this entry represents a failure for one object within a
    /// multi-object request; the RPC itself still succeeds.
    pub error: Option<String>,
}

impl ObjectMeta {
    /// Builds an error placeholder entry, used by multi-object methods to
    /// report a per-object failure without failing the whole request.
    pub fn error_meta(message: impl Into<String>) -> ObjectMeta {
        ObjectMeta {
            name: String::new(),
            object_type: String::new(),
            path: String::new(),
            creation_time: String::new(),
            id: String::new(),
            owner: String::new(),
            size: 0,
            user_metadata: HashMap::new(),
            auto_metadata: HashMap::new(),
            user_permission: HashMap::new(),
            global_permission: Permission::None,
            shockurl: None,
            error: Some(message.into()),
        }
    }

    /// Serializes to the positional wire tuple JSON-RPC clients expect:
    /// `[name, type, path, creation_time, id, owner, size, user_metadata,
    /// auto_metadata, user_permission, global_permission, shockurl, error?]`.
    pub fn to_wire(&self) -> Value {
        let user_permission: serde_json::Map<String, Value> = self
            .user_permission
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.to_wire().to_string())))
            .collect();
        let mut tuple = vec![
            json!(self.name),
            json!(self.object_type),
            json!(self.path),
            json!(self.creation_time),
            json!(self.id),
            json!(self.owner),
            json!(self.size),
            json!(self.user_metadata),
            json!(self.auto_metadata),
            Value::Object(user_permission),
            json!(self.global_permission.to_wire()),
            json!(self.shockurl),
        ];
        if let Some(err) = &self.error {
            tuple.push(json!(err));
        }
        Value::Array(tuple)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn effective_permission_prefers_owner() {
        let ws = WorkspaceRecord {
            uuid: "w1".into(),
            owner: "alice".into(),
            name: "docs".into(),
            creation_time: "2026-01-01T00:00:00Z".into(),
            global_permission: Permission::None,
            user_permission: HashMap::new(),
            metadata: HashMap::new(),
        };
        assert_eq!(ws.effective_permission(Some("alice")), Permission::Owner);
    }

    #[test]
    fn effective_permission_public_beats_absent_user_grant() {
        let ws = WorkspaceRecord {
            uuid: "w1".into(),
            owner: "alice".into(),
            name: "docs".into(),
            creation_time: "2026-01-01T00:00:00Z".into(),
            global_permission: Permission::Public,
            user_permission: HashMap::new(),
            metadata: HashMap::new(),
        };
        assert_eq!(ws.effective_permission(Some("bob")), Permission::Public);
        assert_eq!(ws.effective_permission(None), Permission::Public);
    }

    #[test]
    fn effective_permission_user_overlay_only_applies_when_higher_rank() {
        let mut perms = HashMap::new();
        perms.insert("bob".to_string(), Permission::Write);
        let ws = WorkspaceRecord {
            uuid: "w1".into(),
            owner: "alice".into(),
            name: "docs".into(),
            creation_time: "2026-01-01T00:00:00Z".into(),
            global_permission: Permission::Read,
            user_permission: perms,
            metadata: HashMap::new(),
        };
        assert_eq!(ws.effective_permission(Some("bob")), Permission::Write);
        assert_eq!(ws.effective_permission(Some("carol")), Permission::Read);
    }

    #[test]
    fn wire_shape_is_positional_array() {
        let meta = ObjectMeta {
            name: "a.txt".into(),
            object_type: "txt".into(),
            path: "".into(),
            creation_time: "2026-01-01T00:00:00Z".into(),
            id: "id1".into(),
            owner: "alice".into(),
            size: 5,
            user_metadata: HashMap::new(),
            auto_metadata: HashMap::new(),
            user_permission: HashMap::new(),
            global_permission: Permission::None,
            shockurl: None,
            error: None,
        };
        let wire = meta.to_wire();
        assert!(wire.is_array());
        assert_eq!(wire[0], json!("a.txt"));
        assert_eq!(wire.as_array().unwrap().len(), 12);
    }
}
