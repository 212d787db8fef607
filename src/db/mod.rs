//! The metadata repository (C3): the `mongodb`-backed store for
//! workspaces, objects, and download tickets, grounded on
//! `examples/original_source/WorkspaceDB.cpp`'s query shapes and
//! orchestration algorithms.

mod permissions;
mod queries;
mod removal;

pub use removal::RemovalRequest;

use bson::{doc, Document, Regex};
use mongodb::Collection;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;
use ws_core::{
    DownloadTicket, Error, ErrorKind, ObjectMeta, ObjectRecord, ParsedPath, Permission, Result, WSPath, WSPathParser, WorkspaceRecord,
};
use ws_sbe_fs::FsBodyStore;

fn db_err<E: std::fmt::Display>(e: E) -> Error {
    Error::new(ErrorKind::BackingStore, std::io::Error::other(e.to_string()))
}

fn new_uuid() -> String {
    Uuid::new_v4().to_string()
}

/// Escapes regex metacharacters in a path so it can be embedded in a
/// MongoDB `$regex` filter, mirroring the original's descendant-matching
/// queries (`^<full_path>($|/)`).
fn regex_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if "\\.+*?()|[]{}^$".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn object_rel_path(ws: &WorkspaceRecord, path: &str, name: &str) -> PathBuf {
    let mut p = PathBuf::from(&ws.owner);
    p.push(&ws.name);
    if !path.is_empty() {
        p.push(path);
    }
    p.push(name);
    p
}

fn workspace_to_meta(ws: &WorkspaceRecord) -> ObjectMeta {
    let mut auto_metadata = HashMap::new();
    auto_metadata.insert("is_folder".to_string(), "1".to_string());
    ObjectMeta {
        name: ws.name.clone(),
        object_type: "folder".to_string(),
        path: String::new(),
        creation_time: ws.creation_time.clone(),
        id: ws.uuid.clone(),
        owner: ws.owner.clone(),
        size: 0,
        user_metadata: ws.metadata.clone(),
        auto_metadata,
        user_permission: ws.user_permission.clone(),
        global_permission: ws.global_permission,
        shockurl: None,
        error: None,
    }
}

fn object_to_meta(obj: &ObjectRecord, ws: &WorkspaceRecord) -> ObjectMeta {
    let mut auto_metadata = obj.auto_metadata.clone();
    auto_metadata.insert("is_folder".to_string(), if obj.is_folder() { "1" } else { "0" }.to_string());
    ObjectMeta {
        name: obj.name.clone(),
        object_type: obj.object_type.clone(),
        path: obj.path.clone(),
        creation_time: obj.creation_time.clone(),
        id: obj.uuid.clone(),
        owner: obj.owner.clone(),
        size: obj.size,
        user_metadata: obj.user_metadata.clone(),
        auto_metadata,
        user_permission: ws.user_permission.clone(),
        global_permission: ws.global_permission,
        shockurl: obj.shock_url.clone(),
        error: None,
    }
}

/// True if `caller` has at least `min` effective permission on `ws`, or
/// `admin_mode` is set for the request (admin-mode always satisfies any
/// permission check, per §4.3 `user_has_permission`).
pub fn user_has_permission(ws: &WorkspaceRecord, caller: Option<&str>, min: Permission, admin_mode: bool) -> bool {
    admin_mode || ws.effective_permission(caller) >= min
}

/// The document-store-backed metadata repository.
#[derive(Clone)]
pub struct Repository {
    workspaces: Collection<Document>,
    objects: Collection<Document>,
    downloads: Collection<Document>,
    fs: FsBodyStore,
}

impl Repository {
    /// Builds a repository over `database`'s three collections, backed by
    /// `fs` for object bodies stored on the filesystem.
    pub fn new(database: &mongodb::Database, fs: FsBodyStore) -> Repository {
        Repository {
            workspaces: database.collection("workspaces"),
            objects: database.collection("objects"),
            downloads: database.collection("downloads"),
            fs,
        }
    }

    /// Parses `s` and, if it addresses an existing workspace, populates its record.
    pub async fn parse_path(&self, s: &str) -> Result<WSPath> {
        let parsed = WSPathParser::parse(s).ok_or_else(|| Error::from(ErrorKind::InvalidPath))?;
        let workspace = if parsed.owner.is_empty() || parsed.wsname.is_empty() {
            None
        } else {
            self.find_workspace(&parsed.owner, &parsed.wsname).await?
        };
        Ok(WSPath { parsed, workspace })
    }

    async fn find_workspace(&self, owner: &str, wsname: &str) -> Result<Option<WorkspaceRecord>> {
        let filter = doc! { "owner": owner, "name": wsname };
        match self.workspaces.find_one(filter).await.map_err(db_err)? {
            Some(doc) => Ok(Some(queries::document_to_workspace(&doc)?)),
            None => Ok(None),
        }
    }

    async fn find_object(&self, ws_uuid: &str, path: &str, name: &str) -> Result<Option<ObjectRecord>> {
        let filter = doc! { "workspace_uuid": ws_uuid, "path": path, "name": name };
        match self.objects.find_one(filter).await.map_err(db_err)? {
            Some(doc) => Ok(Some(queries::document_to_object(&doc)?)),
            None => Ok(None),
        }
    }

    /// Public counterpart to [`Repository::find_object`], used by service
    /// methods that already hold a resolved `ParsedPath`.
    pub async fn find_object_at(&self, ws_uuid: &str, path: &str, name: &str) -> Result<Option<ObjectRecord>> {
        self.find_object(ws_uuid, path, name).await
    }

    /// A cheap clone of the filesystem body store, for callers (service
    /// methods, removal requests) that need to read or remove bodies directly.
    pub fn fs_handle(&self) -> FsBodyStore {
        self.fs.clone()
    }

    /// Looks up the metadata for `wspath`, which may address either a
    /// workspace root or an object within one. `Ok(None)` means "not found".
    pub async fn lookup_object_meta(&self, wspath: &WSPath) -> Result<Option<ObjectMeta>> {
        let Some(ws) = &wspath.workspace else {
            return Ok(None);
        };
        if wspath.parsed.is_workspace_only() {
            return Ok(Some(workspace_to_meta(ws)));
        }
        match self.find_object(&ws.uuid, &wspath.parsed.path, &wspath.parsed.name).await? {
            Some(obj) => Ok(Some(object_to_meta(&obj, ws))),
            None => Ok(None),
        }
    }

    /// Returns metadata for every object under `wspath`, honoring the
    /// non-recursive (exact path match) / recursive (`^path($|/)`) query
    /// shape and the directory/object exclusion flags.
    pub async fn list_objects(&self, wspath: &WSPath, exclude_dirs: bool, exclude_objects: bool, recursive: bool) -> Result<Vec<ObjectMeta>> {
        let Some(ws) = &wspath.workspace else {
            return Ok(Vec::new());
        };
        let full_path = wspath.full_path();
        let filter = if recursive {
            doc! {
                "workspace_uuid": &ws.uuid,
                "path": Regex { pattern: format!("^{}($|/)", regex_escape(&full_path)), options: String::new() },
            }
        } else {
            doc! { "workspace_uuid": &ws.uuid, "path": &full_path }
        };
        let records = self.find_objects(filter).await?;
        Ok(records
            .into_iter()
            .filter(|obj| if obj.is_folder() { !exclude_dirs } else { !exclude_objects })
            .map(|obj| object_to_meta(&obj, ws))
            .collect())
    }

    async fn find_objects(&self, filter: Document) -> Result<Vec<ObjectRecord>> {
        use futures::stream::TryStreamExt;
        let mut cursor = self.objects.find(filter).await.map_err(db_err)?;
        let mut out = Vec::new();
        while let Some(doc) = cursor.try_next().await.map_err(db_err)? {
            out.push(queries::document_to_object(&doc)?);
        }
        Ok(out)
    }

    /// Returns metadata for every workspace `caller` has any non-`none`
    /// access to, optionally restricted to `owner_filter` (when non-empty).
    pub async fn list_workspaces(&self, caller: Option<&str>, owner_filter: &str) -> Result<Vec<ObjectMeta>> {
        use futures::stream::TryStreamExt;
        let filter = if owner_filter.is_empty() { doc! {} } else { doc! { "owner": owner_filter } };
        let mut cursor = self.workspaces.find(filter).await.map_err(db_err)?;
        let mut out = Vec::new();
        while let Some(doc) = cursor.try_next().await.map_err(db_err)? {
            let ws = queries::document_to_workspace(&doc)?;
            let has_access = Some(ws.owner.as_str()) == caller
                || caller.is_some_and(|u| ws.user_permission.contains_key(u))
                || ws.global_permission != Permission::None;
            if has_access {
                out.push(workspace_to_meta(&ws));
            }
        }
        Ok(out)
    }

    /// Inserts a new workspace record and creates its filesystem root.
    pub async fn create_workspace(&self, owner: &str, name: &str, creation_time: &str, global_permission: Permission) -> Result<WorkspaceRecord> {
        let ws = WorkspaceRecord {
            uuid: new_uuid(),
            owner: owner.to_string(),
            name: name.to_string(),
            creation_time: creation_time.to_string(),
            global_permission,
            user_permission: HashMap::new(),
            metadata: HashMap::new(),
        };
        self.workspaces.insert_one(queries::workspace_to_document(&ws)).await.map_err(db_err)?;
        self.fs.create_dir_all(Path::new(owner).join(name).as_path()).await.map_err(|e| Error::new(ErrorKind::BackingStore, e))?;
        Ok(ws)
    }

    /// Inserts a new object record, materializing its filesystem or blob
    /// body as appropriate. `data` is ignored for folder-kind and
    /// blob-backed objects.
    #[allow(clippy::too_many_arguments)]
    pub async fn create_workspace_object(
        &self,
        ws: &WorkspaceRecord,
        parsed: &ParsedPath,
        object_type: &str,
        owner: &str,
        creation_time: &str,
        data: Option<Vec<u8>>,
        shock_url: Option<String>,
        user_metadata: HashMap<String, String>,
    ) -> Result<ObjectRecord> {
        let is_folder = matches!(object_type, "folder" | "modelfolder");
        let rel = object_rel_path(ws, &parsed.path, &parsed.name);
        let mut size = 0u64;
        let file_path = if is_folder {
            self.fs.create_dir_all(&rel).await.map_err(|e| Error::new(ErrorKind::BackingStore, e))?;
            None
        } else if shock_url.is_none() {
            let bytes = data.unwrap_or_default();
            size = bytes.len() as u64;
            self.fs.write_atomic(&rel, bytes).await.map_err(|e| Error::new(ErrorKind::BackingStore, e))?;
            Some(rel.to_string_lossy().to_string())
        } else {
            None
        };
        let obj = ObjectRecord {
            uuid: new_uuid(),
            workspace_uuid: ws.uuid.clone(),
            path: parsed.path.clone(),
            name: parsed.name.clone(),
            object_type: object_type.to_string(),
            owner: owner.to_string(),
            creation_time: creation_time.to_string(),
            size,
            user_metadata,
            auto_metadata: HashMap::new(),
            file_path,
            shock_url,
        };
        self.objects.insert_one(queries::object_to_document(&obj)).await.map_err(db_err)?;
        Ok(obj)
    }

    /// Copies `from` into `to_ws` at `to_parsed`, owned by `new_owner`. For
    /// filesystem bodies the underlying file is duplicated; blob bodies
    /// share their `shock_url` with no reference counting (§9 Open Question).
    pub async fn copy_workspace_object(&self, from: &ObjectRecord, to_ws: &WorkspaceRecord, to_parsed: &ParsedPath, new_owner: &str, creation_time: &str) -> Result<ObjectRecord> {
        let rel = object_rel_path(to_ws, &to_parsed.path, &to_parsed.name);
        let (file_path, size) = if from.is_folder() {
            self.fs.create_dir_all(&rel).await.map_err(|e| Error::new(ErrorKind::BackingStore, e))?;
            (None, 0)
        } else if let Some(src) = &from.file_path {
            let len = self.fs.copy(Path::new(src), &rel).await.map_err(|e| Error::new(ErrorKind::BackingStore, e))?;
            (Some(rel.to_string_lossy().to_string()), len)
        } else {
            (None, from.size)
        };
        let obj = ObjectRecord {
            uuid: new_uuid(),
            workspace_uuid: to_ws.uuid.clone(),
            path: to_parsed.path.clone(),
            name: to_parsed.name.clone(),
            object_type: from.object_type.clone(),
            owner: new_owner.to_string(),
            creation_time: creation_time.to_string(),
            size,
            user_metadata: from.user_metadata.clone(),
            auto_metadata: from.auto_metadata.clone(),
            file_path,
            shock_url: from.shock_url.clone(),
        };
        self.objects.insert_one(queries::object_to_document(&obj)).await.map_err(db_err)?;
        Ok(obj)
    }

    /// Deletes `obj`'s record and queues its body onto `removal`.
    pub async fn remove_workspace_object(&self, obj: &ObjectRecord, removal: &mut RemovalRequest) -> Result<()> {
        self.objects.delete_one(doc! { "uuid": &obj.uuid }).await.map_err(db_err)?;
        if let Some(path) = &obj.file_path {
            removal.add_file(path.clone());
        }
        if let Some(url) = &obj.shock_url {
            removal.add_blob_url(url.clone());
        }
        Ok(())
    }

    /// Removes a folder object after asserting it has no children.
    pub async fn remove_workspace_folder_only(&self, ws_uuid: &str, folder: &ObjectRecord, removal: &mut RemovalRequest) -> Result<()> {
        let full_path = if folder.path.is_empty() { folder.name.clone() } else { format!("{}/{}", folder.path, folder.name) };
        let child_filter = doc! {
            "workspace_uuid": ws_uuid,
            "path": Regex { pattern: format!("^{}($|/)", regex_escape(&full_path)), options: String::new() },
        };
        if self.objects.find_one(child_filter).await.map_err(db_err)?.is_some() {
            return Err(Error::from(ErrorKind::FolderNotEmpty));
        }
        self.remove_workspace_object(folder, removal).await
    }

    /// Removes a folder and every descendant, post-order (deepest first),
    /// so a child is always removed before its parent.
    pub async fn remove_workspace_folder_and_contents(&self, ws_uuid: &str, folder: &ObjectRecord, removal: &mut RemovalRequest) -> Result<()> {
        let full_path = if folder.path.is_empty() { folder.name.clone() } else { format!("{}/{}", folder.path, folder.name) };
        let filter = doc! {
            "workspace_uuid": ws_uuid,
            "path": Regex { pattern: format!("^{}($|/)", regex_escape(&full_path)), options: String::new() },
        };
        let mut descendants = self.find_objects(filter).await?;
        descendants.sort_by_key(|o| std::cmp::Reverse(o.path.matches('/').count() + if o.path.is_empty() { 0 } else { 1 }));
        for descendant in &descendants {
            self.remove_workspace_object(descendant, removal).await?;
        }
        self.remove_workspace_object(folder, removal).await
    }

    /// Updates `obj`'s type/creation_time/user_metadata, refusing to flip
    /// folder-kind-ness (P3).
    pub async fn update_object(
        &self,
        obj: &ObjectRecord,
        new_type: Option<String>,
        new_time: Option<String>,
        new_metadata: Option<HashMap<String, String>>,
        append: bool,
    ) -> Result<ObjectRecord> {
        let mut updated = obj.clone();
        if let Some(t) = new_type {
            let was_folder = obj.is_folder();
            let will_be_folder = matches!(t.as_str(), "folder" | "modelfolder");
            if was_folder != will_be_folder {
                return Err(Error::from(ErrorKind::Conflict));
            }
            updated.object_type = t;
        }
        if let Some(t) = new_time {
            updated.creation_time = t;
        }
        if let Some(md) = new_metadata {
            if append {
                updated.user_metadata.extend(md);
            } else {
                updated.user_metadata = md;
            }
        }
        self.objects
            .update_one(
                doc! { "uuid": &obj.uuid },
                doc! { "$set": {
                    "type": &updated.object_type,
                    "creation_time": &updated.creation_time,
                    "user_metadata": queries::string_map_to_document(&updated.user_metadata),
                } },
            )
            .await
            .map_err(db_err)?;
        Ok(updated)
    }

    /// Applies a permission update to the workspace at `ws`, per §4.3
    /// `update_permissions`'s authorization and mutation rules.
    pub async fn update_permissions(
        &self,
        ws: &WorkspaceRecord,
        caller: Option<&str>,
        admin_mode: bool,
        updates: Vec<(String, Permission)>,
        new_global: Option<Permission>,
    ) -> Result<WorkspaceRecord> {
        if !permissions::can_modify_permissions(ws, caller, admin_mode) {
            return Err(Error::from(ErrorKind::PermissionDenied));
        }
        if permissions::rejects_public_publish(ws, caller, new_global) {
            return Err(Error::from(ErrorKind::PermissionDenied));
        }
        let new_user_permission =
            permissions::apply_user_permissions(&ws.user_permission, &updates).map_err(|e| Error::new(ErrorKind::InvalidPath, std::io::Error::other(e)))?;
        let mut updated = ws.clone();
        updated.user_permission = new_user_permission;
        if let Some(g) = new_global {
            updated.global_permission = g;
        }
        self.workspaces
            .update_one(doc! { "uuid": &ws.uuid }, doc! { "$set": queries::workspace_to_document(&updated) })
            .await
            .map_err(db_err)?;
        Ok(updated)
    }

    /// Allocates a download ticket for `obj`, returning its key and the
    /// blob URLs (if any) whose ACL must be updated for the caller.
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_download_for_object(
        &self,
        full_path: &str,
        obj: &ObjectRecord,
        caller_token: Option<&str>,
        caller_token_valid: bool,
        service_token: &str,
        lifetime_secs: i64,
        now: i64,
    ) -> Result<(String, Vec<String>)> {
        let download_key = new_uuid();
        let token = if caller_token_valid { caller_token.unwrap_or(service_token).to_string() } else { service_token.to_string() };
        let ticket = DownloadTicket {
            download_key: download_key.clone(),
            workspace_path: full_path.to_string(),
            name: obj.name.clone(),
            size: obj.size,
            expiration_time: now + lifetime_secs,
            file_path: obj.file_path.clone(),
            shock_node: obj.shock_url.clone(),
            token: Some(token),
        };
        self.downloads.insert_one(queries::download_to_document(&ticket)).await.map_err(db_err)?;
        let mut shock_urls = Vec::new();
        if caller_token_valid {
            if let Some(url) = &obj.shock_url {
                shock_urls.push(url.clone());
            }
        }
        Ok((download_key, shock_urls))
    }

    /// Resolves a download ticket by its key.
    pub async fn lookup_download(&self, key: &str) -> Result<Option<DownloadTicket>> {
        match self.downloads.find_one(doc! { "download_key": key }).await.map_err(db_err)? {
            Some(doc) => Ok(Some(queries::document_to_download(&doc)?)),
            None => Ok(None),
        }
    }

    /// Writes back an observed size for `object_id`, used by the reconciler.
    pub async fn set_object_size(&self, object_id: &str, size: u64) -> Result<()> {
        self.objects.update_one(doc! { "uuid": object_id }, doc! { "$set": { "size": size as i64 } }).await.map_err(db_err)?;
        Ok(())
    }

    /// Looks up a single object record by its uuid (used by the reconciler,
    /// which only has an `object_id`, not a path).
    pub async fn find_object_by_id(&self, object_id: &str) -> Result<Option<ObjectRecord>> {
        match self.objects.find_one(doc! { "uuid": object_id }).await.map_err(db_err)? {
            Some(doc) => Ok(Some(queries::document_to_object(&doc)?)),
            None => Ok(None),
        }
    }

    /// Orchestrates `copy`: resolves both sides, recurses for folders
    /// (pre-order, parents before children), and gates non-folder copies on
    /// `overwrite` exactly as `create` does.
    pub async fn perform_copy(&self, from: &WSPath, to: &WSPath, recursive: bool, overwrite: bool, new_owner: &str, now: &str) -> Result<Vec<ObjectRecord>> {
        let (Some(from_ws), Some(to_ws)) = (&from.workspace, &to.workspace) else {
            return Err(Error::from(ErrorKind::NotFound));
        };
        let Some(src) = self.find_object(&from_ws.uuid, &from.parsed.path, &from.parsed.name).await? else {
            return Err(Error::from(ErrorKind::NotFound));
        };
        let existing_dst = self.find_object(&to_ws.uuid, &to.parsed.path, &to.parsed.name).await?;
        if let Some(dst) = &existing_dst {
            if src.is_folder() && !dst.is_folder() {
                return Err(Error::from(ErrorKind::Conflict));
            }
            if !src.is_folder() && !overwrite {
                return Err(Error::from(ErrorKind::Conflict));
            }
        }

        if src.is_folder() && recursive {
            let src_full = from.full_path();
            let dst_full = to.full_path();
            let filter = doc! {
                "workspace_uuid": &from_ws.uuid,
                "path": Regex { pattern: format!("^{}($|/)", regex_escape(&src_full)), options: String::new() },
            };
            let mut descendants = self.find_objects(filter).await?;
            descendants.sort_by_key(|o| o.path.matches('/').count() + if o.path.is_empty() { 0 } else { 1 });
            let mut created = vec![self.copy_workspace_object(&src, to_ws, &to.parsed, new_owner, now).await?];
            for descendant in descendants {
                let descendant_full = if descendant.path.is_empty() { descendant.name.clone() } else { format!("{}/{}", descendant.path, descendant.name) };
                let rewritten = rewrite_descendant(&descendant_full, &src_full, &dst_full);
                created.push(self.copy_workspace_object(&descendant, to_ws, &rewritten, new_owner, now).await?);
            }
            Ok(created)
        } else {
            Ok(vec![self.copy_workspace_object(&src, to_ws, &to.parsed, new_owner, now).await?])
        }
    }

    /// Orchestrates `move`: copy then delete of the source subtree, per the
    /// Open Question resolution in DESIGN.md.
    pub async fn perform_move(&self, from: &WSPath, to: &WSPath, overwrite: bool, new_owner: &str, now: &str) -> Result<Vec<ObjectRecord>> {
        let copied = self.perform_copy(from, to, true, overwrite, new_owner, now).await?;
        let Some(from_ws) = &from.workspace else {
            return Err(Error::from(ErrorKind::NotFound));
        };
        let Some(src) = self.find_object(&from_ws.uuid, &from.parsed.path, &from.parsed.name).await? else {
            return Err(Error::from(ErrorKind::NotFound));
        };
        let mut removal = RemovalRequest::new();
        if src.is_folder() {
            self.remove_workspace_folder_and_contents(&from_ws.uuid, &src, &mut removal).await?;
        } else {
            self.remove_workspace_object(&src, &mut removal).await?;
        }
        removal.execute(&self.fs, None).await;
        Ok(copied)
    }
}

fn rewrite_descendant(descendant_full: &str, from_full: &str, to_full: &str) -> ParsedPath {
    let rewritten = if let Some(rest) = descendant_full.strip_prefix(&format!("{from_full}/")) {
        if to_full.is_empty() {
            rest.to_string()
        } else {
            format!("{to_full}/{rest}")
        }
    } else {
        to_full.to_string()
    };
    let mut components: Vec<&str> = rewritten.split('/').filter(|s| !s.is_empty()).collect();
    let name = components.pop().unwrap_or_default().to_string();
    ParsedPath { owner: String::new(), wsname: String::new(), path: components.join("/"), name }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn regex_escape_neutralizes_metacharacters() {
        assert_eq!(regex_escape("a.b"), "a\\.b");
        assert_eq!(regex_escape("plain"), "plain");
    }

    #[test]
    fn object_rel_path_joins_owner_wsname_path_name() {
        let ws = WorkspaceRecord {
            uuid: "w1".into(),
            owner: "alice".into(),
            name: "docs".into(),
            creation_time: String::new(),
            global_permission: Permission::None,
            user_permission: HashMap::new(),
            metadata: HashMap::new(),
        };
        let rel = object_rel_path(&ws, "a/b", "c.txt");
        assert_eq!(rel, PathBuf::from("alice/docs/a/b/c.txt"));
    }

    #[test]
    fn user_has_permission_honors_admin_mode_override() {
        let ws = WorkspaceRecord {
            uuid: "w1".into(),
            owner: "alice".into(),
            name: "docs".into(),
            creation_time: String::new(),
            global_permission: Permission::None,
            user_permission: HashMap::new(),
            metadata: HashMap::new(),
        };
        assert!(!user_has_permission(&ws, Some("bob"), Permission::Write, false));
        assert!(user_has_permission(&ws, Some("bob"), Permission::Write, true));
    }

    #[test]
    fn rewrite_descendant_relocates_under_new_root() {
        let rewritten = rewrite_descendant("src/a/b.txt", "src", "dst");
        assert_eq!(rewritten.path, "dst/a");
        assert_eq!(rewritten.name, "b.txt");
    }
}
