//! Service methods (C6): one async function per JSON-RPC method, each
//! orchestrating the path parser (C1), the metadata repository (C3), the
//! blob-store client (C4) and the pending-upload set (C5) under the lane
//! its contract names (§4.6).

use crate::config::ServiceConfig;
use crate::db::{user_has_permission, Repository};
use crate::lanes::{GeneralLane, SerializationLane};
use crate::reconciler::PendingUploads;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{instrument, warn};
use ws_auth_token::{AuthToken, SigningCertCache};
use ws_blob_shock::ShockClient;
use ws_core::{has_valid_name, Error, ErrorKind, ObjectMeta, ObjectRecord, Permission, Result};

/// Per-request identity and elevation, resolved by the dispatcher (C7)
/// before any service method runs.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// The authenticated caller's user id, if the presented token validated.
    pub caller: Option<String>,
    /// True once an `adminmode=true` request has been granted (caller is on `adminlist`).
    pub admin_mode: bool,
    /// The caller's raw bearer token, retained so it can be embedded in download tickets.
    pub token: Option<AuthToken>,
    /// True if `token` validated (signature + expiry); mirrors the dispatcher's policy outcome.
    pub token_valid: bool,
}

impl RequestContext {
    fn caller_token_text(&self) -> Option<&str> {
        if self.token_valid {
            self.token.as_ref().map(AuthToken::token)
        } else {
            None
        }
    }
}

/// A single entry of the `create` request's `objects` array.
pub struct CreateSpec {
    /// Full workspace path of the object to create.
    pub path: String,
    /// Requested type string, canonicalized against the whitelist before use.
    pub object_type: String,
    /// User-supplied metadata to attach.
    pub user_metadata: HashMap<String, String>,
    /// Inline body bytes, when not blob-backed.
    pub data: Option<Vec<u8>>,
    /// Caller-supplied creation time; defaults to now.
    pub creation_time: Option<String>,
}

/// A single entry of the `update_metadata`/`update_auto_meta` request's `objects` array.
pub struct UpdateSpec {
    /// Path of the object to update.
    pub path: String,
    /// New metadata, merged or replacing per `append`.
    pub user_metadata: Option<HashMap<String, String>>,
    /// New type, refused if it would flip folder-kind-ness.
    pub object_type: Option<String>,
    /// New creation_time.
    pub creation_time: Option<String>,
}

/// Bundles every component a service method needs, held by `Arc` and cloned
/// cheaply per request (§9 "global service state via shared pointers").
#[derive(Clone)]
pub struct Service {
    config: Arc<ServiceConfig>,
    repo: Repository,
    general: GeneralLane,
    serialization: SerializationLane,
    shock: Option<ShockClient>,
    pending: PendingUploads,
    cert_cache: Arc<SigningCertCache>,
}

impl Service {
    /// Assembles a service instance from its already-constructed components.
    pub fn new(
        config: Arc<ServiceConfig>,
        repo: Repository,
        general: GeneralLane,
        serialization: SerializationLane,
        shock: Option<ShockClient>,
        pending: PendingUploads,
        cert_cache: Arc<SigningCertCache>,
    ) -> Service {
        Service {
            config,
            repo,
            general,
            serialization,
            shock,
            pending,
            cert_cache,
        }
    }

    /// Validates `token`, if present, against the signing-cert cache,
    /// producing the request context the rest of dispatch uses.
    pub async fn authenticate(&self, token: Option<AuthToken>, admin_requested: bool, now: i64) -> RequestContext {
        let mut token_valid = false;
        let mut caller = None;
        if let Some(tok) = &token {
            if self.cert_cache.validate(tok, now).await {
                token_valid = true;
                caller = tok.user().map(str::to_string);
            }
        }
        let admin_mode = admin_requested && caller.as_deref().is_some_and(|u| self.config.user_is_admin(u));
        if admin_mode {
            warn!(caller = ?caller, "admin-mode elevation granted");
        }
        RequestContext { caller, admin_mode, token, token_valid }
    }

    /// `create`: canonicalizes each spec's type, synthesizes missing
    /// intermediate folders, and creates (or upload-node-registers) the
    /// target object, all under the serialization lane.
    #[instrument(skip(self, ctx, specs))]
    pub async fn create(
        &self,
        ctx: &RequestContext,
        specs: Vec<CreateSpec>,
        create_upload_nodes: bool,
        overwrite: bool,
        permission: Option<Permission>,
        setowner: Option<String>,
        now: &str,
    ) -> Vec<ObjectMeta> {
        let repo = self.repo.clone();
        let caller = ctx.caller.clone();
        let admin_mode = ctx.admin_mode;
        let owner_override = if admin_mode { setowner } else { None };
        let now = now.to_string();
        let config = self.config.clone();
        let shock = self.shock.clone();
        let pending = self.pending.clone();
        let caller_token = ctx.caller_token_text().map(str::to_string);

        self.serialization
            .run(async move {
                let mut out = Vec::with_capacity(specs.len());
                for spec in specs {
                    let result = create_one(
                        &repo, &config, &shock, &pending, &caller, admin_mode, &caller_token, &owner_override, create_upload_nodes, overwrite, permission, &now, spec,
                    )
                    .await;
                    out.push(match result {
                        Ok(meta) => meta,
                        Err(err) => ObjectMeta::error_meta(err.to_string()),
                    });
                }
                out
            })
            .await
            .unwrap_or_else(|err| vec![ObjectMeta::error_meta(err.to_string())])
    }

    /// `delete`: removes each path's object (recursively, if it's a folder
    /// and `force` is set), running the general DB lane, then executes the
    /// accumulated removal request.
    #[instrument(skip(self, ctx, paths))]
    pub async fn delete(&self, ctx: &RequestContext, paths: Vec<String>, delete_directories: bool, force: bool) -> Vec<ObjectMeta> {
        let repo = self.repo.clone();
        let caller = ctx.caller.clone();
        let admin_mode = ctx.admin_mode;
        let mut out = Vec::with_capacity(paths.len());
        let mut removal = crate::db::RemovalRequest::new();
        for path in paths {
            let repo = repo.clone();
            let caller = caller.clone();
            let result = self
                .general
                .run(async move { delete_one(&repo, &caller, admin_mode, delete_directories, force, &path).await })
                .await;
            match result {
                Ok((meta, req)) => {
                    removal.extend(req);
                    out.push(meta);
                }
                Err(err) => out.push(ObjectMeta::error_meta(err.to_string())),
            }
        }
        if !removal.is_empty() {
            removal.execute(&self.repo_fs(), self.shock.as_ref()).await;
        }
        out
    }

    fn repo_fs(&self) -> ws_sbe_fs::FsBodyStore {
        self.repo.fs_handle()
    }

    /// `copy`/`move`: resolves both sides and recurses for folders, under the serialization lane.
    #[instrument(skip(self, ctx, pairs))]
    pub async fn copy(&self, ctx: &RequestContext, pairs: Vec<(String, String)>, recursive: bool, overwrite: bool, is_move: bool, now: &str) -> Vec<ObjectMeta> {
        let repo = self.repo.clone();
        let caller = ctx.caller.clone();
        let admin_mode = ctx.admin_mode;
        let now = now.to_string();
        self.serialization
            .run(async move {
                let mut out = Vec::with_capacity(pairs.len());
                for (from_str, to_str) in pairs {
                    let result = copy_one(&repo, &caller, admin_mode, &from_str, &to_str, recursive, overwrite, is_move, &now).await;
                    out.push(match result {
                        Ok(metas) => metas.into_iter().next().unwrap_or_else(|| ObjectMeta::error_meta("copy produced no result".to_string())),
                        Err(err) => ObjectMeta::error_meta(err.to_string()),
                    });
                }
                out
            })
            .await
            .unwrap_or_else(|err| vec![ObjectMeta::error_meta(err.to_string())])
    }

    /// `ls`: lists workspaces or objects, depending on how much of each path resolved.
    #[instrument(skip(self, ctx, paths))]
    pub async fn ls(&self, ctx: &RequestContext, paths: Vec<String>, exclude_dirs: bool, exclude_objects: bool, recursive: bool) -> HashMap<String, Vec<ObjectMeta>> {
        let caller = ctx.caller.clone();
        let mut out = HashMap::with_capacity(paths.len());
        for path in paths {
            let repo = self.repo.clone();
            let caller = caller.clone();
            let path_for_result = path.clone();
            let entries = self
                .general
                .run(async move { ls_one(&repo, &caller, &path, exclude_dirs, exclude_objects, recursive).await })
                .await;
            out.insert(path_for_result, entries);
        }
        out
    }

    /// `get`: looks up each path's metadata, requiring read, and inlines
    /// filesystem-backed bodies; grants blob ACL access for blob-backed ones.
    #[instrument(skip(self, ctx, paths))]
    pub async fn get(&self, ctx: &RequestContext, paths: Vec<String>, metadata_only: bool) -> Vec<(ObjectMeta, Option<Vec<u8>>)> {
        let caller = ctx.caller.clone();
        let caller_token = ctx.caller_token_text().map(str::to_string);
        let mut out = Vec::with_capacity(paths.len());
        for path in paths {
            let repo = self.repo.clone();
            let caller = caller.clone();
            let caller_token = caller_token.clone();
            let shock = self.shock.clone();
            let result = self.general.run(async move { get_one(&repo, &shock, &caller, &caller_token, &path, metadata_only).await }).await;
            out.push(result.unwrap_or_else(|err| (ObjectMeta::error_meta(err.to_string()), None)));
        }
        out
    }

    /// `list_permissions`: returns `[global, value]` plus per-user rows when the caller can read.
    #[instrument(skip(self, ctx, paths))]
    pub async fn list_permissions(&self, ctx: &RequestContext, paths: Vec<String>) -> HashMap<String, Vec<(String, String)>> {
        let caller = ctx.caller.clone();
        let admin_mode = ctx.admin_mode;
        let mut out = HashMap::with_capacity(paths.len());
        for path in paths {
            let repo = self.repo.clone();
            let caller = caller.clone();
            let path_for_key = path.clone();
            let rows = self.general.run(async move { list_permissions_one(&repo, &caller, admin_mode, &path).await }).await;
            out.insert(path_for_key, rows);
        }
        out
    }

    /// `set_permissions`: a single workspace's permission update, under the serialization lane.
    #[instrument(skip(self, ctx))]
    pub async fn set_permissions(&self, ctx: &RequestContext, path: String, updates: Vec<(String, Permission)>, new_global: Option<Permission>) -> bool {
        let repo = self.repo.clone();
        let caller = ctx.caller.clone();
        let admin_mode = ctx.admin_mode;
        self.serialization
            .run(async move { set_permissions_one(&repo, &caller, admin_mode, &path, updates, new_global).await.is_ok() })
            .await
            .unwrap_or(false)
    }

    /// `get_download_url`: allocates a ticket per path and ACLs any blob nodes for the caller.
    #[instrument(skip(self, ctx, paths))]
    pub async fn get_download_url(&self, ctx: &RequestContext, paths: Vec<String>) -> Vec<String> {
        let caller = ctx.caller.clone();
        let caller_token = ctx.caller_token_text().map(str::to_string);
        let service_token = self.service_token().await;
        let mut out = Vec::with_capacity(paths.len());
        let mut shock_urls: Vec<String> = Vec::new();
        for path in paths {
            let repo = self.repo.clone();
            let caller = caller.clone();
            let caller_token = caller_token.clone();
            let service_token = service_token.clone();
            let lifetime = self.config.download_lifetime_secs();
            let base = self.config.download_url_base().map(str::to_string);
            let result = self
                .general
                .run(async move { download_url_one(&repo, &caller, &caller_token, &service_token, lifetime, base.as_deref(), &path).await })
                .await;
            match result {
                Ok((url, urls)) => {
                    out.push(url);
                    shock_urls.extend(urls);
                }
                Err(_) => out.push(String::new()),
            }
        }
        if let Some(shock) = &self.shock {
            for url in shock_urls {
                if let (Some(token), Some(user)) = (service_token.as_deref(), caller.as_deref()) {
                    if let Err(err) = shock.add_acl_user(&url, token, user).await {
                        warn!(blob_url = %url, error = %err, "failed to grant download ACL");
                    }
                }
            }
        }
        out
    }

    async fn service_token(&self) -> Option<String> {
        self.config.wsuser().zip(self.config.wspassword()).map(|(u, _)| u.to_string())
    }

    /// `update_metadata`: applies type/time/metadata changes to each object, under the serialization lane.
    #[instrument(skip(self, ctx, specs))]
    pub async fn update_metadata(&self, ctx: &RequestContext, specs: Vec<UpdateSpec>, append: bool) -> Vec<ObjectMeta> {
        let repo = self.repo.clone();
        let caller = ctx.caller.clone();
        let admin_mode = ctx.admin_mode;
        self.serialization
            .run(async move {
                let mut out = Vec::with_capacity(specs.len());
                for spec in specs {
                    let result = update_metadata_one(&repo, &caller, admin_mode, append, spec).await;
                    out.push(match result {
                        Ok(meta) => meta,
                        Err(err) => ObjectMeta::error_meta(err.to_string()),
                    });
                }
                out
            })
            .await
            .unwrap_or_else(|err| vec![ObjectMeta::error_meta(err.to_string())])
    }

    /// `update_auto_meta`: forces a synchronous reconciliation pass for each named object, then re-reads its metadata.
    #[instrument(skip(self, ctx, paths))]
    pub async fn update_auto_meta(&self, ctx: &RequestContext, paths: Vec<String>) -> Vec<ObjectMeta> {
        let caller = ctx.caller.clone();
        let mut out = Vec::with_capacity(paths.len());
        for path in paths {
            let repo = self.repo.clone();
            let caller = caller.clone();
            let shock = self.shock.clone();
            let pending = self.pending.clone();
            let serialization = self.serialization.clone();
            let result = self
                .general
                .run(async move { update_auto_meta_one(&repo, &shock, &pending, &serialization, &caller, &path).await })
                .await;
            out.push(result.unwrap_or_else(|err| ObjectMeta::error_meta(err.to_string())));
        }
        out
    }
}

#[allow(clippy::too_many_arguments)]
async fn create_one(
    repo: &Repository,
    config: &ServiceConfig,
    shock: &Option<ShockClient>,
    pending: &PendingUploads,
    caller: &Option<String>,
    admin_mode: bool,
    caller_token: &Option<String>,
    owner_override: &Option<String>,
    create_upload_nodes: bool,
    overwrite: bool,
    permission: Option<Permission>,
    now: &str,
    spec: CreateSpec,
) -> Result<ObjectMeta> {
    let canonical_type = ServiceConfig::canonicalize_type(&spec.object_type).to_string();
    if !config.is_known_type(&canonical_type) {
        return Err(Error::from(ErrorKind::UnknownType));
    }
    let object_type = canonical_type;
    let is_folder = matches!(object_type.as_str(), "folder" | "modelfolder");
    let wspath = repo.parse_path(&spec.path).await?;
    if wspath.parsed.is_root() || wspath.parsed.wsname.is_empty() {
        return Err(Error::from(ErrorKind::InvalidPath));
    }

    let ws = match &wspath.workspace {
        Some(ws) => ws.clone(),
        None => {
            if !has_valid_name(&wspath.parsed.wsname) || !is_folder {
                return Err(Error::from(ErrorKind::InvalidPath));
            }
            let can_own = caller.as_deref() == Some(wspath.parsed.owner.as_str()) || admin_mode;
            if !can_own {
                return Err(Error::from(ErrorKind::PermissionDenied));
            }
            repo.create_workspace(&wspath.parsed.owner, &wspath.parsed.wsname, now, permission.unwrap_or(Permission::None)).await?
        }
    };

    if wspath.parsed.is_workspace_only() {
        return repo.lookup_object_meta(&wspath).await?.ok_or_else(|| Error::from(ErrorKind::NotFound));
    }

    if !user_has_permission(&ws, caller.as_deref(), Permission::Write, admin_mode) {
        return Err(Error::from(ErrorKind::PermissionDenied));
    }

    let existing = repo.find_object_at(&ws.uuid, &wspath.parsed.path, &wspath.parsed.name).await?;
    if let Some(existing) = &existing {
        let existing_is_folder = existing.is_folder();
        if existing_is_folder && is_folder {
            return Ok(repo.lookup_object_meta(&wspath).await?.unwrap_or_else(|| ObjectMeta::error_meta("not found".to_string())));
        }
        if existing_is_folder != is_folder {
            return Err(Error::from(ErrorKind::Conflict));
        }
        if !overwrite {
            return Err(Error::from(ErrorKind::Conflict));
        }
    }

    ensure_parent_chain(repo, &ws, &wspath.parsed.path, caller, admin_mode, now).await?;

    let owner = owner_override.clone().or_else(|| caller.clone()).unwrap_or_else(|| ws.owner.clone());

    let mut shock_url = None;
    if create_upload_nodes {
        let shock = shock.as_ref().ok_or_else(|| Error::from(ErrorKind::BlobStore))?;
        let service_token = caller_token.clone().unwrap_or_default();
        let object_uuid = uuid::Uuid::new_v4().to_string();
        let node_id = shock.create_node(&service_token, &object_uuid).await.map_err(|e| Error::new(ErrorKind::BlobStore, e))?;
        if let Some(user) = caller.as_deref() {
            shock.add_acl_user(&node_id, &service_token, user).await.map_err(|e| Error::new(ErrorKind::BlobStore, e))?;
        }
        pending.insert(object_uuid, node_id.clone(), service_token);
        shock_url = Some(node_id);
    }

    if let Some(old) = existing {
        let mut removal = crate::db::RemovalRequest::new();
        repo.remove_workspace_object(&old, &mut removal).await?;
        removal.execute(&repo.fs_handle(), shock.as_ref()).await;
    }

    repo.create_workspace_object(&ws, &wspath.parsed, &object_type, &owner, now, spec.data, shock_url, spec.user_metadata)
        .await?;
    repo.lookup_object_meta(&wspath).await?.ok_or_else(|| Error::from(ErrorKind::Internal))
}

async fn ensure_parent_chain(repo: &Repository, ws: &ws_core::WorkspaceRecord, path: &str, caller: &Option<String>, admin_mode: bool, now: &str) -> Result<()> {
    if path.is_empty() {
        return Ok(());
    }
    let components: Vec<&str> = path.split('/').collect();
    let mut built = String::new();
    for component in components {
        let parsed = ws_core::ParsedPath {
            owner: ws.owner.clone(),
            wsname: ws.name.clone(),
            path: built.clone(),
            name: component.to_string(),
        };
        if repo.find_object_at(&ws.uuid, &built, component).await?.is_none() {
            let owner = caller.clone().unwrap_or_else(|| ws.owner.clone());
            let _ = admin_mode;
            repo.create_workspace_object(ws, &parsed, "folder", &owner, now, None, None, HashMap::new()).await?;
        }
        built = if built.is_empty() { component.to_string() } else { format!("{built}/{component}") };
    }
    Ok(())
}

async fn delete_one(repo: &Repository, caller: &Option<String>, admin_mode: bool, delete_directories: bool, force: bool, path: &str) -> Result<(ObjectMeta, crate::db::RemovalRequest)> {
    let wspath = repo.parse_path(path).await?;
    let ws = wspath.workspace.clone().ok_or_else(|| Error::from(ErrorKind::NotFound))?;
    if !user_has_permission(&ws, caller.as_deref(), Permission::Write, admin_mode) {
        return Err(Error::from(ErrorKind::PermissionDenied));
    }
    let Some(obj) = repo.find_object_at(&ws.uuid, &wspath.parsed.path, &wspath.parsed.name).await? else {
        return Err(Error::from(ErrorKind::NotFound));
    };
    let meta = object_meta_snapshot(&obj, &ws);
    let mut removal = crate::db::RemovalRequest::new();
    if obj.is_folder() {
        if !delete_directories {
            return Err(Error::from(ErrorKind::FolderNotEmpty));
        }
        if force {
            repo.remove_workspace_folder_and_contents(&ws.uuid, &obj, &mut removal).await?;
        } else {
            repo.remove_workspace_folder_only(&ws.uuid, &obj, &mut removal).await?;
        }
    } else {
        repo.remove_workspace_object(&obj, &mut removal).await?;
    }
    Ok((meta, removal))
}

async fn copy_one(repo: &Repository, caller: &Option<String>, admin_mode: bool, from_str: &str, to_str: &str, recursive: bool, overwrite: bool, is_move: bool, now: &str) -> Result<Vec<ObjectMeta>> {
    let from = repo.parse_path(from_str).await?;
    let to = repo.parse_path(to_str).await?;
    let from_ws = from.workspace.clone().ok_or_else(|| Error::from(ErrorKind::NotFound))?;
    let to_ws = to.workspace.clone().ok_or_else(|| Error::from(ErrorKind::NotFound))?;
    if !user_has_permission(&from_ws, caller.as_deref(), Permission::Read, admin_mode) {
        return Err(Error::from(ErrorKind::PermissionDenied));
    }
    if !user_has_permission(&to_ws, caller.as_deref(), Permission::Write, admin_mode) {
        return Err(Error::from(ErrorKind::PermissionDenied));
    }
    let owner = caller.clone().unwrap_or_else(|| to_ws.owner.clone());
    let records = if is_move {
        repo.perform_move(&from, &to, overwrite, &owner, now).await?
    } else {
        repo.perform_copy(&from, &to, recursive, overwrite, &owner, now).await?
    };
    Ok(records.iter().map(|rec| object_meta_snapshot(rec, &to_ws)).collect())
}

async fn ls_one(repo: &Repository, caller: &Option<String>, path: &str, exclude_dirs: bool, exclude_objects: bool, recursive: bool) -> Vec<ObjectMeta> {
    let Ok(wspath) = repo.parse_path(path).await else {
        return Vec::new();
    };
    if wspath.parsed.is_root() {
        return repo.list_workspaces(caller.as_deref(), "").await.unwrap_or_default();
    }
    if wspath.parsed.wsname.is_empty() {
        return repo.list_workspaces(caller.as_deref(), &wspath.parsed.owner).await.unwrap_or_default();
    }
    let Some(ws) = &wspath.workspace else {
        return Vec::new();
    };
    if !user_has_permission(ws, caller.as_deref(), Permission::Read, false) {
        return Vec::new();
    }
    repo.list_objects(&wspath, exclude_dirs, exclude_objects, recursive).await.unwrap_or_default()
}

async fn get_one(repo: &Repository, shock: &Option<ShockClient>, caller: &Option<String>, caller_token: &Option<String>, path: &str, metadata_only: bool) -> Result<(ObjectMeta, Option<Vec<u8>>)> {
    let wspath = repo.parse_path(path).await?;
    let ws = wspath.workspace.clone().ok_or_else(|| Error::from(ErrorKind::NotFound))?;
    if !user_has_permission(&ws, caller.as_deref(), Permission::Read, false) {
        return Err(Error::from(ErrorKind::PermissionDenied));
    }
    let meta = repo.lookup_object_meta(&wspath).await?.ok_or_else(|| Error::from(ErrorKind::NotFound))?;
    if metadata_only || wspath.parsed.is_workspace_only() {
        return Ok((meta, None));
    }
    let Some(obj) = repo.find_object_at(&ws.uuid, &wspath.parsed.path, &wspath.parsed.name).await? else {
        return Ok((meta, None));
    };
    if let Some(file_path) = &obj.file_path {
        let data = repo.fs_handle().read(std::path::Path::new(file_path)).await.map_err(|e| Error::new(ErrorKind::BackingStore, e))?;
        return Ok((meta, Some(data)));
    }
    if let (Some(shock), Some(node_url)) = (shock, &obj.shock_url) {
        if let Some(token) = caller_token {
            shock.add_acl_user(node_url, token, caller.as_deref().unwrap_or_default()).await.map_err(|e| Error::new(ErrorKind::BlobStore, e))?;
        }
    }
    Ok((meta, None))
}

async fn list_permissions_one(repo: &Repository, caller: &Option<String>, admin_mode: bool, path: &str) -> Vec<(String, String)> {
    let Ok(wspath) = repo.parse_path(path).await else {
        return Vec::new();
    };
    let Some(ws) = &wspath.workspace else {
        return Vec::new();
    };
    if !user_has_permission(ws, caller.as_deref(), Permission::Read, admin_mode) {
        return Vec::new();
    }
    let mut rows = vec![("*".to_string(), ws.global_permission.to_wire().to_string())];
    rows.extend(ws.user_permission.iter().map(|(u, p)| (u.clone(), p.to_wire().to_string())));
    rows
}

async fn set_permissions_one(repo: &Repository, caller: &Option<String>, admin_mode: bool, path: &str, updates: Vec<(String, Permission)>, new_global: Option<Permission>) -> Result<()> {
    let wspath = repo.parse_path(path).await?;
    let ws = wspath.workspace.clone().ok_or_else(|| Error::from(ErrorKind::NotFound))?;
    repo.update_permissions(&ws, caller.as_deref(), admin_mode, updates, new_global).await?;
    Ok(())
}

async fn download_url_one(
    repo: &Repository,
    caller: &Option<String>,
    caller_token: &Option<String>,
    service_token: &Option<String>,
    lifetime_secs: i64,
    base: Option<&str>,
    path: &str,
) -> Result<(String, Vec<String>)> {
    let wspath = repo.parse_path(path).await?;
    let ws = wspath.workspace.clone().ok_or_else(|| Error::from(ErrorKind::NotFound))?;
    if !user_has_permission(&ws, caller.as_deref(), Permission::Read, false) {
        return Err(Error::from(ErrorKind::PermissionDenied));
    }
    let Some(obj) = repo.find_object_at(&ws.uuid, &wspath.parsed.path, &wspath.parsed.name).await? else {
        return Err(Error::from(ErrorKind::NotFound));
    };
    let now = chrono::Utc::now().timestamp();
    let caller_token_valid = caller_token.is_some();
    let (key, urls) = repo
        .insert_download_for_object(&wspath.full_path(), &obj, caller_token.as_deref(), caller_token_valid, service_token.as_deref().unwrap_or_default(), lifetime_secs, now)
        .await?;
    let Some(base) = base else {
        return Ok((String::new(), urls));
    };
    let encoded_name: String = percent_encoding::utf8_percent_encode(&obj.name, percent_encoding::NON_ALPHANUMERIC).collect();
    Ok((format!("{}/{}/{}", base.trim_end_matches('/'), key, encoded_name), urls))
}

async fn update_metadata_one(repo: &Repository, caller: &Option<String>, admin_mode: bool, append: bool, spec: UpdateSpec) -> Result<ObjectMeta> {
    let wspath = repo.parse_path(&spec.path).await?;
    let ws = wspath.workspace.clone().ok_or_else(|| Error::from(ErrorKind::NotFound))?;
    if !user_has_permission(&ws, caller.as_deref(), Permission::Write, admin_mode) {
        return Err(Error::from(ErrorKind::PermissionDenied));
    }
    let Some(obj) = repo.find_object_at(&ws.uuid, &wspath.parsed.path, &wspath.parsed.name).await? else {
        return Err(Error::from(ErrorKind::NotFound));
    };
    repo.update_object(&obj, spec.object_type, spec.creation_time, spec.user_metadata, append).await?;
    repo.lookup_object_meta(&wspath).await?.ok_or_else(|| Error::from(ErrorKind::NotFound))
}

async fn update_auto_meta_one(repo: &Repository, shock: &Option<ShockClient>, pending: &PendingUploads, serialization: &SerializationLane, caller: &Option<String>, path: &str) -> Result<ObjectMeta> {
    let wspath = repo.parse_path(path).await?;
    let ws = wspath.workspace.clone().ok_or_else(|| Error::from(ErrorKind::NotFound))?;
    if !user_has_permission(&ws, caller.as_deref(), Permission::Read, false) {
        return Err(Error::from(ErrorKind::PermissionDenied));
    }
    let Some(obj) = repo.find_object_at(&ws.uuid, &wspath.parsed.path, &wspath.parsed.name).await? else {
        return Err(Error::from(ErrorKind::NotFound));
    };
    if let (Some(shock), Some(node_url)) = (shock, &obj.shock_url) {
        if let Some(upload) = pending.remove(&obj.uuid) {
            if let Ok(node) = shock.get_node(&upload.auth_token, node_url).await {
                if let Some(size) = node.get("file").and_then(|f| f.get("size")).and_then(serde_json::Value::as_u64) {
                    let repo = repo.clone();
                    let object_id = obj.uuid.clone();
                    let _ = serialization.run(async move { repo.set_object_size(&object_id, size).await }).await;
                }
            } else {
                pending.insert(obj.uuid.clone(), upload.shock_url.clone(), upload.auth_token.clone());
            }
        }
    }
    repo.lookup_object_meta(&wspath).await?.ok_or_else(|| Error::from(ErrorKind::NotFound))
}

fn object_meta_snapshot(obj: &ObjectRecord, ws: &ws_core::WorkspaceRecord) -> ObjectMeta {
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

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use ws_core::WorkspaceRecord;

    fn sample_ws() -> WorkspaceRecord {
        let mut user_permission = HashMap::new();
        user_permission.insert("bob".to_string(), Permission::Read);
        WorkspaceRecord {
            uuid: "ws-1".into(),
            owner: "alice".into(),
            name: "docs".into(),
            creation_time: "2026-01-01T00:00:00Z".into(),
            global_permission: Permission::None,
            user_permission,
            metadata: HashMap::new(),
        }
    }

    fn sample_object(is_folder: bool) -> ObjectRecord {
        ObjectRecord {
            uuid: "obj-1".into(),
            workspace_uuid: "ws-1".into(),
            path: "a".into(),
            name: "b.txt".into(),
            object_type: if is_folder { "folder".to_string() } else { "txt".to_string() },
            owner: "alice".into(),
            creation_time: "2026-01-01T00:00:00Z".into(),
            size: if is_folder { 0 } else { 5 },
            user_metadata: HashMap::new(),
            auto_metadata: HashMap::new(),
            file_path: None,
            shock_url: None,
        }
    }

    #[test]
    fn object_meta_snapshot_reflects_folder_kind_in_auto_metadata() {
        let ws = sample_ws();
        let file_meta = object_meta_snapshot(&sample_object(false), &ws);
        assert_eq!(file_meta.auto_metadata.get("is_folder"), Some(&"0".to_string()));
        assert_eq!(file_meta.size, 5);

        let folder_meta = object_meta_snapshot(&sample_object(true), &ws);
        assert_eq!(folder_meta.auto_metadata.get("is_folder"), Some(&"1".to_string()));
        assert_eq!(folder_meta.size, 0);
    }

    #[test]
    fn object_meta_snapshot_carries_the_workspace_permission_overlay() {
        let ws = sample_ws();
        let meta = object_meta_snapshot(&sample_object(false), &ws);
        assert_eq!(meta.user_permission.get("bob"), Some(&Permission::Read));
        assert_eq!(meta.global_permission, Permission::None);
        assert_eq!(meta.owner, "alice");
    }

    #[test]
    fn caller_token_text_is_none_when_token_failed_validation() {
        let ctx = RequestContext {
            caller: Some("alice".to_string()),
            admin_mode: false,
            token: Some(AuthToken::parse("un=alice|SigningSubject=https://sign|expiry=9999999999|sig=ab")),
            token_valid: false,
        };
        assert_eq!(ctx.caller_token_text(), None);
    }

    #[test]
    fn caller_token_text_returns_the_raw_token_once_validated() {
        let token = AuthToken::parse("un=alice|SigningSubject=https://sign|expiry=9999999999|sig=ab");
        let ctx = RequestContext {
            caller: Some("alice".to_string()),
            admin_mode: false,
            token: Some(token.clone()),
            token_valid: true,
        };
        assert_eq!(ctx.caller_token_text(), Some(token.token()));
    }

    #[test]
    fn default_request_context_is_anonymous_and_unprivileged() {
        let ctx = RequestContext::default();
        assert!(ctx.caller.is_none());
        assert!(!ctx.admin_mode);
        assert!(!ctx.token_valid);
        assert_eq!(ctx.caller_token_text(), None);
    }
}
