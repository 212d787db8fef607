//! Pure authorization and mutation logic for `set_permissions` (§4.3
//! `update_permissions`), kept separate from the document-store
//! orchestration in [`super::Repository::update_permissions`] so the rules
//! themselves are unit-testable without a database.

use std::collections::HashMap;
use ws_core::{Permission, WorkspaceRecord};

/// True if `caller` may modify `ws`'s permissions, either directly (not
/// `public`, caller has `admin`) or under the public-workspace carve-out
/// (only the owner or an admin-mode caller may touch a public workspace).
pub fn can_modify_permissions(ws: &WorkspaceRecord, caller: Option<&str>, admin_mode: bool) -> bool {
    if admin_mode {
        return true;
    }
    if ws.global_permission == Permission::Public {
        return caller == Some(ws.owner.as_str());
    }
    ws.effective_permission(caller) >= Permission::Admin
}

/// True if `new_global == Public` is being requested but the caller is not
/// literally the workspace owner. Admin permission does not substitute for
/// ownership here: only the owner may make a workspace public.
pub fn rejects_public_publish(ws: &WorkspaceRecord, caller: Option<&str>, new_global: Option<Permission>) -> bool {
    matches!(new_global, Some(Permission::Public)) && caller != Some(ws.owner.as_str())
}

/// Applies a batch of `(user, permission)` updates to `existing`, deleting
/// any entry whose new value is `None` and rejecting any attempt to set a
/// user's permission to `Public` (a user-overlay entry may never be
/// `public` or `owner`).
pub fn apply_user_permissions(existing: &HashMap<String, Permission>, updates: &[(String, Permission)]) -> Result<HashMap<String, Permission>, &'static str> {
    let mut result = existing.clone();
    for (user, perm) in updates {
        if *perm == Permission::Public || *perm == Permission::Owner {
            return Err("user permission cannot be set to public or owner");
        }
        if *perm == Permission::None {
            result.remove(user);
        } else {
            result.insert(user.clone(), *perm);
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ws(global: Permission) -> WorkspaceRecord {
        WorkspaceRecord {
            uuid: "w1".into(),
            owner: "alice".into(),
            name: "docs".into(),
            creation_time: "2026-01-01T00:00:00Z".into(),
            global_permission: global,
            user_permission: HashMap::new(),
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn public_workspace_only_modifiable_by_owner_or_admin_mode() {
        let w = ws(Permission::Public);
        assert!(can_modify_permissions(&w, Some("alice"), false));
        assert!(!can_modify_permissions(&w, Some("bob"), false));
        assert!(can_modify_permissions(&w, Some("bob"), true));
    }

    #[test]
    fn non_public_workspace_requires_admin_rank() {
        let mut w = ws(Permission::Read);
        w.user_permission.insert("bob".to_string(), Permission::Admin);
        assert!(can_modify_permissions(&w, Some("bob"), false));
        w.user_permission.insert("carol".to_string(), Permission::Write);
        assert!(!can_modify_permissions(&w, Some("carol"), false));
    }

    #[test]
    fn public_publish_requires_literal_owner_not_admin_mode() {
        let w = ws(Permission::Read);
        assert!(rejects_public_publish(&w, Some("bob"), Some(Permission::Public)));
        assert!(!rejects_public_publish(&w, Some("alice"), Some(Permission::Public)));
        assert!(!rejects_public_publish(&w, Some("bob"), Some(Permission::Write)));
    }

    #[test]
    fn apply_user_permissions_deletes_none_and_rejects_public() {
        let mut existing = HashMap::new();
        existing.insert("bob".to_string(), Permission::Read);
        let updated = apply_user_permissions(&existing, &[("bob".to_string(), Permission::None), ("carol".to_string(), Permission::Write)]).unwrap();
        assert!(!updated.contains_key("bob"));
        assert_eq!(updated.get("carol"), Some(&Permission::Write));

        let err = apply_user_permissions(&existing, &[("dave".to_string(), Permission::Public)]).unwrap_err();
        assert_eq!(err, "user permission cannot be set to public or owner");
    }
}
