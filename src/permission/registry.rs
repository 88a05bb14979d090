use dashmap::DashMap;
use log::info;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::models::permission::{Permission, PermissionNode, Role};
use crate::permission::tree::PermissionTree;
use crate::utils::error::{AppError, AppResult};

/// Permission catalogue and role grants served by `/api/permission` and
/// `/api/role`
pub struct PermissionRegistry {
    catalogue: Vec<Permission>,
    roles: DashMap<u64, Role>,
    next_role_id: AtomicU64,
}

impl PermissionRegistry {
    /// Create a registry; the catalogue must form a valid tree
    pub fn new(catalogue: Vec<Permission>) -> AppResult<Self> {
        PermissionTree::build(catalogue.clone())?;
        Ok(Self {
            catalogue,
            roles: DashMap::new(),
            next_role_id: AtomicU64::new(1),
        })
    }

    /// Registry seeded with the console's menu catalogue and built-in roles
    pub fn with_defaults() -> AppResult<Self> {
        let registry = Self::new(default_catalogue())?;
        let all_leaves = registry.tree()?.normalize_grant(
            &registry.catalogue.iter().map(|p| p.id).collect::<Vec<_>>(),
        );
        registry.create_role("超级管理员", Some("Full access"), &all_leaves)?;
        registry.create_role("运维人员", Some("Log and inventory operator"), &[111, 112, 113, 211])?;
        Ok(registry)
    }

    pub fn permissions(&self) -> &[Permission] {
        &self.catalogue
    }

    /// Fresh, fully unchecked tree
    pub fn tree(&self) -> AppResult<PermissionTree> {
        PermissionTree::build(self.catalogue.clone())
    }

    pub fn list_roles(&self) -> Vec<Role> {
        let mut roles: Vec<Role> = self.roles.iter().map(|r| r.value().clone()).collect();
        roles.sort_by_key(|r| r.id);
        roles
    }

    pub fn get_role(&self, id: u64) -> AppResult<Role> {
        self.roles
            .get(&id)
            .map(|r| r.value().clone())
            .ok_or_else(|| AppError::not_found("role", id))
    }

    pub fn create_role(&self, name: &str, description: Option<&str>, grant: &[u64]) -> AppResult<Role> {
        let permission_ids = self.tree()?.normalize_grant(grant);
        let id = self.next_role_id.fetch_add(1, Ordering::SeqCst);
        let role = Role {
            id,
            name: name.to_string(),
            description: description.map(str::to_string),
            permission_ids,
        };
        self.roles.insert(id, role.clone());
        info!("Created role {} '{}' with {} permissions", id, name, role.permission_ids.len());
        Ok(role)
    }

    /// Tree with the role's grant checked in
    pub fn role_tree(&self, id: u64) -> AppResult<Vec<PermissionNode>> {
        let role = self.get_role(id)?;
        let mut tree = self.tree()?;
        tree.check_granted(&role.permission_ids);
        Ok(tree.to_nodes())
    }

    /// Replace a role's grant; folder ids are dropped
    pub fn grant(&self, id: u64, permission_ids: &[u64]) -> AppResult<Role> {
        let normalized = self.tree()?.normalize_grant(permission_ids);
        let mut role = self
            .roles
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("role", id))?;
        role.permission_ids = normalized;
        info!("Role {} now holds {} permissions", id, role.permission_ids.len());
        Ok(role.clone())
    }
}

fn default_catalogue() -> Vec<Permission> {
    vec![
        Permission::new(1, "日志管理", "log", "menu", Some(0)),
        Permission::new(11, "日志查询", "log:query", "menu", Some(1)),
        Permission::new(111, "查看日志", "log:query:view", "button", Some(11)),
        Permission::new(112, "保存过滤器", "log:filter:save", "button", Some(11)),
        Permission::new(113, "删除过滤器", "log:filter:delete", "button", Some(11)),
        Permission::new(2, "资产管理", "asset", "menu", Some(0)),
        Permission::new(21, "组件管理", "asset:component", "menu", Some(2)),
        Permission::new(211, "查看组件", "asset:component:view", "button", Some(21)),
        Permission::new(212, "启停组件", "asset:component:operate", "button", Some(21)),
        Permission::new(3, "系统设置", "system", "menu", Some(0)),
        Permission::new(31, "用户管理", "system:user", "menu", Some(3)),
        Permission::new(311, "新增用户", "system:user:add", "button", Some(31)),
        Permission::new(312, "编辑用户", "system:user:edit", "button", Some(31)),
        Permission::new(32, "角色管理", "system:role", "menu", Some(3)),
        Permission::new(321, "分配权限", "system:role:grant", "button", Some(32)),
        Permission::new(33, "系统配置", "system:config", "menu", Some(3)),
        Permission::new(34, "数据备份", "system:backup", "menu", Some(3)),
    ]
}
