use serde::{Deserialize, Serialize};

/// Permission as listed by `/api/permission/list`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub id: u64,
    pub name: String,
    pub code: String,

    /// `menu`, `button`, `api` ...
    #[serde(rename = "type", default)]
    pub kind: String,

    /// `None` or `Some(0)` marks a root
    #[serde(default)]
    pub parent_id: Option<u64>,
}

impl Permission {
    pub fn new(id: u64, name: &str, code: &str, kind: &str, parent_id: Option<u64>) -> Self {
        Self {
            id,
            name: name.to_string(),
            code: code.to_string(),
            kind: kind.to_string(),
            parent_id,
        }
    }

    /// Parent id with the `0` root marker folded into `None`
    pub fn parent(&self) -> Option<u64> {
        self.parent_id.filter(|id| *id != 0)
    }
}

/// Rendered node of the permission tree with its derived check state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionNode {
    pub id: u64,
    pub name: String,
    pub code: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub parent_id: Option<u64>,
    pub checked: bool,
    pub indeterminate: bool,
    pub children: Vec<PermissionNode>,
}

/// Role with its granted (leaf) permissions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub permission_ids: Vec<u64>,
}

/// Body of `PUT /api/role/{id}/permissions`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantRequest {
    pub permission_ids: Vec<u64>,
}
