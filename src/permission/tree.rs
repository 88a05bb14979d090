//! Permission tree with tri-state check propagation.
//!
//! Nodes live in an arena indexed by permission id, so building is linear
//! and a toggle costs the size of the toggled subtree plus its depth.

use log::{debug, warn};
use serde::Serialize;
use std::collections::HashMap;

use crate::models::permission::{Permission, PermissionNode};
use crate::utils::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    Unchecked,
    Checked,
    Indeterminate,
}

#[derive(Debug, Clone)]
struct Entry {
    permission: Permission,
    parent: Option<usize>,
    children: Vec<usize>,
    state: CheckState,
}

#[derive(Debug, Clone)]
pub struct PermissionTree {
    entries: Vec<Entry>,
    index: HashMap<u64, usize>,
    roots: Vec<usize>,
}

impl PermissionTree {
    /// Build from the flat parent-pointer list. Children keep list order.
    /// A parent id that is not in the list makes the node a root.
    pub fn build(permissions: Vec<Permission>) -> AppResult<Self> {
        let mut index = HashMap::with_capacity(permissions.len());
        for (pos, permission) in permissions.iter().enumerate() {
            if index.insert(permission.id, pos).is_some() {
                return Err(AppError::PermissionError(format!(
                    "duplicate permission id {}",
                    permission.id
                )));
            }
        }

        let mut entries: Vec<Entry> = permissions
            .into_iter()
            .map(|permission| Entry {
                permission,
                parent: None,
                children: Vec::new(),
                state: CheckState::Unchecked,
            })
            .collect();

        let mut roots = Vec::new();
        for pos in 0..entries.len() {
            let parent = match entries[pos].permission.parent() {
                None => None,
                Some(parent_id) => match index.get(&parent_id) {
                    Some(&parent_pos) => Some(parent_pos),
                    None => {
                        warn!(
                            "Permission {} references unknown parent {}, treating as root",
                            entries[pos].permission.id, parent_id
                        );
                        None
                    }
                },
            };
            match parent {
                Some(parent_pos) => {
                    entries[pos].parent = Some(parent_pos);
                    entries[parent_pos].children.push(pos);
                }
                None => roots.push(pos),
            }
        }

        let tree = Self { entries, index, roots };
        let reachable = tree.preorder().count();
        if reachable != tree.entries.len() {
            return Err(AppError::PermissionError(format!(
                "permission list contains a parent cycle ({} of {} nodes reachable)",
                reachable,
                tree.entries.len()
            )));
        }
        debug!("Built permission tree: {} nodes, {} roots", tree.entries.len(), tree.roots.len());
        Ok(tree)
    }

    fn position(&self, id: u64) -> AppResult<usize> {
        self.index
            .get(&id)
            .copied()
            .ok_or_else(|| AppError::not_found("permission", id))
    }

    fn preorder(&self) -> impl Iterator<Item = usize> + '_ {
        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();
        std::iter::from_fn(move || {
            let pos = stack.pop()?;
            stack.extend(self.entries[pos].children.iter().rev().copied());
            Some(pos)
        })
    }

    fn subtree(&self, pos: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = vec![pos];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.entries[current].children.iter().copied());
        }
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_leaf(&self, id: u64) -> bool {
        self.index
            .get(&id)
            .map(|&pos| self.entries[pos].children.is_empty())
            .unwrap_or(false)
    }

    pub fn state(&self, id: u64) -> AppResult<CheckState> {
        Ok(self.entries[self.position(id)?].state)
    }

    /// Toggle a node: the state is forced onto every descendant, then every
    /// ancestor is recomputed from its direct children.
    pub fn set_checked(&mut self, id: u64, checked: bool) -> AppResult<()> {
        let pos = self.position(id)?;
        let state = if checked { CheckState::Checked } else { CheckState::Unchecked };
        for node in self.subtree(pos) {
            self.entries[node].state = state;
        }

        let mut current = self.entries[pos].parent;
        while let Some(parent) = current {
            self.entries[parent].state = self.aggregate(parent);
            current = self.entries[parent].parent;
        }
        Ok(())
    }

    /// No checked or partial child: unchecked. All children checked: checked.
    /// Anything else: indeterminate.
    ///
    /// A partial child counts even when no sibling is checked, so a grandparent
    /// of a single checked leaf shows as partial rather than unchecked. Only
    /// the display differs from a plain checked-children count; grants are
    /// read from the leaves either way.
    fn aggregate(&self, pos: usize) -> CheckState {
        let children = &self.entries[pos].children;
        let checked = children
            .iter()
            .filter(|&&c| self.entries[c].state == CheckState::Checked)
            .count();
        let partial = children
            .iter()
            .any(|&c| self.entries[c].state == CheckState::Indeterminate);

        if checked == children.len() {
            CheckState::Checked
        } else if checked == 0 && !partial {
            CheckState::Unchecked
        } else {
            CheckState::Indeterminate
        }
    }

    /// Reset the tree and check the given grant. Only leaf ids are honoured;
    /// folder states follow from their leaves.
    pub fn check_granted(&mut self, ids: &[u64]) {
        for entry in &mut self.entries {
            entry.state = CheckState::Unchecked;
        }
        for &id in ids {
            if !self.index.contains_key(&id) {
                warn!("Ignoring grant of unknown permission {}", id);
                continue;
            }
            if !self.is_leaf(id) {
                debug!("Ignoring grant of folder permission {}", id);
                continue;
            }
            // the id was just checked against the index
            let _ = self.set_checked(id, true);
        }
    }

    /// Ids of checked leaves in tree order; the list that gets saved
    pub fn granted_ids(&self) -> Vec<u64> {
        self.preorder()
            .filter(|&pos| {
                let entry = &self.entries[pos];
                entry.children.is_empty() && entry.state == CheckState::Checked
            })
            .map(|pos| self.entries[pos].permission.id)
            .collect()
    }

    /// Reduce a submitted grant to the leaf ids it actually covers
    pub fn normalize_grant(&mut self, ids: &[u64]) -> Vec<u64> {
        self.check_granted(ids);
        self.granted_ids()
    }

    fn render(&self, pos: usize) -> PermissionNode {
        let entry = &self.entries[pos];
        PermissionNode {
            id: entry.permission.id,
            name: entry.permission.name.clone(),
            code: entry.permission.code.clone(),
            kind: entry.permission.kind.clone(),
            parent_id: entry.permission.parent(),
            checked: entry.state == CheckState::Checked,
            indeterminate: entry.state == CheckState::Indeterminate,
            children: entry.children.iter().map(|&c| self.render(c)).collect(),
        }
    }

    /// Nested nodes for display
    pub fn to_nodes(&self) -> Vec<PermissionNode> {
        self.roots.iter().map(|&pos| self.render(pos)).collect()
    }
}
