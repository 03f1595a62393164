//! Parent/child structure within one collection

use super::entity::Entity;
use std::collections::HashSet;
use tracing::debug;

/// Ids of every record transitively below `root`.
///
/// Ordered deepest level first, so every record comes before its parent.
/// `root` itself is not included. Cycles terminate: each id is visited once.
pub fn descendants<T: Entity>(records: &[T], root: &str) -> Vec<String> {
    let mut visited: HashSet<&str> = HashSet::from([root]);
    let mut frontier: Vec<&str> = vec![root];
    let mut levels: Vec<Vec<String>> = Vec::new();

    while !frontier.is_empty() {
        let next: Vec<&str> = records
            .iter()
            .filter(|r| r.parent_id().is_some_and(|p| frontier.contains(&p)))
            .map(|r| r.id())
            .filter(|id| visited.insert(*id))
            .collect();
        if next.is_empty() {
            break;
        }
        levels.push(next.iter().map(|id| id.to_string()).collect());
        frontier = next;
    }

    levels.into_iter().rev().flatten().collect()
}

/// The full delete set for `root`: descendants first, `root` last.
pub fn delete_order<T: Entity>(records: &[T], root: &str) -> Vec<String> {
    let mut order = descendants(records, root);
    order.push(root.to_string());
    order
}

/// Direct children of `parent`
pub fn children<'a, T: Entity>(records: &'a [T], parent: &str) -> Vec<&'a T> {
    records
        .iter()
        .filter(|r| r.parent_id() == Some(parent))
        .collect()
}

/// Resolve a parent reference against `records`.
///
/// Returns the reference only if it names an existing record other than
/// `own_id`.
pub fn resolve_parent<T: Entity>(records: &[T], own_id: &str, parent: Option<&str>) -> Option<String> {
    let parent = parent?;
    if parent == own_id || !records.iter().any(|r| r.id() == parent) {
        debug!(kind = %T::KIND, id = %own_id, %parent, "clearing dangling parent reference");
        return None;
    }
    Some(parent.to_string())
}

/// Clear every parent reference that does not resolve within `records`.
pub fn validate_parents<T: Entity>(mut records: Vec<T>) -> Vec<T> {
    if !T::HIERARCHICAL {
        return records;
    }
    let dangling: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| {
            r.parent_id().is_some()
                && resolve_parent(&records, r.id(), r.parent_id()).is_none()
        })
        .map(|(i, _)| i)
        .collect();
    for i in dangling {
        records[i].set_parent_id(None);
    }
    records
}
