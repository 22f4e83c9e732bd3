#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Directed edge between two items, unique per `(src_item_pid, dst_item_pid)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReference {
    pub src_item_pid: i64,
    pub dst_item_pid: i64,
    pub reference_type: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkRequest {
    pub item_id: i64,
    pub reference_type: String,
}

impl LinkRequest {
    pub fn new(item_id: i64, reference_type: impl Into<String>) -> Self {
        Self {
            item_id,
            reference_type: reference_type.into(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReferenceDelta {
    pub created: Vec<ItemReference>,
    pub updated: Vec<ItemReference>,
    /// Destination pids whose edge from the source must be removed.
    pub deleted: Vec<i64>,
}

impl ReferenceDelta {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// Treats `desired` as the complete outgoing edge set of `src_item_pid` and
/// diffs it against `current`. A target listed twice keeps its last type.
pub fn plan_reference_delta(
    src_item_pid: i64,
    current: &[ItemReference],
    desired: &[LinkRequest],
) -> ReferenceDelta {
    let mut resolved: Vec<LinkRequest> = Vec::with_capacity(desired.len());
    for request in desired {
        match resolved.iter_mut().find(|r| r.item_id == request.item_id) {
            Some(existing) => existing.reference_type = request.reference_type.clone(),
            None => resolved.push(request.clone()),
        }
    }

    let stored: BTreeMap<i64, &str> = current
        .iter()
        .filter(|edge| edge.src_item_pid == src_item_pid)
        .map(|edge| (edge.dst_item_pid, edge.reference_type.as_str()))
        .collect();
    let mut unconsumed: Vec<i64> = current
        .iter()
        .filter(|edge| edge.src_item_pid == src_item_pid)
        .map(|edge| edge.dst_item_pid)
        .collect();

    let mut delta = ReferenceDelta::default();
    for request in resolved {
        let edge = ItemReference {
            src_item_pid,
            dst_item_pid: request.item_id,
            reference_type: request.reference_type,
        };
        match stored.get(&edge.dst_item_pid) {
            Some(stored_type) => {
                unconsumed.retain(|dst| *dst != edge.dst_item_pid);
                if *stored_type != edge.reference_type {
                    delta.updated.push(edge);
                }
            }
            None => delta.created.push(edge),
        }
    }
    delta.deleted = unconsumed;
    delta
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(src: i64, dst: i64, reference_type: &str) -> ItemReference {
        ItemReference {
            src_item_pid: src,
            dst_item_pid: dst,
            reference_type: reference_type.to_string(),
        }
    }

    #[test]
    fn computes_create_update_delete() {
        let current = vec![edge(1, 2, "1"), edge(1, 3, "2")];
        let desired = vec![LinkRequest::new(2, "2"), LinkRequest::new(4, "3")];

        let delta = plan_reference_delta(1, &current, &desired);
        assert_eq!(delta.updated, vec![edge(1, 2, "2")]);
        assert_eq!(delta.deleted, vec![3]);
        assert_eq!(delta.created, vec![edge(1, 4, "3")]);
    }

    #[test]
    fn unchanged_edges_produce_no_work() {
        let current = vec![edge(7, 8, "isSupplementTo")];
        let desired = vec![LinkRequest::new(8, "isSupplementTo")];
        assert!(plan_reference_delta(7, &current, &desired).is_empty());
    }

    #[test]
    fn empty_desired_deletes_everything() {
        let current = vec![edge(1, 2, "a"), edge(1, 3, "b")];
        let delta = plan_reference_delta(1, &current, &[]);
        assert_eq!(delta.deleted, vec![2, 3]);
        assert!(delta.created.is_empty() && delta.updated.is_empty());
    }

    #[test]
    fn duplicate_targets_resolve_to_last_entry() {
        let current = vec![edge(1, 2, "a")];
        let desired = vec![
            LinkRequest::new(5, "x"),
            LinkRequest::new(2, "b"),
            LinkRequest::new(5, "y"),
        ];
        let delta = plan_reference_delta(1, &current, &desired);
        assert_eq!(delta.created, vec![edge(1, 5, "y")]);
        assert_eq!(delta.updated, vec![edge(1, 2, "b")]);
        assert!(delta.deleted.is_empty());
    }

    #[test]
    fn edges_of_other_sources_are_ignored() {
        let current = vec![edge(9, 2, "a")];
        let delta = plan_reference_delta(1, &current, &[LinkRequest::new(2, "a")]);
        assert_eq!(delta.created, vec![edge(1, 2, "a")]);
        assert!(delta.deleted.is_empty());
    }
}
