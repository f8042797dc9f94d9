//! Selectors that turn a `data/<i>` node of a one-file dataset into the
//! pieces a model consumes.

use std::collections::BTreeMap;

use crate::container::{Array, Group, Node};

use super::{DataSetError, Result};

fn as_group<'a>(node: &'a Node, what: &str) -> Result<&'a Group> {
    node.as_group()
        .ok_or_else(|| DataSetError::MissingMember(format!("{what} (expected a group)")))
}

fn member<'a>(grp: &'a Group, key: &str) -> Result<&'a Node> {
    grp.get(key)
        .ok_or_else(|| DataSetError::MissingMember(key.to_string()))
}

/// Pick the datasets `keys` of a group, in the given order.
#[derive(Debug, Clone)]
pub struct GroupListSelector {
    pub keys: Vec<String>,
}

impl GroupListSelector {
    pub fn new<S: Into<String>>(keys: impl IntoIterator<Item = S>) -> Self {
        GroupListSelector {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn apply(&self, node: &Node) -> Result<Vec<Array>> {
        let grp = as_group(node, "sample")?;
        self.keys
            .iter()
            .map(|key| {
                member(grp, key)?
                    .as_dataset()
                    .cloned()
                    .ok_or_else(|| DataSetError::MissingMember(format!("{key} (expected a dataset)")))
            })
            .collect()
    }
}

/// Owned copy of a whole sample node.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupToDict;

impl GroupToDict {
    pub fn apply(&self, node: &Node) -> Node {
        node.clone()
    }
}

/// Which members to keep: a list of leaves, or a per-member sub-selection.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Keys(Vec<String>),
    Nested(BTreeMap<String, Selection>),
}

impl Selection {
    pub fn keys<S: Into<String>>(keys: impl IntoIterator<Item = S>) -> Self {
        Selection::Keys(keys.into_iter().map(Into::into).collect())
    }
}

/// Pruned copy of a group holding only the selected members.
#[derive(Debug, Clone)]
pub struct GroupToDictSelector {
    pub selection: Selection,
}

impl GroupToDictSelector {
    pub fn new(selection: Selection) -> Self {
        GroupToDictSelector { selection }
    }

    pub fn apply(&self, node: &Node) -> Result<Group> {
        select(as_group(node, "sample")?, &self.selection)
    }
}

fn select(grp: &Group, selection: &Selection) -> Result<Group> {
    let mut out = Group::new();
    match selection {
        Selection::Keys(keys) => {
            for key in keys {
                out.insert(key.as_str(), member(grp, key)?.clone())?;
            }
        }
        Selection::Nested(children) => {
            for (key, sub) in children {
                let child = as_group(member(grp, key)?, key)?;
                out.insert(key.as_str(), select(child, sub)?)?;
            }
        }
    }
    Ok(out)
}
