use crate::{container::ContentTree, object::NodeId};

/// Outcome of a path lookup. When part of the path could not be followed the
/// deepest node reached is returned and the result is flagged approximate.
#[derive(Debug, Clone, Copy)]
pub struct SearchResult {
    pub obj: Option<NodeId>,
    pub approximate: bool,
}

impl SearchResult {
    pub fn correct_obj(&self) -> Option<NodeId> {
        if self.approximate {
            None
        } else {
            self.obj
        }
    }

    pub fn container(&self, tree: &ContentTree) -> Option<NodeId> {
        self.obj.filter(|id| tree.container(*id).is_some())
    }
}
