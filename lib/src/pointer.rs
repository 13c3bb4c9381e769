use crate::{
    container::ContentTree,
    object::NodeId,
    path::{Component, Path},
};

pub const NULL: Pointer = Pointer::new(None, -1);

/// Execution position: a container plus an index into its content. An index
/// of -1 designates the container itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pointer {
    pub container: Option<NodeId>,
    pub index: i32,
}

impl Pointer {
    pub const fn new(container: Option<NodeId>, index: i32) -> Pointer {
        Pointer { container, index }
    }

    pub fn start_of(container: NodeId) -> Pointer {
        Pointer {
            container: Some(container),
            index: 0,
        }
    }

    pub fn is_null(&self) -> bool {
        self.container.is_none()
    }

    /// Node the pointer designates.
    pub fn resolve(&self, tree: &ContentTree) -> Option<NodeId> {
        let container_id = self.container?;
        let container = tree.container(container_id)?;

        if self.index < 0 || container.content.is_empty() {
            return Some(container_id);
        }

        container.content.get(self.index as usize).copied()
    }

    pub fn get_path(&self, tree: &ContentTree) -> Option<Path> {
        let container = self.container?;
        let container_path = tree.path_of(container);

        if self.index >= 0 {
            Some(container_path.path_by_appending_component(Component::Index(self.index as usize)))
        } else {
            Some(container_path.clone())
        }
    }

    pub fn describe(&self, tree: &ContentTree) -> String {
        match self.container {
            Some(c) => format!("Pointer -> {} -- index {}", tree.path_of(c), self.index),
            None => "Pointer (null)".to_owned(),
        }
    }
}
