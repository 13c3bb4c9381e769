use std::fmt;

use crate::{object::NodeId, path::Path};

/// Pushes the value of a variable, or the read count of a container, onto
/// the evaluation stack.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableReference {
    pub name: String,
    path_for_count: Option<Path>,
    pub(crate) container_for_count: Option<NodeId>,
}

impl VariableReference {
    pub fn new(name: &str) -> Self {
        VariableReference {
            name: name.to_string(),
            path_for_count: None,
            container_for_count: None,
        }
    }

    pub fn from_path_for_count(path_for_count: &str) -> Self {
        VariableReference {
            name: String::new(),
            path_for_count: Some(Path::new_with_components_string(path_for_count)),
            container_for_count: None,
        }
    }

    pub fn get_path_for_count(&self) -> Option<&Path> {
        self.path_for_count.as_ref()
    }
}

impl fmt::Display for VariableReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path_for_count {
            Some(path) => write!(f, "read_count({path})"),
            None => write!(f, "var({})", self.name),
        }
    }
}
