use std::fmt;

const PARENT_ID: &str = "^";

/// Structural address of a node in the content tree.
///
/// Components are either child indices or names. Relative paths are written
/// with a leading dot (`.^.^.hello.5` is the file-system equivalent of
/// `../../hello/5`).
#[derive(Debug, Eq, PartialEq, Hash, Clone, Default)]
pub struct Path {
    components: Vec<Component>,
    is_relative: bool,
}

impl Path {
    pub fn new(components: &[Component], relative: bool) -> Path {
        Path {
            components: components.to_vec(),
            is_relative: relative,
        }
    }

    pub fn new_with_components_string(components_string: &str) -> Path {
        // Empty path, empty components
        // (path is to root, like "/" in file system)
        if components_string.is_empty() {
            return Path::default();
        }

        let (cs, is_relative) = match components_string.strip_prefix('.') {
            Some(rest) => (rest, true),
            None => (components_string, false),
        };

        let components = cs
            .split('.')
            .map(|s| match s.parse::<usize>() {
                Ok(index) => Component::Index(index),
                Err(_) => Component::Name(s.to_string()),
            })
            .collect();

        Path {
            components,
            is_relative,
        }
    }

    /// The relative path that points to the node itself.
    pub fn get_self() -> Path {
        Path {
            components: Vec::new(),
            is_relative: true,
        }
    }

    pub fn get_component(&self, index: usize) -> Option<&Component> {
        self.components.get(index)
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn is_relative(&self) -> bool {
        self.is_relative
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Path without its first component.
    pub fn get_tail(&self) -> Path {
        if self.components.len() >= 2 {
            Path::new(&self.components[1..], false)
        } else {
            Path::get_self()
        }
    }

    pub fn get_last_component(&self) -> Option<&Component> {
        self.components.last()
    }

    /// Path without its last component.
    pub fn get_parent(&self) -> Path {
        let len = self.components.len().saturating_sub(1);
        Path::new(&self.components[..len], self.is_relative)
    }

    pub fn path_by_appending_path(&self, path_to_append: &Path) -> Path {
        let upward_moves = path_to_append
            .components
            .iter()
            .take_while(|c| c.is_parent())
            .count();

        let keep = self.components.len().saturating_sub(upward_moves);

        let mut components: Vec<Component> = self.components[..keep].to_vec();
        components.extend_from_slice(&path_to_append.components[upward_moves..]);

        Path {
            components,
            is_relative: false,
        }
    }

    pub fn path_by_appending_component(&self, c: Component) -> Path {
        let mut p = Path::new(&self.components, false);
        p.components.push(c);
        p
    }

    pub fn get_components_string(&self) -> String {
        let joined = self
            .components
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<String>>()
            .join(".");

        if self.is_relative {
            format!(".{joined}")
        } else {
            joined
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get_components_string())
    }
}

#[derive(Debug, Eq, PartialEq, Hash, Clone)]
pub enum Component {
    Index(usize),
    Name(String),
}

impl Component {
    pub fn to_parent() -> Component {
        Component::Name(PARENT_ID.to_string())
    }

    pub fn is_index(&self) -> bool {
        matches!(self, Component::Index(_))
    }

    pub fn is_parent(&self) -> bool {
        matches!(self, Component::Name(name) if name == PARENT_ID)
    }

    pub fn index(&self) -> Option<usize> {
        match self {
            Component::Index(i) => Some(*i),
            Component::Name(_) => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Component::Index(_) => None,
            Component::Name(n) => Some(n),
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Index(index) => write!(f, "{index}"),
            Component::Name(name) => write!(f, "{name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_relative_path() {
        let p = Path::new_with_components_string(".^.^.hello.5");

        assert!(p.is_relative());
        assert_eq!(4, p.len());
        assert!(p.get_component(0).unwrap().is_parent());
        assert_eq!(Some(5), p.get_last_component().unwrap().index());
        assert_eq!(".^.^.hello.5", p.to_string());
    }

    #[test]
    fn relativity_takes_part_in_equality() {
        let a = Path::new_with_components_string("knot.0");
        let b = Path::new_with_components_string(".knot.0");

        assert_ne!(a, b);
        assert_eq!(a, Path::new_with_components_string("knot.0"));
    }

    #[test]
    fn append_path_consumes_parent_moves() {
        let base = Path::new_with_components_string("knot.stitch.2");
        let rel = Path::new_with_components_string(".^.^.other");

        assert_eq!("knot.other", base.path_by_appending_path(&rel).to_string());
    }

    #[test]
    fn empty_string_is_root() {
        let p = Path::new_with_components_string("");
        assert!(p.is_empty());
        assert!(!p.is_relative());
    }
}
