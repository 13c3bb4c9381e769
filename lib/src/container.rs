//! Containers and the arena that owns every node of a story's content.
use std::collections::HashMap;

use crate::{
    object::{Node, NodeId, NodeKind},
    path::{Component, Path},
    pointer::{self, Pointer},
    search_result::SearchResult,
    story_error::StoryError,
    value_type::ValueType,
};

pub const COUNTFLAGS_VISITS: i32 = 1;
pub const COUNTFLAGS_TURNS: i32 = 2;
pub const COUNTFLAGS_COUNTSTARTONLY: i32 = 4;

/// Ordered group of content. Named children are also indexed by name;
/// containers that are only reachable by name are in `named_content` alone.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Container {
    pub name: Option<String>,
    pub content: Vec<NodeId>,
    pub named_content: HashMap<String, NodeId>,
    pub visits_should_be_counted: bool,
    pub turn_index_should_be_counted: bool,
    pub counting_at_start_only: bool,
}

impl Container {
    pub fn new(name: Option<String>, count_flags: i32) -> Container {
        let mut c = Container {
            name,
            ..Default::default()
        };
        c.set_count_flags(count_flags);
        c
    }

    pub fn set_count_flags(&mut self, count_flags: i32) {
        self.visits_should_be_counted = (count_flags & COUNTFLAGS_VISITS) > 0;
        self.turn_index_should_be_counted = (count_flags & COUNTFLAGS_TURNS) > 0;
        self.counting_at_start_only = (count_flags & COUNTFLAGS_COUNTSTARTONLY) > 0;
    }

    pub fn get_count_flags(&self) -> i32 {
        let mut flags: i32 = 0;

        if self.visits_should_be_counted {
            flags |= COUNTFLAGS_VISITS;
        }

        if self.turn_index_should_be_counted {
            flags |= COUNTFLAGS_TURNS;
        }

        if self.counting_at_start_only {
            flags |= COUNTFLAGS_COUNTSTARTONLY;
        }

        // Counting at start only is meaningless without one of the others
        if flags == COUNTFLAGS_COUNTSTARTONLY {
            flags = 0;
        }

        flags
    }

    pub fn has_valid_name(&self) -> bool {
        self.name.as_ref().is_some_and(|n| !n.is_empty())
    }

    /// Named children that are not part of the ordered content, by name.
    pub fn get_named_only_content(&self) -> Vec<(&String, NodeId)> {
        let mut named_only: Vec<(&String, NodeId)> = self
            .named_content
            .iter()
            .filter(|(_, id)| !self.content.contains(id))
            .map(|(name, id)| (name, *id))
            .collect();

        named_only.sort();
        named_only
    }
}

/// Arena holding the static content of a story. Nodes are addressed by
/// [`NodeId`]; the root container is created first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContentTree {
    nodes: Vec<Node>,
    paths: Vec<Path>,
}

impl ContentTree {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_node(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(Node { parent: None, kind });
        NodeId(self.nodes.len() - 1)
    }

    fn set_parent(&mut self, container: NodeId, child: NodeId) -> Result<(), StoryError> {
        let node = &mut self.nodes[child.index()];

        if node.parent.is_some() {
            return Err(StoryError::Decode(
                "content is already in another container".to_owned(),
            ));
        }

        node.parent = Some(container);
        Ok(())
    }

    fn container_mut(&mut self, id: NodeId) -> Result<&mut Container, StoryError> {
        match &mut self.nodes[id.index()].kind {
            NodeKind::Container(c) => Ok(c),
            _ => Err(StoryError::Decode("expected a container".to_owned())),
        }
    }

    /// Appends `child` to the ordered content of `container`.
    pub(crate) fn add_content(&mut self, container: NodeId, child: NodeId) -> Result<(), StoryError> {
        self.set_parent(container, child)?;

        let child_name = self
            .container(child)
            .filter(|c| c.has_valid_name())
            .and_then(|c| c.name.clone());

        let c = self.container_mut(container)?;
        c.content.push(child);

        if let Some(name) = child_name {
            c.named_content.insert(name, child);
        }

        Ok(())
    }

    /// Adds a container reachable by name only.
    pub(crate) fn add_named_only_content(
        &mut self,
        container: NodeId,
        name: &str,
        child: NodeId,
    ) -> Result<(), StoryError> {
        match &mut self.nodes[child.index()].kind {
            NodeKind::Container(c) => c.name = Some(name.to_string()),
            _ => {
                return Err(StoryError::Decode(format!(
                    "named content '{name}' is not a container"
                )))
            }
        }

        self.set_parent(container, child)?;
        self.container_mut(container)?
            .named_content
            .insert(name.to_string(), child);

        Ok(())
    }

    /// Computes node paths and resolves every static target. Called once the
    /// whole tree has been added.
    pub(crate) fn link(&mut self) {
        self.compute_paths();

        let mut divert_targets = Vec::new();
        let mut choice_targets = Vec::new();
        let mut count_targets = Vec::new();

        for (i, node) in self.nodes.iter().enumerate() {
            let id = NodeId(i);
            match &node.kind {
                NodeKind::Divert(d) => {
                    if let Some(path) = d.get_target_path() {
                        divert_targets.push((id, self.divert_target_pointer(id, path)));
                    }
                }
                NodeKind::ChoicePoint(cp) => {
                    let target = self.resolve_path(id, cp.get_path_on_choice()).container(self);
                    choice_targets.push((id, target));
                }
                NodeKind::VariableReference(vr) => {
                    if let Some(path) = vr.get_path_for_count() {
                        count_targets.push((id, self.resolve_path(id, path).container(self)));
                    }
                }
                _ => {}
            }
        }

        for (id, target) in divert_targets {
            if let NodeKind::Divert(d) = &mut self.nodes[id.index()].kind {
                d.target_pointer = target;
            }
        }

        for (id, target) in choice_targets {
            if let NodeKind::ChoicePoint(cp) = &mut self.nodes[id.index()].kind {
                cp.choice_target = target;
            }
        }

        for (id, target) in count_targets {
            if let NodeKind::VariableReference(vr) = &mut self.nodes[id.index()].kind {
                vr.container_for_count = target;
            }
        }
    }

    fn compute_paths(&mut self) {
        let mut paths = vec![Path::default(); self.nodes.len()];

        if self.nodes.is_empty() {
            self.paths = paths;
            return;
        }

        let mut pending = vec![self.root()];

        while let Some(id) = pending.pop() {
            if let Some(c) = self.container(id) {
                for (i, child) in c.content.iter().enumerate() {
                    paths[child.index()] = paths[id.index()]
                        .path_by_appending_component(self.component_for(*child, i));
                    pending.push(*child);
                }

                for (name, child) in c.get_named_only_content() {
                    paths[child.index()] = paths[id.index()]
                        .path_by_appending_component(Component::Name(name.clone()));
                    pending.push(child);
                }
            }
        }

        self.paths = paths;
    }

    fn component_for(&self, child: NodeId, index: usize) -> Component {
        match self.container(child) {
            Some(c) if c.has_valid_name() => Component::Name(c.name.clone().unwrap_or_default()),
            _ => Component::Index(index),
        }
    }

    fn divert_target_pointer(&self, divert: NodeId, path: &Path) -> Option<Pointer> {
        match path.get_last_component()? {
            Component::Index(index) => {
                let container = self.resolve_path(divert, &path.get_parent()).container(self)?;
                Some(Pointer::new(Some(container), *index as i32))
            }
            Component::Name(_) => {
                let container = self.resolve_path(divert, path).container(self)?;
                Some(Pointer::start_of(container))
            }
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.index()).and_then(|n| n.parent)
    }

    pub fn container(&self, id: NodeId) -> Option<&Container> {
        self.nodes.get(id.index()).and_then(|n| n.kind.as_container())
    }

    /// Absolute path of a node.
    pub fn path_of(&self, id: NodeId) -> &Path {
        &self.paths[id.index()]
    }

    pub fn content_with_path_component(
        &self,
        container: NodeId,
        component: &Component,
    ) -> Option<NodeId> {
        let c = self.container(container)?;

        match component {
            Component::Index(i) => c.content.get(*i).copied(),
            Component::Name(_) if component.is_parent() => self.parent(container),
            Component::Name(name) => c.named_content.get(name).copied(),
        }
    }

    /// Follows `path[start..start + len]` from `container`.
    pub fn content_at_path(
        &self,
        container: NodeId,
        path: &Path,
        partial_path_start: usize,
        partial_path_length: Option<usize>,
    ) -> SearchResult {
        let partial_path_length = partial_path_length.unwrap_or(path.len());

        let mut result = SearchResult {
            obj: Some(container),
            approximate: false,
        };

        let mut current_container = Some(container);

        for i in partial_path_start..partial_path_length {
            let Some(c) = current_container else {
                result.approximate = true;
                break;
            };

            let Some(found) = path
                .get_component(i)
                .and_then(|comp| self.content_with_path_component(c, comp))
            else {
                result.approximate = true;
                break;
            };

            // Are we about to loop into another container?
            let next_container = self.container(found).map(|_| found);
            if i < partial_path_length - 1 && next_container.is_none() {
                result.approximate = true;
                break;
            }

            result.obj = Some(found);
            current_container = next_container;
        }

        result
    }

    /// Resolves `path` as seen from the node `from`: relative paths start at
    /// the node itself (or its container), absolute ones at the root.
    pub fn resolve_path(&self, from: NodeId, path: &Path) -> SearchResult {
        if !path.is_relative() {
            return self.content_at_path(self.root(), path, 0, None);
        }

        if self.container(from).is_some() {
            return self.content_at_path(from, path, 0, None);
        }

        match self.parent(from) {
            Some(parent) => {
                let path = if path.get_component(0).is_some_and(|c| c.is_parent()) {
                    path.get_tail()
                } else {
                    path.clone()
                };
                self.content_at_path(parent, &path, 0, None)
            }
            None => SearchResult {
                obj: None,
                approximate: true,
            },
        }
    }

    /// Pointer to an absolute path. A path ending in an index points into
    /// its parent container; any other path points at the container itself.
    /// Approximate matches are accepted and reported in the returned warning.
    pub fn pointer_at_path(&self, path: &Path) -> Result<(Pointer, Option<String>), StoryError> {
        if path.is_empty() {
            return Ok((pointer::NULL, None));
        }

        let (result, path_length_to_use, index) = match path.get_last_component() {
            Some(Component::Index(i)) => {
                let len = path.len() - 1;
                (
                    self.content_at_path(self.root(), path, 0, Some(len)),
                    len,
                    *i as i32,
                )
            }
            _ => (
                self.content_at_path(self.root(), path, 0, None),
                path.len(),
                -1,
            ),
        };

        let p = Pointer::new(result.container(self), index);

        match result.obj {
            None => Err(StoryError::Address(format!(
                "Failed to find content at path '{path}', and no approximation of it was possible."
            ))),
            Some(obj) if obj == self.root() && path_length_to_use > 0 => {
                Err(StoryError::Address(format!(
                    "Failed to find content at path '{path}', and no approximation of it was possible."
                )))
            }
            Some(obj) if result.approximate => Ok((
                p,
                Some(format!(
                    "Failed to find content at path '{}', so it was approximated to: '{}'.",
                    path,
                    self.path_of(obj)
                )),
            )),
            Some(_) => Ok((p, None)),
        }
    }

    /// Top level named container, such as a knot or a function.
    pub fn knot_container_with_name(&self, name: &str) -> Option<NodeId> {
        let id = *self.container(self.root())?.named_content.get(name)?;
        self.container(id).map(|_| id)
    }

    pub fn build_string_of_hierarchy(&self, pointed: Option<NodeId>) -> String {
        let mut sb = String::new();
        self.append_hierarchy(&mut sb, self.root(), 0, pointed);
        sb
    }

    fn append_hierarchy(&self, sb: &mut String, id: NodeId, indentation: usize, pointed: Option<NodeId>) {
        const SPACES_PER_INDENT: usize = 4;
        let indent = |sb: &mut String, n: usize| sb.push_str(&" ".repeat(SPACES_PER_INDENT * n));

        let Some(c) = self.container(id) else {
            return;
        };

        indent(sb, indentation);
        sb.push('[');

        if let Some(name) = c.name.as_ref().filter(|_| c.has_valid_name()) {
            sb.push_str(&format!(" ({name})"));
        }

        if pointed == Some(id) {
            sb.push_str("  <---");
        }

        sb.push('\n');

        for (i, child) in c.content.iter().enumerate() {
            match self.kind(*child) {
                NodeKind::Container(_) => self.append_hierarchy(sb, *child, indentation + 1, pointed),
                kind => {
                    indent(sb, indentation + 1);
                    match kind {
                        NodeKind::Value(ValueType::String(s)) => {
                            sb.push_str(&format!("\"{}\"", s.string.replace('\n', "\\n")))
                        }
                        other => sb.push_str(&describe_leaf(other)),
                    }
                }
            }

            if i != c.content.len() - 1 {
                sb.push(',');
            }

            if pointed == Some(*child) && self.container(*child).is_none() {
                sb.push_str("  <---");
            }

            sb.push('\n');
        }

        let named_only = c.get_named_only_content();
        if !named_only.is_empty() {
            indent(sb, indentation + 1);
            sb.push_str("-- named: --\n");

            for (_, child) in named_only {
                self.append_hierarchy(sb, child, indentation + 1, pointed);
                sb.push('\n');
            }
        }

        indent(sb, indentation);
        sb.push(']');
    }
}

fn describe_leaf(kind: &NodeKind) -> String {
    match kind {
        NodeKind::Container(_) => "Container".to_owned(),
        NodeKind::ControlCommand(c) => c.to_string(),
        NodeKind::Divert(d) => d.to_string(),
        NodeKind::ChoicePoint(cp) => cp.to_string(),
        NodeKind::Value(v) => v.to_string(),
        NodeKind::NativeFunctionCall(op) => format!("Native '{}'", op.get_name()),
        NodeKind::VariableReference(vr) => vr.to_string(),
        NodeKind::VariableAssignment(va) => va.to_string(),
        NodeKind::Tag(t) => t.to_string(),
        NodeKind::Glue => "Glue".to_owned(),
        NodeKind::Void => "Void".to_owned(),
    }
}
