use std::collections::HashMap;

use serde_json::{json, Map};

use crate::{
    container::ContentTree,
    json_read, json_write,
    path::Path,
    pointer::{self, Pointer},
    push_pop::PushPopType,
    story_error::StoryError,
    value_type::ValueType,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub current_pointer: Pointer,
    pub in_expression_evaluation: bool,
    pub temporary_variables: HashMap<String, ValueType>,
    pub push_pop_type: PushPopType,
    pub evaluation_stack_height_when_pushed: usize,
    pub function_start_in_output_stream: i32,
}

impl Element {
    fn new(push_pop_type: PushPopType, pointer: Pointer, in_expression_evaluation: bool) -> Element {
        Element {
            current_pointer: pointer,
            in_expression_evaluation,
            temporary_variables: HashMap::new(),
            push_pop_type,
            evaluation_stack_height_when_pushed: 0,
            function_start_in_output_stream: 0,
        }
    }
}

/// A logical thread: its own stack of elements plus the content that ran
/// just before it. Cloning a thread deep-copies every element.
#[derive(Debug, Clone, PartialEq)]
pub struct Thread {
    pub callstack: Vec<Element>,
    pub previous_pointer: Pointer,
    pub thread_index: usize,
}

impl Thread {
    fn new() -> Thread {
        Thread {
            callstack: Vec::new(),
            previous_pointer: pointer::NULL,
            thread_index: 0,
        }
    }

    pub(crate) fn from_json(
        tree: &ContentTree,
        j_obj: &Map<String, serde_json::Value>,
        warnings: &mut Vec<String>,
    ) -> Result<Thread, StoryError> {
        let mut thread = Thread::new();

        thread.thread_index = j_obj
            .get("threadIndex")
            .and_then(|i| i.as_u64())
            .ok_or_else(|| StoryError::Decode("Invalid thread index".to_owned()))?
            as usize;

        let j_thread_callstack = j_obj
            .get("callstack")
            .and_then(|callstack| callstack.as_array())
            .ok_or_else(|| StoryError::Decode("Thread without callstack".to_owned()))?;

        for j_el_tok in j_thread_callstack.iter() {
            let j_element_obj = j_el_tok
                .as_object()
                .ok_or_else(|| StoryError::Decode("Invalid callstack element".to_owned()))?;

            let push_pop_type = PushPopType::from_value(
                j_element_obj
                    .get("type")
                    .and_then(|t| t.as_i64())
                    .ok_or_else(|| StoryError::Decode("Invalid push/pop type".to_owned()))?,
            )?;

            let mut pointer = pointer::NULL;

            if let Some(current_container_path_str) = j_element_obj.get("cPath").and_then(|c| c.as_str()) {
                let path = Path::new_with_components_string(current_container_path_str);
                let thread_pointer_result = tree.content_at_path(tree.root(), &path, 0, None);

                pointer.container = thread_pointer_result.container(tree);
                pointer.index = j_element_obj
                    .get("idx")
                    .and_then(|i| i.as_i64())
                    .ok_or_else(|| StoryError::Decode("Invalid pointer index".to_owned()))?
                    as i32;

                match (thread_pointer_result.obj, pointer.container) {
                    (Some(obj), Some(_)) => {
                        if thread_pointer_result.approximate {
                            warnings.push(format!("When loading state, exact internal story location couldn't be found: '{}', so it was approximated to '{}' to recover. Has the story changed since this save data was created?", current_container_path_str, tree.path_of(obj)));
                        }
                    }
                    _ => {
                        return Err(StoryError::Address(format!(
                            "When loading state, internal story location couldn't be found: '{current_container_path_str}'. Has the story changed since this save data was created?"
                        )))
                    }
                }
            }

            let in_expression_evaluation = j_element_obj
                .get("exp")
                .and_then(|exp| exp.as_bool())
                .unwrap_or(false);

            let mut el = Element::new(push_pop_type, pointer, in_expression_evaluation);

            if let Some(temps) = j_element_obj.get("temp").and_then(|temp| temp.as_object()) {
                el.temporary_variables = json_read::jobject_to_hashmap_values(temps)?;
            }

            thread.callstack.push(el);
        }

        if thread.callstack.is_empty() {
            return Err(StoryError::Decode("Thread with an empty callstack".to_owned()));
        }

        if let Some(prev_content_obj_path) = j_obj.get("previousContentObject").and_then(|p| p.as_str()) {
            let prev_path = Path::new_with_components_string(prev_content_obj_path);
            let (p, warning) = tree.pointer_at_path(&prev_path)?;
            warnings.extend(warning);
            thread.previous_pointer = p;
        }

        Ok(thread)
    }

    pub(crate) fn write_json(&self, tree: &ContentTree) -> Result<serde_json::Value, StoryError> {
        let mut thread: Map<String, serde_json::Value> = Map::new();

        let mut cs_array: Vec<serde_json::Value> = Vec::new();

        for el in self.callstack.iter() {
            let mut el_map: Map<String, serde_json::Value> = Map::new();

            if let Some(container) = el.current_pointer.container {
                el_map.insert(
                    "cPath".to_owned(),
                    json!(tree.path_of(container).get_components_string()),
                );
                el_map.insert("idx".to_owned(), json!(el.current_pointer.index));
            }

            el_map.insert("exp".to_owned(), json!(el.in_expression_evaluation));
            el_map.insert("type".to_owned(), json!(el.push_pop_type.to_value()));

            if !el.temporary_variables.is_empty() {
                el_map.insert(
                    "temp".to_owned(),
                    json_write::write_dictionary_values(&el.temporary_variables),
                );
            }

            cs_array.push(serde_json::Value::Object(el_map));
        }

        thread.insert("callstack".to_owned(), serde_json::Value::Array(cs_array));
        thread.insert("threadIndex".to_owned(), json!(self.thread_index));

        if let Some(prev) = self.previous_pointer.resolve(tree) {
            thread.insert(
                "previousContentObject".to_owned(),
                json!(tree.path_of(prev).to_string()),
            );
        }

        Ok(serde_json::Value::Object(thread))
    }
}

/// Stack of logical threads. There is always at least one thread and every
/// thread has at least one element.
#[derive(Debug, Clone, PartialEq)]
pub struct CallStack {
    thread_counter: usize,
    start_of_root: Pointer,
    threads: Vec<Thread>,
}

impl CallStack {
    pub fn new(tree: &ContentTree) -> CallStack {
        let mut cs = CallStack {
            thread_counter: 0,
            start_of_root: Pointer::start_of(tree.root()),
            threads: Vec::new(),
        };

        cs.reset();

        cs
    }

    pub fn reset(&mut self) {
        let mut thread = Thread::new();
        thread
            .callstack
            .push(Element::new(PushPopType::Tunnel, self.start_of_root, false));

        self.threads = vec![thread];
    }

    pub fn get_current_thread(&self) -> &Thread {
        &self.threads[self.threads.len() - 1]
    }

    pub fn get_current_thread_mut(&mut self) -> &mut Thread {
        let last = self.threads.len() - 1;
        &mut self.threads[last]
    }

    pub fn set_current_thread(&mut self, value: Thread) {
        self.threads = vec![value];
    }

    pub fn get_callstack(&self) -> &Vec<Element> {
        &self.get_current_thread().callstack
    }

    pub fn get_callstack_mut(&mut self) -> &mut Vec<Element> {
        &mut self.get_current_thread_mut().callstack
    }

    pub fn get_current_element(&self) -> &Element {
        let cs = self.get_callstack();
        &cs[cs.len() - 1]
    }

    pub fn get_current_element_mut(&mut self) -> &mut Element {
        let cs = self.get_callstack_mut();
        let last = cs.len() - 1;
        &mut cs[last]
    }

    pub fn get_current_element_index(&self) -> i32 {
        self.get_callstack().len() as i32 - 1
    }

    pub fn depth(&self) -> usize {
        self.get_callstack().len()
    }

    pub fn can_pop_thread(&self) -> bool {
        self.threads.len() > 1 && !self.element_is_evaluate_from_game()
    }

    pub fn pop_thread(&mut self) -> Result<(), StoryError> {
        if self.can_pop_thread() {
            self.threads.pop();
            Ok(())
        } else {
            Err(StoryError::Structural("Can't pop thread".to_owned()))
        }
    }

    pub fn push_thread(&mut self) {
        let new_thread = self.fork_thread();
        self.threads.push(new_thread);
    }

    /// Copy of the current thread under a fresh thread index.
    pub fn fork_thread(&mut self) -> Thread {
        let mut forked_thread = self.get_current_thread().clone();
        self.thread_counter += 1;
        forked_thread.thread_index = self.thread_counter;
        forked_thread
    }

    pub fn get_thread_with_index(&self, index: usize) -> Option<&Thread> {
        self.threads.iter().find(|t| t.thread_index == index)
    }

    pub fn can_pop(&self) -> bool {
        self.get_callstack().len() > 1
    }

    pub fn can_pop_type(&self, t: Option<PushPopType>) -> bool {
        if !self.can_pop() {
            return false;
        }

        match t {
            None => true,
            Some(t) => self.get_current_element().push_pop_type == t,
        }
    }

    pub fn pop(&mut self, t: Option<PushPopType>) -> Result<(), StoryError> {
        if self.can_pop_type(t) {
            self.get_callstack_mut().pop();
            Ok(())
        } else {
            Err(StoryError::Structural(
                "Mismatched push/pop in Callstack".to_owned(),
            ))
        }
    }

    pub fn element_is_evaluate_from_game(&self) -> bool {
        self.get_current_element().push_pop_type == PushPopType::FunctionEvaluationFromGame
    }

    pub fn push(
        &mut self,
        t: PushPopType,
        external_evaluation_stack_height: usize,
        output_stream_length_with_pushed: i32,
    ) {
        // When pushing to callstack, maintain the current content path, but
        // jump out of expressions by default
        let mut element = Element::new(t, self.get_current_element().current_pointer, false);

        element.evaluation_stack_height_when_pushed = external_evaluation_stack_height;
        element.function_start_in_output_stream = output_stream_length_with_pushed;

        self.get_callstack_mut().push(element);
    }

    fn context_element_mut(&mut self, context_index: i32) -> Option<&mut Element> {
        let context_index = if context_index == -1 {
            self.get_current_element_index() + 1
        } else {
            context_index
        };

        let i = usize::try_from(context_index - 1).ok()?;
        self.get_callstack_mut().get_mut(i)
    }

    /// Stores a temporary in the element at `context_index` (element index
    /// plus one, or -1 for the current element).
    pub fn set_temporary_variable(
        &mut self,
        name: &str,
        mut value: ValueType,
        declare_new: bool,
        context_index: i32,
    ) -> Result<(), StoryError> {
        let context_element = self.context_element_mut(context_index).ok_or_else(|| {
            StoryError::Address(format!("Invalid context for temporary variable: {name}"))
        })?;

        match context_element.temporary_variables.get(name) {
            Some(old_value) => ValueType::retain_list_origins_for_assignment(old_value, &mut value),
            None if !declare_new => {
                return Err(StoryError::Address(format!(
                    "Could not find temporary variable to set: {name}"
                )))
            }
            None => {}
        }

        context_element
            .temporary_variables
            .insert(name.to_string(), value);

        Ok(())
    }

    pub fn get_temporary_variable_with_name(&self, name: &str, context_index: i32) -> Option<&ValueType> {
        let context_index = if context_index == -1 {
            self.get_current_element_index() + 1
        } else {
            context_index
        };

        let i = usize::try_from(context_index - 1).ok()?;
        self.get_callstack().get(i)?.temporary_variables.get(name)
    }

    /// Context index of the scope that declares `name`: the current element
    /// if it holds such a temporary, otherwise the global scope (0).
    pub fn context_for_variable_named(&self, name: &str) -> i32 {
        if self
            .get_current_element()
            .temporary_variables
            .contains_key(name)
        {
            return self.get_current_element_index() + 1;
        }

        0
    }

    pub(crate) fn write_json(&self, tree: &ContentTree) -> Result<serde_json::Value, StoryError> {
        let mut cs: Map<String, serde_json::Value> = Map::new();

        let threads = self
            .threads
            .iter()
            .map(|t| t.write_json(tree))
            .collect::<Result<Vec<_>, StoryError>>()?;

        cs.insert("threads".to_owned(), serde_json::Value::Array(threads));
        cs.insert("threadCounter".to_owned(), json!(self.thread_counter));

        Ok(serde_json::Value::Object(cs))
    }

    pub(crate) fn load_json(
        &mut self,
        tree: &ContentTree,
        j_obj: &Map<String, serde_json::Value>,
        warnings: &mut Vec<String>,
    ) -> Result<(), StoryError> {
        let j_threads = j_obj
            .get("threads")
            .and_then(|t| t.as_array())
            .ok_or_else(|| StoryError::Decode("Callstack without threads".to_owned()))?;

        let mut threads = Vec::with_capacity(j_threads.len());
        for j_thread_tok in j_threads.iter() {
            let j_thread_obj = j_thread_tok
                .as_object()
                .ok_or_else(|| StoryError::Decode("Invalid thread".to_owned()))?;
            threads.push(Thread::from_json(tree, j_thread_obj, warnings)?);
        }

        if threads.is_empty() {
            return Err(StoryError::Decode("Callstack without threads".to_owned()));
        }

        self.threads = threads;
        self.thread_counter = j_obj
            .get("threadCounter")
            .and_then(|c| c.as_u64())
            .ok_or_else(|| StoryError::Decode("Invalid thread counter".to_owned()))?
            as usize;
        self.start_of_root = Pointer::start_of(tree.root());

        Ok(())
    }

    pub fn get_callstack_trace(&self, tree: &ContentTree) -> String {
        let mut sb = String::new();

        for (t, thread) in self.threads.iter().enumerate() {
            let is_current = t == self.threads.len() - 1;

            sb.push_str(&format!(
                "=== THREAD {}/{} {}===\n",
                t + 1,
                self.threads.len(),
                if is_current { "(current) " } else { "" }
            ));

            for element in &thread.callstack {
                if element.push_pop_type == PushPopType::Function {
                    sb.push_str("  [FUNCTION] ");
                } else {
                    sb.push_str("  [TUNNEL] ");
                }

                if let Some(container) = element.current_pointer.container {
                    sb.push_str(&format!("<SOMEWHERE IN {}>\n", tree.path_of(container)));
                }
            }
        }

        sb
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{container::Container, object::NodeKind};

    fn tree() -> ContentTree {
        let mut tree = ContentTree::new();
        tree.add_node(NodeKind::Container(Container::new(None, 0)));
        tree.link();
        tree
    }

    #[test]
    fn mismatched_pop_is_structural_error() {
        let tree = tree();
        let mut cs = CallStack::new(&tree);

        cs.push(PushPopType::Tunnel, 0, 0);
        assert!(matches!(
            cs.pop(Some(PushPopType::Function)),
            Err(StoryError::Structural(_))
        ));
        assert!(cs.pop(Some(PushPopType::Tunnel)).is_ok());
        assert!(cs.pop(None).is_err());
    }

    #[test]
    fn last_thread_cannot_be_popped() {
        let tree = tree();
        let mut cs = CallStack::new(&tree);

        assert!(cs.pop_thread().is_err());
        cs.push_thread();
        assert_eq!(1, cs.get_current_thread().thread_index);
        assert!(cs.pop_thread().is_ok());
        assert_eq!(0, cs.get_current_thread().thread_index);
    }

    #[test]
    fn forked_threads_copy_temporaries() -> Result<(), StoryError> {
        let tree = tree();
        let mut cs = CallStack::new(&tree);

        cs.set_temporary_variable("x", ValueType::Int(1), true, -1)?;
        let forked = cs.fork_thread();
        cs.set_temporary_variable("x", ValueType::Int(2), false, -1)?;

        assert_eq!(
            Some(&ValueType::Int(1)),
            forked.callstack[0].temporary_variables.get("x")
        );
        assert_eq!(Some(&ValueType::Int(2)), cs.get_temporary_variable_with_name("x", -1));
        Ok(())
    }

    #[test]
    fn undeclared_temporary_is_not_found() {
        let tree = tree();
        let mut cs = CallStack::new(&tree);

        assert!(matches!(
            cs.set_temporary_variable("y", ValueType::Int(1), false, -1),
            Err(StoryError::Address(_))
        ));
        assert_eq!(0, cs.context_for_variable_named("y"));
    }
}
