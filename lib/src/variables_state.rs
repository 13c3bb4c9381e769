use std::collections::{HashMap, HashSet};

use serde_json::Map;

use crate::{
    callstack::CallStack,
    json_read, json_write,
    list_definitions_origin::ListDefinitionsOrigin,
    story_error::StoryError,
    threadsafe::Brc,
    value_type::{ValueType, VariablePointerValue},
    variable_assignment::VariableAssignment,
};

/// Global variables of a story, with the defaults captured after the global
/// declarations ran. Temporaries live in the [`CallStack`] and are reached
/// through it.
#[derive(Debug, Clone)]
pub struct VariablesState {
    global_variables: HashMap<String, ValueType>,
    default_global_variables: HashMap<String, ValueType>,
    batch_observing_variable_changes: bool,
    changed_variables_for_batch_obs: HashSet<String>,
    list_defs_origin: Brc<ListDefinitionsOrigin>,
}

impl VariablesState {
    pub fn new(list_defs_origin: Brc<ListDefinitionsOrigin>) -> VariablesState {
        VariablesState {
            global_variables: HashMap::new(),
            default_global_variables: HashMap::new(),
            batch_observing_variable_changes: false,
            changed_variables_for_batch_obs: HashSet::new(),
            list_defs_origin,
        }
    }

    pub(crate) fn start_batch_observing_variable_changes(&mut self) {
        self.batch_observing_variable_changes = true;
        self.changed_variables_for_batch_obs.clear();
    }

    /// Ends the batch and returns the current value of every global that was
    /// assigned while it was open.
    pub(crate) fn stop_batch_observing_variable_changes(&mut self) -> Vec<(String, ValueType)> {
        self.batch_observing_variable_changes = false;

        let mut changed: Vec<(String, ValueType)> = self
            .changed_variables_for_batch_obs
            .drain()
            .filter_map(|name| {
                let value = self.global_variables.get(&name).cloned()?;
                Some((name, value))
            })
            .collect();

        changed.sort_by(|a, b| a.0.cmp(&b.0));
        changed
    }

    pub(crate) fn snapshot_default_globals(&mut self) {
        self.default_global_variables = self.global_variables.clone();
    }

    pub fn global_variable_exists_with_name(&self, name: &str) -> bool {
        self.global_variables.contains_key(name) || self.default_global_variables.contains_key(name)
    }

    /// Names of the declared globals, sorted.
    pub fn global_variable_names(&self) -> Vec<&String> {
        let mut names: Vec<&String> = self.global_variables.keys().collect();
        names.sort();
        names
    }

    pub(crate) fn assign(
        &mut self,
        callstack: &mut CallStack,
        var_ass: &VariableAssignment,
        value: ValueType,
    ) -> Result<(), StoryError> {
        let mut name = var_ass.variable_name.to_string();
        let mut context_index = -1;

        // Are we assigning to a global variable?
        let mut set_global = if var_ass.is_new_declaration {
            var_ass.is_global
        } else {
            self.global_variable_exists_with_name(&name)
        };

        let mut value = value;

        // Constructing new variable pointer reference
        if var_ass.is_new_declaration {
            if let ValueType::VariablePointer(var_pointer) = &value {
                value = self.resolve_variable_pointer(callstack, var_pointer);
            }
        } else {
            // Assign to an existing variable pointer: follow the chain of
            // pointers and assign to the variable at its end.
            while let Some(ValueType::VariablePointer(pv)) =
                self.get_raw_variable_with_name(callstack, &name, context_index)
            {
                name = pv.variable_name;
                context_index = pv.context_index;
                set_global = context_index == 0;
            }
        }

        if set_global {
            self.set_global(&name, value);
            Ok(())
        } else {
            callstack.set_temporary_variable(&name, value, var_ass.is_new_declaration, context_index)
        }
    }

    // Given a variable pointer with just the name of the target known,
    // resolve it to a pointer at the exact instance: global, or a particular
    // temporary on the callstack.
    fn resolve_variable_pointer(&self, callstack: &CallStack, var_pointer: &VariablePointerValue) -> ValueType {
        let mut context_index = var_pointer.context_index;

        if context_index == -1 {
            context_index = self.get_context_index_of_variable_named(callstack, &var_pointer.variable_name);
        }

        // Pointer to a pointer (e.g. recursive functions taking a reference):
        // point straight at the final target instead of chaining.
        if let Some(double_redirection @ ValueType::VariablePointer(_)) =
            self.get_raw_variable_with_name(callstack, &var_pointer.variable_name, context_index)
        {
            return double_redirection;
        }

        ValueType::new_variable_pointer(&var_pointer.variable_name, context_index)
    }

    /// Sets a global from the host side.
    pub fn set(&mut self, variable_name: &str, value: ValueType) -> Result<(), StoryError> {
        if !self.default_global_variables.contains_key(variable_name) {
            return Err(StoryError::BadArgument(format!(
                "Cannot assign to a variable ({variable_name}) that hasn't been declared in the story"
            )));
        }

        self.set_global(variable_name, value);

        Ok(())
    }

    /// Reads a global from the host side.
    pub fn get(&self, variable_name: &str) -> Option<&ValueType> {
        // The story content may have changed since a save, so fall back to
        // the default value if the variable was never instantiated.
        self.global_variables
            .get(variable_name)
            .or_else(|| self.default_global_variables.get(variable_name))
    }

    // 0 if named variable is global
    // otherwise the index of the current callstack element
    fn get_context_index_of_variable_named(&self, callstack: &CallStack, var_name: &str) -> i32 {
        if self.global_variable_exists_with_name(var_name) {
            return 0;
        }

        callstack.get_current_element_index()
    }

    fn get_raw_variable_with_name(&self, callstack: &CallStack, name: &str, context_index: i32) -> Option<ValueType> {
        // 0 context = global
        if context_index == 0 || context_index == -1 {
            if let Some(global) = self.global_variables.get(name) {
                return Some(global.clone());
            }

            // Variables can be read while the globals are being set up
            // (VAR x = A_LIST_ITEM), before the defaults exist.
            if let Some(default_global) = self.default_global_variables.get(name) {
                return Some(default_global.clone());
            }

            if let Some(list_item_value) = self.list_defs_origin.find_single_item_list_with_name(name) {
                return Some(ValueType::List(list_item_value.clone()));
            }
        }

        // Temporary
        callstack
            .get_temporary_variable_with_name(name, context_index)
            .cloned()
    }

    fn set_global(&mut self, name: &str, mut value: ValueType) {
        if let Some(old_value) = self.global_variables.get(name) {
            ValueType::retain_list_origins_for_assignment(old_value, &mut value);
        }

        self.global_variables.insert(name.to_string(), value);

        if self.batch_observing_variable_changes {
            self.changed_variables_for_batch_obs.insert(name.to_string());
        }
    }

    /// Value of a variable, dereferencing variable pointers.
    pub(crate) fn get_variable_with_name(
        &self,
        callstack: &CallStack,
        name: &str,
        context_index: i32,
    ) -> Option<ValueType> {
        match self.get_raw_variable_with_name(callstack, name, context_index)? {
            ValueType::VariablePointer(var_pointer) => self.get_variable_with_name(
                callstack,
                &var_pointer.variable_name,
                var_pointer.context_index,
            ),
            value => Some(value),
        }
    }

    pub(crate) fn write_json(&self) -> Result<serde_json::Value, StoryError> {
        let mut jobj: Map<String, serde_json::Value> = Map::new();

        for (name, val) in self.global_variables.iter() {
            // Don't write out values that are the same as the default global values
            if self.default_global_variables.get(name) == Some(val) {
                continue;
            }

            jobj.insert(name.clone(), json_write::write_value(val));
        }

        Ok(serde_json::Value::Object(jobj))
    }

    pub(crate) fn load_json(&mut self, jobj: &Map<String, serde_json::Value>) -> Result<(), StoryError> {
        let mut global_variables = HashMap::with_capacity(self.default_global_variables.len());

        for (k, v) in self.default_global_variables.iter() {
            match jobj.get(k) {
                Some(loaded_token) => {
                    global_variables.insert(k.to_string(), json_read::jtoken_to_value(loaded_token)?);
                }
                None => {
                    global_variables.insert(k.clone(), v.clone());
                }
            }
        }

        self.global_variables = global_variables;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{container::{Container, ContentTree}, object::NodeKind};

    fn callstack() -> CallStack {
        let mut tree = ContentTree::new();
        tree.add_node(NodeKind::Container(Container::new(None, 0)));
        tree.link();
        CallStack::new(&tree)
    }

    fn declared(name: &str, value: ValueType) -> VariablesState {
        let mut vs = VariablesState::new(Brc::new(ListDefinitionsOrigin::default()));
        vs.set_global(name, value);
        vs.snapshot_default_globals();
        vs
    }

    #[test]
    fn undeclared_global_cannot_be_set() {
        let mut vs = declared("x", ValueType::Int(0));

        assert!(vs.set("x", ValueType::Int(3)).is_ok());
        assert_eq!(Some(&ValueType::Int(3)), vs.get("x"));
        assert!(matches!(
            vs.set("y", ValueType::Int(1)),
            Err(StoryError::BadArgument(_))
        ));
    }

    #[test]
    fn assignment_follows_variable_pointers() -> Result<(), StoryError> {
        let mut vs = declared("x", ValueType::Int(1));
        let mut cs = callstack();

        let declare_ref = VariableAssignment::new("r", true, false);
        vs.assign(&mut cs, &declare_ref, ValueType::new_variable_pointer("x", -1))?;

        let assign_ref = VariableAssignment::new("r", false, false);
        vs.assign(&mut cs, &assign_ref, ValueType::Int(5))?;

        assert_eq!(Some(&ValueType::Int(5)), vs.get("x"));
        assert_eq!(Some(ValueType::Int(5)), vs.get_variable_with_name(&cs, "r", -1));
        Ok(())
    }

    #[test]
    fn batch_reports_changed_globals() {
        let mut vs = declared("x", ValueType::Int(1));

        vs.start_batch_observing_variable_changes();
        vs.set_global("x", ValueType::Int(2));
        vs.set_global("x", ValueType::Int(3));

        assert_eq!(
            vec![("x".to_owned(), ValueType::Int(3))],
            vs.stop_batch_observing_variable_changes()
        );
    }

    #[test]
    fn defaults_are_not_saved() -> Result<(), StoryError> {
        let mut vs = declared("x", ValueType::Int(1));
        assert_eq!(serde_json::json!({}), vs.write_json()?);

        vs.set("x", ValueType::Int(7))?;
        assert_eq!(serde_json::json!({"x": 7}), vs.write_json()?);
        Ok(())
    }
}
