use std::{cell::RefCell, collections::BTreeSet, rc::Rc};

use crate::{
    object::{NodeKind, RTObject},
    pointer::Pointer,
    push_pop::PushPopType,
    story::Story,
    story_error::StoryError,
    value_type::ValueType,
};

/// Defines the method callback implementing an external function.
pub trait ExternalFunction {
    fn call(&mut self, func_name: &str, args: Vec<ValueType>) -> Option<ValueType>;
}

pub(crate) struct ExternalFunctionDef {
    function: Rc<RefCell<dyn ExternalFunction>>,
    lookahead_safe: bool,
}

/// A call to an `EXTERNAL` function that has no binding and no fallback.
/// Evaluation is suspended until the host supplies the result with
/// [`resolve_external_call`](Story::resolve_external_call).
#[derive(Debug, Clone, PartialEq)]
pub struct PendingExternalCall {
    pub name: String,
    pub args: Vec<ValueType>,
}

/// # External Functions
/// Methods dealing with external function call handlers that will be called
/// while [`Story`] is processing.
impl Story {
    /// A story can provide a fallback function for when an `EXTERNAL`
    /// has been left unbound by the client, in which case the fallback will
    /// be called instead. Useful when testing a story in play-mode, when
    /// it's not possible to write a client-side external function, but when
    /// you don't want it to completely fail to run.
    pub fn set_allow_external_function_fallbacks(&mut self, v: bool) {
        self.allow_external_function_fallbacks = v;
    }

    /// Bind a Rust function to an `EXTERNAL` function declaration.
    ///
    /// Arguments:
    /// * `func_name` - The name of the function you're binding the handler to.
    /// * `function` - The handler that will be called whenever the story runs
    /// that `EXTERNAL` function.
    /// * `lookahead_safe` - The engine often evaluates further than you might
    /// expect beyond the current line just in case it sees glue that will join
    /// the current line with the next. It's possible that a function can
    /// appear to be called twice, and earlier than expected. If it's safe for
    /// your function to be called in this way (since the result and side
    /// effect of the function will not change), then you can pass `true`.
    /// If your function might have side effects or return different results
    /// each time it's called, pass `false` to avoid these extra calls.
    pub fn bind_external_function(
        &mut self,
        func_name: &str,
        function: Rc<RefCell<dyn ExternalFunction>>,
        lookahead_safe: bool,
    ) -> Result<(), StoryError> {
        self.if_async_we_cant("bind an external function")?;

        if self.externals.contains_key(func_name) {
            return Err(StoryError::BadArgument(format!(
                "Function '{func_name}' has already been bound."
            )));
        }

        let external_function_def = ExternalFunctionDef {
            function,
            lookahead_safe,
        };

        self.externals
            .insert(func_name.to_string(), external_function_def);

        Ok(())
    }

    /// Remove the binding for a named `EXTERNAL` function.
    pub fn unbind_external_function(&mut self, func_name: &str) -> Result<(), StoryError> {
        self.if_async_we_cant("unbind an external a function")?;

        if self.externals.remove(func_name).is_none() {
            return Err(StoryError::BadArgument(format!(
                "Function '{func_name}' has not been bound."
            )));
        }

        Ok(())
    }

    /// The external call evaluation is suspended on, if any.
    pub fn pending_external_call(&self) -> Option<&PendingExternalCall> {
        self.pending_external.as_ref()
    }

    /// Supplies the result of the pending external call and lets the story
    /// continue. `None` means the function returned nothing.
    pub fn resolve_external_call(&mut self, result: Option<ValueType>) -> Result<(), StoryError> {
        if self.pending_external.take().is_none() {
            return Err(StoryError::BadArgument(
                "There is no pending external function call to resolve".to_owned(),
            ));
        }

        let return_obj = match result {
            Some(value) => RTObject::Value(value),
            None => RTObject::Void,
        };

        self.state.push_evaluation_stack(return_obj);

        Ok(())
    }

    /// Names of the `EXTERNAL` functions the story calls that have neither
    /// a binding nor, when fallbacks are allowed, a fallback function.
    /// Calling one of them suspends evaluation.
    pub fn missing_external_bindings(&self) -> Vec<String> {
        let tree = &self.content.tree;
        let mut missing_externals = BTreeSet::new();

        for id in tree.node_ids() {
            let NodeKind::Divert(divert) = tree.kind(id) else {
                continue;
            };

            if !divert.is_external {
                continue;
            }

            let name = divert
                .get_target_path()
                .map(|p| p.get_components_string())
                .unwrap_or_default();

            if self.externals.contains_key(&name) {
                continue;
            }

            if self.allow_external_function_fallbacks && tree.knot_container_with_name(&name).is_some() {
                continue;
            }

            missing_externals.insert(name);
        }

        missing_externals.into_iter().collect()
    }

    pub(crate) fn call_external_function(
        &mut self,
        func_name: &str,
        number_of_arguments: usize,
    ) -> Result<(), StoryError> {
        let lookahead_safe = self.externals.get(func_name).map(|def| def.lookahead_safe);

        if lookahead_safe.is_none() && self.allow_external_function_fallbacks {
            if let Some(fallback_function_container) = self.content.tree.knot_container_with_name(func_name) {
                // Divert direct into fallback function and we're done
                let output_len = self.state.get_output_stream().len() as i32;
                self.state.callstack.push(PushPopType::Function, 0, output_len);
                self.state.diverted_pointer = Pointer::start_of(fallback_function_container);
                return Ok(());
            }
        }

        // Should this function break glue? Abort run if we've already seen a
        // newline. Set a bool to tell it to restore the snapshot at the end of
        // this instruction. Unresolved calls are never run during lookahead.
        if lookahead_safe != Some(true) && self.state_snapshot_at_last_new_line.is_some() {
            // The snapshot can't be restored in the middle of string
            // generation, so the call would leave no result to pop.
            if self.state.in_string_evaluation() {
                return Err(StoryError::Structural(format!("External function {func_name} could not be called because 1) it wasn't marked as lookahead safe when bind_external_function was called and 2) the story is in the middle of string generation, either because choice text is being generated, or because you have ink like \"hello {{func()}}\". You can work around this by generating the result of your function into a temporary variable before the string or choice gets generated: ~ temp x = {func_name}()")));
            }

            self.saw_lookahead_unsafe_function_after_new_line = true;
            return Ok(());
        }

        // Pop arguments
        let mut arguments: Vec<ValueType> = Vec::with_capacity(number_of_arguments);
        for _ in 0..number_of_arguments {
            match self.state.pop_evaluation_stack()? {
                RTObject::Value(value) => arguments.push(value),
                _ => {
                    return Err(StoryError::Type(format!(
                        "Trying to call EXTERNAL function '{func_name}' with arguments which are not values."
                    )))
                }
            }
        }

        // Reverse arguments from the order they were popped,
        // so they're the right way round again.
        arguments.reverse();

        let Some(function) = self.externals.get(func_name).map(|def| def.function.clone()) else {
            // Wait for the host to resolve the call.
            self.pending_external = Some(PendingExternalCall {
                name: func_name.to_string(),
                args: arguments,
            });
            return Ok(());
        };

        // Run the function!
        let func_result = function.borrow_mut().call(func_name, arguments);

        // Convert return value (if any) to a type that the engine can use
        let return_obj = match func_result {
            Some(func_result) => RTObject::Value(func_result),
            None => RTObject::Void,
        };

        self.state.push_evaluation_stack(return_obj);

        Ok(())
    }
}
