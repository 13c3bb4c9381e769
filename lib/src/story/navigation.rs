use crate::{
    object::NodeId,
    path::Path,
    push_pop::PushPopType,
    search_result::SearchResult,
    story::Story,
    story_error::StoryError,
    value_type::ValueType,
};

/// # Navigation
/// Methods to access specific sections of the story.
impl Story {
    /// Change the current position of the story to the given path. From
    /// here you can call [`cont()`](Story::cont) to evaluate the
    /// next line.
    ///
    /// The path string is a dot-separated path as used internally by the
    /// engine. These examples should work:
    ///
    /// ```ink
    ///    myKnot
    ///    myKnot.myStitch
    /// ```
    ///
    /// Note however that this won't necessarily work:
    ///
    /// ```ink
    ///    myKnot.myStitch.myLabelledChoice
    /// ```
    ///
    /// ...because of the way that content is nested within a weave
    /// structure.
    ///
    /// Usually you would reset the callstack beforehand, which means that
    /// any tunnels, threads or functions you were in at the time of
    /// calling will be discarded. This is different from the
    /// behaviour of
    /// [`choose_choice_index`](Story::choose_choice_index), which
    /// will always keep the callstack, since the choices are known to come
    /// from a correct state, and their source thread is known.
    ///
    /// You have the option of passing `false` to the `reset_call_stack`
    /// parameter if you don't want this behaviour, leaving any active
    /// threads, tunnels or function calls intact. If you're in the middle of
    /// a function, `choose_path_string` will then return an error.
    ///
    /// `args` are pushed for a knot that takes parameters.
    pub fn choose_path_string(
        &mut self,
        path: &str,
        reset_call_stack: bool,
        args: Option<&Vec<ValueType>>,
    ) -> Result<(), StoryError> {
        self.if_async_we_cant("call choose_path_string right now")?;

        if reset_call_stack {
            self.reset_callstack()?;
        } else {
            // Catch one of the worst offenders: leaving a function frame
            // dangling on the stack.
            let current_element = self.state.get_callstack().get_current_element();

            if current_element.push_pop_type == PushPopType::Function {
                let tree = &self.content.tree;
                let func_detail = current_element
                    .current_pointer
                    .container
                    .map(|c| format!("({})", tree.path_of(c)))
                    .unwrap_or_default();

                return Err(StoryError::Structural(format!(
                    "Story was running a function {func_detail} when you called choose_path_string({path}) - this is almost certainly not what you want! Full stack trace: \n{}",
                    self.state.get_callstack().get_callstack_trace(tree)
                )));
            }
        }

        let args = args.map(|a| a.as_slice()).unwrap_or(&[]);
        self.state.pass_arguments_to_evaluation_stack(args)?;
        self.choose_path(&Path::new_with_components_string(path), true)?;

        Ok(())
    }

    /// Evaluates a function defined in the story, and gathers the (possibly
    /// multi-line) text the function produces while executing. This output
    /// text is any text written as normal content within the function,
    /// as opposed to the function's return value, which is specified by
    /// `~ return` in the source.
    pub fn evaluate_function(
        &mut self,
        func_name: &str,
        args: Option<&Vec<ValueType>>,
        text_output: &mut String,
    ) -> Result<Option<ValueType>, StoryError> {
        self.if_async_we_cant("evaluate a function")?;

        if func_name.trim().is_empty() {
            return Err(StoryError::BadArgument(
                "Function is empty or white space.".to_owned(),
            ));
        }

        // Get the content that we need to run
        let Some(func_container) = self.knot_container_with_name(func_name) else {
            return Err(StoryError::BadArgument(format!(
                "Function doesn't exist: '{func_name}'"
            )));
        };

        // Put everything back as it was if the function can't finish.
        let state_before = self.state.clone();

        // Snapshot the output stream
        let output_stream_before = self.state.get_output_stream().clone();
        self.state.reset_output(None);

        // State will temporarily replace the callstack in order to evaluate
        let args = args.map(|a| a.as_slice()).unwrap_or(&[]);
        if let Err(e) = self.state.start_function_evaluation_from_game(func_container, args) {
            self.state = state_before;
            return Err(e);
        }

        // Evaluate the function, and collect the string output
        while self.can_continue() {
            match self.cont() {
                Ok(text) => text_output.push_str(&text),
                Err(e) => {
                    self.state = state_before;
                    return Err(e);
                }
            }
        }

        if let Some(pending) = self.pending_external.take() {
            self.state = state_before;
            self.async_continue_active = false;

            return Err(StoryError::BadArgument(format!(
                "Function '{func_name}' called the unbound external function '{}'. Bind it before evaluating the function.",
                pending.name
            )));
        }

        // Restore the output stream in case this was called
        // during main story evaluation.
        self.state.reset_output(Some(output_stream_before));

        // Finish evaluation, and see whether anything was produced
        self.state.complete_function_evaluation_from_game()
    }

    pub(crate) fn visit_changed_containers_due_to_divert(&mut self) {
        let content = self.content.clone();
        let tree = &content.tree;

        let previous_pointer = self.state.get_previous_pointer();
        let pointer = self.state.get_current_pointer();

        // Unless we're pointing *directly* at a piece of content, we don't do counting
        // here. Otherwise, the main stepping function will do the counting.
        if pointer.is_null() || pointer.index == -1 {
            return;
        }

        // First, find the previously open set of containers
        let mut prev_containers: Vec<NodeId> = Vec::new();

        if !previous_pointer.is_null() {
            let mut prev_ancestor = previous_pointer
                .resolve(tree)
                .filter(|id| tree.container(*id).is_some())
                .or(previous_pointer.container);

            while let Some(prev_anc) = prev_ancestor {
                prev_containers.push(prev_anc);
                prev_ancestor = tree.parent(prev_anc);
            }
        }

        // If the new object is a container itself, it will be visited
        // automatically at the next actual content step. However, we need to walk up
        // the new ancestry to see if there are more new containers
        let Some(mut current_child_of_container) = pointer.resolve(tree) else {
            return;
        };

        let mut current_container_ancestor = tree.parent(current_child_of_container);

        let mut all_children_entered_at_start = true;

        while let Some(current_container) = current_container_ancestor {
            let Some(container) = tree.container(current_container) else {
                break;
            };

            if prev_containers.contains(&current_container) && !container.counting_at_start_only {
                break;
            }

            // Check whether this ancestor container is being entered at the start,
            // by checking whether the child object is the first.
            let entering_at_start = container.content.first() == Some(&current_child_of_container)
                && all_children_entered_at_start;

            // Don't count it as entering at start if we're entering randomly somewhere
            // within a container B that happens to be nested at index 0 of
            // container A. It only counts if we're diverting directly to the
            // first leaf node.
            if !entering_at_start {
                all_children_entered_at_start = false;
            }

            // Mark a visit to this container
            self.visit_container(current_container, entering_at_start);

            current_child_of_container = current_container;
            current_container_ancestor = tree.parent(current_container);
        }
    }

    /// Top level named container, such as a knot or a function.
    pub fn knot_container_with_name(&self, name: &str) -> Option<NodeId> {
        self.content.tree.knot_container_with_name(name)
    }

    /// Looks up the content at an absolute path. The result tells whether
    /// the path could only be resolved approximately.
    pub fn content_at_path(&self, path: &Path) -> SearchResult {
        let tree = &self.content.tree;
        tree.content_at_path(tree.root(), path, 0, None)
    }

    /// Gets the visit/read count of a particular container at the given
    /// path. For a knot or stitch, that path string will be in the
    /// form:
    ///
    /// ```ink
    ///     knot
    ///     knot.stitch
    /// ```
    pub fn get_visit_count_at_path_string(&self, path_string: &str) -> Result<i32, StoryError> {
        self.state.visit_count_at_path_string(path_string)
    }
}
