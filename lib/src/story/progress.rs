use crate::{
    choice::Choice,
    control_command::CommandType,
    object::{NodeId, NodeKind, RTObject},
    pointer::{self, Pointer},
    push_pop::PushPopType,
    story::{errors::ErrorType, OutputStateChange, Story},
    story_error::StoryError,
    value_type::ValueType,
};
use web_time::Instant;

/// # Story Progress
/// Methods to move the story forwards.
impl Story {
    /// `true` if the story can produce more content right now: it is not
    /// waiting for a choice, has not ended and is not suspended on an
    /// external function.
    pub fn can_continue(&self) -> bool {
        self.pending_external.is_none() && self.state.can_continue()
    }

    /// Tries to continue pulling text from the story.
    ///
    /// Returns an empty line if evaluation was suspended on an unbound
    /// external function, see
    /// [`pending_external_call`](Story::pending_external_call).
    pub fn cont(&mut self) -> Result<String, StoryError> {
        self.continue_async(0.0)?;

        if self.pending_external.is_some() {
            return Ok(String::new());
        }

        self.get_current_text()
    }

    /// Continues the story until a choice or error is reached.
    /// If a choice is reached, returns all text produced along the way.
    pub fn continue_maximally(&mut self) -> Result<String, StoryError> {
        self.if_async_we_cant("continue_maximally")?;

        let mut sb = String::new();

        while self.can_continue() {
            sb.push_str(&self.cont()?);
        }

        Ok(sb)
    }

    /// Continues running the story code for the specified number of
    /// milliseconds. A limit of 0 runs until the end of the line.
    ///
    /// When the time runs out before the line is complete, the story stays
    /// in the middle of the line: call it again until
    /// [`async_continue_complete`](Story::async_continue_complete).
    pub fn continue_async(&mut self, millisecs_limit_async: f32) -> Result<(), StoryError> {
        if let Some(pending) = &self.pending_external {
            return Err(StoryError::BadArgument(format!(
                "Can't continue: waiting for the result of external function '{}'. Call resolve_external_call() first.",
                pending.name
            )));
        }

        self.continue_internal(millisecs_limit_async)
    }

    /// `false` while a time-sliced continue is still producing a line.
    pub fn async_continue_complete(&self) -> bool {
        !self.async_continue_active
    }

    pub(crate) fn continue_internal(&mut self, millisecs_limit_async: f32) -> Result<(), StoryError> {
        let is_async_time_limited = millisecs_limit_async > 0.0;

        self.recursive_continue_count += 1;

        // Doing either:
        // - full run through non-async (so not active and don't want to be)
        // - Starting async run-through
        if !self.async_continue_active {
            self.async_continue_active = is_async_time_limited;

            if !self.state.can_continue() {
                self.recursive_continue_count -= 1;
                return Err(StoryError::Structural(
                    "Can't continue - should check can_continue before calling Continue".to_owned(),
                ));
            }

            self.state.did_safe_exit = false;

            self.state.reset_output(None);

            // Only the outermost continue batches variable changes.
            if self.recursive_continue_count == 1 {
                // Warnings handed back by the previous continue are stale now
                if self.warnings_returned {
                    self.state.clear_warnings();
                    self.warnings_returned = false;
                }

                self.state
                    .variables_state
                    .start_batch_observing_variable_changes();
            }
        }

        // Start timing
        let duration_stopwatch = Instant::now();

        let mut output_stream_ends_in_newline = false;
        self.saw_lookahead_unsafe_function_after_new_line = false;

        loop {
            match self.continue_single_step() {
                Ok(r) => output_stream_ends_in_newline = r,
                Err(e) => {
                    self.add_error(e);
                    break;
                }
            }

            if self.pending_external.is_some() {
                // The line stays open until the host resolves the call.
                self.async_continue_active = true;
                break;
            }

            if output_stream_ends_in_newline {
                break;
            }

            // Run out of async time?
            if is_async_time_limited
                && duration_stopwatch.elapsed().as_millis() as f32 > millisecs_limit_async
            {
                break;
            }

            if !self.state.can_continue() {
                break;
            }
        }

        // 4 outcomes:
        // - got newline (so finished this line of text)
        // - can't continue (e.g. choices or ending)
        // - ran out of time during evaluation
        // - error
        //
        // Successfully finished evaluation in time (or in error)
        if self.pending_external.is_none()
            && (output_stream_ends_in_newline || !self.state.can_continue())
        {
            // Need to rewind, due to evaluating further than we should?
            if self.state_snapshot_at_last_new_line.is_some() {
                self.restore_lookahead_snapshot();
            }

            // Finished a section of content / reached a choice point?
            if !self.state.can_continue() {
                if self.state.get_callstack().can_pop_thread() {
                    self.add_error(StoryError::Structural(
                        "Thread available to pop, threads should always be flat by the end of evaluation?".to_owned(),
                    ));
                }

                if self.state.get_generated_choices().is_empty()
                    && !self.state.did_safe_exit
                    && !self.state.has_error()
                {
                    let callstack = self.state.get_callstack();
                    let message = if callstack.can_pop_type(Some(PushPopType::Tunnel)) {
                        "unexpectedly reached end of content. Do you need a '->->' to return from a tunnel?"
                    } else if callstack.can_pop_type(Some(PushPopType::Function)) {
                        "unexpectedly reached end of content. Do you need a '~ return'?"
                    } else if !callstack.can_pop() {
                        "ran out of content. Do you need a '-> DONE' or '-> END'?"
                    } else {
                        "unexpectedly reached end of content for unknown reason."
                    };

                    self.add_error(StoryError::Structural(message.to_owned()));
                }
            }

            self.state.did_safe_exit = false;
            self.saw_lookahead_unsafe_function_after_new_line = false;

            if self.recursive_continue_count == 1 {
                let changed = self
                    .state
                    .variables_state
                    .stop_batch_observing_variable_changes();

                for (variable_name, value) in changed {
                    self.notify_variable_changed(&variable_name, &value);
                }
            }

            self.async_continue_active = false;
        }

        self.recursive_continue_count -= 1;

        // Report any errors that occured during evaluation.
        if self.state.has_error() || self.state.has_warning() {
            match self.on_error.clone() {
                Some(on_err) => {
                    for err in self.state.get_current_errors() {
                        on_err.borrow_mut().error(err, ErrorType::Error);
                    }

                    for warning in self.state.get_current_warnings() {
                        on_err.borrow_mut().error(warning, ErrorType::Warning);
                    }

                    // Errors stay recorded until reset_errors(), the story
                    // can't continue past them anyway.
                    self.state.clear_warnings();
                }
                // Fail the call since there's no error handler
                None if self.state.has_error() => return Err(self.unhandled_errors_summary()),
                None => self.warnings_returned = true,
            }
        }

        Ok(())
    }

    fn unhandled_errors_summary(&self) -> StoryError {
        let errors = self.state.get_current_errors();
        let warnings = self.state.get_current_warnings();

        let mut sb = String::from("Ink had ");

        if !errors.is_empty() {
            sb.push_str(&errors.len().to_string());
            sb.push_str(if errors.len() == 1 { " error" } else { " errors" });

            if !warnings.is_empty() {
                sb.push_str(" and ");
            }
        }

        if !warnings.is_empty() {
            sb.push_str(&warnings.len().to_string());
            sb.push_str(if warnings.len() == 1 { " warning" } else { " warnings" });
        }

        sb.push_str(". It is strongly suggested that you assign an error handler with set_error_handler. The first issue was: ");

        match errors.first().or(warnings.first()) {
            Some(first) => sb.push_str(first),
            None => sb.push_str("unknown"),
        }

        match self.state.get_first_error() {
            Some(first_error) => first_error.with_message(sb),
            None => StoryError::Structural(sb),
        }
    }

    pub(crate) fn continue_single_step(&mut self) -> Result<bool, StoryError> {
        // Run main step function (walks through content)
        self.step()?;

        if self.pending_external.is_some() {
            return Ok(false);
        }

        // Run out of content and we have a default invisible choice that we can follow?
        if !self.state.can_continue() && !self.state.get_callstack().element_is_evaluate_from_game() {
            self.try_follow_default_invisible_choice()?;
        }

        // Don't save/rewind during string evaluation, which is e.g. used for choices
        if !self.state.in_string_evaluation() {
            // We previously found a newline, but were we just double checking that
            // it wouldn't immediately be removed by glue?
            if let Some(snapshot) = self.state_snapshot_at_last_new_line.as_mut() {
                // Has proper text or a tag been added? Then we know that the newline
                // that was previously added is definitely the end of the line.
                let change = Story::calculate_newline_output_state_change(
                    &snapshot.get_current_text(),
                    &self.state.get_current_text(),
                    snapshot.get_current_tags().len(),
                    self.state.get_current_tags().len(),
                );

                // The last time we saw a newline, it was definitely the end of the line, so we
                // want to rewind to that point.
                if change == OutputStateChange::ExtendedBeyondNewline
                    || self.saw_lookahead_unsafe_function_after_new_line
                {
                    self.restore_lookahead_snapshot();

                    // Hit a newline for sure, we're done
                    return Ok(true);
                }
                // Newline that previously existed is no longer valid - e.g.
                // glue was encounted that caused it to be removed.
                else if change == OutputStateChange::NewlineRemoved {
                    self.discard_lookahead_snapshot();
                }
            }

            // Current content ends in a newline - approaching end of our evaluation
            if self.state.output_stream_ends_in_newline() {
                // If we can continue evaluation for a bit:
                // Create a snapshot in case we need to rewind.
                // We're going to continue stepping in case we see glue or some
                // non-text content such as choices.
                if self.state.can_continue() {
                    // Don't bother to record the state beyond the current newline.
                    if self.state_snapshot_at_last_new_line.is_none() {
                        self.snapshot_for_lookahead();
                    }
                }
                // Can't continue, so we're about to exit - make sure we
                // don't have an old state hanging around.
                else {
                    self.discard_lookahead_snapshot();
                }
            }
        }

        Ok(false)
    }

    pub(crate) fn step(&mut self) -> Result<(), StoryError> {
        let content = self.content.clone();
        let tree = &content.tree;

        let mut should_add_to_stream = true;

        // Get current content
        let mut pointer = self.state.get_current_pointer();

        if pointer.is_null() {
            return Ok(());
        }

        // Step directly to the first element of content in a container (if
        // necessary)
        let mut container_to_enter = pointer.resolve(tree).filter(|id| tree.container(*id).is_some());

        while let Some(cte) = container_to_enter {
            // Mark container as being entered
            self.visit_container(cte, true);

            // No content? the most we can do is step past it
            if tree.container(cte).map_or(true, |c| c.content.is_empty()) {
                break;
            }

            pointer = Pointer::start_of(cte);
            container_to_enter = pointer.resolve(tree).filter(|id| tree.container(*id).is_some());
        }

        self.state.set_current_pointer(pointer);

        // Is the current content object:
        // - Normal content
        // - Or a logic/flow statement - if so, do it
        // Stop flow if we hit a stack pop when we're unable to pop (e.g.
        // return/done statement in knot that was diverted to rather than
        // called as a function)
        let current_content_obj = pointer.resolve(tree);

        let is_logic_or_flow_control = self.perform_logic_and_flow_control(current_content_obj)?;

        // Has flow been forced to end by flow control above?
        if self.state.get_current_pointer().is_null() {
            return Ok(());
        }

        if is_logic_or_flow_control {
            should_add_to_stream = false;
        }

        let mut content_to_push = None;
        let mut is_start_thread = false;

        if let Some(id) = current_content_obj {
            match tree.kind(id) {
                // If the container has no content, then it will be
                // the "content" itself, but we skip over it.
                NodeKind::Container(_) => should_add_to_stream = false,
                NodeKind::ChoicePoint(choice_point) => {
                    if let Some(choice) = self.process_choice(choice_point, id)? {
                        self.state.get_generated_choices_mut().push(choice);
                    }

                    should_add_to_stream = false;
                }
                NodeKind::ControlCommand(CommandType::StartThread) => {
                    is_start_thread = true;
                }
                _ => {}
            }

            if should_add_to_stream {
                content_to_push = tree.kind(id).to_rtobject();
            }
        }

        // Content to add to evaluation stack or the output stream
        if let Some(mut obj) = content_to_push {
            // If we're pushing a variable pointer onto the evaluation stack,
            // ensure that it's specific to our current (possibly temporary)
            // context index.
            if let RTObject::Value(ValueType::VariablePointer(var_pointer)) = &obj {
                if var_pointer.context_index == -1 {
                    let context_idx = self
                        .state
                        .get_callstack()
                        .context_for_variable_named(&var_pointer.variable_name);
                    obj = RTObject::Value(ValueType::new_variable_pointer(
                        &var_pointer.variable_name,
                        context_idx,
                    ));
                }
            }

            // Expression evaluation content
            if self.state.get_in_expression_evaluation() {
                self.state.push_evaluation_stack(obj);
            }
            // Output stream content (i.e. not expression evaluation)
            else {
                self.state.push_to_output_stream(obj);
            }
        }

        // Increment the content pointer, following diverts if necessary
        self.next_content()?;

        // Starting a thread should be done after the increment to the content
        // pointer, so that when returning from the thread, it returns to the
        // content after this instruction.
        if is_start_thread {
            self.state.callstack.push_thread();
        }

        Ok(())
    }

    pub(crate) fn next_content(&mut self) -> Result<(), StoryError> {
        // Setting the previous pointer is critical for
        // visit_changed_containers_due_to_divert
        let cp = self.state.get_current_pointer();
        self.state.set_previous_pointer(cp);

        // Divert step?
        if !self.state.diverted_pointer.is_null() {
            let dp = self.state.diverted_pointer;
            self.state.set_current_pointer(dp);
            self.state.diverted_pointer = pointer::NULL;

            // Internally uses the previous and the current pointer
            self.visit_changed_containers_due_to_divert();

            // Diverted location has valid content?
            if !self.state.get_current_pointer().is_null() {
                return Ok(());
            }

            // Otherwise, if diverted location doesn't have valid content,
            // drop down and attempt to increment.
            // This can happen if the diverted path is intentionally jumping
            // to the end of a container - e.g. a Conditional that's
            // re-joining
        }

        let successful_pointer_increment = self.increment_content_pointer();

        // Ran out of content? Try to auto-exit from a function,
        // or finish evaluating the content of a thread
        if !successful_pointer_increment {
            let mut did_pop = false;

            if self.state.get_callstack().can_pop_type(Some(PushPopType::Function)) {
                // Pop from the call stack
                self.state.pop_callstack(Some(PushPopType::Function))?;

                // This pop was due to dropping off the end of a function that
                // didn't return anything, so in this case, we make sure that
                // the evaluator has something to chomp on if it needs it
                if self.state.get_in_expression_evaluation() {
                    self.state.push_evaluation_stack(RTObject::Void);
                }

                did_pop = true;
            } else if self.state.get_callstack().can_pop_thread() {
                self.state.callstack.pop_thread()?;

                did_pop = true;
            } else {
                self.state.try_exit_function_evaluation_from_game();
            }

            // Step past the point where we last called out
            if did_pop && !self.state.get_current_pointer().is_null() {
                self.next_content()?;
            }
        }

        Ok(())
    }

    pub(crate) fn increment_content_pointer(&mut self) -> bool {
        let content = self.content.clone();
        let tree = &content.tree;

        let mut successful_increment = true;

        let mut pointer = self.state.get_current_pointer();
        pointer.index += 1;

        let Some(mut container) = pointer.container else {
            self.state.set_current_pointer(pointer::NULL);
            return false;
        };

        // Each time we step off the end, we fall out to the next container, all
        // the while we're in indexed rather than named content
        while pointer.index as usize >= tree.container(container).map_or(0, |c| c.content.len()) {
            successful_increment = false;

            let Some(next_ancestor) = tree.parent(container) else {
                break;
            };

            let Some(index_in_ancestor) = tree
                .container(next_ancestor)
                .and_then(|c| c.content.iter().position(|child| *child == container))
            else {
                break;
            };

            pointer = Pointer::new(Some(next_ancestor), index_in_ancestor as i32 + 1);
            container = next_ancestor;

            successful_increment = true;
        }

        if !successful_increment {
            pointer = pointer::NULL;
        }

        self.state.set_current_pointer(pointer);

        successful_increment
    }

    pub(crate) fn calculate_newline_output_state_change(
        prev_text: &str,
        curr_text: &str,
        prev_tag_count: usize,
        curr_tag_count: usize,
    ) -> OutputStateChange {
        // Simple case: nothing's changed, and we still have a newline
        // at the end of the current content
        let newline_still_exists = curr_text.len() >= prev_text.len()
            && !prev_text.is_empty()
            && curr_text.as_bytes()[prev_text.len() - 1] == b'\n';
        if prev_tag_count == curr_tag_count
            && prev_text.len() == curr_text.len()
            && newline_still_exists
        {
            return OutputStateChange::NoChange;
        }

        // Old newline has been removed, it wasn't the end of the line after all
        if !newline_still_exists {
            return OutputStateChange::NewlineRemoved;
        }

        // Tag added - definitely the start of a new line
        if curr_tag_count > prev_tag_count {
            return OutputStateChange::ExtendedBeyondNewline;
        }

        // There must be new content - check whether it's just whitespace
        match curr_text.get(prev_text.len()..) {
            Some(new_text) if new_text.chars().all(|c| c == ' ' || c == '\t') => {
                // There's new text but it's just spaces and tabs, so there's
                // still the potential for glue to kill the newline.
                OutputStateChange::NoChange
            }
            _ => OutputStateChange::ExtendedBeyondNewline,
        }
    }

    /// Marks a container as entered: counts the visit and records the turn.
    pub(crate) fn visit_container(&mut self, container: NodeId, at_start: bool) {
        let Some(c) = self.content.tree.container(container) else {
            return;
        };

        if !c.counting_at_start_only || at_start {
            if c.visits_should_be_counted {
                self.state.increment_visit_count_for_container(container);
            }

            if c.turn_index_should_be_counted {
                self.state.record_turn_index_visit_to_container(container);
            }
        }
    }

    /// The choices available right now, with their `index` set. Empty while
    /// the story can still continue.
    pub fn get_current_choices(&self) -> Vec<Choice> {
        // Don't include invisible choices for external usage.
        let mut choices = Vec::new();

        if self.state.can_continue() {
            return choices;
        }

        for c in self.state.get_generated_choices() {
            if !c.is_invisible_default {
                let mut choice = c.clone();
                choice.index = choices.len();
                choices.push(choice);
            }
        }

        choices
    }

    /// The text produced by the last call to [`cont`](Story::cont).
    pub fn get_current_text(&mut self) -> Result<String, StoryError> {
        self.if_async_we_cant("call currentText since it's a work in progress")?;
        Ok(self.state.get_current_text())
    }

    pub(crate) fn if_async_we_cant(&self, activity_str: &str) -> Result<(), StoryError> {
        if let Some(pending) = &self.pending_external {
            return Err(StoryError::BadArgument(format!(
                "Can't {activity_str}. Story is waiting for the result of external function '{}'. Call resolve_external_call() first.",
                pending.name
            )));
        }

        if self.async_continue_active {
            return Err(StoryError::BadArgument(format!("Can't {activity_str}. Story is in the middle of a continue_async(). Make more continue_async() calls or a single cont() call beforehand.")));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newline_kept_when_only_spaces_follow() {
        let change = Story::calculate_newline_output_state_change("Hello\n", "Hello\n  ", 0, 0);
        assert!(change == OutputStateChange::NoChange);
    }

    #[test]
    fn newline_removed_by_glue() {
        let change = Story::calculate_newline_output_state_change("Hello\n", "Hello", 0, 0);
        assert!(change == OutputStateChange::NewlineRemoved);
    }

    #[test]
    fn text_or_tag_after_newline_ends_line() {
        let change = Story::calculate_newline_output_state_change("Hello\n", "Hello\nWorld", 0, 0);
        assert!(change == OutputStateChange::ExtendedBeyondNewline);

        let change = Story::calculate_newline_output_state_change("Héllo\n", "Héllo\n", 0, 1);
        assert!(change == OutputStateChange::ExtendedBeyondNewline);
    }
}
