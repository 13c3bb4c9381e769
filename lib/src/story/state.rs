use crate::{
    path::Path, story::Story, story_error::StoryError, story_state::StoryState, threadsafe::Brc,
    value_type::ValueType,
};

/// # State
/// Methods to read and write story state.
impl Story {
    /// The running state of the story.
    pub fn get_state(&self) -> &StoryState {
        &self.state
    }

    /// Runs the global declarations and remembers the resulting values as
    /// the defaults of every global variable.
    pub(crate) fn reset_globals(&mut self) -> Result<(), StoryError> {
        let has_global_decl = self
            .content
            .tree
            .container(self.content.tree.root())
            .is_some_and(|root| root.named_content.contains_key("global decl"));

        if has_global_decl {
            let original_pointer = self.state.get_current_pointer();

            self.choose_path(&Path::new_with_components_string("global decl"), false)?;

            self.continue_internal(0.0)?;

            self.state.set_current_pointer(original_pointer);
        }

        self.state.variables_state.snapshot_default_globals();

        Ok(())
    }

    /// Set the value of a named global variable. Observers of the variable
    /// are notified straight away.
    pub fn set_variable(&mut self, variable_name: &str, value_type: &ValueType) -> Result<(), StoryError> {
        self.state
            .variables_state
            .set(variable_name, value_type.clone())?;

        self.notify_variable_changed(variable_name, value_type);

        Ok(())
    }

    /// Get the value of a named global variable.
    pub fn get_variable(&self, variable_name: &str) -> Option<ValueType> {
        self.state.variables_state.get(variable_name).cloned()
    }

    pub(crate) fn snapshot_for_lookahead(&mut self) {
        self.state_snapshot_at_last_new_line = Some(self.state.clone());
    }

    /// Rewinds to the state saved at the last newline. Errors found while
    /// looking ahead are kept.
    pub(crate) fn restore_lookahead_snapshot(&mut self) {
        if let Some(mut snapshot) = self.state_snapshot_at_last_new_line.take() {
            snapshot.carry_errors_from(&self.state);
            self.state = snapshot;
        }
    }

    pub(crate) fn discard_lookahead_snapshot(&mut self) {
        self.state_snapshot_at_last_new_line = None;
    }

    /// Exports the current state to JSON format, in order to save the game.
    pub fn save_state(&self) -> Result<String, StoryError> {
        self.if_async_we_cant("save the state")?;
        self.state.to_json()
    }

    /// Loads a previously saved state in JSON format. On error the current
    /// state is kept.
    pub fn load_state(&mut self, json_state: &str) -> Result<(), StoryError> {
        self.if_async_we_cant("load a state")?;
        self.state.load_json(json_state)
    }

    /// A copy of the current state, to be given back to
    /// [`restore_state`](Story::restore_state) later.
    pub fn state_snapshot(&self) -> StoryState {
        self.state.clone()
    }

    /// Goes back to a state taken with
    /// [`state_snapshot`](Story::state_snapshot) on a story sharing the same
    /// content.
    pub fn restore_state(&mut self, state: StoryState) -> Result<(), StoryError> {
        self.if_async_we_cant("restore a state")?;

        if !Brc::ptr_eq(state.content(), &self.content) {
            return Err(StoryError::BadArgument(
                "The state was taken from a story with different content".to_owned(),
            ));
        }

        self.state = state;

        Ok(())
    }

    /// Reset the Story back to its initial state as it was when it was first constructed.
    pub fn reset_state(&mut self) -> Result<(), StoryError> {
        self.if_async_we_cant("reset_state")?;

        self.state = StoryState::new(self.content.clone());

        self.reset_globals()
    }

    /// Unwinds the callstack. Useful to reset the story's evaluation
    /// without actually changing any meaningful state, for example if you
    /// want to exit a section of story prematurely and tell it to go
    /// elsewhere with a call to
    /// [`choose_path_string`](Story::choose_path_string). Doing so without
    /// calling `reset_callstack()` could cause unexpected issues if, for
    /// example, the story was in a tunnel already.
    pub fn reset_callstack(&mut self) -> Result<(), StoryError> {
        self.if_async_we_cant("reset_callstack")?;

        self.state.force_end();

        Ok(())
    }
}
