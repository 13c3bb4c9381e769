use crate::{
    choice::Choice, choice_point::ChoicePoint, object::{NodeId, RTObject}, path::Path,
    story::Story, story_error::StoryError, value_type::ValueType,
};

/// # Choices
/// Methods to get and select choices.
impl Story {
    /// Chooses the [`Choice`](crate::choice::Choice) from the
    /// [`get_current_choices`](Story::get_current_choices) list with the
    /// given index. Internally, this sets the current content path to what
    /// the [`Choice`](crate::choice::Choice) points to, ready to continue
    /// story evaluation.
    ///
    /// An index out of range is an error and leaves the story untouched.
    pub fn choose_choice_index(&mut self, choice_index: usize) -> Result<(), StoryError> {
        self.if_async_we_cant("choose a choice")?;

        let choices = self.get_current_choices();
        let Some(choice_to_choose) = choices.get(choice_index) else {
            return Err(StoryError::Structural(format!(
                "choice out of range: {choice_index} (there are {} choices)",
                choices.len()
            )));
        };

        let thread = choice_to_choose.thread_at_generation.clone().ok_or_else(|| {
            StoryError::Structural("Choice without a thread to resume".to_owned())
        })?;

        // Replace callstack with the one from the thread at the choosing point,
        // so that we can jump into the right place in the flow.
        // This is important in case the flow was forked by a new thread, which
        // can create multiple leading edges for the story, each of
        // which has its own context.
        self.state.callstack.set_current_thread(thread);

        self.choose_path(&choice_to_choose.target_path, true)
    }

    pub(crate) fn choose_path(&mut self, p: &Path, incrementing_turn_index: bool) -> Result<(), StoryError> {
        self.state.set_chosen_path(p, incrementing_turn_index)?;

        // Take a note of newly visited containers for read counts etc
        self.visit_changed_containers_due_to_divert();

        Ok(())
    }

    pub(crate) fn process_choice(
        &mut self,
        choice_point: &ChoicePoint,
        choice_point_id: NodeId,
    ) -> Result<Option<Choice>, StoryError> {
        let mut show_choice = true;

        // Don't create choice if choice point doesn't pass conditional
        if choice_point.has_condition() {
            let condition_value = self.state.pop_evaluation_stack()?;
            if !self.is_truthy(&condition_value)? {
                show_choice = false;
            }
        }

        let mut start_text = String::new();
        let mut choice_only_text = String::new();
        let mut tags: Vec<String> = Vec::with_capacity(0);

        if choice_point.has_choice_only_content() {
            choice_only_text = self.pop_choice_string_and_tags(&mut tags)?;
        }

        if choice_point.has_start_content() {
            start_text = self.pop_choice_string_and_tags(&mut tags)?;
        }

        let choice_target = choice_point.get_choice_target();

        // Don't create choice if player has already read this content
        if choice_point.once_only() {
            if let Some(target) = choice_target {
                if self.visit_count_for_container(target) > 0 {
                    show_choice = false;
                }
            }
        }

        // We go through the full process of creating the choice above so
        // that we consume the content for it, since otherwise it'll
        // be shown on the output stream.
        if !show_choice {
            return Ok(None);
        }

        let tree = &self.content.tree;

        let target_path = match choice_target {
            Some(target) => tree.path_of(target).clone(),
            None => {
                return Err(StoryError::Address(format!(
                    "Choice target not found: {}",
                    choice_point.get_path_on_choice()
                )))
            }
        };
        let source_path = tree.path_of(choice_point_id).to_string();

        start_text.push_str(&choice_only_text);

        let choice = Choice::new(
            target_path,
            source_path,
            choice_point.is_invisible_default(),
            tags,
            self.state.callstack.fork_thread(),
            start_text.trim_matches(|c| c == ' ' || c == '\t').to_string(),
        );

        Ok(Some(choice))
    }

    pub(crate) fn try_follow_default_invisible_choice(&mut self) -> Result<(), StoryError> {
        let all_choices = self.state.get_generated_choices();

        // Is a default invisible choice the ONLY choice?
        let invisible_choices: Vec<&Choice> = all_choices
            .iter()
            .filter(|c| c.is_invisible_default)
            .collect();

        if invisible_choices.is_empty() || all_choices.len() > invisible_choices.len() {
            return Ok(());
        }

        let choice = invisible_choices[0].clone();

        let thread = choice.thread_at_generation.ok_or_else(|| {
            StoryError::Structural("Choice without a thread to resume".to_owned())
        })?;

        // Invisible choice may have been generated on a different thread,
        // in which case we need to restore it before we continue
        self.state.callstack.set_current_thread(thread);

        // If there's a chance that this state will be rolled back to before
        // the invisible choice then make sure that the choice thread is
        // left intact, and it isn't re-entered in an old state.
        if self.state_snapshot_at_last_new_line.is_some() {
            let fork_thread = self.state.callstack.fork_thread();
            self.state.callstack.set_current_thread(fork_thread);
        }

        self.choose_path(&choice.target_path, false)
    }

    fn pop_choice_string_and_tags(&mut self, tags: &mut Vec<String>) -> Result<String, StoryError> {
        let choice_only_str_val = match self.state.pop_evaluation_stack()? {
            RTObject::Value(ValueType::String(s)) => s.string,
            other => {
                return Err(StoryError::Type(format!(
                    "Expected choice text on the evaluation stack, but saw {other}"
                )))
            }
        };

        while let Some(RTObject::Tag(_)) = self.state.peek_evaluation_stack() {
            if let RTObject::Tag(tag) = self.state.pop_evaluation_stack()? {
                // popped in reverse order
                tags.insert(0, tag.get_text().to_string());
            }
        }

        Ok(choice_only_str_val)
    }
}
