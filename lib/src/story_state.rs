//! Everything that changes while a story runs: call stack, variables,
//! output, evaluation stack, counters and pending choices.
use std::collections::HashMap;

use rand::Rng;
use serde_json::{json, Map};

use crate::{
    callstack::{CallStack, Thread},
    choice::Choice,
    container::ContentTree,
    control_command::CommandType,
    json_read, json_write,
    object::{NodeId, RTObject},
    path::Path,
    pointer::{self, Pointer},
    push_pop::PushPopType,
    story::{StoryContent, INK_VERSION_CURRENT},
    story_error::StoryError,
    threadsafe::Brc,
    value_type::{StringValue, ValueType},
    variables_state::VariablesState,
};

/// Version written in saved states.
pub const INK_SAVE_STATE_VERSION: i32 = 8;
/// Oldest saved state version that can still be loaded.
pub const MIN_COMPATIBLE_LOAD_VERSION: i32 = 8;

/// All the data needed to resume a story exactly where it was. Cloning a
/// state deep-copies it, apart from the shared read-only content.
#[derive(Debug, Clone)]
pub struct StoryState {
    content: Brc<StoryContent>,
    pub(crate) callstack: CallStack,
    pub(crate) variables_state: VariablesState,
    pub(crate) evaluation_stack: Vec<RTObject>,
    output_stream: Vec<RTObject>,
    current_choices: Vec<Choice>,
    pub(crate) diverted_pointer: Pointer,
    visit_counts: HashMap<String, i32>,
    turn_indices: HashMap<String, i32>,
    pub(crate) current_turn_index: i32,
    pub(crate) story_seed: i32,
    pub(crate) previous_random: i32,
    pub(crate) did_safe_exit: bool,
    current_errors: Vec<String>,
    current_warnings: Vec<String>,
    first_error: Option<StoryError>,
    output_stream_text_dirty: bool,
    output_stream_tags_dirty: bool,
    current_text: String,
    current_tags: Vec<String>,
}

impl StoryState {
    pub(crate) fn new(content: Brc<StoryContent>) -> StoryState {
        let callstack = CallStack::new(&content.tree);
        let variables_state = VariablesState::new(content.list_definitions.clone());

        let story_seed = rand::thread_rng().gen_range(0..100);

        StoryState {
            content,
            callstack,
            variables_state,
            evaluation_stack: Vec::new(),
            output_stream: Vec::new(),
            current_choices: Vec::new(),
            diverted_pointer: pointer::NULL,
            visit_counts: HashMap::new(),
            turn_indices: HashMap::new(),
            current_turn_index: -1,
            story_seed,
            previous_random: 0,
            did_safe_exit: false,
            current_errors: Vec::with_capacity(0),
            current_warnings: Vec::with_capacity(0),
            first_error: None,
            output_stream_text_dirty: true,
            output_stream_tags_dirty: true,
            current_text: String::new(),
            current_tags: Vec::with_capacity(0),
        }
    }

    pub(crate) fn tree(&self) -> &ContentTree {
        &self.content.tree
    }

    pub(crate) fn content(&self) -> &Brc<StoryContent> {
        &self.content
    }

    pub fn can_continue(&self) -> bool {
        !self.get_current_pointer().is_null() && !self.has_error()
    }

    pub fn has_error(&self) -> bool {
        !self.current_errors.is_empty()
    }

    pub fn has_warning(&self) -> bool {
        !self.current_warnings.is_empty()
    }

    pub fn get_current_errors(&self) -> &Vec<String> {
        &self.current_errors
    }

    pub fn get_current_warnings(&self) -> &Vec<String> {
        &self.current_warnings
    }

    /// First fatal error recorded since the last reset.
    pub(crate) fn get_first_error(&self) -> Option<&StoryError> {
        self.first_error.as_ref()
    }

    /// Takes over the errors and warnings recorded in `other`, which is a
    /// later version of this state.
    pub(crate) fn carry_errors_from(&mut self, other: &StoryState) {
        self.current_errors = other.current_errors.clone();
        self.current_warnings = other.current_warnings.clone();
        self.first_error = other.first_error.clone();
    }

    pub(crate) fn clear_warnings(&mut self) {
        self.current_warnings.clear();
    }

    pub(crate) fn reset_errors(&mut self) {
        self.current_errors.clear();
        self.current_warnings.clear();
        self.first_error = None;
    }

    /// Records a message, prefixed with its severity and the current
    /// position in the content.
    pub(crate) fn add_error(&mut self, message: &str, is_warning: bool) {
        let error_type_str = if is_warning { "WARNING" } else { "ERROR" };

        let message = match self.get_current_pointer().get_path(self.tree()) {
            Some(path) => format!("RUNTIME {error_type_str}: ({path}): {message}"),
            None => format!("RUNTIME {error_type_str}: {message}"),
        };

        if is_warning {
            self.current_warnings.push(message);
        } else {
            self.current_errors.push(message);
        }
    }

    /// Records a fatal error and stops the flow.
    pub(crate) fn add_story_error(&mut self, error: StoryError) {
        self.add_error(&error.get_message(), false);

        if self.first_error.is_none() {
            self.first_error = Some(error);
        }

        self.force_end();
    }

    pub fn get_current_pointer(&self) -> Pointer {
        self.callstack.get_current_element().current_pointer
    }

    pub(crate) fn set_current_pointer(&mut self, pointer: Pointer) {
        self.callstack.get_current_element_mut().current_pointer = pointer;
    }

    pub(crate) fn get_previous_pointer(&self) -> Pointer {
        self.callstack.get_current_thread().previous_pointer
    }

    pub(crate) fn set_previous_pointer(&mut self, pointer: Pointer) {
        self.callstack.get_current_thread_mut().previous_pointer = pointer;
    }

    pub(crate) fn get_in_expression_evaluation(&self) -> bool {
        self.callstack.get_current_element().in_expression_evaluation
    }

    pub(crate) fn set_in_expression_evaluation(&mut self, value: bool) {
        self.callstack.get_current_element_mut().in_expression_evaluation = value;
    }

    pub fn get_callstack(&self) -> &CallStack {
        &self.callstack
    }

    pub fn get_variables_state(&self) -> &VariablesState {
        &self.variables_state
    }

    /// Every choice generated so far, invisible defaults included.
    pub(crate) fn get_generated_choices(&self) -> &Vec<Choice> {
        &self.current_choices
    }

    pub(crate) fn get_generated_choices_mut(&mut self) -> &mut Vec<Choice> {
        &mut self.current_choices
    }

    pub fn get_output_stream(&self) -> &Vec<RTObject> {
        &self.output_stream
    }

    fn output_stream_dirty(&mut self) {
        self.output_stream_text_dirty = true;
        self.output_stream_tags_dirty = true;
    }

    pub(crate) fn reset_output(&mut self, objs: Option<Vec<RTObject>>) {
        self.output_stream = objs.unwrap_or_default();
        self.output_stream_dirty();
    }

    pub(crate) fn in_string_evaluation(&self) -> bool {
        self.output_stream
            .iter()
            .rev()
            .any(|o| o.is_command(CommandType::BeginString))
    }

    /// Text of the output stream, tags excluded, with inline whitespace
    /// collapsed.
    pub fn get_current_text(&mut self) -> String {
        if self.output_stream_text_dirty {
            let mut sb = String::new();
            let mut in_tag = false;

            for output_obj in &self.output_stream {
                match output_obj {
                    RTObject::Value(ValueType::String(s)) if !in_tag => sb.push_str(&s.string),
                    RTObject::ControlCommand(CommandType::BeginTag) => in_tag = true,
                    RTObject::ControlCommand(CommandType::EndTag) => in_tag = false,
                    _ => {}
                }
            }

            self.current_text = StoryState::clean_output_whitespace(&sb);
            self.output_stream_text_dirty = false;
        }

        self.current_text.clone()
    }

    pub fn get_current_tags(&mut self) -> Vec<String> {
        if self.output_stream_tags_dirty {
            let mut tags = Vec::new();
            let mut in_tag = false;
            let mut sb = String::new();

            for output_obj in &self.output_stream {
                match output_obj {
                    RTObject::ControlCommand(CommandType::BeginTag) => {
                        if in_tag && !sb.is_empty() {
                            tags.push(StoryState::clean_output_whitespace(&sb));
                            sb.clear();
                        }
                        in_tag = true;
                    }
                    RTObject::ControlCommand(CommandType::EndTag) => {
                        if !sb.is_empty() {
                            tags.push(StoryState::clean_output_whitespace(&sb));
                            sb.clear();
                        }
                        in_tag = false;
                    }
                    RTObject::Value(ValueType::String(s)) if in_tag => sb.push_str(&s.string),
                    // tag.text has whitespace already cleaned
                    RTObject::Tag(tag) if !tag.get_text().is_empty() => {
                        tags.push(tag.get_text().to_string())
                    }
                    _ => {}
                }
            }

            if !sb.is_empty() {
                tags.push(StoryState::clean_output_whitespace(&sb));
            }

            self.current_tags = tags;
            self.output_stream_tags_dirty = false;
        }

        self.current_tags.clone()
    }

    /// Collapses runs of inline whitespace into a single space and removes
    /// it at the start and end of each line.
    pub(crate) fn clean_output_whitespace(input_str: &str) -> String {
        let mut sb = String::with_capacity(input_str.len());
        let mut current_whitespace_start: i32 = -1;
        let mut start_of_line: i32 = 0;

        for (i, c) in input_str.chars().enumerate() {
            let i = i as i32;
            let is_inline_whitespace = c == ' ' || c == '\t';

            if is_inline_whitespace && current_whitespace_start == -1 {
                current_whitespace_start = i;
            }

            if !is_inline_whitespace {
                if c != '\n' && current_whitespace_start > 0 && current_whitespace_start != start_of_line {
                    sb.push(' ');
                }
                current_whitespace_start = -1;
            }

            if c == '\n' {
                start_of_line = i + 1;
            }

            if !is_inline_whitespace {
                sb.push(c);
            }
        }

        sb
    }

    pub(crate) fn output_stream_ends_in_newline(&self) -> bool {
        for obj in self.output_stream.iter().rev() {
            match obj {
                RTObject::ControlCommand(_) => break,
                RTObject::Value(ValueType::String(text)) => {
                    if text.is_newline {
                        return true;
                    } else if text.is_non_whitespace() {
                        break;
                    }
                }
                _ => {}
            }
        }

        false
    }

    pub(crate) fn output_stream_contains_content(&self) -> bool {
        self.output_stream
            .iter()
            .any(|o| matches!(o, RTObject::Value(ValueType::String(_))))
    }

    pub(crate) fn push_to_output_stream(&mut self, obj: RTObject) {
        if let RTObject::Value(ValueType::String(s)) = &obj {
            if let Some(list_text) = StoryState::try_splitting_head_tail_whitespace(&s.string) {
                for text_obj in list_text {
                    self.push_to_output_stream_individual(RTObject::Value(ValueType::String(text_obj)));
                }
                self.output_stream_dirty();
                return;
            }
        }

        self.push_to_output_stream_individual(obj);
    }

    // Splits "  \n  text  \n " into its leading newline, the inner text and
    // the trailing newline so that each can be trimmed separately. None when
    // the text has no newline at either end.
    fn try_splitting_head_tail_whitespace(text: &str) -> Option<Vec<StringValue>> {
        let mut head_first_newline_idx = None;
        let mut head_last_newline_idx = None;
        for (i, c) in text.char_indices() {
            match c {
                '\n' => {
                    head_first_newline_idx.get_or_insert(i);
                    head_last_newline_idx = Some(i);
                }
                ' ' | '\t' => continue,
                _ => break,
            }
        }

        let mut tail_last_newline_idx = None;
        let mut tail_first_newline_idx = None;
        for (i, c) in text.char_indices().rev() {
            match c {
                '\n' => {
                    tail_last_newline_idx.get_or_insert(i);
                    tail_first_newline_idx = Some(i);
                }
                ' ' | '\t' => continue,
                _ => break,
            }
        }

        if head_first_newline_idx.is_none() && tail_last_newline_idx.is_none() {
            return None;
        }

        let mut list_texts = Vec::new();
        let mut inner_str_start = 0;
        let mut inner_str_end = text.len();

        if let (Some(head_first), Some(head_last)) = (head_first_newline_idx, head_last_newline_idx) {
            if head_first > 0 {
                list_texts.push(StringValue::new(&text[0..head_first]));
            }
            list_texts.push(StringValue::new("\n"));
            inner_str_start = head_last + 1;
        }

        if let Some(tail_first) = tail_first_newline_idx {
            inner_str_end = tail_first;
        }

        if inner_str_end > inner_str_start {
            list_texts.push(StringValue::new(&text[inner_str_start..inner_str_end]));
        }

        if let (Some(tail_last), Some(tail_first)) = (tail_last_newline_idx, tail_first_newline_idx) {
            if head_last_newline_idx.map_or(true, |head_last| tail_first > head_last) {
                list_texts.push(StringValue::new("\n"));
                if tail_last < text.len() - 1 {
                    list_texts.push(StringValue::new(&text[tail_last + 1..]));
                }
            }
        }

        Some(list_texts)
    }

    fn push_to_output_stream_individual(&mut self, obj: RTObject) {
        let mut include_in_output = true;

        match &obj {
            // New glue, so chomp away any whitespace from the end of the stream
            RTObject::Glue => self.trim_newlines_from_output_stream(),

            // New text: do we really want to append it, if it's whitespace?
            // Whitespace is thrown away at function start/end and after glue.
            RTObject::Value(ValueType::String(text)) => {
                let mut function_trim_index = -1;

                let curr_el = self.callstack.get_current_element();
                if curr_el.push_pop_type == PushPopType::Function {
                    function_trim_index = curr_el.function_start_in_output_stream;
                }

                let mut glue_trim_index = -1;
                for (i, o) in self.output_stream.iter().enumerate().rev() {
                    match o {
                        RTObject::ControlCommand(CommandType::BeginString) => {
                            if i as i32 >= function_trim_index {
                                function_trim_index = -1;
                            }
                            break;
                        }
                        RTObject::Glue => {
                            glue_trim_index = i as i32;
                            break;
                        }
                        _ => {}
                    }
                }

                let trim_index = if glue_trim_index != -1 && function_trim_index != -1 {
                    function_trim_index.min(glue_trim_index)
                } else if glue_trim_index != -1 {
                    glue_trim_index
                } else {
                    function_trim_index
                };

                if trim_index != -1 {
                    if text.is_newline {
                        include_in_output = false;
                    } else if text.is_non_whitespace() {
                        if glue_trim_index > -1 {
                            self.remove_existing_glue();
                        }

                        // Content has started, so no more start-of-function
                        // trimming for the enclosing functions
                        if function_trim_index > -1 {
                            for el in self.callstack.get_callstack_mut().iter_mut().rev() {
                                if el.push_pop_type == PushPopType::Function {
                                    el.function_start_in_output_stream = -1;
                                } else {
                                    break;
                                }
                            }
                        }
                    }
                } else if text.is_newline
                    && (self.output_stream_ends_in_newline() || !self.output_stream_contains_content())
                {
                    include_in_output = false;
                }
            }
            _ => {}
        }

        if include_in_output {
            self.output_stream.push(obj);
            self.output_stream_dirty();
        }
    }

    // Removes the trailing newlines (and the whitespace between them) that
    // precede new glue.
    fn trim_newlines_from_output_stream(&mut self) {
        let mut remove_whitespace_from = None;

        for (i, obj) in self.output_stream.iter().enumerate().rev() {
            match obj {
                RTObject::ControlCommand(_) => break,
                RTObject::Value(ValueType::String(sv)) => {
                    if sv.is_non_whitespace() {
                        break;
                    } else if sv.is_newline {
                        remove_whitespace_from = Some(i);
                    }
                }
                _ => {}
            }
        }

        if let Some(from) = remove_whitespace_from {
            let mut i = from;
            while i < self.output_stream.len() {
                if matches!(self.output_stream[i], RTObject::Value(ValueType::String(_))) {
                    self.output_stream.remove(i);
                } else {
                    i += 1;
                }
            }
        }

        self.output_stream_dirty();
    }

    fn remove_existing_glue(&mut self) {
        let mut i = self.output_stream.len();
        while i > 0 {
            i -= 1;
            match self.output_stream[i] {
                RTObject::Glue => {
                    self.output_stream.remove(i);
                }
                RTObject::ControlCommand(_) => break,
                _ => {}
            }
        }

        self.output_stream_dirty();
    }

    pub(crate) fn pop_from_output_stream(&mut self, count: usize) {
        let len = self.output_stream.len();
        self.output_stream.truncate(len.saturating_sub(count));
        self.output_stream_dirty();
    }

    pub(crate) fn push_evaluation_stack(&mut self, obj: RTObject) {
        self.evaluation_stack.push(obj);
    }

    pub(crate) fn pop_evaluation_stack(&mut self) -> Result<RTObject, StoryError> {
        self.evaluation_stack
            .pop()
            .ok_or_else(|| StoryError::Structural("Trying to pop from an empty evaluation stack".to_owned()))
    }

    pub(crate) fn pop_evaluation_stack_multiple(
        &mut self,
        number_of_objects: usize,
    ) -> Result<Vec<RTObject>, StoryError> {
        if number_of_objects > self.evaluation_stack.len() {
            return Err(StoryError::Structural(
                "Trying to pop too many objects from the evaluation stack".to_owned(),
            ));
        }

        let start = self.evaluation_stack.len() - number_of_objects;
        Ok(self.evaluation_stack.drain(start..).collect())
    }

    pub(crate) fn peek_evaluation_stack(&self) -> Option<&RTObject> {
        self.evaluation_stack.last()
    }

    fn count_key(&self, container: NodeId) -> String {
        self.tree().path_of(container).to_string()
    }

    pub(crate) fn increment_visit_count_for_container(&mut self, container: NodeId) {
        let key = self.count_key(container);
        *self.visit_counts.entry(key).or_insert(0) += 1;
    }

    /// Times the container was visited, `None` if the container doesn't
    /// count its visits.
    pub(crate) fn visit_count_for_container(&self, container: NodeId) -> Option<i32> {
        if !self.tree().container(container)?.visits_should_be_counted {
            return None;
        }

        Some(
            self.visit_counts
                .get(&self.count_key(container))
                .copied()
                .unwrap_or(0),
        )
    }

    pub(crate) fn record_turn_index_visit_to_container(&mut self, container: NodeId) {
        let key = self.count_key(container);
        self.turn_indices.insert(key, self.current_turn_index);
    }

    /// Turns elapsed since the container was last visited, -1 if never.
    /// `None` if the container doesn't record turn indices.
    pub(crate) fn turns_since_for_container(&self, container: NodeId) -> Option<i32> {
        if !self.tree().container(container)?.turn_index_should_be_counted {
            return None;
        }

        Some(match self.turn_indices.get(&self.count_key(container)) {
            Some(index) => self.current_turn_index - index,
            None => -1,
        })
    }

    pub fn visit_count_at_path_string(&self, path_string: &str) -> Result<i32, StoryError> {
        let path = Path::new_with_components_string(path_string);

        if self
            .tree()
            .content_at_path(self.tree().root(), &path, 0, None)
            .correct_obj()
            .and_then(|id| self.tree().container(id))
            .is_none()
        {
            return Err(StoryError::Address(format!(
                "Content at path not found: {path_string}"
            )));
        }

        Ok(self.visit_counts.get(path_string).copied().unwrap_or(0))
    }

    pub(crate) fn try_exit_function_evaluation_from_game(&mut self) -> bool {
        if self.callstack.element_is_evaluate_from_game() {
            self.set_current_pointer(pointer::NULL);
            self.did_safe_exit = true;
            return true;
        }

        false
    }

    pub(crate) fn pop_callstack(&mut self, t: Option<PushPopType>) -> Result<(), StoryError> {
        // At the end of a function call, trim any whitespace from the end.
        if self.callstack.get_current_element().push_pop_type == PushPopType::Function {
            self.trim_whitespace_from_function_end();
        }

        self.callstack.pop(t)
    }

    // We always trim the start and end of the text that a function produces.
    // The start whitespace is discarded as it is generated, and the end
    // whitespace is trimmed in one go here when we pop the function.
    fn trim_whitespace_from_function_end(&mut self) {
        let function_start_point = self
            .callstack
            .get_current_element()
            .function_start_in_output_stream
            .max(0) as usize;

        let mut i = self.output_stream.len();
        while i > function_start_point {
            i -= 1;
            match &self.output_stream[i] {
                RTObject::ControlCommand(_) => break,
                RTObject::Value(ValueType::String(txt)) => {
                    if txt.is_newline || txt.is_inline_whitespace {
                        self.output_stream.remove(i);
                        self.output_stream_dirty();
                    } else {
                        break;
                    }
                }
                _ => {}
            }
        }
    }

    pub(crate) fn force_end(&mut self) {
        self.callstack.reset();

        self.current_choices.clear();

        self.set_current_pointer(pointer::NULL);
        self.set_previous_pointer(pointer::NULL);

        self.did_safe_exit = true;
    }

    /// Moves to `path`, dropping the current choices.
    pub(crate) fn set_chosen_path(&mut self, path: &Path, incrementing_turn_index: bool) -> Result<(), StoryError> {
        // Changing direction, assume we need to clear current set of choices
        self.current_choices.clear();

        let (mut new_pointer, warning) = self.tree().pointer_at_path(path)?;
        if let Some(warning) = warning {
            self.add_error(&warning, true);
        }

        if !new_pointer.is_null() && new_pointer.index == -1 {
            new_pointer.index = 0;
        }

        self.set_current_pointer(new_pointer);

        if incrementing_turn_index {
            self.current_turn_index += 1;
        }

        Ok(())
    }

    pub(crate) fn start_function_evaluation_from_game(
        &mut self,
        func_container: NodeId,
        arguments: &[ValueType],
    ) -> Result<(), StoryError> {
        self.callstack.push(
            PushPopType::FunctionEvaluationFromGame,
            self.evaluation_stack.len(),
            0,
        );
        self.set_current_pointer(Pointer::start_of(func_container));

        self.pass_arguments_to_evaluation_stack(arguments)
    }

    pub(crate) fn pass_arguments_to_evaluation_stack(&mut self, arguments: &[ValueType]) -> Result<(), StoryError> {
        for arg in arguments {
            match arg {
                ValueType::DivertTarget(_) | ValueType::VariablePointer(_) => {
                    return Err(StoryError::BadArgument(format!(
                        "ink arguments when calling EvaluateFunction / ChoosePathStringWithParameters must be int, float, string, bool or InkList. Argument was {}",
                        arg.kind()
                    )))
                }
                _ => self.push_evaluation_stack(RTObject::Value(arg.clone())),
            }
        }

        Ok(())
    }

    pub(crate) fn complete_function_evaluation_from_game(&mut self) -> Result<Option<ValueType>, StoryError> {
        if !self.callstack.element_is_evaluate_from_game() {
            return Err(StoryError::Structural(format!(
                "Expected external function evaluation to be complete. Stack trace: {}",
                self.callstack.get_callstack_trace(self.tree())
            )));
        }

        let original_evaluation_stack_height = self
            .callstack
            .get_current_element()
            .evaluation_stack_height_when_pushed;

        // Pop every value left over, in case the caller passed too many
        // arguments. The first one popped is the return value.
        let mut returned_obj = None;
        while self.evaluation_stack.len() > original_evaluation_stack_height {
            let popped_obj = self.pop_evaluation_stack()?;
            returned_obj.get_or_insert(popped_obj);
        }

        // Finally, pop the external function evaluation
        self.callstack.pop(Some(PushPopType::FunctionEvaluationFromGame))?;

        Ok(returned_obj.and_then(RTObject::into_value))
    }

    pub fn to_json(&self) -> Result<String, StoryError> {
        Ok(self.write_json()?.to_string())
    }

    /// Replaces this state with a saved one. On error the state is left
    /// untouched.
    pub fn load_json(&mut self, save_string: &str) -> Result<(), StoryError> {
        let jobj: serde_json::Value = serde_json::from_str(save_string)
            .map_err(|e| StoryError::Decode(format!("State not in JSON format: {e}")))?;

        let jobj = jobj
            .as_object()
            .ok_or_else(|| StoryError::Decode("State not in JSON format.".to_owned()))?;

        let version = jobj
            .get("inkSaveVersion")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| StoryError::Decode("ink save format incorrect, can't load.".to_owned()))?
            as i32;

        if version < MIN_COMPATIBLE_LOAD_VERSION {
            return Err(StoryError::Version {
                found: version,
                message: format!(
                    "Ink save format isn't compatible with the current version (saw '{version}', but minimum is {MIN_COMPATIBLE_LOAD_VERSION}), so can't load."
                ),
            });
        }

        let mut loaded = self.clone();
        loaded.load_json_obj(jobj)?;
        *self = loaded;

        Ok(())
    }

    fn write_json(&self) -> Result<serde_json::Value, StoryError> {
        let tree = self.tree();
        let mut obj: Map<String, serde_json::Value> = Map::new();

        obj.insert("callstackThreads".to_owned(), self.callstack.write_json(tree)?);
        obj.insert(
            "outputStream".to_owned(),
            json_write::write_list_rt_objs(&self.output_stream),
        );

        // Threads of choices whose generating thread is no longer live
        let mut jct: Map<String, serde_json::Value> = Map::new();
        for c in self.current_choices.iter() {
            if let Some(thread) = &c.thread_at_generation {
                if self.callstack.get_thread_with_index(thread.thread_index).is_none() {
                    jct.insert(thread.thread_index.to_string(), thread.write_json(tree)?);
                }
            }
        }

        if !jct.is_empty() {
            obj.insert("choiceThreads".to_owned(), serde_json::Value::Object(jct));
        }

        obj.insert(
            "currentChoices".to_owned(),
            serde_json::Value::Array(self.current_choices.iter().map(json_write::write_choice).collect()),
        );

        obj.insert("variablesState".to_owned(), self.variables_state.write_json()?);
        obj.insert(
            "evalStack".to_owned(),
            json_write::write_list_rt_objs(&self.evaluation_stack),
        );

        if let Some(path) = self.diverted_pointer.get_path(tree) {
            obj.insert("currentDivertTarget".to_owned(), json!(path.get_components_string()));
        }

        obj.insert("visitCounts".to_owned(), json_write::write_int_dictionary(&self.visit_counts));
        obj.insert("turnIndices".to_owned(), json_write::write_int_dictionary(&self.turn_indices));

        obj.insert("turnIdx".to_owned(), json!(self.current_turn_index));
        obj.insert("storySeed".to_owned(), json!(self.story_seed));
        obj.insert("previousRandom".to_owned(), json!(self.previous_random));

        obj.insert("inkSaveVersion".to_owned(), json!(INK_SAVE_STATE_VERSION));
        obj.insert("inkFormatVersion".to_owned(), json!(INK_VERSION_CURRENT));

        Ok(serde_json::Value::Object(obj))
    }

    fn load_json_obj(&mut self, jobj: &Map<String, serde_json::Value>) -> Result<(), StoryError> {
        let content = self.content.clone();
        let tree = &content.tree;
        let mut warnings = Vec::new();

        let get_object = |key: &str| {
            jobj.get(key)
                .and_then(|o| o.as_object())
                .ok_or_else(|| StoryError::Decode(format!("Invalid or missing '{key}' in saved state")))
        };

        let get_array = |key: &str| {
            jobj.get(key)
                .and_then(|o| o.as_array())
                .ok_or_else(|| StoryError::Decode(format!("Invalid or missing '{key}' in saved state")))
        };

        let get_int = |key: &str| {
            jobj.get(key)
                .and_then(|o| o.as_i64())
                .map(|i| i as i32)
                .ok_or_else(|| StoryError::Decode(format!("Invalid or missing '{key}' in saved state")))
        };

        self.callstack
            .load_json(tree, get_object("callstackThreads")?, &mut warnings)?;

        self.output_stream = json_read::jarray_to_rtobjects(get_array("outputStream")?)?;

        let mut current_choices = get_array("currentChoices")?
            .iter()
            .map(json_read::jobject_to_choice)
            .collect::<Result<Vec<Choice>, StoryError>>()?;

        // Each choice gets the live thread it was generated on, or else the
        // copy saved next to it
        let j_choice_threads = jobj.get("choiceThreads").and_then(|c| c.as_object());
        for choice in current_choices.iter_mut() {
            let thread = match self.callstack.get_thread_with_index(choice.original_thread_index) {
                Some(t) => t.clone(),
                None => {
                    let j_saved_choice_thread = j_choice_threads
                        .and_then(|ct| ct.get(&choice.original_thread_index.to_string()))
                        .and_then(|t| t.as_object())
                        .ok_or_else(|| {
                            StoryError::Decode(format!(
                                "Missing thread {} for choice '{}'",
                                choice.original_thread_index, choice.text
                            ))
                        })?;
                    Thread::from_json(tree, j_saved_choice_thread, &mut warnings)?
                }
            };

            choice.thread_at_generation = Some(thread);
        }

        self.current_choices = current_choices;

        self.variables_state.load_json(get_object("variablesState")?)?;

        self.evaluation_stack = json_read::jarray_to_rtobjects(get_array("evalStack")?)?;

        self.diverted_pointer = match jobj.get("currentDivertTarget").and_then(|p| p.as_str()) {
            Some(divert_path) => {
                let (p, warning) = tree.pointer_at_path(&Path::new_with_components_string(divert_path))?;
                warnings.extend(warning);
                p
            }
            None => pointer::NULL,
        };

        self.visit_counts = json_read::jobject_to_int_hashmap(get_object("visitCounts")?)?;
        self.turn_indices = json_read::jobject_to_int_hashmap(get_object("turnIndices")?)?;

        self.current_turn_index = get_int("turnIdx")?;
        self.story_seed = get_int("storySeed")?;

        // Missing in some older saves
        self.previous_random = get_int("previousRandom").unwrap_or(0);

        self.did_safe_exit = false;
        self.output_stream_dirty();

        for warning in warnings {
            self.add_error(&warning, true);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: Vec<StringValue>) -> Vec<String> {
        values.into_iter().map(|s| s.string).collect()
    }

    #[test]
    fn head_and_tail_newlines_are_split_off() {
        let split = StoryState::try_splitting_head_tail_whitespace("  \nhello world \n ");

        assert_eq!(
            Some(vec!["  ", "\n", "hello world ", "\n", " "]),
            split.as_ref().map(|s| s.iter().map(|v| v.string.as_str()).collect::<Vec<_>>())
        );

        assert_eq!(None, StoryState::try_splitting_head_tail_whitespace("no newline").map(strings));
        assert_eq!(Some(vec!["\n".to_owned()]), StoryState::try_splitting_head_tail_whitespace("\n").map(strings));
    }

    #[test]
    fn inline_whitespace_is_collapsed() {
        assert_eq!("a b\nc", StoryState::clean_output_whitespace("a   b\n  c"));
        assert_eq!("x y\n", StoryState::clean_output_whitespace("x \t y  \n"));
    }

    #[test]
    fn split_handles_multibyte_text() {
        assert_eq!(
            Some(vec!["\n".to_owned(), "héllo ñ".to_owned(), "\n".to_owned()]),
            StoryState::try_splitting_head_tail_whitespace("\nhéllo ñ\n").map(strings)
        );
    }
}
