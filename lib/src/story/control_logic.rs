use crate::{
    container::ContentTree,
    control_command::CommandType,
    divert::Divert,
    ink_list::InkList,
    native_function_call,
    object::{NodeId, NodeKind, RTObject},
    pointer,
    push_pop::PushPopType,
    story::Story,
    story_error::StoryError,
    story_state::StoryState,
    tag::Tag,
    value_type::ValueType,
    variable_assignment::VariableAssignment,
    variable_reference::VariableReference,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

/// # Control and Logic
/// Methods for performing logic and flow control.
impl Story {
    /// Runs `content_obj` if it is a divert, command, variable access or
    /// operator. Returns `false` for plain content.
    pub(crate) fn perform_logic_and_flow_control(
        &mut self,
        content_obj: Option<NodeId>,
    ) -> Result<bool, StoryError> {
        let Some(id) = content_obj else {
            return Ok(false);
        };

        let content = self.content.clone();
        let tree = &content.tree;

        match tree.kind(id) {
            NodeKind::Divert(divert) => self.perform_divert(tree, divert)?,
            NodeKind::ControlCommand(command) => self.perform_control_command(tree, *command)?,
            NodeKind::VariableAssignment(var_ass) => self.perform_variable_assignment(var_ass)?,
            NodeKind::VariableReference(var_ref) => self.perform_variable_reference(tree, var_ref)?,
            NodeKind::NativeFunctionCall(op) => {
                let func_params = self
                    .state
                    .pop_evaluation_stack_multiple(op.get_number_of_parameters())?;

                let result = native_function_call::call(*op, func_params, &content.list_definitions)?;
                self.state.push_evaluation_stack(RTObject::Value(result));
            }
            // No control content, must be ordinary content
            _ => return Ok(false),
        }

        Ok(true)
    }

    fn perform_divert(&mut self, tree: &ContentTree, current_divert: &Divert) -> Result<(), StoryError> {
        if current_divert.is_conditional {
            let o = self.state.pop_evaluation_stack()?;
            if !self.is_truthy(&o)? {
                return Ok(());
            }
        }

        if let Some(var_name) = &current_divert.variable_divert_name {
            let var_contents = self
                .state
                .variables_state
                .get_variable_with_name(&self.state.callstack, var_name, -1);

            match var_contents {
                Some(ValueType::DivertTarget(target)) => {
                    let (p, warning) = tree.pointer_at_path(&target)?;
                    if let Some(warning) = warning {
                        self.add_warning(&warning);
                    }

                    self.state.diverted_pointer = p;
                }
                Some(other) => {
                    let mut error_message = format!(
                        "Tried to divert to a target from a variable, but the variable ({var_name}) didn't contain a divert target, it "
                    );

                    if other == ValueType::Int(0) {
                        error_message.push_str("was empty/null (the value 0).");
                    } else {
                        error_message.push_str(&format!("contained '{other}'."));
                    }

                    return Err(StoryError::Type(error_message));
                }
                None => {
                    return Err(StoryError::Address(format!(
                        "Tried to divert using a target from a variable that could not be found ({var_name})"
                    )));
                }
            }
        } else if current_divert.is_external {
            let func_name = current_divert
                .get_target_path()
                .map(|p| p.get_components_string())
                .unwrap_or_default();

            return self.call_external_function(&func_name, current_divert.external_args);
        } else {
            match current_divert.get_target_pointer() {
                Some(p) => self.state.diverted_pointer = p,
                None => {
                    return Err(StoryError::Address(format!(
                        "Divert resolution failed: {current_divert}"
                    )))
                }
            }
        }

        if current_divert.pushes_to_stack {
            let output_len = self.state.get_output_stream().len() as i32;
            self.state
                .callstack
                .push(current_divert.stack_push_type, 0, output_len);
        }

        Ok(())
    }

    fn perform_control_command(&mut self, tree: &ContentTree, command: CommandType) -> Result<(), StoryError> {
        match command {
            CommandType::EvalStart => {
                if self.state.get_in_expression_evaluation() {
                    return Err(StoryError::Structural(
                        "Already in expression evaluation?".to_owned(),
                    ));
                }

                self.state.set_in_expression_evaluation(true);
            }
            CommandType::EvalOutput => {
                // If the expression turned out to be empty, there may not be
                // anything on the stack
                if !self.state.evaluation_stack.is_empty() {
                    let output = self.state.pop_evaluation_stack()?;

                    // Functions may evaluate to Void, in which case we skip
                    // output
                    if !matches!(output, RTObject::Void) {
                        self.state
                            .push_to_output_stream(RTObject::new_string(&output.to_string()));
                    }
                }
            }
            CommandType::EvalEnd => {
                if !self.state.get_in_expression_evaluation() {
                    return Err(StoryError::Structural(
                        "Not in expression evaluation mode".to_owned(),
                    ));
                }

                self.state.set_in_expression_evaluation(false);
            }
            CommandType::Duplicate => {
                let obj = self
                    .state
                    .peek_evaluation_stack()
                    .cloned()
                    .ok_or_else(|| StoryError::Structural("Nothing to duplicate on the evaluation stack".to_owned()))?;

                self.state.push_evaluation_stack(obj);
            }
            CommandType::PopEvaluatedValue => {
                self.state.pop_evaluation_stack()?;
            }
            CommandType::PopFunction | CommandType::PopTunnel => {
                self.perform_pop(tree, command)?;
            }
            CommandType::BeginString => {
                self.state.push_to_output_stream(RTObject::ControlCommand(command));

                if !self.state.get_in_expression_evaluation() {
                    return Err(StoryError::Structural(
                        "Expected to be in an expression when evaluating a string".to_owned(),
                    ));
                }

                self.state.set_in_expression_evaluation(false);
            }
            CommandType::EndString => self.perform_end_string()?,
            CommandType::NoOp => {}
            CommandType::ChoiceCount => {
                let choice_count = self.state.get_generated_choices().len() as i32;
                self.state.push_evaluation_stack(RTObject::Value(ValueType::Int(choice_count)));
            }
            CommandType::Turns => {
                let turns = self.state.current_turn_index + 1;
                self.state.push_evaluation_stack(RTObject::Value(ValueType::Int(turns)));
            }
            CommandType::TurnsSince | CommandType::ReadCount => {
                let target = self.state.pop_evaluation_stack()?;

                let divert_target = match target {
                    RTObject::Value(ValueType::DivertTarget(p)) => p,
                    other => {
                        let extra_note = if matches!(other, RTObject::Value(ValueType::Int(_))) {
                            ". Did you accidentally pass a read count ('knot_name') instead of a target ('-> knot_name')?"
                        } else {
                            ""
                        };

                        return Err(StoryError::Type(format!(
                            "{command} expected a divert target (knot, stitch, label name), but saw {other}{extra_note}"
                        )));
                    }
                };

                let container = tree
                    .content_at_path(tree.root(), &divert_target, 0, None)
                    .correct_obj()
                    .filter(|id| tree.container(*id).is_some());

                let either_count = match container {
                    Some(container) => {
                        if command == CommandType::TurnsSince {
                            self.turns_since_for_container(container)
                        } else {
                            self.visit_count_for_container(container)
                        }
                    }
                    None => {
                        self.add_warning(&format!(
                            "Failed to find container for {command} lookup at {divert_target}"
                        ));

                        if command == CommandType::TurnsSince {
                            // turn count, default to never/unknown
                            -1
                        } else {
                            // visit count, assume 0 to default to allowing entry
                            0
                        }
                    }
                };

                self.state.push_evaluation_stack(RTObject::Value(ValueType::Int(either_count)));
            }
            CommandType::Random => {
                let max_int = self.pop_int("Invalid value for maximum parameter of RANDOM(min, max)")?;
                let min_int = self.pop_int("Invalid value for minimum parameter of RANDOM(min, max)")?;

                // +1 because it's inclusive of min and max, for e.g.
                // RANDOM(1,6) for a dice roll.
                let random_range = max_int as i64 - min_int as i64 + 1;
                if random_range <= 0 || random_range > i32::MAX as i64 {
                    return Err(StoryError::Type(format!(
                        "RANDOM was called with minimum as {min_int} and maximum as {max_int}. The maximum must be larger"
                    )));
                }

                let result_seed = self.state.story_seed.wrapping_add(self.state.previous_random);
                let mut rng = StdRng::seed_from_u64(result_seed as u64);
                let next_random = rng.gen::<u32>();
                let chosen_value = (next_random as i64 % random_range + min_int as i64) as i32;

                self.state.push_evaluation_stack(RTObject::Value(ValueType::Int(chosen_value)));

                // Next random number (rather than keeping the Random object around)
                self.state.previous_random = self.state.previous_random.wrapping_add(1);
            }
            CommandType::SeedRandom => {
                let seed = self.pop_int("Invalid value passed to SEED_RANDOM")?;

                // Story seed affects both RANDOM and shuffle behaviour
                self.state.story_seed = seed;
                self.state.previous_random = 0;

                // SEED_RANDOM returns nothing.
                self.state.push_evaluation_stack(RTObject::Void);
            }
            CommandType::VisitIndex => {
                let container = self.state.get_current_pointer().container.ok_or_else(|| {
                    StoryError::Structural("Visit index outside of a container".to_owned())
                })?;

                // index not count, so subtract 1
                let count = self.visit_count_for_container(container) - 1;
                self.state.push_evaluation_stack(RTObject::Value(ValueType::Int(count)));
            }
            CommandType::SequenceShuffleIndex => {
                let shuffle_index = self.next_sequence_shuffle_index()?;
                self.state.push_evaluation_stack(RTObject::Value(ValueType::Int(shuffle_index)));
            }
            CommandType::StartThread => {
                // Handled in the main step function
            }
            CommandType::Done => {
                // We may exist in the context of the initial
                // act of creating the thread, or in the context of
                // evaluating the content.
                if self.state.get_callstack().can_pop_thread() {
                    self.state.callstack.pop_thread()?;
                }
                // In normal flow - allow safe exit without warning
                else {
                    self.state.did_safe_exit = true;

                    // Stop flow in current thread
                    self.state.set_current_pointer(pointer::NULL);
                }
            }
            // Force flow to end completely
            CommandType::End => self.state.force_end(),
            CommandType::ListFromInt => {
                let int_val = self.pop_int("Passed non-integer when creating a list element from a numerical value.")?;

                let list_name = match self.state.pop_evaluation_stack()? {
                    RTObject::Value(ValueType::String(s)) => s.string,
                    other => {
                        return Err(StoryError::Type(format!(
                            "Expected a list name when creating a list element, but saw {other}"
                        )))
                    }
                };

                let def = self
                    .content
                    .list_definitions
                    .get_list_definition(&list_name)
                    .ok_or_else(|| StoryError::Address(format!("Failed to find LIST called {list_name}")))?;

                let generated_list = match def.get_item_with_value(int_val) {
                    Some(item) => InkList::from_single_element(item, int_val),
                    None => InkList::new(),
                };

                self.state.push_evaluation_stack(RTObject::Value(ValueType::List(generated_list)));
            }
            CommandType::ListRange => {
                let max = self.pop_value("Expected a value for the maximum of LIST_RANGE")?;
                let min = self.pop_value("Expected a value for the minimum of LIST_RANGE")?;
                let target_list = match self.state.pop_evaluation_stack()? {
                    RTObject::Value(ValueType::List(l)) => l,
                    _ => {
                        return Err(StoryError::Type(
                            "Expected a list to be passed to LIST_RANGE".to_owned(),
                        ))
                    }
                };

                let result = target_list.list_with_sub_range(&min, &max);
                self.state.push_evaluation_stack(RTObject::Value(ValueType::List(result)));
            }
            CommandType::ListRandom => {
                let list = match self.state.pop_evaluation_stack()? {
                    RTObject::Value(ValueType::List(l)) => l,
                    _ => {
                        return Err(StoryError::Type(
                            "Expected a list to be passed to LIST_RANDOM".to_owned(),
                        ))
                    }
                };

                // List was empty: return empty list
                let new_list = if list.items.is_empty() {
                    InkList::new()
                }
                // Non-empty source list
                else {
                    let result_seed = self.state.story_seed.wrapping_add(self.state.previous_random);
                    let mut rng = StdRng::seed_from_u64(result_seed as u64);
                    let next_random = rng.gen::<u32>();
                    let list_item_index = next_random as usize % list.items.len();

                    // Iterate through to get the random element, sorted for
                    // predictibility
                    let mut sorted: Vec<_> = list.items.iter().collect();
                    sorted.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
                    let (item, value) = sorted[list_item_index];

                    let mut new_list = match item.get_origin_name() {
                        Some(origin) => InkList::from_single_origin(origin),
                        None => InkList::new(),
                    };
                    new_list.items.insert(item.clone(), *value);

                    self.state.previous_random = next_random as i32;

                    new_list
                };

                self.state.push_evaluation_stack(RTObject::Value(ValueType::List(new_list)));
            }
            CommandType::BeginTag => {
                self.state.push_to_output_stream(RTObject::ControlCommand(command));
            }
            CommandType::EndTag => self.perform_end_tag()?,
        }

        Ok(())
    }

    fn perform_pop(&mut self, tree: &ContentTree, command: CommandType) -> Result<(), StoryError> {
        let pop_type = if command == CommandType::PopFunction {
            PushPopType::Function
        } else {
            PushPopType::Tunnel
        };

        // Tunnel onwards is allowed to specify an optional override
        // divert to go to immediately after returning: ->-> target
        let mut override_tunnel_return_target = None;
        if pop_type == PushPopType::Tunnel {
            match self.state.pop_evaluation_stack()? {
                RTObject::Value(ValueType::DivertTarget(target)) => {
                    override_tunnel_return_target = Some(target)
                }
                RTObject::Void => {}
                _ => {
                    return Err(StoryError::Structural(
                        "Expected void if ->-> doesn't override target".to_owned(),
                    ))
                }
            }
        }

        if self.state.try_exit_function_evaluation_from_game() {
            return Ok(());
        }

        let callstack = self.state.get_callstack();
        let current_type = callstack.get_current_element().push_pop_type;

        if current_type != pop_type || !callstack.can_pop() {
            let name_of = |t: PushPopType| match t {
                PushPopType::Function => "function return statement (~ return)",
                PushPopType::Tunnel => "tunnel onwards statement (->->)",
                PushPopType::FunctionEvaluationFromGame => "end of function evaluation",
            };

            let expected = if !callstack.can_pop() {
                "end of flow (-> END or choice)"
            } else {
                name_of(current_type)
            };

            return Err(StoryError::Structural(format!(
                "Found {}, when expected {expected}",
                name_of(pop_type)
            )));
        }

        self.state.pop_callstack(None)?;

        // Does tunnel onwards override by diverting to a new ->-> target?
        if let Some(target) = override_tunnel_return_target {
            let (p, warning) = tree.pointer_at_path(&target)?;
            if let Some(warning) = warning {
                self.add_warning(&warning);
            }

            self.state.diverted_pointer = p;
        }

        Ok(())
    }

    // Since we're iterating backward through the content, build a stack so
    // that when we build the string, it's in the right order.
    fn perform_end_string(&mut self) -> Result<(), StoryError> {
        let output_stream = self.state.get_output_stream();

        let mut content_stack_for_string = Vec::new();
        let mut content_to_retain = Vec::new();
        let mut output_count_consumed = 0;

        for obj in output_stream.iter().rev() {
            output_count_consumed += 1;

            match obj {
                RTObject::ControlCommand(CommandType::BeginString) => break,
                RTObject::Tag(_) => content_to_retain.push(obj.clone()),
                RTObject::Value(ValueType::String(sv)) => content_stack_for_string.push(sv.string.clone()),
                _ => {}
            }
        }

        // Consume the content that was produced for this string
        self.state.pop_from_output_stream(output_count_consumed);

        // Rescue the tags that we want actually to keep on the output stack
        // rather than consume as part of the string we're building.
        // At the time of writing, this only applies to Tag objects generated
        // by choices, which are pushed to the stack during string generation.
        for rescued_tag in content_to_retain.into_iter().rev() {
            self.state.push_to_output_stream(rescued_tag);
        }

        // Build string out of the content we collected
        let s: String = content_stack_for_string.into_iter().rev().collect();

        // Return to expression evaluation (from content mode)
        self.state.set_in_expression_evaluation(true);
        self.state.push_evaluation_stack(RTObject::new_string(&s));

        Ok(())
    }

    fn perform_end_tag(&mut self) -> Result<(), StoryError> {
        // EndTag has 2 modes:
        //  - When in string evaluation (for choices)
        //  - Normal
        //
        // The only way you could have an EndTag in the middle of
        // string evaluation is if we're currently generating text for a
        // choice, such as:
        //
        //   + choice # tag
        //
        // In the above case, the ink will be run twice:
        //  - First, to generate the choice text. String evaluation
        //    will be on, and the final string will be pushed to the
        //    evaluation stack, ready to be popped to make a Choice
        //    object.
        //  - Second, when ink generates text after choosing the choice.
        //    On this ocassion, it's not in string evaluation mode.
        //
        // On the writing side, we disallow manually putting tags within
        // strings like this:
        //
        //   {"hello # world"}
        //
        // So we know that the tag must be being generated as part of
        // choice content. Therefore, when the tag has been generated,
        // we push it onto the evaluation stack in the exact same way
        // as the string for the choice content.
        if !self.state.in_string_evaluation() {
            // Otherwise! Simply push EndTag, so that in the output stream we
            // have a structure of: [BeginTag, "the tag content", EndTag]
            self.state
                .push_to_output_stream(RTObject::ControlCommand(CommandType::EndTag));
            return Ok(());
        }

        let mut content_stack_for_tag = Vec::new();
        let mut output_count_consumed = 0;

        for obj in self.state.get_output_stream().iter().rev() {
            output_count_consumed += 1;

            match obj {
                RTObject::ControlCommand(CommandType::BeginTag) => break,
                RTObject::ControlCommand(_) => {
                    return Err(StoryError::Structural(
                        "Unexpected control command in string evaluation output stream".to_owned(),
                    ))
                }
                RTObject::Value(ValueType::String(sv)) => content_stack_for_tag.push(sv.string.clone()),
                _ => {}
            }
        }

        // Consume the content that was produced for this string
        self.state.pop_from_output_stream(output_count_consumed);

        let text: String = content_stack_for_tag.into_iter().rev().collect();

        let choice_tag = Tag::new(&StoryState::clean_output_whitespace(&text));

        // Pushing to the evaluation stack means it gets picked up
        // when a Choice is generated from the next Choice Point.
        self.state.push_evaluation_stack(RTObject::Tag(choice_tag));

        Ok(())
    }

    fn perform_variable_assignment(&mut self, var_ass: &VariableAssignment) -> Result<(), StoryError> {
        let assigned_val = match self.state.pop_evaluation_stack()? {
            RTObject::Value(v) => v,
            other => {
                return Err(StoryError::Type(format!(
                    "Can't assign {other} to variable {}",
                    var_ass.variable_name
                )))
            }
        };

        let state = &mut self.state;
        state
            .variables_state
            .assign(&mut state.callstack, var_ass, assigned_val)
    }

    fn perform_variable_reference(&mut self, tree: &ContentTree, var_ref: &VariableReference) -> Result<(), StoryError> {
        let found_value = if let Some(path) = var_ref.get_path_for_count() {
            // Explicit read count value
            let container = var_ref
                .container_for_count
                .filter(|id| tree.container(*id).is_some())
                .ok_or_else(|| {
                    StoryError::Address(format!("Failed to find container for read count: {path}"))
                })?;

            ValueType::Int(self.visit_count_for_container(container))
        }
        // Normal variable reference
        else {
            let value = self.state.variables_state.get_variable_with_name(
                &self.state.callstack,
                &var_ref.name,
                -1,
            );

            match value {
                Some(value) => value,
                None => {
                    self.add_warning(&format!(
                        "Variable not found: '{}'. Using default value of 0 (false). This can happen with temporary variables if the declaration hasn't yet been hit. Globals are always given a default value on load if a value doesn't exist in the save state.",
                        var_ref.name
                    ));

                    ValueType::Int(0)
                }
            }
        };

        self.state.push_evaluation_stack(RTObject::Value(found_value));

        Ok(())
    }

    fn pop_int(&mut self, error_message: &str) -> Result<i32, StoryError> {
        match self.state.pop_evaluation_stack()? {
            RTObject::Value(ValueType::Int(v)) => Ok(v),
            _ => Err(StoryError::Type(error_message.to_owned())),
        }
    }

    fn pop_value(&mut self, error_message: &str) -> Result<ValueType, StoryError> {
        self.state
            .pop_evaluation_stack()?
            .into_value()
            .ok_or_else(|| StoryError::Type(error_message.to_owned()))
    }

    /// Read count of a container, warning when the container doesn't count
    /// its visits.
    pub(crate) fn visit_count_for_container(&mut self, container: NodeId) -> i32 {
        match self.state.visit_count_for_container(container) {
            Some(count) => count,
            None => {
                let path = self.content.tree.path_of(container).clone();
                self.add_warning(&format!(
                    "Read count for target ({path}) unknown. The story may need to be compiled with countAllVisits flag (-c)."
                ));
                0
            }
        }
    }

    pub(crate) fn turns_since_for_container(&mut self, container: NodeId) -> i32 {
        match self.state.turns_since_for_container(container) {
            Some(turns) => turns,
            None => {
                let path = self.content.tree.path_of(container).clone();
                self.add_warning(&format!(
                    "TURNS_SINCE() for target ({path}) unknown. The story may need to be compiled with countAllVisits flag (-c)."
                ));
                -1
            }
        }
    }
}
