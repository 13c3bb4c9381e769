//! [`Story`] is the entry point to load and run a compiled story.
use crate::{
    container::ContentTree,
    list_definitions_origin::ListDefinitionsOrigin,
    story::{
        errors::ErrorHandler,
        external_functions::{ExternalFunctionDef, PendingExternalCall},
        variable_observer::VariableObserver,
    },
    story_state::StoryState,
    threadsafe::Brc,
};
use std::{cell::RefCell, collections::HashMap, rc::Rc};

/// The current version of the story file format.
pub const INK_VERSION_CURRENT: i32 = 21;
/// The oldest story format version that can still be loaded.
pub const INK_VERSION_MINIMUM_COMPATIBLE: i32 = 18;

#[derive(PartialEq)]
pub(crate) enum OutputStateChange {
    NoChange,
    ExtendedBeyondNewline,
    NewlineRemoved,
}

/// The immutable part of a loaded story: the content tree, the list
/// definitions and the format version. It can be shared between several
/// [`Story`] instances.
#[derive(Debug)]
pub struct StoryContent {
    pub(crate) tree: ContentTree,
    pub(crate) list_definitions: Brc<ListDefinitionsOrigin>,
    pub(crate) version: i32,
}

impl StoryContent {
    pub fn tree(&self) -> &ContentTree {
        &self.tree
    }

    pub fn list_definitions(&self) -> &ListDefinitionsOrigin {
        &self.list_definitions
    }

    /// Format version the story was compiled with.
    pub fn version(&self) -> i32 {
        self.version
    }
}

/// A `Story` is the core struct representing a complete narrative, its
/// running state and the host bindings attached to it.
pub struct Story {
    content: Brc<StoryContent>,
    state: StoryState,
    recursive_continue_count: usize,
    // A line is being produced: either a time-sliced continue or a
    // suspension on an external function is in progress.
    async_continue_active: bool,
    pub(crate) on_error: Option<Rc<RefCell<dyn ErrorHandler>>>,
    pub(crate) state_snapshot_at_last_new_line: Option<StoryState>,
    pub(crate) variable_observers: HashMap<String, Vec<Rc<RefCell<dyn VariableObserver>>>>,
    pub(crate) allow_external_function_fallbacks: bool,
    pub(crate) saw_lookahead_unsafe_function_after_new_line: bool,
    pub(crate) externals: HashMap<String, ExternalFunctionDef>,
    pub(crate) pending_external: Option<PendingExternalCall>,
    warnings_returned: bool,
}

mod misc {
    use crate::{
        json_read, json_write,
        object::RTObject,
        story::{Story, StoryContent, INK_VERSION_CURRENT},
        story_error::StoryError,
        story_state::StoryState,
        threadsafe::Brc,
        value_type::ValueType,
    };
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::collections::HashMap;

    impl Story {
        /// Construct a `Story` out of a JSON string that was compiled with
        /// `inklecate`.
        pub fn new(json_string: &str) -> Result<Self, StoryError> {
            let (version, tree, list_definitions) = json_read::load_from_string(json_string)?;

            Story::from_content(Brc::new(StoryContent {
                tree,
                list_definitions: Brc::new(list_definitions),
                version,
            }))
        }

        /// Builds a fresh story over already loaded content. The global
        /// declarations are run again for the new instance.
        pub fn from_content(content: Brc<StoryContent>) -> Result<Self, StoryError> {
            let mut story = Story {
                state: StoryState::new(content.clone()),
                content,
                recursive_continue_count: 0,
                async_continue_active: false,
                saw_lookahead_unsafe_function_after_new_line: false,
                state_snapshot_at_last_new_line: None,
                on_error: None,
                variable_observers: HashMap::with_capacity(0),
                allow_external_function_fallbacks: false,
                externals: HashMap::with_capacity(0),
                pending_external: None,
                warnings_returned: false,
            };

            story.reset_globals()?;

            let version = story.content.version;
            if version != INK_VERSION_CURRENT {
                story.add_warning(&format!("Version of ink used to build story ({version}) doesn't match current version ({INK_VERSION_CURRENT}) of engine. Non-critical, but recommend synchronising."));
            }

            Ok(story)
        }

        /// The shared, read-only part of this story.
        pub fn content(&self) -> Brc<StoryContent> {
            self.content.clone()
        }

        /// Serializes the story content back to the compiled JSON format.
        pub fn to_json_string(&self) -> String {
            json_write::write_story(&self.content.tree, &self.content.list_definitions).to_string()
        }

        /// Creates a string representing the hierarchy of objects and
        /// containers in a story, marking the current position.
        pub fn build_string_of_hierarchy(&self) -> String {
            let tree = &self.content.tree;
            let pointed = self.state.get_current_pointer().resolve(tree);

            tree.build_string_of_hierarchy(pointed)
        }

        pub(crate) fn is_truthy(&self, obj: &RTObject) -> Result<bool, StoryError> {
            match obj {
                RTObject::Value(val) => val.is_truthy(),
                _ => Ok(false),
            }
        }

        pub(crate) fn next_sequence_shuffle_index(&mut self) -> Result<i32, StoryError> {
            let num_elements = match self.state.pop_evaluation_stack()? {
                RTObject::Value(ValueType::Int(v)) if v > 0 => v,
                _ => {
                    return Err(StoryError::Structural(
                        "Expected number of elements in sequence for shuffle index".to_owned(),
                    ))
                }
            };

            let seq_container = self.state.get_current_pointer().container.ok_or_else(|| {
                StoryError::Structural("Shuffle index outside of a container".to_owned())
            })?;

            let seq_count = match self.state.pop_evaluation_stack()? {
                RTObject::Value(ValueType::Int(v)) => v,
                _ => {
                    return Err(StoryError::Structural(
                        "Expected sequence count value for shuffle index".to_owned(),
                    ))
                }
            };

            let loop_index = seq_count / num_elements;
            let iteration_index = seq_count % num_elements;

            // Generate the same shuffle based on:
            // - The hash of this container, to make sure it's consistent each time the
            //   runtime returns to the sequence
            // - How many times the runtime has looped around this full shuffle
            let seq_path_str = self.content.tree.path_of(seq_container).to_string();
            let sequence_hash = seq_path_str
                .chars()
                .fold(0i32, |acc, c| acc.wrapping_add(c as i32));
            let random_seed = sequence_hash
                .wrapping_add(loop_index)
                .wrapping_add(self.state.story_seed);

            let mut rng = StdRng::seed_from_u64(random_seed as u64);

            let mut unpicked_indices: Vec<i32> = (0..num_elements).collect();

            for i in 0..=iteration_index {
                let chosen = rng.gen::<i32>().rem_euclid(unpicked_indices.len() as i32);
                let chosen_index = unpicked_indices.remove(chosen as usize);

                if i == iteration_index {
                    return Ok(chosen_index);
                }
            }

            Err(StoryError::Structural("Should never reach here".to_owned()))
        }
    }
}

mod choices;
mod control_logic;
pub mod errors;
pub mod external_functions;
mod navigation;
mod progress;
mod state;
mod status;
mod tags;
pub mod variable_observer;

pub use status::{Line, StoryStatus};
