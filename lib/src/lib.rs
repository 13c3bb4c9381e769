//! Runtime for interactive stories compiled to the ink JSON format.
//!
//! A [`Story`](story::Story) is loaded from the compiled JSON and then
//! stepped line by line with [`cont`](story::Story::cont). When it stops on
//! a set of choices, the host picks one with
//! [`choose_choice_index`](story::Story::choose_choice_index) and continues.
//! The whole running state can be saved to JSON and loaded back.

mod callstack;
pub mod choice;
mod choice_point;
pub mod container;
mod control_command;
mod divert;
pub mod ink_list;
pub mod ink_list_item;
mod json_read;
mod json_write;
pub mod list_definition;
pub mod list_definitions_origin;
mod native_function_call;
pub mod object;
pub mod path;
pub mod pointer;
mod push_pop;
pub mod search_result;
pub mod story;
pub mod story_error;
pub mod story_state;
mod tag;
pub mod threadsafe;
mod value;
pub mod value_type;
mod variable_assignment;
mod variable_reference;
mod variables_state;

pub use value::ValueKind;
