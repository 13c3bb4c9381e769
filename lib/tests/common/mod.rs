#![allow(dead_code)]

use std::{cell::RefCell, error::Error, fs, path::Path, rc::Rc};

use rand::Rng;
use storyloom::{
    story::{
        errors::{ErrorHandler, ErrorType},
        Story,
    },
    story_error::StoryError,
};

pub fn next_all(story: &mut Story, text: &mut Vec<String>) -> Result<(), StoryError> {
    while story.can_continue() {
        let line = story.cont()?;
        print!("{line}");

        if !line.trim().is_empty() {
            text.push(line.trim().to_string());
        }
    }

    if story.has_error() {
        panic!("{}", join_text(story.get_current_errors()));
    }

    Ok(())
}

pub fn join_text(text: &Vec<String>) -> String {
    let mut sb = String::new();

    for s in text {
        sb.push_str(s);
    }

    sb
}

/// Plays a story to the end. Choices are taken from `choice_list` while it
/// lasts and picked at random afterwards.
pub fn run_story(filename: &str, choice_list: Option<Vec<usize>>) -> Result<Vec<String>, StoryError> {
    let json = get_json_string(filename).unwrap();

    let mut story = Story::new(&json)?;

    let mut text = Vec::new();

    let mut choice_list_index = 0;

    let mut rng = rand::thread_rng();

    while story.can_continue() || !story.get_current_choices().is_empty() {
        while story.can_continue() {
            let line = story.cont()?;
            print!("{}", line);
            text.push(line);
        }

        let current_choices = story.get_current_choices();
        if !current_choices.is_empty() {
            let len = current_choices.len();

            for choice in current_choices {
                println!("{}", choice.text);
                text.push(format!("{}\n", choice.text));
            }

            let choice_index = match &choice_list {
                Some(choice_list) if choice_list_index < choice_list.len() => {
                    choice_list_index += 1;
                    choice_list[choice_list_index - 1]
                }
                _ => rng.gen_range(0..len),
            };

            story.choose_choice_index(choice_index)?;
        }
    }

    Ok(text)
}

pub fn get_json_string(filename: &str) -> Result<String, Box<dyn Error>> {
    let mut path = Path::new(filename).to_path_buf();

    // Tests may run from the workspace root or from the crate folder
    if !path.exists() {
        path = Path::new("lib").join(path);
    }

    let json = fs::read_to_string(path)?;
    Ok(json)
}

pub fn load_story(filename: &str) -> Result<Story, StoryError> {
    let json = get_json_string(filename).unwrap();
    Story::new(&json)
}

pub fn is_ended(story: &Story) -> bool {
    !story.can_continue() && story.get_current_choices().is_empty()
}

/// Error handler that keeps every message it receives.
#[derive(Default)]
pub struct CollectingErrorHandler {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl CollectingErrorHandler {
    pub fn new() -> Rc<RefCell<CollectingErrorHandler>> {
        Rc::new(RefCell::new(CollectingErrorHandler::default()))
    }
}

impl ErrorHandler for CollectingErrorHandler {
    fn error(&mut self, message: &str, error_type: ErrorType) {
        match error_type {
            ErrorType::Error => self.errors.push(message.to_string()),
            ErrorType::Warning => self.warnings.push(message.to_string()),
        }
    }
}
