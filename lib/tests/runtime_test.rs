use std::{cell::RefCell, rc::Rc};

use storyloom::{
    story::{external_functions::ExternalFunction, Story, StoryStatus},
    story_error::StoryError,
    value_type::ValueType,
};

mod common;

struct Add;

impl ExternalFunction for Add {
    fn call(&mut self, _func_name: &str, args: Vec<ValueType>) -> Option<ValueType> {
        let a: i32 = args[0].get().unwrap();
        let b: i32 = args[1].get().unwrap();

        Some(ValueType::Int(a + b))
    }
}

#[test]
fn bound_external_function_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/externals/add.json")?;

    story.bind_external_function("add", Rc::new(RefCell::new(Add)), true)?;
    assert!(story.missing_external_bindings().is_empty());

    assert_eq!("Sum: 5\n", story.cont()?);

    Ok(())
}

#[test]
fn bind_twice_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/externals/add.json")?;

    story.bind_external_function("add", Rc::new(RefCell::new(Add)), true)?;
    let result = story.bind_external_function("add", Rc::new(RefCell::new(Add)), true);
    assert!(matches!(result, Err(StoryError::BadArgument(_))));

    story.unbind_external_function("add")?;
    assert!(story.unbind_external_function("add").is_err());

    Ok(())
}

#[test]
fn external_function_fallback_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/externals/add.json")?;

    story.set_allow_external_function_fallbacks(true);
    assert!(story.missing_external_bindings().is_empty());

    assert_eq!("Sum: -1\n", story.cont()?);

    Ok(())
}

#[test]
fn unbound_external_suspends_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/externals/add.json")?;

    assert_eq!(vec!["add".to_string()], story.missing_external_bindings());

    assert_eq!("", story.cont()?);
    assert_eq!(StoryStatus::AwaitingExternal, story.status());
    assert!(!story.can_continue());

    let pending = story.pending_external_call().expect("call is pending");
    assert_eq!("add", pending.name);
    assert_eq!(vec![ValueType::Int(2), ValueType::Int(3)], pending.args);

    // Nothing can run until the call is answered
    assert!(matches!(story.cont(), Err(StoryError::BadArgument(_))));
    assert!(story.save_state().is_err());

    story.resolve_external_call(Some(ValueType::Int(7)))?;
    assert!(story.pending_external_call().is_none());

    assert_eq!("Sum: 7\n", story.cont()?);
    assert_eq!(StoryStatus::Done, story.status());

    assert!(matches!(
        story.resolve_external_call(None),
        Err(StoryError::BadArgument(_))
    ));

    Ok(())
}

#[test]
fn seeded_random_test() -> Result<(), StoryError> {
    let mut text: Vec<String> = Vec::new();
    let mut story = common::load_story("tests/data/random/dice.json")?;
    common::next_all(&mut story, &mut text)?;

    assert_eq!(2, text.len());
    for roll in &text {
        let value: i32 = roll.parse().expect("a number");
        assert!((1..=6).contains(&value));
    }

    // Same seed, same rolls
    let mut again: Vec<String> = Vec::new();
    let mut story = common::load_story("tests/data/random/dice.json")?;
    common::next_all(&mut story, &mut again)?;
    assert_eq!(text, again);

    Ok(())
}

#[test]
fn saved_random_state_rolls_the_same_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/random/dice.json")?;

    story.cont()?;
    let saved = story.save_state()?;

    let mut loaded = Story::from_content(story.content())?;
    loaded.load_state(&saved)?;

    assert_eq!(story.cont()?, loaded.cont()?);
    assert!(!loaded.can_continue());

    Ok(())
}

#[test]
fn runtime_error_without_handler_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/errors/ran_out.json")?;

    let result = story.cont();
    assert!(matches!(result, Err(StoryError::Structural(ref msg)) if msg.contains("ran out of content")));

    assert_eq!(StoryStatus::Errored, story.status());
    assert!(story.has_error());
    assert!(!story.can_continue());

    story.reset_errors();
    assert_eq!(StoryStatus::Done, story.status());

    Ok(())
}

#[test]
fn runtime_error_with_handler_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/errors/ran_out.json")?;
    let handler = common::CollectingErrorHandler::new();
    story.set_error_handler(handler.clone());

    assert_eq!("Oops\n", story.cont()?);

    let handler = handler.borrow();
    assert_eq!(1, handler.errors.len());
    assert!(handler.errors[0].starts_with("RUNTIME ERROR"));
    assert!(handler.errors[0].contains("ran out of content"));

    // Reported errors are kept until the host resets them
    assert!(story.has_error());
    assert_eq!(1, story.get_current_errors().len());
    assert_eq!(StoryStatus::Errored, story.status());
    assert!(!story.can_continue());

    story.reset_errors();
    assert_eq!(StoryStatus::Done, story.status());

    Ok(())
}

#[test]
fn story_version_test() {
    let too_old = r#"{"inkVersion":17,"root":[["^Old","\n","end",null],"done",null],"listDefs":{}}"#;
    assert!(matches!(
        Story::new(too_old),
        Err(StoryError::Version { found: 17, .. })
    ));

    let too_new = r#"{"inkVersion":22,"root":[["^New","\n","end",null],"done",null],"listDefs":{}}"#;
    assert!(matches!(
        Story::new(too_new),
        Err(StoryError::Version { found: 22, .. })
    ));
}

#[test]
fn older_compatible_version_warns_test() -> Result<(), StoryError> {
    let json = r#"{"inkVersion":20,"root":[["^Old","\n","end",null],"done",null],"listDefs":{}}"#;
    let mut story = Story::new(json)?;

    assert_eq!(20, story.content().version());
    assert_eq!(1, story.get_current_warnings().len());

    let handler = common::CollectingErrorHandler::new();
    story.set_error_handler(handler.clone());

    assert_eq!("Old\n", story.cont()?);
    assert_eq!(1, handler.borrow().warnings.len());
    assert!(handler.borrow().warnings[0].contains("doesn't match"));

    Ok(())
}

#[test]
fn warnings_without_handler_dont_stop_the_story_test() -> Result<(), StoryError> {
    let json = r#"{"inkVersion":20,"root":[["^A","\n","^B","\n","done",null],"done",null],"listDefs":{}}"#;
    let mut story = Story::new(json)?;

    assert_eq!("A\n", story.cont()?);
    assert_eq!(1, story.get_current_warnings().len());
    assert_eq!(StoryStatus::Idle, story.status());

    // Warnings from the previous line are dropped when continuing again
    assert_eq!("B\n", story.cont()?);
    assert!(story.get_current_warnings().is_empty());
    assert_eq!(StoryStatus::Done, story.status());

    Ok(())
}

#[test]
fn malformed_story_test() {
    assert!(matches!(Story::new("{"), Err(StoryError::Decode(_))));
    assert!(matches!(
        Story::new(r#"{"root":[null]}"#),
        Err(StoryError::Decode(_))
    ));
    assert!(matches!(
        Story::new(r#"{"inkVersion":21}"#),
        Err(StoryError::Decode(_))
    ));
}
