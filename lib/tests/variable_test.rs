use std::{cell::RefCell, rc::Rc};

use storyloom::{
    story::variable_observer::VariableObserver, story_error::StoryError, value_type::ValueType,
};

mod common;

#[derive(Default)]
struct VObserver {
    changes: Vec<(String, ValueType)>,
}

impl VariableObserver for VObserver {
    fn changed(&mut self, variable_name: &str, new_value: &ValueType) {
        self.changes.push((variable_name.to_string(), new_value.clone()));
    }
}

#[test]
fn variable_declaration_and_assignment_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/variables/gold.json")?;
    let mut text: Vec<String> = Vec::new();

    common::next_all(&mut story, &mut text)?;

    assert_eq!(vec!["10 gold.", "Now 15 gold for Alex."], text);
    assert_eq!(Some(ValueType::Int(15)), story.get_variable("gold"));
    assert_eq!(Some(ValueType::new("Alex")), story.get_variable("name"));

    Ok(())
}

#[test]
fn counter_in_revisited_container_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/variables/counter.json")?;

    assert_eq!("2\n", story.cont()?);
    assert_eq!(Some(ValueType::Int(2)), story.get_variable("count"));
    assert_eq!(2, story.get_visit_count_at_path_string("bump")?);

    Ok(())
}

#[test]
fn variable_observers_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/variables/gold.json")?;
    let observer = Rc::new(RefCell::new(VObserver::default()));

    story.observe_variable("gold", observer.clone())?;

    assert_eq!("10 gold.\n", story.cont()?);
    // The assignment seen while looking ahead was rewound
    assert!(observer.borrow().changes.is_empty());

    story.cont()?;
    assert_eq!(
        vec![("gold".to_string(), ValueType::Int(15))],
        observer.borrow().changes
    );

    story.set_variable("gold", &ValueType::Int(3))?;
    assert_eq!(2, observer.borrow().changes.len());
    assert_eq!(ValueType::Int(3), observer.borrow().changes[1].1);

    Ok(())
}

#[test]
fn remove_variable_observer_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/variables/gold.json")?;
    let observer = Rc::new(RefCell::new(VObserver::default()));
    let as_dyn: Rc<RefCell<dyn VariableObserver>> = observer.clone();

    story.observe_variable("gold", as_dyn.clone())?;
    story.remove_variable_observer(&as_dyn, Some("gold"))?;

    story.continue_maximally()?;
    assert!(observer.borrow().changes.is_empty());

    Ok(())
}

#[test]
fn observe_undeclared_variable_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/variables/gold.json")?;
    let observer = Rc::new(RefCell::new(VObserver::default()));

    let result = story.observe_variable("silver", observer);
    assert!(matches!(result, Err(StoryError::BadArgument(_))));

    Ok(())
}

#[test]
fn set_and_get_variable_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/variables/gold.json")?;

    story.set_variable("gold", &ValueType::Int(100))?;
    assert_eq!(Some(ValueType::Int(100)), story.get_variable("gold"));

    assert_eq!("100 gold.\n", story.cont()?);

    Ok(())
}

#[test]
fn set_non_existant_variable_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/variables/gold.json")?;

    let result = story.set_variable("silver", &ValueType::new("earth"));
    assert!(result.is_err());

    assert_eq!(None, story.get_variable("silver"));
    assert_eq!(Some(ValueType::Int(10)), story.get_variable("gold"));

    Ok(())
}

#[test]
fn missing_variable_reads_zero_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/variables/missing_variable.json")?;
    let handler = common::CollectingErrorHandler::new();
    story.set_error_handler(handler.clone());

    assert_eq!("Value: 0\n", story.cont()?);

    let handler = handler.borrow();
    assert!(handler.errors.is_empty());
    assert_eq!(1, handler.warnings.len());
    assert!(handler.warnings[0].contains("Variable not found: 'nowhere'"));

    Ok(())
}

#[test]
fn missing_variable_without_handler_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/variables/missing_variable.json")?;

    // A warning doesn't stop the line from being produced
    assert_eq!("Value: 0\n", story.cont()?);
    assert!(!story.has_error());
    assert_eq!(1, story.get_current_warnings().len());
    assert!(story.get_current_warnings()[0].contains("Variable not found: 'nowhere'"));

    Ok(())
}
