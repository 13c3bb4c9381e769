use storyloom::{story_error::StoryError, value_type::ValueType};

mod common;

#[test]
fn tunnel_and_function_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/knots/tunnel_function.json")?;
    let mut text: Vec<String> = Vec::new();

    common::next_all(&mut story, &mut text)?;

    assert_eq!(
        vec!["Start", "Inside tunnel", "After tunnel", "8 is double."],
        text
    );

    Ok(())
}

#[test]
fn evaluate_function_return_value_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/knots/tunnel_function.json")?;
    let mut output = String::new();

    let result = story.evaluate_function("double", Some(&vec![ValueType::Int(21)]), &mut output)?;

    assert_eq!(Some(ValueType::Int(42)), result);
    assert!(output.is_empty());

    // The story itself is untouched
    assert_eq!("Start\n", story.cont()?);

    Ok(())
}

#[test]
fn evaluate_function_text_output_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/knots/tunnel_function.json")?;
    let mut output = String::new();

    let result = story.evaluate_function("greet", Some(&vec![ValueType::new("Sam")]), &mut output)?;

    assert_eq!("Hello, Sam!\n", output);
    assert_eq!(Some(ValueType::Int(1)), result);

    Ok(())
}

#[test]
fn evaluate_missing_function_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/knots/tunnel_function.json")?;
    let mut output = String::new();

    let result = story.evaluate_function("triple", None, &mut output);
    assert!(matches!(result, Err(StoryError::BadArgument(_))));

    let result = story.evaluate_function("  ", None, &mut output);
    assert!(matches!(result, Err(StoryError::BadArgument(_))));

    Ok(())
}

#[test]
fn choose_path_string_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/tags/tags.json")?;
    let mut text: Vec<String> = Vec::new();

    story.choose_path_string("knot", true, None)?;
    common::next_all(&mut story, &mut text)?;

    assert_eq!(vec!["Knot text"], text);
    assert_eq!(1, story.get_visit_count_at_path_string("knot")?);

    Ok(())
}

#[test]
fn choose_missing_path_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/tags/tags.json")?;

    assert!(story.choose_path_string("nowhere", true, None).is_err());
    assert!(story.get_visit_count_at_path_string("nowhere").is_err());

    Ok(())
}
