use storyloom::{story_error::StoryError, value_type::ValueType};

mod common;

#[test]
fn list_increment_and_all_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/lists/colours.json")?;
    let mut text: Vec<String> = Vec::new();

    common::next_all(&mut story, &mut text)?;

    assert_eq!(vec!["green", "blue", "red, green, blue"], text);

    Ok(())
}

#[test]
fn list_variable_value_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/lists/colours.json")?;

    story.continue_maximally()?;

    match story.get_variable("paint") {
        Some(ValueType::List(list)) => {
            assert_eq!("blue", list.to_string());
            assert!(list.contains_item_named("blue"));
            assert_eq!(Some(vec!["colours".to_string()]), list.get_origin_names());
        }
        other => panic!("expected a list, got {other:?}"),
    }

    Ok(())
}

#[test]
fn list_definitions_are_loaded_test() -> Result<(), StoryError> {
    let story = common::load_story("tests/data/lists/colours.json")?;

    let content = story.content();
    let colours = content
        .list_definitions()
        .get_list_definition("colours")
        .expect("colours is defined");

    assert_eq!(3, colours.get_items().count());
    assert!(colours.contains_item_with_name("green"));

    Ok(())
}
