use storyloom::{
    story::{Line, Story, StoryStatus},
    story_error::StoryError,
};

mod common;

#[test]
fn oneline_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/basic/hello.json")?;

    assert!(story.can_continue());
    assert_eq!("Hello, world!\n", story.cont()?);
    assert!(common::is_ended(&story));

    Ok(())
}

#[test]
fn two_lines_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/basic/two_lines.json")?;
    let mut text: Vec<String> = Vec::new();

    common::next_all(&mut story, &mut text)?;

    assert_eq!(2, text.len());
    assert_eq!("First line.", text[0]);
    // Runs of inline whitespace collapse to a single space
    assert_eq!("Second line.", text[1]);

    Ok(())
}

#[test]
fn continue_maximally_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/basic/two_lines.json")?;

    assert_eq!("First line.\nSecond line.\n", story.continue_maximally()?);
    assert!(!story.can_continue());

    Ok(())
}

#[test]
fn glue_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/glue/glue.json")?;
    let mut text: Vec<String> = Vec::new();

    common::next_all(&mut story, &mut text)?;

    assert_eq!(2, text.len());
    assert_eq!("Some content with glue.", text[0]);
    assert_eq!("A line continues.", text[1]);

    Ok(())
}

#[test]
fn continue_async_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/basic/two_lines.json")?;

    story.continue_async(500.0)?;
    while !story.async_continue_complete() {
        story.continue_async(500.0)?;
    }

    assert_eq!("First line.\n", story.get_current_text()?);
    assert_eq!("Second line.\n", story.cont()?);

    Ok(())
}

#[test]
fn status_and_advance_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/basic/hello.json")?;

    assert_eq!(StoryStatus::Idle, story.status());

    let line = story.advance()?;
    assert_eq!(
        Line {
            text: "Hello, world!\n".to_string(),
            tags: Vec::new()
        },
        line
    );

    assert_eq!(StoryStatus::Done, story.status());

    Ok(())
}

#[test]
fn cont_after_end_fails_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/basic/hello.json")?;

    story.cont()?;

    assert!(matches!(story.cont(), Err(StoryError::Structural(_))));

    Ok(())
}

#[test]
fn content_json_reload_test() -> Result<(), StoryError> {
    let story = common::load_story("tests/data/glue/glue.json")?;

    let mut reloaded = Story::new(&story.to_json_string())?;
    let mut text: Vec<String> = Vec::new();
    common::next_all(&mut reloaded, &mut text)?;

    assert_eq!(vec!["Some content with glue.", "A line continues."], text);

    Ok(())
}

#[test]
fn shared_content_test() -> Result<(), StoryError> {
    let mut first = common::load_story("tests/data/basic/two_lines.json")?;
    let mut second = Story::from_content(first.content())?;

    assert_eq!("First line.\n", first.cont()?);
    assert_eq!("Second line.\n", first.cont()?);

    // Each story keeps its own state
    assert_eq!("First line.\n", second.cont()?);

    Ok(())
}

#[test]
fn hierarchy_marks_current_position_test() -> Result<(), StoryError> {
    let story = common::load_story("tests/data/basic/hello.json")?;

    let hierarchy = story.build_string_of_hierarchy();

    assert!(hierarchy.contains("Hello, world!"));
    assert!(hierarchy.contains("<---"));

    Ok(())
}
