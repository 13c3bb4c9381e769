use storyloom::{story::Line, story_error::StoryError};

mod common;

#[test]
fn tags_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/tags/tags.json")?;

    assert_eq!(vec!["author: Jo"], story.get_global_tags()?);
    assert_eq!(vec!["knot tag"], story.tags_for_content_at_path("knot")?);

    assert_eq!("Line one\n", story.cont()?);
    assert_eq!(vec!["author: Jo", "first"], story.get_current_tags()?);

    assert_eq!("Line two\n", story.cont()?);
    assert!(story.get_current_tags()?.is_empty());

    assert_eq!("Knot text\n", story.cont()?);
    assert_eq!(vec!["knot tag"], story.get_current_tags()?);

    Ok(())
}

#[test]
fn advance_returns_tags_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/tags/tags.json")?;

    let line = story.advance()?;

    assert_eq!(
        Line {
            text: "Line one\n".to_string(),
            tags: vec!["author: Jo".to_string(), "first".to_string()]
        },
        line
    );

    Ok(())
}

#[test]
fn tags_at_missing_path_test() -> Result<(), StoryError> {
    let story = common::load_story("tests/data/tags/tags.json")?;

    assert!(story.tags_for_content_at_path("nowhere").is_err());

    Ok(())
}
