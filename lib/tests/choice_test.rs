use storyloom::{
    story::{Story, StoryStatus},
    story_error::StoryError,
};

mod common;

#[test]
fn choices_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/choices/pick_one.json")?;
    let mut text: Vec<String> = Vec::new();

    common::next_all(&mut story, &mut text)?;
    assert_eq!(vec!["Pick one."], text);

    let choices = story.get_current_choices();
    assert_eq!(2, choices.len());
    assert_eq!("Red", choices[0].text);
    assert_eq!(0, choices[0].index);
    assert_eq!("Blue", choices[1].text);
    assert_eq!(1, choices[1].index);
    assert_eq!(StoryStatus::AwaitingChoice, story.status());

    story.choose_choice_index(1)?;
    assert_eq!(StoryStatus::Idle, story.status());

    text.clear();
    common::next_all(&mut story, &mut text)?;
    assert_eq!(vec!["You picked blue."], text);
    assert!(common::is_ended(&story));

    Ok(())
}

#[test]
fn choice_out_of_range_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/choices/pick_one.json")?;
    let mut text: Vec<String> = Vec::new();

    common::next_all(&mut story, &mut text)?;

    let result = story.choose_choice_index(2);
    assert!(matches!(result, Err(StoryError::Structural(_))));

    // Nothing changed
    assert_eq!(2, story.get_current_choices().len());
    assert_eq!(StoryStatus::AwaitingChoice, story.status());

    Ok(())
}

#[test]
fn no_choices_while_continuing_test() -> Result<(), StoryError> {
    let story = common::load_story("tests/data/choices/pick_one.json")?;

    assert!(story.can_continue());
    assert!(story.get_current_choices().is_empty());

    Ok(())
}

#[test]
fn once_only_choices_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/choices/once_only.json")?;
    let mut text: Vec<String> = Vec::new();

    common::next_all(&mut story, &mut text)?;
    assert_eq!(vec!["Where now?"], text);
    assert_eq!(2, story.get_current_choices().len());

    story.choose_choice_index(0)?;

    text.clear();
    common::next_all(&mut story, &mut text)?;
    assert_eq!(vec!["You go north.", "Where now?"], text);

    // North has been taken already
    let choices = story.get_current_choices();
    assert_eq!(1, choices.len());
    assert_eq!("South", choices[0].text);
    assert_eq!(1, story.get_visit_count_at_path_string("hub.0.c-0")?);

    story.choose_choice_index(0)?;

    text.clear();
    common::next_all(&mut story, &mut text)?;
    assert_eq!(vec!["You go south."], text);
    assert!(common::is_ended(&story));

    Ok(())
}

#[test]
fn random_playthrough_test() -> Result<(), StoryError> {
    let text = common::run_story("tests/data/choices/once_only.json", None)?;

    assert_eq!("Where now?\n", text[0]);
    assert_eq!("You go south.\n", text[text.len() - 1]);

    Ok(())
}

#[test]
fn thread_choices_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/choices/threads.json")?;

    assert_eq!("", story.continue_maximally()?);

    let choices = story.get_current_choices();
    assert_eq!(2, choices.len());
    assert_eq!("Leave", choices[0].text);
    assert_eq!("Stay", choices[1].text);

    story.choose_choice_index(0)?;
    assert_eq!("You leave.\n", story.continue_maximally()?);

    Ok(())
}

#[test]
fn save_and_load_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/choices/once_only.json")?;
    let mut text: Vec<String> = Vec::new();

    common::next_all(&mut story, &mut text)?;
    story.choose_choice_index(0)?;

    let saved = story.save_state()?;

    let mut loaded = common::load_story("tests/data/choices/once_only.json")?;
    loaded.load_state(&saved)?;

    text.clear();
    common::next_all(&mut loaded, &mut text)?;
    assert_eq!(vec!["You go north.", "Where now?"], text);

    // Visit counts travel with the saved state
    let choices = loaded.get_current_choices();
    assert_eq!(1, choices.len());
    assert_eq!("South", choices[0].text);

    Ok(())
}

#[test]
fn loaded_state_plays_like_the_original_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/choices/once_only.json")?;

    story.continue_maximally()?;
    story.choose_choice_index(0)?;
    assert_eq!("You go north.\n", story.cont()?);

    let saved = story.save_state()?;

    let mut twin = Story::from_content(story.content())?;
    twin.load_state(&saved)?;

    loop {
        assert_eq!(story.can_continue(), twin.can_continue());
        while story.can_continue() {
            assert_eq!(story.advance()?, twin.advance()?);
        }

        let choices = story.get_current_choices();
        let twin_choices = twin.get_current_choices();
        assert_eq!(
            choices.iter().map(|c| &c.text).collect::<Vec<_>>(),
            twin_choices.iter().map(|c| &c.text).collect::<Vec<_>>()
        );

        if choices.is_empty() {
            break;
        }

        story.choose_choice_index(0)?;
        twin.choose_choice_index(0)?;
    }

    assert_eq!(story.status(), twin.status());

    Ok(())
}

#[test]
fn save_with_pending_choices_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/choices/pick_one.json")?;
    story.continue_maximally()?;

    let saved = story.save_state()?;

    let mut loaded = common::load_story("tests/data/choices/pick_one.json")?;
    loaded.load_state(&saved)?;

    assert_eq!(2, loaded.get_current_choices().len());
    loaded.choose_choice_index(0)?;
    assert_eq!("You picked red.\n", loaded.cont()?);

    Ok(())
}

#[test]
fn load_old_save_version_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/choices/pick_one.json")?;

    let result = story.load_state(r#"{"inkSaveVersion": 7}"#);
    assert!(matches!(result, Err(StoryError::Version { found: 7, .. })));

    // The current state is kept
    assert_eq!("Pick one.\n", story.cont()?);

    Ok(())
}

#[test]
fn load_malformed_save_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/choices/pick_one.json")?;

    assert!(matches!(story.load_state("not json"), Err(StoryError::Decode(_))));

    Ok(())
}

#[test]
fn state_snapshot_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/choices/pick_one.json")?;
    story.continue_maximally()?;

    let snapshot = story.state_snapshot();

    story.choose_choice_index(0)?;
    assert_eq!("You picked red.\n", story.cont()?);

    story.restore_state(snapshot)?;

    assert_eq!(2, story.get_current_choices().len());
    story.choose_choice_index(1)?;
    assert_eq!("You picked blue.\n", story.cont()?);

    Ok(())
}

#[test]
fn restore_foreign_state_test() -> Result<(), StoryError> {
    let mut story = common::load_story("tests/data/choices/pick_one.json")?;
    let other = common::load_story("tests/data/basic/hello.json")?;

    let result = story.restore_state(other.state_snapshot());
    assert!(matches!(result, Err(StoryError::BadArgument(_))));

    // A story built over the same content accepts it
    let mut twin = Story::from_content(story.content())?;
    twin.continue_maximally()?;
    story.restore_state(twin.state_snapshot())?;
    assert_eq!(2, story.get_current_choices().len());

    Ok(())
}
