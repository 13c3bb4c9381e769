use crate::{
    control_command::CommandType,
    object::NodeKind,
    path::Path,
    story::Story,
    story_error::StoryError,
    value_type::ValueType,
};

/// # Tags
/// Methods to read tags.
impl Story {
    /// Get any global tags associated with the story. These are defined as
    /// hash tags defined at the very top of the story.
    pub fn get_global_tags(&self) -> Result<Vec<String>, StoryError> {
        self.tags_at_start_of_flow_container_with_path_string("")
    }

    /// Gets any tags associated with a particular knot or knot.stitch.
    /// These are defined as hash tags defined at the very top of a
    /// knot or stitch.
    pub fn tags_for_content_at_path(&self, path: &str) -> Result<Vec<String>, StoryError> {
        self.tags_at_start_of_flow_container_with_path_string(path)
    }

    pub(crate) fn tags_at_start_of_flow_container_with_path_string(
        &self,
        path_string: &str,
    ) -> Result<Vec<String>, StoryError> {
        let tree = &self.content.tree;
        let path = Path::new_with_components_string(path_string);

        // Expected to be global story, knot, or stitch
        let mut flow_container = self
            .content_at_path(&path)
            .correct_obj()
            .filter(|id| tree.container(*id).is_some())
            .ok_or_else(|| StoryError::Address(format!("Content at path not found: {path_string}")))?;

        // Descend into the first content while it's a container
        while let Some(first) = tree
            .container(flow_container)
            .and_then(|c| c.content.first().copied())
            .filter(|first| tree.container(*first).is_some())
        {
            flow_container = first;
        }

        // Any initial tag objects count as the "main tags" associated with that
        // story/knot/stitch
        let mut in_tag = false;
        let mut tags = Vec::new();

        let content = tree
            .container(flow_container)
            .map(|c| c.content.as_slice())
            .unwrap_or_default();

        for child in content {
            match tree.kind(*child) {
                NodeKind::ControlCommand(CommandType::BeginTag) => in_tag = true,
                NodeKind::ControlCommand(CommandType::EndTag) => in_tag = false,
                NodeKind::Value(ValueType::String(string_value)) if in_tag => {
                    tags.push(string_value.string.clone());
                }
                _ if in_tag => {
                    return Err(StoryError::Structural("Tag contained non-text content. Only plain text is allowed when using get_global_tags or tags_for_content_at_path. If you want to evaluate dynamic content, you need to use cont()".to_owned()));
                }
                // Tags written in the older, static format
                NodeKind::Tag(tag) => tags.push(tag.get_text().to_string()),
                // Any other content - we're done. We only recognise initial
                // text-only tags
                _ => break,
            }
        }

        Ok(tags)
    }

    /// Gets a list of tags defined with '#' in the source that were
    /// seen during the most recent [`cont`](Story::cont) call.
    pub fn get_current_tags(&mut self) -> Result<Vec<String>, StoryError> {
        self.if_async_we_cant("call currentTags since it's a work in progress")?;
        Ok(self.state.get_current_tags())
    }
}
