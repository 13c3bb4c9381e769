use std::fmt;

/// A legacy tag object (`{"#": "text"}`). Newer stories build tags at
/// runtime between `#` and `/#` commands instead.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    text: String,
}

impl Tag {
    pub fn new(text: &str) -> Self {
        Tag {
            text: text.to_string(),
        }
    }

    pub fn get_text(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "# {}", self.text)
    }
}
