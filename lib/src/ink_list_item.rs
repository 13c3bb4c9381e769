use std::fmt;

/// An item of a list: the name of the list definition it comes from plus
/// the item's own name. Both together form the full name `Origin.item`.
#[derive(Debug, PartialEq, Eq, Hash, Clone, PartialOrd, Ord)]
pub struct InkListItem {
    origin_name: Option<String>,
    item_name: String,
}

impl InkListItem {
    pub fn new(origin_name: Option<&str>, item_name: &str) -> Self {
        Self {
            origin_name: origin_name.map(str::to_string),
            item_name: item_name.to_string(),
        }
    }

    /// Parses `Origin.item`; a bare `item` has an unknown origin.
    pub fn from_full_name(full_name: &str) -> Self {
        match full_name.split_once('.') {
            Some((origin, item)) => Self::new(Some(origin), item),
            None => Self::new(None, full_name),
        }
    }

    pub fn get_origin_name(&self) -> Option<&str> {
        self.origin_name.as_deref()
    }

    pub fn get_item_name(&self) -> &str {
        &self.item_name
    }

    pub fn get_full_name(&self) -> String {
        format!(
            "{}.{}",
            self.origin_name.as_deref().unwrap_or("?"),
            self.item_name
        )
    }
}

impl fmt::Display for InkListItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get_full_name())
    }
}
