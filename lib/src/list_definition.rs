use std::collections::HashMap;

use crate::ink_list_item::InkListItem;

/// A named enumeration: item names mapped to their integer ranks.
#[derive(Debug, Clone, PartialEq)]
pub struct ListDefinition {
    name: String,
    item_name_to_values: HashMap<String, i32>,
}

impl ListDefinition {
    pub fn new(name: &str, items: HashMap<String, i32>) -> Self {
        Self {
            name: name.to_string(),
            item_name_to_values: items,
        }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_items(&self) -> impl Iterator<Item = (InkListItem, i32)> + '_ {
        self.item_name_to_values
            .iter()
            .map(|(name, value)| (InkListItem::new(Some(&self.name), name), *value))
    }

    pub fn get_value_for_item(&self, item: &InkListItem) -> Option<i32> {
        self.item_name_to_values.get(item.get_item_name()).copied()
    }

    pub fn contains_item(&self, item: &InkListItem) -> bool {
        item.get_origin_name() == Some(self.name.as_str())
            && self.item_name_to_values.contains_key(item.get_item_name())
    }

    pub fn contains_item_with_name(&self, item_name: &str) -> bool {
        self.item_name_to_values.contains_key(item_name)
    }

    pub fn get_item_with_value(&self, val: i32) -> Option<InkListItem> {
        self.item_name_to_values
            .iter()
            .find(|(_, value)| **value == val)
            .map(|(item_name, _)| InkListItem::new(Some(&self.name), item_name))
    }
}
