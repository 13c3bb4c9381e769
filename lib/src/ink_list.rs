//! List values: sets of enumerated items with their ranks.
use std::{collections::HashMap, fmt};

use crate::{
    ink_list_item::InkListItem, list_definition::ListDefinition,
    list_definitions_origin::ListDefinitionsOrigin, story_error::StoryError, value_type::ValueType,
};

/// The underlying type of a list value. Each item keeps the name of the list
/// definition it came from, so lists can mix items from several definitions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InkList {
    pub items: HashMap<InkListItem, i32>,
    // Origins of an empty list, which can't be derived from its items.
    initial_origin_names: Option<Vec<String>>,
}

impl InkList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_single_element(item: InkListItem, value: i32) -> Self {
        let mut l = Self::new();
        l.items.insert(item, value);
        l
    }

    /// An empty list that still knows which definition it belongs to.
    pub fn from_single_origin(origin_name: &str) -> Self {
        let mut l = Self::new();
        l.set_initial_origin_name(origin_name);
        l
    }

    /// Items sorted by rank, then by origin name.
    pub fn get_ordered_items(&self) -> Vec<(&InkListItem, i32)> {
        let mut ordered: Vec<(&InkListItem, i32)> =
            self.items.iter().map(|(k, v)| (k, *v)).collect();

        ordered.sort_by(|a, b| {
            a.1.cmp(&b.1)
                .then_with(|| a.0.get_origin_name().cmp(&b.0.get_origin_name()))
        });

        ordered
    }

    pub fn get_max_item(&self) -> Option<(&InkListItem, i32)> {
        self.get_ordered_items().last().copied()
    }

    pub fn get_min_item(&self) -> Option<(&InkListItem, i32)> {
        self.get_ordered_items().first().copied()
    }

    pub fn set_initial_origin_name(&mut self, initial_origin_name: &str) {
        self.initial_origin_names = Some(vec![initial_origin_name.to_string()]);
    }

    pub fn set_initial_origin_names(&mut self, initial_origin_names: Option<Vec<String>>) {
        self.initial_origin_names = initial_origin_names;
    }

    /// Names of the list definitions this list draws from.
    pub fn get_origin_names(&self) -> Option<Vec<String>> {
        if self.items.is_empty() {
            return self.initial_origin_names.clone();
        }

        let mut names: Vec<String> = self
            .items
            .keys()
            .filter_map(|k| k.get_origin_name().map(str::to_string))
            .collect();
        names.sort();
        names.dedup();

        Some(names)
    }

    pub fn origins<'a>(&self, definitions: &'a ListDefinitionsOrigin) -> Vec<&'a ListDefinition> {
        self.get_origin_names()
            .unwrap_or_default()
            .iter()
            .filter_map(|n| definitions.get_list_definition(n))
            .collect()
    }

    /// The definition the highest ranked item came from.
    pub fn origin_of_max_item<'a>(
        &self,
        definitions: &'a ListDefinitionsOrigin,
    ) -> Option<&'a ListDefinition> {
        let (item, _) = self.get_max_item()?;
        definitions.get_list_definition(item.get_origin_name()?)
    }

    /// Adds an item by name. A bare name is looked up in every origin this
    /// list knows about and must be unambiguous.
    pub fn add_item(
        &mut self,
        item: &InkListItem,
        definitions: &ListDefinitionsOrigin,
    ) -> Result<(), StoryError> {
        let origins = self.origins(definitions);

        let found = match item.get_origin_name() {
            Some(origin_name) => origins
                .iter()
                .find(|o| o.get_name() == origin_name)
                .map(|o| {
                    o.get_value_for_item(item)
                        .map(|v| (item.clone(), v))
                        .ok_or_else(|| {
                            StoryError::BadArgument(format!(
                                "Could not add the item {item} to this list because it doesn't exist in the original list definition."
                            ))
                        })
                })
                .transpose()?,
            None => {
                let mut found = None;
                for origin in origins {
                    if origin.contains_item_with_name(item.get_item_name()) {
                        if found.is_some() {
                            return Err(StoryError::BadArgument(format!(
                                "Could not add the item {} to this list because it could come from either {} or another list.",
                                item.get_item_name(),
                                origin.get_name()
                            )));
                        }
                        let full = InkListItem::new(Some(origin.get_name()), item.get_item_name());
                        let value = origin.get_value_for_item(&full).unwrap_or_default();
                        found = Some((full, value));
                    }
                }
                found
            }
        };

        match found {
            Some((item, value)) => {
                self.items.insert(item, value);
                Ok(())
            }
            None => Err(StoryError::BadArgument(format!(
                "Failed to add item '{item}' to list because the item was from a list definition that wasn't previously known to this list."
            ))),
        }
    }

    pub fn union(&self, other_list: &InkList) -> InkList {
        let mut union = self.with_same_origins();
        for (key, value) in &other_list.items {
            union.items.insert(key.clone(), *value);
        }
        union
    }

    pub fn intersect(&self, other_list: &InkList) -> InkList {
        let mut intersection = InkList::new();
        for (k, v) in &self.items {
            if other_list.items.contains_key(k) {
                intersection.items.insert(k.clone(), *v);
            }
        }
        intersection
    }

    pub fn has_intersection(&self, other_list: &InkList) -> bool {
        self.items.keys().any(|k| other_list.items.contains_key(k))
    }

    /// Items of this list that are not in `list_to_remove`. The result keeps
    /// this list's origins so that an empty result still knows its type.
    pub fn without(&self, list_to_remove: &InkList) -> InkList {
        let mut result = self.with_same_origins();
        for k in list_to_remove.items.keys() {
            result.items.remove(k);
        }
        result
    }

    /// Whether every item of `other_list` is in this list. Empty lists
    /// contain nothing and are contained by nothing.
    pub fn contains(&self, other_list: &InkList) -> bool {
        if other_list.items.is_empty() || self.items.is_empty() {
            return false;
        }

        other_list.items.keys().all(|k| self.items.contains_key(k))
    }

    pub fn contains_item_named(&self, item_name: &str) -> bool {
        self.items.keys().any(|k| k.get_item_name() == item_name)
    }

    /// Every item in this list outranks every item in `other_list`.
    pub fn greater_than(&self, other_list: &InkList) -> bool {
        match (self.get_min_item(), other_list.get_max_item()) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some((_, min)), Some((_, other_max))) => min > other_max,
        }
    }

    pub fn greater_than_or_equals(&self, other_list: &InkList) -> bool {
        if self.items.is_empty() {
            return false;
        }
        if other_list.items.is_empty() {
            return true;
        }

        self.min_value() >= other_list.min_value() && self.max_value() >= other_list.max_value()
    }

    /// Every item in this list is outranked by every item in `other_list`.
    pub fn less_than(&self, other_list: &InkList) -> bool {
        match (self.get_max_item(), other_list.get_min_item()) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some((_, max)), Some((_, other_min))) => max < other_min,
        }
    }

    pub fn less_than_or_equals(&self, other_list: &InkList) -> bool {
        if other_list.items.is_empty() {
            return false;
        }
        if self.items.is_empty() {
            return true;
        }

        self.max_value() <= other_list.max_value() && self.min_value() <= other_list.min_value()
    }

    /// Same items, ignoring ranks and origins of empty lists.
    pub fn list_equals(&self, other_list: &InkList) -> bool {
        self.items.len() == other_list.items.len()
            && other_list.items.keys().all(|k| self.items.contains_key(k))
    }

    pub fn max_as_list(&self) -> InkList {
        match self.get_max_item() {
            Some((item, value)) => InkList::from_single_element(item.clone(), value),
            None => InkList::new(),
        }
    }

    pub fn min_as_list(&self) -> InkList {
        match self.get_min_item() {
            Some((item, value)) => InkList::from_single_element(item.clone(), value),
            None => InkList::new(),
        }
    }

    /// Items of the origin definitions that are not in this list.
    pub fn inverse(&self, definitions: &ListDefinitionsOrigin) -> InkList {
        let mut list = InkList::new();
        for origin in self.origins(definitions) {
            for (item, value) in origin.get_items() {
                if !self.items.contains_key(&item) {
                    list.items.insert(item, value);
                }
            }
        }
        list
    }

    /// Every item of the origin definitions.
    pub fn all(&self, definitions: &ListDefinitionsOrigin) -> InkList {
        let mut list = InkList::new();
        for origin in self.origins(definitions) {
            for (item, value) in origin.get_items() {
                list.items.insert(item, value);
            }
        }
        list
    }

    /// Items whose rank lies within the bounds. Bounds are ints, or lists
    /// whose min (lower bound) and max (upper bound) ranks are used.
    pub fn list_with_sub_range(&self, min_bound: &ValueType, max_bound: &ValueType) -> InkList {
        if self.items.is_empty() {
            return InkList::new();
        }

        let min_value = match min_bound {
            ValueType::Int(v) => *v,
            ValueType::List(l) => l.get_min_item().map(|(_, v)| v).unwrap_or(0),
            _ => 0,
        };

        let max_value = match max_bound {
            ValueType::Int(v) => *v,
            ValueType::List(l) => l.get_max_item().map(|(_, v)| v).unwrap_or(i32::MAX),
            _ => i32::MAX,
        };

        let mut sub_list = InkList::new();
        sub_list.set_initial_origin_names(self.get_origin_names());

        for (item, value) in self.get_ordered_items() {
            if value >= min_value && value <= max_value {
                sub_list.items.insert(item.clone(), value);
            }
        }

        sub_list
    }

    fn with_same_origins(&self) -> InkList {
        InkList {
            items: self.items.clone(),
            initial_origin_names: self.get_origin_names(),
        }
    }

    fn max_value(&self) -> i32 {
        self.get_max_item().map(|(_, v)| v).unwrap_or(0)
    }

    fn min_value(&self) -> i32 {
        self.get_min_item().map(|(_, v)| v).unwrap_or(0)
    }
}

impl fmt::Display for InkList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self
            .get_ordered_items()
            .into_iter()
            .map(|(item, _)| item.get_item_name())
            .collect();

        write!(f, "{}", names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(origin: &str, name: &str) -> InkListItem {
        InkListItem::new(Some(origin), name)
    }

    fn list_of(items: &[(&str, &str, i32)]) -> InkList {
        let mut l = InkList::new();
        for (origin, name, value) in items {
            l.items.insert(item(origin, name), *value);
        }
        l
    }

    fn definitions() -> ListDefinitionsOrigin {
        let mut colours = HashMap::new();
        colours.insert("red".to_string(), 1);
        colours.insert("green".to_string(), 2);
        colours.insert("blue".to_string(), 3);
        ListDefinitionsOrigin::new(vec![ListDefinition::new("colours", colours)])
    }

    #[test]
    fn union_then_without_keeps_only_own_items() {
        let a = list_of(&[("colours", "red", 1), ("colours", "green", 2)]);
        let b = list_of(&[("colours", "green", 2), ("colours", "blue", 3)]);

        let result = a.union(&b).without(&b);

        assert!(result.list_equals(&list_of(&[("colours", "red", 1)])));
        assert_eq!("red", result.to_string());
    }

    #[test]
    fn ordering_compares_extremes() {
        let low = list_of(&[("colours", "red", 1), ("colours", "green", 2)]);
        let high = list_of(&[("colours", "blue", 3)]);
        let mixed = list_of(&[("colours", "red", 1), ("colours", "blue", 3)]);

        assert!(high.greater_than(&low));
        assert!(!mixed.greater_than(&low));
        assert!(low.less_than(&high));
        assert!(mixed.greater_than_or_equals(&low));
        assert!(low.less_than_or_equals(&mixed));
    }

    #[test]
    fn empty_lists_contain_nothing() {
        let a = list_of(&[("colours", "red", 1)]);
        assert!(!a.contains(&InkList::new()));
        assert!(!InkList::new().contains(&a));
        assert!(a.contains(&a));
    }

    #[test]
    fn inverse_and_all_use_origins() {
        let defs = definitions();
        let a = list_of(&[("colours", "green", 2)]);

        assert_eq!("red, blue", a.inverse(&defs).to_string());
        assert_eq!("red, green, blue", a.all(&defs).to_string());

        let empty = InkList::from_single_origin("colours");
        assert_eq!(3, empty.all(&defs).items.len());
    }

    #[test]
    fn sub_range_uses_bounds() {
        let defs = definitions();
        let all = list_of(&[("colours", "red", 1)]).all(&defs);

        let sub = all.list_with_sub_range(&ValueType::Int(2), &ValueType::Int(3));
        assert_eq!("green, blue", sub.to_string());
    }

    #[test]
    fn add_item_by_bare_name() {
        let defs = definitions();
        let mut l = InkList::from_single_origin("colours");

        l.add_item(&InkListItem::from_full_name("blue"), &defs).unwrap();

        assert_eq!(Some(3), l.items.get(&item("colours", "blue")).copied());
        assert!(l.add_item(&InkListItem::from_full_name("purple"), &defs).is_err());
    }
}
