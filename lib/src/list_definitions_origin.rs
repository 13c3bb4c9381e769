use std::collections::HashMap;

use crate::{ink_list::InkList, list_definition::ListDefinition};

/// Catalogue of every list definition in a story, plus a cache of the
/// single-item lists that bare item names (`item` or `Origin.item`) resolve to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListDefinitionsOrigin {
    lists: HashMap<String, ListDefinition>,
    all_unambiguous_list_value_cache: HashMap<String, InkList>,
}

impl ListDefinitionsOrigin {
    pub fn new(lists: Vec<ListDefinition>) -> Self {
        let mut origin = ListDefinitionsOrigin::default();

        for list in lists {
            for (item, val) in list.get_items() {
                let mut l = InkList::new();
                l.items.insert(item.clone(), val);

                origin
                    .all_unambiguous_list_value_cache
                    .insert(item.get_item_name().to_string(), l.clone());
                origin
                    .all_unambiguous_list_value_cache
                    .insert(item.get_full_name(), l);
            }

            origin.lists.insert(list.get_name().to_string(), list);
        }

        origin
    }

    pub fn get_list_definition(&self, name: &str) -> Option<&ListDefinition> {
        self.lists.get(name)
    }

    pub fn lists(&self) -> impl Iterator<Item = &ListDefinition> {
        self.lists.values()
    }

    pub fn find_single_item_list_with_name(&self, name: &str) -> Option<&InkList> {
        self.all_unambiguous_list_value_cache.get(name)
    }
}
