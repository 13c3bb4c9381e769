//! Decoding of compiled story files and of the objects stored in saved
//! states.
use std::collections::HashMap;

use serde_json::Map;

use crate::{
    choice::Choice,
    choice_point::ChoicePoint,
    container::{Container, ContentTree},
    control_command::CommandType,
    divert::Divert,
    ink_list::InkList,
    ink_list_item::InkListItem,
    list_definition::ListDefinition,
    list_definitions_origin::ListDefinitionsOrigin,
    native_function_call::Op,
    object::{NodeId, NodeKind, RTObject},
    path::Path,
    push_pop::PushPopType,
    story::{INK_VERSION_CURRENT, INK_VERSION_MINIMUM_COMPATIBLE},
    story_error::StoryError,
    tag::Tag,
    value_type::ValueType,
    variable_assignment::VariableAssignment,
    variable_reference::VariableReference,
};

/// Parses a compiled story. Returns the story format version, the linked
/// content tree and the list definitions.
pub(crate) fn load_from_string(
    s: &str,
) -> Result<(i32, ContentTree, ListDefinitionsOrigin), StoryError> {
    let json: serde_json::Value = serde_json::from_str(s)?;

    let version = json
        .get("inkVersion")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| StoryError::Decode("ink version number not found. Are you sure it's a valid .ink.json file?".to_owned()))?
        as i32;

    if version > INK_VERSION_CURRENT {
        return Err(StoryError::Version {
            found: version,
            message: "Version of ink used to build story was newer than the current version of the engine".to_owned(),
        });
    } else if version < INK_VERSION_MINIMUM_COMPATIBLE {
        return Err(StoryError::Version {
            found: version,
            message: "Version of ink used to build story is too old to be loaded by this version of the engine".to_owned(),
        });
    }

    let root_token = json
        .get("root")
        .ok_or_else(|| StoryError::Decode("Root node for ink not found. Are you sure it's a valid .ink.json file?".to_owned()))?;

    let list_definitions = match json.get("listDefs") {
        Some(def) => jtoken_to_list_definitions(def)?,
        None => ListDefinitionsOrigin::default(),
    };

    let tree = jtoken_to_content_tree(root_token)?;

    Ok((version, tree, list_definitions))
}

/// Builds and links a content tree whose root is the given container array.
pub(crate) fn jtoken_to_content_tree(root_token: &serde_json::Value) -> Result<ContentTree, StoryError> {
    let root_array = root_token
        .as_array()
        .ok_or_else(|| StoryError::Decode("Root node must be a container".to_owned()))?;

    let mut tree = ContentTree::new();
    jarray_to_container(&mut tree, root_array, None)?;
    tree.link();

    Ok(tree)
}

fn decode_error(token: &serde_json::Value) -> StoryError {
    StoryError::Decode(format!("Failed to convert token to runtime object: {token}"))
}

fn jtoken_to_node(
    tree: &mut ContentTree,
    token: &serde_json::Value,
    name: Option<String>,
) -> Result<NodeId, StoryError> {
    match token {
        serde_json::Value::Array(jarray) => jarray_to_container(tree, jarray, name),
        _ => {
            let kind = jtoken_to_node_kind(token)?;
            Ok(tree.add_node(kind))
        }
    }
}

/// Decodes any leaf of the content tree. Containers are handled by the tree
/// builder.
pub(crate) fn jtoken_to_node_kind(token: &serde_json::Value) -> Result<NodeKind, StoryError> {
    match token {
        serde_json::Value::Null | serde_json::Value::Array(_) => Err(decode_error(token)),
        serde_json::Value::Bool(value) => Ok(NodeKind::Value(ValueType::Bool(*value))),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                let val = i32::try_from(i).map_err(|_| decode_error(token))?;
                Ok(NodeKind::Value(ValueType::Int(val)))
            } else {
                let val = n.as_f64().ok_or_else(|| decode_error(token))? as f32;
                Ok(NodeKind::Value(ValueType::Float(val)))
            }
        }
        serde_json::Value::String(str) => {
            // String value
            if let Some(text) = str.strip_prefix('^') {
                return Ok(NodeKind::Value(ValueType::new(text)));
            } else if str == "\n" {
                return Ok(NodeKind::Value(ValueType::new("\n")));
            }

            // Glue
            if str == "<>" {
                return Ok(NodeKind::Glue);
            }

            if let Some(command) = CommandType::from_name(str) {
                return Ok(NodeKind::ControlCommand(command));
            }

            // "^" conflicts with the way strings are marked, so the list
            // intersection operator is written as "L^".
            let call_str = if str == "L^" { "^" } else { str.as_str() };
            if let Some(op) = Op::from_name(call_str) {
                return Ok(NodeKind::NativeFunctionCall(op));
            }

            if str == "void" {
                return Ok(NodeKind::Void);
            }

            Err(decode_error(token))
        }
        serde_json::Value::Object(obj) => jobject_to_node_kind(token, obj),
    }
}

fn get_str<'a>(
    token: &serde_json::Value,
    value: &'a serde_json::Value,
) -> Result<&'a str, StoryError> {
    value.as_str().ok_or_else(|| decode_error(token))
}

fn jobject_to_node_kind(
    token: &serde_json::Value,
    obj: &Map<String, serde_json::Value>,
) -> Result<NodeKind, StoryError> {
    // Divert target value to path
    if let Some(prop_value) = obj.get("^->") {
        return Ok(NodeKind::Value(ValueType::DivertTarget(
            Path::new_with_components_string(get_str(token, prop_value)?),
        )));
    }

    // VariablePointerValue
    if let Some(v) = obj.get("^var") {
        let variable_name = get_str(token, v)?;
        let context_index = match obj.get("ci") {
            Some(ci) => ci.as_i64().ok_or_else(|| decode_error(token))? as i32,
            None => -1,
        };

        return Ok(NodeKind::Value(ValueType::new_variable_pointer(
            variable_name,
            context_index,
        )));
    }

    // Divert
    let divert = [
        ("->", false, PushPopType::Function, false),
        ("f()", true, PushPopType::Function, false),
        ("->t->", true, PushPopType::Tunnel, false),
        ("x()", false, PushPopType::Function, true),
    ]
    .into_iter()
    .find_map(|(key, pushes, push_type, external)| {
        obj.get(key).map(|v| (v, pushes, push_type, external))
    });

    if let Some((target, pushes_to_stack, div_push_type, external)) = divert {
        let target = get_str(token, target)?;

        let (var_divert_name, target_path) = if obj.contains_key("var") {
            (Some(target.to_string()), None)
        } else {
            (None, Some(target))
        };

        let conditional = obj.contains_key("c");

        let external_args = match (external, obj.get("exArgs")) {
            (true, Some(args)) => args.as_u64().ok_or_else(|| decode_error(token))? as usize,
            _ => 0,
        };

        return Ok(NodeKind::Divert(Divert::new(
            pushes_to_stack,
            div_push_type,
            external,
            external_args,
            conditional,
            var_divert_name,
            target_path,
        )));
    }

    // Choice
    if let Some(cp) = obj.get("*") {
        let path_string_on_choice = get_str(token, cp)?;
        let flags = match obj.get("flg") {
            Some(f) => f.as_i64().ok_or_else(|| decode_error(token))? as i32,
            None => 0,
        };

        return Ok(NodeKind::ChoicePoint(ChoicePoint::new(
            flags,
            path_string_on_choice,
        )));
    }

    // Variable reference
    if let Some(name) = obj.get("VAR?") {
        return Ok(NodeKind::VariableReference(VariableReference::new(get_str(
            token, name,
        )?)));
    }

    if let Some(v) = obj.get("CNT?") {
        return Ok(NodeKind::VariableReference(
            VariableReference::from_path_for_count(get_str(token, v)?),
        ));
    }

    // Variable assignment
    let var_ass = match (obj.get("VAR="), obj.get("temp=")) {
        (Some(name), _) => Some((name, true)),
        (None, Some(name)) => Some((name, false)),
        _ => None,
    };

    if let Some((var_name, is_global_var)) = var_ass {
        let is_new_decl = !obj.contains_key("re");

        return Ok(NodeKind::VariableAssignment(VariableAssignment::new(
            get_str(token, var_name)?,
            is_new_decl,
            is_global_var,
        )));
    }

    // Legacy Tag
    if let Some(text) = obj.get("#") {
        return Ok(NodeKind::Tag(Tag::new(get_str(token, text)?)));
    }

    // List value
    if let Some(pv) = obj.get("list") {
        let list_content = pv.as_object().ok_or_else(|| decode_error(token))?;
        let mut raw_list = InkList::new();

        if let Some(o) = obj.get("origins") {
            let names = o
                .as_array()
                .ok_or_else(|| decode_error(token))?
                .iter()
                .map(|e| get_str(token, e).map(str::to_string))
                .collect::<Result<Vec<String>, StoryError>>()?;

            raw_list.set_initial_origin_names(Some(names));
        }

        for (k, v) in list_content {
            let item = InkListItem::from_full_name(k);
            let value = v.as_i64().ok_or_else(|| decode_error(token))? as i32;
            raw_list.items.insert(item, value);
        }

        return Ok(NodeKind::Value(ValueType::List(raw_list)));
    }

    Err(decode_error(token))
}

fn jarray_to_container(
    tree: &mut ContentTree,
    jarray: &[serde_json::Value],
    name: Option<String>,
) -> Result<NodeId, StoryError> {
    // Final object in the array is always a combination of
    //  - named content
    //  - a "#f" key with the countFlags
    //  - a "#n" key with the container name
    // (if either exists at all, otherwise null)
    let (terminating_token, content) = jarray
        .split_last()
        .ok_or_else(|| StoryError::Decode("Container without terminating element".to_owned()))?;

    let terminating_obj = match terminating_token {
        serde_json::Value::Null => None,
        serde_json::Value::Object(obj) => Some(obj),
        other => {
            return Err(StoryError::Decode(format!(
                "Invalid container terminator: {other}"
            )))
        }
    };

    let mut name = name;
    let mut flags = 0;

    if let Some(terminating_obj) = terminating_obj {
        if let Some(f) = terminating_obj.get("#f") {
            flags = f
                .as_i64()
                .ok_or_else(|| StoryError::Decode(format!("Invalid count flags: {f}")))?
                as i32;
        }

        if let Some(n) = terminating_obj.get("#n") {
            name = Some(
                n.as_str()
                    .ok_or_else(|| StoryError::Decode(format!("Invalid container name: {n}")))?
                    .to_string(),
            );
        }
    }

    let container = tree.add_node(NodeKind::Container(Container::new(name, flags)));

    for jtok in content {
        let child = jtoken_to_node(tree, jtok, None)?;
        tree.add_content(container, child)?;
    }

    if let Some(terminating_obj) = terminating_obj {
        for (k, v) in terminating_obj {
            if k == "#f" || k == "#n" {
                continue;
            }

            if !v.is_array() {
                return Err(StoryError::Decode(format!(
                    "Named content '{k}' is not a container"
                )));
            }

            let child = jtoken_to_node(tree, v, Some(k.to_string()))?;
            tree.add_named_only_content(container, k, child)?;
        }
    }

    Ok(container)
}

/// Object stored in an output stream or evaluation stack.
pub(crate) fn jtoken_to_rtobject(token: &serde_json::Value) -> Result<RTObject, StoryError> {
    jtoken_to_node_kind(token)?
        .to_rtobject()
        .ok_or_else(|| decode_error(token))
}

pub(crate) fn jtoken_to_value(token: &serde_json::Value) -> Result<ValueType, StoryError> {
    match jtoken_to_node_kind(token)? {
        NodeKind::Value(v) => Ok(v),
        _ => Err(decode_error(token)),
    }
}

pub(crate) fn jarray_to_rtobjects(jarray: &[serde_json::Value]) -> Result<Vec<RTObject>, StoryError> {
    jarray.iter().map(jtoken_to_rtobject).collect()
}

pub(crate) fn jobject_to_choice(token: &serde_json::Value) -> Result<Choice, StoryError> {
    let obj = token.as_object().ok_or_else(|| decode_error(token))?;

    let get = |key: &str| obj.get(key).ok_or_else(|| decode_error(token));

    let text = get_str(token, get("text")?)?;
    let index = get("index")?.as_u64().ok_or_else(|| decode_error(token))? as usize;
    let source_path = get_str(token, get("originalChoicePath")?)?;
    let original_thread_index = get("originalThreadIndex")?
        .as_u64()
        .ok_or_else(|| decode_error(token))? as usize;
    let path_string_on_choice = get_str(token, get("targetPath")?)?;

    let tags = match obj.get("tags") {
        Some(tags) => tags
            .as_array()
            .ok_or_else(|| decode_error(token))?
            .iter()
            .map(|t| get_str(token, t).map(str::to_string))
            .collect::<Result<Vec<String>, StoryError>>()?,
        None => Vec::new(),
    };

    Ok(Choice::new_from_json(
        path_string_on_choice,
        source_path.to_string(),
        text,
        index,
        original_thread_index,
        tags,
    ))
}

pub(crate) fn jtoken_to_list_definitions(
    def: &serde_json::Value,
) -> Result<ListDefinitionsOrigin, StoryError> {
    let defs = def
        .as_object()
        .ok_or_else(|| StoryError::Decode("Invalid list definitions".to_owned()))?;

    let mut all_defs: Vec<ListDefinition> = Vec::with_capacity(defs.len());

    for (name, list_def_json) in defs {
        let list_def_obj = list_def_json
            .as_object()
            .ok_or_else(|| StoryError::Decode(format!("Invalid list definition: {name}")))?;

        // Cast (string, object) to (string, int) for items
        let mut items: HashMap<String, i32> = HashMap::with_capacity(list_def_obj.len());
        for (k, v) in list_def_obj {
            let value = v
                .as_i64()
                .ok_or_else(|| StoryError::Decode(format!("Invalid value for list item {name}.{k}")))?;
            items.insert(k.clone(), value as i32);
        }

        all_defs.push(ListDefinition::new(name, items));
    }

    Ok(ListDefinitionsOrigin::new(all_defs))
}

pub(crate) fn jobject_to_hashmap_values(
    jobj: &Map<String, serde_json::Value>,
) -> Result<HashMap<String, ValueType>, StoryError> {
    jobj.iter()
        .map(|(k, v)| Ok((k.clone(), jtoken_to_value(v)?)))
        .collect()
}

pub(crate) fn jobject_to_int_hashmap(
    jobj: &Map<String, serde_json::Value>,
) -> Result<HashMap<String, i32>, StoryError> {
    jobj.iter()
        .map(|(k, v)| {
            v.as_i64()
                .map(|i| (k.clone(), i as i32))
                .ok_or_else(|| StoryError::Decode(format!("Invalid count for {k}: {v}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn leaf_tokens() -> Result<(), StoryError> {
        assert_eq!(NodeKind::Value(ValueType::Int(5)), jtoken_to_node_kind(&json!(5))?);
        assert_eq!(NodeKind::Value(ValueType::Float(1.5)), jtoken_to_node_kind(&json!(1.5))?);
        assert_eq!(NodeKind::Value(ValueType::new("hi")), jtoken_to_node_kind(&json!("^hi"))?);
        assert_eq!(NodeKind::Glue, jtoken_to_node_kind(&json!("<>"))?);
        assert_eq!(
            NodeKind::ControlCommand(CommandType::EvalStart),
            jtoken_to_node_kind(&json!("ev"))?
        );
        assert_eq!(
            NodeKind::NativeFunctionCall(Op::Intersect),
            jtoken_to_node_kind(&json!("L^"))?
        );
        assert_eq!(NodeKind::Void, jtoken_to_node_kind(&json!("void"))?);
        Ok(())
    }

    #[test]
    fn unknown_token_is_named_in_error() {
        match jtoken_to_node_kind(&json!({"bogus": 1})) {
            Err(StoryError::Decode(msg)) => assert!(msg.contains("bogus")),
            other => panic!("unexpected result: {other:?}"),
        }

        assert!(matches!(
            jtoken_to_node_kind(&json!("frobnicate")),
            Err(StoryError::Decode(_))
        ));
    }

    #[test]
    fn container_trailer_sets_name_flags_and_named_content() -> Result<(), StoryError> {
        let tree = jtoken_to_content_tree(&json!([
            "^a",
            ["^b", {"#n": "inner"}],
            {"#f": 3, "knot": ["^k", null]}
        ]))?;

        let root = tree.container(tree.root()).ok_or_else(|| StoryError::Decode("no root".to_owned()))?;
        assert_eq!(2, root.content.len());
        assert_eq!(3, root.get_count_flags());
        assert!(root.named_content.contains_key("inner"));
        assert!(root.named_content.contains_key("knot"));

        let knot = tree.knot_container_with_name("knot").ok_or_else(|| StoryError::Address("knot".to_owned()))?;
        assert_eq!("knot", tree.path_of(knot).to_string());
        Ok(())
    }

    #[test]
    fn version_too_new_is_rejected() {
        let r = load_from_string(r#"{"inkVersion": 99, "root": [null], "listDefs": {}}"#);
        assert!(matches!(r, Err(StoryError::Version { found: 99, .. })));
    }
}
