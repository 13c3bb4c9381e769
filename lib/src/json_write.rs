//! Encoding of content trees and of the objects stored in saved states.
use std::collections::HashMap;

use serde_json::{json, Map};

use crate::{
    choice::Choice,
    container::ContentTree,
    divert::Divert,
    ink_list::InkList,
    list_definitions_origin::ListDefinitionsOrigin,
    native_function_call::Op,
    object::{NodeId, NodeKind, RTObject},
    push_pop::PushPopType,
    story::INK_VERSION_CURRENT,
    value_type::ValueType,
};

/// Whole story file: format version, content and list definitions.
pub(crate) fn write_story(tree: &ContentTree, list_definitions: &ListDefinitionsOrigin) -> serde_json::Value {
    let mut jobj: Map<String, serde_json::Value> = Map::new();

    jobj.insert("inkVersion".to_owned(), json!(INK_VERSION_CURRENT));
    jobj.insert("root".to_owned(), write_rt_container(tree, tree.root(), false));
    jobj.insert("listDefs".to_owned(), write_list_definitions(list_definitions));

    serde_json::Value::Object(jobj)
}

fn write_list_definitions(list_definitions: &ListDefinitionsOrigin) -> serde_json::Value {
    let mut defs: Map<String, serde_json::Value> = Map::new();

    for def in list_definitions.lists() {
        let mut items: Map<String, serde_json::Value> = Map::new();

        for (item, value) in def.get_items() {
            items.insert(item.get_item_name().to_string(), json!(value));
        }

        defs.insert(def.get_name().to_string(), serde_json::Value::Object(items));
    }

    serde_json::Value::Object(defs)
}

pub(crate) fn write_node(tree: &ContentTree, id: NodeId) -> serde_json::Value {
    match tree.kind(id) {
        NodeKind::Container(_) => write_rt_container(tree, id, false),
        NodeKind::ControlCommand(c) => json!(c.get_name()),
        NodeKind::Divert(divert) => write_divert(divert),
        NodeKind::ChoicePoint(cp) => json!({
            "*": cp.get_path_on_choice().get_components_string(),
            "flg": cp.get_flags(),
        }),
        NodeKind::Value(v) => write_value(v),
        NodeKind::NativeFunctionCall(op) => write_native_function(*op),
        NodeKind::VariableReference(var_ref) => match var_ref.get_path_for_count() {
            Some(path) => json!({"CNT?": path.get_components_string()}),
            None => json!({"VAR?": var_ref.name}),
        },
        NodeKind::VariableAssignment(var_ass) => {
            let mut jobj: Map<String, serde_json::Value> = Map::new();

            let key = if var_ass.is_global { "VAR=" } else { "temp=" };
            jobj.insert(key.to_owned(), json!(var_ass.variable_name));

            // Reassignment?
            if !var_ass.is_new_declaration {
                jobj.insert("re".to_owned(), json!(true));
            }

            serde_json::Value::Object(jobj)
        }
        NodeKind::Tag(tag) => json!({"#": tag.get_text()}),
        NodeKind::Glue => json!("<>"),
        NodeKind::Void => json!("void"),
    }
}

fn write_divert(divert: &Divert) -> serde_json::Value {
    let div_type_key = if divert.is_external {
        "x()"
    } else if divert.pushes_to_stack {
        match divert.stack_push_type {
            PushPopType::Tunnel => "->t->",
            _ => "f()",
        }
    } else {
        "->"
    };

    let target_str = match &divert.variable_divert_name {
        Some(name) => name.clone(),
        None => divert
            .get_target_path()
            .map(|p| p.get_components_string())
            .unwrap_or_default(),
    };

    let mut jobj: Map<String, serde_json::Value> = Map::new();

    jobj.insert(div_type_key.to_string(), json!(target_str));

    if divert.has_variable_target() {
        jobj.insert("var".to_owned(), json!(true));
    }

    if divert.is_conditional {
        jobj.insert("c".to_owned(), json!(true));
    }

    if divert.external_args > 0 {
        jobj.insert("exArgs".to_owned(), json!(divert.external_args));
    }

    serde_json::Value::Object(jobj)
}

fn write_native_function(op: Op) -> serde_json::Value {
    let name = op.get_name();

    // "^" is the string marker, so intersection is written as "L^"
    if name == "^" {
        json!("L^")
    } else {
        json!(name)
    }
}

pub(crate) fn write_rt_container(tree: &ContentTree, id: NodeId, without_name: bool) -> serde_json::Value {
    let Some(container) = tree.container(id) else {
        return write_node(tree, id);
    };

    let mut c_array: Vec<serde_json::Value> = Vec::with_capacity(container.content.len() + 1);

    for c in container.content.iter() {
        c_array.push(write_node(tree, *c));
    }

    // Container is always an array [...]
    // But the final element is always either:
    // - a dictionary containing the named content, as well as possibly
    // the key "#f" with the count flags and "#n" with the name
    // - null, if neither of the above
    let named_only_content = container.get_named_only_content();
    let count_flags = container.get_count_flags();
    let has_name_property = container.name.is_some() && !without_name;

    let has_terminator = !named_only_content.is_empty() || count_flags > 0 || has_name_property;

    if has_terminator {
        let mut t_obj: Map<String, serde_json::Value> = Map::new();

        for (name, named_container) in named_only_content {
            t_obj.insert(name.clone(), write_rt_container(tree, named_container, true));
        }

        if count_flags > 0 {
            t_obj.insert("#f".to_owned(), json!(count_flags));
        }

        if let (true, Some(name)) = (has_name_property, &container.name) {
            t_obj.insert("#n".to_owned(), json!(name));
        }

        c_array.push(serde_json::Value::Object(t_obj));
    } else {
        c_array.push(serde_json::Value::Null);
    }

    serde_json::Value::Array(c_array)
}

pub(crate) fn write_value(value: &ValueType) -> serde_json::Value {
    match value {
        ValueType::Bool(v) => json!(v),
        ValueType::Int(v) => json!(v),
        ValueType::Float(v) => write_float(*v),
        ValueType::String(v) => {
            if v.is_newline {
                json!("\n")
            } else {
                json!(format!("^{}", v.string))
            }
        }
        ValueType::List(l) => write_ink_list(l),
        ValueType::DivertTarget(p) => json!({"^->": p.get_components_string()}),
        ValueType::VariablePointer(v) => json!({
            "^var": v.variable_name,
            "ci": v.context_index,
        }),
    }
}

// Floats always carry a decimal point so they are read back as floats.
// Non finite values are clamped to the largest finite ones.
fn write_float(f: f32) -> serde_json::Value {
    let f = if f.is_nan() {
        0.0
    } else {
        f.clamp(f32::MIN, f32::MAX)
    };

    let mut s = f.to_string();
    if !s.contains('.') {
        s.push_str(".0");
    }

    s.parse::<serde_json::Number>()
        .map(serde_json::Value::Number)
        .unwrap_or_else(|_| json!(f as f64))
}

fn write_ink_list(list: &InkList) -> serde_json::Value {
    let mut items: Map<String, serde_json::Value> = Map::new();

    for (item, v) in list.items.iter() {
        items.insert(item.get_full_name(), json!(v));
    }

    let mut jobj: Map<String, serde_json::Value> = Map::new();
    jobj.insert("list".to_owned(), serde_json::Value::Object(items));

    // Empty lists still need to know which definitions they belong to
    if list.items.is_empty() {
        if let Some(origin_names) = list.get_origin_names().filter(|n| !n.is_empty()) {
            jobj.insert("origins".to_owned(), json!(origin_names));
        }
    }

    serde_json::Value::Object(jobj)
}

pub(crate) fn write_rtobject(o: &RTObject) -> serde_json::Value {
    match o {
        RTObject::Value(v) => write_value(v),
        RTObject::ControlCommand(c) => json!(c.get_name()),
        RTObject::Tag(t) => json!({"#": t.get_text()}),
        RTObject::Glue => json!("<>"),
        RTObject::Void => json!("void"),
    }
}

pub(crate) fn write_list_rt_objs(objs: &[RTObject]) -> serde_json::Value {
    serde_json::Value::Array(objs.iter().map(write_rtobject).collect())
}

pub(crate) fn write_dictionary_values(objs: &HashMap<String, ValueType>) -> serde_json::Value {
    let mut jobjs: Map<String, serde_json::Value> = Map::new();

    for (k, o) in objs {
        jobjs.insert(k.clone(), write_value(o));
    }

    serde_json::Value::Object(jobjs)
}

pub(crate) fn write_int_dictionary(map: &HashMap<String, i32>) -> serde_json::Value {
    let mut jobj: Map<String, serde_json::Value> = Map::new();

    for (key, val) in map {
        jobj.insert(key.clone(), json!(*val));
    }

    serde_json::Value::Object(jobj)
}

pub(crate) fn write_choice(choice: &Choice) -> serde_json::Value {
    let mut jobj: Map<String, serde_json::Value> = Map::new();

    jobj.insert("text".to_owned(), json!(choice.text));
    jobj.insert("index".to_owned(), json!(choice.index));
    jobj.insert("originalChoicePath".to_owned(), json!(choice.source_path));
    jobj.insert("originalThreadIndex".to_owned(), json!(choice.original_thread_index));
    jobj.insert("targetPath".to_owned(), json!(choice.get_path_string_on_choice()));

    if !choice.tags.is_empty() {
        jobj.insert("tags".to_owned(), json!(choice.tags));
    }

    serde_json::Value::Object(jobj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{json_read, story_error::StoryError};

    const STORY: &str = r##"{"inkVersion":21,"root":[["^Hello","\n",{"->":"knot"},["ev",{"VAR?":"x"},1,"+",{"VAR=":"x","re":true},"/ev",{"#f":5}],null],"done",{"knot":[{"CNT?":".^"},"ev",{"^->":"knot"},{"^var":"x","ci":0},1.5,true,"L^","/ev","<>",{"#":"tag"},{"*":"0.c-0","flg":20},{"f()":"fn"},{"x()":"ext","exArgs":2},{"temp=":"t"},{"list":{"A.a":1}},{"list":{},"origins":["A"]},"void",{"#f":1}],"global decl":["ev",0,{"VAR=":"x"},"/ev","end",null],"#f":1}],"listDefs":{"A":{"a":1,"b":2}}}"##;

    #[test]
    fn tree_round_trip() -> Result<(), StoryError> {
        let (_, tree, list_defs) = json_read::load_from_string(STORY)?;

        let encoded = write_story(&tree, &list_defs).to_string();
        let (_, decoded, decoded_defs) = json_read::load_from_string(&encoded)?;

        assert_eq!(tree, decoded);
        assert_eq!(list_defs, decoded_defs);

        // Encoding is stable once normalised
        assert_eq!(encoded, write_story(&decoded, &decoded_defs).to_string());
        Ok(())
    }

    #[test]
    fn floats_keep_their_decimal_point() {
        assert_eq!("1.0", write_float(1.0).to_string());
        assert_eq!("0.1", write_float(0.1).to_string());
        assert_eq!("-2.5", write_float(-2.5).to_string());
    }
}
