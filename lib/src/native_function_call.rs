//! Operators and built-in functions that act on values.
use crate::{
    ink_list::InkList, list_definitions_origin::ListDefinitionsOrigin, object::RTObject,
    story_error::StoryError, value::ValueKind, value_type::ValueType,
};

#[derive(Debug, PartialEq, Eq, Clone, Copy, strum::Display)]
pub enum Op {
    Add,
    Subtract,
    Divide,
    Multiply,
    Mod,
    Negate,

    Equal,
    Greater,
    Less,
    GreaterThanOrEquals,
    LessThanOrEquals,
    NotEquals,
    Not,

    And,
    Or,

    Min,
    Max,

    Pow,
    Floor,
    Ceiling,
    Int,
    Float,

    Has,
    Hasnt,
    Intersect,

    ListMin,
    ListMax,
    All,
    Count,
    ValueOfList,
    Invert,
}

/// Symbol, operation and number of parameters of every native function.
const NATIVE_FUNCTIONS: &[(&str, Op, usize)] = &[
    ("+", Op::Add, 2),
    ("-", Op::Subtract, 2),
    ("/", Op::Divide, 2),
    ("*", Op::Multiply, 2),
    ("%", Op::Mod, 2),
    ("_", Op::Negate, 1),
    ("==", Op::Equal, 2),
    (">", Op::Greater, 2),
    ("<", Op::Less, 2),
    (">=", Op::GreaterThanOrEquals, 2),
    ("<=", Op::LessThanOrEquals, 2),
    ("!=", Op::NotEquals, 2),
    ("!", Op::Not, 1),
    ("&&", Op::And, 2),
    ("||", Op::Or, 2),
    ("MIN", Op::Min, 2),
    ("MAX", Op::Max, 2),
    ("POW", Op::Pow, 2),
    ("FLOOR", Op::Floor, 1),
    ("CEILING", Op::Ceiling, 1),
    ("INT", Op::Int, 1),
    ("FLOAT", Op::Float, 1),
    ("?", Op::Has, 2),
    ("!?", Op::Hasnt, 2),
    ("^", Op::Intersect, 2),
    ("LIST_MIN", Op::ListMin, 1),
    ("LIST_MAX", Op::ListMax, 1),
    ("LIST_ALL", Op::All, 1),
    ("LIST_COUNT", Op::Count, 1),
    ("LIST_VALUE", Op::ValueOfList, 1),
    ("LIST_INVERT", Op::Invert, 1),
];

impl Op {
    pub fn from_name(name: &str) -> Option<Op> {
        NATIVE_FUNCTIONS
            .iter()
            .find(|(n, _, _)| *n == name)
            .map(|(_, op, _)| *op)
    }

    pub fn get_name(self) -> &'static str {
        NATIVE_FUNCTIONS
            .iter()
            .find(|(_, op, _)| *op == self)
            .map(|(n, _, _)| *n)
            .unwrap_or_default()
    }

    pub fn get_number_of_parameters(self) -> usize {
        NATIVE_FUNCTIONS
            .iter()
            .find(|(_, op, _)| *op == self)
            .map(|(_, _, n)| *n)
            .unwrap_or_default()
    }
}

/// Applies `op` to the popped operands.
///
/// Any list operand routes a binary call to the list rules. Otherwise every
/// operand is cast to the widest kind present (at least `Int`) and the
/// handler for that kind runs.
pub(crate) fn call(
    op: Op,
    params: Vec<RTObject>,
    list_defs: &ListDefinitionsOrigin,
) -> Result<ValueType, StoryError> {
    if op.get_number_of_parameters() != params.len() {
        return Err(StoryError::Structural(format!(
            "Unexpected number of parameters calling '{}'",
            op.get_name()
        )));
    }

    let mut values = Vec::with_capacity(params.len());
    for p in params {
        match p {
            RTObject::Value(v) => values.push(v),
            RTObject::Void => return Err(StoryError::Type("Attempting to perform operation on a void value. Did you forget to 'return' a value from a function you called here?".to_owned())),
            other => {
                return Err(StoryError::Type(format!(
                    "Expected a value as parameter of '{}' but found {}",
                    op.get_name(),
                    other
                )))
            }
        }
    }

    let has_list = values.iter().any(|v| matches!(v, ValueType::List(_)));

    // Binary operations on lists are treated outside of the standard
    // coercion rules
    if values.len() == 2 && has_list {
        let b = values.pop().unwrap_or(ValueType::Int(0));
        let a = values.pop().unwrap_or(ValueType::Int(0));
        return call_binary_list_operation(op, a, b, list_defs);
    }

    let coerced = coerce_values_to_single_type(values)?;
    call_type(op, &coerced, list_defs)
}

fn call_binary_list_operation(
    op: Op,
    a: ValueType,
    b: ValueType,
    list_defs: &ListDefinitionsOrigin,
) -> Result<ValueType, StoryError> {
    // List-Int addition/subtraction shifts ranks (e.g. "alpha" + 1 = "beta")
    if let (Op::Add | Op::Subtract, ValueType::List(list), ValueType::Int(delta)) = (op, &a, &b) {
        return Ok(ValueType::List(list_increment(op, list, *delta, list_defs)));
    }

    // And/or with any other type requires coercion to bool
    if matches!(op, Op::And | Op::Or)
        && (!matches!(a, ValueType::List(_)) || !matches!(b, ValueType::List(_)))
    {
        let (x, y) = (a.is_truthy()?, b.is_truthy()?);
        return Ok(ValueType::Bool(if op == Op::And { x && y } else { x || y }));
    }

    let special_case_list = match (&a, &b) {
        (_, ValueType::List(l)) | (ValueType::List(l), _) => l.clone(),
        _ => InkList::new(),
    };

    let a = int_to_list_item(a, &special_case_list, list_defs)?;
    let b = int_to_list_item(b, &special_case_list, list_defs)?;

    list_op(op, &[a, b], list_defs)
}

fn list_increment(op: Op, list: &InkList, delta: i32, list_defs: &ListDefinitionsOrigin) -> InkList {
    let mut result = InkList::new();

    for (item, value) in list.items.iter() {
        let target = if op == Op::Add {
            value.wrapping_add(delta)
        } else {
            value.wrapping_sub(delta)
        };

        let origin = item
            .get_origin_name()
            .and_then(|name| list_defs.get_list_definition(name));

        if let Some(incremented) = origin.and_then(|o| o.get_item_with_value(target)) {
            result.items.insert(incremented, target);
        }
    }

    result
}

// An int mixed with a list means the item of that rank in the list's own
// definition.
fn int_to_list_item(
    v: ValueType,
    list: &InkList,
    list_defs: &ListDefinitionsOrigin,
) -> Result<InkList, StoryError> {
    match v {
        ValueType::List(l) => Ok(l),
        ValueType::Int(int_val) => {
            let origin = list.origin_of_max_item(list_defs).ok_or_else(|| {
                StoryError::Type(format!(
                    "Could not find List item with the value {int_val} because the list has no origin"
                ))
            })?;

            match origin.get_item_with_value(int_val) {
                Some(item) => Ok(InkList::from_single_element(item, int_val)),
                None => Err(StoryError::Type(format!(
                    "Could not find List item with the value {} in {}",
                    int_val,
                    origin.get_name()
                ))),
            }
        }
        other => Err(StoryError::Type(format!(
            "Cannot mix Lists and {} values in this operation",
            other.kind()
        ))),
    }
}

fn coerce_values_to_single_type(values: Vec<ValueType>) -> Result<Vec<ValueType>, StoryError> {
    // "higher level" types infect both so that binary operations
    // use the same type on both sides. e.g. binary operation of
    // int and float causes the int to be casted to a float.
    let dest = values
        .iter()
        .map(ValueType::kind)
        .fold(ValueKind::Int, std::cmp::max);

    values.iter().map(|v| v.coerce(dest)).collect()
}

fn call_type(
    op: Op,
    params: &[ValueType],
    list_defs: &ListDefinitionsOrigin,
) -> Result<ValueType, StoryError> {
    match &params[0] {
        ValueType::Int(_) => {
            let ints = params
                .iter()
                .map(ValueType::coerce_to_int)
                .collect::<Result<Vec<i32>, StoryError>>()?;
            int_op(op, &ints)
        }
        ValueType::Float(_) => {
            let floats = params
                .iter()
                .map(ValueType::coerce_to_float)
                .collect::<Result<Vec<f32>, StoryError>>()?;
            float_op(op, &floats)
        }
        ValueType::String(_) => {
            let strings: Vec<&str> = params.iter().filter_map(|v| v.get::<&str>()).collect();
            string_op(op, &strings)
        }
        ValueType::List(_) => {
            let lists: Vec<InkList> = params.iter().cloned().filter_map(ValueType::into_list).collect();
            list_op(op, &lists, list_defs)
        }
        ValueType::DivertTarget(_) => divert_target_op(op, params),
        other => Err(not_available(op, other.kind())),
    }
}

fn not_available(op: Op, kind: ValueKind) -> StoryError {
    StoryError::Type(format!(
        "Cannot perform operation '{}' on {}",
        op.get_name(),
        kind
    ))
}

fn division_by_zero(op: Op) -> StoryError {
    StoryError::Type(format!("Division by zero in operation '{}'", op.get_name()))
}

fn int_op(op: Op, p: &[i32]) -> Result<ValueType, StoryError> {
    if let [x] = p {
        let x = *x;
        return match op {
            Op::Negate => Ok(ValueType::Int(x.wrapping_neg())),
            Op::Not => Ok(ValueType::Bool(x == 0)),
            Op::Floor | Op::Ceiling | Op::Int => Ok(ValueType::Int(x)),
            Op::Float => Ok(ValueType::Float(x as f32)),
            _ => Err(not_available(op, ValueKind::Int)),
        };
    }

    let (x, y) = (p[0], p[1]);

    match op {
        Op::Add => Ok(ValueType::Int(x.wrapping_add(y))),
        Op::Subtract => Ok(ValueType::Int(x.wrapping_sub(y))),
        Op::Multiply => Ok(ValueType::Int(x.wrapping_mul(y))),
        Op::Divide => x
            .checked_div(y)
            .map(ValueType::Int)
            .ok_or_else(|| division_by_zero(op)),
        Op::Mod => x
            .checked_rem(y)
            .map(ValueType::Int)
            .ok_or_else(|| division_by_zero(op)),
        Op::Equal => Ok(ValueType::Bool(x == y)),
        Op::Greater => Ok(ValueType::Bool(x > y)),
        Op::Less => Ok(ValueType::Bool(x < y)),
        Op::GreaterThanOrEquals => Ok(ValueType::Bool(x >= y)),
        Op::LessThanOrEquals => Ok(ValueType::Bool(x <= y)),
        Op::NotEquals => Ok(ValueType::Bool(x != y)),
        Op::And => Ok(ValueType::Bool(x != 0 && y != 0)),
        Op::Or => Ok(ValueType::Bool(x != 0 || y != 0)),
        Op::Min => Ok(ValueType::Int(x.min(y))),
        Op::Max => Ok(ValueType::Int(x.max(y))),
        // POW(2, -1) needs a float result
        Op::Pow => Ok(ValueType::Float((x as f32).powf(y as f32))),
        _ => Err(not_available(op, ValueKind::Int)),
    }
}

fn float_op(op: Op, p: &[f32]) -> Result<ValueType, StoryError> {
    if let [x] = p {
        let x = *x;
        return match op {
            Op::Negate => Ok(ValueType::Float(-x)),
            Op::Not => Ok(ValueType::Bool(x == 0.0)),
            Op::Floor => Ok(ValueType::Float(x.floor())),
            Op::Ceiling => Ok(ValueType::Float(x.ceil())),
            Op::Int => Ok(ValueType::Int(x as i32)),
            Op::Float => Ok(ValueType::Float(x)),
            _ => Err(not_available(op, ValueKind::Float)),
        };
    }

    let (x, y) = (p[0], p[1]);

    match op {
        Op::Add => Ok(ValueType::Float(x + y)),
        Op::Subtract => Ok(ValueType::Float(x - y)),
        Op::Multiply => Ok(ValueType::Float(x * y)),
        Op::Divide => Ok(ValueType::Float(x / y)),
        Op::Mod => Ok(ValueType::Float(x % y)),
        Op::Equal => Ok(ValueType::Bool(x == y)),
        Op::Greater => Ok(ValueType::Bool(x > y)),
        Op::Less => Ok(ValueType::Bool(x < y)),
        Op::GreaterThanOrEquals => Ok(ValueType::Bool(x >= y)),
        Op::LessThanOrEquals => Ok(ValueType::Bool(x <= y)),
        Op::NotEquals => Ok(ValueType::Bool(x != y)),
        Op::And => Ok(ValueType::Bool(x != 0.0 && y != 0.0)),
        Op::Or => Ok(ValueType::Bool(x != 0.0 || y != 0.0)),
        Op::Min => Ok(ValueType::Float(x.min(y))),
        Op::Max => Ok(ValueType::Float(x.max(y))),
        Op::Pow => Ok(ValueType::Float(x.powf(y))),
        _ => Err(not_available(op, ValueKind::Float)),
    }
}

fn string_op(op: Op, p: &[&str]) -> Result<ValueType, StoryError> {
    match (op, p) {
        (Op::Add, [x, y]) => Ok(ValueType::new(format!("{x}{y}"))),
        (Op::Equal, [x, y]) => Ok(ValueType::Bool(x == y)),
        (Op::NotEquals, [x, y]) => Ok(ValueType::Bool(x != y)),
        (Op::Has, [x, y]) => Ok(ValueType::Bool(x.contains(y))),
        (Op::Hasnt, [x, y]) => Ok(ValueType::Bool(!x.contains(y))),
        _ => Err(not_available(op, ValueKind::String)),
    }
}

fn list_op(op: Op, p: &[InkList], list_defs: &ListDefinitionsOrigin) -> Result<ValueType, StoryError> {
    if let [x] = p {
        return match op {
            Op::Not => Ok(ValueType::Int(i32::from(x.items.is_empty()))),
            Op::Invert => Ok(ValueType::List(x.inverse(list_defs))),
            Op::All => Ok(ValueType::List(x.all(list_defs))),
            Op::ListMin => Ok(ValueType::List(x.min_as_list())),
            Op::ListMax => Ok(ValueType::List(x.max_as_list())),
            Op::Count => Ok(ValueType::Int(x.items.len() as i32)),
            Op::ValueOfList => Ok(ValueType::Int(
                x.get_max_item().map(|(_, v)| v).unwrap_or(0),
            )),
            _ => Err(not_available(op, ValueKind::List)),
        };
    }

    let (x, y) = (&p[0], &p[1]);

    match op {
        Op::Add => Ok(ValueType::List(x.union(y))),
        Op::Subtract => Ok(ValueType::List(x.without(y))),
        Op::Has => Ok(ValueType::Bool(x.contains(y))),
        Op::Hasnt => Ok(ValueType::Bool(!x.contains(y))),
        Op::Intersect => Ok(ValueType::List(x.intersect(y))),
        Op::Equal => Ok(ValueType::Bool(x.list_equals(y))),
        Op::NotEquals => Ok(ValueType::Bool(!x.list_equals(y))),
        Op::Greater => Ok(ValueType::Bool(x.greater_than(y))),
        Op::Less => Ok(ValueType::Bool(x.less_than(y))),
        Op::GreaterThanOrEquals => Ok(ValueType::Bool(x.greater_than_or_equals(y))),
        Op::LessThanOrEquals => Ok(ValueType::Bool(x.less_than_or_equals(y))),
        Op::And => Ok(ValueType::Bool(!x.items.is_empty() && !y.items.is_empty())),
        Op::Or => Ok(ValueType::Bool(!x.items.is_empty() || !y.items.is_empty())),
        _ => Err(not_available(op, ValueKind::List)),
    }
}

// The only operations available on divert targets are (in)equality.
fn divert_target_op(op: Op, p: &[ValueType]) -> Result<ValueType, StoryError> {
    match (op, p) {
        (Op::Equal, [ValueType::DivertTarget(x), ValueType::DivertTarget(y)]) => {
            Ok(ValueType::Bool(x == y))
        }
        (Op::NotEquals, [ValueType::DivertTarget(x), ValueType::DivertTarget(y)]) => {
            Ok(ValueType::Bool(x != y))
        }
        _ => Err(not_available(op, ValueKind::DivertTarget)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::{ink_list_item::InkListItem, list_definition::ListDefinition};

    fn v(value: impl Into<ValueType>) -> RTObject {
        RTObject::Value(value.into())
    }

    fn defs() -> ListDefinitionsOrigin {
        let mut greek = HashMap::new();
        greek.insert("alpha".to_string(), 1);
        greek.insert("beta".to_string(), 2);
        greek.insert("gamma".to_string(), 3);
        ListDefinitionsOrigin::new(vec![ListDefinition::new("greek", greek)])
    }

    fn greek(name: &str, value: i32) -> InkList {
        InkList::from_single_element(InkListItem::new(Some("greek"), name), value)
    }

    #[test]
    fn mod_is_remainder() -> Result<(), StoryError> {
        let defs = defs();
        assert_eq!(ValueType::Int(1), call(Op::Mod, vec![v(7), v(3)], &defs)?);
        assert_eq!(ValueType::Float(1.5), call(Op::Mod, vec![v(7.5f32), v(3)], &defs)?);
        Ok(())
    }

    #[test]
    fn int_and_float_widen_to_float() -> Result<(), StoryError> {
        let defs = defs();
        assert_eq!(ValueType::Float(3.5), call(Op::Add, vec![v(1), v(2.5f32)], &defs)?);
        assert_eq!(ValueType::new("a1"), call(Op::Add, vec![v("a"), v(1)], &defs)?);
        Ok(())
    }

    #[test]
    fn bools_compute_as_ints() -> Result<(), StoryError> {
        let defs = defs();
        assert_eq!(ValueType::Int(2), call(Op::Add, vec![v(true), v(1)], &defs)?);
        assert_eq!(ValueType::Bool(true), call(Op::Not, vec![v(false)], &defs)?);
        Ok(())
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let result = call(Op::Divide, vec![v(1), v(0)], &defs());
        assert!(matches!(result, Err(StoryError::Type(_))));
    }

    #[test]
    fn void_parameter_is_an_error() {
        let result = call(Op::Add, vec![RTObject::Void, v(1)], &defs());
        assert!(result.is_err());
    }

    #[test]
    fn list_plus_int_shifts_ranks() -> Result<(), StoryError> {
        let defs = defs();
        let result = call(Op::Add, vec![v(greek("alpha", 1)), v(1)], &defs)?;
        assert_eq!("beta", result.to_string());

        // Past the end of the definition the item disappears
        let result = call(Op::Add, vec![v(greek("gamma", 3)), v(1)], &defs)?;
        assert_eq!("", result.to_string());
        Ok(())
    }

    #[test]
    fn int_mixed_with_list_becomes_item() -> Result<(), StoryError> {
        let defs = defs();
        let result = call(Op::Equal, vec![v(greek("beta", 2)), v(2)], &defs)?;
        assert_eq!(ValueType::Bool(true), result);

        assert!(call(Op::Equal, vec![v(greek("beta", 2)), v(9)], &defs).is_err());
        Ok(())
    }

    #[test]
    fn list_and_scalar_use_truthiness() -> Result<(), StoryError> {
        let defs = defs();
        let result = call(Op::And, vec![v(greek("beta", 2)), v(0)], &defs)?;
        assert_eq!(ValueType::Bool(false), result);
        let result = call(Op::Or, vec![v(InkList::new()), v(1)], &defs)?;
        assert_eq!(ValueType::Bool(true), result);
        Ok(())
    }

    #[test]
    fn list_greater_compares_min_against_max() -> Result<(), StoryError> {
        let defs = defs();
        let high = greek("beta", 2).union(&greek("gamma", 3));
        let low = greek("alpha", 1).union(&greek("beta", 2));

        assert_eq!(
            ValueType::Bool(false),
            call(Op::Greater, vec![v(high.clone()), v(low)], &defs)?
        );
        assert_eq!(
            ValueType::Bool(true),
            call(Op::Greater, vec![v(high), v(greek("alpha", 1))], &defs)?
        );
        Ok(())
    }

    #[test]
    fn mixing_list_and_string_is_an_error() {
        let result = call(Op::Equal, vec![v(greek("beta", 2)), v("beta")], &defs());
        assert!(matches!(result, Err(StoryError::Type(_))));
    }

    #[test]
    fn names_round_trip() {
        for (name, op, _) in NATIVE_FUNCTIONS {
            assert_eq!(Some(*op), Op::from_name(name));
            assert_eq!(*name, op.get_name());
        }
    }
}
