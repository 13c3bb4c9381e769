use std::fmt;

use crate::{
    ink_list::InkList,
    story_error::StoryError,
    value_type::ValueType,
};

/// Type tag of a [`ValueType`]. The declaration order is the coercion order:
/// a binary operation between two kinds casts both operands to the greater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, strum::Display)]
pub enum ValueKind {
    Bool,
    Int,
    Float,
    String,
    List,
    DivertTarget,
    VariablePointer,
}

impl ValueType {
    pub fn kind(&self) -> ValueKind {
        match self {
            ValueType::Bool(_) => ValueKind::Bool,
            ValueType::Int(_) => ValueKind::Int,
            ValueType::Float(_) => ValueKind::Float,
            ValueType::String(_) => ValueKind::String,
            ValueType::List(_) => ValueKind::List,
            ValueType::DivertTarget(_) => ValueKind::DivertTarget,
            ValueType::VariablePointer(_) => ValueKind::VariablePointer,
        }
    }

    pub fn is_truthy(&self) -> Result<bool, StoryError> {
        match self {
            ValueType::Bool(v) => Ok(*v),
            ValueType::Int(v) => Ok(*v != 0),
            ValueType::Float(v) => Ok(*v != 0.0),
            ValueType::String(v) => Ok(!v.string.is_empty()),
            ValueType::List(l) => Ok(!l.items.is_empty()),
            ValueType::DivertTarget(p) => Err(StoryError::Type(format!(
                "Shouldn't use a divert target (to {p}) as a conditional value. Did you intend a function call 'likeThis()' or a read count check 'likeThis'? (no arrows)"
            ))),
            ValueType::VariablePointer(v) => Err(StoryError::Type(format!(
                "Shouldn't be checking the truthiness of a variable pointer ({})",
                v.variable_name
            ))),
        }
    }

    /// Converts the value to `dest`.
    ///
    /// Widening casts always succeed. A string narrowed to a number that does
    /// not parse yields `Ok(None)`. Addresses can't be cast at all.
    pub fn cast(&self, dest: ValueKind) -> Result<Option<ValueType>, StoryError> {
        if self.kind() == dest {
            return Ok(Some(self.clone()));
        }

        let casted = match (self, dest) {
            (ValueType::Bool(v), ValueKind::Int) => ValueType::Int(i32::from(*v)),
            (ValueType::Bool(v), ValueKind::Float) => ValueType::Float(if *v { 1.0 } else { 0.0 }),
            (ValueType::Bool(v), ValueKind::String) => {
                ValueType::new(if *v { "true" } else { "false" })
            }

            (ValueType::Int(v), ValueKind::Bool) => ValueType::Bool(*v != 0),
            (ValueType::Int(v), ValueKind::Float) => ValueType::Float(*v as f32),
            (ValueType::Int(v), ValueKind::String) => ValueType::new(v.to_string()),

            (ValueType::Float(v), ValueKind::Bool) => ValueType::Bool(*v != 0.0),
            (ValueType::Float(v), ValueKind::Int) => ValueType::Int(*v as i32),
            (ValueType::Float(v), ValueKind::String) => ValueType::new(v.to_string()),

            (ValueType::String(s), ValueKind::Int) => {
                return Ok(s.string.trim().parse::<i32>().ok().map(ValueType::Int))
            }
            (ValueType::String(s), ValueKind::Float) => {
                return Ok(s.string.trim().parse::<f32>().ok().map(ValueType::Float))
            }

            (ValueType::List(l), ValueKind::Int) => {
                ValueType::Int(l.get_max_item().map(|(_, v)| v).unwrap_or(0))
            }
            (ValueType::List(l), ValueKind::Float) => {
                ValueType::Float(l.get_max_item().map(|(_, v)| v as f32).unwrap_or(0.0))
            }
            (ValueType::List(l), ValueKind::String) => ValueType::new(
                l.get_max_item()
                    .map(|(item, _)| item.to_string())
                    .unwrap_or_default(),
            ),

            _ => {
                return Err(StoryError::Type(format!(
                    "Can't cast {} from {} to {}",
                    self,
                    self.kind(),
                    dest
                )))
            }
        };

        Ok(Some(casted))
    }

    /// Casts to `dest`, treating an unparseable string as a type error.
    pub(crate) fn coerce(&self, dest: ValueKind) -> Result<ValueType, StoryError> {
        self.cast(dest)?.ok_or_else(|| {
            StoryError::Type(format!("Can't convert '{}' from {} to {}", self, self.kind(), dest))
        })
    }

    /// Assigning an empty list to a list variable keeps the origin of the
    /// previous value, so `LIST_ALL` etc. still work on the result.
    pub(crate) fn retain_list_origins_for_assignment(
        old_value: &ValueType,
        new_value: &mut ValueType,
    ) {
        if let (ValueType::List(old_list), ValueType::List(new_list)) = (old_value, new_value) {
            if new_list.items.is_empty() {
                new_list.set_initial_origin_names(old_list.get_origin_names());
            }
        }
    }

    pub(crate) fn into_list(self) -> Option<InkList> {
        match self {
            ValueType::List(l) => Some(l),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Bool(v) => write!(f, "{}", if *v { "true" } else { "false" }),
            ValueType::Int(v) => write!(f, "{v}"),
            ValueType::Float(v) => write!(f, "{v}"),
            ValueType::String(v) => write!(f, "{}", v.string),
            ValueType::List(l) => write!(f, "{l}"),
            ValueType::DivertTarget(p) => write!(f, "DivertTargetValue({p})"),
            ValueType::VariablePointer(v) => write!(f, "VariablePointerValue({})", v.variable_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widening_casts() {
        let v = ValueType::Int(3);
        assert_eq!(Some(ValueType::Float(3.0)), v.cast(ValueKind::Float).unwrap());
        assert_eq!(Some(ValueType::new("3")), v.cast(ValueKind::String).unwrap());
        assert_eq!(
            Some(ValueType::new("true")),
            ValueType::Bool(true).cast(ValueKind::String).unwrap()
        );
    }

    #[test]
    fn narrowing_invalid_string_is_null() {
        let v = ValueType::new("twelve");
        assert_eq!(None, v.cast(ValueKind::Int).unwrap());
        assert_eq!(Some(ValueType::Int(12)), ValueType::new("12").cast(ValueKind::Int).unwrap());
        assert!(v.coerce(ValueKind::Int).is_err());
    }

    #[test]
    fn address_values_have_no_truthiness() {
        let target = ValueType::DivertTarget(crate::path::Path::new_with_components_string("knot"));
        assert!(matches!(target.is_truthy(), Err(StoryError::Type(_))));
        assert!(target.cast(ValueKind::Int).is_err());

        let pointer = ValueType::new_variable_pointer("x", 0);
        assert!(pointer.is_truthy().is_err());
    }

    #[test]
    fn kinds_are_ordered_for_coercion() {
        assert!(ValueKind::Int < ValueKind::Float);
        assert!(ValueKind::Float < ValueKind::String);
        assert!(ValueKind::String < ValueKind::List);
    }
}
