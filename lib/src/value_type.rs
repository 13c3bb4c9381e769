//! A runtime value together with its type.
use crate::{ink_list::InkList, path::Path, story_error::StoryError};

/// A story value, tagged with its type.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueType {
    Bool(bool),
    Int(i32),
    Float(f32),
    /// String, constructed with [`new`](ValueType::new) from a `&str`.
    String(StringValue),
    /// A list value: a set of enumerated items with their ranks.
    List(InkList),
    /// A content path used as a first-class value.
    DivertTarget(Path),
    /// Reference to a variable.
    VariablePointer(VariablePointerValue),
}

impl From<bool> for ValueType {
    fn from(value: bool) -> ValueType {
        ValueType::Bool(value)
    }
}

impl From<i32> for ValueType {
    fn from(value: i32) -> ValueType {
        ValueType::Int(value)
    }
}

impl From<f32> for ValueType {
    fn from(value: f32) -> ValueType {
        ValueType::Float(value)
    }
}

impl From<&str> for ValueType {
    fn from(value: &str) -> ValueType {
        ValueType::String(StringValue::new(value))
    }
}

impl From<String> for ValueType {
    fn from(value: String) -> ValueType {
        ValueType::String(StringValue::new(&value))
    }
}

impl From<InkList> for ValueType {
    fn from(value: InkList) -> ValueType {
        ValueType::List(value)
    }
}

impl From<Path> for ValueType {
    fn from(value: Path) -> ValueType {
        ValueType::DivertTarget(value)
    }
}

impl From<VariablePointerValue> for ValueType {
    fn from(value: VariablePointerValue) -> Self {
        ValueType::VariablePointer(value)
    }
}

impl TryFrom<&ValueType> for bool {
    type Error = ();
    fn try_from(value: &ValueType) -> Result<Self, Self::Error> {
        match value {
            ValueType::Bool(v) => Ok(*v),
            _ => Err(()),
        }
    }
}

impl TryFrom<&ValueType> for i32 {
    type Error = ();
    fn try_from(value: &ValueType) -> Result<Self, Self::Error> {
        match value {
            ValueType::Int(v) => Ok(*v),
            _ => Err(()),
        }
    }
}

impl TryFrom<&ValueType> for f32 {
    type Error = ();
    fn try_from(value: &ValueType) -> Result<Self, Self::Error> {
        match value {
            ValueType::Float(v) => Ok(*v),
            _ => Err(()),
        }
    }
}

impl<'val> TryFrom<&'val ValueType> for &'val str {
    type Error = ();
    fn try_from(value: &'val ValueType) -> Result<Self, Self::Error> {
        match value {
            ValueType::String(v) => Ok(&v.string),
            _ => Err(()),
        }
    }
}

impl<'val> TryFrom<&'val ValueType> for &'val InkList {
    type Error = ();
    fn try_from(value: &'val ValueType) -> Result<Self, Self::Error> {
        match value {
            ValueType::List(v) => Ok(v),
            _ => Err(()),
        }
    }
}

impl<'val> TryFrom<&'val ValueType> for &'val Path {
    type Error = ();
    fn try_from(value: &'val ValueType) -> Result<Self, Self::Error> {
        match value {
            ValueType::DivertTarget(v) => Ok(v),
            _ => Err(()),
        }
    }
}

impl ValueType {
    pub fn new<T: Into<ValueType>>(v: T) -> Self {
        v.into()
    }

    pub fn new_variable_pointer(variable_name: &str, context_index: i32) -> Self {
        ValueType::VariablePointer(VariablePointerValue {
            variable_name: variable_name.to_string(),
            context_index,
        })
    }

    /// Typed accessor, `None` when the value holds another type.
    pub fn get<'val, T>(&'val self) -> Option<T>
    where
        &'val Self: TryInto<T>,
    {
        self.try_into().ok()
    }

    pub fn coerce_to_int(&self) -> Result<i32, StoryError> {
        match self {
            ValueType::Bool(v) => Ok(i32::from(*v)),
            ValueType::Int(v) => Ok(*v),
            ValueType::Float(v) => Ok(*v as i32),
            _ => Err(StoryError::Type(format!("Failed to cast {} to int", self.kind()))),
        }
    }

    pub fn coerce_to_float(&self) -> Result<f32, StoryError> {
        match self {
            ValueType::Bool(v) => Ok(if *v { 1.0 } else { 0.0 }),
            ValueType::Int(v) => Ok(*v as f32),
            ValueType::Float(v) => Ok(*v),
            _ => Err(StoryError::Type(format!(
                "Failed to cast {} to float",
                self.kind()
            ))),
        }
    }

    pub fn coerce_to_bool(&self) -> Result<bool, StoryError> {
        match self {
            ValueType::Bool(v) => Ok(*v),
            ValueType::Int(v) => Ok(*v != 0),
            _ => Err(StoryError::Type(format!(
                "Failed to cast {} to boolean",
                self.kind()
            ))),
        }
    }

    pub fn coerce_to_string(&self) -> Result<String, StoryError> {
        match self {
            ValueType::Bool(_) | ValueType::Int(_) | ValueType::Float(_) => Ok(self.to_string()),
            ValueType::String(v) => Ok(v.string.clone()),
            _ => Err(StoryError::Type(format!(
                "Failed to cast {} to string",
                self.kind()
            ))),
        }
    }
}

/// Runtime representation of a string.
#[derive(Debug, Clone, PartialEq)]
pub struct StringValue {
    pub string: String,
    pub(crate) is_inline_whitespace: bool,
    pub(crate) is_newline: bool,
}

impl StringValue {
    pub fn new(s: &str) -> Self {
        StringValue {
            string: s.to_string(),
            is_inline_whitespace: s.chars().all(|c| c == ' ' || c == '\t'),
            is_newline: s == "\n",
        }
    }

    pub fn is_non_whitespace(&self) -> bool {
        !self.is_newline && !self.is_inline_whitespace
    }
}

/// Reference to a variable, as produced by `ref` parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct VariablePointerValue {
    pub variable_name: String,

    // Where the variable is located
    // -1 = default, unknown, yet to be determined
    // 0  = in global scope
    // 1+ = callstack element index + 1 (so that the first doesn't conflict with special global scope)
    pub context_index: i32,
}
