use std::fmt;

/// Pops the evaluation stack into a global (`VAR=`) or temporary (`temp=`)
/// variable. `re` marks a reassignment rather than a declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableAssignment {
    pub variable_name: String,
    pub is_new_declaration: bool,
    pub is_global: bool,
}

impl VariableAssignment {
    pub fn new(variable_name: &str, is_new_declaration: bool, is_global: bool) -> Self {
        VariableAssignment {
            variable_name: variable_name.to_string(),
            is_new_declaration,
            is_global,
        }
    }
}

impl fmt::Display for VariableAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VarAssign to {}", self.variable_name)
    }
}
