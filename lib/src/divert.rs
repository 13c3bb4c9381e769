use std::fmt;

use crate::{path::Path, pointer::Pointer, push_pop::PushPopType};

/// Jump to another place in the content, optionally pushing a tunnel or
/// function frame first.
#[derive(Debug, Clone, PartialEq)]
pub struct Divert {
    pub external_args: usize,
    pub is_conditional: bool,
    pub is_external: bool,
    pub pushes_to_stack: bool,
    pub stack_push_type: PushPopType,
    pub variable_divert_name: Option<String>,
    target_path: Option<Path>,
    // Resolved once the whole tree is loaded.
    pub(crate) target_pointer: Option<Pointer>,
}

impl Divert {
    pub fn new(
        pushes_to_stack: bool,
        stack_push_type: PushPopType,
        is_external: bool,
        external_args: usize,
        is_conditional: bool,
        variable_divert_name: Option<String>,
        target_path: Option<&str>,
    ) -> Self {
        Divert {
            external_args,
            is_conditional,
            is_external,
            pushes_to_stack,
            stack_push_type,
            variable_divert_name,
            target_path: target_path.map(Path::new_with_components_string),
            target_pointer: None,
        }
    }

    /// Target as written in the story file; may be relative to the divert.
    pub fn get_target_path(&self) -> Option<&Path> {
        self.target_path.as_ref()
    }

    pub fn has_variable_target(&self) -> bool {
        self.variable_divert_name.is_some()
    }

    /// Where execution continues, if the target could be resolved.
    pub fn get_target_pointer(&self) -> Option<Pointer> {
        self.target_pointer
    }
}

impl fmt::Display for Divert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.variable_divert_name {
            return write!(f, "Divert(variable: {name})");
        }

        match &self.target_path {
            None => write!(f, "Divert(null)"),
            Some(target) => {
                write!(f, "Divert")?;

                if self.is_conditional {
                    write!(f, "?")?;
                }

                if self.pushes_to_stack {
                    if self.stack_push_type == PushPopType::Function {
                        write!(f, " function")?;
                    } else {
                        write!(f, " tunnel")?;
                    }
                }

                write!(f, " -> {target}")
            }
        }
    }
}
