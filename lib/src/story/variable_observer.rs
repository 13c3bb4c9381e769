//! For setting the variable observer function callbacks that will be called
//! while the [`Story`] is processing.
use std::{cell::RefCell, rc::Rc};

use crate::{story::Story, story_error::StoryError, value_type::ValueType};

/// Defines the method that will be called when an observed global variable
/// changes.
pub trait VariableObserver {
    fn changed(&mut self, variable_name: &str, value: &ValueType);
}

/// # Callbacks
/// Methods dealing with callback handlers.
impl Story {
    /// When the specified global variable changes its value, the observer will
    /// be called to notify it of the change. Note that if the value changes
    /// multiple times within one [`cont`](Story::cont), the observer will
    /// only be called once, with the final value. If, during the evaluation,
    /// it changes and then changes back again to its original value, it
    /// will still be called. The observer is also fired when the value is
    /// changed by the host with [`set_variable`](Story::set_variable).
    pub fn observe_variable(
        &mut self,
        variable_name: &str,
        observer: Rc<RefCell<dyn VariableObserver>>,
    ) -> Result<(), StoryError> {
        self.if_async_we_cant("observe a new variable")?;

        if !self
            .state
            .variables_state
            .global_variable_exists_with_name(variable_name)
        {
            return Err(StoryError::BadArgument(format!(
                "Cannot observe variable '{variable_name}' because it wasn't declared in the story."
            )));
        }

        self.variable_observers
            .entry(variable_name.to_string())
            .or_default()
            .push(observer);

        Ok(())
    }

    /// Removes a variable observer, to stop getting variable change
    /// notifications. If you pass a specific variable name, it will stop
    /// observing that particular one. If you pass None, then the observer
    /// will be removed from all variables that it's subscribed to.
    pub fn remove_variable_observer(
        &mut self,
        observer: &Rc<RefCell<dyn VariableObserver>>,
        specific_variable_name: Option<&str>,
    ) -> Result<(), StoryError> {
        self.if_async_we_cant("remove a variable observer")?;

        match specific_variable_name {
            // Remove observer for this specific variable
            Some(specific_variable_name) => {
                if let Some(v) = self.variable_observers.get_mut(specific_variable_name) {
                    v.retain(|x| !Rc::ptr_eq(x, observer));

                    if v.is_empty() {
                        self.variable_observers.remove(specific_variable_name);
                    }
                }
            }
            // Remove observer for all variables
            None => {
                for v in self.variable_observers.values_mut() {
                    v.retain(|x| !Rc::ptr_eq(x, observer));
                }

                self.variable_observers.retain(|_, v| !v.is_empty());
            }
        }

        Ok(())
    }

    pub(crate) fn notify_variable_changed(&self, variable_name: &str, value: &ValueType) {
        if let Some(observers) = self.variable_observers.get(variable_name) {
            for o in observers.iter() {
                o.borrow_mut().changed(variable_name, value);
            }
        }
    }
}
