//! # Validation Module
//!
//! The gate a bound input passes through before the handler sees it.
//!
//! Three stages run in a fixed order and the first failure stops the request:
//!
//! 1. **Structural** - the route's generated input schema, checked by the
//!    configured [`StructValidator`] against the assembled input object
//! 2. **Self-check** - the input type's [`Validate`] hook
//! 3. **Context-check** - the input type's [`ValidateWithContext`] hook, which
//!    receives the request's [`CancelContext`]
//!
//! Hook presence is decided once at registration. [`Hooks`] is a table of
//! plain function pointers filled from [`Input::hooks`](crate::Input::hooks),
//! so the request path never inspects the type.

mod cache;
mod structural;

pub use cache::ValidatorCache;
pub use structural::{standalone_schema, JsonSchemaValidator, StructValidator};

use crate::context::CancelContext;
use crate::error::{ValidationError, ValidationStage};
use serde_json::Value;
use std::sync::Arc;

/// Context-free self-validation of a bound input.
pub trait Validate {
    /// # Errors
    ///
    /// A [`ValidationError`] describing why the input is rejected.
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Self-validation that can consult the request's cancellation context.
pub trait ValidateWithContext {
    /// # Errors
    ///
    /// A [`ValidationError`] describing why the input is rejected.
    fn validate_with(&self, cancel: &CancelContext) -> Result<(), ValidationError>;
}

/// Context-free hook pointer.
pub type ValidateFn<T> = fn(&T) -> Result<(), ValidationError>;
/// Context-aware hook pointer.
pub type ValidateWithFn<T> = fn(&T, &CancelContext) -> Result<(), ValidationError>;

/// Capability table for an input type.
pub struct Hooks<T> {
    pub validate: Option<ValidateFn<T>>,
    pub validate_context: Option<ValidateWithFn<T>>,
}

impl<T> Hooks<T> {
    /// Empty table.
    #[must_use]
    pub fn none() -> Self {
        Self {
            validate: None,
            validate_context: None,
        }
    }

    /// Alias for [`Hooks::none`], for builder-style chains.
    #[must_use]
    pub fn new() -> Self {
        Self::none()
    }

    /// Register `T::validate` as the self-check.
    #[must_use]
    pub fn with_validate(mut self) -> Self
    where
        T: Validate,
    {
        self.validate = Some(<T as Validate>::validate);
        self
    }

    /// Register `T::validate_with` as the context check.
    #[must_use]
    pub fn with_validate_context(mut self) -> Self
    where
        T: ValidateWithContext,
    {
        self.validate_context = Some(<T as ValidateWithContext>::validate_with);
        self
    }

    /// Whether any hook is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.validate.is_none() && self.validate_context.is_none()
    }
}

impl<T> Default for Hooks<T> {
    fn default() -> Self {
        Self::none()
    }
}

impl<T> Clone for Hooks<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Hooks<T> {}

impl<T> std::fmt::Debug for Hooks<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("validate", &self.validate.is_some())
            .field("validate_context", &self.validate_context.is_some())
            .finish()
    }
}

/// Per-route validation gate, built at registration.
pub struct ValidationGate<T> {
    key: String,
    schema: Value,
    validator: Option<Arc<dyn StructValidator>>,
    hooks: Hooks<T>,
}

impl<T> ValidationGate<T> {
    /// # Arguments
    ///
    /// * `key` - Cache key for the structural validator, the operationId
    /// * `schema` - Standalone input schema from [`standalone_schema`]
    /// * `validator` - Structural engine; `None` skips the structural stage
    /// * `hooks` - Capability table for `T`
    pub fn new(
        key: impl Into<String>,
        schema: Value,
        validator: Option<Arc<dyn StructValidator>>,
        hooks: Hooks<T>,
    ) -> Self {
        Self {
            key: key.into(),
            schema,
            validator,
            hooks,
        }
    }

    /// The input schema the structural stage checks against.
    #[must_use]
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Run every stage in order.
    ///
    /// # Arguments
    ///
    /// * `bound` - Assembled input object, before deserialization
    /// * `instance` - Deserialized input
    /// * `cancel` - Request cancellation context for the context hook
    ///
    /// # Errors
    ///
    /// The first stage failure, tagged with its [`ValidationStage`].
    pub fn check(&self, bound: &Value, instance: &T, cancel: &CancelContext) -> Result<(), ValidationError> {
        if let Some(validator) = &self.validator {
            validator
                .validate(&self.key, &self.schema, bound)
                .map_err(|e| e.at_stage(ValidationStage::Structural))?;
        }
        if let Some(validate) = self.hooks.validate {
            validate(instance).map_err(|e| e.at_stage(ValidationStage::SelfCheck))?;
        }
        if let Some(validate_with) = self.hooks.validate_context {
            validate_with(instance, cancel).map_err(|e| e.at_stage(ValidationStage::ContextCheck))?;
        }
        Ok(())
    }
}

impl<T> std::fmt::Debug for ValidationGate<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidationGate")
            .field("key", &self.key)
            .field("structural", &self.validator.is_some())
            .field("hooks", &self.hooks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    static CALLS: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());

    struct Signup {
        age: i64,
    }

    impl Validate for Signup {
        fn validate(&self) -> Result<(), ValidationError> {
            CALLS.lock().unwrap().push("self");
            if self.age < 18 {
                return Err(ValidationError::field("age", "must be an adult"));
            }
            Ok(())
        }
    }

    impl ValidateWithContext for Signup {
        fn validate_with(&self, cancel: &CancelContext) -> Result<(), ValidationError> {
            CALLS.lock().unwrap().push("context");
            if cancel.is_cancelled() {
                return Err(ValidationError::new("request cancelled"));
            }
            Ok(())
        }
    }

    fn gate(validator: Option<Arc<dyn StructValidator>>) -> ValidationGate<Signup> {
        ValidationGate::new(
            "signup",
            json!({"type": "object", "properties": {"age": {"type": "integer", "maximum": 150}}}),
            validator,
            Hooks::new().with_validate().with_validate_context(),
        )
    }

    #[test]
    fn test_stages_in_order_and_tagged() {
        let g = gate(None);
        let cancel = CancelContext::new();

        CALLS.lock().unwrap().clear();
        g.check(&json!({"age": 30}), &Signup { age: 30 }, &cancel).unwrap();
        assert_eq!(*CALLS.lock().unwrap(), vec!["self", "context"]);

        CALLS.lock().unwrap().clear();
        let err = g.check(&json!({"age": 3}), &Signup { age: 3 }, &cancel).unwrap_err();
        assert_eq!(err.stage, ValidationStage::SelfCheck);
        assert_eq!(*CALLS.lock().unwrap(), vec!["self"]);

        cancel.cancel();
        let err = g.check(&json!({"age": 30}), &Signup { age: 30 }, &cancel).unwrap_err();
        assert_eq!(err.stage, ValidationStage::ContextCheck);
    }

    #[test]
    fn test_structural_stage_runs_first() {
        let g = gate(Some(Arc::new(JsonSchemaValidator::new())));
        let err = g
            .check(&json!({"age": 200}), &Signup { age: 200 }, &CancelContext::new())
            .unwrap_err();
        assert_eq!(err.stage, ValidationStage::Structural);
    }

    #[test]
    fn test_empty_hooks() {
        let hooks: Hooks<Signup> = Hooks::none();
        assert!(hooks.is_empty());
        assert!(!Hooks::<Signup>::new().with_validate().is_empty());
    }
}
