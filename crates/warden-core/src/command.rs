//! Command model and dispatch interface.
//!
//! Warden never parses or registers commands itself; it only needs enough of
//! the host framework's command shape to re-invoke one: parameter descriptors
//! with binding kinds, a name registry, and a dispatcher that runs the full
//! check pipeline.

use crate::context::InvocationContext;
use crate::convert::{ArgValue, ConverterKind};
use crate::failure::CommandFailure;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a parameter binds when reconstructing an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParameterKind {
    /// Bound by position only
    PositionalOnly,
    /// Bound by position or name
    PositionalOrKeyword,
    /// Bound by name only
    KeywordOnly,
}

/// Static descriptor of a single command parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Binding name
    pub name: String,
    /// Optional human-friendly name shown instead of `name`
    pub displayed_name: Option<String>,
    /// Human description shown in argument lists
    pub description: String,
    /// Whether the command cannot run without this parameter
    pub required: bool,
    /// Declared default for optional parameters
    pub default: Option<ArgValue>,
    /// Binding kind for re-invocation
    pub kind: ParameterKind,
    /// Converter applied to supplied text
    pub converter: ConverterKind,
}

impl ParameterSpec {
    /// A required positional-or-keyword text parameter.
    #[must_use]
    pub fn required(name: &str, description: &str, converter: ConverterKind) -> Self {
        Self {
            name: name.to_string(),
            displayed_name: None,
            description: description.to_string(),
            required: true,
            default: None,
            kind: ParameterKind::PositionalOrKeyword,
            converter,
        }
    }

    /// An optional positional-or-keyword parameter with a default.
    #[must_use]
    pub fn optional(
        name: &str,
        description: &str,
        converter: ConverterKind,
        default: Option<ArgValue>,
    ) -> Self {
        Self {
            name: name.to_string(),
            displayed_name: None,
            description: description.to_string(),
            required: false,
            default,
            kind: ParameterKind::PositionalOrKeyword,
            converter,
        }
    }

    /// With a display name
    #[must_use]
    pub fn with_displayed_name(mut self, displayed: &str) -> Self {
        self.displayed_name = Some(displayed.to_string());
        self
    }

    /// With a binding kind
    #[must_use]
    pub fn with_kind(mut self, kind: ParameterKind) -> Self {
        self.kind = kind;
        self
    }

    /// Display name when set, binding name otherwise.
    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        self.displayed_name.as_deref().unwrap_or(&self.name)
    }
}

/// Static descriptor of a registered command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Qualified command name (group commands flattened to `group child`)
    pub name: String,
    /// Human description
    pub description: String,
    /// Declared parameters in binding order
    pub parameters: Vec<ParameterSpec>,
    /// Whether the command or its owning group declares a dedicated error
    /// handler; the router skips such commands entirely
    pub has_error_handler: bool,
}

impl CommandSpec {
    /// Create a parameterless command.
    #[must_use]
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters: Vec::new(),
            has_error_handler: false,
        }
    }

    /// With a parameter appended
    #[must_use]
    pub fn with_parameter(mut self, parameter: ParameterSpec) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Mark the command as carrying its own error handler
    #[must_use]
    pub fn with_error_handler(mut self) -> Self {
        self.has_error_handler = true;
        self
    }

    /// Find a parameter by binding name.
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Usage line: required parameters in angle brackets, optional in square.
    #[must_use]
    pub fn signature(&self) -> String {
        let mut rendered = self.name.clone();
        for param in &self.parameters {
            if param.required {
                rendered.push_str(&format!(" <{}>", param.label()));
            } else {
                rendered.push_str(&format!(" [{}]", param.label()));
            }
        }
        rendered
    }
}

/// Name-keyed registry of every command the bot exposes.
///
/// The host framework owns registration; Warden reads it for suggestion
/// matching and for skipping commands with dedicated handlers.
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, CommandSpec>,
}

impl CommandRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command, replacing any previous spec under the same name.
    pub fn insert(&mut self, spec: CommandSpec) {
        self.commands.insert(spec.name.clone(), spec);
    }

    /// Look up a command by qualified name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CommandSpec> {
        self.commands.get(name)
    }

    /// Whether a command is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// All registered command names.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.commands.keys().map(String::as_str)
    }

    /// Number of registered commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Positional and keyword arguments for a (re-)invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundArgs {
    /// Positionally bound values, in order
    pub positional: Vec<ArgValue>,
    /// Name-bound values
    pub keyword: BTreeMap<String, ArgValue>,
}

impl BoundArgs {
    /// No arguments.
    #[inline]
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether any argument was supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.keyword.is_empty()
    }
}

/// Host-side command dispatch, consumed as a collaborator.
///
/// Both operations run the command's full check pipeline, so permissions are
/// enforced at execution time even for forced re-invocations.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Run checks and the command body with the given arguments.
    async fn invoke(
        &self,
        ctx: &InvocationContext,
        command: &str,
        args: &BoundArgs,
    ) -> Result<(), CommandFailure>;

    /// Run only the command's checks, without executing the body.
    async fn can_run(&self, ctx: &InvocationContext, command: &str) -> Result<(), CommandFailure>;
}
