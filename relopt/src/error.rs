use thiserror::Error;

pub type OptResult<T> = anyhow::Result<T>;

/// Failures raised by the optimizer engine itself.
///
/// Rule callbacks and operators report their own problems through [`OptResult`]; these variants
/// are reserved for engine level invariants, so callers can tell them apart with
/// `err.downcast_ref::<OptimizerError>()`.
#[derive(Error, Debug)]
pub enum OptimizerError {
    /// The graph or a rule broke an engine invariant, e.g. a cycle after contraction.
    #[error("structural violation{}: {message}\n{graph}", rule_suffix(.rule))]
    StructuralViolation {
        rule: Option<String>,
        message: String,
        graph: String,
    },
    /// A rule operand can never match anything sensible.
    #[error("invalid operand in rule {rule}: {message}")]
    InvalidOperand { rule: String, message: String },
    #[error("invalid program: {0}")]
    InvalidProgram(String),
    /// The final plan still contains a node that has no implementation.
    #[error("no implementation found for {digest}")]
    UnimplementedNode { digest: String },
}

fn rule_suffix(rule: &Option<String>) -> String {
    match rule {
        Some(rule) => format!(" while firing {}", rule),
        None => String::new(),
    }
}

impl OptimizerError {
    pub fn structural<S: Into<String>>(
        rule: Option<&str>,
        message: S,
        graph: String,
    ) -> Self {
        OptimizerError::StructuralViolation {
            rule: rule.map(str::to_string),
            message: message.into(),
            graph,
        }
    }
}
