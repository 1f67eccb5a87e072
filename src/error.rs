use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error(
        "Method {method} called on null object in {}, at line {line}",
        .layer.as_deref().unwrap_or("null")
    )]
    NullReceiver {
        method: String,
        layer: Option<String>,
        line: u32,
    },
    #[error("Function {0} does not exist in context")]
    UnknownFunction(String),
    #[error("Method {method} is not defined for class {class}")]
    UnknownMethod { class: String, method: String },
    #[error("{name}: {message}")]
    Builtin { name: &'static str, message: String },
    #[error("{0}")]
    Message(String),
}

impl RuntimeError {
    pub fn new<S: Into<String>>(msg: S) -> Self {
        RuntimeError::Message(msg.into())
    }

    pub(crate) fn null_receiver(method: &str, layer: Option<&str>, line: u32) -> Self {
        RuntimeError::NullReceiver {
            method: method.to_string(),
            layer: layer.map(str::to_string),
            line,
        }
    }

    pub(crate) fn builtin(name: &'static str, message: impl Into<String>) -> Self {
        RuntimeError::Builtin {
            name,
            message: message.into(),
        }
    }

    /// True for the one failure the runtime raises on its own: dispatching on
    /// a missing or null-tagged receiver.
    pub fn is_null_receiver(&self) -> bool {
        matches!(self, RuntimeError::NullReceiver { .. })
    }
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
