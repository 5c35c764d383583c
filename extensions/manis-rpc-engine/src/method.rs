use crate::DynMessage;

/// What a method's response decodes into.
#[derive(Debug, Clone, Copy)]
pub enum ReturnType {
    /// A structured message; the factory yields an empty instance to decode
    /// into.
    Message(fn() -> Box<dyn DynMessage>),
    /// A generic object carrying this declared class tag.
    Object(&'static str),
}

/// Static description of one remote method.
#[derive(Debug, Clone, Copy)]
pub struct MethodDescriptor {
    pub name: &'static str,
    pub arity: usize,
    pub return_type: ReturnType,
}

impl MethodDescriptor {
    /// A structured-message method: a call-context placeholder plus one
    /// request message.
    pub const fn message(name: &'static str, response: fn() -> Box<dyn DynMessage>) -> Self {
        Self {
            name,
            arity: 2,
            return_type: ReturnType::Message(response),
        }
    }

    pub const fn object(name: &'static str, arity: usize, return_class: &'static str) -> Self {
        Self {
            name,
            arity,
            return_type: ReturnType::Object(return_class),
        }
    }
}
