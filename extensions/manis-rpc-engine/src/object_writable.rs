use bitcode::{Decode, Encode};
use std::fmt;

/// Declared class tags for the built-in value kinds.
pub mod class_tags {
    pub const VOID: &str = "void";
    pub const BOOLEAN: &str = "boolean";
    pub const INT: &str = "int";
    pub const LONG: &str = "long";
    pub const DOUBLE: &str = "double";
    pub const STRING: &str = "string";
    pub const BYTES: &str = "bytes";
}

#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub enum ObjectValue {
    Null,
    Boolean(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
}

/// A value tagged with the class it was declared as.
///
/// The tag travels with the value so the receiving side can check it
/// against the type it expects.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct ObjectWritable {
    pub declared_class: String,
    pub instance: ObjectValue,
}

impl ObjectWritable {
    pub fn new(declared_class: impl Into<String>, instance: ObjectValue) -> Self {
        Self {
            declared_class: declared_class.into(),
            instance,
        }
    }

    pub fn void() -> Self {
        Self::new(class_tags::VOID, ObjectValue::Null)
    }

    pub fn get(&self) -> &ObjectValue {
        &self.instance
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.instance {
            ObjectValue::Boolean(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self.instance {
            ObjectValue::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self.instance {
            ObjectValue::Long(v) => Some(v),
            ObjectValue::Int(v) => Some(v.into()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.instance {
            ObjectValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ObjectWritable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OW[class={},value={:?}]", self.declared_class, self.instance)
    }
}

macro_rules! impl_from_value {
    ($ty:ty, $tag:expr, $variant:ident) => {
        impl From<$ty> for ObjectWritable {
            fn from(value: $ty) -> Self {
                ObjectWritable::new($tag, ObjectValue::$variant(value.into()))
            }
        }
    };
}

impl_from_value!(bool, class_tags::BOOLEAN, Boolean);
impl_from_value!(i32, class_tags::INT, Int);
impl_from_value!(i64, class_tags::LONG, Long);
impl_from_value!(f64, class_tags::DOUBLE, Double);
impl_from_value!(String, class_tags::STRING, Text);
impl_from_value!(&str, class_tags::STRING, Text);
impl_from_value!(Vec<u8>, class_tags::BYTES, Bytes);

/// A method call as sent by the serializable engine.
#[derive(Debug, Clone, PartialEq, Encode, Decode)]
pub struct Invocation {
    pub protocol_name: String,
    pub client_version: u64,
    pub method_name: String,
    pub parameters: Vec<ObjectWritable>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversions_tag_declared_class() {
        assert_eq!(ObjectWritable::from(7i32).declared_class, class_tags::INT);
        assert_eq!(ObjectWritable::from("db1").as_str(), Some("db1"));
        assert_eq!(ObjectWritable::from(true).as_bool(), Some(true));
        assert_eq!(ObjectWritable::void().instance, ObjectValue::Null);
    }

    #[test]
    fn int_widens_to_long() {
        assert_eq!(ObjectWritable::from(3i32).as_long(), Some(3));
        assert_eq!(ObjectWritable::from("x").as_long(), None);
    }

    #[test]
    fn invocation_survives_bitcode() {
        let invocation = Invocation {
            protocol_name: "ManagerProtocol".into(),
            client_version: 1,
            method_name: "setMaxTable".into(),
            parameters: vec![ObjectWritable::from(16i32)],
        };
        let bytes = bitcode::encode(&invocation);
        assert_eq!(bitcode::decode::<Invocation>(&bytes).unwrap(), invocation);
    }
}
