use std::{
    any::{Any, TypeId},
    borrow::Cow,
    fmt::{Debug, Display},
    sync::Arc,
};

/// All errors must be shareable between threads
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// We assume that we are using a multithreaded async runtime
/// So anything injectable needs to be Send + Sync + 'static
pub trait Injectable: Send + Sync + 'static {}
impl<T: Send + Sync + 'static> Injectable for T {}

/// Instance produced by a provider
///
/// Cloning an instance clones the shared pointer, never the value itself.
#[derive(Clone)]
pub struct Instance {
    pub info: TypeInfo,
    pub instance: Arc<dyn Any + Send + Sync + 'static>,
}

impl Instance {
    pub fn new<ExistingInstance: Injectable>(instance: ExistingInstance) -> Self {
        Self::from_arc(Arc::new(instance))
    }

    pub fn from_arc<ExistingInstance: Injectable>(instance: Arc<ExistingInstance>) -> Self {
        Instance {
            info: TypeInfo::of::<ExistingInstance>(),
            instance,
        }
    }

    /// Returns the shared value, or the name of the actual type on mismatch
    pub fn downcast<T: Injectable>(&self) -> Result<Arc<T>, &'static str> {
        match Arc::downcast::<T>(self.instance.clone()) {
            Ok(downcasted) => Ok(downcasted),
            Err(_) => Err(self.info.type_name),
        }
    }

    /// Reference identity - true if both point to the same value
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.instance, &other.instance)
    }
}
impl Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Instance").field(&self.info.type_name).finish()
    }
}

/// Type Name and Type Id
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct TypeInfo {
    pub type_name: &'static str,
    pub type_id: TypeId,
}
impl Display for TypeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name)
    }
}
impl TypeInfo {
    pub fn of<T: 'static + ?Sized>() -> TypeInfo {
        TypeInfo {
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }
}

/// Key under which a provider can be requested
///
/// Either the identity of a Rust type or a free-form name.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub enum Token {
    Type(TypeInfo),
    Name(Cow<'static, str>),
}
impl Token {
    pub fn of<T: 'static + ?Sized>() -> Token {
        Token::Type(TypeInfo::of::<T>())
    }

    pub fn name(name: impl Into<Cow<'static, str>>) -> Token {
        Token::Name(name.into())
    }
}
impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Type(info) => Display::fmt(info, f),
            Token::Name(name) => write!(f, "\"{name}\""),
        }
    }
}
impl From<TypeInfo> for Token {
    fn from(info: TypeInfo) -> Self {
        Token::Type(info)
    }
}
impl From<&'static str> for Token {
    fn from(name: &'static str) -> Self {
        Token::Name(Cow::Borrowed(name))
    }
}
impl From<String> for Token {
    fn from(name: String) -> Self {
        Token::Name(Cow::Owned(name))
    }
}
impl From<&Token> for Token {
    fn from(token: &Token) -> Self {
        token.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::{Instance, Token};

    #[test]
    fn it_downcasts_to_the_stored_type() {
        let instance = Instance::new(42_u32);

        assert_eq!(*instance.downcast::<u32>().unwrap(), 42);
        assert_eq!(instance.downcast::<String>().unwrap_err(), "u32");
    }

    #[test]
    fn clones_share_the_value() {
        let instance = Instance::new(String::from("shared"));
        let other = Instance::new(String::from("shared"));

        assert!(instance.ptr_eq(&instance.clone()));
        assert!(!instance.ptr_eq(&other));
    }

    #[test]
    fn tokens_render_readably() {
        assert_eq!(Token::of::<u32>().to_string(), "u32");
        assert_eq!(Token::name("db.url").to_string(), "\"db.url\"");
        assert_eq!(Token::from("a"), Token::name(String::from("a")));
    }
}
