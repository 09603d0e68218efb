//! Identity of instrumented methods and record fields.
//!
//! Descriptors are the keys of every policy lookup. They are cheap to clone
//! when built from `'static` strings and hash by value.

use std::{borrow::Cow, fmt};

/// One declared parameter of a method.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ParamDescriptor {
    pub name: Cow<'static, str>,
    pub type_name: Cow<'static, str>,
}

/// A method: declaring type, name and ordered parameter list.
///
/// ```rust
/// use masklog::MethodDescriptor;
///
/// let login = MethodDescriptor::new("app::auth::AuthService", "login")
///     .param("email", "String")
///     .param("password", "String");
///
/// assert_eq!(login.simple_type_name(), "AuthService");
/// assert_eq!(login.frame_key(), "AuthService.login");
/// assert_eq!(login.arity(), 2);
/// ```
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MethodDescriptor {
    declaring_type: Cow<'static, str>,
    name: Cow<'static, str>,
    params: Vec<ParamDescriptor>,
}

impl MethodDescriptor {
    #[must_use]
    pub fn new(
        declaring_type: impl Into<Cow<'static, str>>,
        name: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            name: name.into(),
            params: Vec::new(),
        }
    }

    /// Describes a method declared on `T`, using `std::any::type_name`.
    #[must_use]
    pub fn of<T: ?Sized>(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(std::any::type_name::<T>(), name)
    }

    /// Appends a parameter.
    #[must_use]
    pub fn param(
        mut self,
        name: impl Into<Cow<'static, str>>,
        type_name: impl Into<Cow<'static, str>>,
    ) -> Self {
        self.params.push(ParamDescriptor {
            name: name.into(),
            type_name: type_name.into(),
        });
        self
    }

    pub fn declaring_type(&self) -> &str {
        &self.declaring_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[ParamDescriptor] {
        &self.params
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Last path segment of the declaring type, without generic arguments.
    pub fn simple_type_name(&self) -> &str {
        simple_name(&self.declaring_type)
    }

    /// `Type.method`, the key used to match stack frames.
    #[must_use]
    pub fn frame_key(&self) -> String {
        format!("{}.{}", self.simple_type_name(), self.name)
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}(", self.simple_type_name(), self.name)?;
        for (index, param) in self.params.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", param.name, param.type_name)?;
        }
        f.write_str(")")
    }
}

/// A field of a record type.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FieldDescriptor {
    declaring_type: Cow<'static, str>,
    name: Cow<'static, str>,
}

impl FieldDescriptor {
    #[must_use]
    pub fn new(
        declaring_type: impl Into<Cow<'static, str>>,
        name: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            name: name.into(),
        }
    }

    #[must_use]
    pub fn of<T: ?Sized>(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(std::any::type_name::<T>(), name)
    }

    pub fn declaring_type(&self) -> &str {
        &self.declaring_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", simple_name(&self.declaring_type), self.name)
    }
}

/// Strips generic arguments and module path: `a::b::Foo<T>` becomes `Foo`.
pub(crate) fn simple_name(path: &str) -> &str {
    let base = path.split_once('<').map_or(path, |(base, _)| base);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::{simple_name, FieldDescriptor, MethodDescriptor};

    #[test]
    fn simple_name_drops_path_and_generics() {
        assert_eq!(simple_name("a::b::Foo"), "Foo");
        assert_eq!(simple_name("Foo"), "Foo");
        assert_eq!(simple_name("a::Repo<a::User>"), "Repo");
    }

    #[test]
    fn descriptor_of_uses_type_name() {
        struct Billing;
        let method = MethodDescriptor::of::<Billing>("charge").param("amount", "u64");
        assert_eq!(method.simple_type_name(), "Billing");
        assert_eq!(method.to_string(), "Billing::charge(amount: u64)");
    }

    #[test]
    fn descriptors_compare_by_value() {
        let a = MethodDescriptor::new("svc::Users", "find").param("id", "u64");
        let b = MethodDescriptor::new(String::from("svc::Users"), "find").param("id", "u64");
        assert_eq!(a, b);
        assert_ne!(a, MethodDescriptor::new("svc::Users", "find"));
    }

    #[test]
    fn field_descriptor_display() {
        let field = FieldDescriptor::new("app::User", "email");
        assert_eq!(field.to_string(), "User.email");
        assert_eq!(field.declaring_type(), "app::User");
    }
}
