//! Output names of Java declarations

use crate::jast::declarations::{FieldId, MethodId};
use crate::jast::types::TypeId;
use crate::js::scope::NameId;
use rustc_hash::FxHashMap;

/// Where each Java declaration ended up in the output program
#[derive(Debug, Clone, Default)]
pub struct JavaToJsNames {
    /// Seed function of a class
    pub types: FxHashMap<TypeId, NameId>,
    pub clinits: FxHashMap<TypeId, NameId>,
    /// Top-level function holding a method body
    pub methods: FxHashMap<MethodId, NameId>,
    /// Prototype property of a virtual method
    pub polymorphic: FxHashMap<MethodId, NameId>,
    /// Top-level variable of a static field, property of an instance field
    pub fields: FxHashMap<FieldId, NameId>,
}

impl JavaToJsNames {
    pub fn seed(&self, ty: TypeId) -> Option<NameId> {
        self.types.get(&ty).copied()
    }

    pub fn function(&self, method: MethodId) -> Option<NameId> {
        self.methods.get(&method).copied()
    }

    pub fn field(&self, field: FieldId) -> Option<NameId> {
        self.fields.get(&field).copied()
    }
}

/// `com.example.Foo` => `com_example_Foo`
pub fn mangle(qualified: &str) -> String {
    qualified
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '$' { c } else { '_' })
        .collect()
}

/// Prototype property identifier for a method signature such as `add(II)`.
/// Overloads differ by their parameter descriptors.
pub fn poly_ident(name: &str, signature: &str) -> String {
    let params = signature
        .split_once('(')
        .map(|(_, rest)| rest.trim_end_matches(')'))
        .unwrap_or_default();
    if params.is_empty() {
        mangle(name)
    } else {
        format!("{}__{}", mangle(name), mangle(params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mangle() {
        assert_eq!(mangle("com.example.Foo"), "com_example_Foo");
        assert_eq!(mangle("$clinit"), "$clinit");
    }

    #[test]
    fn test_poly_ident_separates_overloads() {
        assert_eq!(poly_ident("run", "run()"), "run");
        assert_eq!(poly_ident("add", "add(II)"), "add__II");
        assert_eq!(
            poly_ident("put", "put(Ljava/lang/String;)"),
            "put__Ljava_lang_String_"
        );
    }
}
