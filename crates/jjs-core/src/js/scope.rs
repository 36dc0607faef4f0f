//! Lexical scopes and names of the output program
//!
//! Names are arena entries addressed by [`NameId`]; the identity is stable for
//! the whole permutation while the printed `text` is chosen by a namer.

use crate::arena::Id;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub type NameId = Id<JsName>;
pub type ScopeId = Id<JsScope>;

/// JavaScript reserved words, never usable as identifiers
pub const RESERVED_WORDS: &[&str] = &[
    "abstract", "arguments", "await", "boolean", "break", "byte", "case", "catch", "char", "class",
    "const", "continue", "debugger", "default", "delete", "do", "double", "else", "enum", "eval",
    "export", "extends", "false", "final", "finally", "float", "for", "function", "goto", "if",
    "implements", "import", "in", "instanceof", "int", "interface", "let", "long", "native", "new",
    "null", "package", "private", "protected", "public", "return", "short", "static", "super",
    "switch", "synchronized", "this", "throw", "throws", "transient", "true", "try", "typeof",
    "var", "void", "volatile", "while", "with", "yield",
];

/// Host globals the generated code must not shadow
pub const JS_GLOBALS: &[&str] = &[
    "Array", "BigInt", "Boolean", "Date", "Error", "Function", "Infinity", "JSON", "Math", "NaN",
    "Number", "Object", "RegExp", "String", "Symbol", "TypeError", "console", "document",
    "globalThis", "isFinite", "isNaN", "parseFloat", "parseInt", "undefined", "window",
];

/// Properties with fixed names on runtime objects
pub const FIXED_PROPERTIES: &[&str] = &[
    "prototype",
    "length",
    "call",
    "toString",
    "castableTypeMap$",
    "typeId$",
    "queryId$",
    "equals$",
    "hashCode$",
    "nullMethod",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScopeKind {
    /// Reserved words and host globals
    Root,
    /// Property names
    Object,
    /// Top-level declarations of the program
    Top,
    Function,
    Catch,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsScope {
    pub parent: Option<ScopeId>,
    pub kind: ScopeKind,
    pub description: String,
    /// Declared names by identifier, in declaration order
    pub names: IndexMap<String, NameId>,
    pub children: Vec<ScopeId>,
}

/// What a top-level name is bound to, when that is known statically
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StaticRef {
    /// A function declaration that is never reassigned
    Function,
    /// A class initializer, which reassigns itself on first call
    Clinit,
    /// A variable
    Var,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsName {
    /// Identifier as declared; unique within its scope
    pub ident: String,
    /// Preferred short form used by readable namers
    pub short_ident: String,
    pub scope: ScopeId,
    /// Namers may choose a different text
    pub obfuscatable: bool,
    /// Printed form, assigned exactly once by a namer
    pub text: Option<String>,
    pub static_ref: Option<StaticRef>,
}

impl JsName {
    /// The printed form, falling back to the identifier before naming
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or(&self.ident)
    }
}

/// Whether `ident` can never be produced by a namer
pub fn is_reserved(ident: &str) -> bool {
    RESERVED_WORDS.contains(&ident) || JS_GLOBALS.contains(&ident)
}

/// Whether `ident` is a valid JavaScript identifier made of ASCII characters
pub fn is_valid_ident(ident: &str) -> bool {
    let mut chars = ident.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_' || first == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_words_and_globals() {
        assert!(is_reserved("function"));
        assert!(is_reserved("Math"));
        assert!(!is_reserved("foo"));
    }

    #[test]
    fn test_valid_identifiers() {
        assert!(is_valid_ident("$clinit_Foo"));
        assert!(is_valid_ident("_a1"));
        assert!(!is_valid_ident("1a"));
        assert!(!is_valid_ident("a.b"));
        assert!(!is_valid_ident(""));
    }
}
