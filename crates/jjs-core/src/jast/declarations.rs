use crate::arena::Id;
use crate::jast::expression::JLiteral;
use crate::jast::statement::JStatement;
use crate::jast::types::{JType, TypeId};
use crate::source_info::SourceInfo;
use serde::{Deserialize, Serialize};

pub type FieldId = Id<JField>;
pub type MethodId = Id<JMethod>;
pub type VarId = Id<JVariable>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Class,
    Interface,
    /// A final class extending `java.lang.Enum` whose constants are static fields
    Enum,
}

/// A class, interface or enum
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JDeclaredType {
    pub info: SourceInfo,
    /// Fully qualified, dot separated
    pub name: String,
    pub kind: TypeKind,
    pub super_class: Option<TypeId>,
    pub interfaces: Vec<TypeId>,
    pub fields: Vec<FieldId>,
    /// Every method, the class initialiser included
    pub methods: Vec<MethodId>,
    pub clinit: Option<MethodId>,
    pub is_abstract: bool,
    pub is_final: bool,
    /// Values of this enum are represented by their ordinals
    pub is_ordinalized: bool,
}

impl JDeclaredType {
    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    /// Enums are classes too
    pub fn is_class(&self) -> bool {
        matches!(self.kind, TypeKind::Class | TypeKind::Enum)
    }

    pub fn is_enum(&self) -> bool {
        self.kind == TypeKind::Enum
    }

    /// Name without its package
    pub fn short_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JField {
    pub info: SourceInfo,
    pub name: String,
    pub enclosing_type: TypeId,
    pub ty: JType,
    pub is_static: bool,
    pub is_final: bool,
    /// Compile-time constant initializer
    pub constant: Option<JLiteral>,
    /// Position of an enum constant in its enum's declaration
    pub ordinal: Option<i32>,
}

/// Verbatim JavaScript function body, emitted as-is
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeBody {
    pub code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MethodBody {
    Java(Vec<JStatement>),
    Native(NativeBody),
    Abstract,
}

impl MethodBody {
    pub fn is_native(&self) -> bool {
        matches!(self, MethodBody::Native(_))
    }

    pub fn statements(&self) -> Option<&[JStatement]> {
        match self {
            MethodBody::Java(stmts) => Some(stmts),
            _ => None,
        }
    }
}

/// Modifier set used when creating methods
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MethodFlags {
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_final: bool,
    pub is_private: bool,
    pub is_constructor: bool,
}

impl MethodFlags {
    pub fn instance() -> Self {
        Self::default()
    }

    pub fn static_method() -> Self {
        Self {
            is_static: true,
            ..Self::default()
        }
    }

    pub fn constructor() -> Self {
        Self {
            is_constructor: true,
            ..Self::default()
        }
    }

    pub fn abstract_method() -> Self {
        Self {
            is_abstract: true,
            ..Self::default()
        }
    }

    pub fn private(mut self) -> Self {
        self.is_private = true;
        self
    }

    pub fn final_(mut self) -> Self {
        self.is_final = true;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JMethod {
    pub info: SourceInfo,
    pub name: String,
    pub enclosing_type: TypeId,
    pub params: Vec<VarId>,
    pub locals: Vec<VarId>,
    pub return_type: JType,
    /// Parameter types before any tightening; part of the signature
    pub original_param_types: Vec<JType>,
    pub body: MethodBody,
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_final: bool,
    pub is_private: bool,
    pub is_constructor: bool,
    pub is_clinit: bool,
}

impl JMethod {
    /// Dispatched through the prototype chain
    pub fn is_virtual(&self) -> bool {
        !self.is_static && !self.is_private && !self.is_constructor
    }

    pub fn is_native(&self) -> bool {
        self.body.is_native()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableKind {
    Local,
    Parameter,
}

/// A local variable or a parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JVariable {
    pub info: SourceInfo,
    pub name: String,
    pub ty: JType,
    pub kind: VariableKind,
    pub enclosing_method: MethodId,
    pub is_final: bool,
}

impl JVariable {
    pub fn is_param(&self) -> bool {
        self.kind == VariableKind::Parameter
    }
}
