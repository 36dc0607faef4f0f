use crate::arena::Id;
use crate::jast::declarations::JDeclaredType;
use serde::{Deserialize, Serialize};

pub type TypeId = Id<JDeclaredType>;

/// Java primitive types, `void` included
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Void,
}

impl PrimitiveType {
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Byte => "byte",
            PrimitiveType::Char => "char",
            PrimitiveType::Short => "short",
            PrimitiveType::Int => "int",
            PrimitiveType::Long => "long",
            PrimitiveType::Float => "float",
            PrimitiveType::Double => "double",
            PrimitiveType::Void => "void",
        }
    }

    /// JVM descriptor character, used in method signatures
    pub fn descriptor(self) -> char {
        match self {
            PrimitiveType::Boolean => 'Z',
            PrimitiveType::Byte => 'B',
            PrimitiveType::Char => 'C',
            PrimitiveType::Short => 'S',
            PrimitiveType::Int => 'I',
            PrimitiveType::Long => 'J',
            PrimitiveType::Float => 'F',
            PrimitiveType::Double => 'D',
            PrimitiveType::Void => 'V',
        }
    }

    /// byte, short, char, int and long
    pub fn is_integral(self) -> bool {
        matches!(
            self,
            PrimitiveType::Byte
                | PrimitiveType::Char
                | PrimitiveType::Short
                | PrimitiveType::Int
                | PrimitiveType::Long
        )
    }

    /// Integral types narrower than int
    pub fn is_narrow_integral(self) -> bool {
        matches!(
            self,
            PrimitiveType::Byte | PrimitiveType::Char | PrimitiveType::Short
        )
    }

    pub fn is_floating(self) -> bool {
        matches!(self, PrimitiveType::Float | PrimitiveType::Double)
    }

    pub fn is_numeric(self) -> bool {
        self.is_integral() || self.is_floating()
    }
}

/// The static type of a value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JType {
    Primitive(PrimitiveType),
    /// Type of the `null` literal; a subtype of every reference type
    Null,
    /// A class or interface
    Declared(TypeId),
    /// An array with the given element type
    Array(Box<JType>),
}

impl JType {
    pub const BOOLEAN: JType = JType::Primitive(PrimitiveType::Boolean);
    pub const BYTE: JType = JType::Primitive(PrimitiveType::Byte);
    pub const CHAR: JType = JType::Primitive(PrimitiveType::Char);
    pub const SHORT: JType = JType::Primitive(PrimitiveType::Short);
    pub const INT: JType = JType::Primitive(PrimitiveType::Int);
    pub const LONG: JType = JType::Primitive(PrimitiveType::Long);
    pub const FLOAT: JType = JType::Primitive(PrimitiveType::Float);
    pub const DOUBLE: JType = JType::Primitive(PrimitiveType::Double);
    pub const VOID: JType = JType::Primitive(PrimitiveType::Void);

    pub fn array_of(element: JType) -> JType {
        JType::Array(Box::new(element))
    }

    pub fn primitive(&self) -> Option<PrimitiveType> {
        match self {
            JType::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    pub fn is_reference(&self) -> bool {
        !matches!(self, JType::Primitive(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, JType::Null)
    }

    pub fn is_void(&self) -> bool {
        matches!(self, JType::Primitive(PrimitiveType::Void))
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, JType::Primitive(PrimitiveType::Boolean))
    }

    pub fn is_long(&self) -> bool {
        matches!(self, JType::Primitive(PrimitiveType::Long))
    }

    pub fn is_integral(&self) -> bool {
        self.primitive().is_some_and(PrimitiveType::is_integral)
    }

    /// Integral and no wider than int
    pub fn is_int_like(&self) -> bool {
        self.is_integral() && !self.is_long()
    }

    pub fn is_floating(&self) -> bool {
        self.primitive().is_some_and(PrimitiveType::is_floating)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, JType::Array(_))
    }

    pub fn declared(&self) -> Option<TypeId> {
        match self {
            JType::Declared(id) => Some(*id),
            _ => None,
        }
    }

    pub fn element_type(&self) -> Option<&JType> {
        match self {
            JType::Array(element) => Some(element),
            _ => None,
        }
    }

    /// Unary numeric promotion: byte, short and char widen to int
    pub fn unary_promotion(&self) -> JType {
        match self.primitive() {
            Some(p) if p.is_narrow_integral() => JType::INT,
            _ => self.clone(),
        }
    }

    /// Binary numeric promotion of two operand types
    pub fn binary_promotion(lhs: &JType, rhs: &JType) -> JType {
        let widest = [PrimitiveType::Double, PrimitiveType::Float, PrimitiveType::Long];
        for p in widest {
            if lhs.primitive() == Some(p) || rhs.primitive() == Some(p) {
                return JType::Primitive(p);
            }
        }
        JType::INT
    }

    /// Innermost non-array type and the number of dimensions around it
    pub fn leaf_and_dims(&self) -> (&JType, usize) {
        let mut current = self;
        let mut dims = 0;
        while let JType::Array(element) = current {
            current = element;
            dims += 1;
        }
        (current, dims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_classification() {
        assert!(PrimitiveType::Char.is_integral());
        assert!(PrimitiveType::Char.is_narrow_integral());
        assert!(!PrimitiveType::Int.is_narrow_integral());
        assert!(PrimitiveType::Float.is_floating());
        assert!(!PrimitiveType::Boolean.is_numeric());
    }

    #[test]
    fn test_int_like_excludes_long() {
        assert!(JType::INT.is_int_like());
        assert!(JType::SHORT.is_int_like());
        assert!(!JType::LONG.is_int_like());
        assert!(!JType::DOUBLE.is_int_like());
    }

    #[test]
    fn test_leaf_and_dims() {
        let ty = JType::array_of(JType::array_of(JType::INT));
        let (leaf, dims) = ty.leaf_and_dims();
        assert_eq!(leaf, &JType::INT);
        assert_eq!(dims, 2);
        assert_eq!(ty.element_type(), Some(&JType::array_of(JType::INT)));
    }

    #[test]
    fn test_numeric_promotion() {
        assert_eq!(JType::CHAR.unary_promotion(), JType::INT);
        assert_eq!(JType::LONG.unary_promotion(), JType::LONG);
        assert_eq!(JType::binary_promotion(&JType::BYTE, &JType::SHORT), JType::INT);
        assert_eq!(JType::binary_promotion(&JType::INT, &JType::LONG), JType::LONG);
        assert_eq!(JType::binary_promotion(&JType::LONG, &JType::FLOAT), JType::FLOAT);
        assert_eq!(JType::binary_promotion(&JType::DOUBLE, &JType::CHAR), JType::DOUBLE);
    }

    #[test]
    fn test_reference_types() {
        assert!(JType::Null.is_reference());
        assert!(JType::array_of(JType::INT).is_reference());
        assert!(!JType::BOOLEAN.is_reference());
    }
}
