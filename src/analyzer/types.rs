use std::collections::HashMap;
use std::fmt;

/// Base kinds of the language's type system. `Variant` is the top type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GdType {
    Void,
    Int,
    Float,
    String,
    Bool,
    Array,
    Dictionary,
    Vector2,
    Vector3,
    Node,
    Object,
    Variant,
    Custom,
    Lambda,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct TypeInfo {
    pub base: GdType,
    pub custom_name: String,
    /// For `Array[Type]` and friends. Ignored by equality.
    pub generic_params: Vec<TypeInfo>,
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.base == other.base && self.custom_name == other.custom_name
    }
}

impl TypeInfo {
    pub fn new(base: GdType) -> Self {
        Self {
            base,
            custom_name: String::new(),
            generic_params: Vec::new(),
        }
    }

    pub fn custom(name: impl Into<String>) -> Self {
        Self {
            base: GdType::Custom,
            custom_name: name.into(),
            generic_params: Vec::new(),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self.base, GdType::Int | GdType::Float)
    }

    /// Whether a value of type `source` may be assigned to a slot of this
    /// type. `Variant` accepts and converts to everything, numerics widen
    /// both ways, a string slot accepts anything (stringification), and the
    /// simplified object hierarchy treats `Node` and `Object` as one family.
    pub fn is_compatible_with(&self, source: &TypeInfo) -> bool {
        if self == source {
            return true;
        }
        if self.base == GdType::Variant || source.base == GdType::Variant {
            return true;
        }
        if self.is_numeric() && source.is_numeric() {
            return true;
        }
        if self.base == GdType::String {
            return true;
        }
        if self.base == GdType::Node && source.base == GdType::Object {
            return true;
        }
        if self.base == GdType::Object && source.base == GdType::Node {
            return true;
        }
        false
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.base {
            GdType::Void => "void",
            GdType::Int => "int",
            GdType::Float => "float",
            GdType::String => "String",
            GdType::Bool => "bool",
            GdType::Array => "Array",
            GdType::Dictionary => "Dictionary",
            GdType::Vector2 => "Vector2",
            GdType::Vector3 => "Vector3",
            GdType::Node => "Node",
            GdType::Object => "Object",
            GdType::Variant => "Variant",
            GdType::Custom => self.custom_name.as_str(),
            GdType::Lambda => "lambda",
            GdType::Unknown => "unknown",
        };
        write!(f, "{name}")?;

        if !self.generic_params.is_empty() {
            write!(f, "[")?;
            for (i, param) in self.generic_params.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{param}")?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

/// A named binding in a scope.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub name: String,
    pub ty: TypeInfo,
    pub is_constant: bool,
    pub is_static: bool,
    pub is_initialized: bool,
    pub declaration_line: u32,
}

impl Symbol {
    pub fn new(name: impl Into<String>, ty: TypeInfo) -> Self {
        Self {
            name: name.into(),
            ty,
            is_constant: false,
            is_static: false,
            is_initialized: false,
            declaration_line: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FunctionSignature {
    pub name: String,
    pub parameter_types: Vec<TypeInfo>,
    pub return_type: TypeInfo,
    pub is_static: bool,
    /// Variadic reserved functions such as `print` skip arity checking.
    pub is_variadic: bool,
    pub declaration_line: u32,
}

impl FunctionSignature {
    pub fn new(
        name: impl Into<String>,
        parameter_types: Vec<TypeInfo>,
        return_type: TypeInfo,
    ) -> Self {
        Self {
            name: name.into(),
            parameter_types,
            return_type,
            is_static: false,
            is_variadic: false,
            declaration_line: 0,
        }
    }

    pub fn variadic(name: impl Into<String>, return_type: TypeInfo) -> Self {
        let mut signature = Self::new(name, Vec::new(), return_type);
        signature.is_variadic = true;
        signature
    }
}

/// Everything the analyzer learns about one class declaration.
#[derive(Debug, Clone, Default)]
pub struct ClassInfo {
    pub name: String,
    pub base_class: String,
    pub members: HashMap<String, Symbol>,
    pub methods: HashMap<String, FunctionSignature>,
    pub signals: Vec<String>,
    pub declaration_line: u32,
}

impl ClassInfo {
    pub fn new(name: impl Into<String>, base_class: impl Into<String>, line: u32) -> Self {
        Self {
            name: name.into(),
            base_class: base_class.into(),
            declaration_line: line,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_generic_params() {
        let mut typed_array = TypeInfo::new(GdType::Array);
        typed_array.generic_params.push(TypeInfo::new(GdType::String));
        assert_eq!(typed_array, TypeInfo::new(GdType::Array));
    }

    #[test]
    fn variant_is_compatible_both_ways() {
        let variant = TypeInfo::new(GdType::Variant);
        let int = TypeInfo::new(GdType::Int);
        assert!(variant.is_compatible_with(&int));
        assert!(int.is_compatible_with(&variant));
    }

    #[test]
    fn numeric_types_widen_both_ways() {
        let int = TypeInfo::new(GdType::Int);
        let float = TypeInfo::new(GdType::Float);
        assert!(int.is_compatible_with(&float));
        assert!(float.is_compatible_with(&int));
        assert!(!int.is_compatible_with(&TypeInfo::new(GdType::Bool)));
    }

    #[test]
    fn string_slot_accepts_any_source() {
        let string = TypeInfo::new(GdType::String);
        assert!(string.is_compatible_with(&TypeInfo::new(GdType::Vector2)));
        assert!(!TypeInfo::new(GdType::Vector2).is_compatible_with(&string));
    }

    #[test]
    fn node_and_object_are_interchangeable() {
        let node = TypeInfo::new(GdType::Node);
        let object = TypeInfo::new(GdType::Object);
        assert!(node.is_compatible_with(&object));
        assert!(object.is_compatible_with(&node));
    }

    #[test]
    fn display_includes_generic_params() {
        let mut ty = TypeInfo::new(GdType::Array);
        ty.generic_params.push(TypeInfo::new(GdType::String));
        assert_eq!(ty.to_string(), "Array[String]");
        assert_eq!(TypeInfo::custom("Player").to_string(), "Player");
    }
}
