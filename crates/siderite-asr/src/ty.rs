//! The type variants of the ASR.

use bitflags::bitflags;

use crate::arena::SymbolId;
use crate::expr::Expr;

/// A siderite type. Structural equality is meaningful: two instantiations
/// of the same template produce equal types with distinct declaration ids
/// only where a `StructType` is involved.
#[derive(Debug, Clone, PartialEq)]
pub enum Ty {
    Integer { kind: u8 },
    Real { kind: u8 },
    Complex { kind: u8 },
    Logical { kind: u8 },
    Character {
        len: StringLength,
        kind: u8,
        physical: StringPhysical,
    },
    Array {
        elem: Box<Ty>,
        dims: Vec<Dimension>,
        physical: ArrayPhysical,
    },
    Pointer { elem: Box<Ty> },
    Allocatable { elem: Box<Ty> },
    StructType { decl: SymbolId, is_c_struct: bool },
    EnumType { decl: SymbolId },
    UnionType { decl: SymbolId },
    FunctionType(Box<FunctionType>),
    /// A template type parameter, substituted away at instantiation.
    TypeParameter { name: String },
}

/// Classification of a character type's length.
#[derive(Debug, Clone, PartialEq)]
pub enum StringLength {
    /// Length given by an expression (`character(len=n)`).
    Expression(Box<Expr>),
    /// `len=*`: taken from the actual argument.
    Assumed,
    /// `len=:`: established by allocation or pointer assignment.
    Deferred,
    /// Carried only by the result of a string-physical cast; illegal
    /// anywhere else.
    Implicit,
}

/// Storage layout of a character value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringPhysical {
    Descriptor,
    CChar,
}

/// Storage layout of an array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayPhysical {
    Descriptor,
    Fixed,
    Simd,
}

/// One array dimension. A deferred dimension has neither field.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dimension {
    pub lower: Option<Expr>,
    pub length: Option<Expr>,
}

impl Dimension {
    pub fn deferred() -> Self {
        Self::default()
    }

    pub fn is_deferred(&self) -> bool {
        self.lower.is_none() && self.length.is_none()
    }
}

bitflags! {
    /// Procedure property flags carried on the signature.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FunctionFlags: u8 {
        const PURE = 1 << 0;
        const ELEMENTAL = 1 << 1;
        /// A `module procedure`: forward-declared in a module, implemented
        /// in a submodule.
        const MODULE_PROC = 1 << 2;
    }
}

/// Which side of a forward declaration a function is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DefKind {
    #[default]
    Implementation,
    Interface,
}

/// Calling convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Abi {
    #[default]
    Native,
    BindC,
}

/// A procedure signature.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FunctionType {
    pub arg_types: Vec<Ty>,
    pub return_type: Option<Ty>,
    pub abi: Abi,
    pub deftype: DefKind,
    /// Explicit link name from `bind(c, name="..")`.
    pub bind_name: Option<String>,
    pub flags: FunctionFlags,
}

impl Ty {
    pub fn int(kind: u8) -> Self {
        Ty::Integer { kind }
    }

    /// The default integer type.
    pub fn default_int() -> Self {
        Ty::Integer { kind: 4 }
    }

    pub fn default_real() -> Self {
        Ty::Real { kind: 4 }
    }

    pub fn default_logical() -> Self {
        Ty::Logical { kind: 4 }
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Ty::Pointer { .. })
    }

    pub fn is_allocatable(&self) -> bool {
        matches!(self, Ty::Allocatable { .. })
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Ty::Array { .. })
    }

    pub fn is_character(&self) -> bool {
        matches!(self, Ty::Character { .. })
    }

    /// The type with any pointer/allocatable wrapper removed.
    pub fn peeled(&self) -> &Ty {
        match self {
            Ty::Pointer { elem } | Ty::Allocatable { elem } => elem.peeled(),
            other => other,
        }
    }

    /// Array rank; zero for scalars.
    pub fn rank(&self) -> usize {
        match self.peeled() {
            Ty::Array { dims, .. } => dims.len(),
            _ => 0,
        }
    }

    /// Whether a character type carries the cast-only implicit length.
    pub fn has_implicit_length(&self) -> bool {
        match self {
            Ty::Character { len, .. } => matches!(len, StringLength::Implicit),
            Ty::Array { elem, .. } | Ty::Pointer { elem } | Ty::Allocatable { elem } => {
                elem.has_implicit_length()
            }
            _ => false,
        }
    }

    /// Whether two types are compatible as a type-bound pass object: the
    /// same struct declaration, or `other` is an ancestor of `self`.
    pub fn struct_decl(&self) -> Option<SymbolId> {
        match self.peeled() {
            Ty::StructType { decl, .. } => Some(*decl),
            _ => None,
        }
    }
}
