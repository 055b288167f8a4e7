use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub const BUILTIN_PACKAGE: &str = "std";

pub const ANY: &str = "Any";
pub const NOTHING: &str = "Nothing";
pub const UNIT: &str = "Unit";
pub const BOOLEAN: &str = "Boolean";
pub const CHAR: &str = "Char";
pub const BYTE: &str = "Byte";
pub const SHORT: &str = "Short";
pub const INT: &str = "Int";
pub const LONG: &str = "Long";
pub const FLOAT: &str = "Float";
pub const DOUBLE: &str = "Double";
pub const STRING: &str = "String";

pub const BUILTIN_CLASSES: &[&str] = &[
    ANY, NOTHING, UNIT, BOOLEAN, CHAR, BYTE, SHORT, INT, LONG, FLOAT, DOUBLE, STRING,
];

/// Fully qualified class name: `package/Outer.Inner`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassId(pub String);

impl ClassId {
    pub fn new(package: &str, relative: &str) -> Self {
        if package.is_empty() {
            ClassId(relative.to_string())
        } else {
            ClassId(format!("{package}/{relative}"))
        }
    }

    pub fn builtin(name: &str) -> Self {
        Self::new(BUILTIN_PACKAGE, name)
    }

    pub fn nested(&self, name: &str) -> Self {
        ClassId(format!("{}.{name}", self.0))
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ConeType {
    Class {
        class: ClassId,
        #[serde(default)]
        args: Vec<ConeType>,
        #[serde(default)]
        nullable: bool,
    },
    TypeParameter {
        name: String,
        #[serde(default)]
        nullable: bool,
    },
}

impl ConeType {
    pub fn class(class: ClassId, args: Vec<ConeType>) -> Self {
        ConeType::Class {
            class,
            args,
            nullable: false,
        }
    }

    pub fn builtin(name: &str) -> Self {
        Self::class(ClassId::builtin(name), Vec::new())
    }

    pub fn type_parameter(name: &str) -> Self {
        ConeType::TypeParameter {
            name: name.to_string(),
            nullable: false,
        }
    }

    pub fn is_nullable(&self) -> bool {
        match self {
            ConeType::Class { nullable, .. } | ConeType::TypeParameter { nullable, .. } => {
                *nullable
            }
        }
    }

    pub fn with_nullability(mut self, value: bool) -> Self {
        match &mut self {
            ConeType::Class { nullable, .. } | ConeType::TypeParameter { nullable, .. } => {
                *nullable = value;
            }
        }
        self
    }

    pub fn class_id(&self) -> Option<&ClassId> {
        match self {
            ConeType::Class { class, .. } => Some(class),
            ConeType::TypeParameter { .. } => None,
        }
    }

    pub fn type_arguments(&self) -> &[ConeType] {
        match self {
            ConeType::Class { args, .. } => args,
            ConeType::TypeParameter { .. } => &[],
        }
    }
}

impl fmt::Display for ConeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConeType::Class {
                class,
                args,
                nullable,
            } => {
                write!(f, "{class}")?;
                if !args.is_empty() {
                    write!(f, "<")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    write!(f, ">")?;
                }
                if *nullable {
                    write!(f, "?")?;
                }
                Ok(())
            }
            ConeType::TypeParameter { name, nullable } => {
                write!(f, "{name}")?;
                if *nullable {
                    write!(f, "?")?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum TypeRef {
    #[default]
    Implicit,
    Resolved(ConeType),
    Error(String),
}

impl TypeRef {
    pub fn is_implicit(&self) -> bool {
        matches!(self, TypeRef::Implicit)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, TypeRef::Error(_))
    }

    pub fn cone(&self) -> Option<&ConeType> {
        match self {
            TypeRef::Resolved(ty) => Some(ty),
            _ => None,
        }
    }

    pub fn builtin(name: &str) -> Self {
        TypeRef::Resolved(ConeType::builtin(name))
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Implicit => write!(f, "<implicit>"),
            TypeRef::Resolved(ty) => write!(f, "{ty}"),
            TypeRef::Error(reason) => write!(f, "<error: {reason}>"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TypeParameter {
    pub name: String,
    #[serde(default)]
    pub bounds: Vec<ConeType>,
}

impl TypeParameter {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            bounds: Vec::new(),
        }
    }
}

/// Maps type-parameter names to the arguments supplied at a use site.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Substitution {
    map: HashMap<String, ConeType>,
}

impl Substitution {
    /// Pairs parameters with arguments positionally; surplus on either side is dropped.
    pub fn new(params: &[TypeParameter], args: &[ConeType]) -> Self {
        let map = params
            .iter()
            .zip(args)
            .map(|(param, arg)| (param.name.clone(), arg.clone()))
            .collect();
        Self { map }
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ConeType> {
        self.map.get(name)
    }

    /// Drops the entries for `shadowing`, the declaration's own type parameters.
    pub fn without(&self, shadowing: &[TypeParameter]) -> Substitution {
        let map = self
            .map
            .iter()
            .filter(|(name, _)| !shadowing.iter().any(|param| &param.name == *name))
            .map(|(name, ty)| (name.clone(), ty.clone()))
            .collect();
        Substitution { map }
    }

    pub fn apply(&self, ty: &ConeType) -> ConeType {
        match ty {
            ConeType::TypeParameter { name, nullable } => match self.map.get(name) {
                Some(replacement) => {
                    let nullable = *nullable || replacement.is_nullable();
                    replacement.clone().with_nullability(nullable)
                }
                None => ty.clone(),
            },
            ConeType::Class {
                class,
                args,
                nullable,
            } => ConeType::Class {
                class: class.clone(),
                args: args.iter().map(|arg| self.apply(arg)).collect(),
                nullable: *nullable,
            },
        }
    }

    pub fn apply_ref(&self, ty: &TypeRef) -> TypeRef {
        match ty {
            TypeRef::Resolved(cone) => TypeRef::Resolved(self.apply(cone)),
            other => other.clone(),
        }
    }

    /// `self` was produced by an inner scope, `outer` wraps it: outer arguments
    /// are pushed into the inner mapping, outer-only entries are kept.
    pub fn then(&self, outer: &Substitution) -> Substitution {
        let mut map: HashMap<String, ConeType> = self
            .map
            .iter()
            .map(|(name, ty)| (name.clone(), outer.apply(ty)))
            .collect();
        for (name, ty) in &outer.map {
            map.entry(name.clone()).or_insert_with(|| ty.clone());
        }
        Substitution { map }
    }
}

/// Placeholder for branch unification: the first branch type stands in for the
/// common supertype until a real type lattice is available.
pub fn common_super_type(types: &[TypeRef]) -> Option<TypeRef> {
    types.first().cloned()
}
