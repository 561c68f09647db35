//! Compile-time types, shared by both typecheck passes (spec §4.1 runs
//! once before and once after record elimination).

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    Bool,
    Tuple(Vec<Type>),
    /// Nominal, non-recursive. Field order is declaration order and is
    /// part of the type, since it is also the tuple layout after
    /// elimination.
    Record(String, Vec<(String, Type)>),
    Callable(Vec<Type>, Box<Type>),
}

impl Type {
    pub fn record_fields(&self) -> Option<&[(String, Type)]> {
        match self {
            Type::Record(_, fields) => Some(fields),
            _ => None,
        }
    }

    pub fn field_index(&self, field: &str) -> Option<usize> {
        self.record_fields()?.iter().position(|(name, _)| name == field)
    }

    /// The tuple shape a `Record` is lowered to by eliminate-records.
    pub fn as_tuple(&self) -> Type {
        match self {
            Type::Record(_, fields) => {
                Type::Tuple(fields.iter().map(|(_, t)| t.clone()).collect())
            }
            other => other.clone(),
        }
    }

    pub fn is_tuple(&self) -> bool {
        matches!(self, Type::Tuple(_) | Type::Record(_, _))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Bool => write!(f, "bool"),
            Type::Tuple(items) => {
                write!(f, "(")?;
                for (i, t) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{t}")?;
                }
                write!(f, ")")
            }
            Type::Record(name, _) => write!(f, "{name}"),
            Type::Callable(args, ret) => {
                write!(f, "(")?;
                for (i, t) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{t}")?;
                }
                write!(f, ") -> {ret}")
            }
        }
    }
}
