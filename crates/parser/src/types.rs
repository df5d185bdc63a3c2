//! The Breeze type algebra.
//!
//! Inference is best effort: anything the passes cannot pin down collapses
//! to [`Type::Any`], which renders (and emits) as the host's `any`. The
//! canonical string form produced by `Display` doubles as the structural
//! equality key, so two types are interchangeable exactly when they print
//! the same.

use std::fmt;

/// Signature of a function value or an introspected host function.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionSig {
    pub params: Vec<Type>,
    pub returns: Vec<Type>,
}

impl FunctionSig {
    pub fn new(params: Vec<Type>, returns: Vec<Type>) -> Self {
        FunctionSig { params, returns }
    }

    /// A trailing slice-typed parameter absorbs extra or missing arguments.
    pub fn has_variadic_tail(&self) -> bool {
        matches!(self.params.last(), Some(Type::Array(_)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    /// The universal fallback; unknown and mixed types land here.
    Any,
    /// A host primitive such as `int`, `float64`, `string`, `bool`.
    Basic(String),
    Pointer(Box<Type>),
    /// A type imported from a host package, e.g. `http.Request`.
    Named { package: String, name: String },
    Array(Box<Type>),
    Map(Box<Type>, Box<Type>),
    Function(FunctionSig),
    Struct(String),
    Interface(String),
}

impl Type {
    pub fn basic(name: impl Into<String>) -> Type {
        Type::Basic(name.into())
    }

    pub fn int() -> Type {
        Type::basic("int")
    }

    pub fn float() -> Type {
        Type::basic("float64")
    }

    pub fn string() -> Type {
        Type::basic("string")
    }

    pub fn bool() -> Type {
        Type::basic("bool")
    }

    pub fn array(elem: Type) -> Type {
        Type::Array(Box::new(elem))
    }

    pub fn map(key: Type, value: Type) -> Type {
        Type::Map(Box::new(key), Box::new(value))
    }

    pub fn pointer(elem: Type) -> Type {
        Type::Pointer(Box::new(elem))
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Type::Any)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Type::Basic(name) if matches!(
                name.as_str(),
                "int" | "int8" | "int16" | "int32" | "int64"
                    | "uint" | "uint8" | "uint16" | "uint32" | "uint64"
                    | "byte" | "rune" | "float32" | "float64"
            )
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Type::Basic(name) if name == "float32" || name == "float64")
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Type::Basic(name) if name == "string")
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Type::Basic(name) if name == "bool")
    }

    /// Collapse a collection of member types to the type they agree on,
    /// or `Any` when they disagree or the collection is empty.
    pub fn unify<I>(members: I) -> Type
    where
        I: IntoIterator<Item = Type>,
    {
        let mut iter = members.into_iter();
        let Some(first) = iter.next() else {
            return Type::Any;
        };
        let key = first.to_string();
        for member in iter {
            if member.to_string() != key {
                return Type::Any;
            }
        }
        first
    }

    /// Whether a host value conversion `to(from)` is well formed.
    pub fn convertible(from: &Type, to: &Type) -> bool {
        if to.is_any() || from.is_any() {
            return true;
        }
        if from.to_string() == to.to_string() {
            return true;
        }
        if from.is_numeric() && to.is_numeric() {
            return true;
        }
        let bytes = Type::array(Type::basic("byte"));
        let runes = Type::array(Type::basic("rune"));
        if from.is_string() && (*to == bytes || *to == runes) {
            return true;
        }
        if to.is_string() && (*from == bytes || *from == runes || from.is_numeric()) {
            return true;
        }
        false
    }

    /// Parse a host type string reported by introspection into the algebra.
    /// Shapes the algebra cannot express come back as `Any`.
    pub fn from_go_type(text: &str) -> Type {
        let text = text.trim();
        if text.is_empty() || text == "any" || text == "interface{}" || text == "interface {}" {
            return Type::Any;
        }
        if let Some(rest) = text.strip_prefix("...") {
            return Type::array(Type::from_go_type(rest));
        }
        if let Some(rest) = text.strip_prefix('*') {
            return Type::pointer(Type::from_go_type(rest));
        }
        if let Some(rest) = text.strip_prefix("[]") {
            return Type::array(Type::from_go_type(rest));
        }
        if let Some(rest) = text.strip_prefix("map[") {
            if let Some(close) = matching_bracket(rest) {
                let key = Type::from_go_type(&rest[..close]);
                let value = Type::from_go_type(&rest[close + 1..]);
                return Type::map(key, value);
            }
            return Type::Any;
        }
        if text.starts_with("chan ") || text.starts_with("<-chan ") || text.starts_with("chan<- ") {
            return Type::Any;
        }
        if let Some(rest) = text.strip_prefix("func(") {
            return parse_func_type(rest);
        }
        if text.starts_with("struct") || text.starts_with("interface") {
            return Type::Any;
        }
        if let Some(dot) = text.find('.') {
            let (package, name) = text.split_at(dot);
            if !package.is_empty() && name.len() > 1 {
                return Type::Named {
                    package: package.to_string(),
                    name: name[1..].to_string(),
                };
            }
        }
        Type::basic(text)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Any => write!(f, "any"),
            Type::Basic(name) => write!(f, "{name}"),
            Type::Pointer(elem) => write!(f, "*{elem}"),
            Type::Named { package, name } => write!(f, "{package}.{name}"),
            Type::Array(elem) => write!(f, "[]{elem}"),
            Type::Map(key, value) => write!(f, "map[{key}]{value}"),
            Type::Function(sig) => {
                write!(f, "func(")?;
                for (i, param) in sig.params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{param}")?;
                }
                write!(f, ")")?;
                match sig.returns.as_slice() {
                    [] => Ok(()),
                    [single] => write!(f, " {single}"),
                    many => {
                        write!(f, " (")?;
                        for (i, ret) in many.iter().enumerate() {
                            if i > 0 {
                                write!(f, ", ")?;
                            }
                            write!(f, "{ret}")?;
                        }
                        write!(f, ")")
                    }
                }
            }
            Type::Struct(name) => write!(f, "{name}"),
            Type::Interface(name) => write!(f, "{name}"),
        }
    }
}

/// Index of the `]` that closes the `map[` opener already stripped from
/// `text`, accounting for nested brackets.
fn matching_bracket(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                if depth == 0 {
                    return Some(i);
                }
                depth -= 1;
            }
            _ => {}
        }
    }
    None
}

/// Parse the remainder of `func(` .. including results. Parameter names are
/// stripped; only types survive.
fn parse_func_type(rest: &str) -> Type {
    let Some(close) = matching_paren(rest) else {
        return Type::Any;
    };
    let params = split_top_level(&rest[..close])
        .into_iter()
        .map(|part| Type::from_go_type(strip_param_name(part)))
        .collect();
    let result_text = rest[close + 1..].trim();
    let returns = if result_text.is_empty() {
        Vec::new()
    } else if let Some(inner) = result_text.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
        split_top_level(inner)
            .into_iter()
            .map(|part| Type::from_go_type(strip_param_name(part)))
            .collect()
    } else {
        vec![Type::from_go_type(result_text)]
    };
    Type::Function(FunctionSig::new(params, returns))
}

fn matching_paren(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' if depth == 0 => return Some(i),
            ')' | ']' | '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Split on commas not nested inside brackets or parens.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                let part = text[start..i].trim();
                if !part.is_empty() {
                    parts.push(part);
                }
                start = i + 1;
            }
            _ => {}
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        parts.push(tail);
    }
    parts
}

/// `go doc` prints parameters as `name type`; drop the name when present.
fn strip_param_name(part: &str) -> &str {
    let part = part.trim();
    if part.starts_with("func(") || part.starts_with("map[") {
        return part;
    }
    match part.split_once(' ') {
        Some((name, ty))
            if name.chars().all(|c| c.is_alphanumeric() || c == '_')
                && !name.is_empty()
                && !ty.is_empty() =>
        {
            ty
        }
        _ => part,
    }
}
