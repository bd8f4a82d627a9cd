//! Abstract Syntax Tree for the TLS presentation language.
//!
//! Every node is built once by [`crate::parser`] and never mutated afterwards. Constructs that
//! introduce names (structure bodies, enumerateds, select blocks) own a [`Scope`] recording those
//! names in source order.

use std::fmt;
use std::str::FromStr;

/// Ordered sequence of declarations at one scope level (a whole unit or a structure body).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Definitions {
    pub declarations: Vec<Declaration>,
    pub scope: Scope,
}

impl Definitions {
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Declaration> {
        self.declarations.iter()
    }
}

impl<'a> IntoIterator for &'a Definitions {
    type Item = &'a Declaration;
    type IntoIter = std::slice::Iter<'a, Declaration>;

    fn into_iter(self) -> Self::IntoIter {
        self.declarations.iter()
    }
}

/// One declaration. The set is closed: lowering and validation match on it exhaustively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    Scalar(ScalarField),
    ConstantVector(ConstantVectorField),
    VariableVector(VariableVectorField),
    ExternalEnum(ExternalEnum),
    InternalEnum(InternalEnum),
    NamedStructure(NamedStructure),
    UnnamedStructure(UnnamedStructure),
}

impl Declaration {
    /// Short description used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Declaration::Scalar(_) => "scalar field",
            Declaration::ConstantVector(_) => "constant vector",
            Declaration::VariableVector(_) => "variable vector",
            Declaration::ExternalEnum(_) => "external enum",
            Declaration::InternalEnum(_) => "internal enum",
            Declaration::NamedStructure(_) => "named structure",
            Declaration::UnnamedStructure(_) => "unnamed structure",
        }
    }

    /// Declared type name, for the constructs that define a type.
    pub fn type_name(&self) -> Option<&str> {
        match self {
            Declaration::ExternalEnum(e) => e.name.as_deref(),
            Declaration::InternalEnum(e) => Some(&e.name),
            Declaration::NamedStructure(s) => Some(&s.name),
            _ => None,
        }
    }

    /// Structure body together with the declared name, if this is a structure.
    pub fn as_structure(&self) -> Option<(Option<&str>, &StructureBody)> {
        match self {
            Declaration::NamedStructure(s) => Some((Some(&s.name), &s.body)),
            Declaration::UnnamedStructure(s) => Some((None, &s.body)),
            _ => None,
        }
    }
}

/// `T name;`, optionally prefixed by a cryptographic attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarField {
    pub cryptographic_attribute: Option<CryptographicAttribute>,
    pub field_type: String,
    pub name: String,
}

/// `T name[n];`. `vector_size` is kept as written, no byte/element conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantVectorField {
    pub vector_type: String,
    pub name: String,
    pub vector_size: u64,
}

/// `T name<floor..ceiling>;`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableVectorField {
    pub vector_type: String,
    pub name: String,
    pub vector_bounds: VectorBounds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorBounds {
    pub floor: u64,
    pub ceiling: u64,
}

/// `enum { e1(v1), e2(v2), ..., (width) } Te;`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalEnum {
    pub name: Option<String>,
    pub entries: Vec<ExternalEnumEntry>,
    /// Trailing `(n)` marker forcing the encoded width; not a member.
    pub width: Option<u64>,
    pub scope: Scope,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalEnumEntry {
    pub name: String,
    pub value: u64,
}

/// `enum { low, medium, high } Amount;`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalEnum {
    pub name: String,
    pub entries: Vec<InternalEnumEntry>,
    pub scope: Scope,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalEnumEntry {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedStructure {
    pub name: String,
    pub body: StructureBody,
}

/// Anonymous structure; only meaningful nested in another declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnnamedStructure {
    pub body: StructureBody,
}

/// Everything between (and including) an optional attribute and the closing brace of `struct { ... }`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructureBody {
    pub cryptographic_attribute: Option<CryptographicAttribute>,
    pub fields: Definitions,
    pub structure_variant: Option<Variant>,
}

/// `select (E) { case e1: T1; case e2: case e3: T2; } label;`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub variant_type: String,
    pub variant_cases: Vec<VariantCase>,
    pub name: String,
    /// Case labels of all groups.
    pub scope: Scope,
}

impl Variant {
    /// Case labels in source order, across all fallthrough groups.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.variant_cases
            .iter()
            .flat_map(|c| c.cases.iter().map(String::as_str))
    }
}

/// A fallthrough group: consecutive labels sharing one payload type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantCase {
    pub cases: Vec<String>,
    pub case_type: String,
}

/// Cryptographic processing keyword (RFC 5246, section 4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CryptographicAttribute {
    DigitallySigned,
    StreamCiphered,
    BlockCiphered,
    AeadCiphered,
    PublicKeyEncrypted,
}

impl CryptographicAttribute {
    pub const ALL: [CryptographicAttribute; 5] = [
        CryptographicAttribute::DigitallySigned,
        CryptographicAttribute::StreamCiphered,
        CryptographicAttribute::BlockCiphered,
        CryptographicAttribute::AeadCiphered,
        CryptographicAttribute::PublicKeyEncrypted,
    ];

    /// Keyword as written in the source.
    pub fn keyword(self) -> &'static str {
        match self {
            CryptographicAttribute::DigitallySigned => "digitally-signed",
            CryptographicAttribute::StreamCiphered => "stream-ciphered",
            CryptographicAttribute::BlockCiphered => "block-ciphered",
            CryptographicAttribute::AeadCiphered => "aead-ciphered",
            CryptographicAttribute::PublicKeyEncrypted => "public-key-encrypted",
        }
    }
}

impl fmt::Display for CryptographicAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for CryptographicAttribute {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CryptographicAttribute::ALL
            .into_iter()
            .find(|a| a.keyword() == s)
            .ok_or_else(|| format!("unknown cryptographic attribute: {}", s))
    }
}

// ==================== Scopes ====================

/// What a name in a [`Scope`] stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Field,
    Structure,
    Enum,
    EnumMember,
    CaseLabel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub name: String,
    pub kind: BindingKind,
}

/// Names introduced by one construct, in registration order. Duplicates are kept so that a
/// later pass can report them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope {
    bindings: Vec<Binding>,
}

impl Scope {
    pub fn bind(&mut self, name: impl Into<String>, kind: BindingKind) {
        self.bindings.push(Binding {
            name: name.into(),
            kind,
        });
    }

    /// First binding registered under `name`.
    pub fn lookup(&self, name: &str) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|b| b.name.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Binding> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Names registered more than once, each reported at its second occurrence, in order.
    pub fn duplicates(&self) -> Vec<&str> {
        let mut out = Vec::new();
        for (i, b) in self.bindings.iter().enumerate() {
            let seen_before = self.bindings[..i].iter().any(|p| p.name == b.name);
            if seen_before && !out.contains(&b.name.as_str()) {
                out.push(b.name.as_str());
            }
        }
        out
    }
}
