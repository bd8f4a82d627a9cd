//! Name synthesis for anonymous constructs, cryptographic-attribute mapping and primitive types.

use crate::ast::CryptographicAttribute;
use std::borrow::Cow;

/// Implicit presentation-language types and the Rust type each lowers to.
const PRIMITIVES: &[(&str, &str)] = &[
    ("uint8", "u8"),
    ("opaque", "u8"),
    ("uint16", "u16"),
    ("uint24", "u24"),
    ("uint32", "u32"),
    ("uint64", "u64"),
];

/// Strict and reserved Rust keywords.
const RUST_KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "do", "dyn",
    "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl", "in", "let",
    "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref", "return",
    "static", "struct", "trait", "true", "try", "type", "typeof", "unsafe", "unsized", "use",
    "virtual", "where", "while", "yield",
];

/// Keywords that cannot be written as raw identifiers.
const NON_RAW_KEYWORDS: &[&str] = &["self", "Self", "super", "crate", "_"];

/// How anonymous structures derive their type name from enclosing structures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamingScheme {
    /// Prefix with the enclosing structure's emitted name, itself derived from its ancestors.
    #[default]
    FullPath,
    /// Prefix with the enclosing structure's name computed without its own ancestors.
    Shallow,
}

impl NamingScheme {
    /// Type name emitted for a structure declared directly inside `parent`.
    pub fn structure_name(
        self,
        name: Option<&str>,
        attribute: Option<CryptographicAttribute>,
        parent: Option<&Ancestor>,
    ) -> String {
        let prefix = match (self, parent) {
            (_, None) => "",
            (NamingScheme::FullPath, Some(p)) => p.full.as_str(),
            (NamingScheme::Shallow, Some(p)) => p.shallow.as_str(),
        };
        typename(name, attribute, prefix)
    }
}

/// Enclosing structure as seen by its anonymous children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ancestor {
    /// Name the structure would get with no ancestors of its own.
    pub shallow: String,
    /// Name derived along the whole ancestor chain.
    pub full: String,
}

impl Ancestor {
    pub fn new(
        name: Option<&str>,
        attribute: Option<CryptographicAttribute>,
        parent: Option<&Ancestor>,
    ) -> Self {
        Ancestor {
            shallow: typename(name, attribute, ""),
            full: typename(name, attribute, parent.map_or("", |p| p.full.as_str())),
        }
    }
}

/// Tagged union generated for the `select` of the structure emitted as `owner`.
pub fn variant_union(owner: &str) -> String {
    format!("{}Variant", owner)
}

pub fn primitive(name: &str) -> Option<&'static str> {
    PRIMITIVES
        .iter()
        .find(|(pl, _)| *pl == name)
        .map(|(_, rust)| *rust)
}

/// Rust type for a referenced type name; non-primitive names pass through.
pub fn target_type(name: &str) -> &str {
    primitive(name).unwrap_or(name)
}

impl CryptographicAttribute {
    /// Field name given to an anonymous structure carrying this attribute.
    pub fn field_role(self) -> &'static str {
        match self {
            CryptographicAttribute::DigitallySigned => "signed",
            CryptographicAttribute::StreamCiphered
            | CryptographicAttribute::BlockCiphered
            | CryptographicAttribute::AeadCiphered => "ciphered",
            CryptographicAttribute::PublicKeyEncrypted => "encrypted",
        }
    }

    /// Suffix appended to the ancestor prefix to name an anonymous structure.
    pub fn type_suffix(self) -> &'static str {
        match self {
            CryptographicAttribute::DigitallySigned => "Signed",
            CryptographicAttribute::StreamCiphered
            | CryptographicAttribute::BlockCiphered
            | CryptographicAttribute::AeadCiphered => "Ciphered",
            CryptographicAttribute::PublicKeyEncrypted => "Encrypted",
        }
    }

    /// Generic wrapper type named after the attribute.
    pub fn container(self) -> &'static str {
        match self {
            CryptographicAttribute::DigitallySigned => "DigitallySigned",
            CryptographicAttribute::StreamCiphered => "StreamCiphered",
            CryptographicAttribute::BlockCiphered => "BlockCiphered",
            CryptographicAttribute::AeadCiphered => "AeadCiphered",
            CryptographicAttribute::PublicKeyEncrypted => "PublicKeyEncrypted",
        }
    }

    /// Whether references to a structure with this attribute are wrapped in [`Self::container`].
    /// Public-key-encrypted references stay bare.
    pub fn wraps_reference(self) -> bool {
        !matches!(self, CryptographicAttribute::PublicKeyEncrypted)
    }
}

/// Field name of a node: its declared name, else a role keyword.
pub fn fieldname(name: Option<&str>, attribute: Option<CryptographicAttribute>) -> &str {
    match (name, attribute) {
        (Some(name), _) => name,
        (None, Some(attribute)) => attribute.field_role(),
        (None, None) => "container",
    }
}

/// Type name of a node: its declared name, else `prefix` plus a role suffix.
pub fn typename(
    name: Option<&str>,
    attribute: Option<CryptographicAttribute>,
    prefix: &str,
) -> String {
    match (name, attribute) {
        (Some(name), _) => name.to_string(),
        (None, Some(attribute)) => format!("{}{}", prefix, attribute.type_suffix()),
        (None, None) => format!("{}Container", prefix),
    }
}

/// Type used where a structure is referenced: `typ` wrapped in the attribute's container.
pub fn wrap_reference(attribute: Option<CryptographicAttribute>, typ: &str) -> String {
    match attribute {
        Some(attribute) if attribute.wraps_reference() => {
            format!("{}<{}>", attribute.container(), typ)
        }
        _ => typ.to_string(),
    }
}

/// Identifier safe to emit in Rust: keywords become raw identifiers, or get a trailing `_`
/// when Rust has no raw form for them.
pub fn escape_ident(name: &str) -> Cow<'_, str> {
    if NON_RAW_KEYWORDS.contains(&name) {
        Cow::Owned(format!("{}_", name))
    } else if RUST_KEYWORDS.contains(&name) {
        Cow::Owned(format!("r#{}", name))
    } else {
        Cow::Borrowed(name)
    }
}
