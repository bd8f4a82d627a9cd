//! # tlspl: TLS presentation language to Rust
//!
//! Parses the presentation language used by protocol specifications (RFC 5246, section 4) with a
//! PEST grammar and lowers the resulting AST into Rust type declarations: structs, enums, and
//! tagged unions for `select` variants.
//!
//! ## Supported constructs
//!
//! - Scalar fields `T name;` (`uint8`, `uint16`, `uint24`, `uint32`, `uint64`, `opaque` map to
//!   Rust integers; other type names pass through)
//! - Vectors `T name[n];` (`[T; n]`) and `T name<floor..ceiling>;` (`Vec<T>`), with bounds such
//!   as `<0..2^16-1>`
//! - Enumerateds with explicit values and optional width marker, or bare members
//! - Named and anonymous structures, nested to any depth
//! - `select (E) { case a: case b: T; ... } label;` variants with fallthrough groups
//! - Cryptographic attributes `digitally-signed`, `stream-ciphered`, `block-ciphered`,
//!   `aead-ciphered`, `public-key-encrypted`
//!
//! ## Example
//!
//! ```text
//! stream-ciphered struct {
//!     uint8 field1;
//!     uint8 field2;
//!     digitally-signed struct {
//!         uint8 field3<0..255>;
//!         uint8 field4;
//!     };
//! } UserType;
//! ```
//!
//! lowers to
//!
//! ```text
//! struct UserTypeSigned {
//!     field3: Vec<u8>,
//!     field4: u8,
//! }
//!
//! struct UserType {
//!     field1: u8,
//!     field2: u8,
//!     signed: DigitallySigned<UserTypeSigned>,
//! }
//! ```
//!
//! ## Usage
//!
//! [`compile`] runs parse and lowering; [`compile_checked`] also runs the [`resolve`] pass. The
//! `tlspl2rs` binary wraps both for files and stdin.

pub mod ast;
pub mod codegen;
pub mod naming;
pub mod parser;
pub mod resolve;

pub use ast::{CryptographicAttribute, Declaration, Definitions};
pub use codegen::{CodeGen, Fragment, GenOptions, UnsupportedConstructError};
pub use naming::NamingScheme;
pub use parser::{parse, parse_declaration, Position, SyntaxError, SyntaxErrorKind};
pub use resolve::{ResolveError, ResolvedUnit};

/// Any failure of a compilation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),
    #[error("invalid definitions: {0}")]
    Resolve(#[from] ResolveError),
    #[error("unsupported construct: {0}")]
    Unsupported(#[from] UnsupportedConstructError),
}

/// Parse `source` and lower it to Rust declarations.
pub fn compile(source: &str, options: &GenOptions) -> Result<String, Error> {
    let definitions = parse(source)?;
    Ok(CodeGen::new(*options).lower(&definitions)?)
}

/// Like [`compile`], but reject units that fail validation (duplicate names, generated names
/// clashing with other types, inverted bounds, selects that do not match their enum).
pub fn compile_checked(source: &str, options: &GenOptions) -> Result<String, Error> {
    let resolved = ResolvedUnit::resolve_with(parse(source)?, options.naming)?;
    Ok(CodeGen::new(*options).lower(&resolved.definitions)?)
}
