//! Parse presentation-language source into the AST using PEST.

use crate::ast::*;
use crate::naming;
use pest::error::{ErrorVariant, InputLocation, LineColLocation};
use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser as PestParser;
use std::fmt;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct PresentationParser;

/// Deepest `{ ... }` nesting accepted. The descent recurses per level, so deeper input is
/// rejected before it reaches the grammar.
pub const MAX_NESTING_DEPTH: usize = 32;

/// Location in the source text. `line` and `column` are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Position {
    fn of(pair: &Pair<Rule>) -> Self {
        let start = pair.as_span().start_pos();
        let (line, column) = start.line_col();
        Position {
            offset: start.pos(),
            line,
            column,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxErrorKind {
    UnexpectedToken,
    UnterminatedConstruct,
    MalformedBound,
}

impl fmt::Display for SyntaxErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyntaxErrorKind::UnexpectedToken => "unexpected token",
            SyntaxErrorKind::UnterminatedConstruct => "unterminated construct",
            SyntaxErrorKind::MalformedBound => "malformed bound",
        })
    }
}

/// Source text does not match the grammar. No partial tree is produced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at {position}: {message}")]
pub struct SyntaxError {
    pub kind: SyntaxErrorKind,
    pub position: Position,
    pub message: String,
}

impl SyntaxError {
    fn at(kind: SyntaxErrorKind, pair: &Pair<Rule>, message: impl Into<String>) -> Self {
        SyntaxError {
            kind,
            position: Position::of(pair),
            message: message.into(),
        }
    }

    fn from_pest(err: pest::error::Error<Rule>, source: &str) -> Self {
        let offset = match err.location {
            InputLocation::Pos(p) => p,
            InputLocation::Span((start, _)) => start,
        };
        let (line, column) = match err.line_col {
            LineColLocation::Pos(lc) => lc,
            LineColLocation::Span(lc, _) => lc,
        };
        let (in_bounds, message) = match &err.variant {
            ErrorVariant::ParsingError {
                positives,
                negatives,
            } => {
                // `vector_bounds` itself is attempted after any `T name` prefix, so only
                // failures past the opening `<` count as bound errors.
                let in_bounds = positives.iter().any(|r| {
                    matches!(
                        r,
                        Rule::bound
                            | Rule::bound_base
                            | Rule::bound_exponent
                            | Rule::bound_offset
                            | Rule::range_sep
                            | Rule::bounds_close
                    )
                });
                (in_bounds, expectation_message(positives, negatives))
            }
            ErrorVariant::CustomError { message } => (false, message.clone()),
        };
        let at_end = source.get(offset..).map_or(true, |rest| rest.trim().is_empty());
        let kind = if in_bounds {
            SyntaxErrorKind::MalformedBound
        } else if at_end {
            SyntaxErrorKind::UnterminatedConstruct
        } else {
            SyntaxErrorKind::UnexpectedToken
        };
        SyntaxError {
            kind,
            position: Position {
                offset,
                line,
                column,
            },
            message,
        }
    }

    fn at_offset(kind: SyntaxErrorKind, source: &str, offset: usize, message: String) -> Self {
        let before = &source[..offset];
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        SyntaxError {
            kind,
            position: Position {
                offset,
                line: before.matches('\n').count() + 1,
                column: before[line_start..].chars().count() + 1,
            },
            message,
        }
    }
}

/// Reject brace nesting deeper than [`MAX_NESTING_DEPTH`]. Braces inside comments do not count.
fn check_nesting(source: &str) -> Result<(), SyntaxError> {
    let bytes = source.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match (bytes[i], bytes.get(i + 1)) {
            (b'/', Some(b'*')) => {
                i = source[i + 2..].find("*/").map_or(bytes.len(), |end| i + 2 + end + 2);
                continue;
            }
            (b'/', Some(b'/')) => {
                i = source[i..].find('\n').map_or(bytes.len(), |end| i + end);
                continue;
            }
            (b'{', _) => {
                depth += 1;
                if depth > MAX_NESTING_DEPTH {
                    return Err(SyntaxError::at_offset(
                        SyntaxErrorKind::UnexpectedToken,
                        source,
                        i,
                        format!("nesting deeper than {} levels", MAX_NESTING_DEPTH),
                    ));
                }
            }
            (b'}', _) => depth = depth.saturating_sub(1),
            _ => {}
        }
        i += 1;
    }
    Ok(())
}

fn expectation_message(positives: &[Rule], negatives: &[Rule]) -> String {
    let list = |rules: &[Rule]| {
        let mut names: Vec<String> = rules.iter().map(describe_rule).collect();
        names.dedup();
        match names.split_last() {
            Some((last, [])) => last.clone(),
            Some((last, rest)) => format!("{} or {}", rest.join(", "), last),
            None => String::new(),
        }
    };
    match (positives.is_empty(), negatives.is_empty()) {
        (false, false) => format!("unexpected {}; expected {}", list(negatives), list(positives)),
        (false, true) => format!("expected {}", list(positives)),
        (true, false) => format!("unexpected {}", list(negatives)),
        (true, true) => "unknown parsing error".to_string(),
    }
}

fn describe_rule(rule: &Rule) -> String {
    match rule {
        Rule::ident => "identifier",
        Rule::number => "integer",
        Rule::crypto_attribute => "cryptographic attribute",
        Rule::vector_bounds => "`<floor..ceiling>`",
        Rule::bound | Rule::bound_base => "vector bound",
        Rule::bound_exponent => "exponent",
        Rule::bound_offset => "bound offset",
        Rule::range_sep => "`..`",
        Rule::bounds_close => "`>`",
        Rule::scalar_field | Rule::constant_vector_field | Rule::variable_vector_field => "field",
        Rule::external_enum | Rule::internal_enum => "enum",
        Rule::external_enum_entry | Rule::internal_enum_entry => "enum entry",
        Rule::enum_width => "enum width",
        Rule::structure => "struct",
        Rule::structure_fields => "field declaration",
        Rule::variant => "select",
        Rule::variant_case | Rule::case_label => "`case`",
        Rule::EOI => "end of input",
        other => return format!("{:?}", other),
    }
    .to_string()
}

/// Parse a sequence of top-level declarations.
pub fn parse(source: &str) -> Result<Definitions, SyntaxError> {
    check_nesting(source)?;
    let mut pairs = PresentationParser::parse(Rule::definitions, source)
        .map_err(|e| SyntaxError::from_pest(e, source))?;
    let root = match pairs.next() {
        Some(root) => root,
        None => return Ok(Definitions::default()),
    };
    let definitions = build_definitions(root.into_inner())?;
    log::debug!("parsed {} top-level declaration(s)", definitions.len());
    Ok(definitions)
}

/// Parse exactly one declaration (field, structure or enum).
pub fn parse_declaration(source: &str) -> Result<Declaration, SyntaxError> {
    check_nesting(source)?;
    let mut pairs = PresentationParser::parse(Rule::single_declaration, source)
        .map_err(|e| SyntaxError::from_pest(e, source))?;
    let inner = pairs
        .next()
        .and_then(|root| root.into_inner().find(|p| p.as_rule() != Rule::EOI));
    match inner {
        Some(pair) => build_declaration(pair, &mut Scope::default()),
        None => Err(SyntaxError {
            kind: SyntaxErrorKind::UnterminatedConstruct,
            position: Position::default(),
            message: "expected a declaration".to_string(),
        }),
    }
}

fn build_definitions(pairs: Pairs<Rule>) -> Result<Definitions, SyntaxError> {
    let mut scope = Scope::default();
    let mut declarations = Vec::new();
    for pair in pairs {
        if pair.as_rule() == Rule::EOI {
            continue;
        }
        declarations.push(build_declaration(pair, &mut scope)?);
    }
    Ok(Definitions {
        declarations,
        scope,
    })
}

/// Build one declaration and register the name it introduces in `scope`.
fn build_declaration(pair: Pair<Rule>, scope: &mut Scope) -> Result<Declaration, SyntaxError> {
    let declaration = match pair.as_rule() {
        Rule::scalar_field => Declaration::Scalar(build_scalar_field(pair)?),
        Rule::constant_vector_field => Declaration::ConstantVector(build_constant_vector(pair)?),
        Rule::variable_vector_field => Declaration::VariableVector(build_variable_vector(pair)?),
        Rule::external_enum => Declaration::ExternalEnum(build_external_enum(pair)?),
        Rule::internal_enum => Declaration::InternalEnum(build_internal_enum(pair)?),
        Rule::structure => build_structure(pair)?,
        other => {
            return Err(SyntaxError::at(
                SyntaxErrorKind::UnexpectedToken,
                &pair,
                format!("unexpected {}", describe_rule(&other)),
            ))
        }
    };
    match &declaration {
        Declaration::Scalar(f) => scope.bind(&f.name, BindingKind::Field),
        Declaration::ConstantVector(f) => scope.bind(&f.name, BindingKind::Field),
        Declaration::VariableVector(f) => scope.bind(&f.name, BindingKind::Field),
        Declaration::ExternalEnum(e) => {
            if let Some(name) = &e.name {
                scope.bind(name, BindingKind::Enum);
            }
        }
        Declaration::InternalEnum(e) => scope.bind(&e.name, BindingKind::Enum),
        Declaration::NamedStructure(s) => scope.bind(&s.name, BindingKind::Structure),
        Declaration::UnnamedStructure(s) => scope.bind(
            naming::fieldname(None, s.body.cryptographic_attribute),
            BindingKind::Field,
        ),
    }
    Ok(declaration)
}

fn build_crypto_attribute(pair: Pair<Rule>) -> Result<CryptographicAttribute, SyntaxError> {
    pair.as_str()
        .parse()
        .map_err(|e: String| SyntaxError::at(SyntaxErrorKind::UnexpectedToken, &pair, e))
}

fn build_scalar_field(pair: Pair<Rule>) -> Result<ScalarField, SyntaxError> {
    let mut cryptographic_attribute = None;
    let mut idents = Vec::with_capacity(2);
    for inner in pair.clone().into_inner() {
        match inner.as_rule() {
            Rule::crypto_attribute => cryptographic_attribute = Some(build_crypto_attribute(inner)?),
            Rule::ident => idents.push(inner.as_str().to_string()),
            _ => {}
        }
    }
    let (field_type, name) = take_type_and_name(&pair, idents)?;
    Ok(ScalarField {
        cryptographic_attribute,
        field_type,
        name,
    })
}

fn build_constant_vector(pair: Pair<Rule>) -> Result<ConstantVectorField, SyntaxError> {
    let mut idents = Vec::with_capacity(2);
    let mut vector_size = None;
    for inner in pair.clone().into_inner() {
        match inner.as_rule() {
            Rule::crypto_attribute => return Err(crypto_on_vector(&inner)),
            Rule::ident => idents.push(inner.as_str().to_string()),
            Rule::number => vector_size = Some(parse_number(&inner)?),
            _ => {}
        }
    }
    let (vector_type, name) = take_type_and_name(&pair, idents)?;
    let vector_size = vector_size.ok_or_else(|| {
        SyntaxError::at(SyntaxErrorKind::UnexpectedToken, &pair, "vector without a size")
    })?;
    Ok(ConstantVectorField {
        vector_type,
        name,
        vector_size,
    })
}

fn build_variable_vector(pair: Pair<Rule>) -> Result<VariableVectorField, SyntaxError> {
    let mut idents = Vec::with_capacity(2);
    let mut vector_bounds = None;
    for inner in pair.clone().into_inner() {
        match inner.as_rule() {
            Rule::crypto_attribute => return Err(crypto_on_vector(&inner)),
            Rule::ident => idents.push(inner.as_str().to_string()),
            Rule::vector_bounds => vector_bounds = Some(build_vector_bounds(inner)?),
            _ => {}
        }
    }
    let (vector_type, name) = take_type_and_name(&pair, idents)?;
    let vector_bounds = vector_bounds.ok_or_else(|| {
        SyntaxError::at(SyntaxErrorKind::MalformedBound, &pair, "vector without bounds")
    })?;
    Ok(VariableVectorField {
        vector_type,
        name,
        vector_bounds,
    })
}

/// Attributes apply to scalars and structures only.
fn crypto_on_vector(attribute: &Pair<Rule>) -> SyntaxError {
    SyntaxError::at(
        SyntaxErrorKind::UnexpectedToken,
        attribute,
        format!(
            "cryptographic attribute `{}` cannot apply to a vector",
            attribute.as_str()
        ),
    )
}

/// Leading `T name` of a field or select: exactly two identifiers.
fn take_type_and_name(
    pair: &Pair<Rule>,
    idents: Vec<String>,
) -> Result<(String, String), SyntaxError> {
    let mut it = idents.into_iter();
    match (it.next(), it.next(), it.next()) {
        (Some(typ), Some(name), None) => Ok((typ, name)),
        _ => Err(SyntaxError::at(
            SyntaxErrorKind::UnexpectedToken,
            pair,
            format!("expected a type and a name in `{}`", pair.as_str()),
        )),
    }
}

fn build_vector_bounds(pair: Pair<Rule>) -> Result<VectorBounds, SyntaxError> {
    let values = pair
        .into_inner()
        .filter(|p| p.as_rule() == Rule::bound)
        .map(|p| evaluate_bound(&p))
        .collect::<Result<Vec<u64>, SyntaxError>>()?;
    match values.as_slice() {
        [floor, ceiling] => Ok(VectorBounds {
            floor: *floor,
            ceiling: *ceiling,
        }),
        _ => Err(SyntaxError {
            kind: SyntaxErrorKind::MalformedBound,
            position: Position::default(),
            message: "vector bounds need a floor and a ceiling".to_string(),
        }),
    }
}

/// `N`, `B^E` or `B^E-N`, as in `<0..2^16-1>`.
fn evaluate_bound(pair: &Pair<Rule>) -> Result<u64, SyntaxError> {
    let malformed = |message: &str| {
        SyntaxError::at(
            SyntaxErrorKind::MalformedBound,
            pair,
            format!("{}: `{}`", message, pair.as_str()),
        )
    };
    let mut value: u64 = 0;
    for part in pair.clone().into_inner() {
        let digits = part.as_str();
        match part.as_rule() {
            Rule::bound_base => {
                value = digits.parse().map_err(|_| malformed("bound out of range"))?;
            }
            Rule::bound_exponent => {
                let exp: u32 = digits.parse().map_err(|_| malformed("exponent out of range"))?;
                value = value
                    .checked_pow(exp)
                    .ok_or_else(|| malformed("bound out of range"))?;
            }
            Rule::bound_offset => {
                let offset: u64 = digits.parse().map_err(|_| malformed("bound out of range"))?;
                value = value
                    .checked_sub(offset)
                    .ok_or_else(|| malformed("negative bound"))?;
            }
            _ => {}
        }
    }
    Ok(value)
}

fn parse_number(pair: &Pair<Rule>) -> Result<u64, SyntaxError> {
    pair.as_str().parse().map_err(|_| {
        SyntaxError::at(
            SyntaxErrorKind::UnexpectedToken,
            pair,
            format!("integer literal out of range: {}", pair.as_str()),
        )
    })
}

fn build_external_enum(pair: Pair<Rule>) -> Result<ExternalEnum, SyntaxError> {
    let mut name = None;
    let mut entries = Vec::new();
    let mut width = None;
    let mut scope = Scope::default();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::external_enum_entry => {
                let mut it = inner.into_inner();
                let (entry_name, value) = match (it.next(), it.next()) {
                    (Some(n), Some(v)) => (n.as_str().to_string(), parse_number(&v)?),
                    _ => continue,
                };
                scope.bind(&entry_name, BindingKind::EnumMember);
                entries.push(ExternalEnumEntry {
                    name: entry_name,
                    value,
                });
            }
            Rule::enum_width => {
                if let Some(n) = inner.into_inner().next() {
                    width = Some(parse_number(&n)?);
                }
            }
            Rule::ident => name = Some(inner.as_str().to_string()),
            _ => {}
        }
    }
    Ok(ExternalEnum {
        name,
        entries,
        width,
        scope,
    })
}

fn build_internal_enum(pair: Pair<Rule>) -> Result<InternalEnum, SyntaxError> {
    let mut name = String::new();
    let mut entries = Vec::new();
    let mut scope = Scope::default();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::internal_enum_entry => {
                let entry = inner.as_str().trim().to_string();
                scope.bind(&entry, BindingKind::EnumMember);
                entries.push(InternalEnumEntry { name: entry });
            }
            Rule::ident => name = inner.as_str().to_string(),
            _ => {}
        }
    }
    Ok(InternalEnum {
        name,
        entries,
        scope,
    })
}

fn build_structure(pair: Pair<Rule>) -> Result<Declaration, SyntaxError> {
    let mut cryptographic_attribute = None;
    let mut fields = Definitions::default();
    let mut structure_variant = None;
    let mut name = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::crypto_attribute => cryptographic_attribute = Some(build_crypto_attribute(inner)?),
            Rule::structure_fields => fields = build_definitions(inner.into_inner())?,
            Rule::variant => structure_variant = Some(build_variant(inner)?),
            Rule::ident => name = Some(inner.as_str().to_string()),
            _ => {}
        }
    }
    if let Some(variant) = &structure_variant {
        fields.scope.bind(&variant.name, BindingKind::Field);
    }
    let body = StructureBody {
        cryptographic_attribute,
        fields,
        structure_variant,
    };
    Ok(match name {
        Some(name) => Declaration::NamedStructure(NamedStructure { name, body }),
        None => Declaration::UnnamedStructure(UnnamedStructure { body }),
    })
}

fn build_variant(pair: Pair<Rule>) -> Result<Variant, SyntaxError> {
    let mut idents = Vec::with_capacity(2);
    let mut variant_cases = Vec::new();
    let mut scope = Scope::default();
    for inner in pair.clone().into_inner() {
        match inner.as_rule() {
            Rule::ident => idents.push(inner.as_str().to_string()),
            Rule::variant_case => variant_cases.push(build_variant_case(inner, &mut scope)?),
            _ => {}
        }
    }
    let (variant_type, name) = take_type_and_name(&pair, idents)?;
    Ok(Variant {
        variant_type,
        variant_cases,
        name,
        scope,
    })
}

/// One fallthrough group: every `case` label up to the type that closes the group.
fn build_variant_case(pair: Pair<Rule>, scope: &mut Scope) -> Result<VariantCase, SyntaxError> {
    let mut cases = Vec::new();
    let mut case_type = None;
    for inner in pair.clone().into_inner() {
        match inner.as_rule() {
            Rule::case_label => {
                if let Some(label) = inner.into_inner().next() {
                    scope.bind(label.as_str(), BindingKind::CaseLabel);
                    cases.push(label.as_str().to_string());
                }
            }
            Rule::ident => case_type = Some(inner.as_str().to_string()),
            _ => {}
        }
    }
    let case_type = case_type.ok_or_else(|| {
        SyntaxError::at(SyntaxErrorKind::UnexpectedToken, &pair, "case group without a type")
    })?;
    Ok(VariantCase { cases, case_type })
}
