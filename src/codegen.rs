//! Lower the AST into Rust type declarations.
//!
//! Each node lowers to a [`Fragment`]: the text spliced into its parent (`decl`) plus the
//! free-standing definitions it needs (`specs`). Children's specs always come before the
//! definition of the structure that references them, so concatenating fragments in walk order yields output in
//! which every type is defined before it is used.

use crate::ast::*;
use crate::naming::{self, Ancestor, NamingScheme};
use std::borrow::Cow;

/// Lowering configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenOptions {
    pub naming: NamingScheme,
    /// Emit `#[repr(uN)]` for enums carrying an explicit width marker.
    pub enum_width_hints: bool,
    /// Write Rust keywords used as names as raw identifiers.
    pub escape_keywords: bool,
}

impl Default for GenOptions {
    fn default() -> Self {
        GenOptions {
            naming: NamingScheme::FullPath,
            enum_width_hints: true,
            escape_keywords: true,
        }
    }
}

/// The AST holds a construct the generator has no Rust form for. Fatal for the compilation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnsupportedConstructError {
    #[error("enum `{enumeration}` inside structure `{structure}`")]
    NestedEnum {
        enumeration: String,
        structure: String,
    },
    #[error("enum without a type name")]
    UnnamedEnum,
    #[error("cryptographic attribute `{attribute}` on field `{field}`")]
    CryptographicField {
        field: String,
        attribute: CryptographicAttribute,
    },
}

/// Declaration/specification pair produced for one node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    /// Inline text at the reference site (`name: Type`); empty for top-level types.
    pub decl: String,
    /// Free-standing definitions, dependencies first.
    pub specs: Vec<String>,
}

impl Fragment {
    fn field(decl: String) -> Self {
        Fragment {
            decl,
            specs: Vec::new(),
        }
    }

    fn definition(spec: String) -> Self {
        Fragment {
            decl: String::new(),
            specs: vec![spec],
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CodeGen {
    options: GenOptions,
}

impl CodeGen {
    pub fn new(options: GenOptions) -> Self {
        CodeGen { options }
    }

    pub fn options(&self) -> &GenOptions {
        &self.options
    }

    /// Lower a whole unit: every spec in dependency order, then top-level field declarations.
    pub fn lower(&self, definitions: &Definitions) -> Result<String, UnsupportedConstructError> {
        let mut specs = Vec::new();
        let mut decls = Vec::new();
        for declaration in definitions {
            let fragment = self.lower_node(declaration, None)?;
            specs.extend(fragment.specs);
            if !fragment.decl.is_empty() {
                decls.push(fragment.decl);
            }
        }
        log::debug!(
            "lowered {} declaration(s) into {} definition(s)",
            definitions.len(),
            specs.len()
        );
        let mut out = specs.join("\n\n");
        if !decls.is_empty() {
            if !out.is_empty() {
                out.push_str("\n\n");
            }
            out.push_str(&decls.join("\n"));
        }
        Ok(out.trim().to_string())
    }

    /// Lower one top-level declaration.
    pub fn lower_declaration(
        &self,
        declaration: &Declaration,
    ) -> Result<Fragment, UnsupportedConstructError> {
        self.lower_node(declaration, None)
    }

    fn lower_node(
        &self,
        declaration: &Declaration,
        parent: Option<&Ancestor>,
    ) -> Result<Fragment, UnsupportedConstructError> {
        match declaration {
            Declaration::Scalar(field) => {
                if let Some(attribute) = field.cryptographic_attribute {
                    return Err(UnsupportedConstructError::CryptographicField {
                        field: field.name.clone(),
                        attribute,
                    });
                }
                Ok(Fragment::field(format!(
                    "{}: {}",
                    self.ident(&field.name),
                    self.type_ref(&field.field_type)
                )))
            }
            Declaration::ConstantVector(field) => Ok(Fragment::field(format!(
                "{}: [{}; {}]",
                self.ident(&field.name),
                self.type_ref(&field.vector_type),
                field.vector_size
            ))),
            Declaration::VariableVector(field) => Ok(Fragment::field(format!(
                "{}: Vec<{}>",
                self.ident(&field.name),
                self.type_ref(&field.vector_type)
            ))),
            Declaration::ExternalEnum(enumeration) => {
                if let Some(parent) = parent {
                    return Err(nested_enum(enumeration.name.as_deref(), parent));
                }
                self.lower_external_enum(enumeration)
            }
            Declaration::InternalEnum(enumeration) => {
                if let Some(parent) = parent {
                    return Err(nested_enum(Some(&enumeration.name), parent));
                }
                Ok(self.lower_internal_enum(enumeration))
            }
            Declaration::NamedStructure(s) => self.lower_structure(Some(&s.name), &s.body, parent),
            Declaration::UnnamedStructure(s) => self.lower_structure(None, &s.body, parent),
        }
    }

    fn lower_structure(
        &self,
        name: Option<&str>,
        body: &StructureBody,
        parent: Option<&Ancestor>,
    ) -> Result<Fragment, UnsupportedConstructError> {
        let attribute = body.cryptographic_attribute;
        let this = Ancestor::new(name, attribute, parent);
        let spec_type = self.options.naming.structure_name(name, attribute, parent);
        log::trace!("lowering structure {}", spec_type);

        let mut specs = Vec::new();
        let mut members = Vec::new();
        for field in &body.fields {
            let fragment = self.lower_node(field, Some(&this))?;
            specs.extend(fragment.specs);
            members.push(fragment.decl);
        }
        if let Some(variant) = &body.structure_variant {
            let fragment = self.lower_variant(variant, &spec_type);
            specs.extend(fragment.specs);
            members.push(fragment.decl);
        }
        specs.push(render_struct(&self.ident(&spec_type), &members));

        let decl = match parent {
            None => String::new(),
            Some(_) => format!(
                "{}: {}",
                self.ident(naming::fieldname(name, attribute)),
                naming::wrap_reference(attribute, &self.ident(&spec_type))
            ),
        };
        Ok(Fragment { decl, specs })
    }

    /// Tagged union `<Owner>Variant` with one arm per case label; fallthrough labels share the
    /// group's payload type.
    fn lower_variant(&self, variant: &Variant, owner: &str) -> Fragment {
        let union_name = naming::variant_union(owner);
        let arms: Vec<String> = variant
            .variant_cases
            .iter()
            .flat_map(|group| {
                let payload = self.type_ref(&group.case_type);
                group
                    .cases
                    .iter()
                    .map(move |label| format!("{}({})", self.ident(label), payload))
            })
            .collect();
        log::trace!("select on {} -> {} ({} arms)", variant.variant_type, union_name, arms.len());
        Fragment {
            decl: format!(
                "{}: {}",
                self.ident(&variant.name),
                self.ident(&union_name)
            ),
            specs: vec![render_enum(None, &self.ident(&union_name), &arms)],
        }
    }

    fn lower_external_enum(
        &self,
        enumeration: &ExternalEnum,
    ) -> Result<Fragment, UnsupportedConstructError> {
        let name = enumeration
            .name
            .as_deref()
            .ok_or(UnsupportedConstructError::UnnamedEnum)?;
        let members: Vec<String> = enumeration
            .entries
            .iter()
            .map(|e| format!("{} = {}", self.ident(&e.name), e.value))
            .collect();
        let repr = match enumeration.width {
            Some(width) if self.options.enum_width_hints => {
                let largest = enumeration.entries.iter().map(|e| e.value).max().unwrap_or(0);
                Some(repr_for(width.max(largest)))
            }
            _ => None,
        };
        Ok(Fragment::definition(render_enum(repr, &self.ident(name), &members)))
    }

    fn lower_internal_enum(&self, enumeration: &InternalEnum) -> Fragment {
        let members: Vec<String> = enumeration
            .entries
            .iter()
            .map(|e| self.ident(&e.name).into_owned())
            .collect();
        Fragment::definition(render_enum(None, &self.ident(&enumeration.name), &members))
    }

    fn type_ref<'a>(&self, name: &'a str) -> Cow<'a, str> {
        self.ident(naming::target_type(name))
    }

    fn ident<'a>(&self, name: &'a str) -> Cow<'a, str> {
        if self.options.escape_keywords {
            naming::escape_ident(name)
        } else {
            Cow::Borrowed(name)
        }
    }
}

fn nested_enum(enumeration: Option<&str>, parent: &Ancestor) -> UnsupportedConstructError {
    UnsupportedConstructError::NestedEnum {
        enumeration: enumeration.unwrap_or("<anonymous>").to_string(),
        structure: parent.full.clone(),
    }
}

/// Smallest unsigned representation holding `value`.
fn repr_for(value: u64) -> &'static str {
    if value <= u64::from(u8::MAX) {
        "u8"
    } else if value <= u64::from(u16::MAX) {
        "u16"
    } else if value <= u64::from(u32::MAX) {
        "u32"
    } else {
        "u64"
    }
}

fn render_struct(name: &str, members: &[String]) -> String {
    if members.is_empty() {
        return format!("struct {} {{}}", name);
    }
    let mut out = format!("struct {} {{\n", name);
    for member in members {
        out.push_str(&format!("    {},\n", member));
    }
    out.push('}');
    out
}

fn render_enum(repr: Option<&str>, name: &str, members: &[String]) -> String {
    let mut out = String::new();
    if let Some(repr) = repr {
        out.push_str(&format!("#[repr({})]\n", repr));
    }
    out.push_str(&format!("enum {} {{\n", name));
    for member in members {
        out.push_str(&format!("    {},\n", member));
    }
    out.push('}');
    out
}
