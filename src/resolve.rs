//! Validation pass over a parsed unit: name uniqueness, vector bounds and select coverage.

use crate::ast::*;
use crate::naming::{self, Ancestor, NamingScheme};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("duplicate name `{name}` in {scope}")]
    DuplicateName { scope: String, name: String },
    #[error("vector `{field}`: floor {floor} exceeds ceiling {ceiling}")]
    InvalidBounds {
        field: String,
        floor: u64,
        ceiling: u64,
    },
    #[error("select in {structure}: `{label}` is not a member of {selector}")]
    UnknownCaseLabel {
        structure: String,
        selector: String,
        label: String,
    },
    #[error("type `{name}` generated for {origin} clashes with another type of that name")]
    GeneratedNameClash { name: String, origin: String },
    #[error("select in {structure} does not cover {selector} member(s): {}", missing.join(", "))]
    NonExhaustiveVariant {
        structure: String,
        selector: String,
        missing: Vec<String>,
    },
}

/// Validated unit with its top-level types indexed by name.
#[derive(Debug, Clone)]
pub struct ResolvedUnit {
    pub definitions: Definitions,
    types_by_name: HashMap<String, usize>,
}

impl ResolvedUnit {
    pub fn resolve(definitions: Definitions) -> Result<Self, ResolveError> {
        Self::resolve_with(definitions, NamingScheme::default())
    }

    /// Like [`resolve`](Self::resolve), with generated structure and union names derived under
    /// `naming`.
    pub fn resolve_with(
        definitions: Definitions,
        naming: NamingScheme,
    ) -> Result<Self, ResolveError> {
        let mut types_by_name = HashMap::new();
        for (i, declaration) in definitions.iter().enumerate() {
            if let Some(name) = declaration.type_name() {
                types_by_name.entry(name.to_string()).or_insert(i);
            }
        }
        let resolved = ResolvedUnit {
            definitions,
            types_by_name,
        };
        let mut checker = Checker {
            unit: &resolved,
            naming,
            type_names: HashMap::new(),
        };
        checker.check_definitions(&resolved.definitions, UNIT, None)?;
        log::debug!(
            "resolved {} top-level type(s)",
            resolved.types_by_name.len()
        );
        Ok(resolved)
    }

    /// Top-level type declared under `name`.
    pub fn get_type(&self, name: &str) -> Option<&Declaration> {
        self.types_by_name
            .get(name)
            .map(|&i| &self.definitions.declarations[i])
    }

    /// Member names of the top-level enum `name`, in declaration order.
    pub fn enum_members(&self, name: &str) -> Option<Vec<&str>> {
        match self.get_type(name)? {
            Declaration::ExternalEnum(e) => Some(e.entries.iter().map(|m| m.name.as_str()).collect()),
            Declaration::InternalEnum(e) => Some(e.entries.iter().map(|m| m.name.as_str()).collect()),
            _ => None,
        }
    }
}

const UNIT: &str = "the compilation unit";

struct Checker<'a> {
    unit: &'a ResolvedUnit,
    naming: NamingScheme,
    /// Every type name the output will define, at any depth, with the construct that generated
    /// it when it is not written in the source.
    type_names: HashMap<String, Option<String>>,
}

impl Checker<'_> {
    fn check_definitions(
        &mut self,
        definitions: &Definitions,
        scope: &str,
        parent: Option<&Ancestor>,
    ) -> Result<(), ResolveError> {
        check_scope(&definitions.scope, scope)?;
        for declaration in definitions {
            match declaration {
                Declaration::VariableVector(field) => {
                    let VectorBounds { floor, ceiling } = field.vector_bounds;
                    if floor > ceiling {
                        return Err(ResolveError::InvalidBounds {
                            field: field.name.clone(),
                            floor,
                            ceiling,
                        });
                    }
                }
                Declaration::ExternalEnum(e) => {
                    if let Some(name) = &e.name {
                        self.claim(name, None)?;
                    }
                    let label = format!("enum {}", e.name.as_deref().unwrap_or("<anonymous>"));
                    check_scope(&e.scope, &label)?;
                }
                Declaration::InternalEnum(e) => {
                    self.claim(&e.name, None)?;
                    check_scope(&e.scope, &format!("enum {}", e.name))?
                }
                Declaration::NamedStructure(s) => {
                    self.check_structure(Some(&s.name), &s.body, scope, parent)?
                }
                Declaration::UnnamedStructure(s) => {
                    self.check_structure(None, &s.body, scope, parent)?
                }
                Declaration::Scalar(_) | Declaration::ConstantVector(_) => {}
            }
        }
        Ok(())
    }

    fn check_structure(
        &mut self,
        name: Option<&str>,
        body: &StructureBody,
        scope: &str,
        parent: Option<&Ancestor>,
    ) -> Result<(), ResolveError> {
        let attribute = body.cryptographic_attribute;
        let emitted = self.naming.structure_name(name, attribute, parent);
        let label = match name {
            Some(name) => {
                self.claim(name, None)?;
                name.to_string()
            }
            None => {
                self.claim(&emitted, Some(format!("anonymous structure in {}", scope)))?;
                format!("anonymous {}", naming::typename(None, attribute, ""))
            }
        };
        let this = Ancestor::new(name, attribute, parent);
        self.check_definitions(&body.fields, &format!("struct {}", label), Some(&this))?;
        if let Some(variant) = &body.structure_variant {
            self.claim(
                &naming::variant_union(&emitted),
                Some(format!("select in struct {}", label)),
            )?;
            self.check_variant(&label, variant)?;
        }
        Ok(())
    }

    /// Reserve a type name for the whole unit. `origin` describes generated names.
    fn claim(&mut self, name: &str, origin: Option<String>) -> Result<(), ResolveError> {
        match self.type_names.get(name) {
            None => {
                self.type_names.insert(name.to_string(), origin);
                Ok(())
            }
            Some(earlier) => match origin.or_else(|| earlier.clone()) {
                Some(origin) => Err(ResolveError::GeneratedNameClash {
                    name: name.to_string(),
                    origin,
                }),
                None => Err(ResolveError::DuplicateName {
                    scope: UNIT.to_string(),
                    name: name.to_string(),
                }),
            },
        }
    }

    fn check_variant(&self, structure: &str, variant: &Variant) -> Result<(), ResolveError> {
        check_scope(&variant.scope, &format!("select in struct {}", structure))?;
        let members = match self.unit.enum_members(&variant.variant_type) {
            Some(members) => members,
            None => {
                log::debug!(
                    "select in {} on `{}`: not an enum of this unit, coverage unchecked",
                    structure,
                    variant.variant_type
                );
                return Ok(());
            }
        };
        if let Some(label) = variant.labels().find(|l| !members.contains(l)) {
            return Err(ResolveError::UnknownCaseLabel {
                structure: structure.to_string(),
                selector: variant.variant_type.clone(),
                label: label.to_string(),
            });
        }
        let missing: Vec<String> = members
            .iter()
            .filter(|m| !variant.scope.contains(m))
            .map(|m| m.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ResolveError::NonExhaustiveVariant {
                structure: structure.to_string(),
                selector: variant.variant_type.clone(),
                missing,
            });
        }
        Ok(())
    }
}

fn check_scope(scope: &Scope, label: &str) -> Result<(), ResolveError> {
    match scope.duplicates().first() {
        Some(name) => Err(ResolveError::DuplicateName {
            scope: label.to_string(),
            name: name.to_string(),
        }),
        None => Ok(()),
    }
}
