use std::rc::Rc;

use indexmap::IndexMap;

use crate::ast::SymbolId;

use super::symbols::{Session, lookup_super_types};
use super::types::{ClassId, ConeType, Substitution, TypeParameter};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Classification {
    Classifier,
    Property,
    Function,
}

/// A declaration found by a scope lookup, together with the substitution
/// accumulated on the way through supertype scopes.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub symbol: SymbolId,
    pub substitution: Option<Rc<Substitution>>,
}

impl Candidate {
    pub fn plain(symbol: SymbolId) -> Self {
        Self {
            symbol,
            substitution: None,
        }
    }
}

/// Name-indexed declarations of one construct, kept in declaration order.
#[derive(Clone, Debug, Default)]
pub struct MemberTable {
    classifiers: IndexMap<String, Vec<SymbolId>>,
    properties: IndexMap<String, Vec<SymbolId>>,
    functions: IndexMap<String, Vec<SymbolId>>,
}

impl MemberTable {
    pub fn add(&mut self, classification: Classification, name: &str, symbol: SymbolId) {
        let entries = self.entries_mut(classification).entry(name.to_string()).or_default();
        if !entries.contains(&symbol) {
            entries.push(symbol);
        }
    }

    pub fn lookup(&self, classification: Classification, name: &str) -> &[SymbolId] {
        let map = match classification {
            Classification::Classifier => &self.classifiers,
            Classification::Property => &self.properties,
            Classification::Function => &self.functions,
        };
        map.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    fn entries_mut(&mut self, classification: Classification) -> &mut IndexMap<String, Vec<SymbolId>> {
        match classification {
            Classification::Classifier => &mut self.classifiers,
            Classification::Property => &mut self.properties,
            Classification::Function => &mut self.functions,
        }
    }
}

/// Mutable scope for function-local declarations, filled as the walk goes.
#[derive(Clone, Debug, Default)]
pub struct LocalScope {
    table: MemberTable,
}

impl LocalScope {
    pub fn store_declaration(&mut self, session: &Session, symbol: SymbolId) {
        let declaration = session.symbol(symbol);
        self.table
            .add(declaration.classification(), &declaration.name, symbol);
    }

    pub fn lookup(&self, classification: Classification, name: &str) -> Vec<Candidate> {
        self.table
            .lookup(classification, name)
            .iter()
            .map(|symbol| Candidate::plain(*symbol))
            .collect()
    }
}

#[derive(Clone, Debug)]
pub enum Scope {
    /// File-level declarations or the members a class declares itself.
    Declared(Rc<MemberTable>),
    Composite(Vec<Rc<Scope>>),
    Substitution {
        inner: Rc<Scope>,
        substitution: Rc<Substitution>,
    },
    /// Declared members layered over the composite of supertype scopes.
    UseSite {
        declared: Rc<MemberTable>,
        supertypes: Rc<Scope>,
    },
}

impl Scope {
    pub fn lookup_classifiers(&self, session: &Session, name: &str) -> Vec<Candidate> {
        self.lookup(session, Classification::Classifier, name)
    }

    pub fn lookup_properties(&self, session: &Session, name: &str) -> Vec<Candidate> {
        self.lookup(session, Classification::Property, name)
    }

    pub fn lookup_functions(&self, session: &Session, name: &str) -> Vec<Candidate> {
        self.lookup(session, Classification::Function, name)
    }

    pub fn lookup(&self, session: &Session, classification: Classification, name: &str) -> Vec<Candidate> {
        let mut out = Vec::new();
        self.process(session, classification, name, &mut out);
        out
    }

    fn process(&self, session: &Session, classification: Classification, name: &str, out: &mut Vec<Candidate>) {
        match self {
            Scope::Declared(table) => {
                for symbol in table.lookup(classification, name) {
                    push_unique(out, Candidate::plain(*symbol));
                }
            }
            Scope::Composite(scopes) => {
                for scope in scopes {
                    scope.process(session, classification, name, out);
                }
            }
            Scope::Substitution {
                inner,
                substitution,
            } => {
                for candidate in inner.lookup(session, classification, name) {
                    let combined = match &candidate.substitution {
                        Some(existing) => Rc::new(existing.then(substitution)),
                        None => substitution.clone(),
                    };
                    push_unique(
                        out,
                        Candidate {
                            symbol: candidate.symbol,
                            substitution: Some(combined),
                        },
                    );
                }
            }
            Scope::UseSite {
                declared,
                supertypes,
            } => {
                let own = declared.lookup(classification, name);
                for symbol in own {
                    push_unique(out, Candidate::plain(*symbol));
                }
                for candidate in supertypes.lookup(session, classification, name) {
                    if !is_overridden(session, own, candidate.symbol) {
                        push_unique(out, candidate);
                    }
                }
            }
        }
    }
}

fn push_unique(out: &mut Vec<Candidate>, candidate: Candidate) {
    if !out.iter().any(|existing| existing.symbol == candidate.symbol) {
        out.push(candidate);
    }
}

/// A declared member hides an inherited one of the same kind and shape.
fn is_overridden(session: &Session, own: &[SymbolId], inherited: SymbolId) -> bool {
    let inherited = session.symbol(inherited);
    own.iter().any(|symbol| {
        let declared = session.symbol(*symbol);
        declared.classification() == inherited.classification()
            && declared.parameter_count() == inherited.parameter_count()
            && declared.receiver().is_some() == inherited.receiver().is_some()
    })
}

/// One level of the tower: either a shared scope or a function-local one.
#[derive(Clone, Copy, Debug)]
pub enum ScopeRef<'a> {
    Scope(&'a Scope),
    Local(&'a LocalScope),
}

impl ScopeRef<'_> {
    pub fn lookup(&self, session: &Session, classification: Classification, name: &str) -> Vec<Candidate> {
        match self {
            ScopeRef::Scope(scope) => scope.lookup(session, classification, name),
            ScopeRef::Local(scope) => scope.lookup(classification, name),
        }
    }
}

pub fn build_use_site_scope(session: &Session, class: SymbolId) -> Rc<Scope> {
    let mut expanding = Vec::new();
    use_site_scope(session, class, &mut expanding)
}

fn use_site_scope(session: &Session, class: SymbolId, expanding: &mut Vec<SymbolId>) -> Rc<Scope> {
    expanding.push(class);
    let mut super_scopes = Vec::new();
    for super_type in lookup_super_types(session, class, true, false) {
        let Some(class_id) = super_type.class_id() else {
            continue;
        };
        let Some((super_id, super_symbol)) = session.class_symbol(class_id) else {
            continue;
        };
        if expanding.contains(&super_id) {
            tracing::warn!(class = %class_id, "supertype cycle, skipping inherited scope");
            continue;
        }
        let scope = use_site_scope(session, super_id, expanding);
        let scope = build_substitution_scope(&super_type, scope.clone(), &super_symbol.type_parameters)
            .unwrap_or(scope);
        super_scopes.push(scope);
    }
    expanding.pop();
    Rc::new(Scope::UseSite {
        declared: session.declared_scope(class),
        supertypes: Rc::new(Scope::Composite(super_scopes)),
    })
}

/// `None` when the use site supplies no type arguments, so the raw scope is shared.
pub fn build_substitution_scope(
    use_site_type: &ConeType,
    unsubstituted: Rc<Scope>,
    type_parameters: &[TypeParameter],
) -> Option<Rc<Scope>> {
    let args = use_site_type.type_arguments();
    if args.is_empty() {
        return None;
    }
    let substitution = Substitution::new(type_parameters, args);
    if substitution.is_empty() {
        return None;
    }
    Some(Rc::new(Scope::Substitution {
        inner: unsubstituted,
        substitution: Rc::new(substitution),
    }))
}

/// Member scope of a type; type parameters see the union of their bounds.
pub fn type_scope(session: &Session, ty: &ConeType, type_parameters: &[TypeParameter]) -> Option<Rc<Scope>> {
    match ty {
        ConeType::Class { class, .. } => class_type_scope(session, class, ty),
        ConeType::TypeParameter { name, .. } => {
            let param = type_parameters.iter().rev().find(|param| &param.name == name)?;
            let scopes = param
                .bounds
                .iter()
                .filter_map(|bound| type_scope(session, bound, type_parameters))
                .collect();
            Some(Rc::new(Scope::Composite(scopes)))
        }
    }
}

fn class_type_scope(session: &Session, class: &ClassId, ty: &ConeType) -> Option<Rc<Scope>> {
    let (symbol, class_symbol) = session.class_symbol(class)?;
    let scope = build_use_site_scope(session, symbol);
    Some(build_substitution_scope(ty, scope.clone(), &class_symbol.type_parameters).unwrap_or(scope))
}
