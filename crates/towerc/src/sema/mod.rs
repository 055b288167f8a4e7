pub mod body;
pub mod checker;
pub mod labels;
pub mod scope;
pub mod symbols;
pub mod tower;
pub mod types;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tower_rt::config::{env_key, env_override};
use tower_rt::error::RtError;

use crate::ast::{ExprId, Program};
use crate::diag::{Diag, Diagnostics};

use self::types::TypeRef;

pub const DEFAULT_INVOKE_NAME: &str = "invoke";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Name of the call operator tried when a variable is called like a function.
    pub invoke_name: String,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            invoke_name: DEFAULT_INVOKE_NAME.to_string(),
        }
    }
}

impl ResolveOptions {
    pub fn from_env() -> Result<Self, RtError> {
        let mut options = Self::default();
        options.apply_env()?;
        Ok(options)
    }

    /// Layers `TOWER_RESOLVE_INVOKE_NAME` over the current values.
    pub fn apply_env(&mut self) -> Result<(), RtError> {
        let Some(name) = env_override("resolve", "invoke-name") else {
            return Ok(());
        };
        if !is_identifier(&name) {
            return Err(RtError::InvalidEnv {
                key: env_key("resolve", "invoke-name"),
                value: name,
            });
        }
        self.invoke_name = name;
        Ok(())
    }
}

pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {
            chars.all(|ch| ch.is_alphanumeric() || ch == '_')
        }
        _ => false,
    }
}

/// Resolved type of every expression, keyed by expression id.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BindingTable {
    types: BTreeMap<ExprId, TypeRef>,
}

impl BindingTable {
    pub fn insert(&mut self, id: ExprId, ty: TypeRef) {
        self.types.insert(id, ty);
    }

    pub fn get(&self, id: ExprId) -> Option<&TypeRef> {
        self.types.get(&id)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ExprId, &TypeRef)> {
        self.types.iter().map(|(id, ty)| (*id, ty))
    }
}

pub struct Analysis {
    pub session: symbols::Session,
    pub bindings: BindingTable,
}

pub fn analyze_program(program: &mut Program, options: &ResolveOptions) -> (Analysis, Vec<Diag>) {
    let mut diags = Diagnostics::default();
    let mut session = symbols::Session::new();
    symbols::collect(program, &mut session, &mut diags);
    let bindings = {
        let mut resolver = body::BodyResolver::new(&mut session, options, &mut diags);
        resolver.resolve_program(program);
        resolver.into_bindings()
    };
    tracing::debug!(
        symbols = session.len(),
        expressions = bindings.len(),
        "body resolution finished"
    );
    (Analysis { session, bindings }, diags.into_vec())
}

/// Ids of expressions left without a type, or with one still implicit.
pub fn verify_bindings(program: &Program, bindings: &BindingTable) -> Vec<ExprId> {
    let mut missing = Vec::new();
    crate::ast::walk_exprs(program, &mut |expr| match bindings.get(expr.id) {
        Some(ty) if !ty.is_implicit() => {}
        _ => missing.push(expr.id),
    });
    missing
}
