use std::rc::Rc;

use crate::ast::{
    Block, CalleeReference, ClassDecl, Declaration, Expr, ExprId, ExprKind, File, FunctionCall,
    FunctionDecl, Literal, Program, QualifiedAccess, ResolutionError, StmtKind, SymbolId,
    VariableDecl, WhenBranch,
};
use crate::diag::Diagnostics;
use crate::span::Span;

use super::checker::{Applicability, CallSite, Checker};
use super::labels::LabelTable;
use super::scope::{Candidate, LocalScope, Scope, ScopeRef, build_use_site_scope, type_scope};
use super::symbols::Session;
use super::tower::run_tower_resolver;
use super::types::{
    self, ClassId, ConeType, Substitution, TypeParameter, TypeRef, common_super_type,
};
use super::{BindingTable, ResolveOptions};

/// Single walk that resolves references and assigns types.
pub struct BodyResolver<'a> {
    session: &'a mut Session,
    options: &'a ResolveOptions,
    diags: &'a mut Diagnostics,
    tower: Vec<Level>,
    type_parameters: Vec<TypeParameter>,
    return_types: Vec<TypeRef>,
    labels: LabelTable,
    bindings: BindingTable,
    file_name: Option<String>,
}

/// One entry of the lexical scope stack, outermost first.
enum Level {
    Shared(Rc<Scope>),
    Local(LocalScope),
}

/// Outcome of resolving one callee name.
struct Resolved {
    callee: CalleeReference,
    candidate: Option<Candidate>,
}

impl<'a> BodyResolver<'a> {
    pub fn new(session: &'a mut Session, options: &'a ResolveOptions, diags: &'a mut Diagnostics) -> Self {
        Self {
            session,
            options,
            diags,
            tower: Vec::new(),
            type_parameters: Vec::new(),
            return_types: Vec::new(),
            labels: LabelTable::default(),
            bindings: BindingTable::default(),
            file_name: None,
        }
    }

    pub fn into_bindings(self) -> BindingTable {
        self.bindings
    }

    pub fn scope_depth(&self) -> usize {
        self.tower.len()
    }

    pub fn resolve_program(&mut self, program: &mut Program) {
        for file in &mut program.files {
            self.resolve_file(file);
        }
    }

    pub fn resolve_file(&mut self, file: &mut File) {
        tracing::debug!(file = %file.name, package = %file.package, "resolving file");
        self.file_name = Some(file.name.clone());
        let top_level = self.session.top_level_scope(&file.package);
        self.with_cleanup(Self::tower_stack, |this| {
            this.tower.push(Level::Shared(Rc::new(Scope::Declared(top_level))));
            for decl in &mut file.declarations {
                this.resolve_declaration(decl);
            }
        });
        self.file_name = None;
    }

    /// Runs `f` and truncates `stack` back to its entry depth afterwards.
    fn with_cleanup<S, T>(
        &mut self,
        stack: fn(&mut Self) -> &mut Vec<S>,
        f: impl FnOnce(&mut Self) -> T,
    ) -> T {
        let before = stack(self).len();
        let result = f(self);
        let entries = stack(self);
        assert!(
            entries.len() >= before,
            "scope stack shrank below its entry depth: {} < {before}",
            entries.len()
        );
        entries.truncate(before);
        result
    }

    fn tower_stack(&mut self) -> &mut Vec<Level> {
        &mut self.tower
    }

    fn with_local_scope<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.with_cleanup(Self::tower_stack, |this| {
            this.tower.push(Level::Local(LocalScope::default()));
            f(this)
        })
    }

    fn type_parameter_stack(&mut self) -> &mut Vec<TypeParameter> {
        &mut self.type_parameters
    }

    fn with_label<T>(&mut self, label: &str, ty: ConeType, f: impl FnOnce(&mut Self) -> T) -> T {
        self.labels.push(label, ty.clone());
        let result = f(self);
        self.labels.remove(label, &ty);
        result
    }

    fn store_local(&mut self, symbol: SymbolId) {
        let innermost = self.tower.iter_mut().rev().find_map(|level| match level {
            Level::Local(scope) => Some(scope),
            Level::Shared(_) => None,
        });
        if let Some(scope) = innermost {
            scope.store_declaration(&*self.session, symbol);
        }
    }

    fn error(&mut self, span: Span, message: String) {
        match &self.file_name {
            Some(path) => self.diags.error_at_path(path.clone(), span, message),
            None => self.diags.error(span, message),
        }
    }

    fn resolve_declaration(&mut self, decl: &mut Declaration) {
        match decl {
            Declaration::Class(class) => self.resolve_class(class),
            Declaration::Function(function) => self.resolve_function(function),
            Declaration::Property(variable) => self.resolve_variable(variable, false),
        }
    }

    fn resolve_class(&mut self, class: &mut ClassDecl) {
        let default_type = match self.session.symbol(class.symbol).as_class() {
            Some(symbol) => symbol.default_type(),
            None => ConeType::class(ClassId(class.name.clone()), Vec::new()),
        };
        let use_site = build_use_site_scope(self.session, class.symbol);
        let label = class.name.clone();
        self.with_cleanup(Self::tower_stack, |this| {
            this.tower.push(Level::Shared(use_site));
            this.with_cleanup(Self::type_parameter_stack, |this| {
                this.type_parameters.extend(class.type_parameters.iter().cloned());
                this.with_label(&label, default_type, |this| {
                    for member in &mut class.members {
                        this.resolve_declaration(member);
                    }
                });
            });
        });
    }

    fn resolve_function(&mut self, function: &mut FunctionDecl) {
        let receiver = function.receiver.as_ref().and_then(TypeRef::cone).cloned();
        match receiver {
            Some(receiver) => {
                let name = function.name.clone();
                self.with_label(&name, receiver.clone(), |this| {
                    this.resolve_function_with_receiver(function, Some(&receiver));
                });
            }
            None => self.resolve_function_with_receiver(function, None),
        }
    }

    fn resolve_function_with_receiver(&mut self, function: &mut FunctionDecl, receiver: Option<&ConeType>) {
        self.with_cleanup(Self::tower_stack, |this| {
            this.with_cleanup(Self::type_parameter_stack, |this| {
                this.type_parameters.extend(function.type_parameters.iter().cloned());
                if let Some(receiver) = receiver {
                    if let Some(scope) = type_scope(this.session, receiver, &this.type_parameters) {
                        this.tower.push(Level::Shared(scope));
                    }
                }
                this.with_local_scope(|this| this.resolve_function_body(function));
            });
        });
    }

    fn resolve_function_body(&mut self, function: &mut FunctionDecl) {
        for param in &mut function.parameters {
            if let Some(default) = &mut param.default {
                let expected = param.ty.clone();
                self.resolve_expr(default, Some(&expected));
            }
            self.store_local(param.symbol);
        }

        let declared = function.return_type.clone();
        self.return_types.push(declared.clone());
        let body_type = function
            .body
            .as_mut()
            .map(|body| self.resolve_block(body, Some(&declared)));
        self.return_types.pop();

        if declared.is_implicit() {
            let inferred = match body_type {
                Some(ty) => ty,
                None => TypeRef::Error(format!(
                    "cannot infer return type of `{}` without a body",
                    function.name
                )),
            };
            tracing::debug!(function = %function.name, ty = %inferred, "inferred return type");
            function.return_type = inferred.clone();
            self.session.set_return_type(function.symbol, inferred);
        }
    }

    fn resolve_variable(&mut self, variable: &mut VariableDecl, local: bool) {
        let declared = variable.return_type.clone();
        if let Some(init) = &mut variable.initializer {
            self.resolve_expr(init, Some(&declared));
        }
        if let Some(delegate) = &mut variable.delegate {
            self.resolve_expr(delegate, None);
        }
        if declared.is_implicit() {
            if let Some(init) = &variable.initializer {
                let inferred = self.type_of(init.id);
                variable.return_type = inferred.clone();
                self.session.set_return_type(variable.symbol, inferred);
            } else if variable.delegate.is_some() {
                tracing::debug!(variable = %variable.name, "delegated declaration left un-inferred");
            } else {
                let ty = TypeRef::Error(format!(
                    "cannot infer type of `{}` without an initializer",
                    variable.name
                ));
                variable.return_type = ty.clone();
                self.session.set_return_type(variable.symbol, ty);
            }
        }
        if local {
            self.store_local(variable.symbol);
        }
    }

    /// Resolves a block in a fresh local scope and returns its result type.
    fn resolve_block(&mut self, block: &mut Block, expected: Option<&TypeRef>) -> TypeRef {
        self.with_local_scope(|this| this.resolve_statements(block, expected))
    }

    fn resolve_statements(&mut self, block: &mut Block, expected: Option<&TypeRef>) -> TypeRef {
        let count = block.stmts.len();
        for (index, stmt) in block.stmts.iter_mut().enumerate() {
            let trailing = index + 1 == count;
            match &mut stmt.kind {
                StmtKind::Expr(expr) => {
                    self.resolve_expr(expr, if trailing { expected } else { None });
                }
                StmtKind::Variable(variable) => self.resolve_variable(variable, true),
                StmtKind::Function(function) => {
                    self.store_local(function.symbol);
                    self.resolve_function(function);
                }
                StmtKind::Class(class) => {
                    self.store_local(class.symbol);
                    self.resolve_class(class);
                }
                StmtKind::Return(value) => {
                    if let Some(value) = value {
                        let expected = self.return_types.last().cloned();
                        self.resolve_expr(value, expected.as_ref());
                    }
                }
                StmtKind::While { cond, body } => {
                    self.resolve_expr(cond, None);
                    self.resolve_block(body, None);
                }
                StmtKind::DoWhile { body, cond } => {
                    // The condition sees the body's locals.
                    self.with_local_scope(|this| {
                        this.resolve_statements(body, None);
                        this.resolve_expr(cond, None);
                    });
                }
            }
        }
        match block.stmts.last().map(|stmt| &stmt.kind) {
            Some(StmtKind::Return(Some(value))) | Some(StmtKind::Expr(value)) => self.type_of(value.id),
            _ => TypeRef::builtin(types::UNIT),
        }
    }

    fn type_of(&self, id: ExprId) -> TypeRef {
        self.bindings.get(id).cloned().unwrap_or_else(|| {
            TypeRef::Error(format!("expression #{} has no resolved type", id.0))
        })
    }

    fn record(&mut self, id: ExprId, ty: TypeRef) {
        self.bindings.insert(id, ty);
    }

    fn resolve_expr(&mut self, expr: &mut Expr, expected: Option<&TypeRef>) {
        let id = expr.id;
        let span = expr.span;
        match &mut expr.kind {
            ExprKind::Const(literal) => {
                let ty = self.const_type(literal, expected);
                self.record(id, ty);
            }
            ExprKind::Access(access) => self.resolve_access(id, span, access),
            ExprKind::Call(call) => self.resolve_call(id, span, call),
            ExprKind::When(branches) => {
                let ty = self.resolve_when(branches, expected);
                self.record(id, ty);
            }
            ExprKind::Block(block) => {
                let ty = self.resolve_block(block, expected);
                self.record(id, ty);
            }
        }
    }

    /// An explicit expected type wins; otherwise the literal maps to its builtin class.
    fn const_type(&self, literal: &Literal, expected: Option<&TypeRef>) -> TypeRef {
        if let Some(ty) = expected.filter(|ty| !ty.is_implicit()) {
            return ty.clone();
        }
        let name = match literal {
            Literal::Null => types::NOTHING,
            Literal::Boolean(_) => types::BOOLEAN,
            Literal::Char(_) => types::CHAR,
            Literal::Byte(_) => types::BYTE,
            Literal::Short(_) => types::SHORT,
            Literal::Int(_) => types::INT,
            Literal::Long(_) => types::LONG,
            Literal::Float(_) => types::FLOAT,
            Literal::Double(_) => types::DOUBLE,
            Literal::String(_) => types::STRING,
        };
        let class = ClassId::builtin(name);
        if self.session.lookup_class(&class).is_none() {
            return TypeRef::Error(format!("builtin class {class} is not available"));
        }
        TypeRef::Resolved(ConeType::Class {
            class,
            args: Vec::new(),
            nullable: matches!(literal, Literal::Null),
        })
    }

    fn resolve_when(&mut self, branches: &mut [WhenBranch], expected: Option<&TypeRef>) -> TypeRef {
        let mut results = Vec::new();
        for branch in branches.iter_mut() {
            if let Some(cond) = &mut branch.cond {
                self.resolve_expr(cond, None);
            }
            self.resolve_expr(&mut branch.result, expected);
            results.push(self.type_of(branch.result.id));
        }
        common_super_type(&results).unwrap_or_else(|| TypeRef::builtin(types::UNIT))
    }

    fn explicit_receiver_type(&mut self, receiver: &mut Option<Box<Expr>>) -> Option<TypeRef> {
        let receiver = receiver.as_mut()?;
        self.resolve_expr(receiver, None);
        Some(self.type_of(receiver.id))
    }

    fn resolve_access(&mut self, id: ExprId, span: Span, access: &mut QualifiedAccess) {
        if let CalleeReference::This { label } = &access.callee {
            let ty = match self.labels.lookup(label.as_deref()) {
                Some(ty) => TypeRef::Resolved(ty.clone()),
                None => {
                    let error = ResolutionError::UnresolvedLabel {
                        label: label.clone(),
                    };
                    self.error(span, error.to_string());
                    TypeRef::Error(error.to_string())
                }
            };
            self.record(id, ty);
            return;
        }

        let receiver_type = self.explicit_receiver_type(&mut access.explicit_receiver);
        let name = match &access.callee {
            CalleeReference::Simple { name } => name.clone(),
            callee => {
                let ty = self.type_from_callee(callee, &[]);
                self.record(id, ty);
                return;
            }
        };

        let site = CallSite {
            explicit_receiver: receiver_type,
            argument_count: 0,
        };
        let mut checkers = vec![Checker::variable(&name, site)];
        let winner = self.run_tower(&mut checkers);
        let resolved = self.create_resolved_reference(&name, span, winner.map(|index| &checkers[index]));
        let ty = self.type_from_resolution(&resolved, &[]);
        access.callee = resolved.callee.with_type(&ty);
        self.record(id, ty);
    }

    fn resolve_call(&mut self, id: ExprId, span: Span, call: &mut FunctionCall) {
        let receiver_type = self.explicit_receiver_type(&mut call.explicit_receiver);
        for arg in &mut call.arguments {
            self.resolve_expr(arg, None);
        }

        let name = match &call.callee {
            CalleeReference::Simple { name } => name.clone(),
            callee => {
                let ty = self.type_from_callee(callee, &call.type_arguments);
                self.record(id, ty);
                return;
            }
        };

        let site = CallSite {
            explicit_receiver: receiver_type,
            argument_count: call.arguments.len(),
        };
        let mut checkers = vec![
            Checker::function(&name, site.clone()),
            Checker::variable_invoke(&name, &self.options.invoke_name, site.clone()),
            Checker::classifier(&name, site),
        ];
        let winner = self.run_tower(&mut checkers).map(|index| &checkers[index]);
        let success = winner.filter(|checker| checker.applicability().is_success());

        if let Some(Checker::VariableInvoke(invoke)) = success {
            let options = self.options;
            let variable_candidates = invoke.variable_candidates();
            let resolved = self.create_resolved_reference(&options.invoke_name, span, success);
            let variable =
                self.resolve_candidates(&name, span, Applicability::Resolved, variable_candidates);
            let ty = self.type_from_resolution(&resolved, &call.type_arguments);
            self.rewrite_as_invoke(call, span, resolved.callee.with_type(&ty), variable);
            self.record(id, ty);
            return;
        }

        if let Some(Checker::Classifier(_)) = success {
            let resolved = self.create_resolved_reference(&name, span, success);
            let ty = match &resolved.candidate {
                Some(candidate) => self.constructor_type(candidate.symbol, &call.type_arguments),
                None => self.type_from_resolution(&resolved, &[]),
            };
            call.callee = resolved.callee.with_type(&ty);
            self.record(id, ty);
            return;
        }

        // Unresolved calls are reported against the plain function reading.
        let checker = match winner {
            Some(checker) if checker.applicability() > Applicability::Hidden => checker,
            _ => &checkers[0],
        };
        let resolved = self.create_resolved_reference(&name, span, Some(checker));
        let ty = self.type_from_resolution(&resolved, &call.type_arguments);
        call.callee = resolved.callee.with_type(&ty);
        self.record(id, ty);
    }

    /// `x(args)` becomes `x.invoke(args)` with `x` as a resolved access.
    fn rewrite_as_invoke(&mut self, call: &mut FunctionCall, span: Span, invoke: CalleeReference, variable: Resolved) {
        let receiver_id = self.session.fresh_expr_id();
        let receiver_type = self.type_from_resolution(&variable, &[]);
        let receiver = Expr {
            id: receiver_id,
            kind: ExprKind::Access(QualifiedAccess {
                callee: variable.callee.with_type(&receiver_type),
                explicit_receiver: call.explicit_receiver.take(),
                safe: call.safe,
            }),
            span,
        };
        self.record(receiver_id, receiver_type);
        call.callee = invoke;
        call.explicit_receiver = Some(Box::new(receiver));
    }

    fn run_tower(&self, checkers: &mut [Checker]) -> Option<usize> {
        let tower: Vec<ScopeRef<'_>> = self
            .tower
            .iter()
            .map(|level| match level {
                Level::Shared(scope) => ScopeRef::Scope(scope.as_ref()),
                Level::Local(scope) => ScopeRef::Local(scope),
            })
            .collect();
        run_tower_resolver(&*self.session, &tower, &self.type_parameters, checkers)
    }

    fn create_resolved_reference(&mut self, name: &str, span: Span, checker: Option<&Checker>) -> Resolved {
        match checker {
            Some(checker) => {
                let candidates = checker.success_candidates();
                self.resolve_candidates(name, span, checker.applicability(), candidates)
            }
            None => self.resolve_candidates(name, span, Applicability::Hidden, Vec::new()),
        }
    }

    fn resolve_candidates(
        &mut self,
        name: &str,
        span: Span,
        applicability: Applicability,
        mut candidates: Vec<Candidate>,
    ) -> Resolved {
        let paths = |session: &Session, candidates: &[Candidate]| {
            candidates
                .iter()
                .map(|candidate| session.symbol(candidate.symbol).path.clone())
                .collect::<Vec<_>>()
        };
        let error = if candidates.is_empty() || applicability == Applicability::Hidden {
            ResolutionError::UnresolvedName {
                name: name.to_string(),
            }
        } else if !applicability.is_success() {
            ResolutionError::ParameterMapping {
                name: name.to_string(),
                candidates: paths(&*self.session, &candidates),
            }
        } else if candidates.len() > 1 {
            ResolutionError::Ambiguity {
                name: name.to_string(),
                candidates: paths(&*self.session, &candidates),
            }
        } else {
            let candidate = candidates.remove(0);
            let symbol = self.session.symbol(candidate.symbol);
            tracing::trace!(name, path = %symbol.path, "resolved reference");
            return Resolved {
                callee: CalleeReference::Resolved {
                    name: name.to_string(),
                    symbol: candidate.symbol,
                    path: symbol.path.clone(),
                    ty: TypeRef::Implicit,
                },
                candidate: Some(candidate),
            };
        };
        tracing::debug!(name, %error, "reference left unresolved");
        self.error(span, error.to_string());
        Resolved {
            callee: CalleeReference::Error {
                name: name.to_string(),
                error,
            },
            candidate: None,
        }
    }

    fn type_from_resolution(&self, resolved: &Resolved, type_arguments: &[ConeType]) -> TypeRef {
        match &resolved.candidate {
            Some(candidate) => self.candidate_type(candidate, type_arguments),
            None => self.type_from_callee(&resolved.callee, type_arguments),
        }
    }

    /// Type of an already rewritten callee. A recorded type is reused as-is;
    /// trees written without one fall back to the symbol's declared type.
    fn type_from_callee(&self, callee: &CalleeReference, type_arguments: &[ConeType]) -> TypeRef {
        match callee {
            CalleeReference::Error { error, .. } => TypeRef::Error(error.to_string()),
            CalleeReference::Resolved { ty, .. } if !ty.is_implicit() => ty.clone(),
            CalleeReference::Resolved { symbol, .. } => {
                let symbol = *symbol;
                if self.session.symbol(symbol).as_class().is_some() {
                    return self.constructor_type(symbol, type_arguments);
                }
                self.candidate_type(&Candidate::plain(symbol), type_arguments)
            }
            CalleeReference::Simple { name } => TypeRef::Error(
                ResolutionError::UnresolvedName { name: name.clone() }.to_string(),
            ),
            CalleeReference::This { label } => TypeRef::Error(
                ResolutionError::UnresolvedLabel {
                    label: label.clone(),
                }
                .to_string(),
            ),
        }
    }

    fn candidate_type(&self, candidate: &Candidate, type_arguments: &[ConeType]) -> TypeRef {
        let mut ty = self.session.candidate_type(candidate);
        if let Some(function) = self.session.symbol(candidate.symbol).as_function() {
            if !type_arguments.is_empty() {
                ty = Substitution::new(&function.type_parameters, type_arguments).apply_ref(&ty);
            }
        }
        if ty.is_implicit() {
            let symbol = self.session.symbol(candidate.symbol);
            return TypeRef::Error(format!(
                "type of `{}` is not inferred yet",
                symbol.path
            ));
        }
        ty
    }

    fn constructor_type(&self, class: SymbolId, type_arguments: &[ConeType]) -> TypeRef {
        match self.session.symbol(class).as_class() {
            Some(symbol) => TypeRef::Resolved(ConeType::class(symbol.id.clone(), type_arguments.to_vec())),
            None => TypeRef::Error(format!("`{}` is not a class", self.session.symbol(class).path)),
        }
    }
}
