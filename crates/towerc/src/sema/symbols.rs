use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::ast::{
    Block, ClassDecl, ClassKind, Declaration, Expr, ExprId, ExprKind, FunctionDecl, Program,
    StmtKind, SymbolId, ValueParameter, VariableDecl,
};
use crate::diag::Diagnostics;

use super::scope::{Candidate, Classification, MemberTable};
use super::types::{ANY, BUILTIN_CLASSES, ClassId, ConeType, NOTHING, Substitution, TypeParameter, TypeRef};

#[derive(Clone, Debug)]
pub struct Symbol {
    pub name: String,
    /// `package/Owner.name`, used when reporting candidates.
    pub path: String,
    pub owner: Option<SymbolId>,
    pub kind: SymbolKind,
}

#[derive(Clone, Debug)]
pub enum SymbolKind {
    Class(ClassSymbol),
    Function(FunctionSymbol),
    Variable(VariableSymbol),
}

#[derive(Clone, Debug)]
pub struct ClassSymbol {
    pub id: ClassId,
    pub kind: ClassKind,
    pub type_parameters: Vec<TypeParameter>,
    pub supertypes: Vec<ConeType>,
}

impl ClassSymbol {
    pub fn default_type(&self) -> ConeType {
        ConeType::class(
            self.id.clone(),
            self.type_parameters
                .iter()
                .map(|param| ConeType::type_parameter(&param.name))
                .collect(),
        )
    }
}

#[derive(Clone, Debug)]
pub struct FunctionSymbol {
    pub receiver: Option<TypeRef>,
    pub type_parameters: Vec<TypeParameter>,
    pub parameters: Vec<TypeRef>,
    pub return_type: TypeRef,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VariableRole {
    Property,
    ValueParameter,
    Local,
}

#[derive(Clone, Debug)]
pub struct VariableSymbol {
    pub role: VariableRole,
    pub receiver: Option<TypeRef>,
    pub return_type: TypeRef,
    pub delegated: bool,
}

impl Symbol {
    pub fn classification(&self) -> Classification {
        match self.kind {
            SymbolKind::Class(_) => Classification::Classifier,
            SymbolKind::Function(_) => Classification::Function,
            SymbolKind::Variable(_) => Classification::Property,
        }
    }

    pub fn receiver(&self) -> Option<&TypeRef> {
        match &self.kind {
            SymbolKind::Function(function) => function.receiver.as_ref(),
            SymbolKind::Variable(variable) => variable.receiver.as_ref(),
            SymbolKind::Class(_) => None,
        }
    }

    pub fn parameter_count(&self) -> Option<usize> {
        match &self.kind {
            SymbolKind::Function(function) => Some(function.parameters.len()),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&ClassSymbol> {
        match &self.kind {
            SymbolKind::Class(class) => Some(class),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionSymbol> {
        match &self.kind {
            SymbolKind::Function(function) => Some(function),
            _ => None,
        }
    }

    /// Declared or inferred type: return type for callables, default type for classes.
    pub fn result_type(&self) -> TypeRef {
        match &self.kind {
            SymbolKind::Class(class) => TypeRef::Resolved(class.default_type()),
            SymbolKind::Function(function) => function.return_type.clone(),
            SymbolKind::Variable(variable) => variable.return_type.clone(),
        }
    }
}

/// Symbol table and classifier provider for one resolution run.
#[derive(Debug)]
pub struct Session {
    symbols: Vec<Symbol>,
    classes: HashMap<ClassId, SymbolId>,
    declared_scopes: HashMap<SymbolId, Rc<MemberTable>>,
    top_level: HashMap<String, Rc<MemberTable>>,
    next_expr: u32,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let mut session = Session {
            symbols: Vec::new(),
            classes: HashMap::new(),
            declared_scopes: HashMap::new(),
            top_level: HashMap::new(),
            next_expr: 1,
        };
        install_builtins(&mut session);
        session
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn register(&mut self, symbol: Symbol) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        if let SymbolKind::Class(class) = &symbol.kind {
            self.classes.insert(class.id.clone(), id);
        }
        self.symbols.push(symbol);
        id
    }

    pub fn lookup_class(&self, id: &ClassId) -> Option<SymbolId> {
        self.classes.get(id).copied()
    }

    pub fn class_symbol(&self, id: &ClassId) -> Option<(SymbolId, &ClassSymbol)> {
        let symbol = self.lookup_class(id)?;
        self.symbol(symbol).as_class().map(|class| (symbol, class))
    }

    pub fn declared_scope(&self, class: SymbolId) -> Rc<MemberTable> {
        self.declared_scopes.get(&class).cloned().unwrap_or_default()
    }

    pub fn top_level_scope(&self, package: &str) -> Rc<MemberTable> {
        self.top_level.get(package).cloned().unwrap_or_default()
    }

    pub fn fresh_expr_id(&mut self) -> ExprId {
        let id = ExprId(self.next_expr);
        self.next_expr += 1;
        id
    }

    /// Writes an inferred type back to a callable or variable symbol.
    pub fn set_return_type(&mut self, id: SymbolId, ty: TypeRef) {
        match &mut self.symbols[id.0 as usize].kind {
            SymbolKind::Function(function) => function.return_type = ty,
            SymbolKind::Variable(variable) => variable.return_type = ty,
            SymbolKind::Class(_) => {}
        }
    }

    /// Type of a candidate as seen through the scope it was found in.
    /// A generic function's own type parameters are left for its call site.
    pub fn candidate_type(&self, candidate: &Candidate) -> TypeRef {
        let symbol = self.symbol(candidate.symbol);
        let ty = symbol.result_type();
        let Some(substitution) = &candidate.substitution else {
            return ty;
        };
        match symbol.as_function() {
            Some(function) if !function.type_parameters.is_empty() => substitution
                .without(&function.type_parameters)
                .apply_ref(&ty),
            _ => substitution.apply_ref(&ty),
        }
    }

    pub fn is_subclass_of(&self, class: &ClassId, ancestor: &ClassId) -> bool {
        let mut pending = vec![class.clone()];
        let mut seen = Vec::new();
        while let Some(current) = pending.pop() {
            if &current == ancestor {
                return true;
            }
            if seen.contains(&current) {
                continue;
            }
            if let Some((_, symbol)) = self.class_symbol(&current) {
                pending.extend(symbol.supertypes.iter().filter_map(|ty| ty.class_id().cloned()));
            }
            seen.push(current);
        }
        false
    }
}

/// Direct supertypes of `class`; with `deep` the whole ancestry, substituted
/// into the terms of `class`.
pub fn lookup_super_types(
    session: &Session,
    class: SymbolId,
    lookup_interfaces: bool,
    deep: bool,
) -> Vec<ConeType> {
    let mut out = Vec::new();
    let mut visited = vec![class];
    collect_super_types(session, class, &Substitution::default(), lookup_interfaces, deep, &mut visited, &mut out);
    out
}

fn collect_super_types(
    session: &Session,
    class: SymbolId,
    substitution: &Substitution,
    lookup_interfaces: bool,
    deep: bool,
    visited: &mut Vec<SymbolId>,
    out: &mut Vec<ConeType>,
) {
    let Some(symbol) = session.symbol(class).as_class() else {
        return;
    };
    for super_type in &symbol.supertypes {
        let Some(class_id) = super_type.class_id() else {
            continue;
        };
        let resolved = session.class_symbol(class_id);
        if !lookup_interfaces
            && matches!(resolved, Some((_, sym)) if sym.kind == ClassKind::Interface)
        {
            continue;
        }
        let super_type = substitution.apply(super_type);
        out.push(super_type.clone());
        if !deep {
            continue;
        }
        if let Some((super_id, super_symbol)) = resolved {
            if visited.contains(&super_id) {
                continue;
            }
            visited.push(super_id);
            let next = Substitution::new(&super_symbol.type_parameters, super_type.type_arguments());
            collect_super_types(session, super_id, &next, lookup_interfaces, deep, visited, out);
        }
    }
}

fn install_builtins(session: &mut Session) {
    for name in BUILTIN_CLASSES {
        let supertypes = if *name == ANY || *name == NOTHING {
            Vec::new()
        } else {
            vec![ConeType::builtin(ANY)]
        };
        let id = ClassId::builtin(name);
        session.register(Symbol {
            name: name.to_string(),
            path: id.0.clone(),
            owner: None,
            kind: SymbolKind::Class(ClassSymbol {
                id,
                kind: ClassKind::Class,
                type_parameters: Vec::new(),
                supertypes,
            }),
        });
    }
}

/// Registers every declaration of `program` in `session`, writing symbol ids
/// into the tree and numbering expressions that have no id yet. A repeated
/// id is replaced with a fresh one and reported as a warning.
pub fn collect(program: &mut Program, session: &mut Session, diags: &mut Diagnostics) {
    let mut max_seen = 0;
    crate::ast::walk_exprs(program, &mut |expr| max_seen = max_seen.max(expr.id.0));
    let next = session.next_expr.max(max_seen + 1);

    let mut collector = Collector {
        session,
        diags,
        next_expr: next,
        seen_exprs: HashSet::new(),
        file: String::new(),
        tables: HashMap::new(),
        top_level: HashMap::new(),
    };
    for file in &mut program.files {
        let package = file.package.clone();
        collector.file = file.name.clone();
        for decl in &mut file.declarations {
            let (name, classification, id) = collector.collect_decl(decl, &package, None, None);
            collector
                .top_level
                .entry(package.clone())
                .or_default()
                .add(classification, &name, id);
        }
    }
    let Collector {
        session,
        next_expr,
        tables,
        top_level,
        ..
    } = collector;
    session.next_expr = next_expr;
    for (class, table) in tables {
        session.declared_scopes.insert(class, Rc::new(table));
    }
    for (package, table) in top_level {
        session.top_level.insert(package, Rc::new(table));
    }
}

struct Collector<'a> {
    session: &'a mut Session,
    diags: &'a mut Diagnostics,
    next_expr: u32,
    seen_exprs: HashSet<u32>,
    file: String,
    tables: HashMap<SymbolId, MemberTable>,
    top_level: HashMap<String, MemberTable>,
}

impl Collector<'_> {
    fn collect_decl(
        &mut self,
        decl: &mut Declaration,
        package: &str,
        owner: Option<SymbolId>,
        owner_class: Option<&ClassId>,
    ) -> (String, Classification, SymbolId) {
        match decl {
            Declaration::Class(class) => {
                let id = self.collect_class(class, package, owner, owner_class);
                (class.name.clone(), Classification::Classifier, id)
            }
            Declaration::Function(function) => {
                let id = self.collect_function(function, package, owner, owner_class);
                (function.name.clone(), Classification::Function, id)
            }
            Declaration::Property(variable) => {
                let id =
                    self.collect_variable(variable, package, owner, owner_class, VariableRole::Property);
                (variable.name.clone(), Classification::Property, id)
            }
        }
    }

    fn member_path(package: &str, owner_class: Option<&ClassId>, name: &str) -> String {
        match owner_class {
            Some(class) => format!("{class}.{name}"),
            None if package.is_empty() => name.to_string(),
            None => format!("{package}/{name}"),
        }
    }

    fn collect_class(
        &mut self,
        class: &mut ClassDecl,
        package: &str,
        owner: Option<SymbolId>,
        owner_class: Option<&ClassId>,
    ) -> SymbolId {
        let class_id = match owner_class {
            Some(outer) => outer.nested(&class.name),
            None => ClassId::new(package, &class.name),
        };
        if self.session.lookup_class(&class_id).is_some() {
            self.diags
                .error(class.span, format!("duplicate class: {class_id}"));
        }
        let supertypes = if class.supertypes.is_empty() {
            vec![ConeType::builtin(ANY)]
        } else {
            class.supertypes.clone()
        };
        let symbol = self.session.register(Symbol {
            name: class.name.clone(),
            path: class_id.0.clone(),
            owner,
            kind: SymbolKind::Class(ClassSymbol {
                id: class_id.clone(),
                kind: class.kind,
                type_parameters: class.type_parameters.clone(),
                supertypes,
            }),
        });
        class.symbol = symbol;
        let mut table = MemberTable::default();
        for member in &mut class.members {
            let (name, classification, id) =
                self.collect_decl(member, package, Some(symbol), Some(&class_id));
            table.add(classification, &name, id);
        }
        self.tables.insert(symbol, table);
        symbol
    }

    fn collect_function(
        &mut self,
        function: &mut FunctionDecl,
        package: &str,
        owner: Option<SymbolId>,
        owner_class: Option<&ClassId>,
    ) -> SymbolId {
        let symbol = self.session.register(Symbol {
            name: function.name.clone(),
            path: Self::member_path(package, owner_class, &function.name),
            owner,
            kind: SymbolKind::Function(FunctionSymbol {
                receiver: function.receiver.clone(),
                type_parameters: function.type_parameters.clone(),
                parameters: function.parameters.iter().map(|param| param.ty.clone()).collect(),
                return_type: function.return_type.clone(),
            }),
        });
        function.symbol = symbol;
        let local_owner = ClassId(Self::member_path(package, owner_class, &function.name));
        for param in &mut function.parameters {
            self.collect_parameter(param, package, symbol, &local_owner);
        }
        if let Some(body) = &mut function.body {
            self.collect_block(body, package, symbol, &local_owner);
        }
        symbol
    }

    fn collect_parameter(
        &mut self,
        param: &mut ValueParameter,
        package: &str,
        owner: SymbolId,
        owner_path: &ClassId,
    ) {
        param.symbol = self.session.register(Symbol {
            name: param.name.clone(),
            path: format!("{owner_path}.{}", param.name),
            owner: Some(owner),
            kind: SymbolKind::Variable(VariableSymbol {
                role: VariableRole::ValueParameter,
                receiver: None,
                return_type: param.ty.clone(),
                delegated: false,
            }),
        });
        if let Some(default) = &mut param.default {
            self.collect_expr(default, package, owner, owner_path);
        }
    }

    fn collect_variable(
        &mut self,
        variable: &mut VariableDecl,
        package: &str,
        owner: Option<SymbolId>,
        owner_class: Option<&ClassId>,
        role: VariableRole,
    ) -> SymbolId {
        let path = Self::member_path(package, owner_class, &variable.name);
        let symbol = self.session.register(Symbol {
            name: variable.name.clone(),
            path: path.clone(),
            owner,
            kind: SymbolKind::Variable(VariableSymbol {
                role,
                receiver: variable.receiver.clone(),
                return_type: variable.return_type.clone(),
                delegated: variable.delegate.is_some(),
            }),
        });
        variable.symbol = symbol;
        let local_owner = ClassId(path);
        if let Some(init) = &mut variable.initializer {
            self.collect_expr(init, package, symbol, &local_owner);
        }
        if let Some(delegate) = &mut variable.delegate {
            self.collect_expr(delegate, package, symbol, &local_owner);
        }
        symbol
    }

    fn collect_block(&mut self, block: &mut Block, package: &str, owner: SymbolId, owner_path: &ClassId) {
        for stmt in &mut block.stmts {
            match &mut stmt.kind {
                StmtKind::Expr(expr) => self.collect_expr(expr, package, owner, owner_path),
                StmtKind::Variable(variable) => {
                    self.collect_variable(
                        variable,
                        package,
                        Some(owner),
                        Some(owner_path),
                        VariableRole::Local,
                    );
                }
                StmtKind::Function(function) => {
                    self.collect_function(function, package, Some(owner), Some(owner_path));
                }
                StmtKind::Class(class) => {
                    self.collect_class(class, package, Some(owner), Some(owner_path));
                }
                StmtKind::Return(value) => {
                    if let Some(value) = value {
                        self.collect_expr(value, package, owner, owner_path);
                    }
                }
                StmtKind::While { cond, body } | StmtKind::DoWhile { body, cond } => {
                    self.collect_expr(cond, package, owner, owner_path);
                    self.collect_block(body, package, owner, owner_path);
                }
            }
        }
    }

    fn collect_expr(&mut self, expr: &mut Expr, package: &str, owner: SymbolId, owner_path: &ClassId) {
        if expr.id.0 == 0 || !self.seen_exprs.insert(expr.id.0) {
            let fresh = ExprId(self.next_expr);
            self.next_expr += 1;
            if expr.id.0 != 0 {
                self.diags.warning_at_path(
                    self.file.clone(),
                    expr.span,
                    format!("duplicate expression id #{} renumbered to #{}", expr.id.0, fresh.0),
                );
            }
            self.seen_exprs.insert(fresh.0);
            expr.id = fresh;
        }
        match &mut expr.kind {
            ExprKind::Const(_) => {}
            ExprKind::Access(access) => {
                if let Some(receiver) = &mut access.explicit_receiver {
                    self.collect_expr(receiver, package, owner, owner_path);
                }
            }
            ExprKind::Call(call) => {
                if let Some(receiver) = &mut call.explicit_receiver {
                    self.collect_expr(receiver, package, owner, owner_path);
                }
                for arg in &mut call.arguments {
                    self.collect_expr(arg, package, owner, owner_path);
                }
            }
            ExprKind::When(branches) => {
                for branch in branches {
                    if let Some(cond) = &mut branch.cond {
                        self.collect_expr(cond, package, owner, owner_path);
                    }
                    self.collect_expr(&mut branch.result, package, owner, owner_path);
                }
            }
            ExprKind::Block(block) => self.collect_block(block, package, owner, owner_path),
        }
    }
}
