//! Small constructors for building trees by hand.
//!
//! Nodes come out unnumbered (`ExprId(0)`, `SymbolId(0)`); the collection
//! pass assigns ids before resolution.

use crate::ast::{
    Block, CalleeReference, ClassDecl, ClassKind, Declaration, Expr, ExprId, ExprKind, File,
    FunctionCall, FunctionDecl, Literal, Program, QualifiedAccess, Stmt, StmtKind, SymbolId,
    ValueParameter, VariableDecl, WhenBranch,
};
use crate::sema::types::{ClassId, ConeType, TypeParameter, TypeRef};
use crate::span::Span;

pub fn program(files: Vec<File>) -> Program {
    Program { files }
}

pub fn file(name: &str, package: &str, declarations: Vec<Declaration>) -> File {
    File {
        name: name.to_string(),
        package: package.to_string(),
        declarations,
        span: Span::default(),
    }
}

impl From<ClassDecl> for Declaration {
    fn from(class: ClassDecl) -> Self {
        Declaration::Class(class)
    }
}

impl From<FunctionDecl> for Declaration {
    fn from(function: FunctionDecl) -> Self {
        Declaration::Function(function)
    }
}

impl From<VariableDecl> for Declaration {
    fn from(variable: VariableDecl) -> Self {
        Declaration::Property(variable)
    }
}

// Types

pub fn class_type(id: &str, args: Vec<ConeType>) -> ConeType {
    ConeType::class(ClassId(id.to_string()), args)
}

pub fn type_param(name: &str) -> ConeType {
    ConeType::type_parameter(name)
}

pub fn resolved(ty: ConeType) -> TypeRef {
    TypeRef::Resolved(ty)
}

pub fn builtin(name: &str) -> TypeRef {
    TypeRef::builtin(name)
}

// Declarations

pub fn class(name: &str) -> ClassDecl {
    ClassDecl {
        symbol: SymbolId::default(),
        name: name.to_string(),
        kind: ClassKind::Class,
        type_parameters: Vec::new(),
        supertypes: Vec::new(),
        members: Vec::new(),
        span: Span::default(),
    }
}

impl ClassDecl {
    pub fn kind(mut self, kind: ClassKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn type_params(mut self, names: &[&str]) -> Self {
        self.type_parameters
            .extend(names.iter().map(|name| TypeParameter::new(name)));
        self
    }

    pub fn extends(mut self, ty: ConeType) -> Self {
        self.supertypes.push(ty);
        self
    }

    pub fn member(mut self, decl: impl Into<Declaration>) -> Self {
        self.members.push(decl.into());
        self
    }
}

pub fn fun(name: &str) -> FunctionDecl {
    FunctionDecl {
        symbol: SymbolId::default(),
        name: name.to_string(),
        type_parameters: Vec::new(),
        receiver: None,
        parameters: Vec::new(),
        return_type: TypeRef::Implicit,
        body: None,
        span: Span::default(),
    }
}

impl FunctionDecl {
    pub fn type_params(mut self, names: &[&str]) -> Self {
        self.type_parameters
            .extend(names.iter().map(|name| TypeParameter::new(name)));
        self
    }

    pub fn receiver(mut self, ty: ConeType) -> Self {
        self.receiver = Some(TypeRef::Resolved(ty));
        self
    }

    pub fn param(mut self, name: &str, ty: TypeRef) -> Self {
        self.parameters.push(ValueParameter {
            symbol: SymbolId::default(),
            name: name.to_string(),
            ty,
            default: None,
            span: Span::default(),
        });
        self
    }

    pub fn param_with_default(mut self, name: &str, ty: TypeRef, default: Expr) -> Self {
        self = self.param(name, ty);
        if let Some(param) = self.parameters.last_mut() {
            param.default = Some(default);
        }
        self
    }

    pub fn returns(mut self, ty: TypeRef) -> Self {
        self.return_type = ty;
        self
    }

    pub fn body(mut self, stmts: Vec<Stmt>) -> Self {
        self.body = Some(block(stmts));
        self
    }
}

pub fn val(name: &str) -> VariableDecl {
    VariableDecl {
        symbol: SymbolId::default(),
        name: name.to_string(),
        receiver: None,
        return_type: TypeRef::Implicit,
        initializer: None,
        delegate: None,
        span: Span::default(),
    }
}

impl VariableDecl {
    pub fn ty(mut self, ty: TypeRef) -> Self {
        self.return_type = ty;
        self
    }

    pub fn receiver(mut self, ty: ConeType) -> Self {
        self.receiver = Some(TypeRef::Resolved(ty));
        self
    }

    pub fn init(mut self, expr: Expr) -> Self {
        self.initializer = Some(expr);
        self
    }

    pub fn by(mut self, delegate: Expr) -> Self {
        self.delegate = Some(delegate);
        self
    }
}

// Statements

pub fn block(stmts: Vec<Stmt>) -> Block {
    Block {
        stmts,
        span: Span::default(),
    }
}

fn stmt(kind: StmtKind) -> Stmt {
    Stmt {
        kind,
        span: Span::default(),
    }
}

pub fn expr_stmt(expr: Expr) -> Stmt {
    stmt(StmtKind::Expr(expr))
}

pub fn local(variable: VariableDecl) -> Stmt {
    stmt(StmtKind::Variable(variable))
}

pub fn local_fun(function: FunctionDecl) -> Stmt {
    stmt(StmtKind::Function(function))
}

pub fn local_class(class: ClassDecl) -> Stmt {
    stmt(StmtKind::Class(class))
}

pub fn ret(value: Option<Expr>) -> Stmt {
    stmt(StmtKind::Return(value))
}

pub fn while_loop(cond: Expr, body: Vec<Stmt>) -> Stmt {
    stmt(StmtKind::While {
        cond,
        body: block(body),
    })
}

pub fn do_while(body: Vec<Stmt>, cond: Expr) -> Stmt {
    stmt(StmtKind::DoWhile {
        body: block(body),
        cond,
    })
}

// Expressions

pub fn expr(kind: ExprKind) -> Expr {
    Expr {
        id: ExprId::default(),
        kind,
        span: Span::default(),
    }
}

impl Expr {
    pub fn at(mut self, start: usize, end: usize) -> Self {
        self.span = Span::new(start, end);
        self
    }
}

pub fn lit(literal: Literal) -> Expr {
    expr(ExprKind::Const(literal))
}

pub fn int(value: i32) -> Expr {
    lit(Literal::Int(value))
}

pub fn string(value: &str) -> Expr {
    lit(Literal::String(value.to_string()))
}

pub fn null() -> Expr {
    lit(Literal::Null)
}

pub fn name(name: &str) -> Expr {
    expr(ExprKind::Access(QualifiedAccess {
        callee: CalleeReference::simple(name),
        explicit_receiver: None,
        safe: false,
    }))
}

pub fn member(receiver: Expr, name: &str) -> Expr {
    expr(ExprKind::Access(QualifiedAccess {
        callee: CalleeReference::simple(name),
        explicit_receiver: Some(Box::new(receiver)),
        safe: false,
    }))
}

pub fn this() -> Expr {
    expr(ExprKind::Access(QualifiedAccess {
        callee: CalleeReference::This { label: None },
        explicit_receiver: None,
        safe: false,
    }))
}

pub fn this_at(label: &str) -> Expr {
    expr(ExprKind::Access(QualifiedAccess {
        callee: CalleeReference::This {
            label: Some(label.to_string()),
        },
        explicit_receiver: None,
        safe: false,
    }))
}

pub fn call(name: &str, arguments: Vec<Expr>) -> Expr {
    expr(ExprKind::Call(FunctionCall {
        callee: CalleeReference::simple(name),
        explicit_receiver: None,
        arguments,
        type_arguments: Vec::new(),
        safe: false,
    }))
}

pub fn call_on(receiver: Expr, name: &str, arguments: Vec<Expr>) -> Expr {
    let mut call = call(name, arguments);
    if let ExprKind::Call(inner) = &mut call.kind {
        inner.explicit_receiver = Some(Box::new(receiver));
    }
    call
}

pub fn call_with_types(name: &str, type_arguments: Vec<ConeType>, arguments: Vec<Expr>) -> Expr {
    let mut call = call(name, arguments);
    if let ExprKind::Call(inner) = &mut call.kind {
        inner.type_arguments = type_arguments;
    }
    call
}

pub fn when(branches: Vec<(Option<Expr>, Expr)>) -> Expr {
    expr(ExprKind::When(
        branches
            .into_iter()
            .map(|(cond, result)| WhenBranch { cond, result })
            .collect(),
    ))
}

pub fn block_expr(stmts: Vec<Stmt>) -> Expr {
    expr(ExprKind::Block(block(stmts)))
}
