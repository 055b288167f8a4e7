use std::fmt;

use serde::{Deserialize, Serialize};

use crate::sema::types::{ConeType, TypeParameter, TypeRef};
use crate::span::Span;

/// Identity of an expression node; `0` means "not numbered yet".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExprId(pub u32);

/// Index of a declaration in the session's symbol table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolId(pub u32);

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Program {
    pub files: Vec<File>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct File {
    pub name: String,
    #[serde(default)]
    pub package: String,
    pub declarations: Vec<Declaration>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Declaration {
    Class(ClassDecl),
    Function(FunctionDecl),
    Property(VariableDecl),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassKind {
    #[default]
    Class,
    Interface,
    Object,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClassDecl {
    #[serde(default)]
    pub symbol: SymbolId,
    pub name: String,
    #[serde(default)]
    pub kind: ClassKind,
    #[serde(default)]
    pub type_parameters: Vec<TypeParameter>,
    #[serde(default)]
    pub supertypes: Vec<ConeType>,
    #[serde(default)]
    pub members: Vec<Declaration>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionDecl {
    #[serde(default)]
    pub symbol: SymbolId,
    pub name: String,
    #[serde(default)]
    pub type_parameters: Vec<TypeParameter>,
    #[serde(default)]
    pub receiver: Option<TypeRef>,
    #[serde(default)]
    pub parameters: Vec<ValueParameter>,
    #[serde(default)]
    pub return_type: TypeRef,
    #[serde(default)]
    pub body: Option<Block>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ValueParameter {
    #[serde(default)]
    pub symbol: SymbolId,
    pub name: String,
    pub ty: TypeRef,
    #[serde(default)]
    pub default: Option<Expr>,
    #[serde(default)]
    pub span: Span,
}

/// Properties (top-level and member) and local variables share this shape.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VariableDecl {
    #[serde(default)]
    pub symbol: SymbolId,
    pub name: String,
    #[serde(default)]
    pub receiver: Option<TypeRef>,
    #[serde(default)]
    pub return_type: TypeRef,
    #[serde(default)]
    pub initializer: Option<Expr>,
    #[serde(default)]
    pub delegate: Option<Expr>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    #[serde(default)]
    pub span: Span,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    #[serde(default)]
    pub span: Span,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum StmtKind {
    Expr(Expr),
    Variable(VariableDecl),
    Function(FunctionDecl),
    Class(ClassDecl),
    Return(Option<Expr>),
    While { cond: Expr, body: Block },
    DoWhile { body: Block, cond: Expr },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Expr {
    #[serde(default)]
    pub id: ExprId,
    pub kind: ExprKind,
    #[serde(default)]
    pub span: Span,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ExprKind {
    Const(Literal),
    Access(QualifiedAccess),
    Call(FunctionCall),
    When(Vec<WhenBranch>),
    Block(Block),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Boolean(bool),
    Char(char),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QualifiedAccess {
    pub callee: CalleeReference,
    #[serde(default)]
    pub explicit_receiver: Option<Box<Expr>>,
    #[serde(default)]
    pub safe: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FunctionCall {
    pub callee: CalleeReference,
    #[serde(default)]
    pub explicit_receiver: Option<Box<Expr>>,
    #[serde(default)]
    pub arguments: Vec<Expr>,
    #[serde(default)]
    pub type_arguments: Vec<ConeType>,
    #[serde(default)]
    pub safe: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WhenBranch {
    /// `None` is the `else` branch.
    pub cond: Option<Expr>,
    pub result: Expr,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CalleeReference {
    Simple {
        name: String,
    },
    This {
        label: Option<String>,
    },
    Resolved {
        name: String,
        symbol: SymbolId,
        path: String,
        /// Type as seen through the scope the symbol was found in.
        #[serde(default)]
        ty: TypeRef,
    },
    Error {
        name: String,
        error: ResolutionError,
    },
}

impl CalleeReference {
    pub fn simple(name: &str) -> Self {
        CalleeReference::Simple {
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            CalleeReference::Simple { name }
            | CalleeReference::Resolved { name, .. }
            | CalleeReference::Error { name, .. } => name,
            CalleeReference::This { .. } => "this",
        }
    }

    /// Records `bound` on a resolved reference; other references are returned as-is.
    pub fn with_type(mut self, bound: &TypeRef) -> Self {
        if let CalleeReference::Resolved { ty, .. } = &mut self {
            *ty = bound.clone();
        }
        self
    }

    pub fn resolved_symbol(&self) -> Option<SymbolId> {
        match self {
            CalleeReference::Resolved { symbol, .. } => Some(*symbol),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ResolutionError {
    UnresolvedName { name: String },
    Ambiguity { name: String, candidates: Vec<String> },
    ParameterMapping { name: String, candidates: Vec<String> },
    UnresolvedLabel { label: Option<String> },
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionError::UnresolvedName { name } => write!(f, "Unresolved name: {name}"),
            ResolutionError::Ambiguity { name, candidates } => {
                write!(f, "Ambiguity: {name}, [{}]", candidates.join(", "))
            }
            ResolutionError::ParameterMapping { name, candidates } => write!(
                f,
                "Inapplicable candidates for {name}: [{}]",
                candidates.join(", ")
            ),
            ResolutionError::UnresolvedLabel { label: Some(label) } => {
                write!(f, "Unresolved this@{label}")
            }
            ResolutionError::UnresolvedLabel { label: None } => write!(f, "Unresolved this"),
        }
    }
}

pub fn walk_exprs<F: FnMut(&Expr)>(program: &Program, f: &mut F) {
    for file in &program.files {
        for decl in &file.declarations {
            walk_decl(decl, f);
        }
    }
}

fn walk_decl<F: FnMut(&Expr)>(decl: &Declaration, f: &mut F) {
    match decl {
        Declaration::Class(class) => walk_class(class, f),
        Declaration::Function(function) => walk_function(function, f),
        Declaration::Property(variable) => walk_variable(variable, f),
    }
}

fn walk_class<F: FnMut(&Expr)>(class: &ClassDecl, f: &mut F) {
    for member in &class.members {
        walk_decl(member, f);
    }
}

fn walk_function<F: FnMut(&Expr)>(function: &FunctionDecl, f: &mut F) {
    for param in &function.parameters {
        if let Some(default) = &param.default {
            walk_expr(default, f);
        }
    }
    if let Some(body) = &function.body {
        walk_block(body, f);
    }
}

fn walk_variable<F: FnMut(&Expr)>(variable: &VariableDecl, f: &mut F) {
    if let Some(init) = &variable.initializer {
        walk_expr(init, f);
    }
    if let Some(delegate) = &variable.delegate {
        walk_expr(delegate, f);
    }
}

fn walk_block<F: FnMut(&Expr)>(block: &Block, f: &mut F) {
    for stmt in &block.stmts {
        match &stmt.kind {
            StmtKind::Expr(expr) => walk_expr(expr, f),
            StmtKind::Variable(variable) => walk_variable(variable, f),
            StmtKind::Function(function) => walk_function(function, f),
            StmtKind::Class(class) => walk_class(class, f),
            StmtKind::Return(value) => {
                if let Some(value) = value {
                    walk_expr(value, f);
                }
            }
            StmtKind::While { cond, body } | StmtKind::DoWhile { body, cond } => {
                walk_expr(cond, f);
                walk_block(body, f);
            }
        }
    }
}

fn walk_expr<F: FnMut(&Expr)>(expr: &Expr, f: &mut F) {
    f(expr);
    match &expr.kind {
        ExprKind::Const(_) => {}
        ExprKind::Access(access) => {
            if let Some(receiver) = &access.explicit_receiver {
                walk_expr(receiver, f);
            }
        }
        ExprKind::Call(call) => {
            if let Some(receiver) = &call.explicit_receiver {
                walk_expr(receiver, f);
            }
            for arg in &call.arguments {
                walk_expr(arg, f);
            }
        }
        ExprKind::When(branches) => {
            for branch in branches {
                if let Some(cond) = &branch.cond {
                    walk_expr(cond, f);
                }
                walk_expr(&branch.result, f);
            }
        }
        ExprKind::Block(block) => walk_block(block, f),
    }
}
