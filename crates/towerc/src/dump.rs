use crate::ast::{
    Block, CalleeReference, ClassDecl, Declaration, Expr, ExprKind, FunctionDecl, Literal, Program,
    StmtKind, VariableDecl,
};
use crate::sema::BindingTable;

/// Renders a resolved tree with the type bound to every expression.
pub fn dump_program(program: &Program, bindings: &BindingTable) -> String {
    let mut dumper = Dumper {
        bindings,
        lines: Vec::new(),
        depth: 0,
    };
    for file in &program.files {
        if file.package.is_empty() {
            dumper.line(format!("file {}", file.name));
        } else {
            dumper.line(format!("file {} (package {})", file.name, file.package));
        }
        dumper.nested(|d| {
            for decl in &file.declarations {
                d.declaration(decl);
            }
        });
    }
    let mut out = dumper.lines.join("\n");
    out.push('\n');
    out
}

struct Dumper<'a> {
    bindings: &'a BindingTable,
    lines: Vec<String>,
    depth: usize,
}

impl Dumper<'_> {
    fn line(&mut self, text: String) {
        self.lines.push(format!("{}{text}", "  ".repeat(self.depth)));
    }

    fn nested(&mut self, f: impl FnOnce(&mut Self)) {
        self.depth += 1;
        f(self);
        self.depth -= 1;
    }

    fn declaration(&mut self, decl: &Declaration) {
        match decl {
            Declaration::Class(class) => self.class(class),
            Declaration::Function(function) => self.function(function),
            Declaration::Property(variable) => self.variable("val", variable),
        }
    }

    fn class(&mut self, class: &ClassDecl) {
        let kind = format!("{:?}", class.kind).to_lowercase();
        let mut header = format!("{kind} {}", class.name);
        if !class.type_parameters.is_empty() {
            let names: Vec<&str> = class.type_parameters.iter().map(|p| p.name.as_str()).collect();
            header = format!("{header}<{}>", names.join(", "));
        }
        if !class.supertypes.is_empty() {
            let supers: Vec<String> = class.supertypes.iter().map(ToString::to_string).collect();
            header = format!("{header} : {}", supers.join(", "));
        }
        self.line(header);
        self.nested(|d| {
            for member in &class.members {
                d.declaration(member);
            }
        });
    }

    fn function(&mut self, function: &FunctionDecl) {
        let receiver = match &function.receiver {
            Some(receiver) => format!("{receiver}."),
            None => String::new(),
        };
        let params: Vec<String> = function
            .parameters
            .iter()
            .map(|param| format!("{}: {}", param.name, param.ty))
            .collect();
        self.line(format!(
            "fun {receiver}{}({}): {}",
            function.name,
            params.join(", "),
            function.return_type
        ));
        self.nested(|d| {
            for param in &function.parameters {
                if let Some(default) = &param.default {
                    d.line(format!("default {}", param.name));
                    d.nested(|d| d.expr(default));
                }
            }
            if let Some(body) = &function.body {
                d.block(body);
            }
        });
    }

    fn variable(&mut self, keyword: &str, variable: &VariableDecl) {
        self.line(format!("{keyword} {}: {}", variable.name, variable.return_type));
        self.nested(|d| {
            if let Some(init) = &variable.initializer {
                d.expr(init);
            }
            if let Some(delegate) = &variable.delegate {
                d.line("by".to_string());
                d.nested(|d| d.expr(delegate));
            }
        });
    }

    fn block(&mut self, block: &Block) {
        for stmt in &block.stmts {
            match &stmt.kind {
                StmtKind::Expr(expr) => self.expr(expr),
                StmtKind::Variable(variable) => self.variable("local", variable),
                StmtKind::Function(function) => self.function(function),
                StmtKind::Class(class) => self.class(class),
                StmtKind::Return(value) => {
                    self.line("return".to_string());
                    if let Some(value) = value {
                        self.nested(|d| d.expr(value));
                    }
                }
                StmtKind::While { cond, body } => {
                    self.line("while".to_string());
                    self.nested(|d| {
                        d.expr(cond);
                        d.block(body);
                    });
                }
                StmtKind::DoWhile { body, cond } => {
                    self.line("do-while".to_string());
                    self.nested(|d| {
                        d.block(body);
                        d.expr(cond);
                    });
                }
            }
        }
    }

    fn expr(&mut self, expr: &Expr) {
        let ty = match self.bindings.get(expr.id) {
            Some(ty) => ty.to_string(),
            None => "<unbound>".to_string(),
        };
        let head = match &expr.kind {
            ExprKind::Const(literal) => format!("const {}", literal_text(literal)),
            ExprKind::Access(access) => format!("access {}", callee_text(&access.callee)),
            ExprKind::Call(call) => format!("call {}", callee_text(&call.callee)),
            ExprKind::When(_) => "when".to_string(),
            ExprKind::Block(_) => "block".to_string(),
        };
        self.line(format!("#{} {head} : {ty}", expr.id.0));
        self.nested(|d| match &expr.kind {
            ExprKind::Const(_) => {}
            ExprKind::Access(access) => {
                if let Some(receiver) = &access.explicit_receiver {
                    d.expr(receiver);
                }
            }
            ExprKind::Call(call) => {
                if let Some(receiver) = &call.explicit_receiver {
                    d.expr(receiver);
                }
                for arg in &call.arguments {
                    d.expr(arg);
                }
            }
            ExprKind::When(branches) => {
                for branch in branches {
                    match &branch.cond {
                        Some(cond) => d.expr(cond),
                        None => d.line("else".to_string()),
                    }
                    d.nested(|d| d.expr(&branch.result));
                }
            }
            ExprKind::Block(block) => d.block(block),
        });
    }
}

fn callee_text(callee: &CalleeReference) -> String {
    match callee {
        CalleeReference::Simple { name } => format!("{name} (unresolved)"),
        CalleeReference::This { label: Some(label) } => format!("this@{label}"),
        CalleeReference::This { label: None } => "this".to_string(),
        CalleeReference::Resolved { name, path, .. } => format!("{name} -> {path}"),
        CalleeReference::Error { error, .. } => format!("<{error}>"),
    }
}

fn literal_text(literal: &Literal) -> String {
    match literal {
        Literal::Null => "null".to_string(),
        Literal::Boolean(value) => value.to_string(),
        Literal::Char(value) => format!("{value:?}"),
        Literal::Byte(value) => format!("{value}b"),
        Literal::Short(value) => format!("{value}s"),
        Literal::Int(value) => value.to_string(),
        Literal::Long(value) => format!("{value}L"),
        Literal::Float(value) => format!("{value}f"),
        Literal::Double(value) => value.to_string(),
        Literal::String(value) => format!("{value:?}"),
    }
}
