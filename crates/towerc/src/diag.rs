use std::path::PathBuf;

use tower_rt::error::{Report, ReportEntry};

use crate::span::Span;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Level {
    Error,
    Warning,
}

#[derive(Clone, Debug)]
pub struct Diag {
    pub level: Level,
    pub message: String,
    pub span: Span,
    pub path: Option<PathBuf>,
}

#[derive(Default, Debug)]
pub struct Diagnostics {
    diags: Vec<Diag>,
}

impl Diagnostics {
    pub fn error<S: Into<String>>(&mut self, span: Span, message: S) {
        self.diags.push(Diag {
            level: Level::Error,
            message: message.into(),
            span,
            path: None,
        });
    }

    pub fn error_at_path<P, S>(&mut self, path: P, span: Span, message: S)
    where
        P: Into<PathBuf>,
        S: Into<String>,
    {
        self.diags.push(Diag {
            level: Level::Error,
            message: message.into(),
            span,
            path: Some(path.into()),
        });
    }

    pub fn warning_at_path<P, S>(&mut self, path: P, span: Span, message: S)
    where
        P: Into<PathBuf>,
        S: Into<String>,
    {
        self.diags.push(Diag {
            level: Level::Warning,
            message: message.into(),
            span,
            path: Some(path.into()),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.diags.iter().any(|d| matches!(d.level, Level::Error))
    }

    pub fn into_vec(self) -> Vec<Diag> {
        self.diags
    }
}

pub fn to_report(diags: &[Diag]) -> Report {
    let mut report = Report::default();
    for diag in diags {
        report.push(ReportEntry {
            level: match diag.level {
                Level::Error => "error",
                Level::Warning => "warning",
            },
            message: diag.message.clone(),
            path: diag.path.as_ref().map(|path| path.display().to_string()),
            start: diag.span.start,
            end: diag.span.end,
        });
    }
    report
}
