pub mod ast;
pub mod builder;
pub mod diag;
pub mod dump;
pub mod loader;
pub mod sema;
pub mod span;

use std::path::Path;

pub use loader::{LoadError, load_program, load_programs};

/// Collects and resolves `program` in place.
pub fn resolve_program(
    program: &mut ast::Program,
    options: &sema::ResolveOptions,
) -> (sema::Analysis, Vec<diag::Diag>) {
    sema::analyze_program(program, options)
}

/// Loads a tree from disk and resolves it.
pub fn resolve_path(
    path: &Path,
    options: &sema::ResolveOptions,
) -> Result<(ast::Program, sema::Analysis, Vec<diag::Diag>), LoadError> {
    let mut program = load_program(path)?;
    let (analysis, diags) = resolve_program(&mut program, options);
    Ok((program, analysis, diags))
}
