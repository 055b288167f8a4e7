use std::rc::Rc;

use indexmap::IndexSet;

use super::checker::{Applicability, Checker};
use super::scope::{Classification, Scope, ScopeRef, type_scope};
use super::symbols::Session;
use super::types::{ConeType, TypeParameter};

/// State shared by the checkers of one resolution attempt.
pub struct TowerContext<'a> {
    pub session: &'a Session,
    type_parameters: &'a [TypeParameter],
    processed: Vec<ScopeRef<'a>>,
}

impl<'a> TowerContext<'a> {
    pub fn new(session: &'a Session, type_parameters: &'a [TypeParameter]) -> Self {
        Self {
            session,
            type_parameters,
            processed: Vec::new(),
        }
    }

    /// Scopes visited so far, innermost first.
    pub fn processed(&self) -> &[ScopeRef<'a>] {
        &self.processed
    }

    pub fn type_scope(&self, ty: &ConeType) -> Option<Rc<Scope>> {
        type_scope(self.session, ty, self.type_parameters)
    }
}

const CLASSIFICATIONS: [Classification; 3] = [
    Classification::Classifier,
    Classification::Property,
    Classification::Function,
];

/// Walks `tower` (outermost first) from the innermost scope outwards and
/// returns the index of the best checker, stopping at the first scope where
/// one reaches `Resolved`.
pub fn run_tower_resolver<'a>(
    session: &'a Session,
    tower: &[ScopeRef<'a>],
    type_parameters: &'a [TypeParameter],
    checkers: &mut [Checker],
) -> Option<usize> {
    if checkers.is_empty() {
        return None;
    }
    let mut ctx = TowerContext::new(session, type_parameters);
    let mut names: IndexSet<String> = IndexSet::new();
    let mut best = None;

    for (group, scope) in tower.iter().rev().enumerate() {
        for checker in checkers.iter() {
            checker.update_names(&mut names);
        }
        ctx.processed.push(*scope);

        for name in &names {
            for classification in CLASSIFICATIONS {
                for candidate in scope.lookup(session, classification, name) {
                    for checker in checkers.iter_mut() {
                        checker.consume_candidate(group as i32, &candidate, &ctx);
                    }
                }
            }
        }

        let index = best_checker(checkers);
        best = Some(index);
        if checkers[index].applicability() == Applicability::Resolved {
            tracing::trace!(group, checker = checkers[index].kind(), "tower resolved");
            break;
        }
    }

    Some(best.unwrap_or_else(|| best_checker(checkers)))
}

/// First checker with the highest applicability.
fn best_checker(checkers: &[Checker]) -> usize {
    let mut best = 0;
    for (index, checker) in checkers.iter().enumerate().skip(1) {
        if checker.applicability() > checkers[best].applicability() {
            best = index;
        }
    }
    best
}
