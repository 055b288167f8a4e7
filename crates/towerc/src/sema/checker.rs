use indexmap::IndexSet;

use super::scope::{Candidate, Classification};
use super::symbols::{FunctionSymbol, Session, Symbol};
use super::tower::TowerContext;
use super::types::TypeRef;

/// Group assigned to call-operators found on the variable's own type.
pub const RECEIVER_GROUP: i32 = -1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Applicability {
    #[default]
    Hidden,
    ParameterMappingError,
    SyntheticResolved,
    Resolved,
}

impl Applicability {
    pub fn is_success(self) -> bool {
        self >= Applicability::SyntheticResolved
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Offer {
    Discarded,
    Appended,
    Replaced,
}

/// Candidates at the best tier seen so far, each tagged with its scope group.
#[derive(Clone, Debug, Default)]
pub struct CandidateSet {
    groups: Vec<i32>,
    candidates: Vec<Candidate>,
    applicability: Applicability,
}

impl CandidateSet {
    pub fn offer(&mut self, group: i32, candidate: &Candidate, applicability: Applicability) -> Offer {
        if applicability > self.applicability {
            self.groups.clear();
            self.candidates.clear();
            self.applicability = applicability;
            self.groups.push(group);
            self.candidates.push(candidate.clone());
            return Offer::Replaced;
        }
        if applicability < self.applicability {
            return Offer::Discarded;
        }
        let duplicate = self
            .groups
            .iter()
            .zip(&self.candidates)
            .any(|(g, c)| *g == group && c.symbol == candidate.symbol);
        if duplicate {
            return Offer::Discarded;
        }
        self.groups.push(group);
        self.candidates.push(candidate.clone());
        Offer::Appended
    }

    pub fn applicability(&self) -> Applicability {
        self.applicability
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn clear(&mut self) {
        self.groups.clear();
        self.candidates.clear();
        self.applicability = Applicability::Hidden;
    }

    /// Kept candidates from the smallest (innermost) group.
    pub fn success(&self, keep: impl Fn(usize) -> bool) -> Vec<Candidate> {
        let best = self
            .groups
            .iter()
            .enumerate()
            .filter(|(index, _)| keep(*index))
            .map(|(_, group)| *group)
            .min();
        let Some(best) = best else {
            return Vec::new();
        };
        self.groups
            .iter()
            .zip(&self.candidates)
            .enumerate()
            .filter(|(index, (group, _))| **group == best && keep(*index))
            .map(|(_, (_, candidate))| candidate.clone())
            .collect()
    }
}

/// What the call site offers to candidates.
#[derive(Clone, Debug, Default)]
pub struct CallSite {
    pub explicit_receiver: Option<TypeRef>,
    pub argument_count: usize,
}

#[derive(Clone, Debug)]
pub struct NamedChecker {
    pub name: String,
    pub site: CallSite,
    pub set: CandidateSet,
}

impl NamedChecker {
    fn new(name: &str, site: CallSite) -> Self {
        Self {
            name: name.to_string(),
            site,
            set: CandidateSet::default(),
        }
    }

    fn consume(&mut self, classification: Classification, group: i32, candidate: &Candidate, session: &Session) -> Offer {
        let symbol = session.symbol(candidate.symbol);
        if symbol.classification() != classification || symbol.name != self.name {
            return Offer::Discarded;
        }
        let applicability = applicability_of(classification, &self.site, symbol);
        self.set.offer(group, candidate, applicability)
    }
}

fn applicability_of(classification: Classification, site: &CallSite, symbol: &Symbol) -> Applicability {
    match classification {
        Classification::Classifier => Applicability::Resolved,
        Classification::Property => receiver_applicability(site, symbol),
        Classification::Function => {
            if symbol.parameter_count() != Some(site.argument_count) {
                return Applicability::ParameterMappingError;
            }
            receiver_applicability(site, symbol)
        }
    }
}

fn receiver_applicability(site: &CallSite, symbol: &Symbol) -> Applicability {
    if symbol.receiver().is_none() != site.explicit_receiver.is_none() {
        Applicability::ParameterMappingError
    } else {
        Applicability::Resolved
    }
}

/// `x(args)` where `x` is a variable: resolve `x`, then a call-operator for it.
#[derive(Clone, Debug)]
pub struct VariableInvokeChecker {
    pub variable: NamedChecker,
    invoke_name: String,
    argument_count: usize,
    set: CandidateSet,
    matched: Vec<bool>,
    lookup_invoke: bool,
}

impl VariableInvokeChecker {
    pub fn new(variable_name: &str, invoke_name: &str, site: CallSite) -> Self {
        let argument_count = site.argument_count;
        Self {
            variable: NamedChecker::new(variable_name, site),
            invoke_name: invoke_name.to_string(),
            argument_count,
            set: CandidateSet::default(),
            matched: Vec::new(),
            lookup_invoke: false,
        }
    }

    pub fn variable_candidates(&self) -> Vec<Candidate> {
        self.variable
            .set
            .success(|index| self.matched.get(index).copied().unwrap_or(false))
    }

    fn update_names(&self, names: &mut IndexSet<String>) {
        names.insert(self.variable.name.clone());
        if self.lookup_invoke {
            names.insert(self.invoke_name.clone());
        }
    }

    fn consume(&mut self, group: i32, candidate: &Candidate, ctx: &TowerContext<'_>) {
        let offer = self
            .variable
            .consume(Classification::Property, group, candidate, ctx.session);
        if offer == Offer::Replaced {
            self.matched.clear();
        }
        if offer != Offer::Discarded
            && self.variable.set.applicability() == Applicability::Resolved
        {
            self.lookup_invoke = true;
            self.matched.resize(self.variable.set.len(), false);
            if self.lookup_operators(candidate, ctx) {
                return;
            }
        }
        self.consume_invoke(group, candidate, ctx);
    }

    /// Searches the variable's type, then every scope visited so far.
    fn lookup_operators(&mut self, variable: &Candidate, ctx: &TowerContext<'_>) -> bool {
        let variable_type = ctx.session.candidate_type(variable);
        if let Some(scope) = variable_type.cone().and_then(|ty| ctx.type_scope(ty)) {
            for invoke in scope.lookup_functions(ctx.session, &self.invoke_name) {
                self.consume_invoke(RECEIVER_GROUP, &invoke, ctx);
            }
            if self.is_resolved() {
                return true;
            }
        }
        for (index, scope) in ctx.processed().iter().enumerate() {
            for invoke in scope.lookup(ctx.session, Classification::Function, &self.invoke_name) {
                self.consume_invoke(index as i32, &invoke, ctx);
            }
            if self.is_resolved() {
                return true;
            }
        }
        false
    }

    fn is_resolved(&self) -> bool {
        self.set.applicability() == Applicability::Resolved
    }

    fn consume_invoke(&mut self, group: i32, candidate: &Candidate, ctx: &TowerContext<'_>) {
        let symbol = ctx.session.symbol(candidate.symbol);
        if symbol.name != self.invoke_name {
            return;
        }
        let Some(function) = symbol.as_function() else {
            return;
        };
        let applicability = self.invoke_applicability(group, function, ctx);
        self.set.offer(group, candidate, applicability);
    }

    fn invoke_applicability(&mut self, group: i32, invoke: &FunctionSymbol, ctx: &TowerContext<'_>) -> Applicability {
        if invoke.parameters.len() != self.argument_count {
            return Applicability::ParameterMappingError;
        }
        let count = self.variable.set.len();
        self.matched.resize(count, false);
        let indices = if group == RECEIVER_GROUP {
            count.saturating_sub(1)..count
        } else {
            0..count
        };
        let mut applicable = false;
        for index in indices {
            let variable = &self.variable.set.candidates()[index];
            if invoke_applicable_on(group, variable, invoke, ctx) {
                self.matched[index] = true;
                applicable = true;
            }
        }
        if applicable {
            Applicability::Resolved
        } else {
            Applicability::ParameterMappingError
        }
    }
}

/// Operators from the variable's own type always apply; elsewhere only an
/// extension whose receiver class is the variable's class or an ancestor.
fn invoke_applicable_on(group: i32, variable: &Candidate, invoke: &FunctionSymbol, ctx: &TowerContext<'_>) -> bool {
    if group == RECEIVER_GROUP {
        return true;
    }
    let Some(receiver_class) = invoke
        .receiver
        .as_ref()
        .and_then(TypeRef::cone)
        .and_then(|ty| ty.class_id())
    else {
        return false;
    };
    let variable_type = ctx.session.candidate_type(variable);
    match variable_type.cone().and_then(|ty| ty.class_id()) {
        Some(class) => ctx.session.is_subclass_of(class, receiver_class),
        None => false,
    }
}

#[derive(Clone, Debug)]
pub enum Checker {
    Classifier(NamedChecker),
    Variable(NamedChecker),
    Function(NamedChecker),
    VariableInvoke(VariableInvokeChecker),
}

impl Checker {
    pub fn classifier(name: &str, site: CallSite) -> Self {
        Checker::Classifier(NamedChecker::new(name, site))
    }

    pub fn variable(name: &str, site: CallSite) -> Self {
        Checker::Variable(NamedChecker::new(name, site))
    }

    pub fn function(name: &str, site: CallSite) -> Self {
        Checker::Function(NamedChecker::new(name, site))
    }

    pub fn variable_invoke(name: &str, invoke_name: &str, site: CallSite) -> Self {
        Checker::VariableInvoke(VariableInvokeChecker::new(name, invoke_name, site))
    }

    pub fn update_names(&self, names: &mut IndexSet<String>) {
        match self {
            Checker::Classifier(checker) | Checker::Variable(checker) | Checker::Function(checker) => {
                names.insert(checker.name.clone());
            }
            Checker::VariableInvoke(checker) => checker.update_names(names),
        }
    }

    pub fn consume_candidate(&mut self, group: i32, candidate: &Candidate, ctx: &TowerContext<'_>) {
        match self {
            Checker::Classifier(checker) => {
                checker.consume(Classification::Classifier, group, candidate, ctx.session);
            }
            Checker::Variable(checker) => {
                checker.consume(Classification::Property, group, candidate, ctx.session);
            }
            Checker::Function(checker) => {
                checker.consume(Classification::Function, group, candidate, ctx.session);
            }
            Checker::VariableInvoke(checker) => checker.consume(group, candidate, ctx),
        }
    }

    pub fn applicability(&self) -> Applicability {
        self.candidate_set().applicability()
    }

    pub fn success_candidates(&self) -> Vec<Candidate> {
        self.candidate_set().success(|_| true)
    }

    pub fn candidate_set(&self) -> &CandidateSet {
        match self {
            Checker::Classifier(checker) | Checker::Variable(checker) | Checker::Function(checker) => {
                &checker.set
            }
            Checker::VariableInvoke(checker) => &checker.set,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Checker::Classifier(_) => "classifier",
            Checker::Variable(_) => "variable",
            Checker::Function(_) => "function",
            Checker::VariableInvoke(_) => "variable-invoke",
        }
    }
}
