//! The entry point that runs the whole pipeline from grammar text to a parse
//! table (and optionally a simulation), collecting diagnostics on the way.

use crate::{
    grammar::{Grammar, GrammarError, TerminalID},
    item_automaton::ItemAutomaton,
    simulator::{Config, Simulation, Simulator},
    state_automaton::StateAutomaton,
    table::ParseTable,
};
use std::{
    any::Any,
    fmt,
    panic::{self, AssertUnwindSafe},
};

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("malformed grammar: {}", _0)]
    MalformedGrammar(#[from] GrammarError),

    #[error("construction failed: {}", _0)]
    BuildFailure(String),
}

/// Everything derived from a successfully parsed grammar.
#[derive(Debug)]
#[non_exhaustive]
pub struct Artifacts {
    pub grammar: Grammar,
    pub items: ItemAutomaton,
    pub states: StateAutomaton,
    pub table: ParseTable,
    pub simulation: Option<Simulation>,
}

impl Artifacts {
    fn construct(grammar: Grammar, input: Option<&str>, config: &Config) -> Self {
        let items = ItemAutomaton::generate(&grammar);
        let states = StateAutomaton::generate(&items);
        let table = ParseTable::generate(&grammar, &states);
        let simulation =
            input.map(|input| Simulator::with_config(&grammar, &table, config.clone()).run(input));
        Self {
            grammar,
            items,
            states,
            table,
            simulation,
        }
    }
}

#[derive(Debug)]
pub struct Analysis {
    artifacts: Option<Artifacts>,
    errors: Vec<BuildError>,
}

impl Analysis {
    /// Build the automata and the parse table of the grammar `source`, and
    /// run the parser over `input` if given.
    pub fn build(source: &str, input: Option<&str>) -> Self {
        Self::build_with(source, input, &Config::default())
    }

    #[tracing::instrument(skip_all)]
    pub fn build_with(source: &str, input: Option<&str>, config: &Config) -> Self {
        let mut errors = vec![];

        let artifacts = match Grammar::parse(source) {
            Ok(grammar) => {
                let constructed = panic::catch_unwind(AssertUnwindSafe(|| {
                    Artifacts::construct(grammar, input, config)
                }));
                match constructed {
                    Ok(artifacts) => Some(artifacts),
                    Err(payload) => {
                        errors.push(BuildError::BuildFailure(panic_message(&*payload)));
                        None
                    }
                }
            }
            Err(err) => {
                errors.push(err.into());
                None
            }
        };

        for err in &errors {
            tracing::debug!("build error: {}", err);
        }

        Self { artifacts, errors }
    }

    pub fn is_built(&self) -> bool {
        self.artifacts.is_some()
    }

    pub fn errors(&self) -> &[BuildError] {
        &self.errors[..]
    }

    /// Return the built artifacts, or `None` if the build failed.
    pub fn artifacts(&self) -> Option<&Artifacts> {
        self.artifacts.as_ref()
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary {
            built: self.is_built(),
            errors: self.errors.iter().map(|err| err.to_string()).collect(),
            ..Summary::default()
        };
        if let Some(a) = &self.artifacts {
            let g = &a.grammar;
            summary.rules = g.rules().len();
            summary.terminals = g.terminals().filter(|t| t.id() != TerminalID::EOI).count();
            summary.nonterminals = g.nonterminals().count();
            summary.start_symbol = Some(g.nonterminal(g.start_symbol()).name().to_owned());
            summary.items = a.items.len();
            summary.states = a.states.len();
            summary.conflicts = a.table.conflicts().count();
            summary.is_lr1 = a.table.is_lr1();
            summary.accepted = a.simulation.as_ref().map(|sim| sim.is_accepted());
        }
        summary
    }
}

/// Aggregate counts of a build.
///
/// `rules` and `nonterminals` include the augmented rule and start symbol;
/// `terminals` does not include the end marker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct Summary {
    pub built: bool,
    pub errors: Vec<String>,
    pub rules: usize,
    pub terminals: usize,
    pub nonterminals: usize,
    pub start_symbol: Option<String>,
    pub items: usize,
    pub states: usize,
    pub conflicts: usize,
    pub is_lr1: bool,
    pub accepted: Option<bool>,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.built {
            writeln!(f, "status: not built")?;
            for err in &self.errors {
                writeln!(f, "error: {}", err)?;
            }
            return Ok(());
        }

        writeln!(f, "status: built")?;
        writeln!(
            f,
            "grammar: {} rules, {} terminals, {} nonterminals, start symbol {}",
            self.rules,
            self.terminals,
            self.nonterminals,
            self.start_symbol.as_deref().unwrap_or("-"),
        )?;
        writeln!(f, "item automaton: {} items", self.items)?;
        writeln!(f, "state automaton: {} states", self.states)?;
        writeln!(
            f,
            "table: {} conflicts ({})",
            self.conflicts,
            if self.is_lr1 { "LR(1)" } else { "not LR(1)" }
        )?;
        if let Some(accepted) = self.accepted {
            writeln!(
                f,
                "input: {}",
                if accepted { "accepted" } else { "rejected" }
            )?;
        }
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_owned()
    }
}
