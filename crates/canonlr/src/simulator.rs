//! Table-driven simulation of the LR(1) parser over a token sequence.

use crate::{
    grammar::{Grammar, RuleID, TerminalID},
    state_automaton::StateID,
    table::{Action, ParseTable},
    util::write_joined,
};
use std::fmt;

const DEFAULT_MAX_STEPS: usize = 1000;

/// The configuration of a simulation run.
#[derive(Debug, Clone)]
pub struct Config {
    max_steps: usize,
}

impl Config {
    pub const fn new() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// Set the number of actions after which the run is aborted.
    pub fn max_steps(&mut self, max_steps: usize) -> &mut Self {
        self.max_steps = max_steps;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimulationError {
    #[error("no action is defined for state {state} on symbol `{symbol}'")]
    NoAction { state: StateID, symbol: String },

    #[error("no GOTO transition from state {state} on symbol `{nonterminal}'")]
    NoGoto { state: StateID, nonterminal: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Accepted,
    Rejected(SimulationError),
    /// The run did not finish within the configured number of steps.
    Aborted { max_steps: usize },
}

impl Outcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted => f.write_str("accepted"),
            Self::Rejected(err) => write!(f, "rejected: {}", err),
            Self::Aborted { max_steps } => {
                write!(f, "aborted: exceeded the limit of {} steps", max_steps)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    Shift { state: StateID, symbol: String },
    Reduce { rule: RuleID, text: String },
    Accept,
    Error { message: String },
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shift { state, .. } => write!(f, "shift {}", state),
            Self::Reduce { rule, text } => write!(f, "reduce {} ({})", rule, text),
            Self::Accept => f.write_str("accept"),
            Self::Error { message } => write!(f, "error: {}", message),
        }
    }
}

/// A snapshot of the parser taken just after an action was performed.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Step {
    /// 1-based
    pub index: usize,
    pub action: StepAction,
    pub stack: Vec<StateID>,
    /// The unconsumed input, terminated by `$`.
    pub input: Vec<String>,
    /// The number of consumed tokens.
    pub position: usize,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>4} | ", self.index)?;
        write_joined(f, " ", &self.stack)?;
        f.write_str(" | ")?;
        write_joined(f, " ", &self.input)?;
        write!(f, " | {}", self.action)
    }
}

/// The result of a simulation run.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Simulation {
    pub tokens: Vec<String>,
    pub trace: Vec<Step>,
    pub outcome: Outcome,
    pub stack: Vec<StateID>,
    pub remaining: Vec<String>,
    pub position: usize,
    /// The number of performed actions.
    pub steps: usize,
}

impl Simulation {
    pub fn is_accepted(&self) -> bool {
        self.outcome.is_accepted()
    }

    pub fn error(&self) -> Option<&SimulationError> {
        match &self.outcome {
            Outcome::Rejected(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct Simulator<'a> {
    grammar: &'a Grammar,
    table: &'a ParseTable,
    config: Config,
}

impl<'a> Simulator<'a> {
    pub fn new(grammar: &'a Grammar, table: &'a ParseTable) -> Self {
        Self::with_config(grammar, table, Config::default())
    }

    pub fn with_config(grammar: &'a Grammar, table: &'a ParseTable, config: Config) -> Self {
        Self {
            grammar,
            table,
            config,
        }
    }

    /// Run the parser over the whitespace-separated tokens of `input`.
    #[tracing::instrument(skip(self))]
    pub fn run(&self, input: &str) -> Simulation {
        let tokens: Vec<String> = input.split_whitespace().map(str::to_owned).collect();
        let mut machine = Machine {
            g: self.grammar,
            table: self.table,
            stack: vec![StateID::START],
            input: tokens
                .iter()
                .cloned()
                .chain(Some(self.grammar.terminal(TerminalID::EOI).name().to_owned()))
                .collect(),
            position: 0,
            steps: 0,
            trace: vec![],
        };

        let outcome = loop {
            if machine.steps >= self.config.max_steps {
                let outcome = Outcome::Aborted {
                    max_steps: self.config.max_steps,
                };
                machine.record(
                    machine.steps + 1,
                    StepAction::Error {
                        message: outcome.to_string(),
                    },
                );
                break outcome;
            }
            machine.steps += 1;

            match machine.step() {
                Ok(true) => break Outcome::Accepted,
                Ok(false) => continue,
                Err(err) => {
                    machine.record(
                        machine.steps,
                        StepAction::Error {
                            message: err.to_string(),
                        },
                    );
                    break Outcome::Rejected(err);
                }
            }
        };

        tracing::debug!("simulation finished after {} steps: {}", machine.steps, outcome);

        Simulation {
            remaining: machine.remaining(),
            tokens,
            trace: machine.trace,
            outcome,
            stack: machine.stack,
            position: machine.position,
            steps: machine.steps,
        }
    }
}

struct Machine<'a> {
    g: &'a Grammar,
    table: &'a ParseTable,
    stack: Vec<StateID>,
    input: Vec<String>,
    position: usize,
    steps: usize,
    trace: Vec<Step>,
}

impl Machine<'_> {
    fn top(&self) -> StateID {
        self.stack.last().copied().unwrap_or(StateID::START)
    }

    fn remaining(&self) -> Vec<String> {
        self.input.get(self.position..).unwrap_or(&[]).to_vec()
    }

    fn lookahead(&self) -> (Option<TerminalID>, &str) {
        // 末尾の `$` のみを入力終端として扱う
        if self.position + 1 >= self.input.len() {
            return (Some(TerminalID::EOI), self.g.terminal(TerminalID::EOI).name());
        }
        let name = self.input[self.position].as_str();
        let terminal = self
            .g
            .terminal_by_name(name)
            .filter(|&t| t != TerminalID::EOI);
        (terminal, name)
    }

    /// Perform one action. Return `true` if the input has been accepted.
    fn step(&mut self) -> Result<bool, SimulationError> {
        let g = self.g;
        let state = self.top();
        let (terminal, symbol) = self.lookahead();
        let action = terminal.and_then(|t| self.table.action(state, t));
        let action = match action {
            Some(action) => action,
            None => {
                return Err(SimulationError::NoAction {
                    state,
                    symbol: symbol.to_owned(),
                })
            }
        };

        match action {
            Action::Shift(next) => {
                let symbol = symbol.to_owned();
                self.stack.push(next);
                self.position += 1;
                self.record(self.steps, StepAction::Shift { state: next, symbol });
                Ok(false)
            }

            Action::Reduce(rule_id) => {
                let rule = g.rule(rule_id);
                // 底の状態は取り除かない
                let n = rule.right().len().min(self.stack.len().saturating_sub(1));
                self.stack.truncate(self.stack.len() - n);

                let state = self.top();
                let next = self.table.goto(state, rule.left()).ok_or_else(|| {
                    SimulationError::NoGoto {
                        state,
                        nonterminal: g.nonterminal(rule.left()).name().to_owned(),
                    }
                })?;
                self.stack.push(next);
                self.record(
                    self.steps,
                    StepAction::Reduce {
                        rule: rule_id,
                        text: rule.display(g).to_string(),
                    },
                );
                Ok(false)
            }

            Action::Accept => {
                self.record(self.steps, StepAction::Accept);
                Ok(true)
            }
        }
    }

    fn record(&mut self, index: usize, action: StepAction) {
        let step = Step {
            index,
            action,
            stack: self.stack.clone(),
            input: self.remaining(),
            position: self.position,
        };
        tracing::trace!("{}", step);
        self.trace.push(step);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{item_automaton::ItemAutomaton, state_automaton::StateAutomaton};

    fn simulate(source: &str, input: &str, config: Config) -> Simulation {
        let g = Grammar::parse(source).unwrap();
        let states = StateAutomaton::generate(&ItemAutomaton::generate(&g));
        let table = ParseTable::generate(&g, &states);
        let sim = Simulator::with_config(&g, &table, config).run(input);
        for step in &sim.trace {
            eprintln!("{}", step);
        }
        sim
    }

    const EXPR: &str = "E -> E + T\nE -> T\nT -> id";

    #[test]
    fn accept_expression() {
        let sim = simulate(EXPR, "id + id + id", Config::default());
        assert_eq!(sim.outcome, Outcome::Accepted);
        assert_eq!(sim.tokens, ["id", "+", "id", "+", "id"]);

        let shifts: Vec<&str> = sim
            .trace
            .iter()
            .filter_map(|step| match &step.action {
                StepAction::Shift { symbol, .. } => Some(&symbol[..]),
                _ => None,
            })
            .collect();
        assert_eq!(shifts, ["id", "+", "id", "+", "id"]);

        let reduces: Vec<usize> = sim
            .trace
            .iter()
            .filter_map(|step| match &step.action {
                StepAction::Reduce { rule, .. } => Some(rule.index()),
                _ => None,
            })
            .collect();
        assert_eq!(reduces, [3, 2, 3, 1, 3, 1]);

        // 0 と goto(0, E) のみが残る
        assert_eq!(sim.stack.len(), 2);
        assert_eq!(sim.stack[0], StateID::START);
        assert_eq!(sim.remaining, ["$"]);
        assert_eq!(sim.position, 5);

        let last = sim.trace.last().unwrap();
        assert_eq!(last.action, StepAction::Accept);
        assert_eq!(last.stack, sim.stack);
        assert_eq!(last.input, ["$"]);
    }

    #[test]
    fn steps_are_consecutive() {
        let sim = simulate(EXPR, "id + id", Config::default());
        for (i, step) in sim.trace.iter().enumerate() {
            assert_eq!(step.index, i + 1);
        }
        assert_eq!(sim.steps, sim.trace.len());
    }

    #[test]
    fn reduce_text() {
        let sim = simulate(EXPR, "id", Config::default());
        assert_eq!(sim.trace[1].action.to_string(), "reduce 3 (T -> id)");
        assert_eq!(
            sim.trace[0].action.to_string(),
            format!("shift {}", sim.trace[0].stack[1])
        );
    }

    #[test]
    fn reject_unexpected_symbol() {
        let sim = simulate("S -> a", "b", Config::default());
        assert_eq!(
            sim.outcome,
            Outcome::Rejected(SimulationError::NoAction {
                state: StateID::START,
                symbol: "b".into(),
            })
        );
        assert_eq!(sim.trace.len(), 1);
        assert!(matches!(sim.trace[0].action, StepAction::Error { .. }));
        assert_eq!(sim.trace[0].input, ["b", "$"]);
        assert_eq!(sim.position, 0);
    }

    #[test]
    fn reject_premature_end() {
        let sim = simulate(EXPR, "id +", Config::default());
        match sim.error() {
            Some(SimulationError::NoAction { symbol, .. }) => assert_eq!(symbol, "$"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(sim.remaining, ["$"]);
    }

    #[test]
    fn empty_input() {
        let sim = simulate("S -> a S\nS -> ε", "", Config::default());
        assert!(sim.is_accepted());
        assert!(sim.tokens.is_empty());

        let sim = simulate("S -> a", "", Config::default());
        assert!(!sim.is_accepted());
    }

    #[test]
    fn epsilon_production_pops_nothing() {
        let sim = simulate("S -> a A b\nA -> ε\nA -> c", "a b", Config::default());
        assert!(sim.is_accepted());

        // a をシフトした直後に A -> ε を還元してもスタックは縮まない
        let shift = &sim.trace[0];
        let reduce = &sim.trace[1];
        assert_eq!(reduce.action.to_string(), "reduce 2 (A -> ε)");
        assert_eq!(reduce.stack.len(), shift.stack.len() + 1);
        assert_eq!(reduce.stack[..shift.stack.len()], shift.stack[..]);

        let sim = simulate("S -> a A b\nA -> ε\nA -> c", "a c b", Config::default());
        assert!(sim.is_accepted());
    }

    #[test]
    fn abort_after_max_steps() {
        let mut config = Config::new();
        config.max_steps(3);
        let sim = simulate(EXPR, "id + id + id", config);
        assert_eq!(sim.outcome, Outcome::Aborted { max_steps: 3 });
        assert_eq!(sim.steps, 3);
        assert_eq!(sim.trace.len(), 4);
        assert_eq!(sim.trace[3].index, 4);
        assert!(matches!(sim.trace[3].action, StepAction::Error { .. }));
    }

    #[test]
    fn end_marker_in_input_is_not_a_terminal() {
        let sim = simulate("S -> a", "$", Config::default());
        assert_eq!(
            sim.error(),
            Some(&SimulationError::NoAction {
                state: StateID::START,
                symbol: "$".into(),
            })
        );
        assert_eq!(sim.remaining, ["$", "$"]);
    }
}
