//! Calculation of the LR(1) parse table with conflict detection.

use crate::{
    grammar::{Grammar, NonterminalID, RuleID, SymbolID, TerminalID},
    state_automaton::{StateAutomaton, StateID},
    types::Map,
    util::display_fn,
};
use indexmap::map::Entry;
use std::fmt;

/// The action that the LR automaton in a state performs on a particular
/// lookahead symbol.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    /// Read a lookahead symbol and transition to the specified state.
    Shift(StateID),

    /// Reduce to the specified production rule.
    Reduce(RuleID),

    Accept,
}

impl Action {
    /// Return `true` if this action wins over `current` when both compete
    /// for the same table cell.
    ///
    /// Shift beats reduce, the lower rule wins among reduces, and accept
    /// beats everything.
    fn supersedes(&self, current: &Action) -> bool {
        use Action::*;
        match (current, self) {
            (Accept, _) => false,
            (_, Accept) => true,
            (Reduce(..), Shift(..)) => true,
            (Shift(..), Reduce(..)) => false,
            (Reduce(current), Reduce(new)) => new < current,
            (Shift(..), Shift(..)) => false,
        }
    }
}

// `sN`, `rN` or `acc`
impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shift(next) => write!(f, "s{}", next),
            Self::Reduce(rule) => write!(f, "r{}", rule),
            Self::Accept => f.write_str("acc"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConflictKind {
    ShiftReduce,
    ReduceReduce,
    Unknown,
}

impl ConflictKind {
    fn classify(first: &Action, second: &Action) -> Self {
        use Action::*;
        match (first, second) {
            (Shift(..), Reduce(..)) | (Reduce(..), Shift(..)) => Self::ShiftReduce,
            (Reduce(..), Reduce(..)) => Self::ReduceReduce,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShiftReduce => f.write_str("shift-reduce"),
            Self::ReduceReduce => f.write_str("reduce-reduce"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// Two actions that competed for the same table cell.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct Conflict {
    pub kind: ConflictKind,
    /// The action held by the cell when the conflict was detected.
    pub first: Action,
    /// The action that was about to be installed.
    pub second: Action,
}

impl Conflict {
    /// Return the action that ended up in the cell.
    pub fn resolved(&self) -> Action {
        if self.second.supersedes(&self.first) {
            self.second
        } else {
            self.first
        }
    }
}

#[derive(Debug, Default)]
#[non_exhaustive]
pub struct ParseTableRow {
    pub actions: Map<TerminalID, Action>,
    pub gotos: Map<NonterminalID, StateID>,
}

#[derive(Debug)]
pub struct ParseTable {
    rows: Vec<ParseTableRow>,
    conflicts: Map<(StateID, TerminalID), Conflict>,
}

impl ParseTable {
    #[tracing::instrument(skip_all)]
    pub fn generate(g: &Grammar, automaton: &StateAutomaton) -> Self {
        let mut table = Self {
            rows: (0..automaton.len()).map(|_| ParseTableRow::default()).collect(),
            conflicts: Map::default(),
        };

        for (id, state) in automaton.states() {
            for item in state.items() {
                match item.next_symbol(g) {
                    // reduce, accept
                    None => {
                        if item.rule() == RuleID::ACCEPT {
                            if item.lookahead() == TerminalID::EOI {
                                table.install(id, TerminalID::EOI, Action::Accept);
                            }
                        } else {
                            table.install(id, item.lookahead(), Action::Reduce(item.rule()));
                        }
                    }

                    // shift, goto
                    Some(symbol) => {
                        let target = match state.transition(symbol) {
                            Some(target) => target,
                            None => continue,
                        };
                        match symbol {
                            SymbolID::T(t) => table.install(id, t, Action::Shift(target)),
                            SymbolID::N(n) => {
                                table.rows[id.index()].gotos.insert(n, target);
                            }
                        }
                    }
                }
            }
        }

        tracing::debug!(
            "parse table: {} states, {} conflicts",
            table.rows.len(),
            table.conflicts.len()
        );

        table
    }

    fn install(&mut self, state: StateID, terminal: TerminalID, action: Action) {
        let row = &mut self.rows[state.index()];
        match row.actions.entry(terminal) {
            Entry::Vacant(entry) => {
                entry.insert(action);
            }
            Entry::Occupied(mut entry) => {
                let current = *entry.get();
                if current == action {
                    return;
                }
                let conflict = Conflict {
                    kind: ConflictKind::classify(&current, &action),
                    first: current,
                    second: action,
                };
                tracing::debug!(
                    "{} conflict at state {}: {} vs {}",
                    conflict.kind,
                    state,
                    current,
                    action
                );
                if action.supersedes(&current) {
                    entry.insert(action);
                }
                self.conflicts.insert((state, terminal), conflict);
            }
        }
    }

    /// Return the number of states (rows).
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> impl Iterator<Item = (StateID, &ParseTableRow)> + '_ {
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| (StateID::from_index(i), row))
    }

    /// Return the action at `(state, terminal)`, or `None` if no item
    /// demands an action there.
    pub fn action(&self, state: StateID, terminal: TerminalID) -> Option<Action> {
        self.rows
            .get(state.index())
            .and_then(|row| row.actions.get(&terminal).copied())
    }

    pub fn goto(&self, state: StateID, symbol: NonterminalID) -> Option<StateID> {
        self.rows
            .get(state.index())
            .and_then(|row| row.gotos.get(&symbol).copied())
    }

    pub fn conflicts(&self) -> impl Iterator<Item = (StateID, TerminalID, &Conflict)> + '_ {
        self.conflicts
            .iter()
            .map(|((state, terminal), conflict)| (*state, *terminal, conflict))
    }

    pub fn conflict(&self, state: StateID, terminal: TerminalID) -> Option<&Conflict> {
        self.conflicts.get(&(state, terminal))
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    /// Return `true` if the grammar is LR(1), i.e. no conflict was recorded.
    pub fn is_lr1(&self) -> bool {
        !self.has_conflicts()
    }

    pub fn display<'a>(&'a self, g: &'a Grammar) -> impl fmt::Display + 'a {
        display_fn(move |f| {
            let terminals: Vec<_> = g.terminals().collect();
            let nonterminals: Vec<_> = g
                .nonterminals()
                .filter(|n| n.id() != NonterminalID::START)
                .collect();

            let mut header = vec!["STATE".to_owned()];
            header.extend(terminals.iter().map(|t| t.name().to_owned()));
            header.extend(nonterminals.iter().map(|n| n.name().to_owned()));

            let mut lines = vec![header];
            for (id, row) in self.rows() {
                let mut line = vec![id.to_string()];
                line.extend(terminals.iter().map(|t| {
                    row.actions
                        .get(&t.id())
                        .map_or_else(String::new, |action| action.to_string())
                }));
                line.extend(nonterminals.iter().map(|n| {
                    row.gotos
                        .get(&n.id())
                        .map_or_else(String::new, |target| target.to_string())
                }));
                lines.push(line);
            }

            let widths: Vec<usize> = (0..lines[0].len())
                .map(|i| {
                    lines
                        .iter()
                        .map(|line| line[i].chars().count())
                        .max()
                        .unwrap_or(0)
                })
                .collect();

            for line in &lines {
                for (i, (cell, width)) in line.iter().zip(&widths).enumerate() {
                    // ACTION と GOTO の境界
                    let sep = match i {
                        0 => "",
                        _ if i == terminals.len() + 1 => " || ",
                        _ => " | ",
                    };
                    write!(f, "{}{:<width$}", sep, cell, width = width)?;
                }
                writeln!(f)?;
            }
            Ok(())
        })
    }

    pub fn display_conflicts<'a>(&'a self, g: &'a Grammar) -> impl fmt::Display + 'a {
        display_fn(move |f| {
            for (state, terminal, conflict) in self.conflicts() {
                writeln!(
                    f,
                    "state {}, on {}: {} ({} vs {}, resolved as {})",
                    state,
                    g.terminal(terminal),
                    conflict.kind,
                    conflict.first,
                    conflict.second,
                    conflict.resolved()
                )?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item_automaton::ItemAutomaton;

    fn generate(source: &str) -> (Grammar, StateAutomaton, ParseTable) {
        let g = Grammar::parse(source).unwrap();
        let states = StateAutomaton::generate(&ItemAutomaton::generate(&g));
        let table = ParseTable::generate(&g, &states);
        eprintln!("{}", table.display(&g));
        (g, states, table)
    }

    fn terminal(g: &Grammar, name: &str) -> TerminalID {
        g.terminal_by_name(name).unwrap()
    }

    #[test]
    fn action_display() {
        assert_eq!(Action::Shift(StateID::START).to_string(), "s0");
        assert_eq!(Action::Reduce(RuleID::ACCEPT).to_string(), "r0");
        assert_eq!(Action::Accept.to_string(), "acc");
    }

    #[test]
    fn lr1_grammar_has_no_conflicts() {
        let (g, states, table) = generate("S -> L = R\nS -> R\nL -> * R\nL -> id\nR -> L");
        assert!(table.is_lr1());
        assert_eq!(table.len(), states.len());

        // Every cell is demanded by some item of its state.
        for (id, row) in table.rows() {
            let state = states.state(id);
            for (terminal, action) in &row.actions {
                let demanded = state.items().iter().any(|item| match action {
                    Action::Shift(..) => item.next_symbol(&g) == Some(SymbolID::T(*terminal)),
                    Action::Reduce(rule) => {
                        item.is_reducible(&g) && item.rule() == *rule && item.lookahead() == *terminal
                    }
                    Action::Accept => item.rule() == RuleID::ACCEPT && item.is_reducible(&g),
                });
                assert!(demanded, "state {} on {}", id, g.terminal(*terminal));
            }
        }

        // Every item demanding an action has its cell filled.
        for (id, state) in states.states() {
            for item in state.items() {
                match item.next_symbol(&g) {
                    None if item.rule() == RuleID::ACCEPT => {
                        assert_eq!(table.action(id, TerminalID::EOI), Some(Action::Accept));
                    }
                    None => assert_eq!(
                        table.action(id, item.lookahead()),
                        Some(Action::Reduce(item.rule())),
                        "state {} on {}",
                        id,
                        item.display(&g)
                    ),
                    Some(SymbolID::T(t)) => assert_eq!(
                        table.action(id, t),
                        state.transition(SymbolID::T(t)).map(Action::Shift),
                        "state {} on {}",
                        id,
                        item.display(&g)
                    ),
                    Some(SymbolID::N(n)) => {
                        assert!(table.goto(id, n).is_some());
                        assert_eq!(table.goto(id, n), state.transition(SymbolID::N(n)));
                    }
                }
            }
        }
    }

    #[test]
    fn accept_on_end_marker() {
        let (g, states, table) = generate("S -> a");
        let start = states.state(StateID::START);
        let after_s = start.transition(SymbolID::N(g.start_symbol())).unwrap();
        assert_eq!(table.action(after_s, TerminalID::EOI), Some(Action::Accept));
        assert_eq!(table.goto(StateID::START, g.start_symbol()), Some(after_s));
        assert!(matches!(
            table.action(StateID::START, terminal(&g, "a")),
            Some(Action::Shift(..))
        ));
        assert_eq!(table.action(StateID::START, TerminalID::EOI), None);
    }

    #[test]
    fn dangling_else_prefers_shift() {
        let (g, _states, table) =
            generate("S -> if E then S\nS -> if E then S else S\nS -> other\nE -> cond");
        assert!(!table.is_lr1());

        let else_ = terminal(&g, "else");
        let conflicts: Vec<_> = table.conflicts().collect();
        assert!(!conflicts.is_empty());
        for (state, terminal, conflict) in conflicts {
            assert_eq!(terminal, else_);
            assert_eq!(conflict.kind, ConflictKind::ShiftReduce);
            assert!(matches!(conflict.resolved(), Action::Shift(..)));
            assert_eq!(table.action(state, terminal), Some(conflict.resolved()));
            assert_eq!(table.conflict(state, terminal), Some(conflict));
        }
        assert_eq!(table.conflict(StateID::START, else_), None);
        eprintln!("{}", table.display_conflicts(&g));
    }

    #[test]
    fn reduce_reduce_keeps_lower_rule() {
        let (g, _states, table) = generate("S -> A\nS -> B\nA -> x\nB -> x");
        let conflicts: Vec<_> = table.conflicts().collect();
        assert_eq!(conflicts.len(), 1);

        let (state, terminal, conflict) = conflicts[0];
        assert_eq!(terminal, TerminalID::EOI);
        assert_eq!(conflict.kind, ConflictKind::ReduceReduce);

        let a_rule = g.productions_of("A")[0];
        assert_eq!(table.action(state, terminal), Some(Action::Reduce(a_rule)));
        assert_eq!(conflict.resolved(), Action::Reduce(a_rule));
    }

    #[test]
    fn conflict_resolution_order() {
        let shift = Action::Shift(StateID::START);
        let r1 = Action::Reduce(RuleID::ACCEPT);
        assert!(shift.supersedes(&r1));
        assert!(!r1.supersedes(&shift));
        assert!(Action::Accept.supersedes(&shift));
        assert!(!shift.supersedes(&Action::Accept));
        assert_eq!(
            ConflictKind::classify(&Action::Accept, &r1),
            ConflictKind::Unknown
        );
    }

    #[test]
    fn epsilon_reduce_actions() {
        let (g, _states, table) = generate("S -> a A b\nA -> ε\nA -> c");
        let a_eps = g.productions_of("A")[0];
        assert!(table.is_lr1());

        // After `a`, the empty production is reduced on `b`.
        let after_a = match table.action(StateID::START, terminal(&g, "a")) {
            Some(Action::Shift(next)) => next,
            other => panic!("unexpected action: {:?}", other),
        };
        assert_eq!(
            table.action(after_a, terminal(&g, "b")),
            Some(Action::Reduce(a_eps))
        );
        assert!(matches!(
            table.action(after_a, terminal(&g, "c")),
            Some(Action::Shift(..))
        ));
        let a = match g.symbol("A") {
            Some(SymbolID::N(a)) => a,
            _ => unreachable!(),
        };
        assert!(table.goto(after_a, a).is_some());
    }
}
