//! Grammar types.

use crate::{
    first_sets::{FirstSet, FirstSets, FollowSets},
    types::{Map, Set},
    util::{display_fn, write_joined},
};
use std::{fmt, fs, io, path::Path, str::FromStr};

/// The separator between the left-hand and the right-hand side of a rule.
pub const ARROW: &str = "->";

/// The marker displayed in place of an empty right-hand side.
pub const EPSILON: &str = "ε";

const EPSILON_ALIASES: &[&str] = &[EPSILON, "epsilon"];

const EOI_NAME: &str = "$";
const START_NAME: &str = "S'";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TerminalID {
    raw: u16,
}

impl TerminalID {
    /// Reserved symbol used as a terminal symbol that means the end of input.
    pub const EOI: Self = Self::new(0);

    const OFFSET: u16 = 1;

    #[inline]
    const fn new(raw: u16) -> Self {
        Self { raw }
    }
}

#[derive(Debug)]
pub struct Terminal {
    id: TerminalID,
    name: String,
}

impl Terminal {
    pub fn id(&self) -> TerminalID {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NonterminalID {
    raw: u16,
}

impl NonterminalID {
    /// The synthetic start symbol introduced by the augmentation.
    pub const START: Self = Self::new(0);

    const OFFSET: u16 = 1;

    #[inline]
    const fn new(raw: u16) -> Self {
        Self { raw }
    }
}

#[derive(Debug)]
pub struct Nonterminal {
    id: NonterminalID,
    name: String,
}

impl Nonterminal {
    pub fn id(&self) -> NonterminalID {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Nonterminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SymbolID {
    T(TerminalID),
    N(NonterminalID),
}

/// The position of a production rule in the grammar's rule list.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct RuleID {
    raw: u16,
}

impl RuleID {
    /// The augmented rule `S' -> <start>`.
    pub const ACCEPT: Self = Self::new(0);

    #[inline]
    const fn new(raw: u16) -> Self {
        Self { raw }
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.raw as usize
    }
}

impl fmt::Display for RuleID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.raw, f)
    }
}

/// The type that represents a production rule in grammar.
#[derive(Debug)]
pub struct Rule {
    id: RuleID,
    left: NonterminalID,
    right: Vec<SymbolID>,
}

impl Rule {
    pub fn id(&self) -> RuleID {
        self.id
    }

    /// Return the left-hand side of this production.
    pub fn left(&self) -> NonterminalID {
        self.left
    }

    /// Return the right-hand side of this production.
    ///
    /// The slice is empty for an epsilon production.
    pub fn right(&self) -> &[SymbolID] {
        &self.right[..]
    }

    pub fn is_epsilon(&self) -> bool {
        self.right.is_empty()
    }

    // `"LHS -> R1 R2 R3"`
    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            write!(f, "{} {}", g.nonterminals[&self.left], ARROW)?;
            if self.right.is_empty() {
                return write!(f, " {}", EPSILON);
            }
            for symbol in &self.right {
                write!(f, " {}", g.symbol_name(*symbol))?;
            }
            Ok(())
        })
    }
}

/// The grammar definition used to derive the automata and the parse table.
///
/// A grammar is immutable once constructed. Its FIRST and FOLLOW sets are
/// computed at construction time and live as long as the grammar itself.
#[derive(Debug)]
pub struct Grammar {
    terminals: Map<TerminalID, Terminal>,
    nonterminals: Map<NonterminalID, Nonterminal>,
    rules: Vec<Rule>,
    productions: Map<NonterminalID, Vec<RuleID>>,
    symbols: Map<String, SymbolID>,
    start_symbol: NonterminalID,
    first_sets: FirstSets,
    follow_sets: FollowSets,
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "## terminals:")?;
        for terminal in self.terminals() {
            writeln!(f, "{}", terminal)?;
        }

        writeln!(f, "\n## nonterminals:")?;
        for nonterminal in self.nonterminals.values() {
            write!(f, "{}", nonterminal)?;
            if nonterminal.id() == self.start_symbol {
                write!(f, " (start)")?;
            }
            writeln!(f)?;
        }

        writeln!(f, "\n## rules:")?;
        for rule in &self.rules {
            writeln!(f, "{}: {}", rule.id(), rule.display(self))?;
        }

        Ok(())
    }
}

impl FromStr for Grammar {
    type Err = GrammarError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        Self::parse(source)
    }
}

impl Grammar {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Grammar, GrammarError> {
        let source = fs::read_to_string(path).map_err(GrammarError::IO)?;
        Self::parse(&source)
    }

    /// Parse a grammar written as one `LHS -> sym sym ...` rule per line.
    ///
    /// Blank lines are ignored. The left-hand side of the first rule becomes
    /// the start symbol, every left-hand side becomes a nonterminal and any
    /// other symbol is a terminal. `ε` (or `epsilon`) on the right-hand side
    /// denotes the empty string.
    pub fn parse(source: &str) -> Result<Grammar, GrammarError> {
        let lines = split_rules(source)?;
        if lines.is_empty() {
            return Err(GrammarError::EmptyGrammar);
        }

        Grammar::define(|g| {
            let mut nonterminals: Map<&str, NonterminalID> = Map::default();
            for line in &lines {
                if !nonterminals.contains_key(line.left) {
                    let id = g.nonterminal(line.left)?;
                    nonterminals.insert(line.left, id);
                }
            }

            // 左辺に現れない記号はすべて終端記号と解釈する
            let mut terminals: Map<&str, TerminalID> = Map::default();
            for line in &lines {
                for &name in &line.right {
                    if !nonterminals.contains_key(name) && !terminals.contains_key(name) {
                        let id = g.terminal(name)?;
                        terminals.insert(name, id);
                    }
                }
            }

            for line in &lines {
                let left = nonterminals[line.left];
                let right = line.right.iter().map(|&name| match nonterminals.get(name) {
                    Some(&n) => SymbolID::N(n),
                    None => SymbolID::T(terminals[name]),
                });
                g.rule(left, right)?;
            }

            Ok(())
        })
    }

    /// Define a grammar using the specified function.
    pub fn define<F>(f: F) -> Result<Self, GrammarError>
    where
        F: FnOnce(&mut GrammarDef) -> Result<(), GrammarError>,
    {
        let mut def = GrammarDef {
            terminals: Map::default(),
            nonterminals: Map::default(),
            rules: vec![],
            symbols: Map::default(),
            start: None,
            next_terminal_id: TerminalID::OFFSET,
            next_nonterminal_id: NonterminalID::OFFSET,
        };

        def.terminals.insert(
            TerminalID::EOI,
            Terminal {
                id: TerminalID::EOI,
                name: EOI_NAME.to_owned(),
            },
        );
        def.symbols
            .insert(EOI_NAME.to_owned(), SymbolID::T(TerminalID::EOI));

        def.nonterminals.insert(
            NonterminalID::START,
            Nonterminal {
                id: NonterminalID::START,
                name: START_NAME.to_owned(),
            },
        );
        def.symbols
            .insert(START_NAME.to_owned(), SymbolID::N(NonterminalID::START));

        f(&mut def)?;

        def.end()
    }

    /// Iterate over the terminal symbols that can appear in the input,
    /// followed by the end marker `$`.
    pub fn terminals(&self) -> impl Iterator<Item = &Terminal> + '_ {
        self.terminals
            .values()
            .filter(|t| t.id() != TerminalID::EOI)
            .chain(self.terminals.get(&TerminalID::EOI))
    }

    /// Iterate over the nonterminal symbols, including the augmented start symbol.
    pub fn nonterminals(&self) -> impl Iterator<Item = &Nonterminal> + '_ {
        self.nonterminals.values()
    }

    pub fn terminal(&self, id: TerminalID) -> &Terminal {
        &self.terminals[&id]
    }

    pub fn nonterminal(&self, id: NonterminalID) -> &Nonterminal {
        &self.nonterminals[&id]
    }

    /// Return the production rules in declaration order, starting with the
    /// augmented rule.
    pub fn rules(&self) -> &[Rule] {
        &self.rules[..]
    }

    pub fn rule(&self, id: RuleID) -> &Rule {
        &self.rules[id.index()]
    }

    /// Return the start symbol declared by the first rule (before augmentation).
    pub fn start_symbol(&self) -> NonterminalID {
        self.start_symbol
    }

    /// Return the productions of `symbol` in declaration order.
    pub fn productions(&self, symbol: NonterminalID) -> &[RuleID] {
        self.productions
            .get(&symbol)
            .map(|rules| &rules[..])
            .unwrap_or(&[])
    }

    /// Return the productions of the symbol named `name`, or an empty slice
    /// if the name is unknown or refers to a terminal.
    pub fn productions_of(&self, name: &str) -> &[RuleID] {
        match self.symbols.get(name) {
            Some(SymbolID::N(n)) => self.productions(*n),
            _ => &[],
        }
    }

    /// Return `true` if the symbol named `name` has no production.
    ///
    /// Unknown names, including the epsilon marker, count as terminals.
    pub fn is_terminal(&self, name: &str) -> bool {
        self.productions_of(name).is_empty()
    }

    /// Look up a symbol by its name.
    pub fn symbol(&self, name: &str) -> Option<SymbolID> {
        self.symbols.get(name).copied()
    }

    /// Look up a terminal symbol by its name. `$` is the end marker.
    pub fn terminal_by_name(&self, name: &str) -> Option<TerminalID> {
        match self.symbols.get(name) {
            Some(SymbolID::T(t)) => Some(*t),
            _ => None,
        }
    }

    pub fn symbol_name(&self, symbol: SymbolID) -> &str {
        match symbol {
            SymbolID::T(t) => self.terminals[&t].name(),
            SymbolID::N(n) => self.nonterminals[&n].name(),
        }
    }

    /// Compute `First(sequence)`.
    pub fn first(&self, sequence: &[SymbolID]) -> FirstSet {
        self.first_sets.first(sequence)
    }

    /// Return `First(symbol)` of a nonterminal symbol.
    pub fn first_of(&self, symbol: NonterminalID) -> FirstSet {
        self.first_sets.first_of(symbol)
    }

    /// Return `Follow(symbol)`.
    pub fn follow(&self, symbol: NonterminalID) -> Set<TerminalID> {
        self.follow_sets.get(symbol).cloned().unwrap_or_default()
    }

    pub fn is_nullable(&self, symbol: NonterminalID) -> bool {
        self.first_sets.is_nullable(symbol)
    }

    /// `First(beta lookahead)` without the epsilon marker.
    pub(crate) fn lookaheads(&self, beta: &[SymbolID], lookahead: TerminalID) -> Set<TerminalID> {
        self.first_sets.lookaheads(beta, lookahead)
    }
}

/// One non-blank line of grammar text.
#[derive(Debug)]
struct RuleLine<'s> {
    left: &'s str,
    right: Vec<&'s str>,
}

fn split_rules(source: &str) -> Result<Vec<RuleLine<'_>>, GrammarError> {
    let mut lines = vec![];
    for (i, line) in source.lines().enumerate() {
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        let malformed = || GrammarError::MalformedRule {
            line: i + 1,
            text: text.to_owned(),
        };

        let (left, right) = text.split_once(ARROW).ok_or_else(malformed)?;
        let mut left_symbols = left.split_whitespace();
        let left = match (left_symbols.next(), left_symbols.next()) {
            (Some(left), None) => left,
            _ => return Err(malformed()),
        };
        let right: Vec<&str> = right
            .split_whitespace()
            .filter(|symbol| !is_epsilon(symbol))
            .collect();

        for &name in Some(&left).into_iter().chain(&right) {
            if is_reserved(name) || is_epsilon(name) {
                return Err(GrammarError::ReservedSymbol {
                    line: i + 1,
                    name: name.to_owned(),
                });
            }
        }

        lines.push(RuleLine { left, right });
    }
    Ok(lines)
}

fn is_epsilon(symbol: &str) -> bool {
    EPSILON_ALIASES.contains(&symbol)
}

fn is_reserved(symbol: &str) -> bool {
    symbol == EOI_NAME || symbol == START_NAME
}

/// The contextural values for building a `Grammar`.
#[derive(Debug)]
pub struct GrammarDef {
    terminals: Map<TerminalID, Terminal>,
    nonterminals: Map<NonterminalID, Nonterminal>,
    rules: Vec<Rule>,
    symbols: Map<String, SymbolID>,
    start: Option<NonterminalID>,
    next_terminal_id: u16,
    next_nonterminal_id: u16,
}

impl GrammarDef {
    /// Declare a terminal symbol used in this grammar.
    pub fn terminal(&mut self, name: &str) -> Result<TerminalID, GrammarError> {
        self.verify_name(name)?;

        let id = TerminalID::new(self.next_terminal_id);
        self.next_terminal_id = self
            .next_terminal_id
            .checked_add(1)
            .ok_or(GrammarError::TooManySymbols)?;

        self.terminals.insert(
            id,
            Terminal {
                id,
                name: name.to_owned(),
            },
        );
        self.symbols.insert(name.to_owned(), SymbolID::T(id));

        Ok(id)
    }

    /// Declare a nonterminal symbol used in this grammar.
    pub fn nonterminal(&mut self, name: &str) -> Result<NonterminalID, GrammarError> {
        self.verify_name(name)?;

        let id = NonterminalID::new(self.next_nonterminal_id);
        self.next_nonterminal_id = self
            .next_nonterminal_id
            .checked_add(1)
            .ok_or(GrammarError::TooManySymbols)?;

        self.nonterminals.insert(
            id,
            Nonterminal {
                id,
                name: name.to_owned(),
            },
        );
        self.symbols.insert(name.to_owned(), SymbolID::N(id));

        Ok(id)
    }

    /// Specify a production rule into this grammar.
    ///
    /// An empty `right` declares an epsilon production.
    pub fn rule<I>(&mut self, left: NonterminalID, right: I) -> Result<RuleID, GrammarError>
    where
        I: IntoIterator<Item = SymbolID>,
    {
        let right: Vec<SymbolID> = right.into_iter().collect();
        if self
            .rules
            .iter()
            .any(|rule| rule.left == left && rule.right == right)
        {
            return Err(GrammarError::DuplicateRule {
                rule: self.rule_text(left, &right),
            });
        }

        // ID 0 は拡張規則 S' -> S のために予約しておく
        let raw = u16::try_from(self.rules.len() + 1).map_err(|_| GrammarError::TooManyRules)?;
        let id = RuleID::new(raw);
        self.rules.push(Rule { id, left, right });

        Ok(id)
    }

    /// Specify the start symbol for this grammar.
    pub fn start_symbol(&mut self, symbol: NonterminalID) -> Result<(), GrammarError> {
        self.start.replace(symbol);
        Ok(())
    }

    fn verify_name(&self, name: &str) -> Result<(), GrammarError> {
        if name.is_empty() || name.contains(char::is_whitespace) || name.contains(ARROW) {
            return Err(GrammarError::InvalidSymbol {
                name: name.to_owned(),
            });
        }
        if self.symbols.contains_key(name) || is_epsilon(name) {
            return Err(GrammarError::DuplicateSymbol {
                name: name.to_owned(),
            });
        }
        Ok(())
    }

    fn rule_text(&self, left: NonterminalID, right: &[SymbolID]) -> String {
        let names: Vec<&str> = right
            .iter()
            .map(|symbol| match symbol {
                SymbolID::T(t) => self.terminals[t].name(),
                SymbolID::N(n) => self.nonterminals[n].name(),
            })
            .collect();
        let text = display_fn(|f| {
            write!(f, "{} {} ", self.nonterminals[&left], ARROW)?;
            if names.is_empty() {
                f.write_str(EPSILON)
            } else {
                write_joined(f, " ", &names)
            }
        })
        .to_string();
        text
    }

    fn end(mut self) -> Result<Grammar, GrammarError> {
        // start symbolが指定されていない場合は最初に登録されたnonterminal symbolを用いる
        let start = match self.start.take() {
            Some(start) => start,
            None => self
                .nonterminals
                .keys()
                .find(|id| **id != NonterminalID::START)
                .copied()
                .ok_or(GrammarError::EmptyGrammar)?,
        };

        self.rules.insert(
            0,
            Rule {
                id: RuleID::ACCEPT,
                left: NonterminalID::START,
                right: vec![SymbolID::N(start)],
            },
        );

        let mut productions: Map<NonterminalID, Vec<RuleID>> = self
            .nonterminals
            .keys()
            .map(|id| (*id, vec![]))
            .collect();
        for rule in &self.rules {
            productions.entry(rule.left).or_default().push(rule.id);
        }

        let first_sets = FirstSets::new(&self.rules, self.nonterminals.keys().copied());
        let follow_sets = FollowSets::new(
            &self.rules,
            self.nonterminals.keys().copied(),
            start,
            &first_sets,
        );

        tracing::debug!(
            "grammar: {} terminals, {} nonterminals, {} rules",
            self.terminals.len(),
            self.nonterminals.len(),
            self.rules.len()
        );

        Ok(Grammar {
            terminals: self.terminals,
            nonterminals: self.nonterminals,
            rules: self.rules,
            productions,
            symbols: self.symbols,
            start_symbol: start,
            first_sets,
            follow_sets,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GrammarError {
    #[error("IO error: {}", _0)]
    IO(io::Error),

    #[error("empty grammar: no production rule is declared")]
    EmptyGrammar,

    #[error("malformed rule at line {line}: `{text}' (expected `LHS -> symbols...')")]
    MalformedRule { line: usize, text: String },

    #[error("reserved symbol `{name}' used at line {line}")]
    ReservedSymbol { line: usize, name: String },

    #[error("incorrect symbol name: `{name}'")]
    InvalidSymbol { name: String },

    #[error("the symbol `{name}' has already been declared")]
    DuplicateSymbol { name: String },

    #[error("duplicate production rule detected: `{rule}'")]
    DuplicateRule { rule: String },

    #[error("too many symbols")]
    TooManySymbols,

    #[error("too many production rules")]
    TooManyRules,
}
