//! Calculation of FIRST and FOLLOW sets.
//!
//! Both are computed by the same scheme: collect the inclusion constraints
//! between the sets of nonterminal symbols and propagate the elements until
//! nothing changes any more. The result is the least fixed point, so mutually
//! recursive symbols (e.g. `A -> B x`, `B -> A y`) get their complete sets.

use crate::{
    grammar::{NonterminalID, Rule, SymbolID, TerminalID},
    types::{Map, Set},
};

/// The value of `First(sequence)`: a set of terminal symbols plus a flag
/// telling whether the sequence can derive the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirstSet {
    terminals: Set<TerminalID>,
    epsilon: bool,
}

impl FirstSet {
    pub fn terminals(&self) -> impl Iterator<Item = TerminalID> + '_ {
        self.terminals.iter().copied()
    }

    pub fn contains(&self, terminal: TerminalID) -> bool {
        self.terminals.contains(&terminal)
    }

    /// Return `true` if `ε` belongs to this set.
    pub fn has_epsilon(&self) -> bool {
        self.epsilon
    }
}

#[derive(Debug)]
pub(crate) struct FirstSets {
    nulls: Set<NonterminalID>,
    map: Map<NonterminalID, Set<TerminalID>>,
}

impl FirstSets {
    pub(crate) fn new<I>(rules: &[Rule], nonterminals: I) -> Self
    where
        I: IntoIterator<Item = NonterminalID>,
    {
        let nulls = nulls_set(rules);

        // First(N) = {} と初期化する
        let mut map: Map<NonterminalID, Set<TerminalID>> = nonterminals
            .into_iter()
            .map(|n| (n, Set::default()))
            .collect();

        // 制約条件の抽出
        // X -> Y1 Y2 ... Yn という構文規則に対し、
        //  1. Y1,Y2,...と検索していき、最初に来る非nullableな記号を Yk とする
        //  2. Yi (i=1,2,..,k) それぞれに対し First(X) \supseteq First(Yi) という制約を追加する
        //     (Yi が終端記号の場合は First(X) に直接追加する)
        let mut constraints = vec![];
        for rule in rules {
            for symbol in rule.right() {
                match *symbol {
                    SymbolID::T(t) => {
                        map.entry(rule.left()).or_default().insert(t);
                        break;
                    }
                    SymbolID::N(n) => {
                        if n != rule.left() {
                            constraints.push(Constraint {
                                sup: rule.left(),
                                sub: n,
                            });
                        }
                        if !nulls.contains(&n) {
                            break;
                        }
                    }
                }
            }
        }

        propagate(&mut map, &constraints);

        Self { nulls, map }
    }

    pub(crate) fn is_nullable(&self, symbol: NonterminalID) -> bool {
        self.nulls.contains(&symbol)
    }

    /// `First(sequence)`
    pub(crate) fn first(&self, sequence: &[SymbolID]) -> FirstSet {
        let mut res = FirstSet::default();
        for symbol in sequence {
            match *symbol {
                SymbolID::T(t) => {
                    res.terminals.insert(t);
                    return res;
                }
                SymbolID::N(n) => {
                    if let Some(first) = self.map.get(&n) {
                        res.terminals.extend(first.iter().copied());
                    }
                    if !self.nulls.contains(&n) {
                        return res;
                    }
                }
            }
        }
        res.epsilon = true;
        res
    }

    pub(crate) fn first_of(&self, symbol: NonterminalID) -> FirstSet {
        self.first(&[SymbolID::N(symbol)])
    }

    /// `First(beta lookahead)`
    pub(crate) fn lookaheads(&self, beta: &[SymbolID], lookahead: TerminalID) -> Set<TerminalID> {
        let FirstSet {
            mut terminals,
            epsilon,
        } = self.first(beta);
        if epsilon {
            terminals.insert(lookahead);
        }
        terminals
    }
}

#[derive(Debug)]
pub(crate) struct FollowSets {
    map: Map<NonterminalID, Set<TerminalID>>,
}

impl FollowSets {
    pub(crate) fn new<I>(
        rules: &[Rule],
        nonterminals: I,
        start: NonterminalID,
        first_sets: &FirstSets,
    ) -> Self
    where
        I: IntoIterator<Item = NonterminalID>,
    {
        let mut map: Map<NonterminalID, Set<TerminalID>> = nonterminals
            .into_iter()
            .map(|n| (n, Set::default()))
            .collect();
        map.entry(start).or_default().insert(TerminalID::EOI);

        // A -> alpha B beta という構文規則に対し、
        //  - First(beta) \ {ε} を Follow(B) に追加する
        //  - beta が nullable であれば Follow(B) \supseteq Follow(A) という制約を追加する
        let mut constraints = vec![];
        for rule in rules {
            for (i, symbol) in rule.right().iter().enumerate() {
                let n = match *symbol {
                    SymbolID::N(n) => n,
                    SymbolID::T(..) => continue,
                };
                let beta = first_sets.first(&rule.right()[i + 1..]);
                map.entry(n).or_default().extend(beta.terminals());
                if beta.has_epsilon() && rule.left() != n {
                    constraints.push(Constraint {
                        sup: n,
                        sub: rule.left(),
                    });
                }
            }
        }

        propagate(&mut map, &constraints);

        Self { map }
    }

    pub(crate) fn get(&self, symbol: NonterminalID) -> Option<&Set<TerminalID>> {
        self.map.get(&symbol)
    }
}

/// `sup \supseteq sub`
#[derive(Debug)]
struct Constraint {
    sup: NonterminalID,
    sub: NonterminalID,
}

// 制約条件の解消
// sub の要素を sup に追加するだけ。これを変化がなくなるまですべての制約条件に対して繰り返す
fn propagate(map: &mut Map<NonterminalID, Set<TerminalID>>, constraints: &[Constraint]) {
    let mut changed = true;
    while changed {
        changed = false;
        for Constraint { sup, sub } in constraints {
            let subset: Vec<TerminalID> = match map.get(sub) {
                Some(subset) => subset.iter().copied().collect(),
                None => continue,
            };
            let superset = map.entry(*sup).or_default();
            for t in subset {
                changed |= superset.insert(t);
            }
        }
    }
}

/// Calculate the set of nullable symbols in this grammar.
fn nulls_set(rules: &[Rule]) -> Set<NonterminalID> {
    // ruleからnullableであることが分かっている場合は追加する
    let mut nulls: Set<NonterminalID> = rules
        .iter()
        .filter_map(|rule| rule.is_epsilon().then(|| rule.left()))
        .collect();

    // 値が更新されなくなるまで繰り返す
    let mut changed = true;
    while changed {
        changed = false;
        for rule in rules {
            if nulls.contains(&rule.left()) {
                continue;
            }
            // 右辺のsymbolsがすべてnullableかどうか
            let is_rhs_nullable = rule
                .right()
                .iter()
                .all(|symbol| matches!(symbol, SymbolID::N(n) if nulls.contains(n)));
            if is_rhs_nullable {
                changed = true;
                nulls.insert(rule.left());
            }
        }
    }

    nulls
}
