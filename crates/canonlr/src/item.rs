//! LR(1) items.

use crate::{
    grammar::{Grammar, RuleID, SymbolID, TerminalID},
    util::display_fn,
};
use std::fmt;

/// LR(1) item
///
/// `X -> Y1 Y2 ... Yn` という構文規則にマーカ位置と先読み記号を付与したもの。
/// The triple `(rule, marker, lookahead)` is the identity of the item.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Item {
    rule: RuleID,
    marker: usize,
    lookahead: TerminalID,
}

impl Item {
    pub const fn new(rule: RuleID, marker: usize, lookahead: TerminalID) -> Self {
        Self {
            rule,
            marker,
            lookahead,
        }
    }

    /// `[S' -> . S, $]`
    pub const fn seed() -> Self {
        Self::new(RuleID::ACCEPT, 0, TerminalID::EOI)
    }

    pub fn rule(&self) -> RuleID {
        self.rule
    }

    /// Return the position of the dot in the right-hand side.
    pub fn marker(&self) -> usize {
        self.marker
    }

    pub fn lookahead(&self) -> TerminalID {
        self.lookahead
    }

    /// Return the symbol just after the dot, or `None` if the item is reducible.
    pub fn next_symbol(&self, g: &Grammar) -> Option<SymbolID> {
        g.rule(self.rule).right().get(self.marker).copied()
    }

    pub fn is_reducible(&self, g: &Grammar) -> bool {
        self.marker >= g.rule(self.rule).right().len()
    }

    /// For `[X -> alpha . Y beta, a]`, return `(beta, a)`.
    pub fn beta_alpha<'g>(&self, g: &'g Grammar) -> (&'g [SymbolID], TerminalID) {
        let right = g.rule(self.rule).right();
        let beta = right.get(self.marker + 1..).unwrap_or(&[]);
        (beta, self.lookahead)
    }

    /// Return the item whose dot has moved over the next symbol.
    pub fn advance(&self, g: &Grammar) -> Option<Item> {
        if self.is_reducible(g) {
            return None;
        }
        Some(Self {
            marker: self.marker + 1,
            ..*self
        })
    }

    // `"[X -> Y1 . Y2, a]"`
    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            let rule = g.rule(self.rule);
            write!(f, "[{} ->", g.nonterminal(rule.left()))?;
            for (i, symbol) in rule.right().iter().enumerate() {
                if i == self.marker {
                    f.write_str(" .")?;
                }
                write!(f, " {}", g.symbol_name(*symbol))?;
            }
            if self.marker >= rule.right().len() {
                f.write_str(" .")?;
            }
            write!(f, ", {}]", g.terminal(self.lookahead))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_queries() {
        let g = Grammar::parse("E -> E + T\nE -> T\nT -> id").unwrap();
        let plus = g.terminal_by_name("+").unwrap();

        let item = Item::new(g.productions_of("E")[0], 0, plus);
        assert_eq!(item.display(&g).to_string(), "[E -> . E + T, +]");
        assert_eq!(item.next_symbol(&g), g.symbol("E"));
        assert!(!item.is_reducible(&g));

        let (beta, alpha) = item.beta_alpha(&g);
        assert_eq!(beta, &[g.symbol("+").unwrap(), g.symbol("T").unwrap()]);
        assert_eq!(alpha, plus);

        let last = item.advance(&g).and_then(|i| i.advance(&g)).unwrap();
        assert_eq!(last.display(&g).to_string(), "[E -> E + . T, +]");
        assert!(last.beta_alpha(&g).0.is_empty());

        let reduced = last.advance(&g).unwrap();
        assert!(reduced.is_reducible(&g));
        assert_eq!(reduced.next_symbol(&g), None);
        assert_eq!(reduced.advance(&g), None);
        assert_eq!(reduced.display(&g).to_string(), "[E -> E + T ., +]");
    }

    #[test]
    fn identity_is_the_triple() {
        let g = Grammar::parse("S -> a").unwrap();
        let a = Item::seed().advance(&g).unwrap();
        let b = Item::new(RuleID::ACCEPT, 1, TerminalID::EOI);
        assert_eq!(a, b);
        assert_ne!(a, Item::seed());
        assert_eq!(a.display(&g).to_string(), "[S' -> S ., $]");
    }

    #[test]
    fn epsilon_item_is_reducible() {
        let g = Grammar::parse("S -> A b\nA -> ε").unwrap();
        let item = Item::new(g.productions_of("A")[0], 0, TerminalID::EOI);
        assert!(item.is_reducible(&g));
        assert_eq!(item.display(&g).to_string(), "[A -> ., $]");
    }
}
