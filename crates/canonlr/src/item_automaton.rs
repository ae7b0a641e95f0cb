//! The automaton over individual LR(1) items.
//!
//! Each node is an item, and there are two kinds of edges:
//!
//! * an *advance* edge `[X -> alpha . Y beta, a] --Y--> [X -> alpha Y . beta, a]`,
//! * *predict* edges `[X -> alpha . Y beta, a] --ε--> [Y -> . gamma, b]` for every
//!   production of `Y` and every `b` in `First(beta a)`.
//!
//! The automaton is non-deterministic and never merged. The state automaton
//! derives its closures by following the predict edges.

use crate::{
    grammar::{Grammar, SymbolID},
    item::Item,
    types::{Map, Queue},
    util::display_fn,
};
use indexmap::map::Entry;
use std::fmt;

/// The index of an item in the arena of an [`ItemAutomaton`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ItemID {
    raw: u32,
}

impl ItemID {
    /// The seed item `[S' -> . S, $]`.
    pub const SEED: Self = Self::new(0);

    #[inline]
    const fn new(raw: u32) -> Self {
        Self { raw }
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.raw as usize
    }
}

impl fmt::Display for ItemID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.raw, f)
    }
}

/// The outgoing edges of an item.
#[derive(Debug, Default)]
pub struct ItemEdges {
    advance: Option<(SymbolID, ItemID)>,
    predicts: Vec<ItemID>,
}

impl ItemEdges {
    pub fn advance(&self) -> Option<(SymbolID, ItemID)> {
        self.advance
    }

    pub fn predicts(&self) -> &[ItemID] {
        &self.predicts[..]
    }
}

#[derive(Debug)]
pub struct ItemAutomaton {
    nodes: Map<Item, ItemEdges>,
}

impl ItemAutomaton {
    /// Build the automaton of all the items reachable from the seed item.
    #[tracing::instrument(skip_all)]
    pub fn generate(g: &Grammar) -> Self {
        let mut nodes: Map<Item, ItemEdges> = Map::default();
        let mut pending = Queue::default();

        let seed = intern(&mut nodes, Item::seed());
        pending.push(seed);

        while let Some(id) = pending.pop() {
            let item = match nodes.get_index(id.index()) {
                Some((item, _)) => *item,
                None => continue,
            };

            let mut edges = ItemEdges::default();

            if let (Some(symbol), Some(next)) = (item.next_symbol(g), item.advance(g)) {
                let next = intern(&mut nodes, next);
                pending.push(next);
                edges.advance = Some((symbol, next));

                // [X -> alpha . Y beta, a] に対し、Y の各構文規則と First(beta a) の各記号の組を予測する
                if let SymbolID::N(y) = symbol {
                    let (beta, alpha) = item.beta_alpha(g);
                    let lookaheads = g.lookaheads(beta, alpha);
                    for &rule in g.productions(y) {
                        for &lookahead in &lookaheads {
                            let predicted = intern(&mut nodes, Item::new(rule, 0, lookahead));
                            if !edges.predicts.contains(&predicted) {
                                edges.predicts.push(predicted);
                            }
                            pending.push(predicted);
                        }
                    }
                }
            }

            if let Some((_, slot)) = nodes.get_index_mut(id.index()) {
                *slot = edges;
            }
        }

        tracing::debug!("item automaton: {} nodes", nodes.len());

        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Return the seed node, if any.
    pub fn start(&self) -> Option<ItemID> {
        (!self.nodes.is_empty()).then_some(ItemID::SEED)
    }

    pub fn item(&self, id: ItemID) -> &Item {
        match self.nodes.get_index(id.index()) {
            Some((item, _)) => item,
            None => panic!("unknown item id: {}", id),
        }
    }

    pub fn edges(&self, id: ItemID) -> &ItemEdges {
        match self.nodes.get_index(id.index()) {
            Some((_, edges)) => edges,
            None => panic!("unknown item id: {}", id),
        }
    }

    /// Look up the arena index of an item.
    pub fn id_of(&self, item: &Item) -> Option<ItemID> {
        self.nodes.get_index_of(item).map(to_item_id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (ItemID, &Item, &ItemEdges)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, (item, edges))| (to_item_id(i), item, edges))
    }

    pub fn display<'a>(&'a self, g: &'a Grammar) -> impl fmt::Display + 'a {
        display_fn(move |f| {
            for (id, item, edges) in self.nodes() {
                writeln!(f, "{:02}: {}", id, item.display(g))?;
                if let Some((symbol, next)) = edges.advance() {
                    writeln!(f, "  - {} -> {:02}", g.symbol_name(symbol), next)?;
                }
                for predicted in edges.predicts() {
                    writeln!(f, "  - ε -> {:02}", predicted)?;
                }
            }
            Ok(())
        })
    }
}

fn to_item_id(index: usize) -> ItemID {
    ItemID::new(u32::try_from(index).expect("too many items"))
}

/// Register the item into the arena unless it already exists.
fn intern(nodes: &mut Map<Item, ItemEdges>, item: Item) -> ItemID {
    match nodes.entry(item) {
        Entry::Occupied(entry) => to_item_id(entry.index()),
        Entry::Vacant(entry) => {
            let id = to_item_id(entry.index());
            entry.insert(ItemEdges::default());
            id
        }
    }
}
