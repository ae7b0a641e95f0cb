//! The canonical LR(1) automaton.
//!
//! Every state is a closed set of LR(1) items. Two derivations that reach the
//! same item set always end in the same state: states are interned by the set
//! of their item IDs, regardless of the order the items were discovered in.

use crate::{
    grammar::{Grammar, SymbolID},
    item::Item,
    item_automaton::{ItemAutomaton, ItemID},
    types::{Map, Set},
    util::display_fn,
};
use bit_set::BitSet;
use indexmap::map::Entry;
use std::{collections::VecDeque, fmt};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct StateID {
    raw: u32,
}

impl StateID {
    pub const START: Self = Self::new(0);

    #[inline]
    const fn new(raw: u32) -> Self {
        Self { raw }
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.raw as usize
    }

    pub(crate) fn from_index(index: usize) -> Self {
        Self::new(u32::try_from(index).expect("too many states"))
    }
}

impl fmt::Display for StateID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.raw, f)
    }
}

/// A set of items of an [`ItemAutomaton`], in the order of insertion.
///
/// Equality ignores the order.
#[derive(Debug, Clone, Default)]
pub struct ItemSet {
    members: BitSet,
    items: Vec<ItemID>,
}

impl ItemSet {
    fn insert(&mut self, id: ItemID) -> bool {
        if self.members.insert(id.index()) {
            self.items.push(id);
            true
        } else {
            false
        }
    }

    pub fn items(&self) -> &[ItemID] {
        &self.items[..]
    }

    pub fn contains(&self, id: ItemID) -> bool {
        self.members.contains(id.index())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl PartialEq for ItemSet {
    fn eq(&self, other: &Self) -> bool {
        self.members == other.members
    }
}

impl Eq for ItemSet {}

/// クロージャ展開
///
/// Saturate `kernel` with every item reachable through predict edges.
pub fn closure<I>(items: &ItemAutomaton, kernel: I) -> ItemSet
where
    I: IntoIterator<Item = ItemID>,
{
    let mut set = ItemSet::default();
    let mut pending = VecDeque::new();
    for id in kernel {
        if set.insert(id) {
            pending.push_back(id);
        }
    }

    while let Some(id) = pending.pop_front() {
        for &predicted in items.edges(id).predicts() {
            if set.insert(predicted) {
                pending.push_back(predicted);
            }
        }
    }

    set
}

/// Advance the dot of every item in `set` whose next symbol is `symbol` and
/// close the result. The returned set is empty if no item advances.
pub fn goto(items: &ItemAutomaton, set: &ItemSet, symbol: SymbolID) -> ItemSet {
    let kernel = set
        .items()
        .iter()
        .filter_map(|&id| match items.edges(id).advance() {
            Some((label, next)) if label == symbol => Some(next),
            _ => None,
        });
    closure(items, kernel)
}

#[derive(Debug)]
pub struct State {
    item_set: ItemSet,
    items: Vec<Item>,
    transitions: Map<SymbolID, StateID>,
}

impl State {
    /// Return the items of this state, in closure order.
    pub fn items(&self) -> &[Item] {
        &self.items[..]
    }

    pub fn item_set(&self) -> &ItemSet {
        &self.item_set
    }

    pub fn transition(&self, symbol: SymbolID) -> Option<StateID> {
        self.transitions.get(&symbol).copied()
    }

    pub fn transitions(&self) -> impl Iterator<Item = (SymbolID, StateID)> + '_ {
        self.transitions.iter().map(|(symbol, target)| (*symbol, *target))
    }
}

#[derive(Debug)]
pub struct StateAutomaton {
    states: Vec<State>,
    index: Map<BitSet, StateID>,
}

impl StateAutomaton {
    #[tracing::instrument(skip_all)]
    pub fn generate(items: &ItemAutomaton) -> Self {
        let mut gen = StateGenerator {
            items,
            item_sets: vec![],
            transitions: vec![],
            interned: Map::default(),
            pending: VecDeque::new(),
        };
        gen.populate_states();
        gen.finish()
    }

    /// Return the number of states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Return the initial state, i.e. the closure of the seed item.
    pub fn start(&self) -> Option<StateID> {
        (!self.states.is_empty()).then_some(StateID::START)
    }

    pub fn states(&self) -> impl Iterator<Item = (StateID, &State)> + '_ {
        self.states
            .iter()
            .enumerate()
            .map(|(i, state)| (StateID::from_index(i), state))
    }

    pub fn state(&self, id: StateID) -> &State {
        &self.states[id.index()]
    }

    /// Look up the state whose item set equals `set`.
    pub fn state_of(&self, set: &ItemSet) -> Option<StateID> {
        self.index.get(&set.members).copied()
    }

    pub fn display<'a>(&'a self, g: &'a Grammar) -> impl fmt::Display + 'a {
        display_fn(move |f| {
            for (i, (id, state)) in self.states().enumerate() {
                if i > 0 {
                    writeln!(f)?;
                }
                writeln!(f, "#### State {:02}", id)?;
                writeln!(f, "## items")?;
                for item in state.items() {
                    writeln!(f, "- {}", item.display(g))?;
                }
                writeln!(f, "## transitions")?;
                for (symbol, target) in state.transitions() {
                    writeln!(f, "- {} -> {:02}", g.symbol_name(symbol), target)?;
                }
            }
            Ok(())
        })
    }
}

// === StateGenerator ===

#[derive(Debug)]
struct StateGenerator<'a> {
    items: &'a ItemAutomaton,
    item_sets: Vec<ItemSet>,
    transitions: Vec<Map<SymbolID, StateID>>,
    interned: Map<BitSet, StateID>,
    pending: VecDeque<StateID>,
}

impl StateGenerator<'_> {
    /// Register the item set as a state, reusing the existing state with the
    /// same items if there is one.
    fn intern(&mut self, item_set: ItemSet) -> (StateID, bool) {
        match self.interned.entry(item_set.members.clone()) {
            Entry::Occupied(entry) => (*entry.get(), false),
            Entry::Vacant(entry) => {
                let id = StateID::from_index(self.item_sets.len());
                entry.insert(id);
                self.item_sets.push(item_set);
                self.transitions.push(Map::default());
                (id, true)
            }
        }
    }

    fn populate_states(&mut self) {
        let seed = match self.items.start() {
            Some(seed) => seed,
            None => return,
        };
        let initial = closure(self.items, Some(seed));
        let (start, _) = self.intern(initial);
        self.pending.push_back(start);

        // 新規に状態が生成されなくなるまで繰り返す
        while let Some(id) = self.pending.pop_front() {
            // 遷移ラベルをitem set内の出現順に抽出する
            let symbols: Set<SymbolID> = self.item_sets[id.index()]
                .items()
                .iter()
                .filter_map(|&item| self.items.edges(item).advance())
                .map(|(symbol, _)| symbol)
                .collect();

            for symbol in symbols {
                let target = goto(self.items, &self.item_sets[id.index()], symbol);
                if target.is_empty() {
                    continue;
                }
                let (target, is_new) = self.intern(target);
                self.transitions[id.index()].insert(symbol, target);
                if is_new {
                    tracing::trace!("discovered state {} from {}", target, id);
                    self.pending.push_back(target);
                }
            }
        }
    }

    fn finish(self) -> StateAutomaton {
        let items = self.items;
        let states: Vec<State> = self
            .item_sets
            .into_iter()
            .zip(self.transitions)
            .map(|(item_set, transitions)| State {
                items: item_set.items().iter().map(|id| *items.item(*id)).collect(),
                item_set,
                transitions,
            })
            .collect();

        tracing::debug!("state automaton: {} states", states.len());

        StateAutomaton {
            states,
            index: self.interned,
        }
    }
}
