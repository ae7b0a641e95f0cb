use canonlr::{
    grammar::Grammar, item_automaton::ItemAutomaton, state_automaton::StateAutomaton,
    table::ParseTable,
};
use std::{env, path::PathBuf};
use tracing_subscriber::EnvFilter;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap())
        .join("tests/grammars")
        .join(format!("{}.txt", name))
}

macro_rules! define_tests {
    ($($name:ident => $is_lr1:expr),*$(,)?) => {$(
        #[test]
        fn $name() {
            let _ = tracing_subscriber::fmt()
                .with_ansi(false)
                .with_env_filter(EnvFilter::from_default_env())
                .with_test_writer()
                .try_init();

            let grammar = Grammar::from_file(fixture(stringify!($name))).unwrap();
            let items = ItemAutomaton::generate(&grammar);
            let states = StateAutomaton::generate(&items);
            let table = ParseTable::generate(&grammar, &states);
            assert_eq!(
                table.is_lr1(),
                $is_lr1,
                "{}",
                table.display_conflicts(&grammar)
            );
            assert_eq!(table.len(), states.len());

            // 再構築しても状態数は変わらない
            let again = StateAutomaton::generate(&ItemAutomaton::generate(&grammar));
            assert_eq!(again.len(), states.len());
        }
    )*};
}

define_tests! {
    arithmetic => true,
    arithmetic_ll => true,
    assignment => true,
    cc => true,
    lists => true,
    not_lalr => true,
    optional => true,
    ambiguous => false,
    dangling_else => false,
    reduce_reduce => false,
}
