use canonlr::{
    analysis::{Analysis, BuildError},
    grammar::{GrammarError, TerminalID},
    simulator::{Config, Outcome, SimulationError, StepAction},
    state_automaton::StateID,
    table::{Action, ConflictKind},
};
use std::{env, fs, path::PathBuf};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    // 複数のテストから呼ばれるので二度目以降の初期化は無視する
    let _ = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn fixture(name: &str) -> String {
    let path = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap())
        .join("tests/grammars")
        .join(format!("{}.txt", name));
    fs::read_to_string(path).unwrap()
}

fn parse(grammar: &str, input: &str) -> Outcome {
    init_tracing();
    let analysis = Analysis::build(&fixture(grammar), Some(input));
    let artifacts = analysis.artifacts().unwrap();
    artifacts.simulation.as_ref().unwrap().outcome.clone()
}

#[test]
fn left_recursive_sum() {
    init_tracing();
    let analysis = Analysis::build("E -> E + T\nE -> T\nT -> id", Some("id + id + id"));
    let artifacts = analysis.artifacts().unwrap();
    let sim = artifacts.simulation.as_ref().unwrap();
    assert!(sim.is_accepted());

    let last = sim.trace.last().unwrap();
    assert_eq!(last.action, StepAction::Accept);
    assert_eq!(last.input, ["$"]);
    assert_eq!(last.stack.len(), 2);
    assert_eq!(last.stack[0], StateID::START);

    let start = artifacts.grammar.start_symbol();
    assert_eq!(artifacts.table.goto(StateID::START, start), Some(last.stack[1]));
    assert_eq!(
        artifacts.table.action(last.stack[1], TerminalID::EOI),
        Some(Action::Accept)
    );
}

#[test]
fn single_rule_rejects_other_symbol() {
    init_tracing();
    let analysis = Analysis::build("S -> a", Some("b"));
    let sim = analysis.artifacts().unwrap().simulation.as_ref().unwrap();
    assert_eq!(
        sim.outcome,
        Outcome::Rejected(SimulationError::NoAction {
            state: StateID::START,
            symbol: "b".into(),
        })
    );
}

#[test]
fn dangling_else_installs_shift() {
    init_tracing();
    let analysis = Analysis::build(&fixture("dangling_else"), None);
    assert!(analysis.is_built());
    let artifacts = analysis.artifacts().unwrap();
    let table = &artifacts.table;
    assert!(!table.is_lr1());

    for (state, terminal, conflict) in table.conflicts() {
        assert_eq!(conflict.kind, ConflictKind::ShiftReduce);
        assert!(matches!(table.action(state, terminal), Some(Action::Shift(..))));
    }

    assert!(parse("dangling_else", "if cond then if cond then other else other").is_accepted());
}

#[test]
fn epsilon_in_the_middle() {
    assert!(parse("optional", "a b").is_accepted());
    assert!(parse("optional", "a c b").is_accepted());
    assert!(!parse("optional", "a c c b").is_accepted());
    assert!(!parse("optional", "a").is_accepted());
}

#[test]
fn empty_grammar() {
    init_tracing();
    let analysis = Analysis::build("\n   \n", Some("a"));
    assert!(!analysis.is_built());
    assert!(matches!(
        analysis.errors(),
        [BuildError::MalformedGrammar(GrammarError::EmptyGrammar)]
    ));
    assert_eq!(analysis.summary().states, 0);
}

#[test]
fn arithmetic_inputs() {
    for input in ["id", "id + id * id", "( id + id ) * id", "( ( id ) )"] {
        assert!(parse("arithmetic", input).is_accepted(), "{}", input);
        assert!(parse("arithmetic_ll", input).is_accepted(), "{}", input);
    }
    for input in ["", "id +", "( id", "id id", "+ id"] {
        assert!(!parse("arithmetic", input).is_accepted(), "{}", input);
        assert!(!parse("arithmetic_ll", input).is_accepted(), "{}", input);
    }
}

#[test]
fn statement_lists() {
    assert!(parse("lists", "id = id ; print ( ) ; print ( id + id , id )").is_accepted());
    assert!(!parse("lists", "print ( , id )").is_accepted());
}

#[test]
fn reduce_reduce_keeps_first_rule() {
    init_tracing();
    let analysis = Analysis::build(&fixture("reduce_reduce"), Some("x"));
    let artifacts = analysis.artifacts().unwrap();
    let conflicts: Vec<_> = artifacts.table.conflicts().collect();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].2.kind, ConflictKind::ReduceReduce);

    let sim = artifacts.simulation.as_ref().unwrap();
    assert!(sim.is_accepted());
    let reduced: Vec<_> = sim
        .trace
        .iter()
        .filter_map(|step| match &step.action {
            StepAction::Reduce { text, .. } => Some(&text[..]),
            _ => None,
        })
        .collect();
    assert_eq!(reduced, ["A -> x", "S -> A"]);
}

#[test]
fn abort_is_not_rejection() {
    init_tracing();
    let mut config = Config::new();
    config.max_steps(2);
    let analysis = Analysis::build_with(&fixture("arithmetic"), Some("id * id"), &config);
    let sim = analysis.artifacts().unwrap().simulation.as_ref().unwrap();
    assert_eq!(sim.outcome, Outcome::Aborted { max_steps: 2 });
    assert!(sim.error().is_none());
}
