use anyhow::Context as _;
use canonlr::{
    analysis::Analysis,
    simulator::{Config, Outcome},
};
use clap::Parser;
use std::{fs, path::PathBuf, time::Instant};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The path of grammar definition file.
    grammar: PathBuf,

    /// Whitespace-separated tokens to run through the generated parser.
    #[arg(short, long)]
    input: Option<String>,

    /// The number of parser actions after which the simulation is aborted.
    #[arg(long, default_value_t = 1000)]
    max_steps: usize,

    /// Print the expanded grammar with FIRST/FOLLOW sets.
    #[arg(long)]
    grammar_info: bool,

    /// Print the item automaton.
    #[arg(long)]
    items: bool,

    /// Print the canonical LR(1) states.
    #[arg(long)]
    states: bool,

    /// Print the ACTION/GOTO table.
    #[arg(long)]
    table: bool,

    /// Print the recorded conflicts.
    #[arg(long)]
    conflicts: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::trace!("CLI args = {:?}", args);

    let source = fs::read_to_string(&args.grammar).with_context(|| {
        anyhow::anyhow!("failed to read the grammar file {}", args.grammar.display())
    })?;

    let mut config = Config::new();
    config.max_steps(args.max_steps);

    let start = Instant::now();
    let analysis = Analysis::build_with(&source, args.input.as_deref(), &config);
    tracing::info!("built in {:?}", start.elapsed());

    print!("{}", analysis.summary());

    let artifacts = match analysis.artifacts() {
        Some(artifacts) => artifacts,
        None => anyhow::bail!("failed to build the parser for {}", args.grammar.display()),
    };
    let g = &artifacts.grammar;

    if args.grammar_info {
        println!();
        print!("{}", g);
        println!("## first / follow:");
        for n in g.nonterminals() {
            let first: Vec<_> = g.first_of(n.id()).terminals().map(|t| g.terminal(t).name()).collect();
            let follow: Vec<_> = g.follow(n.id()).iter().map(|&t| g.terminal(t).name()).collect();
            let nullable = if g.is_nullable(n.id()) { " ε" } else { "" };
            println!(
                "{}: FIRST = {{{}{}}}, FOLLOW = {{{}}}",
                n,
                first.join(", "),
                nullable,
                follow.join(", ")
            );
        }
    }

    if args.items {
        println!();
        print!("{}", artifacts.items.display(g));
    }

    if args.states {
        println!();
        print!("{}", artifacts.states.display(g));
    }

    if args.table {
        println!();
        print!("{}", artifacts.table.display(g));
    }

    if args.conflicts && artifacts.table.has_conflicts() {
        println!();
        print!("{}", artifacts.table.display_conflicts(g));
    }

    if let Some(simulation) = &artifacts.simulation {
        println!();
        for step in &simulation.trace {
            println!("{}", step);
        }
        match &simulation.outcome {
            Outcome::Accepted => println!("the input is accepted"),
            outcome => println!("[error] {}", outcome),
        }
    }

    Ok(())
}
