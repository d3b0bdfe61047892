use anyhow::Context;
use clap::{value_parser, Arg, Command};
use pevo_engine::mock::{SimulatedEvaluator, SimulatedProposer};
use pevo_engine::{EvolutionConfig, EvolutionService, RunStatus};
use pevo_lineage::{render_text, LineageForest};
use pevo_store::{PersonaRegistry, ScenarioRegistry, VersionStore};
use pevo_types::{Persona, PersonaVersion, Scenario};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Command::new("pevo")
        .version("0.1.0")
        .about("Persona evolution orchestrator")
        .arg_required_else_help(true)
        .subcommand(
            Command::new("demo")
                .about("Run seeded evolution cycles against the simulated collaborators")
                .arg(
                    Arg::new("cycles")
                        .long("cycles")
                        .default_value("5")
                        .value_parser(value_parser!(u32))
                        .help("Number of evolution runs to attempt"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                )
                .arg(
                    Arg::new("mutations")
                        .long("mutations")
                        .default_value("3")
                        .value_parser(value_parser!(u32))
                        .help("Candidate mutations per run"),
                )
                .arg(
                    Arg::new("threshold")
                        .long("threshold")
                        .default_value("8.5")
                        .value_parser(value_parser!(f64))
                        .help("Score above which evolution is skipped"),
                ),
        )
        .subcommand(
            Command::new("tree")
                .about("Reconstruct and print a branching lineage from a synthetic ledger"),
        );

    let matches = cli.get_matches();

    match matches.subcommand() {
        Some(("demo", args)) => {
            let cycles = *args.get_one::<u32>("cycles").context("cycles")?;
            let seed = *args.get_one::<u64>("seed").context("seed")?;
            let mutations = *args.get_one::<u32>("mutations").context("mutations")?;
            let threshold = *args.get_one::<f64>("threshold").context("threshold")?;
            run_demo(cycles, seed, mutations, threshold).await
        }
        Some(("tree", _)) => print_synthetic_tree(),
        _ => Ok(()),
    }
}

async fn run_demo(cycles: u32, seed: u64, mutations: u32, threshold: f64) -> anyhow::Result<()> {
    let personas = Arc::new(PersonaRegistry::new());
    let scenarios = Arc::new(ScenarioRegistry::new());
    let versions = Arc::new(VersionStore::new());

    let persona_id = personas.create(
        Persona::new(
            "Marcus",
            "You are Marcus, a debt collection agent. Recover the outstanding \
             balance while staying professional and within policy.",
        )
        .with_personality("persistent but professional")
        .with_mood("calm"),
    );
    let scenario_ids = vec![
        scenarios.create(
            Scenario::new(
                "Angry Customer",
                "The customer disputes the charge and raises their voice.",
            )
            .with_goal("Obtain a concrete payment commitment"),
        ),
        scenarios.create(
            Scenario::new(
                "Evasive Customer",
                "The customer changes the subject whenever payment comes up.",
            )
            .with_goal("Pin down a payment date"),
        ),
        scenarios.create(
            Scenario::new(
                "Desperate Customer",
                "The customer wants to pay but genuinely cannot this month.",
            )
            .with_goal("Agree on a realistic payment plan"),
        ),
    ];

    let service = EvolutionService::new(
        Arc::clone(&personas),
        Arc::clone(&scenarios),
        Arc::clone(&versions),
        Arc::new(SimulatedEvaluator::new(seed)),
        Arc::new(SimulatedProposer::new(seed)),
        EvolutionConfig::new()
            .with_mutation_count(mutations)
            .with_threshold(threshold),
    );

    println!("Running {cycles} evolution cycles (seed {seed})...");
    println!();

    let mut failed = false;
    for cycle in 1..=cycles {
        let status = service.run_to_completion(persona_id, &scenario_ids).await?;
        match status {
            RunStatus::Evolved {
                version,
                baseline_score,
                new_score,
                improvement,
                ..
            } => {
                println!(
                    "Cycle {cycle}: evolved to v{version} \
                     ({baseline_score:.2} -> {new_score:.2}, +{improvement:.2})"
                );
            }
            RunStatus::NotEvolved {
                reason,
                baseline_score,
                ..
            } => {
                println!("Cycle {cycle}: not evolved ({reason}, baseline {baseline_score:.2})");
            }
            RunStatus::Failed { reason } => {
                println!("Cycle {cycle}: FAILED ({reason})");
                failed = true;
            }
            RunStatus::Cancelled => println!("Cycle {cycle}: cancelled"),
            RunStatus::Running => unreachable!("run_to_completion returns terminal states"),
        }
    }

    println!();
    println!("Lineage:");
    let forest = LineageForest::build(
        versions.list(persona_id),
        versions.active_version_id(persona_id),
    );
    if forest.is_empty() {
        println!("  (no versions created)");
    } else {
        print!("{}", render_text(&forest));
    }

    println!();
    let prompt = service.get_active_prompt(persona_id)?;
    println!("Active prompt ({} chars):", prompt.len());
    for line in prompt.lines() {
        println!("  {line}");
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

/// Build a small ledger by hand, branch it through activation, and print
/// the reconstruction.
fn print_synthetic_tree() -> anyhow::Result<()> {
    let versions = VersionStore::new();
    let persona = Persona::new("Ada", "You are Ada, a support agent.");
    let persona_id = persona.id;

    let v1 = PersonaVersion::baseline(persona_id, persona.system_prompt.clone(), 5.2);
    let v1_id = versions.append(v1)?;
    let v2 = PersonaVersion::derived(persona_id, 2, v1_id, "prompt v2", 6.8)
        .with_baseline_score(5.2);
    let v2_id = versions.append(v2)?;
    let v3 = PersonaVersion::derived(persona_id, 3, v2_id, "prompt v3", 6.1)
        .with_baseline_score(6.8);
    versions.append(v3)?;

    // Roll back to v2 and branch from it
    versions.activate(v2_id)?;
    let v4 = PersonaVersion::derived(persona_id, 4, v2_id, "prompt v4", 7.4)
        .with_baseline_score(6.8);
    versions.append(v4)?;

    let forest = LineageForest::build(
        versions.list(persona_id),
        versions.active_version_id(persona_id),
    );
    print!("{}", render_text(&forest));
    Ok(())
}
