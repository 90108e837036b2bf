use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use datewise_agents::{DatePlannerAgent, PlannedDate};
use datewise_core::{ComposerConfig, RawDateRequest, ValidationResult, Validator, ValidatorConfig};
use datewise_llm::{ExtractionError, LanguageStack};
use datewise_observability::{init_tracing, AppMetrics};
use datewise_sources::Sources;

type Agent = DatePlannerAgent<LanguageStack, Sources>;

#[derive(Debug, Parser)]
#[command(name = "dateplan")]
#[command(about = "Plan a date from a plain-language request")]
struct Cli {
    /// Reference date used instead of today (YYYY-MM-DD).
    #[arg(long, global = true, env = "DATEWISE_TODAY")]
    today: Option<NaiveDate>,

    /// Skip the language model and external lookups.
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Plan one date. Prompts for the request when TEXT is omitted.
    Plan {
        text: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Plan dates interactively until `exit` or `quit`.
    Chat,
    /// Run only the validator on structured fields.
    Validate {
        #[arg(long)]
        city: Option<String>,
        #[arg(long)]
        budget: Option<String>,
        #[arg(long)]
        date_type: Option<String>,
        #[arg(long)]
        timing: Option<String>,
    },
    /// List supported cities.
    Cities,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing("datewise_cli");
    let cli = Cli::parse();

    let reference = cli.today.unwrap_or_else(|| Local::now().date_naive());
    let agent = build_agent(cli.offline)?;

    match cli.command {
        Command::Plan { text, json } => {
            let text = match text {
                Some(text) => text,
                None => prompt("Your request: ")?,
            };
            if text.trim().is_empty() {
                bail!("no request provided");
            }

            let planned = agent.plan(&text, reference).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&planned)?);
            } else {
                print_plan(&planned);
            }
        }
        Command::Chat => run_chat(&agent, reference).await?,
        Command::Validate {
            city,
            budget,
            date_type,
            timing,
        } => {
            let raw = RawDateRequest {
                city,
                budget: budget.map(serde_json::Value::String),
                date_type,
                timing_phrase: timing,
                special_requirements: None,
            };
            let result = agent.validate(&raw, reference);
            print_validation(&result);
        }
        Command::Cities => {
            let config = agent.validator().config();
            for name in config.cities.canonical_names() {
                if name == config.default_city {
                    println!("{name} (default)");
                } else {
                    println!("{name}");
                }
            }
        }
    }

    Ok(())
}

fn build_agent(offline: bool) -> Result<Agent> {
    let validator_config = ValidatorConfig::from_env().context("invalid validator configuration")?;
    let composer = ComposerConfig::from_env().context("invalid composer configuration")?;

    let (language, sources) = if offline {
        (
            LanguageStack::offline(validator_config.cities.clone()),
            Sources::offline(),
        )
    } else {
        (
            LanguageStack::from_env(validator_config.cities.clone())
                .context("failed to build language model client")?,
            Sources::from_env().context("failed to build venue and weather clients")?,
        )
    };

    let validator = Validator::new(validator_config).context("invalid validator configuration")?;
    Ok(DatePlannerAgent::new(
        Arc::new(language),
        Arc::new(sources),
        validator,
        composer,
        AppMetrics::shared(),
    ))
}

async fn run_chat(agent: &Agent, reference: NaiveDate) -> Result<()> {
    println!("Tell me about your ideal date. Type 'exit' to quit.");
    println!("  e.g. \"Plan a romantic dinner date in Mumbai under ₹2500\"");

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let message = line.trim();
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            break;
        }
        if message.is_empty() {
            continue;
        }

        match agent.plan(message, reference).await {
            Ok(planned) => print_plan(&planned),
            Err(err) if err.downcast_ref::<ExtractionError>().is_some() => {
                println!("Could not understand that request: {err:#}\n");
            }
            Err(err) => return Err(err),
        }
    }

    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn print_plan(planned: &PlannedDate) {
    let plan = &planned.plan;

    if !plan.warnings.is_empty() {
        println!("Adjusted your request:");
        for warning in &plan.warnings {
            println!("  - {warning}");
        }
        println!();
    }

    println!("{}\n", plan.narrative);

    if !plan.narrative_fallback {
        for (index, venue) in plan.venues.iter().enumerate() {
            let rating = venue
                .rating
                .map(|rating| format!("{rating:.1}"))
                .unwrap_or_else(|| "n/a".to_string());
            println!(
                "{}. {} ({}, {} reviews, {}) {}",
                index + 1,
                venue.name,
                rating,
                venue.review_count,
                venue.price_tier.symbol(),
                venue.address
            );
        }
        for advisory in &plan.advisories {
            println!("* {advisory}");
        }
    }

    for failure in &plan.source_failures {
        println!("! {:?} lookup failed: {}", failure.source, failure.message);
    }
    println!();
}

fn print_validation(result: &ValidationResult) {
    let request = &result.request;
    println!("City:      {}", request.city);
    println!("Budget:    ₹{}", request.budget);
    println!("Date type: {}", request.date_type);
    println!("Date:      {}", result.resolved_date.date);
    if let Some(part) = result.resolved_date.time_of_day {
        println!("Time:      {}", part.as_str());
    }

    if result.is_clean() {
        println!("\nNo corrections needed.");
    } else {
        println!("\nWarnings:");
        for warning in &result.warnings {
            println!("  - {warning}");
        }
    }
}
