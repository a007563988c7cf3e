//! Mind Control - CLI client for the MIND DEVS progress service
//!
//! Inspects and exercises a learner's energy, coins, progress and badges
//! through the mindd HTTP API.

mod client;

use anyhow::Result;
use clap::{Parser, Subcommand};
use client::{MinddClient, DEFAULT_SERVER};
use mind_common::energy::MAX_ENERGY;
use mind_common::{CompletionOutcome, CompletionRequest, LearnerProfile};
use owo_colors::OwoColorize;

#[derive(Parser)]
#[command(name = "mindctl")]
#[command(about = "MIND DEVS - learner progress console", long_about = None)]
#[command(version)]
struct Cli {
    /// mindd base URL
    #[arg(long, global = true, default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check daemon health
    Health,

    /// Show a learner's energy, coins and verification state
    Profile { learner_id: i64 },

    /// Show the unlocked level of a course
    Progress { learner_id: i64, course: String },

    /// Submit a level completion
    Complete {
        learner_id: i64,
        course: String,
        level: u32,
        /// Mistakes made during the run
        #[arg(long, default_value_t = 0)]
        mistakes: u32,
    },

    /// Spend energy (one point per mistake by default)
    Energy {
        learner_id: i64,
        #[arg(long, default_value_t = 1)]
        spend: i64,
    },

    /// Buy a store item
    Buy { learner_id: i64, item: String },

    /// List store items
    Items,

    /// List a learner's badges
    Badges { learner_id: i64 },

    /// Show a lesson's exercises
    Lesson { course: String, level: u32 },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = MinddClient::new(&cli.server);

    match cli.command {
        Commands::Health => {
            let health = client.health().await?;
            println!(
                "{}  mindd v{} {} (up {}s)",
                "✓".bright_green().bold(),
                health.version,
                health.status,
                health.uptime_seconds
            );
        }
        Commands::Profile { learner_id } => {
            print_profile(&client.profile(learner_id).await?);
        }
        Commands::Progress { learner_id, course } => {
            let progress = client.progress(learner_id, &course).await?;
            println!("{}: level {} unlocked", course.bold(), progress.unlocked_level);
        }
        Commands::Complete {
            learner_id,
            course,
            level,
            mistakes,
        } => {
            let outcome = client
                .complete(&CompletionRequest {
                    learner_id,
                    course,
                    level,
                    mistakes,
                })
                .await?;
            print_outcome(&outcome);
        }
        Commands::Energy { learner_id, spend } => {
            let energy = client.adjust_energy(learner_id, -spend.abs()).await?;
            println!("{}", energy_bar(energy.energy));
            if energy.blocked {
                println!("{}  out of energy, wait or buy a recharge", "!".bright_red().bold());
            }
        }
        Commands::Buy { learner_id, item } => {
            let receipt = client.purchase(learner_id, &item).await?;
            println!(
                "{}  bought {} -> {} coins left",
                "✓".bright_green().bold(),
                receipt.item.bold(),
                receipt.coins
            );
            println!("{}", energy_bar(receipt.energy));
        }
        Commands::Items => {
            for item in client.store_items().await? {
                println!(
                    "{:<14} {:>4} coins  +{} energy",
                    item.key.bold(),
                    item.cost,
                    item.energy_delta
                );
            }
        }
        Commands::Badges { learner_id } => {
            let badges = client.badges(learner_id).await?;
            if badges.is_empty() {
                println!("{}", "no badges yet".dimmed());
            }
            for badge in badges {
                println!("{} {}  {}", badge.icon, badge.name.bold(), badge.description.dimmed());
            }
        }
        Commands::Lesson { course, level } => {
            let lesson = client.lesson(&course, level).await?;
            println!("{}", lesson.title.bright_white().bold());
            for (i, exercise) in lesson.exercises.iter().enumerate() {
                println!("\n{}. {}", i + 1, exercise.question);
                for option in &exercise.options {
                    println!("   {}) {}", option.id, option.text);
                }
            }
        }
    }

    Ok(())
}

fn energy_bar(energy: i64) -> String {
    let filled = energy.clamp(0, MAX_ENERGY) as usize;
    let empty = MAX_ENERGY as usize - filled;
    format!("energy {}{} {}/{}", "⚡".repeat(filled), "·".repeat(empty), energy, MAX_ENERGY)
}

fn print_profile(profile: &LearnerProfile) {
    println!("{} <{}>", profile.name.bright_white().bold(), profile.email);
    println!("{}", energy_bar(profile.energy));
    println!("coins  {}", profile.coins.bright_yellow());
    if !profile.verified {
        println!("{}", "email not verified".yellow());
    }
}

fn print_outcome(outcome: &CompletionOutcome) {
    let mark = if outcome.approved {
        "✓".bright_green().bold().to_string()
    } else {
        "✗".bright_red().bold().to_string()
    };
    println!("{}  {}", mark, outcome.message);
    println!("   unlocked level {}", outcome.unlocked_level);
    if !outcome.badges_granted.is_empty() {
        println!("   new badges {:?}", outcome.badges_granted);
    }
}
