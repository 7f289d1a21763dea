use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde_json::json;

use podium::ai::AnalysisOrchestrator;
use podium::catalog::StaticCatalog;
use podium::{analytics, db, GameSpecificData, GameType, RawPerformance, SessionService, TimeRange};

#[derive(Parser)]
#[command(name = "podium", about = "Public-speaking training sessions and analytics")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Open a new game session and print the dealt prompts
    Start {
        #[arg(long)]
        user: String,
        #[arg(long)]
        game: String,
        #[arg(long, default_value = "easy")]
        difficulty: String,
    },
    /// Complete a session with raw telemetry (JSON via --data)
    End {
        #[arg(long)]
        user: String,
        #[arg(long)]
        session: i64,
        /// Game-specific telemetry as JSON, e.g.
        /// {"gameType":"rapidFire","totalPrompts":10,"completedResponses":7,"responseTime":55}
        #[arg(long)]
        data: String,
        #[arg(long, default_value_t = 0)]
        total_prompts: u32,
        #[arg(long, default_value_t = 0)]
        completed_prompts: u32,
    },
    /// Progress overview for a rolling window
    Overview {
        #[arg(long)]
        user: String,
        #[arg(long, default_value = "month")]
        range: String,
    },
    /// Score distribution, consistency and calendar groupings
    Analytics {
        #[arg(long)]
        user: String,
        #[arg(long, default_value = "month")]
        range: String,
        #[arg(long)]
        game: Option<String>,
    },
    /// Compare the current window against the previous one
    Compare {
        #[arg(long)]
        user: String,
        #[arg(long, default_value = "month")]
        range: String,
        #[arg(long)]
        game: Option<String>,
    },
    /// AI-generated practice insights over recent sessions
    Insights {
        #[arg(long)]
        user: String,
        #[arg(long, default_value = "month")]
        range: String,
    },
    /// Remove every session, stat and achievement for a user
    DeleteAccount {
        #[arg(long)]
        user: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("podium=info")),
        )
        .init();

    let args = Args::parse();
    let pool = db::create_pool().await?;
    let service = SessionService::new(pool.clone(), AnalysisOrchestrator::from_env(), Box::new(StaticCatalog));
    let now = Utc::now();

    match args.command {
        Command::Start {
            user,
            game,
            difficulty,
        } => {
            let started = service.start(&user, &game, &difficulty).await?;
            print_json(&started)?;
        }
        Command::End {
            user,
            session,
            data,
            total_prompts,
            completed_prompts,
        } => {
            let data: GameSpecificData = serde_json::from_str(&data)?;
            let raw = RawPerformance {
                total_prompts,
                completed_prompts,
            };
            let completed = service.end(&user, session, raw, data).await?;
            print_json(&json!({
                "session": completed.session,
                "aiAnalysis": completed.analysis,
                "newlyUnlocked": completed.newly_unlocked,
            }))?;
        }
        Command::Overview { user, range } => {
            let range: TimeRange = range.parse()?;
            let report = analytics::overview(&pool, &user, range, now).await?;
            print_json(&report)?;
        }
        Command::Analytics { user, range, game } => {
            let range: TimeRange = range.parse()?;
            let game_type = game.as_deref().map(str::parse::<GameType>).transpose()?;
            let report = analytics::analytics(&pool, &user, game_type, range, now).await?;
            print_json(&report)?;
        }
        Command::Compare { user, range, game } => {
            let range: TimeRange = range.parse()?;
            let game_type = game.as_deref().map(str::parse::<GameType>).transpose()?;
            let report = analytics::compare(
                &pool,
                &user,
                range.current_period(now),
                range.previous_period(now),
                game_type,
            )
            .await?;
            print_json(&report)?;
        }
        Command::Insights { user, range } => {
            let range: TimeRange = range.parse()?;
            let report =
                analytics::insights(&pool, service.orchestrator(), &user, range, now).await?;
            print_json(&report)?;
        }
        Command::DeleteAccount { user } => {
            service.delete_account(&user).await?;
            println!("deleted all data for {user}");
        }
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
