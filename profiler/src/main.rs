use std::path::PathBuf;
use std::sync::Arc;
use clap::{Parser, Subcommand};
use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use profiler::{AnswerOutcome, Classification, Profiler, ProfilerConfig, Question, SessionState};

#[derive(Parser)]
#[command(name = "profiler")]
#[command(about = "Adaptive website visitor profiler", long_about = None)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory for the file store
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Host to bind to
    #[arg(long, global = true)]
    host: Option<String>,

    /// Port to bind to
    #[arg(short, long, global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve,

    /// Profile a page and print the first question
    Start {
        /// Page to profile
        url: String,
    },

    /// Answer the current question of a session
    Answer {
        /// Session ID
        session_id: String,

        /// Answer text
        answer: String,
    },

    /// Show a session and, once finished, its classification
    Show {
        /// Session ID
        session_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "profiler=info".into())
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Serve => {
            use profiler::api::{ApiServer, ApiServerConfig};

            let profiler = Arc::new(Profiler::from_config(&config)?);
            let server = ApiServer::new(ApiServerConfig::from(&config.server), profiler);
            println!("Starting API server on {}:{}", config.server.host, config.server.port);
            server.start().await?;
        }

        Commands::Start { ref url } => {
            let profiler = Profiler::from_config(&config)?;
            let outcome = profiler.start(url).await?;

            println!("Session: {}", outcome.session_id);
            print_question(&outcome.question);
        }

        Commands::Answer { ref session_id, ref answer } => {
            let profiler = Profiler::from_config(&config)?;
            match profiler.answer(session_id, answer).await? {
                AnswerOutcome::Question(question) => print_question(&question),
                AnswerOutcome::Classification(classification) => {
                    print_classification(&classification)
                }
            }
        }

        Commands::Show { ref session_id } => {
            let profiler = Profiler::from_config(&config)?;
            let session = profiler.session(session_id).await?;

            println!("Session: {}", session.session_id);
            println!("  URL:      {}", session.url);
            println!("  State:    {:?}", session.state);
            println!("  Answers:  {}", session.response_count());
            println!("  Created:  {}", session.created_at.format("%Y-%m-%d %H:%M"));
            println!("  Topics:   {}", session.content_analysis.topics.join(", "));

            for (i, response) in session.responses.iter().enumerate() {
                println!("\n  [{}] {}", i + 1, response.question);
                println!("      -> {}", response.answer);
            }

            match session.state {
                SessionState::Terminal => {
                    let classification = profiler.classification(session_id).await?;
                    println!();
                    print_classification(&classification);
                }
                _ => {
                    if let Some(ref question) = session.current_question {
                        println!();
                        print_question(question);
                    }
                }
            }
        }
    }

    Ok(())
}

/// Defaults, then YAML and environment, then command-line flags
fn load_config(cli: &Cli) -> Result<ProfilerConfig> {
    let mut config = ProfilerConfig::load(cli.config.as_deref())
        .context("failed to load configuration")?;

    if let Some(ref dir) = cli.data_dir {
        config.storage.data_dir = dir.clone();
    }
    if let Some(ref host) = cli.host {
        config.server.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    Ok(config)
}

fn print_question(question: &Question) {
    println!("Question: {}", question.text);
    for (i, option) in question.options.iter().enumerate() {
        println!("  {}. {}", i + 1, option);
    }
}

fn print_classification(classification: &Classification) {
    println!("Classification ({:?}):", classification.source);
    println!("  Interests:");
    for interest in &classification.interests {
        println!("    - {}", interest);
    }
    println!("  Relevant sections:");
    for section in &classification.relevant_sections {
        println!("    - {}", section);
    }
}
