//! StudyMate CLI
//!
//! Serves the StudyMate HTTP API, or runs a quiz, a study plan request or a
//! tutor question directly on the terminal.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use studymate_core::{
    create_router, Advance, AppState, Config, PlannerEngine, QuizEngine, QuizRequest, QuizState,
    SharedGateway, StudentLevel, StudyPlanRequest, TutorEngine, TutorQuestion,
};
use studymate_gateway::GeminiGateway;
use studymate_report::{json::JsonGenerator, MarkdownGenerator};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// StudyMate - AI study companion
///
/// Adaptive quizzes, personalized study plans and an AI tutor, backed by
/// Google Gemini.
#[derive(Parser, Debug)]
#[command(name = "studymate")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: studymate.json in current directory)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP API server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Address to bind (overrides config)
        #[arg(long)]
        host: Option<String>,
    },

    /// Take a quiz on the terminal
    Quiz {
        /// Topic of the quiz
        #[arg(short, long)]
        topic: String,

        /// What you already know about the topic
        #[arg(short, long)]
        understanding: String,

        /// Number of questions (3-10, default from config)
        #[arg(short, long)]
        length: Option<u8>,

        /// Also write the review as JSON to this file
        #[arg(long, value_name = "FILE")]
        json_report: Option<PathBuf>,
    },

    /// Generate a study plan
    Plan {
        /// Exam date (YYYY-MM-DD)
        #[arg(short, long)]
        exam_date: NaiveDate,

        /// Subject to cover (repeat for several)
        #[arg(short, long = "subject", required = true)]
        subjects: Vec<String>,

        /// Hours available per day (0.5-16)
        #[arg(long)]
        hours: f64,

        /// Academic level: high-school, college or post-graduate
        #[arg(short, long, default_value = "college")]
        level: StudentLevel,
    },

    /// Ask the tutor one question
    Ask {
        /// Topic of the question
        #[arg(short, long)]
        topic: String,

        /// The question
        #[arg(short, long)]
        question: String,

        /// Academic level: high-school, college or post-graduate
        #[arg(short, long, default_value = "college")]
        level: StudentLevel,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(config = ?args.config, "Config file");

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Serve { port, host } => {
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(host) = host {
                config.host = host;
            }
            config.validate()?;
            serve(config).await
        }
        Command::Quiz {
            topic,
            understanding,
            length,
            json_report,
        } => {
            let length = length.unwrap_or(config.default_quiz_length);
            let request = QuizRequest::new(topic, understanding, length);
            run_quiz(&config, request, json_report.as_deref()).await
        }
        Command::Plan {
            exam_date,
            subjects,
            hours,
            level,
        } => {
            let request = StudyPlanRequest {
                exam_date,
                subjects,
                available_study_time: hours,
                student_level: level,
            };
            run_plan(&config, &request).await
        }
        Command::Ask {
            topic,
            question,
            level,
        } => run_ask(&config, TutorQuestion::new(topic, question, level)).await,
    }
}

/// Loads configuration from the specified path or default location.
fn load_config(config_path: Option<&Path>) -> anyhow::Result<Config> {
    match config_path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

fn build_gateway(config: &Config) -> anyhow::Result<SharedGateway> {
    let gateway = GeminiGateway::from_config(config)?;
    tracing::debug!(endpoint = gateway.endpoint(), "Gemini gateway ready");
    Ok(Arc::new(gateway))
}

fn print_config(config: &Config) {
    println!("Configuration loaded:");
    println!("  Model: {}", config.model);
    println!("  API base URL: {}", config.api_base_url);
    println!("  API key variable: {}", config.api_key_env);
    println!("  Listen address: {}", config.bind_address());
    println!("  Default quiz length: {}", config.default_quiz_length);
    println!("  Request timeout: {}s", config.request_timeout_secs);
    println!("  Max sessions: {}", config.max_sessions);
    println!("  Session idle timeout: {}s", config.session_idle_secs);
}

// ============================================================================
// serve
// ============================================================================

async fn serve(config: Config) -> anyhow::Result<()> {
    let gateway = build_gateway(&config)?;
    print_config(&config);

    let address = config.bind_address();
    let listener = TcpListener::bind(&address).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind {address}: {e}\n\nSuggestion: Use --port to pick a free port"
        )
    })?;

    let router = create_router(AppState::new(config, gateway));

    println!();
    println!("StudyMate API listening on http://{address}/api");
    tracing::info!(address = %address, "Server started");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl+C, shutting down");
            }
        })
        .await?;

    Ok(())
}

// ============================================================================
// quiz
// ============================================================================

async fn run_quiz(
    config: &Config,
    request: QuizRequest,
    json_report: Option<&Path>,
) -> anyhow::Result<()> {
    request.validate_form()?;
    let mut engine = QuizEngine::new(build_gateway(config)?);

    println!("Generating your personalized quiz on {}...", request.topic);
    engine.request_quiz(request).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while engine.state() == QuizState::Active {
        let Some(session) = engine.session() else {
            break;
        };
        let Some(question) = session.current_question() else {
            break;
        };
        let number = session.current_index + 1;
        let total = session.len();
        let options = question.options.clone();

        println!();
        println!("Question {number} of {total}");
        println!("{}", question.question);
        for (i, option) in options.iter().enumerate() {
            println!("  {}. {option}", i + 1);
        }

        let choice = read_choice(&mut lines, options.len()).await?;
        engine.select_answer(&options[choice])?;

        if let Some(question) = engine.current_question() {
            let verdict = if engine.is_correct(number - 1) == Some(true) {
                "Correct!"
            } else {
                "Incorrect"
            };
            println!("{verdict} {}", question.explanation);
        }

        if let Advance::Finished(result) = engine.advance()? {
            println!();
            println!("Quiz complete! {:.0}%", result.percentage);
            println!(
                "You answered {} out of {} questions correctly.",
                result.score, result.total
            );
            println!("{}", result.tier.message());
        }
    }

    if let Some(report) = engine.report() {
        println!();
        println!("{}", MarkdownGenerator::new(&report).generate());

        if let Some(path) = json_report {
            JsonGenerator::new(&report).write_to_file(path, true)?;
            println!("Review written to {}", path.display());
        }
    }

    Ok(())
}

/// Reads a 1-based option number from stdin and returns it 0-based.
async fn read_choice(lines: &mut Lines<BufReader<Stdin>>, count: usize) -> anyhow::Result<usize> {
    loop {
        println!("Your answer (1-{count}):");
        let Some(line) = lines.next_line().await? else {
            anyhow::bail!("Input closed before the quiz was finished");
        };
        match line.trim().parse::<usize>() {
            Ok(n) if (1..=count).contains(&n) => return Ok(n - 1),
            _ => println!("Please enter a number from 1 to {count}."),
        }
    }
}

// ============================================================================
// plan / ask
// ============================================================================

async fn run_plan(config: &Config, request: &StudyPlanRequest) -> anyhow::Result<()> {
    let mut engine = PlannerEngine::new(build_gateway(config)?);

    println!("Generating your study plan...");
    let plan = engine.generate(request).await?;

    println!();
    println!("{plan}");
    Ok(())
}

async fn run_ask(config: &Config, question: TutorQuestion) -> anyhow::Result<()> {
    let mut engine = TutorEngine::new(build_gateway(config)?);

    let reply = engine.ask(question).await?;

    println!("{}", reply.content);
    Ok(())
}
