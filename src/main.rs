use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use mail_rules::cli::{MENU, MenuChoice, ensure_rules_file};
use mail_rules::config::AppConfig;
use mail_rules::error::{ConfigError, Error};
use mail_rules::pipeline::{RuleProcessor, fetch_and_store};
use mail_rules::provider::{ActionExecutor, DryRunExecutor, GmailClient};
use mail_rules::rules::{ActionDispatcher, RuleSet, load_rules_from_path};
use mail_rules::store::{LibSqlBackend, MailStore};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let choice = match read_choice().await {
        Ok(Some(choice)) => choice,
        Ok(None) => return ExitCode::SUCCESS,
        Err(ChoiceError::Invalid(reason)) => {
            eprintln!("Error: {reason}");
            return ExitCode::from(2);
        }
        Err(ChoiceError::Io(e)) => {
            eprintln!("Error: failed to read menu choice: {e}");
            return ExitCode::from(1);
        }
    };

    if choice == MenuChoice::Exit {
        eprintln!("Bye.");
        return ExitCode::SUCCESS;
    }

    match run(choice).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

enum ChoiceError {
    Invalid(String),
    Io(std::io::Error),
}

/// Choice from the first argument, else from the interactive menu.
/// `None` means stdin closed before a choice was made.
async fn read_choice() -> Result<Option<MenuChoice>, ChoiceError> {
    if let Some(arg) = std::env::args().nth(1) {
        return arg.parse::<MenuChoice>().map(Some).map_err(ChoiceError::Invalid);
    }

    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(format!("📬 mail-rules v{}\n{MENU}\nChoose an option: ", env!("CARGO_PKG_VERSION")).as_bytes())
        .await
        .map_err(ChoiceError::Io)?;
    stdout.flush().await.map_err(ChoiceError::Io)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    match lines.next_line().await.map_err(ChoiceError::Io)? {
        Some(line) => line.parse::<MenuChoice>().map(Some).map_err(ChoiceError::Invalid),
        None => Ok(None),
    }
}

async fn run(choice: MenuChoice) -> Result<(), Error> {
    let config = AppConfig::from_env()?;

    // Rule problems surface before anything touches the mailbox.
    let rules: Option<RuleSet> = if choice.processes() {
        if ensure_rules_file(&config.rules_path)? {
            eprintln!("   Created default rules at {}", config.rules_path.display());
        }
        Some(load_rules_from_path(&config.rules_path)?)
    } else {
        None
    };

    let gmail = if choice.fetches() || (choice.processes() && !config.dry_run) {
        Some(Arc::new(GmailClient::new(config.gmail_config()?)?))
    } else {
        None
    };

    // ── Database ─────────────────────────────────────────────────────────
    let store = Arc::new(LibSqlBackend::new_local(&config.db_path).await?);
    eprintln!("   Database: {}", config.db_path.display());

    if choice == MenuChoice::Stats {
        println!("{}", store.stats().await?);
        return Ok(());
    }

    if choice.fetches() {
        let provider = gmail
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("GMAIL_ACCESS_TOKEN".into()))?;
        let summary = fetch_and_store(provider, store.as_ref(), config.fetch_limit).await?;
        println!("Fetch: {summary}");
    }

    if let Some(rules) = rules {
        let executor: Arc<dyn ActionExecutor> = match gmail {
            Some(client) if !config.dry_run => client as Arc<dyn ActionExecutor>,
            _ => Arc::new(DryRunExecutor),
        };
        let store: Arc<dyn MailStore> = store;
        let dispatcher = ActionDispatcher::new(executor, Arc::clone(&store));
        let processor = RuleProcessor::new(store, dispatcher, config.process_limit);

        let summary = processor.run(&rules, Utc::now()).await?;
        println!("Process: {summary}");
    }

    Ok(())
}
