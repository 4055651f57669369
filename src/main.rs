//! Concierge CLI binary entry point.

use std::io::Write;

use concierge::cli::{is_exit_word, render_event, AskArgs, Cli, Commands};
use concierge::config::ConciergeConfig;
use concierge::error::Result;
use concierge::session::ChatSession;
use concierge::store::ConversationStore;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    let result = match load_config(&cli) {
        Ok(config) => {
            init_tracing(config.debug);
            run(&cli, config).await
        }
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<ConciergeConfig> {
    let mut config = ConciergeConfig::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    Ok(config)
}

fn init_tracing(debug: bool) {
    let default = if debug { "concierge=debug" } else { "concierge=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: &Cli, config: ConciergeConfig) -> Result<()> {
    match cli.command() {
        Commands::Chat => handle_chat(&config).await,
        Commands::Ask(args) => handle_ask(&config, args).await,
        Commands::Serve(_) => concierge::server::serve(&config).await,
        Commands::History(args) => {
            handle_history(&config, args.limit);
            Ok(())
        }
        Commands::Clear => {
            let mut store = ConversationStore::open(&config.history_path);
            store.clear();
            report_warnings(store.drain_warnings());
            println!("Conversation history cleared.");
            Ok(())
        }
    }
}

/// Print a streamed turn; returns once the terminal event has been rendered.
async fn print_turn(session: &ChatSession, input: String) {
    let mut events = session.stream_chat(input);
    let mut stdout = std::io::stdout();
    while let Some(event) = events.next().await {
        let _ = write!(stdout, "{}", render_event(&event));
        let _ = stdout.flush();
    }
    println!();
    report_warnings(session.drain_warnings());
}

fn report_warnings(warnings: Vec<concierge::error::PersistenceWarning>) {
    for warning in warnings {
        eprintln!("[WARNING] could not save history: {warning}");
    }
}

async fn handle_chat(config: &ConciergeConfig) -> Result<()> {
    let session = ChatSession::from_config(config)?;

    println!("{}", "=".repeat(50));
    println!("Concierge personal assistant");
    println!("{}", "=".repeat(50));
    println!("Type 'exit', 'quit', 'stop' or 'bye' to end the conversation.");
    println!("Type 'clear' to reset the conversation history.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("[YOU] ");
        let _ = std::io::stdout().flush();

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if is_exit_word(input) {
            println!("\n[ASSISTANT] Goodbye! Have a great day!");
            break;
        }
        if input.eq_ignore_ascii_case("clear") {
            session.clear_history().await;
            println!("Conversation history cleared.");
            continue;
        }

        print!("\n[ASSISTANT] ");
        print_turn(&session, input.to_string()).await;
        println!();
    }
    Ok(())
}

async fn handle_ask(config: &ConciergeConfig, args: &AskArgs) -> Result<()> {
    let session = ChatSession::from_config(config)?;
    if args.no_stream {
        let answer = session.chat(args.prompt_text()).await?;
        println!("{answer}");
        report_warnings(session.drain_warnings());
    } else {
        print_turn(&session, args.prompt_text()).await;
    }
    Ok(())
}

fn handle_history(config: &ConciergeConfig, limit: usize) {
    let mut store = ConversationStore::open(&config.history_path);
    for message in store.all(Some(limit)) {
        let when = message.timestamp.format("%Y-%m-%d %H:%M:%S");
        let label = match message.tool_name() {
            Some(tool) => format!("{} ({tool})", message.role),
            None => message.role.to_string(),
        };
        println!("[{when}] {label}: {}", message.content);
        for call in message.tool_calls() {
            println!("    -> {}({})", call.name, call.arguments);
        }
    }
    report_warnings(store.drain_warnings());
}
