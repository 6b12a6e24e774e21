use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cashflow_engine::cli::{
    handle_account_command, handle_agenda_command, handle_bill_command, handle_envelope_command,
    handle_export_command, handle_flow_command, handle_import_command, handle_income_command,
    handle_rule_command, handle_transaction_command, handle_verify_command, parse_date, CliContext,
};
use cashflow_engine::config::{CashflowPaths, Settings};
use cashflow_engine::storage::Storage;

#[derive(Parser)]
#[command(
    name = "cashflow",
    version,
    about = "Recurring bills, income and envelope budgeting from the command line",
    long_about = "cashflow tracks recurring bills and income, keeps an account ledger, \
                  and budgets spending through envelopes whose periods follow the \
                  same recurrence rules."
)]
struct Cli {
    /// Treat this date as today (YYYY-MM-DD)
    #[arg(long, global = true, env = "CASHFLOW_TODAY")]
    today: Option<String>,

    /// Log engine activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the data directory and default settings
    Init,

    /// Show current configuration and paths
    Config,

    /// Account management commands
    #[command(subcommand)]
    Account(cashflow_engine::cli::AccountCommands),

    /// Ledger entry commands
    #[command(subcommand, alias = "txn")]
    Transaction(cashflow_engine::cli::TransactionCommands),

    /// Recurring bill commands
    #[command(subcommand)]
    Bill(cashflow_engine::cli::BillCommands),

    /// Recurring income commands
    #[command(subcommand)]
    Income(cashflow_engine::cli::IncomeCommands),

    /// Envelope budgeting commands
    #[command(subcommand)]
    Envelope(cashflow_engine::cli::EnvelopeCommands),

    /// Categorization rule commands
    #[command(subcommand)]
    Rule(cashflow_engine::cli::RuleCommands),

    /// Bills and income scheduled in a window
    Agenda {
        /// Window start (YYYY-MM-DD), defaults to today
        #[arg(long)]
        from: Option<String>,
        /// Window length in days
        #[arg(long, default_value = "30")]
        days: u32,
        /// Only unpaid bills and unreceived income
        #[arg(long)]
        outstanding: bool,
    },

    /// Projected day-by-day balance
    Flow {
        /// Limit to one account
        #[arg(short, long)]
        account: Option<String>,
        /// Window start (YYYY-MM-DD), defaults to today
        #[arg(long)]
        from: Option<String>,
        /// Window length in days
        #[arg(long, default_value = "30")]
        days: u32,
        /// Show days without events
        #[arg(long)]
        all_days: bool,
    },

    /// Check cached balances against the ledger
    Verify,

    /// Export all data as JSON
    Export {
        /// Output file, stdout if omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Replace all data with a JSON export
    Import {
        /// File produced by `cashflow export`
        file: PathBuf,
    },

    /// Show recent audit log entries
    Audit {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (warn)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("cashflow_engine=debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr).compact())
        .init();

    let paths = CashflowPaths::new()?;
    let settings = Settings::load_or_create(&paths)?;
    let storage = Storage::open(&paths)?;

    let today = match cli.today.as_deref() {
        Some(date) => parse_date(date)?,
        None => chrono::Local::now().date_naive(),
    };
    let ctx = CliContext::new(&storage, &settings, today);

    match cli.command {
        Some(Commands::Init) => {
            paths.ensure_directories()?;
            settings.save(&paths)?;
            println!("Initialized cashflow at: {}", paths.base_dir().display());
        }
        Some(Commands::Config) => {
            println!("Cashflow Configuration");
            println!("======================");
            println!("Base directory: {}", paths.base_dir().display());
            println!("Data file:      {}", paths.data_file().display());
            println!("Audit log:      {}", paths.audit_log().display());
            println!();
            println!("Settings:");
            println!("  Duplicate payments:  {:?}", settings.duplicate_payment);
            println!("  Envelope transfers:  {:?}", settings.envelope_transfer);
            println!("  Keyword matching:    {:?}", settings.match_strategy);
            println!("  Low balance warning: {}", ctx.style().money(settings.low_balance_warning));
            println!("  Today:               {}", today);
        }
        Some(Commands::Account(cmd)) => handle_account_command(&ctx, cmd)?,
        Some(Commands::Transaction(cmd)) => handle_transaction_command(&ctx, cmd)?,
        Some(Commands::Bill(cmd)) => handle_bill_command(&ctx, cmd)?,
        Some(Commands::Income(cmd)) => handle_income_command(&ctx, cmd)?,
        Some(Commands::Envelope(cmd)) => handle_envelope_command(&ctx, cmd)?,
        Some(Commands::Rule(cmd)) => handle_rule_command(&ctx, cmd)?,
        Some(Commands::Agenda {
            from,
            days,
            outstanding,
        }) => handle_agenda_command(&ctx, from, days, outstanding)?,
        Some(Commands::Flow {
            account,
            from,
            days,
            all_days,
        }) => handle_flow_command(&ctx, account, from, days, all_days)?,
        Some(Commands::Verify) => handle_verify_command(&ctx)?,
        Some(Commands::Export { output }) => handle_export_command(&ctx, output.as_deref())?,
        Some(Commands::Import { file }) => handle_import_command(&ctx, &file)?,
        Some(Commands::Audit { limit }) => {
            let entries = storage.audit_trail()?;
            if entries.is_empty() {
                println!("Audit log is empty.");
            }
            let skip = entries.len().saturating_sub(limit);
            for entry in entries.iter().skip(skip) {
                println!("{}", entry.format_human_readable());
            }
        }
        None => {
            println!("cashflow - recurring bills, income and envelope budgeting");
            println!();
            println!("Run 'cashflow --help' for usage information.");
        }
    }

    Ok(())
}
