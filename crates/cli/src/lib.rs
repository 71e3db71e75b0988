pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "courier",
    about = "Courier assistant operator CLI",
    long_about = "Prepare the courier database, inspect configuration, and run single messages \
                  through the WhatsApp assistant pipeline.",
    after_help = "Examples:\n  courier migrate\n  courier seed\n  courier config\n  \
                  courier ask --phone +573000000001 \"¿ya llegó mi paquete?\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo customers, packages, trips, rates and office addresses")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Answer one customer message and print the assistant response as JSON")]
    Ask {
        #[arg(long, help = "Sender phone number as delivered by WhatsApp")]
        phone: String,
        #[arg(long, help = "Known customer id, skips phone matching when it resolves")]
        customer_id: Option<String>,
        #[arg(long, help = "Load the demo dataset before answering")]
        seed: bool,
        #[arg(help = "Customer message text")]
        message: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Ask { phone, customer_id, seed, message } => {
            commands::ask::run(commands::ask::AskArgs { phone, customer_id, seed, message })
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
