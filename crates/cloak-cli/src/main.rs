//! Cloak CLI - Private AI assistance for personal finance data
//!
//! Usage:
//!   cloak init                               Initialize database
//!   cloak import --file tx.json --account X  Import parsed transactions
//!   cloak anonymize --file tx.json           Tokenize records for an AI provider
//!   cloak detokenize "MERCHANT_0001 ..."     Restore names in an AI response

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use cloak_core::Config;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();

    let config = Config::load(cli.config.as_deref())?;
    let db_path = commands::resolve_db_path(cli.db.as_deref(), &config);
    let pool_size = config.database.pool_size;
    tracing::debug!("Using database {}", db_path.display());

    match cli.command {
        Commands::Init => commands::cmd_init(&db_path, pool_size, cli.no_encrypt),
        Commands::Status => commands::cmd_status(&db_path, pool_size, cli.no_encrypt),
        Commands::Import {
            file,
            account,
            account_type,
        } => {
            let db = commands::open_db(&db_path, pool_size, cli.no_encrypt)?;
            commands::cmd_import(&db, &file, &account, account_type.as_deref()).map(|_| ())
        }
        Commands::Tokens { action } => {
            let db = commands::open_db(&db_path, pool_size, cli.no_encrypt)?;
            match action {
                TokensAction::List {
                    token_type,
                    limit,
                    offset,
                } => commands::cmd_tokens_list(&db, token_type.as_deref(), limit, offset),
                TokensAction::Stats => commands::cmd_tokens_stats(&db),
                TokensAction::Unknown { names } => commands::cmd_tokens_unknown(&db, &names).map(|_| ()),
            }
        }
        Commands::Anonymize {
            file,
            no_category,
            provider,
        } => {
            let db = commands::open_db(&db_path, pool_size, cli.no_encrypt)?;
            let provider = match provider {
                Some(p) => p.parse().map_err(anyhow::Error::msg)?,
                None => config.anonymize.provider,
            };
            let include_category = config.anonymize.include_category && !no_category;
            commands::cmd_anonymize(&db, &file, provider, include_category).map(|_| ())
        }
        Commands::Detokenize { text } => {
            let db = commands::open_db(&db_path, pool_size, cli.no_encrypt)?;
            commands::cmd_detokenize(&db, &text).map(|_| ())
        }
        Commands::Preview { text } => {
            let db = commands::open_db(&db_path, pool_size, cli.no_encrypt)?;
            commands::cmd_preview(&db, &text)
        }
        Commands::Shift { date } => {
            let db = commands::open_db(&db_path, pool_size, cli.no_encrypt)?;
            commands::cmd_shift(&db, &date, false).map(|_| ())
        }
        Commands::Unshift { date } => {
            let db = commands::open_db(&db_path, pool_size, cli.no_encrypt)?;
            commands::cmd_shift(&db, &date, true).map(|_| ())
        }
        Commands::Privacy { action } => {
            let db = commands::open_db(&db_path, pool_size, cli.no_encrypt)?;
            match action {
                None | Some(PrivacyAction::Show) => commands::cmd_privacy_show(&db),
                Some(PrivacyAction::Set {
                    enabled,
                    provider,
                    obfuscate,
                }) => commands::cmd_privacy_set(&db, enabled, provider.as_deref(), obfuscate)
                    .map(|_| ()),
            }
        }
        Commands::Recurring { action } => match action {
            Some(RecurringAction::Next { date, frequency }) => {
                commands::cmd_recurring_next(&date, &frequency).map(|_| ())
            }
            action => {
                let db = commands::open_db(&db_path, pool_size, cli.no_encrypt)?;
                match action {
                    None => commands::cmd_recurring_list(&db, false),
                    Some(RecurringAction::List { all }) => commands::cmd_recurring_list(&db, all),
                    Some(RecurringAction::Mark {
                        transaction_id,
                        group,
                        new: _,
                        name,
                        frequency,
                    }) => commands::cmd_recurring_mark(
                        &db,
                        transaction_id,
                        group,
                        name,
                        frequency.as_deref(),
                    )
                    .map(|_| ()),
                    Some(RecurringAction::Unmark { transaction_id }) => {
                        commands::cmd_recurring_unmark(&db, transaction_id)
                    }
                    Some(RecurringAction::Next { .. }) => {
                        unreachable!("next is handled without a database")
                    }
                }
            }
        },
    }
}
