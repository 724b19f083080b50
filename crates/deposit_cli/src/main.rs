//! Deposit CLI entry point.
//!
//! # Responsibility
//! - Wire the SQLite store and a log-only channel into the submission flow.
//! - Map submission results to stdout lines and exit codes.

mod args;

use args::{parse_command, Command};
use deposit_core::db::open_db;
use deposit_core::{
    core_version, init_logging_from_config, ping, CoreConfig, DepositListQuery, DepositService,
    LogEventBus, SqliteDepositRepository, SubmitDepositRequest,
};
use log::info;
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error={err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let command = parse_command(std::env::args().skip(1))?;
    if command == Command::Ping {
        println!("deposit_core ping={}", ping());
        println!("deposit_core version={}", core_version());
        return Ok(());
    }

    let config = CoreConfig::from_env()?;
    init_logging_from_config(&config)?;
    info!(
        "event=cli_start module=cli status=ok db_path={}",
        config.db_path.display()
    );

    let conn = open_db(&config.db_path)?;
    let repo = SqliteDepositRepository::try_new(&conn)?;
    let service = DepositService::with_config(repo, LogEventBus, config.service);

    match command {
        Command::Deposit { user_id, amount } => {
            let deposit_id = service.submit_deposit(&SubmitDepositRequest::new(user_id, amount))?;
            println!("deposit_id={deposit_id}");
        }
        Command::List { user_id } => {
            let query = DepositListQuery {
                user_id,
                ..DepositListQuery::default()
            };
            for deposit in service.list_deposits(&query)? {
                println!("{} {} {}", deposit.id, deposit.user_id, deposit.amount);
            }
        }
        Command::Show { deposit_id } => {
            let deposit = service.require_deposit(deposit_id)?;
            println!(
                "id={} user_id={} amount={} created_at_ms={}",
                deposit.id, deposit.user_id, deposit.amount, deposit.created_at_ms
            );
        }
        Command::Ping => {}
    }

    Ok(())
}
