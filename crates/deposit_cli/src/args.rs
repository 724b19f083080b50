//! Command-line argument parsing.

use deposit_core::{parse_amount, UserId};
use rust_decimal::Decimal;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub const USAGE: &str = "usage: deposit_cli deposit <user_uuid> <amount> | list [<user_uuid>] | show <deposit_uuid> | ping";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Deposit { user_id: UserId, amount: Decimal },
    List { user_id: Option<UserId> },
    Show { deposit_id: Uuid },
    Ping,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgsError {
    Missing(&'static str),
    Invalid { name: &'static str, value: String },
    UnknownCommand(String),
}

impl Display for ArgsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(name) => write!(f, "missing argument <{name}>; {USAGE}"),
            Self::Invalid { name, value } => write!(f, "invalid <{name}> `{value}`"),
            Self::UnknownCommand(command) => write!(f, "unknown command `{command}`; {USAGE}"),
        }
    }
}

impl std::error::Error for ArgsError {}

/// Parses arguments after the program name.
pub fn parse_command<I>(args: I) -> Result<Command, ArgsError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let command = args.next().ok_or(ArgsError::Missing("command"))?;

    match command.as_str() {
        "deposit" => {
            let user_id = parse_uuid("user_uuid", args.next())?;
            let raw_amount = args.next().ok_or(ArgsError::Missing("amount"))?;
            let amount = parse_amount(&raw_amount).map_err(|_| ArgsError::Invalid {
                name: "amount",
                value: raw_amount,
            })?;
            Ok(Command::Deposit { user_id, amount })
        }
        "list" => {
            let user_id = match args.next() {
                Some(raw) => Some(parse_uuid("user_uuid", Some(raw))?),
                None => None,
            };
            Ok(Command::List { user_id })
        }
        "show" => Ok(Command::Show {
            deposit_id: parse_uuid("deposit_uuid", args.next())?,
        }),
        "ping" => Ok(Command::Ping),
        other => Err(ArgsError::UnknownCommand(other.to_string())),
    }
}

fn parse_uuid(name: &'static str, raw: Option<String>) -> Result<Uuid, ArgsError> {
    let raw = raw.ok_or(ArgsError::Missing(name))?;
    Uuid::parse_str(raw.trim()).map_err(|_| ArgsError::Invalid { name, value: raw })
}
