/// User actions that change the filter selection or trigger a reload.
///
/// Parsed from one line of text in the interactive shell:
///
/// ```text
/// set agent 奇异果        single-select filter or date bound
/// unset bidding_method   back to "all" (or empty date)
/// targeting A,B          replace the targeting selection
/// clear targeting        empty the targeting selection
/// reset                  clear every filter except the date range
/// reload                 refetch statistics with the current filters
/// options                refetch filter options, then statistics
/// ```
use std::str::FromStr;

use thiserror::Error;

use crate::filter::{FilterError, FilterField};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterCommand {
    Set { field: FilterField, value: String },
    Unset(FilterField),
    Targeting(Vec<String>),
    ClearTargeting,
    Reset,
    Reload,
    ReloadOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("'{0}' needs a value")]
    MissingValue(&'static str),
    #[error(transparent)]
    Filter(#[from] FilterError),
}

impl FromStr for FilterCommand {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = line
            .split_once(char::is_whitespace)
            .map(|(verb, rest)| (verb, rest.trim()))
            .unwrap_or((line, ""));

        match verb.to_ascii_lowercase().as_str() {
            "" => Err(CommandError::Empty),
            "set" => {
                let (field, value) = rest
                    .split_once(char::is_whitespace)
                    .ok_or(CommandError::MissingValue("set"))?;
                Ok(Self::Set {
                    field: field.parse()?,
                    value: value.trim().to_string(),
                })
            }
            "unset" => {
                if rest.is_empty() {
                    return Err(CommandError::MissingValue("unset"));
                }
                Ok(Self::Unset(rest.parse()?))
            }
            "targeting" => Ok(Self::Targeting(
                rest.split(',')
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
                    .collect(),
            )),
            "clear" if rest.is_empty() || rest == "targeting" => Ok(Self::ClearTargeting),
            "reset" => Ok(Self::Reset),
            "reload" | "refresh" => Ok(Self::Reload),
            "options" => Ok(Self::ReloadOptions),
            _ => Err(CommandError::UnknownCommand(line.to_string())),
        }
    }
}
