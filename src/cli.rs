//! Command-line surface: menu choices and rule-file bootstrap.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use tracing::info;

use crate::error::ConfigError;
use crate::rules::model::RuleSet;

/// Interactive menu shown when no command is given.
pub const MENU: &str = "\
1. Fetch emails
2. Process rules
3. Fetch and process
4. Exit
5. Show statistics";

/// What the user asked the tool to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Fetch,
    Process,
    Both,
    Exit,
    Stats,
}

impl MenuChoice {
    pub fn fetches(self) -> bool {
        matches!(self, Self::Fetch | Self::Both)
    }

    pub fn processes(self) -> bool {
        matches!(self, Self::Process | Self::Both)
    }
}

impl FromStr for MenuChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "fetch" => Ok(Self::Fetch),
            "2" | "process" => Ok(Self::Process),
            "3" | "both" => Ok(Self::Both),
            "4" | "exit" | "quit" => Ok(Self::Exit),
            "5" | "stats" => Ok(Self::Stats),
            other => Err(format!(
                "invalid choice '{other}' (expected 1-5, fetch, process, both, exit or stats)"
            )),
        }
    }
}

impl fmt::Display for MenuChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Fetch => "fetch",
            Self::Process => "process",
            Self::Both => "both",
            Self::Exit => "exit",
            Self::Stats => "stats",
        };
        f.write_str(s)
    }
}

/// Write the starter rule set to `path` unless a file is already there.
///
/// Returns `true` when a file was created.
pub fn ensure_rules_file(path: &Path) -> Result<bool, ConfigError> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let document = serde_json::to_string_pretty(&RuleSet::starter())
        .map_err(|e| ConfigError::ParseError(format!("failed to serialize starter rules: {e}")))?;
    std::fs::write(path, document)?;
    info!(path = %path.display(), "Created default rule file");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::load_rules_from_path;

    #[test]
    fn parses_numbers_and_words() {
        assert_eq!("1".parse::<MenuChoice>().unwrap(), MenuChoice::Fetch);
        assert_eq!(" 2\n".parse::<MenuChoice>().unwrap(), MenuChoice::Process);
        assert_eq!("Both".parse::<MenuChoice>().unwrap(), MenuChoice::Both);
        assert_eq!("4".parse::<MenuChoice>().unwrap(), MenuChoice::Exit);
        assert_eq!("quit".parse::<MenuChoice>().unwrap(), MenuChoice::Exit);
        assert_eq!("5".parse::<MenuChoice>().unwrap(), MenuChoice::Stats);
        assert_eq!("STATS".parse::<MenuChoice>().unwrap(), MenuChoice::Stats);
        assert!("6".parse::<MenuChoice>().is_err());
        assert!("".parse::<MenuChoice>().is_err());
    }

    #[test]
    fn choice_steps() {
        assert!(MenuChoice::Both.fetches() && MenuChoice::Both.processes());
        assert!(MenuChoice::Fetch.fetches() && !MenuChoice::Fetch.processes());
        assert!(!MenuChoice::Exit.fetches() && !MenuChoice::Exit.processes());
        assert!(!MenuChoice::Stats.fetches() && !MenuChoice::Stats.processes());
    }

    #[test]
    fn menu_lists_every_choice() {
        for (number, choice) in [
            ("1", MenuChoice::Fetch),
            ("2", MenuChoice::Process),
            ("3", MenuChoice::Both),
            ("4", MenuChoice::Exit),
            ("5", MenuChoice::Stats),
        ] {
            assert!(MENU.contains(&format!("{number}. ")));
            assert_eq!(number.parse::<MenuChoice>().unwrap(), choice);
            assert_eq!(choice.to_string().parse::<MenuChoice>().unwrap(), choice);
        }
    }

    #[test]
    fn creates_starter_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("email_rules.json");

        assert!(ensure_rules_file(&path).unwrap());
        let rules = load_rules_from_path(&path).unwrap();
        assert_eq!(rules, RuleSet::starter());

        std::fs::write(&path, r#"{"rules": []}"#).unwrap();
        assert!(!ensure_rules_file(&path).unwrap());
        assert!(load_rules_from_path(&path).unwrap().is_empty());
    }
}
