use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use becomelog_client::DEFAULT_ENTRY_LIMIT;
use becomelog_types::entry::{EntryPatch, NewEntry};

/// Command-line access to the BecomeLog journal API
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    /// Deployment config JSON (the object holding `apiUrl`).
    #[arg(long, global = true, env = "BECOMELOG_CONFIG")]
    pub config: Option<PathBuf>,

    /// API base URL. Takes precedence over the config file and BECOMELOG_API_URL
    /// unless blank.
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Directory holding the persisted auth token.
    #[arg(long, global = true, env = "BECOMELOG_DATA_DIR", default_value = ".becomelog")]
    pub data_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that the API is up. Needs no token.
    Health,
    /// List recent entries.
    List {
        #[arg(long, short, default_value_t = DEFAULT_ENTRY_LIMIT)]
        limit: u32,
    },
    /// Show one entry.
    Get { entry_id: String },
    /// Create an entry.
    Create(NewEntryArgs),
    /// Change some fields of an entry.
    Update {
        entry_id: String,
        #[command(flatten)]
        fields: PatchArgs,
    },
    /// Delete an entry.
    Delete { entry_id: String },
    /// Store a bearer token for later calls.
    Login { token: String },
    /// Forget the stored token.
    ///
    /// Only the saved token is removed. The next run starts again from
    /// BECOMELOG_DEV_AUTH_TOKEN or the built-in development token.
    Logout,
    /// Show who the current token belongs to. Works offline.
    Whoami,
}

#[derive(Args, Debug)]
pub struct NewEntryArgs {
    /// Day the entry is about, e.g. 2024-03-01.
    #[arg(long)]
    pub date: String,
    #[arg(long)]
    pub action: String,
    #[arg(long, default_value = "")]
    pub motive: String,
    #[arg(long)]
    pub conscience_check: bool,
    #[arg(long)]
    pub hearing_his_voice: bool,
    #[arg(long)]
    pub losing_evil_desires: bool,
    #[arg(long)]
    pub serving_others: bool,
    #[arg(long)]
    pub service_blessed_others: bool,
    #[arg(long, default_value = "")]
    pub reflection: String,
}

impl From<NewEntryArgs> for NewEntry {
    fn from(args: NewEntryArgs) -> Self {
        Self {
            date: args.date,
            action: args.action,
            motive: args.motive,
            conscience_check: args.conscience_check,
            hearing_his_voice: args.hearing_his_voice,
            losing_evil_desires: args.losing_evil_desires,
            serving_others: args.serving_others,
            service_blessed_others: args.service_blessed_others,
            reflection: args.reflection,
        }
    }
}

/// Fields left out are not sent. Flags take an explicit value, e.g. `--serving-others false`.
#[derive(Args, Debug)]
pub struct PatchArgs {
    #[arg(long)]
    pub date: Option<String>,
    #[arg(long)]
    pub action: Option<String>,
    #[arg(long)]
    pub motive: Option<String>,
    #[arg(long)]
    pub conscience_check: Option<bool>,
    #[arg(long)]
    pub hearing_his_voice: Option<bool>,
    #[arg(long)]
    pub losing_evil_desires: Option<bool>,
    #[arg(long)]
    pub serving_others: Option<bool>,
    #[arg(long)]
    pub service_blessed_others: Option<bool>,
    #[arg(long)]
    pub reflection: Option<String>,
}

impl From<PatchArgs> for EntryPatch {
    fn from(args: PatchArgs) -> Self {
        Self {
            date: args.date,
            action: args.action,
            motive: args.motive,
            conscience_check: args.conscience_check,
            hearing_his_voice: args.hearing_his_voice,
            losing_evil_desires: args.losing_evil_desires,
            serving_others: args.serving_others,
            service_blessed_others: args.service_blessed_others,
            reflection: args.reflection,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_create() {
        let cli = Cli::try_parse_from([
            "becomelog",
            "create",
            "--date",
            "2024-03-01",
            "--action",
            "Visited grandma",
            "--serving-others",
        ])
        .unwrap();

        let Command::Create(args) = cli.command else {
            panic!("expected create");
        };
        let entry = NewEntry::from(args);
        assert_eq!(entry.action, "Visited grandma");
        assert!(entry.serving_others);
        assert!(!entry.conscience_check);
        assert_eq!(entry.reflection, "");
    }

    #[test]
    fn update_only_sends_given_fields() {
        let cli = Cli::try_parse_from([
            "becomelog",
            "update",
            "e-1",
            "--reflection",
            "Better now",
            "--serving-others",
            "false",
        ])
        .unwrap();

        let Command::Update { entry_id, fields } = cli.command else {
            panic!("expected update");
        };
        assert_eq!(entry_id, "e-1");
        let patch = EntryPatch::from(fields);
        assert_eq!(patch.reflection.as_deref(), Some("Better now"));
        assert_eq!(patch.serving_others, Some(false));
        assert!(patch.action.is_none());
    }

    #[test]
    fn global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "becomelog",
            "list",
            "--limit",
            "5",
            "--api-url",
            "http://localhost:3001",
        ])
        .unwrap();

        assert_eq!(cli.api_url.as_deref(), Some("http://localhost:3001"));
        assert!(matches!(cli.command, Command::List { limit: 5 }));
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
