use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Weekly meal plans with shopping reminders", long_about = None)]
pub struct Cli {
    /// Directory holding plan files, profiles and the reminder store
    #[arg(long, global = true)]
    pub storage_dir: Option<PathBuf>,

    /// Scraped recipes JSON
    #[arg(long, global = true)]
    pub recipes: Option<PathBuf>,

    /// Embedded corpus snapshot, created on first use
    #[arg(long, global = true)]
    pub corpus_snapshot: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Embed the recipe file and write a fresh corpus snapshot
    BuildCorpus,
    /// Plan a week for a user, or finish an interrupted plan with --resume
    Generate {
        #[arg(short, long)]
        user: String,
        /// Profile JSON; defaults to user_<id>.json in the storage dir
        #[arg(short, long)]
        profile: Option<PathBuf>,
        #[arg(long)]
        resume: bool,
    },
    /// Regenerate an existing plan with extra wishes
    Edit {
        #[arg(short, long)]
        user: String,
        #[arg(short, long)]
        profile: Option<PathBuf>,
        /// What to change, in free text
        #[arg(short = 'm', long)]
        prompt: String,
    },
    /// Print the stored plan
    View {
        #[arg(short, long)]
        user: String,
    },
    /// Delete the plan and its reminders
    Delete {
        #[arg(short, long)]
        user: String,
    },
    /// List scheduled reminders
    Reminders {
        #[arg(short, long)]
        user: String,
    },
    /// Deliver due reminders until interrupted
    Watch {
        /// Seconds between checks
        #[arg(long, default_value_t = 60)]
        interval: u64,
    },
}

pub fn parse_args() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_generate_with_global_flags() {
        let cli = Cli::try_parse_from(["meal_planner", "generate", "--user", "17", "--storage-dir", "/data"]).unwrap();
        assert_eq!(cli.storage_dir, Some(PathBuf::from("/data")));
        match cli.command {
            Command::Generate { user, profile, resume } => {
                assert_eq!(user, "17");
                assert_eq!(profile, None);
                assert!(!resume);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn edit_requires_prompt() {
        assert!(Cli::try_parse_from(["meal_planner", "edit", "-u", "1"]).is_err());
        let cli = Cli::try_parse_from(["meal_planner", "edit", "-u", "1", "-m", "без мяса"]).unwrap();
        assert!(matches!(cli.command, Command::Edit { ref prompt, .. } if prompt == "без мяса"));
    }

    #[test]
    fn watch_interval_defaults() {
        let cli = Cli::try_parse_from(["meal_planner", "watch"]).unwrap();
        assert!(matches!(cli.command, Command::Watch { interval: 60 }));
    }
}
