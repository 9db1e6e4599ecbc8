// notify.rs - Notify subcommands: add, remove, list.

use clap::Subcommand;
use mxx_completion::NotifyList;
use mxx_runner::MxxPaths;

#[derive(Subcommand)]
pub enum NotifyCommands {
    /// Count an early exit of this profile as a successful run.
    Add {
        /// Profile name.
        profile: String,
    },
    /// Stop counting early exits of this profile as success.
    Remove {
        /// Profile name.
        profile: String,
    },
    /// Show the profiles on the notify list.
    List,
}

pub fn execute(cmd: &NotifyCommands, paths: &MxxPaths) -> anyhow::Result<()> {
    let list = NotifyList::in_dir(&paths.completion_dir);

    match cmd {
        NotifyCommands::Add { profile } => {
            if list.add(profile)? {
                println!("Added {} to the notify list.", profile);
            } else {
                println!("{} is already on the notify list.", profile);
            }
        }
        NotifyCommands::Remove { profile } => {
            if list.remove(profile)? {
                println!("Removed {} from the notify list.", profile);
            } else {
                println!("{} is not on the notify list.", profile);
            }
        }
        NotifyCommands::List => {
            let names = list.list();
            if names.is_empty() {
                println!("Notify list is empty.");
            }
            for name in names {
                println!("{}", name);
            }
        }
    }
    Ok(())
}
