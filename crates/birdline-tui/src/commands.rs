//! Non-interactive subcommands.

use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Subcommand;

use birdline_core::auth::CredentialStore;
use birdline_core::{
    Config, RescueAlert, RescueDesk, RescueError, RescueRepository, RescueStatus, StatusFilter,
    TransitionAction, TransitionOutcome,
};

use crate::utils::or_placeholder;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List rescues, pending first
    List {
        /// Only show these statuses (repeatable)
        #[arg(long = "status", value_parser = parse_status)]
        statuses: Vec<RescueStatus>,
        /// Include delivered rescues
        #[arg(long, conflicts_with = "statuses")]
        all: bool,
    },
    /// Show one rescue and what can be done with it
    Show { id: String },
    /// Mark an in-route rescue as rescued, or a rescued one as delivered
    Advance { id: String },
    /// Accept a pending rescue as the named volunteer
    Accept {
        id: String,
        #[arg(long)]
        volunteer: String,
    },
    /// Store the Airtable access token in the OS keychain
    SetToken {
        /// Also save this base id to the config file
        #[arg(long)]
        base: Option<String>,
    },
    /// Remove the stored access token from the OS keychain
    ClearToken,
}

/// Accepts table labels ("In Route") and kebab-case ("in-route").
pub fn parse_status(value: &str) -> Result<RescueStatus, String> {
    RescueStatus::from_label(&value.replace('-', " ")).ok_or_else(|| {
        format!(
            "unknown status '{}' (expected one of: pending, in-route, rescued, delivered)",
            value
        )
    })
}

impl Commands {
    /// Run the command. `open_store` is only called by commands that need
    /// the rescue table.
    pub async fn run(
        self,
        config: &Config,
        open_store: impl FnOnce() -> Result<Arc<dyn RescueRepository>>,
    ) -> Result<()> {
        match self {
            Commands::SetToken { base } => set_token(config, base),
            Commands::ClearToken => {
                let base_id = config.require_base_id()?;
                CredentialStore::delete(base_id)?;
                println!("Token removed from the keychain for base {}", base_id);
                Ok(())
            }
            Commands::List { statuses, all } => {
                let mut desk = open_desk(config, open_store()?);
                if all {
                    desk.directory.set_filter(StatusFilter::all());
                } else if !statuses.is_empty() {
                    desk.directory.set_filter(StatusFilter::from_statuses(statuses));
                }
                desk.refresh().await.map_err(friendly)?;
                print_list(&desk);
                Ok(())
            }
            Commands::Show { id } => {
                let mut desk = open_desk(config, open_store()?);
                desk.refresh().await.map_err(friendly)?;
                let rescue = desk.select(&id).await.map_err(friendly)?;
                print_detail(&rescue);
                match TransitionAction::for_status(rescue.status) {
                    Some(action) => println!("\nNext action:  {}", action.label()),
                    None => println!("\nNo further action."),
                }
                if rescue.status == RescueStatus::Pending {
                    let eligible = desk.eligible_for_selected();
                    if eligible.is_empty() {
                        println!("Eligible:     none on the roster");
                    } else {
                        let names: Vec<&str> = eligible.iter().map(|v| v.name.as_str()).collect();
                        println!("Eligible:     {}", names.join(", "));
                    }
                }
                Ok(())
            }
            Commands::Advance { id } => {
                let mut desk = open_desk(config, open_store()?);
                desk.refresh().await.map_err(friendly)?;
                let rescue = desk.select(&id).await.map_err(friendly)?;
                match TransitionAction::for_status(rescue.status) {
                    None => bail!("{} is already delivered", rescue.species),
                    Some(action) if action.opens_form() => {
                        bail!("{} is pending; use `birdline accept {} --volunteer <name>`", rescue.species, id)
                    }
                    Some(_) => {}
                }
                let outcome = desk.advance().await.map_err(friendly)?;
                report(outcome);
                Ok(())
            }
            Commands::Accept { id, volunteer } => {
                let mut desk = open_desk(config, open_store()?);
                desk.refresh().await.map_err(friendly)?;
                desk.select(&id).await.map_err(friendly)?;
                let outcome = desk.advance().await.map_err(friendly)?;
                if outcome != TransitionOutcome::FormOpened {
                    bail!("Rescue {} is not pending", id);
                }
                let chosen = desk
                    .workflow
                    .form_mut()
                    .map(|form| form.select_by_name(&volunteer))
                    .unwrap_or(false);
                if !chosen {
                    bail!("{} is not an eligible volunteer for rescue {}", volunteer, id);
                }
                let outcome = desk.confirm_assignment().await.map_err(friendly)?;
                report(outcome);
                Ok(())
            }
        }
    }
}

fn open_desk(config: &Config, repo: Arc<dyn RescueRepository>) -> RescueDesk {
    RescueDesk::new(repo, config.status_filter(), config.transition_guard())
}

/// User-facing message, with the technical detail kept as the cause.
fn friendly(e: RescueError) -> anyhow::Error {
    let message = e.user_message();
    anyhow::Error::new(e).context(message)
}

fn set_token(config: &Config, base: Option<String>) -> Result<()> {
    let config = match base {
        Some(base_id) => {
            let mut updated = config.clone();
            updated.base_id = Some(base_id.trim().to_string());
            updated.save()?;
            println!("Base {} saved to {}", base_id.trim(), Config::config_path()?.display());
            updated
        }
        None => config.clone(),
    };
    let base_id = config.require_base_id()?;
    let token = rpassword::prompt_password("Airtable access token: ")?;
    let token = token.trim();
    if token.is_empty() {
        bail!("No token entered");
    }
    CredentialStore::store_token(base_id, token)?;
    println!("Token stored in the keychain for base {}", base_id);
    Ok(())
}

fn print_list(desk: &RescueDesk) {
    let view = desk.directory.view();
    println!("{:<18} {:<10} {:<28} {}", "ID", "STATUS", "BIRD", "VOLUNTEER");
    for rescue in &view {
        println!(
            "{:<18} {:<10} {:<28} {}",
            rescue.id,
            rescue.status.label(),
            crate::utils::truncate_string(&rescue.species, 28),
            rescue.volunteer_display()
        );
    }
    println!(
        "\n{} shown of {} ({})",
        view.len(),
        desk.directory.records().len(),
        desk.directory.filter()
    );
}

fn print_detail(rescue: &RescueAlert) {
    println!("{}", rescue.species);
    println!("Status:       {}", rescue.status);
    println!("Volunteer:    {}", rescue.volunteer_display());
    println!("Pick up:      {}", or_placeholder(&rescue.pickup));
    println!("Drop off:     {}", or_placeholder(&rescue.dropoff));
    println!(
        "R&T level:    {}",
        rescue.risk_level.map(|l| l.label()).unwrap_or("-")
    );
    if !rescue.skills.is_empty() {
        let skills: Vec<&str> = rescue.skills.iter().map(|s| s.as_str()).collect();
        println!("Skills:       {}", skills.join(", "));
    }
    if let Some(ref photo) = rescue.photo {
        println!("Photo:        {}", photo.url);
    }
}

fn report(outcome: TransitionOutcome) {
    if let TransitionOutcome::Applied { record, .. } = outcome {
        let volunteer = if record.is_assigned() {
            format!(" ({})", record.assigned_volunteer)
        } else {
            String::new()
        };
        println!("{} is now {}{}", record.species, record.status, volunteer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use birdline_core::MemoryRepository;

    fn store(repo: &Arc<MemoryRepository>) -> impl FnOnce() -> Result<Arc<dyn RescueRepository>> {
        let repo = Arc::clone(repo);
        move || Ok(repo as Arc<dyn RescueRepository>)
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("pending"), Ok(RescueStatus::Pending));
        assert_eq!(parse_status("in-route"), Ok(RescueStatus::InRoute));
        assert_eq!(parse_status("In Route"), Ok(RescueStatus::InRoute));
        assert_eq!(parse_status("DELIVERED"), Ok(RescueStatus::Delivered));
        assert!(parse_status("lost").is_err());
    }

    #[tokio::test]
    async fn test_accept_command_writes_assignment() {
        let repo = Arc::new(MemoryRepository::demo());
        let command = Commands::Accept {
            id: "recDemoRobin".to_string(),
            volunteer: "lee nguyen".to_string(),
        };
        command.run(&Config::default(), store(&repo)).await.unwrap();

        let robin = repo
            .snapshot()
            .into_iter()
            .find(|r| r.id == "recDemoRobin")
            .unwrap();
        assert_eq!(robin.status, RescueStatus::InRoute);
        assert_eq!(robin.assigned_volunteer, "Lee Nguyen");
    }

    #[tokio::test]
    async fn test_accept_rejects_ineligible_volunteer() {
        let repo = Arc::new(MemoryRepository::demo());
        let command = Commands::Accept {
            id: "recDemoHawk".to_string(),
            volunteer: "Lee Nguyen".to_string(),
        };
        assert!(command.run(&Config::default(), store(&repo)).await.is_err());
        assert!(repo.updates().is_empty());
    }

    #[tokio::test]
    async fn test_advance_refuses_pending() {
        let repo = Arc::new(MemoryRepository::demo());
        let command = Commands::Advance {
            id: "recDemoHawk".to_string(),
        };
        assert!(command.run(&Config::default(), store(&repo)).await.is_err());

        let command = Commands::Advance {
            id: "recDemoHeron".to_string(),
        };
        command.run(&Config::default(), store(&repo)).await.unwrap();
        assert_eq!(
            repo.updates(),
            vec![(
                "recDemoHeron".to_string(),
                birdline_core::RescuePatch::status(RescueStatus::Delivered)
            )]
        );
    }
}
