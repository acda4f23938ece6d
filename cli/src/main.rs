use std::path::PathBuf;

use clap::{Parser, Subcommand};
use forma::Config;
use forma::error::AppResult;
use forma::model::entity::{Domain, Formation, FormationWrite, Personne, PersonneCreate, Team, UserFormation};
use forma::model::{CrudRepository, DatabaseError, DbConnection, ModelManager};
use forma::web::{AuthenticatedUser, UserRole};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(about = "CLI tool for filling and maintaining the formation DB", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply pending migrations
    Migrate {
        #[arg(long, default_value = "./migrations")]
        dir: PathBuf,
    },

    /// Manage personnel
    Personne {
        #[command(subcommand)]
        action: PersonneCommands,
    },

    /// Manage teams
    Team {
        #[command(subcommand)]
        action: TeamCommands,
    },

    /// Manage domains
    Domain {
        #[command(subcommand)]
        action: DomainCommands,
    },

    /// Manage formations
    Formation {
        #[command(subcommand)]
        action: FormationCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum PersonneCommands {
    Add {
        #[arg(long)]
        matricule: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        /// admin, TL1, TL2, CL, UDL or COLLABORATEUR
        #[arg(long, default_value = "COLLABORATEUR")]
        role: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum TeamCommands {
    Add {
        #[arg(long)]
        name: String,
    },
    AddMember {
        #[arg(long)]
        team: String,
        #[arg(long)]
        matricule: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum DomainCommands {
    Add {
        #[arg(long)]
        name: String,
    },
    AttachTeam {
        #[arg(long)]
        domain: String,
        #[arg(long)]
        team: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum FormationCommands {
    /// Create a formation from a JSON file with modules, resources and quiz
    Import {
        #[arg(long)]
        file: PathBuf,
    },
    /// Reset the formation for every user of its domain's teams
    ResetAll {
        #[arg(long)]
        id: Uuid,
    },
}

async fn find_team(mm: &ModelManager, name: &str) -> AppResult<Team> {
    let team = Team::find_by_name(mm.executor(), name)
        .await?
        .ok_or_else(|| DatabaseError::validation(format!("unknown team `{name}`")))?;
    Ok(team)
}

#[tokio::main]
async fn main() -> AppResult<()> {
    forma::setup_trace();
    let args = Cli::parse();

    let database_uri = match std::env::var("DATABASE_URL") {
        Ok(uri) => uri,
        Err(_) => Config::get_or_init(true).await.app().database_uri().to_string(),
    };
    let db_con = DbConnection::connect(&database_uri)?;
    let mm = ModelManager::new(db_con.clone());
    let actor = AuthenticatedUser::admin();

    match args.command {
        Commands::Migrate { dir } => {
            db_con.migrate(&dir).await?;
            println!("Migrations applied from {}", dir.display());
        }

        Commands::Personne { action } => match action {
            PersonneCommands::Add { matricule, first_name, last_name, role } => {
                let personne = Personne::create(
                    mm.executor(),
                    PersonneCreate {
                        matricule,
                        first_name,
                        last_name,
                        role: UserRole::from(role.as_str()),
                    },
                )
                .await?;
                println!("Personne created: {:?}", personne);
            }
        },

        Commands::Team { action } => match action {
            TeamCommands::Add { name } => {
                let team = Team::create(mm.executor(), &name).await?;
                println!("Team created: {:?}", team);
            }
            TeamCommands::AddMember { team, matricule } => {
                let team = find_team(&mm, &team).await?;
                Team::add_member(mm.executor(), team.id(), &matricule).await?;
                println!("{matricule} added to {}", team.name());
            }
        },

        Commands::Domain { action } => match action {
            DomainCommands::Add { name } => {
                let domain = Domain::create(mm.executor(), &name).await?;
                println!("Domain created: {:?}", domain);
            }
            DomainCommands::AttachTeam { domain, team } => {
                let domain = Domain::find_by_name(mm.executor(), &domain)
                    .await?
                    .ok_or_else(|| DatabaseError::validation(format!("unknown domain `{domain}`")))?;
                let team = find_team(&mm, &team).await?;
                Domain::attach_team(mm.executor(), domain.id(), team.id()).await?;
                println!("{} attached to {}", team.name(), domain.name());
            }
        },

        Commands::Formation { action } => match action {
            FormationCommands::Import { file } => {
                let content = std::fs::read_to_string(&file)?;
                let data: FormationWrite =
                    serde_json::from_str(&content).map_err(DatabaseError::from)?;
                let formation = Formation::create(&mm, &actor, data).await?;
                println!("Formation created: {} ({})", formation.title(), formation.id());
            }
            FormationCommands::ResetAll { id } => {
                let formation = Formation::find(mm.executor(), id)
                    .await?
                    .ok_or_else(|| DatabaseError::validation(format!("unknown formation {id}")))?;

                let mut tx = mm.begin().await?;
                let summary = UserFormation::reset_all(&mut tx, &formation).await?;
                tx.commit(&mm).await?;
                println!(
                    "{}: {} reset, {} skipped, {} failed",
                    formation.title(),
                    summary.reset,
                    summary.skipped,
                    summary.failed
                );
            }
        },
    }

    Ok(())
}
