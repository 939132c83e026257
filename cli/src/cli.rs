use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use coverage_service::models::{Entity, NewProject, User};
use coverage_service::validation::{EntityId, ValidationError};
use coverage_service::{Config, CoverageError, DocumentStore, Repositories, SqliteStore};
use tracing::{debug, warn};

#[derive(Debug)]
pub enum Error {
    FileMissing(PathBuf),
    InvalidInput(String),
    Aborted,
    Io(io::Error),
    Coverage(CoverageError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::FileMissing(path) => {
                write!(f, "File doesn't exist or is a directory: {}", path.display())
            }
            Error::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            Error::Aborted => write!(f, "Aborted"),
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Coverage(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Coverage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<CoverageError> for Error {
    fn from(err: CoverageError) -> Self {
        Error::Coverage(err)
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::Coverage(err.into())
    }
}

/// Coverage service management
///
/// Works directly against the service database, configured through the same
/// environment variables as the service (`DATABASE_URL`, `LIST_LIMIT`).
#[derive(Debug, Parser)]
#[command(name = "coverage-manager", version)]
#[command(about = "Manage projects and users of the coverage service")]
pub struct Cli {
    /// Overrides DATABASE_URL
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    pub async fn handle() -> Result<(), Error> {
        let cli = Self::parse();

        let mut config = Config::from_env();
        if let Some(url) = cli.database_url {
            config.database_url = url;
        }

        debug!(database = config.database_url.as_str(), "Opening coverage database");
        let store = SqliteStore::connect(&config.database_url)
            .await
            .map_err(CoverageError::from)?;
        let repositories = Repositories::new(store);

        cli.command
            .run(&repositories, &config, &mut io::stdout(), confirm)
            .await
    }
}

fn confirm(question: &str) -> io::Result<bool> {
    print!("{} [y/N]: ", question);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Manage projects
    Project(ProjectArgs),

    /// Manage users and their project access
    User(UserArgs),
}

#[derive(Debug, Args)]
struct ProjectArgs {
    #[command(subcommand)]
    command: ProjectCommands,
}

#[derive(Debug, Subcommand)]
enum ProjectCommands {
    /// List projects
    Ls {
        /// Max number of projects to list (defaults to LIST_LIMIT)
        limit: Option<usize>,
    },

    /// Create a project from a JSON definition (`{"name": .., "url": ..}`)
    Create { path: PathBuf },

    /// Delete a project and all its commits and reports
    Delete {
        project_id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Debug, Args)]
struct UserArgs {
    #[command(subcommand)]
    command: UserCommands,
}

#[derive(Debug, Subcommand)]
enum UserCommands {
    /// Create a user
    Create {
        name: String,
        password: String,
        #[arg(long)]
        email: Option<String>,
    },

    /// Delete a user and the user's memberships
    Delete { user_id: String },

    /// Give a user access to a project
    Grant { user_id: String, project_id: String },

    /// Remove a user's access to a project
    Revoke { user_id: String, project_id: String },

    /// List the projects a user belongs to
    Projects { user_id: String },
}

impl Commands {
    async fn run<S, W, C>(
        self,
        repositories: &Repositories<S>,
        config: &Config,
        out: &mut W,
        confirm: C,
    ) -> Result<(), Error>
    where
        S: DocumentStore,
        W: Write,
        C: FnOnce(&str) -> io::Result<bool>,
    {
        match self {
            Commands::Project(args) => match args.command {
                ProjectCommands::Ls { limit } => {
                    let limit = limit.unwrap_or(config.list_limit);
                    writeln!(out, "{:<32}  {:<24}  {}", "id", "name", "url")?;
                    for project in repositories.projects.list(limit).await? {
                        let project = project?;
                        writeln!(out, "{:<32}  {:<24}  {}", project.id().as_str(), project.name(), project.url())?;
                    }
                }

                ProjectCommands::Create { path } => {
                    if !path.is_file() {
                        return Err(Error::FileMissing(path));
                    }
                    let raw = std::fs::read_to_string(&path)?;
                    let definition: NewProject = serde_json::from_str(&raw)
                        .map_err(|e| Error::InvalidInput(format!("{}: {}", path.display(), e)))?;

                    let project = repositories.projects.save(definition.into_project()).await?;
                    writeln!(out, "Created project {}", project.id())?;
                }

                ProjectCommands::Delete { project_id, yes } => {
                    if !yes && !confirm("Sure you want to delete this project with all its data?")? {
                        return Err(Error::Aborted);
                    }
                    if repositories.projects.delete(&project_id).await? {
                        writeln!(out, "Deleted project {}", project_id)?;
                    } else {
                        warn!(project_id = project_id.as_str(), "Project not found, only leftovers were swept");
                        writeln!(out, "Project {} didn't exist, leftovers cleaned up", project_id)?;
                    }
                }
            },

            Commands::User(args) => match args.command {
                UserCommands::Create {
                    name,
                    password,
                    email,
                } => {
                    let user = repositories.users.save(User::new(name, password, email)).await?;
                    writeln!(out, "Created user {}", user.id())?;
                }

                UserCommands::Delete { user_id } => {
                    if repositories.users.delete(&user_id).await? {
                        writeln!(out, "Deleted user {}", user_id)?;
                    } else {
                        writeln!(out, "User {} doesn't exist", user_id)?;
                    }
                }

                UserCommands::Grant {
                    user_id,
                    project_id,
                } => {
                    let (user_id, project_id) = (EntityId::parse(user_id)?, EntityId::parse(project_id)?);
                    repositories.memberships.add(&user_id, &project_id).await?;
                    writeln!(out, "User {} now belongs to project {}", user_id, project_id)?;
                }

                UserCommands::Revoke {
                    user_id,
                    project_id,
                } => {
                    let (user_id, project_id) = (EntityId::parse(user_id)?, EntityId::parse(project_id)?);
                    if repositories.memberships.remove(&user_id, &project_id).await? {
                        writeln!(out, "User {} removed from project {}", user_id, project_id)?;
                    } else {
                        writeln!(out, "User {} was not a member of project {}", user_id, project_id)?;
                    }
                }

                UserCommands::Projects { user_id } => {
                    for project_id in repositories.memberships.project_ids_for_user(&user_id).await? {
                        writeln!(out, "{}", project_id)?;
                    }
                }
            },
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coverage_service::MemoryStore;

    const PROJECT_ID: &str = "13607e0f7a0bb3f26b2bc06cc9ebc853";
    const ALICE_ID: &str = "6384e2b2184bcbf58eccf10ca7a6563c";

    async fn run(
        repositories: &Repositories<MemoryStore>,
        args: &[&str],
        answer: bool,
    ) -> Result<String, Error> {
        let cli = Cli::try_parse_from(std::iter::once("coverage-manager").chain(args.iter().copied()))
            .map_err(|e| Error::InvalidInput(e.to_string()))?;
        let mut out = Vec::new();
        cli.command
            .run(repositories, &Config::default(), &mut out, |_| Ok(answer))
            .await?;
        Ok(String::from_utf8(out).unwrap())
    }

    async fn create_project(repositories: &Repositories<MemoryStore>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.json");
        std::fs::write(&path, r#"{"name": "take-over", "url": "https://github.com/acme/take-over"}"#)
            .unwrap();

        let output = run(repositories, &["project", "create", path.to_str().unwrap()], true)
            .await
            .unwrap();
        assert_eq!(output.trim(), format!("Created project {}", PROJECT_ID));
    }

    #[tokio::test]
    async fn test_project_create_ls_delete() {
        let repositories = Repositories::new(MemoryStore::new());
        create_project(&repositories).await;

        let listing = run(&repositories, &["project", "ls"], true).await.unwrap();
        assert!(listing.contains(PROJECT_ID));
        assert!(listing.contains("https://github.com/acme/take-over"));

        let err = run(&repositories, &["project", "delete", PROJECT_ID], false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Aborted));
        assert!(repositories.projects.get(PROJECT_ID).await.is_ok());

        let output = run(&repositories, &["project", "delete", PROJECT_ID, "--yes"], false)
            .await
            .unwrap();
        assert!(output.starts_with("Deleted project"));
        assert!(repositories.projects.get(PROJECT_ID).await.is_err());
    }

    #[tokio::test]
    async fn test_project_delete_of_unknown_project() {
        let repositories = Repositories::new(MemoryStore::new());
        let output = run(&repositories, &["project", "delete", PROJECT_ID, "-y"], false)
            .await
            .unwrap();
        assert!(output.contains("didn't exist"));
    }

    #[tokio::test]
    async fn test_project_create_missing_file() {
        let repositories = Repositories::new(MemoryStore::new());
        let err = run(&repositories, &["project", "create", "/nonexistent/project.json"], true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::FileMissing(_)));
    }

    #[tokio::test]
    async fn test_user_membership_commands() {
        let repositories = Repositories::new(MemoryStore::new());
        create_project(&repositories).await;

        let output = run(&repositories, &["user", "create", "alice", "secret", "--email", "a@x.io"], true)
            .await
            .unwrap();
        assert_eq!(output.trim(), format!("Created user {}", ALICE_ID));

        run(&repositories, &["user", "grant", ALICE_ID, PROJECT_ID], true)
            .await
            .unwrap();
        let projects = run(&repositories, &["user", "projects", ALICE_ID], true)
            .await
            .unwrap();
        assert_eq!(projects.trim(), PROJECT_ID);

        let output = run(&repositories, &["user", "revoke", ALICE_ID, PROJECT_ID], true)
            .await
            .unwrap();
        assert!(output.contains("removed"));
        let projects = run(&repositories, &["user", "projects", ALICE_ID], true)
            .await
            .unwrap();
        assert!(projects.is_empty());

        let err = run(&repositories, &["user", "grant", "short", PROJECT_ID], true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Coverage(CoverageError::Validation(_))));
    }
}
