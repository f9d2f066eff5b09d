//! Terminal front end for a FlowBoard backend.
//!
//! ```bash
//! flowboard-kanban projects
//! flowboard-kanban board <project-id>
//! flowboard-kanban move <project-id> "To Do" 0 "In Progress" 0
//! flowboard-kanban summarize <project-id> --column "In Progress"
//! ```

use clap::{Parser, Subcommand};
use flowboard_core::drag::DropOutcome;
use flowboard_kanban::api::ApiClient;
use flowboard_kanban::render::TerminalObserver;
use flowboard_kanban::session::{KanbanSession, TaskDraft};

#[derive(Parser, Debug)]
#[command(version, about = "FlowBoard terminal client")]
struct Cli {
    /// Backend root URL.
    #[arg(long, env = "FLOWBOARD_URL", default_value = "http://127.0.0.1:5000")]
    server: String,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, env = "FLOWBOARD_LOG", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List projects with task counts.
    Projects,
    /// Create a project.
    NewProject {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Change a project's name or description.
    EditProject {
        project_id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a project and all of its tasks.
    DeleteProject { project_id: String },
    /// Show a project's board.
    Board { project_id: String },
    /// Add a task.
    Add {
        project_id: String,
        title: String,
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Drag the task at `from_index` of `from_column` to `to_index` of `to_column`.
    Move {
        project_id: String,
        from_column: String,
        from_index: usize,
        to_column: String,
        to_index: usize,
    },
    /// Add a column.
    AddColumn { project_id: String, name: String },
    /// Rename a column.
    RenameColumn {
        project_id: String,
        old_name: String,
        new_name: String,
    },
    /// Delete a custom column and its tasks.
    DeleteColumn { project_id: String, name: String },
    /// AI summary of the project or one column.
    Summarize {
        project_id: String,
        #[arg(long)]
        column: Option<String>,
    },
    /// Ask the AI assistant about a project.
    Ask { project_id: String, question: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level))
        .format_timestamp_millis()
        .init();

    let api = ApiClient::new(&cli.server);
    if !run(api, cli.command).await {
        std::process::exit(1);
    }
}

/// Returns false when the command did not go through.
async fn run(api: ApiClient, command: Command) -> bool {
    match command {
        Command::Projects => match api.list_projects(true).await {
            Ok(projects) => {
                for summary in projects {
                    println!(
                        "{}  {}  ({} tasks)",
                        summary.project.id,
                        summary.project.name,
                        summary.task_count.unwrap_or(0)
                    );
                }
                true
            }
            Err(e) => {
                eprintln!("error: {}", e);
                false
            }
        },
        Command::NewProject { name, description } => {
            match api.create_project(&name, &description).await {
                Ok(project) => {
                    println!("{}", project.id);
                    true
                }
                Err(e) => {
                    eprintln!("error: {}", e);
                    false
                }
            }
        }
        Command::EditProject {
            project_id,
            name,
            description,
        } => match open(api, &project_id, true).await {
            Some(mut session) => {
                session
                    .update_details(name.as_deref(), description.as_deref())
                    .await
            }
            None => false,
        },
        Command::DeleteProject { project_id } => match open(api, &project_id, true).await {
            Some(mut session) => session.delete_project().await,
            None => false,
        },
        Command::Board { project_id } => open(api, &project_id, false).await.is_some(),
        Command::Add {
            project_id,
            title,
            status,
            description,
        } => match open(api, &project_id, true).await {
            Some(mut session) => {
                let draft = TaskDraft {
                    title,
                    description,
                    status,
                };
                session.save_task(None, &draft).await
            }
            None => false,
        },
        Command::Move {
            project_id,
            from_column,
            from_index,
            to_column,
            to_index,
        } => {
            let Some(mut session) = open(api, &project_id, true).await else {
                return false;
            };
            if !session.begin_drag(&from_column, from_index) {
                eprintln!("error: no task at {}[{}]", from_column, from_index);
                return false;
            }
            match session.drop_on(Some((&to_column, to_index))).await {
                DropOutcome::Committed { patches } => {
                    println!("moved ({} task(s) re-ranked)", patches);
                    true
                }
                DropOutcome::Unchanged => {
                    println!("nothing to move");
                    true
                }
                _ => false,
            }
        }
        Command::AddColumn { project_id, name } => match open(api, &project_id, true).await {
            Some(mut session) => session.add_column(&name).await,
            None => false,
        },
        Command::RenameColumn {
            project_id,
            old_name,
            new_name,
        } => match open(api, &project_id, true).await {
            Some(mut session) => session.rename_column(&old_name, &new_name).await,
            None => false,
        },
        Command::DeleteColumn { project_id, name } => match open(api, &project_id, true).await {
            Some(mut session) => session.delete_column(&name).await,
            None => false,
        },
        Command::Summarize { project_id, column } => match open(api, &project_id, true).await {
            Some(session) => print_reply(session.summarize(column.as_deref()).await),
            None => false,
        },
        Command::Ask {
            project_id,
            question,
        } => match open(api, &project_id, true).await {
            Some(session) => print_reply(session.ask(&question).await),
            None => false,
        },
    }
}

async fn open(
    api: ApiClient,
    project_id: &str,
    quiet: bool,
) -> Option<KanbanSession<TerminalObserver>> {
    let mut session = KanbanSession::new(api, TerminalObserver { quiet });
    session.load(project_id).await.ok()?;
    Some(session)
}

fn print_reply(reply: Option<String>) -> bool {
    match reply {
        Some(text) => {
            println!("{}", text);
            true
        }
        None => false,
    }
}
