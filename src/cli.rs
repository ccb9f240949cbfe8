//! CLI struct definitions and dispatch for the fabqc command-line interface.
//!
//! Every mutating command carries explicit actor flags; the engine never
//! infers an acting identity. Output is either human text or a JSON envelope
//! (`--format json`).

use crate::core::catalog::TemplateCatalog;
use crate::core::error::QcError;
use crate::core::external::{
    DirAttachmentStore, InsightProvider, NullInsightProvider, StaticInsightProvider,
};
use crate::core::instance::InstanceManager;
use crate::core::layout::LayoutConfig;
use crate::core::model::{
    ChecklistTemplate, InspectionInstance, ItemStatus, MediaKind, Phase, Principal,
};
use crate::core::output;
use crate::core::repo::{InstanceRepository, PhaseRepository};
use crate::core::report::ReportCompiler;
use crate::core::sqlite_repo::SqliteStore;
use crate::core::time;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde_json::Value as JsonValue;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[clap(
    name = "fabqc",
    version = env!("CARGO_PKG_VERSION"),
    about = "fabqc tracks quality-control inspections: weighted checklist scoring, review lifecycle, and deterministic report layout plans."
)]
pub struct Cli {
    /// Workspace directory holding the inspection store (defaults to cwd).
    #[clap(long, global = true)]
    pub dir: Option<PathBuf>,
    /// Output format for command results.
    #[clap(long, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(clap::Args, Debug)]
pub struct ActorArgs {
    /// Acting identity for this mutation (inspector or reviewer id).
    #[clap(long)]
    pub actor: String,
    /// Display name of the actor.
    #[clap(long, default_value = "")]
    pub actor_name: String,
    /// Role of the actor (inspector, qa_lead, ...).
    #[clap(long, default_value = "inspector")]
    pub role: String,
}

impl ActorArgs {
    fn principal(&self) -> Principal {
        let name = if self.actor_name.is_empty() {
            &self.actor
        } else {
            &self.actor_name
        };
        Principal::new(&self.actor, name, &self.role)
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize the inspection store in the workspace directory.
    Init,
    /// Manage project phases (shared master data).
    Phase {
        #[clap(subcommand)]
        command: PhaseCommand,
    },
    /// Manage checklist templates.
    Template {
        #[clap(subcommand)]
        command: TemplateCommand,
    },
    /// Manage inspection runs.
    Instance {
        #[clap(subcommand)]
        command: InstanceCommand,
    },
    /// Compile reports.
    Report {
        #[clap(subcommand)]
        command: ReportCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum PhaseCommand {
    /// Add or update a phase.
    Add {
        #[clap(long)]
        id: String,
        #[clap(long)]
        name: String,
        /// Report sequencing order.
        #[clap(long)]
        order: i64,
    },
    /// List phases in report order.
    List,
}

#[derive(Subcommand, Debug)]
pub enum TemplateCommand {
    /// Publish a template from a JSON file. Published templates are immutable.
    Publish {
        #[clap(long)]
        file: PathBuf,
    },
    /// Show a published template.
    Show {
        #[clap(long)]
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum InstanceCommand {
    /// Instantiate a template against a project phase.
    Create {
        #[clap(long)]
        project: String,
        #[clap(long)]
        phase: String,
        #[clap(long)]
        template: String,
        #[clap(flatten)]
        actor: ActorArgs,
    },
    /// Get an inspection run by id.
    Get {
        #[clap(long)]
        id: String,
    },
    /// List runs of a project (optionally one phase).
    List {
        #[clap(long)]
        project: String,
        #[clap(long)]
        phase: Option<String>,
    },
    /// Record an item result (overwrites in place, recomputes the score).
    SetItem {
        #[clap(long)]
        id: String,
        #[clap(long)]
        item: String,
        /// One of: pending, ok, not_ok, na.
        #[clap(long)]
        status: String,
        #[clap(long)]
        value: Option<String>,
        #[clap(long)]
        notes: Option<String>,
        #[clap(flatten)]
        actor: ActorArgs,
    },
    /// Set inspector comments.
    Comment {
        #[clap(long)]
        id: String,
        #[clap(long)]
        comments: String,
        #[clap(flatten)]
        actor: ActorArgs,
    },
    /// Attach a file to the run or to one of its items.
    Attach {
        #[clap(long)]
        id: String,
        #[clap(long)]
        item: Option<String>,
        #[clap(long)]
        file: PathBuf,
        /// One of: photo, video, document.
        #[clap(long, default_value = "photo")]
        kind: String,
        #[clap(flatten)]
        actor: ActorArgs,
    },
    /// Remove an attachment reference (and its stored bytes).
    Detach {
        #[clap(long)]
        id: String,
        #[clap(long)]
        attachment: String,
        #[clap(flatten)]
        actor: ActorArgs,
    },
    /// Submit the run (all mandatory items must be resolved).
    Submit {
        #[clap(long)]
        id: String,
        #[clap(flatten)]
        actor: ActorArgs,
    },
    /// Sign and submit the run with a signature image.
    Sign {
        #[clap(long)]
        id: String,
        /// Path to the signature image file.
        #[clap(long)]
        image: PathBuf,
        #[clap(flatten)]
        actor: ActorArgs,
    },
    /// Approve a submitted run (terminal).
    Approve {
        #[clap(long)]
        id: String,
        #[clap(long)]
        comments: Option<String>,
        #[clap(flatten)]
        actor: ActorArgs,
    },
    /// Reject a submitted run: terminal, or back to rework with --reopen.
    Reject {
        #[clap(long)]
        id: String,
        #[clap(long)]
        comments: String,
        #[clap(long)]
        reopen: bool,
        #[clap(flatten)]
        actor: ActorArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum ReportCommand {
    /// Compile the layout plan for a project.
    Compile {
        #[clap(long)]
        project: String,
        /// TOML file overriding layout geometry.
        #[clap(long)]
        layout: Option<PathBuf>,
        /// Analysis text to include (stands in for a configured AI provider).
        #[clap(long)]
        analysis: Option<String>,
        /// Insight call timeout in seconds.
        #[clap(long, default_value = "10")]
        timeout_secs: u64,
        /// Write the plan JSON here instead of stdout.
        #[clap(long)]
        out: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> Result<(), QcError> {
    let root = cli
        .dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    let store = SqliteStore::open(&root)?;
    let attachments = DirAttachmentStore::new(root.join("attachments"))?;

    match cli.command {
        Command::Init => {
            emit(
                cli.format,
                time::command_envelope("init", "ok", serde_json::json!({})),
                || println!("{} inspection store ready at {}", "ok".green(), root.display()),
            );
            Ok(())
        }
        Command::Phase { command } => run_phase(cli.format, &store, command),
        Command::Template { command } => run_template(cli.format, &store, command),
        Command::Instance { command } => run_instance(cli.format, &store, &attachments, command),
        Command::Report { command } => run_report(cli.format, &store, command),
    }
}

fn run_phase(format: OutputFormat, store: &SqliteStore, command: PhaseCommand) -> Result<(), QcError> {
    match command {
        PhaseCommand::Add { id, name, order } => {
            let phase = Phase {
                id: id.clone(),
                name,
                order,
            };
            store.upsert_phase(&phase, "fabqc")?;
            emit(
                format,
                time::command_envelope("phase.add", "ok", serde_json::json!({"id": id})),
                || println!("{} phase {}", "ok".green(), id),
            );
        }
        PhaseCommand::List => {
            let phases = store.list_phases()?;
            emit(
                format,
                time::command_envelope(
                    "phase.list",
                    "ok",
                    serde_json::json!({"phases": phases}),
                ),
                || {
                    for phase in &phases {
                        println!("{:>4}  {}  {}", phase.order, phase.id, phase.name);
                    }
                },
            );
        }
    }
    Ok(())
}

fn run_template(
    format: OutputFormat,
    store: &SqliteStore,
    command: TemplateCommand,
) -> Result<(), QcError> {
    match command {
        TemplateCommand::Publish { file } => {
            let raw = fs::read_to_string(&file)?;
            let template: ChecklistTemplate = serde_json::from_str(&raw)?;
            store.publish_template(&template, "fabqc")?;
            emit(
                format,
                time::command_envelope(
                    "template.publish",
                    "ok",
                    serde_json::json!({"id": template.id, "items": template.items.len()}),
                ),
                || {
                    println!(
                        "{} template {} ({} items)",
                        "ok".green(),
                        template.id,
                        template.items.len()
                    )
                },
            );
        }
        TemplateCommand::Show { id } => {
            let template = store.get_template(&id)?;
            emit(
                format,
                time::command_envelope(
                    "template.show",
                    "ok",
                    serde_json::json!({"template": template}),
                ),
                || {
                    println!("{}  {}", template.id, template.name);
                    for item in &template.items {
                        let flag = if item.mandatory { "*" } else { " " };
                        println!(
                            "  {}{:<8} w{:<3} {}",
                            flag, item.code, item.weight, item.title
                        );
                    }
                },
            );
        }
    }
    Ok(())
}

fn run_instance(
    format: OutputFormat,
    store: &SqliteStore,
    attachments: &DirAttachmentStore,
    command: InstanceCommand,
) -> Result<(), QcError> {
    let manager = InstanceManager::new(store, store, store, attachments);
    match command {
        InstanceCommand::Create {
            project,
            phase,
            template,
            actor,
        } => {
            let run = manager.instantiate(&actor.principal(), &project, &phase, &template)?;
            emit(
                format,
                time::command_envelope(
                    "instance.create",
                    "ok",
                    serde_json::json!({"id": run.id, "items": run.items.len()}),
                ),
                || println!("{} instance {} ({} items)", "ok".green(), run.id, run.items.len()),
            );
        }
        InstanceCommand::Get { id } => {
            let run = store.get(&id)?;
            emit(
                format,
                time::command_envelope("instance.get", "ok", serde_json::json!({"instance": run})),
                || print_instance(&run),
            );
        }
        InstanceCommand::List { project, phase } => {
            let runs = match phase {
                Some(phase) => store.list_for_phase(&project, &phase)?,
                None => store.list_for_project(&project)?,
            };
            emit(
                format,
                time::command_envelope(
                    "instance.list",
                    "ok",
                    serde_json::json!({"count": runs.len(), "instances": runs}),
                ),
                || {
                    for run in &runs {
                        println!(
                            "{}  {:<12} {:>6}  {}",
                            run.id,
                            output::status_label(run.status.as_str()),
                            output::format_score(run.score),
                            run.phase_id
                        );
                    }
                },
            );
        }
        InstanceCommand::SetItem {
            id,
            item,
            status,
            value,
            notes,
            actor,
        } => {
            let status = ItemStatus::parse(&status)?;
            let run = manager.set_item_result(
                &actor.principal(),
                &id,
                &item,
                status,
                value.as_deref(),
                notes.as_deref(),
            )?;
            emit(
                format,
                time::command_envelope(
                    "instance.set_item",
                    "ok",
                    serde_json::json!({"id": run.id, "score": run.score}),
                ),
                || {
                    println!(
                        "{} item {} -> {} (score {})",
                        "ok".green(),
                        item,
                        status.as_str(),
                        output::format_score(run.score)
                    )
                },
            );
        }
        InstanceCommand::Comment { id, comments, actor } => {
            let run = manager.set_comments(&actor.principal(), &id, &comments)?;
            emit(
                format,
                time::command_envelope("instance.comment", "ok", serde_json::json!({"id": run.id})),
                || println!("{} comments updated", "ok".green()),
            );
        }
        InstanceCommand::Attach {
            id,
            item,
            file,
            kind,
            actor,
        } => {
            let kind = MediaKind::parse(&kind)?;
            let bytes = fs::read(&file)?;
            let file_name = file
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "attachment".to_string());
            let attachment = manager.attach_file(
                &actor.principal(),
                &id,
                item.as_deref(),
                &bytes,
                &file_name,
                kind,
            )?;
            emit(
                format,
                time::command_envelope(
                    "instance.attach",
                    "ok",
                    serde_json::json!({"attachment": attachment.id}),
                ),
                || println!("{} attachment {}", "ok".green(), attachment.id),
            );
        }
        InstanceCommand::Detach { id, attachment, actor } => {
            manager.detach_file(&actor.principal(), &id, &attachment)?;
            emit(
                format,
                time::command_envelope(
                    "instance.detach",
                    "ok",
                    serde_json::json!({"attachment": attachment}),
                ),
                || println!("{} attachment removed", "ok".green()),
            );
        }
        InstanceCommand::Submit { id, actor } => {
            let run = manager.submit(&actor.principal(), &id)?;
            emit(
                format,
                time::command_envelope(
                    "instance.submit",
                    "ok",
                    serde_json::json!({"id": run.id, "score": run.score}),
                ),
                || {
                    println!(
                        "{} submitted with score {}",
                        "ok".green(),
                        output::format_score(run.score)
                    )
                },
            );
        }
        InstanceCommand::Sign { id, image, actor } => {
            let bytes = fs::read(&image)?;
            let principal = actor.principal();
            let run = manager.sign(&principal, &id, &principal.role, &bytes)?;
            emit(
                format,
                time::command_envelope(
                    "instance.sign",
                    "ok",
                    serde_json::json!({"id": run.id, "score": run.score}),
                ),
                || {
                    println!(
                        "{} signed and submitted with score {}",
                        "ok".green(),
                        output::format_score(run.score)
                    )
                },
            );
        }
        InstanceCommand::Approve { id, comments, actor } => {
            let run = manager.approve(&actor.principal(), &id, comments.as_deref())?;
            emit(
                format,
                time::command_envelope("instance.approve", "ok", serde_json::json!({"id": run.id})),
                || println!("{} approved", "ok".green()),
            );
        }
        InstanceCommand::Reject {
            id,
            comments,
            reopen,
            actor,
        } => {
            let run = manager.reject(&actor.principal(), &id, &comments, reopen)?;
            emit(
                format,
                time::command_envelope(
                    "instance.reject",
                    "ok",
                    serde_json::json!({"id": run.id, "status": run.status.as_str()}),
                ),
                || {
                    println!(
                        "{} {}",
                        "ok".green(),
                        output::status_label(run.status.as_str())
                    )
                },
            );
        }
    }
    Ok(())
}

fn run_report(
    format: OutputFormat,
    store: &SqliteStore,
    command: ReportCommand,
) -> Result<(), QcError> {
    match command {
        ReportCommand::Compile {
            project,
            layout,
            analysis,
            timeout_secs,
            out,
        } => {
            let layout = match layout {
                Some(path) => LayoutConfig::from_toml_str(&fs::read_to_string(&path)?)?,
                None => LayoutConfig::default(),
            };
            let insight: Arc<dyn InsightProvider> = match analysis {
                Some(text) => Arc::new(StaticInsightProvider::new(&text)),
                None => Arc::new(NullInsightProvider),
            };
            let compiler = ReportCompiler::new(
                store,
                store,
                insight,
                layout,
                Duration::from_secs(timeout_secs),
            )?;
            let plan = compiler.compile(&project)?;
            let plan_json = serde_json::to_string_pretty(&plan)?;
            match out {
                Some(path) => {
                    fs::write(&path, &plan_json)?;
                    emit(
                        format,
                        time::command_envelope(
                            "report.compile",
                            "ok",
                            serde_json::json!({"project": project, "pages": plan.pages.len(), "out": path.display().to_string()}),
                        ),
                        || {
                            println!(
                                "{} {} pages written to {}",
                                "ok".green(),
                                plan.pages.len(),
                                path.display()
                            )
                        },
                    );
                }
                None => println!("{}", plan_json),
            }
        }
    }
    Ok(())
}

fn print_instance(run: &InspectionInstance) {
    println!(
        "{}  {}  {}",
        run.id,
        output::status_label(run.status.as_str()).bold(),
        output::format_score(run.score)
    );
    println!(
        "  project {}  phase {}  template {}  v{}",
        run.project_id, run.phase_id, run.template_id, run.version
    );
    for item in &run.items {
        let status = match item.status {
            ItemStatus::Ok => item.status.as_str().green(),
            ItemStatus::NotOk => item.status.as_str().red(),
            _ => item.status.as_str().normal(),
        };
        println!("  {:<8} {:<8} {}", item.code, status, item.title);
    }
    if !run.comments.is_empty() {
        println!("  comments: {}", output::compact_line(&run.comments, 100));
    }
}

fn emit<F: FnOnce()>(format: OutputFormat, envelope: JsonValue, text: F) {
    match format {
        OutputFormat::Json => println!("{}", envelope),
        OutputFormat::Text => text(),
    }
}
