use academe::academe::types::{Evaluation, Group, Project, Report, Student, Task, TaskFile};
use academe::academe::workflow;
use academe::cache::{CacheStorage, Cacheable, ReadThroughCache};
use academe::{CacheSource, CachedAcademeClient, Config, ResourceKind};
use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "academe")]
#[command(about = "Read projects, groups, tasks and students from an Academe backend")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/academe/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Print JSON instead of text
  #[arg(long, global = true)]
  json: bool,

  /// Increase log verbosity (-v, -vv, -vvv)
  #[arg(short, long, action = clap::ArgAction::Count, global = true)]
  verbose: u8,

  /// Write logs to this directory instead of stderr
  #[arg(long)]
  log_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List a collection
  List {
    #[arg(value_enum)]
    resource: ResourceKind,

    /// Skip the cache and ask the backend
    #[arg(short, long)]
    refresh: bool,
  },

  /// Show a single task
  Task { id: String },

  /// Move a task to its next status as one of its assignees
  Advance {
    id: String,

    /// Id of the acting user
    #[arg(long)]
    user: String,
  },

  /// File or show progress reports
  Report {
    #[command(subcommand)]
    action: ReportAction,
  },

  /// Write or list peer evaluations
  Evaluate {
    #[command(subcommand)]
    action: EvaluateAction,
  },

  /// List or attach files on a task
  Files {
    #[command(subcommand)]
    action: FilesAction,
  },

  /// Re-read a collection periodically until interrupted
  Watch {
    #[arg(value_enum)]
    resource: ResourceKind,

    /// Seconds between reads
    #[arg(short, long, default_value_t = 60)]
    interval: u64,

    /// Stop after this many reads
    #[arg(short = 'n', long)]
    count: Option<u32>,
  },
}

#[derive(Subcommand, Debug)]
enum ReportAction {
  /// File a report against a task
  Create { task_id: String, content: String },
  /// Show a report
  Show { id: String },
}

#[derive(Subcommand, Debug)]
enum EvaluateAction {
  /// Evaluate a student's work on a project
  Create {
    student_id: String,
    project_id: String,

    #[arg(long)]
    score: Option<f64>,

    #[arg(long)]
    comment: Option<String>,
  },
  /// List the evaluations you wrote
  List,
}

#[derive(Subcommand, Debug)]
enum FilesAction {
  /// List files attached to a task
  List { task_id: String },
  /// Upload a file to a task
  Upload { task_id: String, path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = academe::logging::init(args.verbose, args.log_dir.as_deref())?;

  let config = Config::load(args.config.as_deref())?;
  info!(api = %config.api.url, "Starting");

  let client = CachedAcademeClient::new(&config)?;

  match args.command {
    Command::List { resource, refresh } => list(&client, resource, refresh, args.json).await?,
    Command::Task { id } => {
      let task = client.task(&id).await?;
      print_one(&task, args.json)?;
    }
    Command::Advance { id, user } => {
      let status = client.advance_task(&id, &user).await?;
      println!("{} -> {}", id, status);
    }
    Command::Report { action } => {
      let report = match action {
        ReportAction::Create { task_id, content } => {
          client.client().create_report(&task_id, &content).await?
        }
        ReportAction::Show { id } => client.client().get_report(&id).await?,
      };
      print_one(&report, args.json)?;
    }
    Command::Evaluate { action } => match action {
      EvaluateAction::Create {
        student_id,
        project_id,
        score,
        comment,
      } => {
        let evaluation = client
          .client()
          .create_evaluation(&student_id, &project_id, score, comment.as_deref())
          .await?;
        print_one(&evaluation, args.json)?;
      }
      EvaluateAction::List => {
        let evaluations = client.client().list_evaluations().await?;
        print_all(&evaluations, args.json)?;
      }
    },
    Command::Files { action } => match action {
      FilesAction::List { task_id } => {
        let files = client.client().list_task_files(&task_id).await?;
        print_all(&files, args.json)?;
      }
      FilesAction::Upload { task_id, path } => {
        let filename = path
          .file_name()
          .map(|n| n.to_string_lossy().into_owned())
          .ok_or_else(|| eyre!("Not a file: {}", path.display()))?;
        let contents = tokio::fs::read(&path)
          .await
          .map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?;
        let message = client
          .client()
          .upload_task_file(&task_id, &filename, contents)
          .await?;
        println!("{}", message);
      }
    },
    Command::Watch {
      resource,
      interval,
      count,
    } => watch(&client, resource, Duration::from_secs(interval), count, args.json).await?,
  }

  Ok(())
}

async fn list<S: CacheStorage>(
  client: &CachedAcademeClient<S>,
  resource: ResourceKind,
  refresh: bool,
  json: bool,
) -> Result<()> {
  match resource {
    ResourceKind::Projects => show(client.projects_cache(), refresh, json).await,
    ResourceKind::Groups => show(client.groups_cache(), refresh, json).await,
    ResourceKind::Tasks => show(client.tasks_cache(), refresh, json).await,
    ResourceKind::Students => show(client.students_cache(), refresh, json).await,
  }
}

async fn watch<S: CacheStorage>(
  client: &CachedAcademeClient<S>,
  resource: ResourceKind,
  interval: Duration,
  count: Option<u32>,
  json: bool,
) -> Result<()> {
  let mut reads = 0u32;
  loop {
    list(client, resource, false, json).await?;
    reads += 1;
    if count.is_some_and(|n| reads >= n) {
      return Ok(());
    }

    tokio::select! {
      _ = tokio::time::sleep(interval) => {}
      _ = tokio::signal::ctrl_c() => return Ok(()),
    }
  }
}

async fn show<T, S>(cache: &ReadThroughCache<T, S>, refresh: bool, json: bool) -> Result<()>
where
  T: Cacheable + Line,
  S: CacheStorage,
{
  let result = cache.get_with_source(refresh).await?;

  match result.source {
    CacheSource::Offline => eprintln!(
      "backend unavailable, showing {} from {}",
      cache.name(),
      result.fetched_at.format("%Y-%m-%d %H:%M:%S UTC")
    ),
    CacheSource::CacheFresh | CacheSource::Network => {}
  }

  print_all(&result.data, json)
}

fn print_all<T: Serialize + Line>(items: &[T], json: bool) -> Result<()> {
  if json {
    println!("{}", serde_json::to_string_pretty(items)?);
  } else {
    for item in items {
      println!("{}", item.line());
    }
  }
  Ok(())
}

fn print_one<T: Serialize + Line>(item: &T, json: bool) -> Result<()> {
  if json {
    println!("{}", serde_json::to_string_pretty(item)?);
  } else {
    println!("{}", item.line());
  }
  Ok(())
}

/// One-line text rendering for list output
trait Line {
  fn line(&self) -> String;
}

impl Line for Project {
  fn line(&self) -> String {
    format!("{}\t{}\t{}\t{}", self.id, self.title, self.mentor_name, self.status)
  }
}

impl Line for Group {
  fn line(&self) -> String {
    let members: Vec<String> = self
      .members
      .iter()
      .map(|m| format!("{} ({})", m.name, m.role))
      .collect();
    format!(
      "{}\t{}\t{}\t{}",
      self.id,
      self.name,
      self.project_title,
      members.join(", ")
    )
  }
}

impl Line for Task {
  fn line(&self) -> String {
    let assignees: Vec<&str> = self.assignees.iter().map(|a| a.name.as_str()).collect();
    format!(
      "{}\t{}\t{}\t{}\t{}\t[{}]",
      self.id,
      self.title,
      self.status,
      self.priority,
      assignees.join(", "),
      workflow::action_label(self.status)
    )
  }
}

impl Line for Student {
  fn line(&self) -> String {
    format!(
      "{}\t{}\t{}\t{}",
      self.id,
      self.name,
      self.email,
      self.group_id.as_deref().unwrap_or("-")
    )
  }
}

impl Line for Report {
  fn line(&self) -> String {
    format!(
      "{}\t{}\t{}\t{}",
      self.id,
      self.task_title,
      self.student_name.as_deref().unwrap_or("-"),
      self.content
    )
  }
}

impl Line for Evaluation {
  fn line(&self) -> String {
    let score = self.score.map(|s| s.to_string());
    format!(
      "{}\t{}\t{}\t{}\t{}",
      self.id,
      self.student_name,
      self.project_title,
      score.as_deref().unwrap_or("-"),
      self.comment.as_deref().unwrap_or("")
    )
  }
}

impl Line for TaskFile {
  fn line(&self) -> String {
    format!("{}\t{}", self.filename, self.uploaded_at)
  }
}
