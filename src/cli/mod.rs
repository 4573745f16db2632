#![forbid(unsafe_code)]

use std::num::NonZeroUsize;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::{CommandFactory as _, Parser, Subcommand};
use serde::Serialize;
use time::OffsetDateTime;

use crate::config;
use crate::context::AppContext;
use crate::error::TaskdeckError;
use crate::error_log::AppError;
use crate::i18n::{Locale, Message};
use crate::output::{Table, truncate};
use crate::prefs::ThemeMode;
use crate::task::query::{FilterParams, Pagination, SortDirection, SortField, SortParams};
use crate::task::{Task, TaskList, TaskPatch};

pub const LOG_ENV: &str = "TASKDECK_LOG";

#[derive(Debug, Parser)]
#[command(name = "taskdeck", version, about = "Local task manager")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Sign in with one of the built-in accounts
    Login(LoginArgs),
    Logout,
    Whoami,
    Task(TaskArgs),
    /// Review the local error log (administrators only)
    Errors(ErrorsArgs),
    /// Show or change theme and language
    Prefs(PrefsArgs),
    Config(ConfigArgs),
    Completion(CompletionArgs),
    Version,
}

#[derive(Debug, Parser)]
pub struct LoginArgs {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Parser)]
pub struct TaskArgs {
    #[command(subcommand)]
    pub cmd: TaskCmd,
}

#[derive(Debug, Subcommand)]
pub enum TaskCmd {
    Add(TaskAddArgs),
    #[command(alias = "ls")]
    List(TaskListArgs),
    Show(TaskIdArgs),
    Edit(TaskEditArgs),
    /// Flip a task between pending and completed
    Toggle(TaskIdArgs),
    #[command(alias = "delete")]
    Rm(TaskIdArgs),
    /// Show or clear the saved list filters
    Filters(TaskFiltersArgs),
}

#[derive(Debug, Parser)]
pub struct TaskAddArgs {
    pub title: String,
    #[arg(short = 'd', long = "description", default_value = "")]
    pub description: String,
}

#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Parser)]
pub struct TaskListArgs {
    /// Only completed tasks
    #[arg(long = "completed", conflicts_with = "pending")]
    pub completed: bool,
    /// Only pending tasks
    #[arg(long = "pending")]
    pub pending: bool,
    /// Case-insensitive title search
    #[arg(short = 's', long = "search")]
    pub search: Option<String>,
    /// Drop any saved filters before listing
    #[arg(long = "all", conflicts_with_all = ["completed", "pending", "search"])]
    pub all: bool,
    /// Sort field (id, title, description, completed, created_at, updated_at, user_id)
    #[arg(long = "sort")]
    pub sort: Option<SortField>,
    #[arg(long = "asc", conflicts_with = "desc")]
    pub asc: bool,
    #[arg(long = "desc")]
    pub desc: bool,
    #[arg(short = 'p', long = "page", default_value_t = NonZeroUsize::MIN)]
    pub page: NonZeroUsize,
    /// Tasks per page (defaults to tasks.page_size)
    #[arg(short = 'n', long = "limit")]
    pub limit: Option<NonZeroUsize>,
    #[arg(long = "json", conflicts_with = "csv")]
    pub json: bool,
    #[arg(long = "csv")]
    pub csv: bool,
}

#[derive(Debug, Parser)]
pub struct TaskIdArgs {
    pub id: String,
}

#[derive(Debug, Parser)]
pub struct TaskEditArgs {
    pub id: String,
    #[arg(long = "title")]
    pub title: Option<String>,
    #[arg(short = 'd', long = "description")]
    pub description: Option<String>,
}

#[derive(Debug, Parser)]
pub struct TaskFiltersArgs {
    #[arg(long = "clear")]
    pub clear: bool,
}

#[derive(Debug, Parser)]
pub struct ErrorsArgs {
    #[command(subcommand)]
    pub cmd: ErrorsCmd,
}

#[derive(Debug, Subcommand)]
pub enum ErrorsCmd {
    List(ErrorsListArgs),
    Clear,
}

#[derive(Debug, Parser)]
pub struct ErrorsListArgs {
    #[arg(long = "json")]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct PrefsArgs {
    #[arg(long = "theme", conflicts_with = "toggle_theme")]
    pub theme: Option<ThemeMode>,
    #[arg(long = "toggle-theme")]
    pub toggle_theme: bool,
    #[arg(long = "locale")]
    pub locale: Option<Locale>,
}

#[derive(Debug, Parser)]
pub struct CompletionArgs {
    pub shell: clap_complete::Shell,
}

#[derive(Debug, Parser)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub cmd: ConfigCmd,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCmd {
    List,
    Set(ConfigSetArgs),
    Get(ConfigGetArgs),
}

#[derive(Debug, Parser)]
pub struct ConfigSetArgs {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Parser)]
pub struct ConfigGetArgs {
    pub key: String,
}

impl Commands {
    /// Name recorded as the route of a logged failure.
    fn route(&self) -> &'static str {
        match self {
            Self::Login(_) => "login",
            Self::Logout => "logout",
            Self::Whoami => "whoami",
            Self::Task(t) => match t.cmd {
                TaskCmd::Add(_) => "task add",
                TaskCmd::List(_) => "task list",
                TaskCmd::Show(_) => "task show",
                TaskCmd::Edit(_) => "task edit",
                TaskCmd::Toggle(_) => "task toggle",
                TaskCmd::Rm(_) => "task rm",
                TaskCmd::Filters(_) => "task filters",
            },
            Self::Errors(_) => "errors",
            Self::Prefs(_) => "prefs",
            Self::Config(_) => "config",
            Self::Completion(_) => "completion",
            Self::Version => "version",
        }
    }
}

pub async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.cmd {
        Commands::Completion(args) => {
            let mut cmd = Cli::command();
            clap_complete::generate(args.shell, &mut cmd, "taskdeck", &mut std::io::stdout());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config(args) => cmd_config(args),
        Commands::Version => Ok(cmd_version()),
        cmd => {
            let cfg = load_cfg().await?;
            let mut ctx = AppContext::init(cfg).await?;
            let route = cmd.route();
            let code = match dispatch(&mut ctx, cmd).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => {
                    ctx.handle_error(&err, route).await;
                    eprintln!("{}: {err:#}", ctx.text(failure_message(route, &err)));
                    ExitCode::from(1)
                }
            };
            ctx.shutdown();
            Ok(code)
        }
    }
}

async fn load_cfg() -> anyhow::Result<config::Config> {
    let cfg = tokio::task::spawn_blocking(|| -> anyhow::Result<config::Config> {
        let (cfg, _paths) = config::load()?;
        Ok(cfg)
    })
    .await??;
    Ok(cfg)
}

async fn dispatch(ctx: &mut AppContext, cmd: Commands) -> anyhow::Result<()> {
    match cmd {
        Commands::Login(args) => cmd_login(ctx, &args).await,
        Commands::Logout => {
            ctx.session.logout().await;
            println!("{}", ctx.text(Message::SignedOut));
            Ok(())
        }
        Commands::Whoami => cmd_whoami(ctx),
        Commands::Task(args) => cmd_task(ctx, args).await,
        Commands::Errors(args) => cmd_errors(ctx, args).await,
        Commands::Prefs(args) => cmd_prefs(ctx, args).await,
        Commands::Config(_) | Commands::Completion(_) | Commands::Version => {
            anyhow::bail!("command does not open a session")
        }
    }
}

fn failure_message(route: &str, err: &anyhow::Error) -> Message {
    match err.downcast_ref::<TaskdeckError>() {
        Some(e) if e.is_not_found() => return Message::TaskNotFound,
        Some(TaskdeckError::InvalidCredentials) => return Message::LoginError,
        Some(TaskdeckError::NotAuthorized) => return Message::AccessDenied,
        _ => {}
    }
    match route {
        "task add" => Message::AddError,
        "task edit" => Message::UpdateError,
        "task toggle" => Message::StatusUpdateError,
        "task rm" => Message::DeleteError,
        _ => Message::Error,
    }
}

fn cmd_config(args: ConfigArgs) -> anyhow::Result<ExitCode> {
    match args.cmd {
        ConfigCmd::List => {
            print!("{}", config::list_resolved_toml()?);
        }
        ConfigCmd::Set(set) => {
            config::set_value_string(&set.key, &set.value)?;
            println!("Set {} = {}", set.key, set.value);
        }
        ConfigCmd::Get(get) => match config::get_value_string(&get.key)? {
            Some(v) => println!("{v}"),
            None => anyhow::bail!(
                "configuration key '{}' not found - use 'taskdeck config list' to see available keys",
                get.key
            ),
        },
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_login(ctx: &mut AppContext, args: &LoginArgs) -> anyhow::Result<()> {
    let user = ctx.session.login(&args.email, &args.password).await?;
    println!("Signed in as {} <{}>", user.name, user.email);
    Ok(())
}

fn cmd_whoami(ctx: &AppContext) -> anyhow::Result<()> {
    let user = ctx.session.require_user()?;
    println!("{} <{}>", user.name, user.email);
    println!("  id:     {}", user.id);
    println!("  role:   {}", if user.is_admin() { "admin" } else { "member" });
    println!("  theme:  {}", ctx.prefs.theme());
    println!("  locale: {}", ctx.prefs.locale());
    Ok(())
}

async fn cmd_task(ctx: &mut AppContext, args: TaskArgs) -> anyhow::Result<()> {
    let mut list = ctx.open_task_list().await?;

    match args.cmd {
        TaskCmd::Add(a) => {
            let task = list.add(a.title.trim(), a.description.trim()).await?;
            println!("Created task {}", task.id);
        }
        TaskCmd::List(a) => task_list(ctx, &mut list, a).await?,
        TaskCmd::Show(a) => {
            let task = list
                .get(&a.id)
                .ok_or_else(|| TaskdeckError::TaskNotFound(a.id.clone()))?;
            print_task_details(ctx, task);
        }
        TaskCmd::Edit(a) => {
            let patch = TaskPatch {
                title: a.title.map(|t| t.trim().to_owned()),
                description: a.description,
                completed: None,
            };
            if patch.is_empty() {
                anyhow::bail!("nothing to update: pass --title and/or --description");
            }
            let task = list.update(&a.id, patch).await?;
            println!("Updated task {}", task.id);
        }
        TaskCmd::Toggle(a) => {
            let task = list
                .toggle_completion(&a.id)
                .await?
                .ok_or_else(|| TaskdeckError::TaskNotFound(a.id.clone()))?;
            println!(
                "{} {}",
                task.id,
                ctx.text(completion_message(task.completed))
            );
        }
        TaskCmd::Rm(a) => {
            list.delete(&a.id).await?;
            println!("Deleted task {}", a.id);
        }
        TaskCmd::Filters(a) => {
            if a.clear {
                list.clear_saved_filters().await?;
                println!("Cleared saved filters");
            } else if list.filters().is_empty() {
                println!("No saved filters");
            } else {
                println!("{}", describe_filters(list.filters()));
            }
        }
    }

    Ok(())
}

#[derive(Debug, Serialize)]
struct TaskListOutput<'a> {
    tasks: &'a [Task],
    total: usize,
    page: usize,
    pages: usize,
    limit: usize,
    filters: &'a FilterParams,
    sort: SortParams,
}

async fn task_list(ctx: &AppContext, list: &mut TaskList, args: TaskListArgs) -> anyhow::Result<()> {
    if args.search.is_some() {
        ctx.features.require_task_search()?;
    }

    if args.all {
        list.set_filters(FilterParams::default()).await;
    } else if args.completed || args.pending || args.search.is_some() {
        let filters = FilterParams {
            completed: match (args.completed, args.pending) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            },
            search: args.search.map(|s| s.trim().to_owned()),
        };
        list.set_filters(filters).await;
    }

    let mut sort = list.sort();
    if let Some(field) = args.sort {
        sort.field = field;
    }
    if args.asc {
        sort.direction = SortDirection::Asc;
    } else if args.desc {
        sort.direction = SortDirection::Desc;
    }
    list.set_sort(sort);

    if let Some(limit) = args.limit {
        list.set_pagination(Pagination::first_page(limit));
    }
    // Page 1 always exists, even for an empty list.
    if args.page > NonZeroUsize::MIN && !list.go_to_page(args.page.get()) {
        anyhow::bail!(
            "page {} is out of range (1-{})",
            args.page,
            list.page_count().max(1)
        );
    }

    let view = list.view();
    let pagination = list.pagination();
    let pages = list.page_count();

    if args.json {
        let out = TaskListOutput {
            tasks: &view.tasks,
            total: view.total,
            page: pagination.page.get(),
            pages,
            limit: pagination.limit.get(),
            filters: list.filters(),
            sort: list.sort(),
        };
        let mut s = serde_json::to_string_pretty(&out)?;
        s.push('\n');
        print!("{s}");
        return Ok(());
    }

    if args.csv {
        let mut t = Table::new(["task_id", "title", "completed", "created_at", "updated_at"]);
        for task in &view.tasks {
            t.row([
                task.id.clone(),
                task.title.clone(),
                task.completed.to_string(),
                format_rfc3339(task.created_at),
                format_rfc3339(task.updated_at),
            ]);
        }
        t.print_csv()?;
        return Ok(());
    }

    if !list.filters().is_empty() {
        println!("{}", describe_filters(list.filters()));
    }
    if view.tasks.is_empty() {
        println!("{}", ctx.text(Message::NoTasks));
        return Ok(());
    }

    let mut t = Table::new(["TASK", "STATUS", "TITLE", "CREATED"]);
    for task in &view.tasks {
        let status = ctx.text(completion_message(task.completed));
        t.row([
            task.id.clone(),
            if ctx.config.ui.icons {
                format!("{} {status}", completion_icon(task.completed))
            } else {
                status.to_owned()
            },
            truncate(&task.title, 48),
            format_utc(task.created_at),
        ]);
    }
    t.print()?;

    if pages > 1 {
        println!(
            "\n{} {} {} {} ({} {})",
            ctx.text(Message::Page),
            pagination.page,
            ctx.text(Message::Of),
            pages,
            view.total,
            sort_label(list.sort()),
        );
    }
    Ok(())
}

fn print_task_details(ctx: &AppContext, task: &Task) {
    println!("{}", task.title);
    println!("  id:          {}", task.id);
    println!(
        "  status:      {}",
        ctx.text(completion_message(task.completed))
    );
    println!("  created:     {}", format_utc(task.created_at));
    println!("  updated:     {}", format_utc(task.updated_at));
    if !task.description.trim().is_empty() {
        println!();
        for line in task.description.lines() {
            println!("  {line}");
        }
    }
}

async fn cmd_errors(ctx: &mut AppContext, args: ErrorsArgs) -> anyhow::Result<()> {
    ctx.session.require_admin()?;

    match args.cmd {
        ErrorsCmd::List(a) => {
            let errors = ctx.errors.stored_errors().await;
            if a.json {
                let mut s = serde_json::to_string_pretty(&errors)?;
                s.push('\n');
                print!("{s}");
                return Ok(());
            }
            if errors.is_empty() {
                println!("{}", ctx.text(Message::NoErrors));
                return Ok(());
            }
            print_error_table(&errors)?;
        }
        ErrorsCmd::Clear => {
            ctx.errors.clear_errors().await;
            println!("{}", ctx.text(Message::ErrorsCleared));
        }
    }
    Ok(())
}

fn print_error_table(errors: &[AppError]) -> anyhow::Result<()> {
    let mut t = Table::new(["TIME", "USER", "STATUS", "ROUTE", "MESSAGE"]);
    // Newest first.
    for e in errors.iter().rev() {
        t.row([
            format_utc(e.timestamp),
            e.user_id.clone(),
            e.status_code.to_string(),
            e.route.clone(),
            truncate(&e.message, 60),
        ]);
    }
    t.print().context("failed to write error table")
}

async fn cmd_prefs(ctx: &mut AppContext, args: PrefsArgs) -> anyhow::Result<()> {
    if args.theme.is_some() || args.toggle_theme {
        ctx.features.require_appearance()?;
    }
    if args.locale.is_some() {
        ctx.features.require_preferences()?;
    }

    if let Some(theme) = args.theme {
        ctx.prefs.set_theme(theme).await?;
    } else if args.toggle_theme {
        ctx.prefs.toggle_theme().await?;
    }
    if let Some(locale) = args.locale {
        ctx.prefs.set_locale(locale).await?;
    }

    println!("theme:  {}", ctx.prefs.theme());
    println!("locale: {}", ctx.prefs.locale());
    Ok(())
}

fn cmd_version() -> ExitCode {
    println!("taskdeck version {}", env!("CARGO_PKG_VERSION"));
    if let Some(commit) = option_env!("TASKDECK_GIT_COMMIT") {
        println!("  commit: {commit}");
    }
    println!("  rust: {}", rustc_version_runtime::version());
    println!(
        "  os/arch: {}/{}",
        std::env::consts::OS,
        std::env::consts::ARCH
    );
    ExitCode::SUCCESS
}

fn completion_message(completed: bool) -> Message {
    if completed {
        Message::Completed
    } else {
        Message::Pending
    }
}

fn completion_icon(completed: bool) -> &'static str {
    if completed { "✓" } else { "○" }
}

fn describe_filters(filters: &FilterParams) -> String {
    let mut parts: Vec<String> = Vec::new();
    if let Some(completed) = filters.completed {
        parts.push(format!("completed={completed}"));
    }
    if let Some(search) = filters.search.as_deref().filter(|s| !s.is_empty()) {
        parts.push(format!("search=\"{search}\""));
    }
    format!("Filters: {}", parts.join(" "))
}

fn sort_label(sort: SortParams) -> String {
    format!("{} {}", sort.field, sort.direction.as_str())
}

fn format_rfc3339(at: OffsetDateTime) -> String {
    at.format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "unknown".to_owned())
}

fn format_utc(at: OffsetDateTime) -> String {
    let fmt = time::macros::format_description!("[year]-[month]-[day] [hour]:[minute] UTC");
    at.to_offset(time::UtcOffset::UTC)
        .format(&fmt)
        .unwrap_or_else(|_| "unknown".to_owned())
}
