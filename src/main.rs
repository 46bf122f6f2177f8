//! Konsol CLI entry point

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use anyhow::Result;
use konsol::api::firestore::{documents_root, DEFAULT_DATABASE};
use konsol::api::{
    AppPlatform, BillingAccount, Bucket, DatabaseInstance, Document, Execution, FirebaseApp, FirebaseProject,
    History, Message, ObjectEntry, Target,
};
use konsol::paging::{PageSource, Pager};
use konsol::{ui, Konsol};

#[derive(Parser)]
#[command(name = "konsol")]
#[command(about = "🔥 Konsol - Firebase and Google Cloud console for the terminal")]
#[command(version)]
struct Cli {
    /// Project id; defaults to `default_project` from the config
    #[arg(short, long, global = true)]
    project: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct PageArgs {
    /// Items per page (defaults to the configured page size)
    #[arg(long)]
    page_size: Option<u32>,

    /// Continue from a token printed by a previous listing
    #[arg(long)]
    page_token: Option<String>,

    /// Walk every remaining page
    #[arg(long)]
    all: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create ~/.konsol/config.json
    Init,

    /// Sign in with Google in the browser
    Login,

    /// Revoke and delete the stored credential
    Logout,

    /// Show the signed-in account
    Status,

    /// Firebase projects and apps
    #[command(subcommand)]
    Projects(ProjectsCommand),

    /// Cloud Storage buckets and objects
    #[command(subcommand)]
    Storage(StorageCommand),

    /// Cloud Firestore databases, collections and documents
    #[command(subcommand)]
    Firestore(FirestoreCommand),

    /// Realtime Database instances and data
    #[command(subcommand)]
    Database(DatabaseCommand),

    /// Firebase Cloud Messaging
    #[command(subcommand)]
    Messaging(MessagingCommand),

    /// Firebase Test Lab matrices and results
    #[command(subcommand)]
    Testlab(TestlabCommand),

    /// Cloud Billing accounts
    #[command(subcommand)]
    Billing(BillingCommand),
}

#[derive(Subcommand)]
enum ProjectsCommand {
    /// List projects the account can see
    List(PageArgs),
    /// Show one project
    Get,
    /// List a project's apps
    Apps {
        #[arg(long, value_enum, default_value_t = Platform::Android)]
        platform: Platform,
        #[command(flatten)]
        page: PageArgs,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Platform {
    Android,
    Ios,
    Web,
}

impl From<Platform> for AppPlatform {
    fn from(platform: Platform) -> Self {
        match platform {
            Platform::Android => AppPlatform::Android,
            Platform::Ios => AppPlatform::Ios,
            Platform::Web => AppPlatform::Web,
        }
    }
}

#[derive(Subcommand)]
enum StorageCommand {
    /// List buckets of the project
    Buckets(PageArgs),
    /// List one level of a bucket
    Objects {
        bucket: String,
        #[arg(long)]
        prefix: Option<String>,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Show object metadata
    Get { bucket: String, object: String },
    /// Delete an object
    Rm { bucket: String, object: String },
}

#[derive(Args, Clone)]
struct DatabaseArg {
    /// Firestore database id
    #[arg(long, default_value = DEFAULT_DATABASE)]
    database: String,
}

#[derive(Subcommand)]
enum FirestoreCommand {
    /// List Firestore databases of the project
    Databases,
    /// List collection ids at the root or under a document
    Collections {
        /// Document path such as `users/ada`
        #[arg(long)]
        parent: Option<String>,
        #[command(flatten)]
        db: DatabaseArg,
        #[command(flatten)]
        page: PageArgs,
    },
    /// List documents of a collection
    Docs {
        /// Collection path such as `users` or `users/ada/posts`
        collection: String,
        #[command(flatten)]
        db: DatabaseArg,
        #[command(flatten)]
        page: PageArgs,
    },
    /// Show a document
    Get {
        path: String,
        #[command(flatten)]
        db: DatabaseArg,
    },
    /// Delete a document
    Rm {
        path: String,
        #[command(flatten)]
        db: DatabaseArg,
    },
}

#[derive(Subcommand)]
enum DatabaseCommand {
    /// List Realtime Database instances
    Instances(PageArgs),
    /// Print the JSON at a path
    Read {
        /// Instance URL, e.g. https://my-app-default-rtdb.firebaseio.com
        url: String,
        #[arg(default_value = "/")]
        path: String,
        /// Only keys one level down
        #[arg(long)]
        shallow: bool,
    },
}

#[derive(Subcommand)]
enum MessagingCommand {
    /// Send a message to a device, topic or condition
    Send {
        #[arg(long, group = "target")]
        token: Option<String>,
        #[arg(long, group = "target")]
        topic: Option<String>,
        #[arg(long, group = "target")]
        condition: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        body: Option<String>,
        /// Data entries as key=value
        #[arg(long, value_parser = parse_key_value)]
        data: Vec<(String, String)>,
        /// Validate without delivering
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum TestlabCommand {
    /// Show a test matrix
    Matrix { id: String },
    /// Cancel a running test matrix
    Cancel { id: String },
    /// List result histories
    Histories(PageArgs),
    /// List executions of a history
    Executions {
        history: String,
        #[command(flatten)]
        page: PageArgs,
    },
}

#[derive(Subcommand)]
enum BillingCommand {
    /// List billing accounts
    Accounts(PageArgs),
    /// Show billing state of the project
    Info,
}

fn parse_key_value(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Init = cli.command {
        konsol::config::init()?;
        ui::print_success("Konsol is configured");
        println!("\nNext steps:");
        println!("  1. Sign in: konsol login");
        println!("  2. List projects: konsol projects list");
        return Ok(());
    }

    let config = konsol::config::load()?;
    let app = Konsol::open(config)?;

    if let Err(e) = run(&app, cli).await {
        ui::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
    Ok(())
}

async fn run(app: &Konsol, cli: Cli) -> Result<()> {
    let project = cli.project.as_deref();

    match cli.command {
        Commands::Init => {}

        Commands::Login => {
            let account = app.login().await?;
            ui::print_success(&format!(
                "Signed in as {}",
                account.email.as_deref().unwrap_or(&account.sub)
            ));
        }

        Commands::Logout => {
            if app.logout().await? {
                ui::print_success("Logged out successfully");
            } else {
                ui::print_warning("Not signed in");
            }
        }

        Commands::Status => {
            ui::print_header("Status", None);
            match app.account().await? {
                Some(account) => {
                    ui::print_row("Account", account.email.as_deref().unwrap_or(&account.sub));
                    if let Some(name) = &account.name {
                        ui::print_row("Name", name);
                    }
                }
                None => ui::print_warning("Not signed in (run 'konsol login')"),
            }
            let config = app.config();
            ui::print_row("Default project", config.default_project.as_deref().unwrap_or("-"));
            ui::print_row("Credential store", &config.database_path.display().to_string());
        }

        Commands::Projects(command) => projects(app, project, command).await?,
        Commands::Storage(command) => storage(app, project, command).await?,
        Commands::Firestore(command) => firestore(app, project, command).await?,
        Commands::Database(command) => database(app, project, command).await?,
        Commands::Messaging(command) => messaging(app, project, command).await?,
        Commands::Testlab(command) => testlab(app, project, command).await?,
        Commands::Billing(command) => billing(app, project, command).await?,
    }

    Ok(())
}

/// Build a pager from the listing flags and print one page, or all of them
async fn list<S, P, F>(app: &Konsol, page: PageArgs, what: &str, pager: P, render: F) -> Result<()>
where
    S: PageSource,
    P: FnOnce(u32, Option<String>) -> Pager<S>,
    F: Fn(&S::Item),
{
    let size = page.page_size.unwrap_or(app.config().page_size);
    let mut pager = pager(size, page.page_token);

    if page.all {
        let bar = ui::spinner(&format!("Loading {}", what));
        let items = pager.collect_all().await;
        bar.finish_and_clear();
        let items = items?;
        items.iter().for_each(&render);
        ui::print_step(&format!("{} {}", items.len(), what));
        return Ok(());
    }

    let items = pager.next_page().await?.unwrap_or_default();
    if items.is_empty() {
        ui::print_step(&format!("No {}", what));
    }
    items.iter().for_each(&render);
    ui::print_next_page(pager.next_token());
    Ok(())
}

async fn projects(app: &Konsol, project: Option<&str>, command: ProjectsCommand) -> Result<()> {
    let firebase = app.firebase();
    match command {
        ProjectsCommand::List(page) => {
            list(app, page, "projects", |size, token| firebase.projects(size, token), |p: &FirebaseProject| {
                ui::print_row(&p.project_id, p.display_name.as_deref().unwrap_or(""));
            })
            .await?;
        }
        ProjectsCommand::Get => {
            let p = firebase.get_project(app.config().project(project)?).await?;
            ui::print_header(&p.project_id, None);
            ui::print_row("Name", p.display_name.as_deref().unwrap_or("-"));
            ui::print_row("Number", p.project_number.as_deref().unwrap_or("-"));
            ui::print_row("State", p.state.as_deref().unwrap_or("-"));
            if let Some(resources) = &p.resources {
                ui::print_row("Storage bucket", resources.storage_bucket.as_deref().unwrap_or("-"));
                ui::print_row("Database", resources.realtime_database_instance.as_deref().unwrap_or("-"));
                ui::print_row("Hosting site", resources.hosting_site.as_deref().unwrap_or("-"));
            }
        }
        ProjectsCommand::Apps { platform, page } => {
            let project = app.config().project(project)?;
            list(app, page, "apps", |size, token| firebase.apps(project, platform.into(), size, token), |a: &FirebaseApp| {
                let id = a.package_name.as_deref().or(a.bundle_id.as_deref()).unwrap_or("");
                ui::print_row(&a.app_id, &format!("{} {}", a.display_name.as_deref().unwrap_or(""), id));
            })
            .await?;
        }
    }
    Ok(())
}

async fn storage(app: &Konsol, project: Option<&str>, command: StorageCommand) -> Result<()> {
    let storage = app.storage();
    match command {
        StorageCommand::Buckets(page) => {
            let project = app.config().project(project)?;
            list(app, page, "buckets", |size, token| storage.buckets(project, size, token), |b: &Bucket| {
                ui::print_row(&b.name, b.location.as_deref().unwrap_or(""));
            })
            .await?;
        }
        StorageCommand::Objects { bucket, prefix, page } => {
            list(app, page, "objects", |size, token| storage.objects(&bucket, prefix.as_deref(), size, token), |entry: &ObjectEntry| {
                match entry {
                    ObjectEntry::Prefix(prefix) => ui::print_row(prefix, "dir"),
                    ObjectEntry::Object(o) => ui::print_row(
                        &o.name,
                        &o.size_bytes().map(|s| format!("{} bytes", s)).unwrap_or_default(),
                    ),
                }
            })
            .await?;
        }
        StorageCommand::Get { bucket, object } => {
            let o = storage.get_object(&bucket, &object).await?;
            ui::print_header(&o.name, None);
            ui::print_row("Bucket", &o.bucket);
            ui::print_row("Size", &o.size_bytes().map(|s| s.to_string()).unwrap_or_else(|| "-".to_string()));
            ui::print_row("Content type", o.content_type.as_deref().unwrap_or("-"));
            ui::print_row("Updated", o.updated.as_deref().unwrap_or("-"));
        }
        StorageCommand::Rm { bucket, object } => {
            storage.delete_object(&bucket, &object).await?;
            ui::print_success(&format!("Deleted gs://{}/{}", bucket, object));
        }
    }
    Ok(())
}

async fn firestore(app: &Konsol, project: Option<&str>, command: FirestoreCommand) -> Result<()> {
    let firestore = app.firestore();
    let project = app.config().project(project)?;
    match command {
        FirestoreCommand::Databases => {
            for db in firestore.list_databases(project).await? {
                ui::print_row(&db.name, db.location_id.as_deref().unwrap_or(""));
            }
        }
        FirestoreCommand::Collections { parent, db, page } => {
            let root = documents_root(project, &db.database);
            let parent = match parent {
                Some(path) => format!("{}/{}", root, path.trim_matches('/')),
                None => root,
            };
            list(app, page, "collections", |size, token| firestore.collection_ids(&parent, size, token), |id: &String| {
                ui::print_row(id, "");
            })
            .await?;
        }
        FirestoreCommand::Docs { collection, db, page } => {
            let collection = collection.trim_matches('/');
            let root = documents_root(project, &db.database);
            let (parent, collection_id) = match collection.rsplit_once('/') {
                Some((doc, id)) => (format!("{}/{}", root, doc), id),
                None => (root, collection),
            };
            list(app, page, "documents", |size, token| firestore.documents(&parent, collection_id, size, token), |d: &Document| {
                ui::print_row(d.id(), &format!("{} fields", d.fields.len()));
            })
            .await?;
        }
        FirestoreCommand::Get { path, db } => {
            let name = format!("{}/{}", documents_root(project, &db.database), path.trim_matches('/'));
            let doc = firestore.get_document(&name).await?;
            ui::print_header(doc.id(), None);
            for (key, value) in &doc.fields {
                ui::print_row(key, &value.to_string());
            }
        }
        FirestoreCommand::Rm { path, db } => {
            let name = format!("{}/{}", documents_root(project, &db.database), path.trim_matches('/'));
            firestore.delete_document(&name).await?;
            ui::print_success(&format!("Deleted {}", path));
        }
    }
    Ok(())
}

async fn database(app: &Konsol, project: Option<&str>, command: DatabaseCommand) -> Result<()> {
    let database = app.database();
    match command {
        DatabaseCommand::Instances(page) => {
            let project = app.config().project(project)?;
            list(app, page, "instances", |size, token| database.instances(project, size, token), |i: &DatabaseInstance| {
                ui::print_row(i.id(), i.database_url.as_deref().unwrap_or(""));
            })
            .await?;
        }
        DatabaseCommand::Read { url, path, shallow } => {
            let value = database.read(&url, &path, shallow).await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }
    Ok(())
}

async fn messaging(app: &Konsol, project: Option<&str>, command: MessagingCommand) -> Result<()> {
    let MessagingCommand::Send { token, topic, condition, title, body, data, dry_run } = command;

    let target = match (token, topic, condition) {
        (Some(token), _, _) => Target::Token(token),
        (_, Some(topic), _) => Target::Topic(topic),
        (_, _, Some(condition)) => Target::Condition(condition),
        _ => anyhow::bail!("Give one of --token, --topic or --condition"),
    };

    let mut message = Message::new(target);
    if title.is_some() || body.is_some() {
        message = message.with_notification(title, body);
    }
    for (key, value) in data {
        message = message.with_data(key, value);
    }

    let project = app.config().project(project)?;
    let id = app.messaging().send(project, &message, dry_run).await?;
    if dry_run {
        ui::print_success("Message is valid (not sent)");
    } else {
        ui::print_success(&format!("Sent {}", id));
    }
    Ok(())
}

async fn testlab(app: &Konsol, project: Option<&str>, command: TestlabCommand) -> Result<()> {
    let testlab = app.testlab();
    let project = app.config().project(project)?;
    match command {
        TestlabCommand::Matrix { id } => {
            let matrix = testlab.get_matrix(project, &id).await?;
            ui::print_header(&matrix.test_matrix_id, None);
            ui::print_row("State", matrix.state.as_deref().unwrap_or("-"));
            ui::print_row("Outcome", matrix.outcome_summary.as_deref().unwrap_or("-"));
            if let Some(details) = &matrix.invalid_matrix_details {
                ui::print_row("Invalid", details);
            }
            if let Some(url) = matrix.result_storage.as_ref().and_then(|r| r.results_url.as_deref()) {
                ui::print_row("Results", url);
            }
        }
        TestlabCommand::Cancel { id } => {
            let state = testlab.cancel_matrix(project, &id).await?;
            ui::print_success(&format!("Cancel requested ({})", state.as_deref().unwrap_or("unknown state")));
        }
        TestlabCommand::Histories(page) => {
            list(app, page, "histories", |size, token| testlab.histories(project, size, token), |h: &History| {
                ui::print_row(&h.history_id, h.display_name.as_deref().unwrap_or(""));
            })
            .await?;
        }
        TestlabCommand::Executions { history, page } => {
            list(app, page, "executions", |size, token| testlab.executions(project, &history, size, token), |e: &Execution| {
                let outcome = e.outcome.as_ref().and_then(|o| o.summary.as_deref()).unwrap_or("-");
                let created = e
                    .creation_time
                    .as_ref()
                    .and_then(|t| t.to_datetime())
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                ui::print_row(&e.execution_id, &format!("{} {}", outcome, created));
            })
            .await?;
        }
    }
    Ok(())
}

async fn billing(app: &Konsol, project: Option<&str>, command: BillingCommand) -> Result<()> {
    let billing = app.billing();
    match command {
        BillingCommand::Accounts(page) => {
            list(app, page, "billing accounts", |size, token| billing.billing_accounts(size, token), |a: &BillingAccount| {
                let state = if a.open { "open" } else { "closed" };
                ui::print_row(&a.name, &format!("{} {}", a.display_name.as_deref().unwrap_or(""), state));
            })
            .await?;
        }
        BillingCommand::Info => {
            let info = billing.get_project_billing_info(app.config().project(project)?).await?;
            ui::print_row("Billing enabled", if info.billing_enabled { "yes" } else { "no" });
            ui::print_row("Account", info.billing_account_name.as_deref().unwrap_or("-"));
        }
    }
    Ok(())
}
