// console/src/main.rs
// Credit Console - command line front end
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use common::{setup_tracing, ClientRecord, Config, ReportPeriod, SessionStatus};
use console::{
    ClientForm, ClientGateway, ClientTable, FileStorage, HttpBackend, Notifier, ProvisionForm,
    SessionManager, SystemClock,
};

#[derive(Parser, Debug)]
#[command(name = "credit-console", about = "Manage billing client accounts")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start a session
    Login { email: String, password: String },
    /// End the current session
    Logout,
    /// Show whether a session is active
    Status,
    /// List clients
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    Create { name: String, email: String },
    Update { id: String, name: String, email: String },
    /// Deactivate a client
    Delete { id: String },
    /// List discount options
    Discounts,
    /// Credit balance to a client
    Provision {
        id: String,
        amount: f64,
        /// Discount option id
        #[arg(long, default_value_t = 1)]
        discount: i64,
        /// Percentage for the free discount option
        #[arg(long)]
        percentage: Option<f64>,
    },
    /// Save a client's monthly report
    Report {
        id: String,
        #[arg(long)]
        month: u32,
        #[arg(long)]
        year: i32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env();
    if let Err(e) = setup_tracing(&config.log_level) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    let backend = Arc::new(HttpBackend::from_config(&config)?);
    let notifier = Notifier::new(config.session.notification_auto_hide_ms);
    let session = SessionManager::new(
        Arc::new(FileStorage::new(&config.session.storage_path)),
        Arc::new(SystemClock),
        backend.clone(),
        notifier,
    );
    session.restore().context("restoring persisted session")?;

    let gateway = ClientGateway::new(session.clone(), backend, &config.console.reports_dir);
    let result = run(cli.command, &session, &gateway, &config).await;
    session.dispose();
    result
}

async fn run(
    command: Command,
    session: &SessionManager,
    gateway: &ClientGateway,
    config: &Config,
) -> anyhow::Result<()> {
    match command {
        Command::Login { email, password } => {
            session.login(&email, &password).await?;
        },
        Command::Logout => session.logout()?,
        Command::Status => match session.status() {
            SessionStatus::Active { expires_at, .. } => {
                let remaining = expires_at - common::unix_now();
                println!("Logged in, session ends in {}s", remaining.max(0));
            },
            SessionStatus::Expired => println!("Session expired, log in again"),
            SessionStatus::Anonymous => println!("Not logged in"),
        },
        Command::List { search, page } => {
            gateway.fetch_all().await?;
            let clients = gateway.clients();
            let mut table = ClientTable::new(config.console.page_size);
            if let Some(query) = search {
                table.set_query(query);
            }
            table.set_page(page.saturating_sub(1));
            print_table(&table, &clients);
        },
        Command::Create { name, email } => {
            gateway.create(&ClientForm::new(name, email)).await?;
        },
        Command::Update { id, name, email } => {
            let mut record = find_client(gateway, &id).await?;
            record.display_name = name;
            record.email = email;
            gateway.update(&record).await?;
        },
        Command::Delete { id } => {
            let record = find_client(gateway, &id).await?;
            gateway.soft_delete(&record).await?;
        },
        Command::Discounts => {
            for option in gateway.fetch_discount_options().await? {
                println!("{:>4}  {}", option.id, option.menu_label());
            }
        },
        Command::Provision { id, amount, discount, percentage } => {
            let options = gateway.fetch_discount_options().await?;
            let option = options
                .into_iter()
                .find(|o| o.id == discount)
                .ok_or_else(|| anyhow!("unknown discount option {}", discount))?;
            let mut form = ProvisionForm::new(amount, option);
            if let Some(percentage) = percentage {
                form = form.with_percentage(percentage);
            }
            let record = find_client(gateway, &id).await?;
            gateway.provision(&record, &form).await?;
        },
        Command::Report { id, month, year } => {
            let record = find_client(gateway, &id).await?;
            let path = gateway.generate_report(ReportPeriod { month, year }, &record).await?;
            println!("{}", path.display());
        },
    }
    Ok(())
}

async fn find_client(gateway: &ClientGateway, id: &str) -> anyhow::Result<ClientRecord> {
    gateway.fetch_all().await?;
    gateway
        .find(id)
        .ok_or_else(|| anyhow!("no client with id {}", id))
}

fn print_table(table: &ClientTable, clients: &[ClientRecord]) {
    println!(
        "{:<8} {:<24} {:<28} {:>12}  {}",
        "ID", "CLIENT", "EMAIL", "BALANCE", "LAST PROVISIONED"
    );
    for client in table.visible(clients) {
        let provisioned = client
            .last_provisioned_at
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<8} {:<24} {:<28} {:>12.2}  {}",
            client.id, client.display_name, client.email, client.balance, provisioned
        );
    }
    println!(
        "page {} of {} ({} matching)",
        table.page() + 1,
        table.page_count(clients),
        table.filter(clients).len()
    );
}
