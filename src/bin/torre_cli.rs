use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use torre_controle::{
    auth::{self, SeaOrmCredentialStore},
    config::{self, AppConfig},
    db,
    migrator,
    models::Sector,
    repositories::{SeaOrmRecordStore, SectorRepository},
    services::{
        barcode::{self, EXAMPLE_PAYLOAD, EXPECTED_FORMAT},
        dashboard::{DashboardService, DashboardTimeouts},
        reconciler::CrossSectorView,
    },
};

#[derive(Parser)]
#[command(
    name = "torre",
    about = "Torre de Controle CLI for scans, credentials and dashboard snapshots",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a raw barcode payload without touching the store
    Decode(DecodeArgs),
    /// Print an argon2 hash suitable for the cost-entry user table
    HashPassword(HashPasswordArgs),
    /// Create or replace a cost-entry user
    CreateUser(CreateUserArgs),
    /// Aggregate every sector once and print the cross-sector view
    Dashboard,
    /// Run pending database migrations
    Migrate,
}

#[derive(Args)]
struct DecodeArgs {
    /// Raw payload, e.g. "45868|000068310|0014|RJ08|EMS S/A|SAO JO|ROD"
    payload: String,
}

#[derive(Args)]
struct HashPasswordArgs {
    password: String,
}

#[derive(Args)]
struct CreateUserArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    password: String,
}

#[derive(Serialize)]
struct HashOutput {
    hash: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Decode(args) => handle_decode(args, cli.json),
        Commands::HashPassword(args) => handle_hash_password(args, cli.json),
        Commands::CreateUser(args) => handle_create_user(args).await,
        Commands::Dashboard => handle_dashboard(cli.json).await,
        Commands::Migrate => {
            let config = load_config()?;
            migrator::run_migration(&config.database_url).await
        }
    }
}

fn load_config() -> Result<AppConfig> {
    let config = config::load_config().context("failed to load application config")?;
    config::init_tracing(config.log_level(), config.log_json);
    Ok(config)
}

async fn connect(config: &AppConfig) -> Result<Arc<db::DbPool>> {
    let pool = db::establish_connection_from_app_config(config)
        .await
        .context("failed to connect to database")?;
    Ok(Arc::new(pool))
}

fn handle_decode(args: DecodeArgs, json: bool) -> Result<()> {
    let scan = barcode::decode(&args.payload).map_err(|e| {
        anyhow!(
            "{}\nFormato esperado: {} (exemplo: {})",
            e,
            EXPECTED_FORMAT,
            EXAMPLE_PAYLOAD
        )
    })?;

    if json {
        print_json(&scan)?;
    } else {
        println!("NF {} • {} volume(s)", scan.document_number, scan.volume_count);
        println!("  data:        {}", scan.date);
        println!("  destino:     {}", scan.destination);
        println!("  fornecedor:  {}", scan.supplier);
        println!("  cliente:     {}", scan.client_destination);
        println!("  tipo carga:  {}", scan.cargo_type);
    }
    Ok(())
}

fn handle_hash_password(args: HashPasswordArgs, json: bool) -> Result<()> {
    let hash = auth::hash_password(&args.password).context("failed to hash password")?;
    if json {
        print_json(&HashOutput { hash })?;
    } else {
        println!("{}", hash);
    }
    Ok(())
}

async fn handle_create_user(args: CreateUserArgs) -> Result<()> {
    let config = load_config()?;
    let db = connect(&config).await?;
    SeaOrmCredentialStore::new(db)
        .create_user(&args.name, &args.password)
        .await
        .context("failed to store cost-entry user")?;
    println!("Usuário '{}' salvo", args.name);
    Ok(())
}

async fn handle_dashboard(json: bool) -> Result<()> {
    let config = load_config()?;
    let db = connect(&config).await?;
    let repository = SectorRepository::new(Arc::new(SeaOrmRecordStore::new(db)));
    let service = DashboardService::new(
        repository,
        DashboardTimeouts::from(&config),
        config.recent_events_limit,
    );

    let view = service.load_view().await;
    if json {
        print_json(view.as_ref())?;
    } else {
        render_view(&view);
    }
    Ok(())
}

fn render_view(view: &CrossSectorView) {
    println!("Torre de Controle • {}", view.generated_at.to_rfc3339());
    for sector in Sector::ALL {
        let summary = view.summary(sector);
        let degraded = if view.degraded_sectors.contains(&sector) {
            " (indisponível)"
        } else {
            ""
        };
        println!(
            "- {}{}: {} NFs • {} volumes • {} concluídas",
            sector.display_name(),
            degraded,
            summary.total_documents,
            summary.total_volumes,
            summary.completed_documents
        );
    }
    for efficiency in &view.efficiency {
        println!(
            "  eficiência {}: {:.1}%",
            efficiency.sector.display_name(),
            efficiency.score
        );
    }
    for insight in &view.insights {
        println!("• {}", insight);
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
