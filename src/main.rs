use agency_ops::{
    config::{database, permissions, settings::AppSettings},
    core::{events::TracingEventSink, invoice, recurring, report},
    errors::Result,
};
use chrono::Utc;
use dotenvy::dotenv;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; variables may also come from the environment
    dotenv().ok();

    // 3. Settings and permission catalog
    let settings = AppSettings::from_env()?;
    let catalog = match permissions::load_config(&settings.permissions_path) {
        Ok(catalog) => catalog,
        Err(e) => {
            warn!(
                path = %settings.permissions_path.display(),
                "Failed to load permission catalog, using the builtin one: {}", e
            );
            permissions::PermissionCatalog::builtin()?
        }
    };
    info!(
        permissions = catalog.permissions.len(),
        roles = catalog.roles.len(),
        "Permission catalog loaded"
    );

    // 4. Database
    let db = database::create_connection(&settings.database_url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db).await?;

    // 5. Daily maintenance pass
    let today = Utc::now().date_naive();
    let overdue = invoice::mark_overdue_invoices(&db, today).await?;
    info!(count = overdue.len(), "Overdue invoices marked");

    let run = recurring::process_due_templates(&db, &TracingEventSink, today).await?;
    for (template_id, message) in &run.failed {
        warn!(template_id, %message, "Template left for the next run");
    }

    let outstanding = report::outstanding_report(&db, today).await?;
    info!("\n{}", report::format_outstanding_report(&outstanding));

    Ok(())
}
