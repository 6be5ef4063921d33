//! Replaces the backend contents with the JSONPlaceholder sample data.
//!
//! Run with:
//! ```
//! BACKEND_URL=https://<project>.supabase.co BACKEND_API_KEY=... cargo run -p seed-data --bin seed
//! ```

use seed_data::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let target = BackendTarget::from_env()?;
    let config = SeedConfig::from_env()?;
    if let BackendTarget::Rest(backend) = &target {
        tracing::info!("Seeding backend at {}", backend.url);
    }

    let seeder = Seeder::new(target.connect()).with_batch_size(config.batch_size);
    let source = PlaceholderClient::new().with_endpoint(&config.source_url);
    let counts = seeder.seed_from(&source).await?;

    // Summary output
    tracing::info!("Seed completed!");
    tracing::info!("  Users: {}", counts.users);
    tracing::info!("  Posts: {}", counts.posts);
    tracing::info!("  Comments: {}", counts.comments);
    tracing::info!("  Albums: {}", counts.albums);
    tracing::info!("  Photos: {}", counts.photos);
    tracing::info!("  Todos: {}", counts.todos);

    Ok(())
}
