use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use asset_library::config::{Cli, Config};
use asset_library::{db, precompute, Library};

#[derive(Parser, Debug)]
#[command(name = "asset-library", about = "Asset library maintenance tools")]
struct MainCli {
    #[command(flatten)]
    base: Cli,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database and apply pending migrations
    Migrate,
    /// Rebuild the precomputation cache, for one item or everything
    Recompute {
        #[arg(long)]
        contentid: Option<i64>,
    },
    /// Re-run post-upload hooks over a project (moderator token required)
    PostProcess {
        project: String,
        #[arg(long)]
        contentid: Option<i64>,
        #[arg(long)]
        token: String,
    },
    /// Print library-wide counters as JSON
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = MainCli::parse();
    let data_dir = Config::data_dir(&cli.base);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli.base)?;

    let pool = db::create_pool(config.db_path())?;
    db::run_migrations(&pool)?;

    match cli.command {
        Command::Migrate => {
            tracing::info!("Database ready at {}", config.db_path().display());
        }
        Command::Recompute { contentid } => {
            let conn = pool.get()?;
            match contentid {
                Some(contentid) => {
                    precompute::recompute(&conn, contentid)?;
                    tracing::info!(contentid, "Recomputed");
                }
                None => {
                    let rows = precompute::recompute_all(&conn)?;
                    tracing::info!(rows, "Recomputed all content");
                }
            }
        }
        Command::PostProcess {
            project,
            contentid,
            token,
        } => {
            let library = Library::new(pool, config.registry())?;
            let actor = library.resolve_token(&token).await?;
            let log = library.run_post_process(actor, &project, contentid).await?;
            for line in log {
                println!("{line}");
            }
        }
        Command::Stats => {
            let library = Library::new(pool, config.registry())?;
            let stats = library.stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}
