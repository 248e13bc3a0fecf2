use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shop::config::StoreConfig;
use shop::db::GraphDb;
use shop::shell::{tree_render, Shell};
use shop::Store;

#[derive(Parser)]
#[command(name = "shop")]
#[command(about = "Product catalog with dynamic, graph-persisted category schemas")]
struct Cli {
    /// Store file (overrides SHOP_STORE)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Store name, used for the root category (overrides SHOP_NAME)
    #[arg(long, global = true)]
    name: Option<String>,

    /// Use a throwaway in-memory store
    #[arg(long, global = true, conflicts_with = "store")]
    memory: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive shell (default)
    Shell,
    /// Print the category tree
    Tree {
        /// Print JSON instead of ASCII art
        #[arg(long)]
        json: bool,
    },
    /// List attribute types
    Types,
}

/// Log to stderr so stdout stays clean for shell output.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "shop=info".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = if cli.memory {
        StoreConfig::default()
    } else {
        StoreConfig::from_env()?
    };
    if let Some(path) = cli.store {
        config.path = Some(path);
    }
    if let Some(name) = cli.name {
        config.name = name;
    }

    let db = GraphDb::connect(&config)?;
    db.migrate()?;
    let store = Store::open(db, &config.name)?;

    match cli.command.unwrap_or(Commands::Shell) {
        Commands::Shell => {
            let stdin = std::io::stdin();
            let mut shell = Shell::new(store, std::io::stdout())?;
            shell.run(stdin.lock())?;
        }
        Commands::Tree { json } => {
            let root = store.root()?;
            let tree = store.category_tree(&root)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tree)?);
            } else {
                print!("{}", tree_render::render_tree(&tree));
            }
        }
        Commands::Types => {
            for attr_type in store.attribute_types().all()? {
                println!("{attr_type}");
            }
        }
    }

    Ok(())
}
