use clap::Parser;
use log::info;
use server::graph::{ConceptFields, GraphStore};
use server::network::Server;
use server::similarity::VectorIndex;
use shared::{ConceptMetadata, DEFAULT_EMBEDDING_DIMENSION};
use std::time::Duration;

/// mathquest server: multiplayer quiz sessions plus concept
/// similarity search over UDP.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// Embedding dimension for the similarity engine
    #[clap(long, default_value_t = DEFAULT_EMBEDDING_DIMENSION)]
    embedding_dimension: usize,
    /// Sessions idle longer than this many seconds are evicted
    #[clap(long, default_value = "600")]
    max_idle_secs: u64,
    /// Idle sweep interval in seconds
    #[clap(long, default_value = "30")]
    sweep_interval_secs: u64,
}

/// Seeds the catalog with a handful of concepts so search and
/// recommendations work out of the box.
async fn seed_catalog(server: &Server) {
    let seeds = [
        ConceptMetadata {
            name: "Linear Algebra".to_string(),
            category: "Algebra".to_string(),
            difficulty: "Advanced".to_string(),
            description: "Study of linear equations, vector spaces, and linear transformations"
                .to_string(),
            tags: vec![
                "vectors".to_string(),
                "matrices".to_string(),
                "eigenvalues".to_string(),
            ],
        },
        ConceptMetadata {
            name: "Calculus Integration".to_string(),
            category: "Calculus".to_string(),
            difficulty: "Intermediate".to_string(),
            description: "Techniques and applications of integral calculus".to_string(),
            tags: vec![
                "integration".to_string(),
                "antiderivatives".to_string(),
                "area".to_string(),
            ],
        },
        ConceptMetadata {
            name: "Graph Theory".to_string(),
            category: "Discrete Math".to_string(),
            difficulty: "Advanced".to_string(),
            description: "Mathematical study of graphs and their properties".to_string(),
            tags: vec![
                "graphs".to_string(),
                "networks".to_string(),
                "algorithms".to_string(),
            ],
        },
    ];

    let graph = server.graph();
    let engine = server.engine();

    for (i, metadata) in seeds.into_iter().enumerate() {
        let id = format!("concept_{}", i + 1);

        {
            let mut graph = graph.write().await;
            if graph
                .upsert_concept(ConceptFields {
                    name: metadata.name.clone(),
                    category: metadata.category.clone(),
                    difficulty: metadata.difficulty.clone(),
                    description: metadata.description.clone(),
                    tags: metadata.tags.clone(),
                })
                .is_err()
            {
                continue;
            }
        }

        let mut engine = engine.write().await;
        let text = format!(
            "{} {} {}",
            metadata.name,
            metadata.description,
            metadata.tags.join(" ")
        );
        let vector = engine.embedder().embed(&text);
        if let Err(e) = engine.upsert(&id, vector, metadata) {
            log::warn!("Failed to seed {}: {}", id, e);
        }
    }

    info!("Seeded concept catalog");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    let address = format!("{}:{}", args.host, args.port);

    let mut server = Server::new(
        &address,
        args.embedding_dimension,
        Duration::from_secs(args.max_idle_secs),
        Duration::from_secs(args.sweep_interval_secs),
    )
    .await?;

    seed_catalog(&server).await;

    tokio::select! {
        result = server.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
