//! Command-line entry point: `groundsmith --index` builds the vector index
//! from a documents directory, `groundsmith --query` runs an interactive
//! grounded Q&A loop against it.

use std::io::Write as _;
use std::process::ExitCode;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use groundsmith::chunker::chunk_document;
use groundsmith::context::ContextAssembler;
use groundsmith::embeddings::OllamaEmbeddings;
use groundsmith::generation::OllamaGenerator;
use groundsmith::indexer::IndexWriter;
use groundsmith::ingestion::{DirectorySource, DocumentSource};
use groundsmith::retriever::Retriever;
use groundsmith::session::{QuerySession, TurnOutcome};
use groundsmith::stores::{SqliteVectorStore, VectorStore};
use groundsmith::types::RagError;
use groundsmith::RagConfig;

enum Mode {
    Index,
    Query,
}

fn parse_mode() -> Option<Mode> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [flag] if flag == "--index" => Some(Mode::Index),
        [flag] if flag == "--query" => Some(Mode::Query),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let Some(mode) = parse_mode() else {
        eprintln!("usage: groundsmith --index | --query");
        return ExitCode::from(2);
    };

    let config = match RagConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let result = match mode {
        Mode::Index => run_index(&config).await,
        Mode::Query => run_query(&config).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run_index(config: &RagConfig) -> Result<(), RagError> {
    let source = DirectorySource::new(&config.docs_dir);
    let documents = source.list_documents().await?;
    if documents.is_empty() {
        println!("No documents found in {}", config.docs_dir.display());
        return Ok(());
    }
    println!("Found {} document(s) to index.", documents.len());

    let store = Arc::new(SqliteVectorStore::open(&config.db_path).await?);
    let embeddings = Arc::new(OllamaEmbeddings::new(
        config.ollama_url.clone(),
        config.embedding_model.clone(),
        config.embedding_dimensions,
    ));
    let writer = IndexWriter::new(embeddings, store.clone());

    let mut written = 0usize;
    let mut failures = Vec::new();
    for document in &documents {
        if config.reindex {
            let removed = store.delete_by_source(&document.source_id).await?;
            if removed > 0 {
                tracing::info!(source_id = %document.source_id, removed, "cleared stale chunks");
            }
        }
        let chunks = chunk_document(document, config.chunk_size, config.chunk_overlap)?;
        println!(
            "Indexing {} ({} chunk(s))...",
            document.source_id,
            chunks.len()
        );
        let report = writer.index(&chunks).await;
        written += report.written;
        failures.extend(report.failed);
    }

    println!("Indexed {written} chunk(s) into {}.", config.db_path.display());
    if !failures.is_empty() {
        println!("{} chunk(s) failed:", failures.len());
        for failure in &failures {
            println!("  {}: {}", failure.chunk_id, failure.reason);
        }
    }
    Ok(())
}

async fn run_query(config: &RagConfig) -> Result<(), RagError> {
    let store = Arc::new(SqliteVectorStore::open(&config.db_path).await?);
    let embeddings = Arc::new(OllamaEmbeddings::new(
        config.ollama_url.clone(),
        config.embedding_model.clone(),
        config.embedding_dimensions,
    ));
    let retriever = Retriever::new(embeddings, store);
    let assembler = ContextAssembler::new(config.context_budget);
    let generator = Arc::new(OllamaGenerator::new(
        config.ollama_url.clone(),
        config.chat_model.clone(),
    ));
    let mut session = QuerySession::new(retriever, assembler, generator, config.top_k);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\nEnter your query (or type 'exit' to quit): ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            // End of input closes the session like an explicit exit.
            break;
        };

        let outcome = session
            .next_turn(&line, |fragment| {
                print!("{fragment}");
                let _ = std::io::stdout().flush();
            })
            .await;

        match outcome {
            Ok(TurnOutcome::Answered(_)) => println!(),
            Ok(TurnOutcome::NoQuery) => {}
            Ok(TurnOutcome::Closed) => break,
            Err(err @ RagError::Consistency { .. }) => return Err(err),
            Err(err) => eprintln!("\nquery failed: {err}"),
        }
    }
    println!("Goodbye.");
    Ok(())
}
