//! appwrite-docs: inspect, watch and transfer documents and files
//!
//! Usage:
//!   appwrite-docs get <database> <collection> <document>
//!   appwrite-docs list <database> <collection> --limit 10
//!   appwrite-docs watch <database> <collection> [--document <id>]
//!   appwrite-docs upload <bucket> <path> [--file-id <id>]
//!   appwrite-docs download <bucket> <file-id> [-o <path>]

use appwrite_bridge::cli::{DocsArgs, DocsCommand};
use appwrite_bridge::upload::UploadProgressCallback;
use appwrite_bridge::{Client, Document, InputFile, Query, Role, UploadProgress};
use clap::Parser;
use futures::StreamExt;
use serde_json::Value;
use std::io::Write;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = DocsArgs::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "appwrite_bridge=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = args.client_config()?;
    let client = Client::new(config)?;
    let role = if client.has_server_role() {
        Role::Server
    } else {
        Role::Client
    };
    tracing::debug!("Running as {:?}", role);

    let databases = client.databases().with_role(role);
    let storage = client.storage().with_role(role);

    match args.command {
        DocsCommand::Get {
            database,
            collection,
            document,
        } => {
            let doc: Document<Value> = databases
                .get_document(&database, &collection, &document, &[])
                .await?;
            print_json(&doc.to_json()?)?;
        }
        DocsCommand::List {
            database,
            collection,
            limit,
        } => {
            let queries: Vec<Query> = limit.map(Query::limit).into_iter().collect();
            let list = databases
                .list_documents::<Value>(&database, &collection, &queries)
                .await?;
            print_json(&serde_json::to_value(&list)?)?;
        }
        DocsCommand::Watch {
            database,
            collection,
            document,
        } => match document {
            Some(document) => {
                let mut view = databases.live_document::<Value>(&database, &collection, &document);
                loop {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => break,
                        snapshot = view.next() => match snapshot {
                            Some(Ok(Some(doc))) => print_json(&doc.to_json()?)?,
                            Some(Ok(None)) => println!("null"),
                            Some(Err(e)) => return Err(e.into()),
                            None => break,
                        }
                    }
                }
            }
            None => {
                let mut view = databases.live_documents::<Value>(&database, &collection, Vec::new());
                loop {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => break,
                        snapshot = view.next() => match snapshot {
                            Some(Ok(list)) => print_json(&serde_json::to_value(&list)?)?,
                            Some(Err(e)) => return Err(e.into()),
                            None => break,
                        }
                    }
                }
            }
        },
        DocsCommand::Upload {
            bucket,
            path,
            file_id,
        } => {
            let data = tokio::fs::read(&path).await?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload.bin".to_string());
            let on_progress: UploadProgressCallback = Arc::new(|p: UploadProgress| {
                eprintln!(
                    "{:>6.2}%  {} bytes  chunk {}/{}",
                    p.progress, p.size_uploaded, p.chunks_uploaded, p.chunks_total
                );
            });
            let file = storage
                .create_file(
                    &bucket,
                    &file_id,
                    InputFile::from_bytes(file_name, data),
                    None,
                    Some(on_progress),
                )
                .await?;
            print_json(&serde_json::to_value(&file)?)?;
        }
        DocsCommand::Download {
            bucket,
            file_id,
            output,
        } => {
            let bytes = storage.get_file_download(&bucket, &file_id, None).await?;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, &bytes).await?;
                    tracing::info!("Wrote {} bytes to {}", bytes.len(), path.display());
                }
                None => std::io::stdout().write_all(&bytes)?,
            }
        }
    }

    Ok(())
}

fn print_json(value: &Value) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
