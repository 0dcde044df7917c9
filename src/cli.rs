use crate::config::ClientConfig;
use crate::error::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CLI arguments for appwrite-docs
#[derive(Parser, Debug)]
#[command(name = "appwrite-docs")]
#[command(about = "Read, watch and transfer documents and files", long_about = None)]
pub struct DocsArgs {
    /// JSON config file; overrides the endpoint/project/key flags
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// REST endpoint (e.g. https://cloud.example.com/v1)
    #[arg(long, env = "APPWRITE_ENDPOINT", value_name = "URL")]
    pub endpoint: Option<String>,

    /// Project id
    #[arg(long, env = "APPWRITE_PROJECT", value_name = "ID")]
    pub project: Option<String>,

    /// API key; switches calls to the server role
    #[arg(long, env = "APPWRITE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Accept self-signed TLS certificates
    #[arg(long)]
    pub self_signed: bool,

    #[command(subcommand)]
    pub command: DocsCommand,
}

#[derive(Subcommand, Debug)]
pub enum DocsCommand {
    /// Print one document
    Get {
        database: String,
        collection: String,
        document: String,
    },
    /// List documents in a collection
    List {
        database: String,
        collection: String,
        /// Maximum number of documents
        #[arg(long)]
        limit: Option<u64>,
    },
    /// Print the collection (or one document) on every change until Ctrl-C
    Watch {
        database: String,
        collection: String,
        /// Watch a single document instead of the whole collection
        #[arg(long)]
        document: Option<String>,
    },
    /// Upload a file to a bucket, resuming a partial upload
    Upload {
        bucket: String,
        path: PathBuf,
        /// File id (defaults to a server-generated id)
        #[arg(long, default_value = appwrite_types::UNIQUE_ID)]
        file_id: String,
    },
    /// Download a file from a bucket
    Download {
        bucket: String,
        file_id: String,
        /// Output path (defaults to stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

impl DocsArgs {
    pub fn client_config(&self) -> Result<ClientConfig> {
        if let Some(path) = &self.config {
            return ClientConfig::load(path);
        }
        let endpoint = self
            .endpoint
            .clone()
            .ok_or_else(|| crate::error::Error::config("--endpoint or APPWRITE_ENDPOINT is required"))?;
        let project = self
            .project
            .clone()
            .ok_or_else(|| crate::error::Error::config("--project or APPWRITE_PROJECT is required"))?;
        let mut config = ClientConfig::new(endpoint, project).with_self_signed(self.self_signed);
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            config = config.with_api_key(key.clone());
        }
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_build_a_config() {
        let args = DocsArgs::try_parse_from([
            "appwrite-docs",
            "--endpoint",
            "https://cloud.example.com/v1",
            "--project",
            "p1",
            "--api-key",
            "k",
            "list",
            "d1",
            "c1",
            "--limit",
            "5",
        ])
        .unwrap();
        let config = args.client_config().unwrap();
        assert_eq!(config.project_id, "p1");
        assert_eq!(config.api_key.as_deref(), Some("k"));
        assert!(matches!(
            args.command,
            DocsCommand::List { limit: Some(5), .. }
        ));
    }

    #[test]
    fn upload_defaults_to_unique_id() {
        let args = DocsArgs::try_parse_from([
            "appwrite-docs",
            "--endpoint",
            "https://x/v1",
            "--project",
            "p",
            "upload",
            "b1",
            "./report.pdf",
        ])
        .unwrap();
        match args.command {
            DocsCommand::Upload { file_id, .. } => assert_eq!(file_id, "unique()"),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
