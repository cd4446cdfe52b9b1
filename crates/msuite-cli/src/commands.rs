use std::fs::File;
use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use msuite_ingest::IngestPipeline;
use msuite_server::{MsuiteServer, ServiceConfig};
use msuite_store::{open_backend, StorageBackend};
use msuite_types::Identifier;

use crate::cli::*;

pub fn run_command(cli: Cli, config: ServiceConfig) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args, config),
        Command::Ingest(args) => cmd_ingest(args, &config),
        Command::List(args) => cmd_list(args, &config),
        Command::Show(args) => cmd_show(args, &config),
        Command::Cat(args) => cmd_cat(args, &config),
        Command::Amend(args) => cmd_amend(args, &config),
    }
}

/// Backend for one-shot commands. Memory-backed storage would vanish with
/// the process, so it is refused here.
fn backend(config: &ServiceConfig) -> anyhow::Result<Arc<dyn StorageBackend>> {
    let kind = config.backend.kind_name();
    if !config.backend.is_durable() {
        anyhow::bail!("the configured {kind} backend keeps data in memory; set its root directories to use it from the command line");
    }
    open_backend(&config.backend).with_context(|| format!("opening {kind} backend"))
}

fn pipeline(config: &ServiceConfig) -> anyhow::Result<IngestPipeline> {
    Ok(IngestPipeline::new(backend(config)?, &config.ingest)?)
}

fn identifier(raw: &str) -> anyhow::Result<Identifier> {
    Identifier::parse(raw).with_context(|| format!("{raw:?} is not a valid identifier"))
}

fn cmd_serve(args: ServeArgs, mut config: ServiceConfig) -> anyhow::Result<()> {
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    let server = MsuiteServer::new(config)?;
    println!(
        "{} MaterialSuite endpoint on {} ({} backend)",
        "✓".green().bold(),
        server.config().bind_addr.to_string().bold(),
        server.config().backend.kind_name().cyan()
    );
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server.serve())?;
    Ok(())
}

fn cmd_ingest(args: IngestArgs, config: &ServiceConfig) -> anyhow::Result<()> {
    let pipeline = pipeline(config)?;
    let premis = std::fs::read(&args.premis)
        .with_context(|| format!("reading {}", args.premis.display()))?;
    let mut content = File::open(&args.content)
        .with_context(|| format!("opening {}", args.content.display()))?;
    let id = pipeline.add(&mut content, &premis)?;
    println!("{} Ingested {}", "✓".green().bold(), id.as_str().yellow());
    Ok(())
}

fn cmd_list(args: ListArgs, config: &ServiceConfig) -> anyhow::Result<()> {
    let limit = args.limit.min(config.max_limit);
    let ids = backend(config)?.list_identifiers(args.offset, limit)?;
    if ids.is_empty() {
        println!("No materialsuites.");
    }
    for id in ids {
        println!("{}", id);
    }
    Ok(())
}

fn cmd_show(args: ShowArgs, config: &ServiceConfig) -> anyhow::Result<()> {
    let id = identifier(&args.identifier)?;
    let backend = backend(config)?;
    if args.json {
        let tree = backend.get_metadata_json(&id)?;
        println!("{}", serde_json::to_string_pretty(&tree)?);
    } else {
        println!("{}", backend.get_metadata(&id)?.to_xml()?);
    }
    Ok(())
}

fn cmd_cat(args: CatArgs, config: &ServiceConfig) -> anyhow::Result<()> {
    let id = identifier(&args.identifier)?;
    let mut reader = backend(config)?.get_content(&id)?;
    let written = match &args.output {
        Some(path) => {
            let mut file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
            let n = io::copy(&mut reader, &mut file)?;
            file.sync_all()?;
            eprintln!("{} Wrote {} bytes to {}", "✓".green(), n, path.display());
            n
        }
        None => {
            let mut stdout = io::stdout().lock();
            let n = io::copy(&mut reader, &mut stdout)?;
            stdout.flush()?;
            n
        }
    };
    tracing::debug!(%id, bytes = written, "content written");
    Ok(())
}

fn cmd_amend(args: AmendArgs, config: &ServiceConfig) -> anyhow::Result<()> {
    let id = identifier(&args.identifier)?;
    let premis = std::fs::read(&args.premis)
        .with_context(|| format!("reading {}", args.premis.display()))?;
    pipeline(config)?.amend_metadata(&id, &premis)?;
    println!("{} Amended metadata of {}", "✓".green().bold(), id.as_str().yellow());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use msuite_store::BackendConfig;
    use msuite_types::{PremisObject, PremisRecord};

    const HELLO_MD5: &str = "5d41402abc4b2a76b9719d911017c592";

    fn config(dir: &tempfile::TempDir) -> ServiceConfig {
        ServiceConfig {
            backend: BackendConfig::Filesystem {
                content_root: dir.path().join("lts"),
                metadata_root: dir.path().join("premis"),
            },
            ..ServiceConfig::default()
        }
    }

    fn write_inputs(dir: &tempfile::TempDir, id: &str) -> (std::path::PathBuf, std::path::PathBuf) {
        let content = dir.path().join(format!("{id}.bin"));
        let premis = dir.path().join(format!("{id}.xml"));
        std::fs::write(&content, b"hello").unwrap();
        let record = PremisRecord::new(PremisObject::new("local", id).with_fixity("md5", HELLO_MD5));
        std::fs::write(&premis, record.to_xml().unwrap()).unwrap();
        (content, premis)
    }

    #[test]
    fn ingest_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let (content, premis) = write_inputs(&dir, "doc1");
        cmd_ingest(IngestArgs { content, premis }, &config).unwrap();

        cmd_list(ListArgs { offset: 0, limit: 10 }, &config).unwrap();
        cmd_show(ShowArgs { identifier: "doc1".into(), json: true }, &config).unwrap();

        let out = dir.path().join("out.bin");
        cmd_cat(
            CatArgs {
                identifier: "doc1".into(),
                output: Some(out.clone()),
            },
            &config,
        )
        .unwrap();
        assert_eq!(std::fs::read(out).unwrap(), b"hello");
    }

    #[test]
    fn second_ingest_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let (content, premis) = write_inputs(&dir, "doc1");
        cmd_ingest(IngestArgs { content: content.clone(), premis: premis.clone() }, &config).unwrap();
        assert!(cmd_ingest(IngestArgs { content, premis }, &config).is_err());
    }

    #[test]
    fn amend_requires_existing_suite() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir);
        let (_, premis) = write_inputs(&dir, "doc1");
        let err = cmd_amend(
            AmendArgs {
                identifier: "doc1".into(),
                premis,
            },
            &config,
        )
        .unwrap_err();
        assert!(err.to_string().contains("doc1"));
    }

    #[test]
    fn memory_backend_is_refused() {
        let config = ServiceConfig {
            backend: BackendConfig::Document {
                blob_chunk_size: 16,
                root: None,
            },
            ..ServiceConfig::default()
        };
        let err = cmd_list(ListArgs { offset: 0, limit: 10 }, &config).unwrap_err();
        assert!(err.to_string().contains("in memory"));
    }

    #[test]
    fn durable_document_backend_keeps_ingested_suites() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServiceConfig {
            backend: BackendConfig::Document {
                blob_chunk_size: 2,
                root: Some(dir.path().join("store")),
            },
            ..ServiceConfig::default()
        };
        let (content, premis) = write_inputs(&dir, "doc1");
        cmd_ingest(IngestArgs { content, premis }, &config).unwrap();
        let ids = backend(&config).unwrap().list_identifiers(0, 10).unwrap();
        assert_eq!(ids, vec![Identifier::parse("doc1").unwrap()]);
    }

    #[test]
    fn invalid_identifier_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = cmd_show(
            ShowArgs {
                identifier: "../x".into(),
                json: false,
            },
            &config(&dir),
        )
        .unwrap_err();
        assert!(err.to_string().contains("not a valid identifier"));
    }
}
