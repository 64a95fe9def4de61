//! Command-line front end
//!
//! Every command talks to the document service through a
//! [`DocumentBackend`] and prints JSON to the given writer.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::backend::DocumentBackend;
use crate::config::Config;
use crate::coords::{BoundingBox, Point};
use crate::diff::SavePayload;
use crate::ingestion::IngestionController;
use crate::model::FreeTextCommit;
use crate::render;
use crate::session::{EditorSession, SessionOptions};

#[derive(Debug, Parser)]
#[command(name = "pdf-overlay-editor")]
#[command(about = "Edit the text of uploaded PDFs and save the changes")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Upload a PDF and wait for text extraction.
    Upload {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// List uploaded documents.
    List,
    /// Print the extracted text of a page.
    Show {
        #[arg(value_name = "DOCUMENT_ID")]
        document_id: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Replace the text of a span and save.
    Replace {
        #[arg(value_name = "DOCUMENT_ID")]
        document_id: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Current text of the span
        #[arg(long)]
        old: String,
        #[arg(long)]
        new: String,
    },
    /// Add new text at a document-space position and save.
    AddText {
        #[arg(value_name = "DOCUMENT_ID")]
        document_id: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        x: f64,
        #[arg(long)]
        y: f64,
        #[arg(long)]
        text: String,
    },
    /// Render a page to a PNG file.
    Render {
        #[arg(value_name = "DOCUMENT_ID")]
        document_id: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 1.0)]
        scale: f64,
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Delete a document.
    Delete {
        #[arg(value_name = "DOCUMENT_ID")]
        document_id: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpanOutput {
    block: usize,
    line: usize,
    span: usize,
    text: String,
    bbox: BoundingBox,
    font_family: String,
    font_size: f64,
    color: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PageOutput {
    document_id: String,
    page: u32,
    page_count: Option<u32>,
    spans: Vec<SpanOutput>,
}

#[derive(Debug, Serialize)]
struct RenderOutput {
    page: u32,
    scale: f64,
    width: u32,
    height: u32,
    output: String,
}

/// Run a parsed command against `backend`
pub async fn run(cli: Cli, backend: Arc<dyn DocumentBackend>, config: &Config, out: &mut dyn Write) -> Result<()> {
    match cli.command {
        Commands::Upload { file } => run_upload(&file, backend, config, out).await,
        Commands::List => {
            let documents = backend.list_documents().await.context("failed to list documents")?;
            print_json(out, &documents)
        }
        Commands::Show { document_id, page } => {
            let session = open_session(backend, &document_id, config).await?;
            print_json(out, &page_output(&session, page))
        }
        Commands::Replace {
            document_id,
            page,
            old,
            new,
        } => {
            let mut session = open_session(backend, &document_id, config).await?;
            let id = session
                .overlay()
                .page(page)
                .and_then(|p| p.spans().find(|s| s.text == old).map(|s| s.id))
                .ok_or_else(|| anyhow!("no span with text {:?} on page {}", old, page))?;
            session.edit_text(id, new)?;
            let payload = session.save().await.context("failed to save edits")?;
            print_json(out, &payload)
        }
        Commands::AddText {
            document_id,
            page,
            x,
            y,
            text,
        } => {
            let mut session = open_session(backend, &document_id, config).await?;
            session.go_to_page(page)?;
            session.add_free_text(page, Point::new(x, y));
            session.edit_selected_text(text)?;
            if session.commit_edit() != FreeTextCommit::Kept {
                bail!("text is blank");
            }
            let payload: SavePayload = session.save().await.context("failed to save edits")?;
            print_json(out, &payload)
        }
        Commands::Render {
            document_id,
            page,
            scale,
            output,
        } => {
            let mut session = open_session(backend, &document_id, config).await?;
            let fallback_pages = session.page_count().unwrap_or(1);
            session.attach_file_renderer(render::default_factory(fallback_pages))?;
            session.go_to_page(page)?;
            session.set_scale(scale);
            let rendered = session.render_current_page().await?;
            rendered
                .image
                .save(&output)
                .with_context(|| format!("failed to write {}", output.display()))?;
            print_json(
                out,
                &RenderOutput {
                    page: rendered.page,
                    scale: rendered.scale,
                    width: rendered.width,
                    height: rendered.height,
                    output: output.display().to_string(),
                },
            )
        }
        Commands::Delete { document_id } => {
            backend
                .delete_document(&document_id)
                .await
                .with_context(|| format!("failed to delete document {}", document_id))?;
            writeln!(out, "deleted {}", document_id)?;
            Ok(())
        }
    }
}

async fn run_upload(file: &Path, backend: Arc<dyn DocumentBackend>, config: &Config, out: &mut dyn Write) -> Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let file_name = file
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("invalid file name: {}", file.display()))?;

    let controller = IngestionController::new(backend, config.poll_settings());
    let document = controller.ingest(file_name, bytes).await?;
    print_json(out, &document)
}

async fn open_session(backend: Arc<dyn DocumentBackend>, document_id: &str, config: &Config) -> Result<EditorSession> {
    let session = EditorSession::open_document(backend, document_id, SessionOptions::from(config))
        .await
        .with_context(|| format!("failed to open document {}", document_id))?;
    Ok(session)
}

fn page_output(session: &EditorSession, page: u32) -> PageOutput {
    let spans = session
        .overlay()
        .page(page)
        .map(|p| {
            p.blocks
                .iter()
                .enumerate()
                .flat_map(|(b, block)| {
                    block.lines.iter().enumerate().flat_map(move |(l, line)| {
                        line.spans.iter().enumerate().map(move |(s, span)| SpanOutput {
                            block: b,
                            line: l,
                            span: s,
                            text: span.text.clone(),
                            bbox: span.bbox,
                            font_family: span.style.font_family.clone(),
                            font_size: span.style.font_size,
                            color: span.style.color.to_hex(),
                        })
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    PageOutput {
        document_id: session.document().id.clone(),
        page,
        page_count: session.page_count(),
        spans,
    }
}

fn print_json<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    writeln!(out, "{json}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DocumentDescriptor, MockBackend};
    use crate::ingestion::TaskStatus;
    use crate::model::ExtractionResult;
    use serde_json::{json, Value};

    fn backend() -> Arc<MockBackend> {
        let extraction: ExtractionResult = serde_json::from_value(json!({
            "totalPages": 1,
            "pages": [{"page": 1, "blocks": [{"lines": [{"spans": [
                {"text": "Hello", "font": "Arial", "size": 12, "color": 0, "bbox": [0, 0, 50, 20]}
            ]}]}]}]
        }))
        .unwrap();
        let backend = Arc::new(MockBackend::new());
        backend.insert_document(DocumentDescriptor::new("7", "doc.pdf"), extraction);
        backend
    }

    async fn run_args(backend: Arc<MockBackend>, args: &[&str]) -> Result<String> {
        let cli = Cli::parse_from(std::iter::once("pdf-overlay-editor").chain(args.iter().copied()));
        let mut out = Vec::new();
        run(cli, backend, &Config::default(), &mut out).await?;
        Ok(String::from_utf8(out)?)
    }

    #[tokio::test]
    async fn test_show_prints_spans() {
        let output = run_args(backend(), &["show", "7"]).await.unwrap();
        let value: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["spans"][0]["text"], "Hello");
        assert_eq!(value["spans"][0]["color"], "#000000");
        assert_eq!(value["pageCount"], 1);
    }

    #[tokio::test]
    async fn test_replace_saves_one_edit() {
        let backend = backend();
        run_args(backend.clone(), &["replace", "7", "--old", "Hello", "--new", "World"])
            .await
            .unwrap();
        let applied = backend.applied();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].0, "7");
        assert_eq!(applied[0].1.edits[0].new_text, "World");

        let missing = run_args(backend, &["replace", "7", "--old", "Nope", "--new", "x"]).await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn test_add_text_saves_insertion() {
        let backend = backend();
        run_args(
            backend.clone(),
            &["add-text", "7", "--x", "100", "--y", "200", "--text", "Note"],
        )
        .await
        .unwrap();
        let payload = &backend.applied()[0].1;
        assert!(payload.edits.is_empty());
        assert_eq!(payload.new_texts[0].text, "Note");
        assert_eq!(payload.new_texts[0].font_size, 14.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_upload_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        std::fs::write(&path, b"%PDF-1.4\n").unwrap();

        let backend = backend();
        backend
            .push_receipt("7", "t9")
            .script_statuses("t9", [TaskStatus::Running, TaskStatus::Success]);
        let output = run_args(backend.clone(), &["upload", path.to_str().unwrap()])
            .await
            .unwrap();
        let value: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["id"], "7");
        assert_eq!(backend.uploads(), vec!["report.pdf".to_string()]);

        let text = dir.path().join("notes.txt");
        std::fs::write(&text, b"hello").unwrap();
        assert!(run_args(backend, &["upload", text.to_str().unwrap()]).await.is_err());
    }

    #[tokio::test]
    async fn test_render_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("page.png");
        let backend = backend();
        let mut document = DocumentDescriptor::new("8", "scan.pdf");
        document.file = Some("/media/scan.pdf".to_string());
        backend.insert_document(document, ExtractionResult::default());

        let printed = run_args(
            backend.clone(),
            &["render", "8", "--scale", "0.5", "--output", output.to_str().unwrap()],
        )
        .await
        .unwrap();
        let value: Value = serde_json::from_str(&printed).unwrap();
        assert_eq!(value["width"], 306);
        assert_eq!(value["height"], 396);
        assert_eq!(image::open(&output).unwrap().width(), 306);

        // "7" has no file to render
        assert!(run_args(backend, &["render", "7", "--output", output.to_str().unwrap()])
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_delete() {
        let backend = backend();
        let output = run_args(backend.clone(), &["delete", "7"]).await.unwrap();
        assert_eq!(output.trim(), "deleted 7");
        assert_eq!(backend.deleted(), vec!["7".to_string()]);
        assert!(run_args(backend, &["delete", "7"]).await.is_err());
    }
}
