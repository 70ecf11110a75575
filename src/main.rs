use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use meme_composer::logging;
use meme_composer::meme::composite::RasterCompositor;
use meme_composer::meme::history::HistoryStore;
use meme_composer::meme::loader::DefaultImageLoader;
use meme_composer::meme::model::TextBox;
use meme_composer::meme::save::DirectorySink;
use meme_composer::meme::storage::FileStorage;
use meme_composer::meme::{MemeSession, SessionConfig};
use meme_composer::settings::Settings;
use meme_composer::templates::{ImgflipProvider, TemplateCatalog, TemplateRef, NO_TEMPLATES_MESSAGE};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "meme_composer", version, about = "Compose memes from template images")]
struct Cli {
    /// Settings file. Missing files fall back to defaults.
    #[arg(long, global = true, default_value = "meme_settings.json")]
    settings: String,

    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the templates offered by the template API.
    Templates,
    /// Render a meme, save the PNG and record it in history.
    Compose {
        /// Template image: a catalog id, a URL or a local path.
        #[arg(long)]
        template: String,
        /// Caption lines, one text box each, stacked top to bottom.
        #[arg(long = "text")]
        texts: Vec<String>,
        /// JSON array of text boxes. Overrides `--text`.
        #[arg(long)]
        boxes: Option<PathBuf>,
        /// Output folder for the PNG.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Subcommand, Debug)]
enum HistoryAction {
    List,
    Clear,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(&cli.settings)?;
    logging::init(
        cli.debug || settings.debug_logging,
        settings.log_file.as_ref().map(PathBuf::from),
    );
    tracing::debug!(settings = %cli.settings, "settings loaded");

    match cli.command {
        Command::Templates => list_templates(&settings),
        Command::Compose {
            template,
            texts,
            boxes,
            out,
        } => compose(&settings, &template, &texts, boxes, out),
        Command::History { action } => run_history(&settings, action),
    }
}

fn history_store(settings: &Settings) -> HistoryStore<FileStorage> {
    let mut storage = FileStorage::new(settings.history_dir());
    if let Some(quota) = settings.history_quota_bytes {
        storage = storage.with_quota(quota);
    }
    HistoryStore::new(storage).with_capacity(settings.history_capacity)
}

fn list_templates(settings: &Settings) -> anyhow::Result<()> {
    let provider = ImgflipProvider::new(&settings.template_api_url)?;
    let catalog = TemplateCatalog::load(&provider);
    if let Some(error) = catalog.last_error() {
        bail!("{NO_TEMPLATES_MESSAGE} ({error})");
    }
    for template in catalog.templates() {
        println!("{}\t{}\t{}", template.id, template.name, template.url);
    }
    Ok(())
}

fn resolve_template(settings: &Settings, template: &str) -> anyhow::Result<TemplateRef> {
    if template.contains('/') || template.contains('.') {
        return Ok(TemplateRef {
            id: template.to_string(),
            url: template.to_string(),
            name: template.to_string(),
        });
    }
    let provider = ImgflipProvider::new(&settings.template_api_url)?;
    let catalog = TemplateCatalog::load(&provider);
    catalog
        .find(template)
        .cloned()
        .with_context(|| format!("template `{template}` not found in catalog"))
}

fn read_boxes(path: &PathBuf) -> anyhow::Result<Vec<TextBox>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("read text boxes {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parse text boxes {}", path.display()))
}

fn compose(
    settings: &Settings,
    template: &str,
    texts: &[String],
    boxes: Option<PathBuf>,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let config = SessionConfig::from(settings);
    let download_dir = out.unwrap_or_else(|| settings.download_dir());
    let mut session = MemeSession::new(
        config.clone(),
        history_store(settings),
        Box::new(RasterCompositor::default()),
        Box::new(DefaultImageLoader::new()?),
        Box::new(DirectorySink::new(download_dir)),
    );
    session.set_template(resolve_template(settings, template)?);

    if let Some(path) = boxes {
        session.set_text_boxes(read_boxes(&path)?);
    } else if !texts.is_empty() {
        let step = config.surface_height as f64 / (texts.len() as f64 + 1.0);
        let mut stacked = Vec::with_capacity(texts.len());
        for (i, text) in texts.iter().enumerate() {
            let mut text_box = TextBox::new_centered(config.surface_width as f64, 0.0);
            text_box.y = step * (i as f64 + 1.0);
            text_box.text = text.clone();
            stacked.push(text_box);
        }
        session.set_text_boxes(stacked);
    }

    let report = session.download();
    println!("{}", report.notice.message);
    if let Some(path) = &report.saved_to {
        println!("{}", path.display());
    }
    if !report.notice.is_success() {
        bail!("{}", report.notice.message);
    }
    Ok(())
}

fn run_history(settings: &Settings, action: HistoryAction) -> anyhow::Result<()> {
    let mut store = history_store(settings);
    match action {
        HistoryAction::List => {
            for entry in store.load() {
                let captions: Vec<&str> = entry
                    .text_boxes
                    .iter()
                    .map(|b| b.text.as_str())
                    .filter(|t| !t.is_empty())
                    .collect();
                println!(
                    "{}\t{}\t{}",
                    entry.id,
                    entry.created_at.to_rfc3339(),
                    captions.join(" / ")
                );
            }
        }
        HistoryAction::Clear => {
            store.clear();
            println!("History cleared");
        }
    }
    Ok(())
}
