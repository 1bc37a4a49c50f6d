//! Content Export CLI
//!
//! Usage:
//!   content-export render --kind <KIND> --data <FILE> [--object <ID>]... [--default KIND=FILE]... [OPTIONS]
//!   content-export validate <FILE>
//!   content-export catalog --kind <KIND> [--json]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use content_export::{
    CachedTemplateProvider, Engine, ExportConfig, FlexFieldObject, InMemoryRecordStore,
    ObjectType, ProjectData, RenderContext, Services, Subject, TemplateKind, TemplateRegistry,
};

#[derive(Parser)]
#[command(name = "content-export")]
#[command(about = "Render game-design records through export templates")]
struct Cli {
    /// Export configuration (TOML format)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a template against objects of a project file
    Render {
        /// Template kind to render
        #[arg(short, long, value_enum)]
        kind: TemplateKind,

        /// Project data file (JSON)
        #[arg(short, long)]
        data: PathBuf,

        /// Object to render; language files accept several, or none for all objects
        #[arg(short, long)]
        object: Vec<String>,

        /// Template file (uses the kind's default template if not provided)
        #[arg(short, long)]
        template: Option<PathBuf>,

        /// Replace a kind's default template with a file's contents
        #[arg(long = "default", value_name = "KIND=FILE", value_parser = parse_default_override)]
        defaults: Vec<(TemplateKind, PathBuf)>,
    },

    /// Check block pairing and delimiters of a template
    Validate {
        /// Template file
        file: PathBuf,
    },

    /// List the placeholders understood by a template kind
    Catalog {
        /// Template kind
        #[arg(short, long, value_enum)]
        kind: TemplateKind,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match ExportConfig::from_file(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => ExportConfig::default(),
    };

    match cli.command {
        Command::Render {
            kind,
            data,
            object,
            template,
            defaults,
        } => render(&config, kind, &data, &object, template.as_deref(), &defaults).await,
        Command::Validate { file } => validate(&config, &file),
        Command::Catalog { kind, json } => catalog(&config, kind, json),
    }
}

fn read_file(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

fn parse_default_override(arg: &str) -> Result<(TemplateKind, PathBuf), String> {
    let (kind, path) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected KIND=FILE, got '{}'", arg))?;
    let kind = TemplateKind::from_str(kind, false)?;
    Ok((kind, PathBuf::from(path)))
}

fn build_registry(config: &ExportConfig, defaults: &[(TemplateKind, PathBuf)]) -> TemplateRegistry {
    let mut registry = TemplateRegistry::from_config(config);
    for (kind, path) in defaults {
        if let Err(e) = registry.load_file(*kind, path) {
            eprintln!("Error loading template '{}': {}", path.display(), e);
            std::process::exit(1);
        }
    }
    registry
}

fn build_engine(config: &ExportConfig, registry: TemplateRegistry, records: InMemoryRecordStore) -> Engine {
    let templates = CachedTemplateProvider::new(Arc::new(registry));
    let services = Services::new(Arc::new(templates), Arc::new(records)).with_config(config);
    match Engine::standard_builder(services)
        .with_max_render_depth(config.export.max_render_depth)
        .build()
    {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn render(
    config: &ExportConfig,
    kind: TemplateKind,
    data: &Path,
    ids: &[String],
    template: Option<&Path>,
    defaults: &[(TemplateKind, PathBuf)],
) {
    let project = read_project(data);
    let mut objects: Vec<FlexFieldObject> = Vec::with_capacity(ids.len());
    for id in ids {
        match project.objects.iter().find(|o| &o.id == id) {
            Some(object) => objects.push(object.clone()),
            None => {
                eprintln!("Error: object not found: {}", id);
                std::process::exit(1);
            }
        }
    }
    if objects.is_empty() && kind == TemplateKind::LanguageFile {
        objects = project.objects.clone();
    }
    let records = InMemoryRecordStore::from_project(project);

    let context = if kind == TemplateKind::LanguageFile && objects.len() != 1 {
        RenderContext::new(Subject::Objects(objects), ObjectType::default())
    } else {
        match <[FlexFieldObject; 1]>::try_from(objects) {
            Ok([object]) => RenderContext::for_object(object),
            Err(_) => {
                eprintln!("Error: kind '{}' renders exactly one --object", kind);
                std::process::exit(1);
            }
        }
    };

    let engine = build_engine(config, build_registry(config, defaults), records);
    let text = match template {
        Some(path) => read_file(path),
        None => match engine.services().templates.default_template(&config.export.project_id, kind).await {
            Ok(t) => t.text,
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
    };

    let output = match engine.render(kind, &text, &context).await {
        Ok(output) => output,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    print!("{}", output.text);
    for diagnostic in &output.diagnostics {
        eprintln!("{}", diagnostic);
    }
    if config.export.fail_on_diagnostics && output.has_diagnostics() {
        std::process::exit(2);
    }
}

fn read_project(data: &Path) -> ProjectData {
    let json = read_file(data);
    match serde_json::from_str(&json) {
        Ok(project) => project,
        Err(e) => {
            eprintln!("Error loading project '{}': {}", data.display(), e);
            std::process::exit(1);
        }
    }
}

fn validate(config: &ExportConfig, file: &Path) {
    let source = read_file(file);
    let engine = build_engine(config, TemplateRegistry::from_config(config), InMemoryRecordStore::new());
    let report = engine.validate(&source);
    let filename = file.display().to_string();
    for issue in &report.issues {
        eprintln!("{}", issue.format(&source, &filename));
    }
    if !report.valid {
        std::process::exit(1);
    }
    println!("{}: ok", filename);
}

fn catalog(config: &ExportConfig, kind: TemplateKind, json: bool) {
    let engine = build_engine(config, TemplateRegistry::from_config(config), InMemoryRecordStore::new());
    let catalog = engine.placeholder_catalog(kind);
    if json {
        match serde_json::to_string_pretty(&catalog) {
            Ok(s) => println!("{}", s),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }
    for info in catalog {
        println!("{:<48} {}", info.name, info.description);
    }
}
