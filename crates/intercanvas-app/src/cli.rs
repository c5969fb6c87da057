use clap::{Args, Parser, Subcommand, ValueEnum};
use intercanvas_core::document::box_to_fields;
use intercanvas_core::{
    Alignment, AspectRatio, Background, BackgroundMode, BoxContent, BoxRect, CanvasScope,
    CanvasSession, DocumentStore, EditorConfig, FileStore, Layer, RemoteStore, ReportImage,
};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AppError, Result};

const LOAD_TIMEOUT: Duration = Duration::from_secs(5);

type Session = CanvasSession<dyn DocumentStore>;

#[derive(Debug, Parser)]
#[command(
    name = "intercanvas",
    about = "Edit Interoperable Canvas overlays from the command line",
    version
)]
pub struct Cli {
    #[command(flatten)]
    pub target: TargetArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Which store and canvas to open.
#[derive(Debug, Args)]
pub struct TargetArgs {
    /// Local file store directory. Defaults to the user data directory.
    #[arg(long, conflicts_with = "remote")]
    pub data_dir: Option<PathBuf>,

    /// WebSocket URL of an intercanvas-server, e.g. ws://localhost:3030/ws.
    #[arg(long)]
    pub remote: Option<String>,

    /// Project name. Overrides the configured project.
    #[arg(long)]
    pub project: Option<String>,

    /// Child canvas of the project.
    #[arg(long)]
    pub child: Option<String>,

    /// Editor configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create a box and print its id.
    Add(AddArgs),

    /// Print every box as JSON.
    List,

    /// Print the layer stack, back to front, as JSON.
    Layers,

    /// Move a box. Its overlays follow.
    Move {
        id: String,
        #[arg(allow_negative_numbers = true)]
        x: i32,
        #[arg(allow_negative_numbers = true)]
        y: i32,
    },

    /// Set a box's geometry. Its overlays are rescaled.
    Resize {
        id: String,
        #[arg(allow_negative_numbers = true)]
        x: i32,
        #[arg(allow_negative_numbers = true)]
        y: i32,
        w: i32,
        h: i32,
    },

    /// Delete a box and its overlays.
    Delete { id: String },

    /// Move a layer one step toward the front.
    Up { id: String },

    /// Move a layer one step toward the back.
    Down { id: String },

    /// Move a layer to the front.
    Front { id: String },

    /// Move a layer directly above the background.
    Back { id: String },

    Rename { id: String, name: String },

    /// Place a Gardens report image with its link overlays.
    Report(ReportArgs),

    /// Re-align a placed report horizontally.
    Realign {
        id: String,
        #[arg(value_enum)]
        align: Align,
    },

    /// Set the canvas background.
    Background(BackgroundArgs),

    /// Set the canvas aspect ratio, e.g. 16:9.
    Aspect { ratio: String },
}

#[derive(Debug, Args)]
pub struct AddArgs {
    #[arg(allow_negative_numbers = true)]
    pub x: i32,
    #[arg(allow_negative_numbers = true)]
    pub y: i32,
    #[arg(long, default_value_t = 200)]
    pub w: i32,
    #[arg(long, default_value_t = 100)]
    pub h: i32,
    #[arg(long, group = "content")]
    pub text: Option<String>,
    #[arg(long, group = "content")]
    pub image: Option<String>,
    #[arg(long, group = "content")]
    pub link: Option<String>,
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Debug, Args)]
pub struct ReportArgs {
    /// JSON file describing the report image and its links.
    pub file: PathBuf,
    #[arg(long, default_value_t = 800)]
    pub width: i32,
    #[arg(long, value_enum, default_value_t = Align::Center)]
    pub align: Align,
    #[arg(long, default_value_t = 0)]
    pub top: i32,
}

#[derive(Debug, Args)]
pub struct BackgroundArgs {
    /// Fill color, or the first gradient stop.
    pub from: String,
    /// Second gradient stop. Makes the fill a linear gradient.
    #[arg(long)]
    pub to: Option<String>,
    /// Use a radial gradient instead of a linear one.
    #[arg(long, requires = "to")]
    pub radial: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Align {
    Left,
    Center,
    Right,
}

impl From<Align> for Alignment {
    fn from(align: Align) -> Self {
        match align {
            Align::Left => Alignment::Left,
            Align::Center => Alignment::Center,
            Align::Right => Alignment::Right,
        }
    }
}

/// Open the canvas, apply one command, persist the result.
/// Returns the text to print, if any.
pub fn run(cli: Cli) -> Result<Option<String>> {
    let config = match &cli.target.config {
        Some(path) => EditorConfig::load(path)?,
        None => EditorConfig::load_or_default()?,
    };
    let project = cli
        .target
        .project
        .clone()
        .unwrap_or_else(|| config.project.clone());
    let scope = match &cli.target.child {
        Some(child) => CanvasScope::child(project, child.clone())?,
        None => CanvasScope::root(project)?,
    };

    let store = open_store(&cli.target)?;
    let mut session: Session = CanvasSession::open(store, scope, config)?;
    if !session.wait_until_ready(LOAD_TIMEOUT) {
        return Err(AppError::NotReady(session.scope().to_string()));
    }

    let output = execute(&mut session, cli.command)?;

    session.close();
    let written = pollster::block_on(session.flush());
    log::debug!("Flushed {} writes", written);

    let notices = session.take_notices();
    for notice in &notices {
        log::error!("{}", notice);
    }
    if !notices.is_empty() {
        return Err(AppError::WritesFailed(notices.len()));
    }
    Ok(output)
}

fn open_store(target: &TargetArgs) -> Result<Arc<dyn DocumentStore>> {
    if let Some(url) = &target.remote {
        log::info!("Connecting to {}", url);
        return Ok(Arc::new(RemoteStore::connect(url)?));
    }
    let store = match &target.data_dir {
        Some(dir) => FileStore::new(dir.clone())?,
        None => FileStore::default_location()?,
    };
    log::info!("Using file store at {}", store.base_path().display());
    Ok(Arc::new(store))
}

fn execute(session: &mut Session, command: Commands) -> Result<Option<String>> {
    match command {
        Commands::Add(args) => {
            let content = if let Some(text) = args.text {
                BoxContent::text(text)
            } else if let Some(src) = args.image {
                BoxContent::image(src)
            } else if let Some(url) = args.link {
                BoxContent::link(url, true)
            } else {
                BoxContent::None
            };
            let id = session.add_box(BoxRect::new(args.x, args.y, args.w, args.h), content);
            if let Some(name) = args.name {
                session.rename(&id, name);
            }
            Ok(Some(id))
        }
        Commands::List => {
            let boxes: Vec<Value> = session
                .boxes()
                .boxes()
                .iter()
                .map(|b| Value::Object(box_to_fields(b)))
                .collect();
            Ok(Some(serde_json::to_string_pretty(&boxes)?))
        }
        Commands::Layers => {
            let layers: Vec<&Layer> = session.boxes().layers().iter().collect();
            Ok(Some(serde_json::to_string_pretty(&layers)?))
        }
        Commands::Move { id, x, y } => {
            require_box(session, &id)?;
            let changed = session.drag_stop(&id, x, y)?;
            Ok(Some(changed.join("\n")))
        }
        Commands::Resize { id, x, y, w, h } => {
            require_box(session, &id)?;
            let changed = session.resize_stop(&id, BoxRect::new(x, y, w, h))?;
            Ok(Some(changed.join("\n")))
        }
        Commands::Delete { id } => {
            let removed = session.delete(&id);
            if removed.is_empty() {
                return Err(AppError::UnknownBox(id));
            }
            Ok(Some(removed.join("\n")))
        }
        Commands::Up { id } => restack(session, id, Session::layer_up),
        Commands::Down { id } => restack(session, id, Session::layer_down),
        Commands::Front { id } => restack(session, id, Session::bring_to_front),
        Commands::Back { id } => restack(session, id, Session::send_to_back),
        Commands::Rename { id, name } => {
            if !session.rename(&id, name) {
                return Err(AppError::UnknownBox(id));
            }
            Ok(None)
        }
        Commands::Report(args) => {
            let json = std::fs::read_to_string(&args.file).map_err(|source| AppError::ReportRead {
                path: args.file.clone(),
                source,
            })?;
            let image: ReportImage =
                serde_json::from_str(&json).map_err(|source| AppError::ReportParse {
                    path: args.file.clone(),
                    source,
                })?;
            let placed = session.send_report(&image, args.width, args.align.into(), args.top)?;
            Ok(Some(placed.all_ids().join("\n")))
        }
        Commands::Realign { id, align } => {
            require_box(session, &id)?;
            let changed = session.realign(&id, align.into())?;
            Ok(Some(changed.join("\n")))
        }
        Commands::Background(args) => {
            let background = match args.to {
                None => Background::solid(args.from),
                Some(to) => Background {
                    mode: if args.radial {
                        BackgroundMode::Radial
                    } else {
                        BackgroundMode::Linear
                    },
                    from: args.from,
                    to,
                },
            };
            session.set_background(background);
            Ok(None)
        }
        Commands::Aspect { ratio } => {
            session.set_aspect(AspectRatio::parse(&ratio)?);
            Ok(Some(format!("Canvas height: {}", session.canvas_height())))
        }
    }
}

fn require_box(session: &Session, id: &str) -> Result<()> {
    match session.boxes().get(id) {
        Some(_) => Ok(()),
        None => Err(AppError::UnknownBox(id.to_string())),
    }
}

/// Apply a layer move and print the layer's new z-index.
fn restack(
    session: &mut Session,
    id: String,
    op: fn(&mut Session, &str) -> bool,
) -> Result<Option<String>> {
    let Some(before) = session.boxes().layers().z_of(&id) else {
        return Err(AppError::UnknownBox(id));
    };
    let z = if op(session, &id) {
        session.boxes().layers().z_of(&id).unwrap_or(before)
    } else {
        before
    };
    Ok(Some(z.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cli(dir: &TempDir, args: &[&str]) -> Cli {
        let data_dir = dir.path().to_string_lossy().to_string();
        let mut argv = vec!["intercanvas", "--data-dir", data_dir.as_str(), "--project", "p"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_parse_negative_coordinates() {
        let cli = Cli::try_parse_from(["intercanvas", "move", "box_1", "-10", "20"]).unwrap();
        match cli.command {
            Commands::Move { id, x, y } => assert_eq!((id.as_str(), x, y), ("box_1", -10, 20)),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_data_dir_conflicts_with_remote() {
        let parsed = Cli::try_parse_from([
            "intercanvas",
            "--data-dir",
            "/tmp/x",
            "--remote",
            "ws://localhost:3030/ws",
            "list",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_add_content_flags_are_exclusive() {
        let parsed =
            Cli::try_parse_from(["intercanvas", "add", "0", "0", "--text", "a", "--link", "b"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_add_then_list_persists() {
        let dir = TempDir::new().unwrap();
        let id = run(cli(&dir, &["add", "10", "20", "--text", "hello"]))
            .unwrap()
            .unwrap();

        let store = FileStore::new(dir.path().to_path_buf()).unwrap();
        let docs = pollster::block_on(store.list("interoperable-canvas/p/overlay")).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id(), id);

        let listed = run(cli(&dir, &["list"])).unwrap().unwrap();
        let boxes: Vec<Value> = serde_json::from_str(&listed).unwrap();
        assert_eq!(boxes[0]["text"], Value::from("hello"));
        assert_eq!(boxes[0]["x"], Value::from(10));
    }

    #[test]
    fn test_layer_order_is_written_on_exit() {
        let dir = TempDir::new().unwrap();
        let a = run(cli(&dir, &["add", "0", "0"])).unwrap().unwrap();
        let b = run(cli(&dir, &["add", "0", "0"])).unwrap().unwrap();

        let z = run(cli(&dir, &["front", a.as_str()])).unwrap().unwrap();
        assert_eq!(z, "2");

        let store = FileStore::new(dir.path().to_path_buf()).unwrap();
        let doc = pollster::block_on(store.get("interoperable-canvas/p")).unwrap();
        assert_eq!(
            doc.fields.get("layers"),
            Some(&serde_json::json!(["background", b, a]))
        );
    }

    #[test]
    fn test_unknown_box_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = run(cli(&dir, &["delete", "nope"]));
        assert!(matches!(result, Err(AppError::UnknownBox(id)) if id == "nope"));
    }
}
