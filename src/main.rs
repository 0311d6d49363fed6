use clap::{ArgAction, Parser, Subcommand};
use liquid_flickr::authors::Author;
use liquid_flickr::config::{self, Settings};
use liquid_flickr::flickr::FlickrSession;
use liquid_flickr::gallery::GalleryTag;
use liquid_flickr::hooks::{AuthorInitHook, AuthorPatcher, GeneratorContext, TagRegistry};
use liquid_flickr::{expand, output};
use std::path::PathBuf;
use std::rc::Rc;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "liquid-flickr")]
#[command(about = "Flickr gallery tags and author metadata for static sites")]
#[command(long_about = "\
Flickr gallery tags and author metadata for static sites

Gallery tags embed a Flickr photoset in markdown:

  {% gallery \"christmas market\" %}
  {% gallery \"christmas market\" [\"Mulled wine\", \"Carousel\"] %}

The quoted title is a case-insensitive pattern matched against your
photoset titles; the shortest matching title wins. The optional list keeps
only the named photos, in photoset order.

Credentials come from settings.toml or the environment:

  FLICKR_API_KEY, FLICKR_API_SECRET, FLICKR_USERNAME

Run 'liquid-flickr gen-config' to generate a documented settings.toml.")]
#[command(version)]
struct Cli {
    /// Settings file
    #[arg(long, default_value = "settings.toml", global = true)]
    settings: PathBuf,

    /// Bypass the Flickr response cache
    #[arg(long, global = true)]
    no_cache: bool,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render one gallery tag's markup to HTML
    Render {
        /// Tag markup, e.g. '"christmas market" ["Carousel"]'
        markup: String,
    },
    /// Expand tags in a markdown file or every .md file under a directory
    Expand {
        /// Markdown file or directory
        source: PathBuf,
        /// Output directory
        #[arg(long, default_value = "dist")]
        output: PathBuf,
        /// Render expanded markdown to HTML
        #[arg(long)]
        html: bool,
    },
    /// Show author attributes after supplementing from AUTHORS
    Authors {
        /// Author names as they appear in content
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Print a stock settings.toml with all options documented
    GenConfig,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn registry(session: &Rc<FlickrSession>) -> TagRegistry {
    let mut registry = TagRegistry::new();
    registry.register(Box::new(GalleryTag::flickr(Rc::clone(session))));
    registry
}

fn session(settings: &Settings, use_cache: bool) -> Rc<FlickrSession> {
    Rc::new(FlickrSession::new(settings.client_options(use_cache)))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Render { markup } => {
            let settings = config::load_settings_with_env(&cli.settings)?;
            let session = session(&settings, !cli.no_cache);
            let html = registry(&session).on_tag("gallery", &markup, &settings)?;
            println!("{}", html);
            if let Some(summary) = session.cache_summary() {
                eprintln!("Cache: {}", summary);
            }
        }
        Command::Expand {
            source,
            output: out_dir,
            html,
        } => {
            let settings = config::load_settings_with_env(&cli.settings)?;
            let session = session(&settings, !cli.no_cache);
            let files =
                expand::expand_path(&source, &out_dir, &registry(&session), &settings, html)?;
            output::print_expand_output(&files);
            if let Some(summary) = session.cache_summary() {
                println!("Cache: {}", summary);
            }
        }
        Command::Authors { names } => {
            let settings = config::load_settings_with_env(&cli.settings)?;
            for name in names {
                let mut author = Author::new(name);
                AuthorPatcher.on_author_init(&mut GeneratorContext {
                    settings: &settings,
                    author: &mut author,
                })?;
                output::print_author(&author);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_settings_toml());
        }
    }

    Ok(())
}
