use caniuse_embed_core::catalog::{CatalogClient, CatalogConfig, CatalogEntry};
use caniuse_embed_core::embed::{self, EmbedConfig, Loading, Theme, DEFAULT_ORIGIN};
use caniuse_embed_core::host::{self, DemoHost, HostConfig};
use caniuse_embed_core::select::{SelectConfig, SelectState};
use caniuse_embed_core::{protocol, Window};
use clap::{Args, Parser, Subcommand};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "caniuse-embed", about = "caniuse embed element toolkit")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the iframe source URL for an embed
    Url(EmbedArgs),
    /// Print the rendered embed element markup
    Render(EmbedArgs),
    /// Print the embed code for a page
    Snippet {
        #[command(flatten)]
        embed: EmbedArgs,

        /// Also print the script tag loading embed.js from this base URL
        #[arg(long)]
        script_base: Option<String>,
    },
    /// Decode a height message posted by an embed iframe (use - for stdin)
    Decode {
        message: String,
    },
    /// Fetch the feature catalog and list matching entries
    Features {
        /// Embed service origin
        #[arg(long, default_value = DEFAULT_ORIGIN)]
        origin: String,

        /// Case-insensitive filter over label and value
        #[arg(long)]
        search: Option<String>,

        /// Output as JSON instead of one entry per line
        #[arg(long)]
        json: bool,

        /// Request timeout in seconds
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },
    /// Render the demo page once the catalog has loaded
    Demo {
        /// Embed service origin
        #[arg(long, default_value = DEFAULT_ORIGIN)]
        origin: String,

        /// Preselect this feature in the live demo
        #[arg(long)]
        feature: Option<String>,

        /// How long to wait for the catalog
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },
}

#[derive(Args)]
struct EmbedArgs {
    /// caniuse feature id, e.g. css-grid
    #[arg(long, default_value = "")]
    feature: String,

    /// Past major versions to show (0-5)
    #[arg(long, default_value_t = embed::DEFAULT_PAST, allow_negative_numbers = true)]
    past: i64,

    /// Future major versions to show (0-3)
    #[arg(long, default_value_t = embed::DEFAULT_FUTURE, allow_negative_numbers = true)]
    future: i64,

    /// Embed service origin
    #[arg(long, default_value = DEFAULT_ORIGIN)]
    origin: String,

    /// auto, light or dark
    #[arg(long, default_value = "auto")]
    theme: String,

    /// eager or lazy
    #[arg(long, default_value = "lazy")]
    loading: String,

    /// Correlation token (generated when omitted)
    #[arg(long)]
    meta: Option<String>,

    /// Show the baseline status
    #[arg(long)]
    baseline: bool,
}

impl EmbedArgs {
    fn into_config(self) -> Result<EmbedConfig, embed::ConfigError> {
        let theme: Theme = self.theme.parse()?;
        let loading: Loading = self.loading.parse()?;
        let mut config = EmbedConfig {
            feature: self.feature,
            past: self.past,
            future: self.future,
            origin: self.origin,
            theme,
            loading,
            baseline: self.baseline,
            ..Default::default()
        };
        if let Some(meta) = self.meta {
            config.meta = meta;
        }
        Ok(config)
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli.command) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Url(args) => {
            let config = args.into_config()?;
            match embed::build_source(&config) {
                Some(src) => println!("{}", src),
                None => return Err("no feature given; the element would show its placeholder".into()),
            }
        }
        Commands::Render(args) => {
            let config = args.into_config()?;
            println!("{}", caniuse_embed_core::render_embed(config));
        }
        Commands::Snippet { embed, script_base } => {
            let config = embed.into_config()?;
            if let Some(base) = script_base {
                println!("{}", host::script_snippet(&base));
            }
            println!("{}", host::embed_code(&config));
        }
        Commands::Decode { message } => {
            let raw = if message == "-" {
                use std::io::Read;
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                buf
            } else {
                message
            };
            let update = protocol::classify(&serde_json::Value::String(raw))?;
            println!("{}", serde_json::to_string_pretty(&update)?);
        }
        Commands::Features {
            origin,
            search,
            json,
            timeout_secs,
        } => {
            let client = CatalogClient::with_config(CatalogConfig {
                timeout_secs,
                ..Default::default()
            })?;
            let entries = client.load(&origin)?;
            let mut state = SelectState::with_catalog(SelectConfig::default(), entries.into());
            if let Some(term) = search {
                state.set_search_term(&term);
            }
            let matches: Vec<&CatalogEntry> = state.filtered().collect();
            print_entries(&matches, json)?;
        }
        Commands::Demo {
            origin,
            feature,
            timeout_secs,
        } => {
            let window = Window::new();
            let config = HostConfig {
                origin,
                ..Default::default()
            };
            let mut host = DemoHost::start(config, &window)?;
            if !host.wait_for_catalog(Duration::from_secs(timeout_secs)) {
                tracing::warn!(timeout_secs, "catalog not loaded; rendering without it");
            }
            if let Some(feature) = feature {
                host.click_option(&feature);
            }
            println!("{}", host.render().to_html());
        }
    }
    Ok(())
}

fn print_entries(entries: &[&CatalogEntry], as_json: bool) -> Result<(), serde_json::Error> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(entries)?);
    } else if entries.is_empty() {
        println!("no results");
    } else {
        for entry in entries {
            println!("{}\t{}", entry.value, entry.label_text());
        }
    }
    Ok(())
}
