use clap::{Parser, Subcommand};
use landing_press::config::{self, CONFIG_FILENAME};
use landing_press::fragments::{TrackingUpdate, TrackingValues};
use landing_press::identifier::Identifier;
use landing_press::output;
use landing_press::publish::{CreateRequest, Publisher, SourceDocument, UpdateRequest};
use landing_press::records::{ContactDetails, ContactUpdate, ListFilter};
use landing_press::status::Status;
use landing_press::store::Asset;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Tracking and contact values shared by `publish` and `update`.
#[derive(clap::Args, Clone)]
struct ValueArgs {
    /// Agent responsible for the page
    #[arg(long)]
    agent: Option<String>,
    /// Analytics snippet injected into <head>
    #[arg(long)]
    global_site_tag: Option<String>,
    #[arg(long)]
    phone_tracking: Option<String>,
    #[arg(long)]
    zalo_tracking: Option<String>,
    #[arg(long)]
    form_tracking: Option<String>,
    #[arg(long)]
    hotline_phone: Option<String>,
    #[arg(long)]
    zalo_phone: Option<String>,
    #[arg(long)]
    google_form_link: Option<String>,
    /// Image uploaded next to the page (repeatable)
    #[arg(long = "image", value_name = "PATH")]
    images: Vec<PathBuf>,
}

impl ValueArgs {
    fn tracking(&self) -> TrackingUpdate {
        TrackingUpdate {
            global_site_tag: self.global_site_tag.clone(),
            phone_tracking: self.phone_tracking.clone(),
            zalo_tracking: self.zalo_tracking.clone(),
            form_tracking: self.form_tracking.clone(),
        }
    }

    fn contact(&self) -> ContactUpdate {
        ContactUpdate {
            hotline_phone: self.hotline_phone.clone(),
            zalo_phone: self.zalo_phone.clone(),
            google_form_link: self.google_form_link.clone(),
        }
    }

    fn assets(&self) -> std::io::Result<Vec<Asset>> {
        self.images
            .iter()
            .map(|path| {
                Ok(Asset {
                    original_name: file_name(path),
                    content: std::fs::read(path)?,
                })
            })
            .collect()
    }
}

#[derive(Parser)]
#[command(name = "landing-press")]
#[command(about = "Publish landing pages with injected tracking snippets")]
#[command(long_about = "\
Publish landing pages with injected tracking snippets

Every page lives in its own directory under the published root:

  published/
  └── promo-2024/
      ├── index.html          # Served to visitors
      ├── index.paused.html   # Original, present only while paused
      └── anh1.jpg            # Uploaded images

Tracking blocks go to <!-- TRACKING_HEAD --> / <!-- TRACKING_BODY --> when
the page has them, otherwise right before </head> and </body>. Republishing
replaces the earlier blocks instead of adding new ones.

Run 'landing-press gen-config' to generate a documented landing-press.toml.")]
#[command(version)]
struct Cli {
    /// Config file
    #[arg(long, default_value = CONFIG_FILENAME, global = true)]
    config: PathBuf,

    /// Published root (overrides the config file)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(long, short, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Publish a new landing page
    Publish {
        identifier: String,
        /// HTML document to publish
        #[arg(long)]
        file: PathBuf,
        #[command(flatten)]
        values: ValueArgs,
    },
    /// Change values and/or the document of a published page
    Update {
        identifier: String,
        /// Replacement HTML document; without it the stored page is re-injected
        #[arg(long)]
        file: Option<PathBuf>,
        #[command(flatten)]
        values: ValueArgs,
    },
    /// Set a page to active or paused
    Status { identifier: String, status: String },
    /// Show the record of a page
    Show { identifier: String },
    /// List pages, newest first
    List {
        #[arg(long)]
        agent: Option<String>,
        #[arg(long)]
        status: Option<Status>,
        /// Substring of the identifier
        #[arg(long)]
        query: Option<String>,
    },
    /// Remove a page and its record
    Delete { identifier: String },
    /// Adopt a page directory that already exists on disk
    Register {
        identifier: String,
        #[arg(long, default_value = "")]
        agent: String,
        #[arg(long, default_value = "index.html")]
        original_filename: String,
    },
    /// Print what a visitor receives for a page, or the path of one of its assets
    Serve {
        identifier: String,
        asset: Option<String>,
    },
    /// Re-inject every active page with its stored values
    Refresh,
    /// Repair pages left half-paused by an interrupted pause
    Recover,
    /// Print a stock landing-press.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let mut press_config = config::load_config(&cli.config)?;
    if let Some(root) = cli.root {
        press_config.published_root = root;
    }
    let publisher = Publisher::open(&press_config)?;

    match cli.command {
        Command::Publish {
            identifier,
            file,
            values,
        } => {
            let request = CreateRequest {
                identifier,
                source: read_source(&file)?,
                agent: values.agent.clone().unwrap_or_default(),
                tracking: TrackingValues::default().merged(&values.tracking()),
                contact: ContactDetails::default().merged(&values.contact()),
                assets: values.assets()?,
            };
            output::print_published("Published", &publisher.create(request)?);
        }
        Command::Update {
            identifier,
            file,
            values,
        } => {
            let request = UpdateRequest {
                source: file.as_deref().map(read_source).transpose()?,
                agent: values.agent.clone(),
                tracking: values.tracking(),
                contact: values.contact(),
                assets: values.assets()?,
            };
            output::print_published("Updated", &publisher.update(&identifier, request)?);
        }
        Command::Status { identifier, status } => {
            output::print_status_change(&publisher.set_status(&identifier, &status)?);
        }
        Command::Show { identifier } => {
            output::print_record(&publisher.get(&identifier)?);
        }
        Command::List {
            agent,
            status,
            query,
        } => {
            let filter = ListFilter {
                agent,
                status,
                query,
            };
            output::print_list(&publisher.list(&filter)?);
        }
        Command::Delete { identifier } => {
            publisher.delete(&identifier)?;
            println!("Deleted {}", Identifier::normalize(&identifier)?);
        }
        Command::Register {
            identifier,
            agent,
            original_filename,
        } => {
            output::print_record(&publisher.register(&identifier, &agent, &original_filename)?);
        }
        Command::Serve { identifier, asset } => match asset {
            Some(relative) => {
                println!("{}", publisher.asset(&identifier, &relative)?.display());
            }
            None => {
                let response = publisher.respond(&identifier)?;
                print!("{}", response.body);
                if response.status != 200 {
                    return Err(format!("HTTP {}", response.status).into());
                }
            }
        },
        Command::Refresh => {
            output::print_refresh(&publisher.refresh()?);
        }
        Command::Recover => {
            output::print_recovered(&publisher.recover()?);
        }
        // Printed before the config was loaded.
        Command::GenConfig => {}
    }

    Ok(())
}

/// Log to stderr; `RUST_LOG` wins over the default level.
fn init_tracing(quiet: bool) {
    let default = if quiet {
        "landing_press=warn"
    } else {
        "landing_press=info"
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .init();
}

fn read_source(path: &Path) -> std::io::Result<SourceDocument> {
    Ok(SourceDocument {
        filename: file_name(path),
        html: String::from_utf8_lossy(&std::fs::read(path)?).into_owned(),
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
