use anyhow::{bail, Context};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;
use storemark::api::StorefrontClient;
use storemark::config::Config;
use storemark::watermark::{WatermarkOptions, WatermarkPipeline, WatermarkPosition};

/// Storemark - stamp the shop's brand onto listing images
#[derive(Parser, Debug)]
#[command(name = "storemark")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watermark one image and print it as a data URI
    Image {
        /// Image URL, path or data URI
        source: String,
        #[command(flatten)]
        style: StyleArgs,
    },
    /// Watermark one image and save it to the download directory
    Download {
        source: String,
        /// File name to save as (default: watermarked-<unix millis>.png)
        #[arg(short, long)]
        filename: Option<String>,
        /// Download directory, overriding `download.directory`
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        #[command(flatten)]
        style: StyleArgs,
    },
    /// Watermark several images and print one data URI per line, in order
    Batch {
        #[arg(required = true)]
        sources: Vec<String>,
        /// Maximum images processed at once
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,
        #[command(flatten)]
        style: StyleArgs,
    },
    /// Fetch a CODM account listing and watermark its images
    Listing {
        /// Account id
        id: u64,
        #[command(flatten)]
        style: StyleArgs,
    },
}

/// Per-call overrides of the configured watermark style.
#[derive(ClapArgs, Debug, Default)]
struct StyleArgs {
    #[arg(long)]
    text: Option<String>,
    /// lowerRight, lowerLeft, upperRight, upperLeft or center
    #[arg(long)]
    position: Option<WatermarkPosition>,
    /// e.g. 48px
    #[arg(long)]
    font_size: Option<String>,
    #[arg(long)]
    font_family: Option<String>,
    #[arg(long)]
    color: Option<String>,
    #[arg(long)]
    opacity: Option<f32>,
    #[arg(long)]
    margin: Option<u32>,
}

impl StyleArgs {
    fn into_options(self) -> WatermarkOptions {
        WatermarkOptions {
            text: self.text,
            position: self.position,
            font_size: self.font_size,
            font_family: self.font_family,
            color: self.color,
            opacity: self.opacity,
            margin: self.margin,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };

    let logging = storemark::logging::with_overrides(&config.logging, args.verbose, args.json_logs);
    storemark::logging::init_subscriber(&logging)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging subsystem: {}", e))?;

    match &args.command {
        Command::Download {
            output_dir: Some(dir),
            ..
        } => config.download.directory = Some(dir.clone()),
        Command::Batch {
            concurrency: Some(limit),
            ..
        } => config.batch.max_concurrency = Some(*limit),
        _ => {}
    }

    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("Invalid configuration")?;

    tracing::info!(
        config_file = ?args.config,
        position = %config.watermark.position,
        output_format = ?config.output.format,
        download_dir = ?config.download.directory,
        max_concurrency = ?config.batch.max_concurrency,
        "Configuration loaded successfully"
    );

    let pipeline = WatermarkPipeline::from_config(&config)?;

    match args.command {
        Command::Image { source, style } => {
            let image = pipeline
                .watermark_image(&source, &style.into_options())
                .await?;
            println!("{}", image.data_uri());
        }
        Command::Download {
            source,
            filename,
            style,
            ..
        } => {
            let result = pipeline
                .watermark_and_download(&source, &style.into_options(), filename.as_deref())
                .await?;
            match result.saved {
                Ok(path) => println!("{}", path.display()),
                Err(e) => bail!("Watermarked '{}' but could not save it: {}", result.filename, e),
            }
        }
        Command::Batch { sources, style, .. } => {
            let images = pipeline
                .watermark_batch(&sources, &style.into_options())
                .await?;
            for image in images {
                println!("{}", image.data_uri());
            }
        }
        Command::Listing { id, style } => {
            let client = StorefrontClient::new(&config.api)?;
            let account = client.get_codm_account_info(id).await?;
            tracing::info!(
                id = account.id,
                serial_number = %account.serial_number,
                images = account.images.len(),
                listed = account.is_listed(),
                "Fetched account listing"
            );

            let images = pipeline
                .watermark_batch(&account.images, &style.into_options())
                .await?;
            for image in images {
                println!("{}", image.data_uri());
            }
        }
    }

    Ok(())
}
