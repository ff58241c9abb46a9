use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ticketd::models::{AppConfig, AttributeMap, SceneDocument};
use ticketd::server;
use ticketd::services::{Compositor, RenderOptions};

#[derive(Parser)]
#[command(name = "ticketd")]
#[command(about = "Ticket and label template renderer")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve,
    /// Render a scene directly to a JPEG file
    Render {
        /// Scene document (JSON)
        #[arg(short, long)]
        scene: PathBuf,

        /// Attribute map (JSON)
        #[arg(short, long)]
        attributes: Option<PathBuf>,

        /// Output JPEG file path
        #[arg(short, long)]
        output: PathBuf,

        /// Also write a one-page PDF here
        #[arg(long)]
        pdf: Option<PathBuf>,

        /// JPEG quality, 0.0 to 1.0 (overrides config)
        #[arg(short, long)]
        quality: Option<f32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Render {
            scene,
            attributes,
            output,
            pdf,
            quality,
        }) => run_render_command(&scene, attributes.as_deref(), &output, pdf.as_deref(), quality).await,
        Some(Commands::Serve) => run_server().await,
        None => {
            run_status_command();
            Ok(())
        }
    }
}

/// Render a scene to files (no server needed)
async fn run_render_command(
    scene_path: &Path,
    attributes_path: Option<&Path>,
    output: &Path,
    pdf_output: Option<&Path>,
    quality: Option<f32>,
) -> anyhow::Result<()> {
    // Minimal logging for CLI
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ticketd=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let mut config = AppConfig::from_env();
    if let Some(q) = quality {
        config.jpeg_quality = q.clamp(0.0, 1.0);
    }

    let scene_json = std::fs::read_to_string(scene_path)?;
    let scene = SceneDocument::from_value(serde_json::from_str(&scene_json)?)
        .map_err(|e| anyhow::anyhow!("Invalid scene {}: {e}", scene_path.display()))?;
    let attributes = match attributes_path {
        Some(path) => AttributeMap::from_json_str(&std::fs::read_to_string(path)?)
            .map_err(|e| anyhow::anyhow!("Invalid attributes {}: {e}", path.display()))?,
        None => AttributeMap::default(),
    };

    let compositor = Compositor::from_config(&config)?;
    let options = RenderOptions {
        emit_pdf: pdf_output.is_some(),
        rasterize_to_file: false,
    };
    let rendered = compositor.render(&scene, &attributes, options).await?;

    for warning in &rendered.warnings {
        eprintln!(
            "warning: object {} ({}): {}",
            warning.node_index, warning.source, warning.message
        );
    }

    std::fs::write(output, &rendered.jpeg)?;
    println!("Rendered {} ({} bytes)", output.display(), rendered.jpeg.len());

    if let (Some(path), Some(pdf)) = (pdf_output, &rendered.pdf) {
        std::fs::write(path, pdf)?;
        println!("Wrote {} ({} bytes)", path.display(), pdf.len());
    }

    Ok(())
}

fn run_status_command() {
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    let config_file = std::env::var("CONFIG_FILE").ok();
    let config = AppConfig::from_env();

    println!("ticketd v{VERSION}");
    println!("Ticket and label template renderer\n");

    println!("Environment Variables:");
    for key in ["BIND_ADDR", "CONFIG_FILE", "ASSETS_DIR", "WORK_DIR", "STATIC_DIR", "FONTS_DIR"] {
        let value = std::env::var(key).ok();
        println!("  {key:<11} = {}", value.as_deref().unwrap_or("(not set)"));
    }

    println!("\nResolved Settings:");
    println!(
        "  Config:  {}",
        match &config_file {
            Some(path) if Path::new(path).exists() => path.clone(),
            Some(_) => "defaults (file not found)".to_string(),
            None => "defaults".to_string(),
        }
    );
    println!("  Listen:  {}", config.bind_addr);
    println!("  Assets:  {}", describe_dir(&config.assets_dir));
    println!("  Work:    {}", describe_dir(&config.work_dir));
    println!(
        "  Static:  {}",
        config
            .static_dir
            .as_deref()
            .map(describe_dir)
            .unwrap_or_else(|| "(disabled)".to_string())
    );
    println!(
        "  Fonts:   {}",
        config
            .fonts_dir
            .as_deref()
            .map(describe_dir)
            .unwrap_or_else(|| "system only".to_string())
    );
    println!("  Quality: {}", config.jpeg_quality);

    println!("\nCommands:");
    println!("  ticketd serve    Start the HTTP server");
    println!("  ticketd render   Render a scene to a JPEG file");
    println!("\nRun 'ticketd --help' for more details.");
}

fn describe_dir(path: &Path) -> String {
    if path.is_dir() {
        path.display().to_string()
    } else {
        format!("{} (missing)", path.display())
    }
}

/// Run the HTTP server
async fn run_server() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ticketd=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();
    let bind_addr = config.bind_addr.clone();

    tracing::info!(
        assets = %config.assets_dir.display(),
        work = %config.work_dir.display(),
        static_dir = ?config.static_dir.as_ref().map(|p| p.display().to_string()),
        origins = ?config.allowed_origins,
        "Configuration loaded"
    );

    let state = server::create_app_state(config)?;
    let app = server::build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "ticketd listening");

    axum::serve(listener, app).await?;

    Ok(())
}
