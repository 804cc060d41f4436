use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use provviz::config::CanvasConfig;
use provviz::force::{ALPHA_MIN, ForceSimulation};
use provviz::geometry::LayoutResult;
use provviz::graph::Graph;
use provviz::io::{FormatRegistry, load_graph};
use provviz::ticker::{SimulationHandle, TickUpdate};
use provviz::{flow, force};

/// Lay out provenance graphs as flow and force diagrams.
#[derive(Parser)]
#[command(name = "provviz")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render both views as SVG plus their geometry as JSON
    Render {
        /// Input graph document (.json, .yaml)
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Canvas configuration file (.yaml, .json)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the geometry of one view as JSON
    Layout {
        /// Input graph document (.json, .yaml)
        #[arg(short, long)]
        input: PathBuf,

        #[arg(long, value_enum, default_value_t = View::Flow)]
        view: View,

        /// Canvas configuration file (.yaml, .json)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Run the force simulation live, printing one JSON line per tick until
    /// it settles
    Simulate {
        /// Input graph document (.json, .yaml)
        #[arg(short, long)]
        input: PathBuf,

        /// Canvas configuration file (.yaml, .json)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum View {
    Flow,
    Force,
}

fn load(input: &Path, config: Option<&Path>) -> anyhow::Result<(Graph, CanvasConfig)> {
    let config = match config {
        Some(path) => CanvasConfig::from_path(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => CanvasConfig::default(),
    };
    let graph = load_graph(input).with_context(|| format!("loading graph {}", input.display()))?;
    Ok((graph, config))
}

fn layout(graph: &Graph, config: &CanvasConfig, view: View) -> LayoutResult {
    match view {
        View::Flow => flow::layout(graph, config),
        View::Force => force::layout(graph, config),
    }
}

fn render(input: &Path, output: &Path, config: Option<&Path>) -> anyhow::Result<()> {
    let (graph, config) = load(input, config)?;
    fs::create_dir_all(output)?;

    let registry = FormatRegistry::with_defaults();
    let sankey = layout(&graph, &config, View::Flow);
    let force = layout(&graph, &config, View::Force);

    registry.write("svg", &sankey, &output.join("sankey.svg"))?;
    registry.write("svg", &force, &output.join("force.svg"))?;

    let geometry = serde_json::json!({ "flow": sankey, "force": force });
    fs::write(
        output.join("geometry.json"),
        serde_json::to_string_pretty(&geometry)?,
    )?;

    info!(
        nodes = graph.nodes().len(),
        links = graph.links().len(),
        output = %output.display(),
        "rendered sankey.svg, force.svg and geometry.json"
    );
    Ok(())
}

async fn simulate(input: &Path, config: Option<&Path>) -> anyhow::Result<()> {
    let (graph, config) = load(input, config)?;
    let (tx, mut rx) = mpsc::unbounded_channel::<TickUpdate>();

    let handle = SimulationHandle::spawn(
        ForceSimulation::new(&graph, &config),
        config.tick_rate,
        move |update| {
            // The receiver only goes away once we are shutting down
            let _ = tx.send(update.clone());
        },
    );

    while let Some(update) = rx.recv().await {
        println!("{}", serde_json::to_string(&update.positions)?);
        if update.alpha < ALPHA_MIN {
            info!(ticks = update.tick, "simulation settled");
            break;
        }
    }
    handle.stop();
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            input,
            output,
            config,
        } => render(&input, &output, config.as_deref())?,
        Commands::Layout {
            input,
            view,
            config,
        } => {
            let (graph, config) = load(&input, config.as_deref())?;
            let result = layout(&graph, &config, view);
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Simulate { input, config } => simulate(&input, config.as_deref()).await?,
    }

    Ok(())
}
