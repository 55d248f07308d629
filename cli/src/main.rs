//! authgraph CLI: interactive authentication shell
//!
//! Loads a reference dataset directory, then answers questions about the
//! painting under examination while the evidence graph grows.

use anyhow::{bail, Context, Result};
use authgraph::graph::NodeId;
use authgraph::{
    AuthSession, QuestionOutcome, QuestionRequest, ReferenceStore, SelectedItem, SessionConfig,
    SimilarityRange,
};
use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "authgraph", version, about = "Painting authentication knowledge graph")]
struct Cli {
    /// Reference dataset directory
    #[arg(long, default_value = "data", global = true, env = "AUTHGRAPH_DATA")]
    data: PathBuf,

    /// Session config (YAML)
    #[arg(long, global = true, env = "AUTHGRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask one question and print the resulting graph
    Ask {
        question: String,

        /// Painting under examination
        #[arg(long)]
        painting: Option<String>,
    },
    /// List the query templates
    Templates,
    /// Start an interactive REPL
    Shell {
        /// Painting to open on start
        #[arg(long)]
        painting: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => SessionConfig::from_yaml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SessionConfig::default(),
    };
    config.apply_env();

    let refs = ReferenceStore::load_dir(&cli.data)
        .with_context(|| format!("loading dataset {}", cli.data.display()))?;
    info!("Loaded {} paintings", refs.painting_count());
    let mut session = AuthSession::from_config(Arc::new(refs), config)?;

    match cli.command {
        Some(Commands::Ask { question, painting }) => {
            let mut request = QuestionRequest::new(question);
            if let Some(painting) = painting {
                session.focus_painting(&painting)?;
                request = request.with_painting(painting);
            }
            let outcome = session.submit_question(request).await?;
            print_outcome(&outcome, cli.format)?;
            print_graph(&session, cli.format)?;
        }
        Some(Commands::Templates) => print_templates(&session, cli.format)?,
        Some(Commands::Shell { painting }) => run_shell(&mut session, painting, cli.format).await?,
        None => run_shell(&mut session, None, cli.format).await?,
    }
    Ok(())
}

/// Selection and painting held between questions
#[derive(Default)]
struct ShellState {
    painting: Option<String>,
    selection: Vec<SelectedItem>,
    range: Option<SimilarityRange>,
}

impl ShellState {
    fn request(&self, text: &str) -> QuestionRequest {
        QuestionRequest {
            text: text.to_string(),
            current_painting: self.painting.clone(),
            selection: self.selection.clone(),
            similarity_range: self.range,
        }
    }
}

const HELP: &str = "Commands:
  /paint <id>               Open a painting
  /seal <code>              Select a seal
  /segment <image> <path>   Select a segment
  /clear-selection          Drop the selection
  /range <min> <max>        Segment similarity window
  /graph                    Show the graph
  /history                  Show the question history
  /undo                     Undo the last question
  /remove <id> [page]       Remove a node or one similarity page
  /run <template>           Run a template directly
  /templates                List templates
  /reset                    Start over
  /quit                     Exit
  <question>                Ask a question";

async fn run_shell(
    session: &mut AuthSession,
    painting: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    println!("authgraph interactive shell");
    println!("Ask a question, or /help for commands. /quit to exit.\n");

    let mut state = ShellState::default();
    if let Some(painting) = painting {
        session.focus_painting(&painting)?;
        state.painting = Some(painting);
    }

    let stdin = std::io::stdin();
    let mut line = String::new();

    loop {
        eprint!("authgraph> ");

        line.clear();
        if stdin.read_line(&mut line)? == 0 {
            break; // EOF
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let result = if trimmed.starts_with('/') {
            match run_command(session, &mut state, trimmed, format).await {
                Ok(true) => break,
                Ok(false) => Ok(()),
                Err(e) => Err(e),
            }
        } else {
            match session.submit_question(state.request(trimmed)).await {
                Ok(outcome) => print_outcome(&outcome, format),
                Err(e) => Err(e.into()),
            }
        };
        if let Err(e) = result {
            eprintln!("Error: {:#}", e);
        }
    }

    println!("Bye!");
    Ok(())
}

/// Returns true when the shell should exit
async fn run_command(
    session: &mut AuthSession,
    state: &mut ShellState,
    line: &str,
    format: OutputFormat,
) -> Result<bool> {
    let mut parts = line.split_whitespace();
    let command = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();

    match (command, args.as_slice()) {
        ("/quit" | "/exit" | "/q", _) => return Ok(true),
        ("/help" | "/h", _) => println!("{}", HELP),
        ("/paint", [id]) => {
            let added = session.focus_painting(id)?;
            state.painting = Some(id.to_string());
            println!("Opened {} ({})", added.node.label, added.node.id);
        }
        ("/seal", [code]) => {
            state.selection.push(SelectedItem::seal(*code));
            println!("{} item(s) selected", state.selection.len());
        }
        ("/segment", [image, path]) => {
            state.selection.push(SelectedItem::segment(*image, *path));
            println!("{} item(s) selected", state.selection.len());
        }
        ("/clear-selection", _) => {
            state.selection.clear();
            println!("Selection cleared");
        }
        ("/range", [min, max]) => {
            let range = SimilarityRange::new(min.parse()?, max.parse()?);
            if !range.is_well_formed() {
                bail!("invalid similarity window {}-{}", range.min, range.max);
            }
            state.range = Some(range);
            println!("Similarity window {:.2}-{:.2}", range.min, range.max);
        }
        ("/graph", _) => print_graph(session, format)?,
        ("/history", _) => print_history(session, format)?,
        ("/undo", _) => {
            let report = session.undo_last()?;
            println!(
                "Undid \"{}\": {} node(s), {} page(s) removed",
                report.record.question,
                report.removed_nodes.len(),
                report.removed_pages
            );
        }
        ("/remove", [id]) => {
            session.remove_node_record(&NodeId::new(*id), None)?;
            println!("Removed {}", id);
        }
        ("/remove", [id, page]) => {
            let page: usize = page.parse().context("page must be a number")?;
            session.remove_node_record(&NodeId::new(*id), Some(page))?;
            println!("Removed page {} of {}", page, id);
        }
        ("/run", [template]) => {
            let outcome = session
                .invoke_template(template, state.request(""))
                .await?;
            print_outcome(&outcome, format)?;
        }
        ("/templates", _) => print_templates(session, format)?,
        ("/reset", _) => {
            session.reset();
            state.selection.clear();
            if let Some(painting) = state.painting.clone() {
                session.focus_painting(&painting)?;
            }
            println!("Graph reset");
        }
        _ => bail!("unknown command or wrong arguments: {} (try /help)", line),
    }
    Ok(false)
}

fn print_outcome(outcome: &QuestionOutcome, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(outcome)?),
        OutputFormat::Table => {
            if !outcome.success {
                println!("✗ {}", outcome.message);
                return Ok(());
            }
            println!("{}", outcome.full_answer);
            if let Some(id) = &outcome.template_id {
                println!(
                    "[{}] +{} node(s), +{} edge(s)",
                    id, outcome.added_nodes, outcome.added_edges
                );
            }
        }
    }
    Ok(())
}

fn print_graph(session: &AuthSession, format: OutputFormat) -> Result<()> {
    let snapshot = session.snapshot();
    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let mut nodes = Table::new();
    nodes.set_content_arrangement(ContentArrangement::Dynamic);
    nodes.set_header(vec!["id", "kind", "label"]);
    for node in &snapshot.nodes {
        nodes.add_row(vec![
            node.id.to_string(),
            node.kind.to_string(),
            node.label.clone(),
        ]);
    }
    println!("{}", nodes);

    if !snapshot.edges.is_empty() {
        let mut edges = Table::new();
        edges.set_content_arrangement(ContentArrangement::Dynamic);
        edges.set_header(vec!["source", "relation", "target", "label"]);
        for edge in &snapshot.edges {
            edges.add_row(vec![
                edge.source.to_string(),
                edge.relation.clone(),
                edge.target.to_string(),
                edge.label.clone(),
            ]);
        }
        println!("{}", edges);
    }
    println!(
        "{} node(s), {} edge(s)",
        snapshot.nodes.len(),
        snapshot.edges.len()
    );
    Ok(())
}

fn print_history(session: &AuthSession, format: OutputFormat) -> Result<()> {
    let history = session.history();
    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }
    if history.is_empty() {
        println!("(no history)");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["question", "template", "ok", "changes"]);
    for record in &history {
        let changes: Vec<String> = record
            .changes
            .iter()
            .map(|c| match c.page_index() {
                Some(page) => format!("{}#{}", c.node_id(), page),
                None => c.node_id().to_string(),
            })
            .collect();
        table.add_row(vec![
            record.question.clone(),
            record.template_id.clone().unwrap_or_else(|| "-".to_string()),
            if record.success { "yes" } else { "no" }.to_string(),
            changes.join(", "),
        ]);
    }
    println!("{}", table);
    Ok(())
}

fn print_templates(session: &AuthSession, format: OutputFormat) -> Result<()> {
    let templates = session.templates();
    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&templates)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["id", "relation", "needs", "description"]);
    for template in &templates {
        let needs: Vec<String> = template
            .required_selection
            .iter()
            .map(|k| k.to_string())
            .collect();
        table.add_row(vec![
            template.id.clone(),
            template.relationship.clone(),
            needs.join(", "),
            template.description.clone(),
        ]);
    }
    println!("{}", table);
    Ok(())
}
