//! Trace inspection CLI.
//!
//! Provides the `runtrace` binary with subcommands for inspecting a
//! recorded automation run offline: print the reconstructed control-flow
//! graph, the details and logbook window of one step, the resolved config
//! slice at a path, or the whole run as a chronological timeline.
//!
//! Inputs are the JSON documents the backend serves: a trace record and,
//! optionally, a logbook entry list fetched for the run's context.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use runtrace_core::logbook::{ensure_ascending, LogbookEntry};
use runtrace_core::path::resolve;
use runtrace_core::trace::TraceRecord;
use runtrace_graph::builder::build_automation;
use runtrace_graph::navigator::all_nodes;
use runtrace_graph::node::{Branch, GraphNode};
use runtrace_timeline::correlate::{logbook_for_path, PathLogbook};
use runtrace_timeline::details::{path_details, PathDetails};
use runtrace_timeline::narrative::{build_timeline, TimelineEvent};

/// Automation run trace inspector.
#[derive(Parser)]
#[command(name = "runtrace", about = "Inspect recorded automation run traces")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Print the reconstructed control-flow graph of a run.
    Graph {
        /// Path to the trace record JSON file.
        #[arg(short, long)]
        trace: PathBuf,

        /// Mark this node path as selected.
        #[arg(short, long)]
        select: Option<String>,

        /// Build in edit mode (synthesizes addable default branches).
        #[arg(long)]
        edit: bool,

        /// Emit the forest as JSON instead of a tree listing.
        #[arg(long)]
        json: bool,
    },

    /// Print the recorded details of one step.
    Path {
        /// Path to the trace record JSON file.
        #[arg(short, long)]
        trace: PathBuf,

        /// Node path to inspect (e.g. action/1/choose/0).
        #[arg(short, long)]
        path: String,

        /// Emit the details as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the logbook entries associated with one step's window.
    Logbook {
        /// Path to the trace record JSON file.
        #[arg(short, long)]
        trace: PathBuf,

        /// Path to the logbook entries JSON file.
        #[arg(short, long)]
        logbook: PathBuf,

        /// Node path to correlate (e.g. action/1).
        #[arg(short, long)]
        path: String,
    },

    /// Print the resolved config slice at a path.
    Config {
        /// Path to the trace record JSON file.
        #[arg(short, long)]
        trace: PathBuf,

        /// Config path to resolve.
        #[arg(short, long)]
        path: String,
    },

    /// Print the run as one merged chronological timeline.
    Timeline {
        /// Path to the trace record JSON file.
        #[arg(short, long)]
        trace: PathBuf,

        /// Path to the logbook entries JSON file.
        #[arg(short, long)]
        logbook: Option<PathBuf>,

        /// Emit the event stream as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let exit_code = match cli.command {
        Commands::Graph {
            trace,
            select,
            edit,
            json,
        } => run_graph(&trace, select.as_deref(), edit, json),
        Commands::Path { trace, path, json } => run_path(&trace, &path, json),
        Commands::Logbook {
            trace,
            logbook,
            path,
        } => run_logbook(&trace, &logbook, &path),
        Commands::Config { trace, path } => run_config(&trace, &path),
        Commands::Timeline {
            trace,
            logbook,
            json,
        } => run_timeline(&trace, logbook.as_deref(), json),
    };
    process::exit(exit_code);
}

/// Exit codes: 0 = success, 1 = data/addressing error, 3 = I/O error.
fn load_trace(path: &std::path::Path) -> Result<TraceRecord, i32> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        eprintln!("Error: failed to read trace file '{}': {}", path.display(), e);
        3
    })?;
    serde_json::from_str(&raw).map_err(|e| {
        eprintln!("Error: failed to parse trace record: {}", e);
        1
    })
}

fn load_logbook(path: &std::path::Path) -> Result<Vec<LogbookEntry>, i32> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        eprintln!(
            "Error: failed to read logbook file '{}': {}",
            path.display(),
            e
        );
        3
    })?;
    let mut entries: Vec<LogbookEntry> = serde_json::from_str(&raw).map_err(|e| {
        eprintln!("Error: failed to parse logbook entries: {}", e);
        1
    })?;
    // Logbook fetches may arrive newest-first; the correlator needs
    // ascending order.
    ensure_ascending(&mut entries);
    Ok(entries)
}

fn run_graph(trace_file: &std::path::Path, select: Option<&str>, edit: bool, json: bool) -> i32 {
    let trace = match load_trace(trace_file) {
        Ok(t) => t,
        Err(code) => return code,
    };
    let forest = build_automation(&trace, select, edit);

    if json {
        match serde_json::to_string_pretty(&forest) {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("Error: failed to serialize graph: {}", e);
                return 1;
            }
        }
        return 0;
    }

    println!("run {} ({:?})", trace.run_id, trace.state);
    print_forest(&forest, 0);
    let tracked = all_nodes(&forest, Some(&trace))
        .iter()
        .filter(|f| f.is_tracked)
        .count();
    println!("{} tracked node(s)", tracked);
    0
}

fn print_forest(forest: &[GraphNode], depth: usize) {
    for node in forest {
        print_node(node, depth);
    }
}

fn print_node(node: &GraphNode, depth: usize) {
    let marker = if node.is_active {
        '>'
    } else if node.is_tracked {
        '*'
    } else {
        ' '
    };
    println!(
        "{}{} {:?} {}",
        "  ".repeat(depth),
        marker,
        node.kind,
        node.path
    );
    for branch in &node.children {
        match branch {
            Branch::Node(child) => print_node(child, depth + 1),
            Branch::Chain(chain) => print_forest(chain, depth + 1),
        }
    }
}

fn run_path(trace_file: &std::path::Path, path: &str, json: bool) -> i32 {
    let trace = match load_trace(trace_file) {
        Ok(t) => t,
        Err(code) => return code,
    };
    let forest = build_automation(&trace, None, false);
    let rendered: Vec<String> = all_nodes(&forest, None)
        .iter()
        .map(|f| f.node.path.clone())
        .collect();

    let details = path_details(&trace, &rendered, path);

    if json {
        match serde_json::to_string_pretty(&details) {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("Error: failed to serialize details: {}", e);
                return 1;
            }
        }
        return 0;
    }

    match details {
        PathDetails::DefaultExecuted => {
            println!("The default action was executed");
        }
        PathDetails::NotExecuted => {
            println!("This step was not executed and has no further details");
        }
        PathDetails::Executed { steps } => {
            for step in steps {
                if step.path != path {
                    println!("{}", step.path);
                }
                if step.iterations > 1 {
                    println!("Iteration {} of {}", step.iteration + 1, step.iterations);
                }
                if step.disabled {
                    println!("  (disabled step)");
                    continue;
                }
                println!("  executed at {}", step.timestamp.to_rfc3339());
                if let Some(result) = &step.result {
                    println!("  result: {}", result);
                }
                if let Some(error) = &step.error {
                    println!("  error: {}", error);
                }
                if let Some(vars) = &step.changed_variables {
                    println!("  changed variables: {}", vars);
                }
            }
        }
    }
    0
}

fn run_logbook(trace_file: &std::path::Path, logbook_file: &std::path::Path, path: &str) -> i32 {
    let trace = match load_trace(trace_file) {
        Ok(t) => t,
        Err(code) => return code,
    };
    let entries = match load_logbook(logbook_file) {
        Ok(e) => e,
        Err(code) => return code,
    };

    match logbook_for_path(&trace, &entries, path) {
        PathLogbook::NotTracked => {
            println!("This step was not executed and has no logbook entries");
        }
        PathLogbook::Entries([]) => {
            println!("No logbook entries found for this step");
        }
        PathLogbook::Entries(slice) => {
            for entry in slice {
                match entry.when_utc() {
                    Some(at) => println!("{}  {}", at.to_rfc3339(), entry.description()),
                    None => println!("{}  {}", entry.when, entry.description()),
                }
            }
        }
    }
    0
}

fn run_config(trace_file: &std::path::Path, path: &str) -> i32 {
    let trace = match load_trace(trace_file) {
        Ok(t) => t,
        Err(code) => return code,
    };
    match resolve(&trace.config, path) {
        Ok(slice) => match serde_json::to_string_pretty(slice) {
            Ok(out) => {
                println!("{}", out);
                0
            }
            Err(e) => {
                eprintln!("Error: failed to serialize config slice: {}", e);
                1
            }
        },
        Err(e) => {
            eprintln!(
                "Error: unable to extract path '{}': {}. Download the trace and report as a bug.",
                path, e
            );
            1
        }
    }
}

fn run_timeline(trace_file: &std::path::Path, logbook_file: Option<&std::path::Path>, json: bool) -> i32 {
    let trace = match load_trace(trace_file) {
        Ok(t) => t,
        Err(code) => return code,
    };
    let entries = match logbook_file {
        Some(file) => match load_logbook(file) {
            Ok(e) => e,
            Err(code) => return code,
        },
        None => Vec::new(),
    };

    let events = build_timeline(&trace, &entries);

    if json {
        match serde_json::to_string_pretty(&events) {
            Ok(out) => println!("{}", out),
            Err(e) => {
                eprintln!("Error: failed to serialize timeline: {}", e);
                return 1;
            }
        }
        return 0;
    }

    for event in &events {
        match event {
            TimelineEvent::TimePassed { from, to } => {
                println!("  ({} later)", human_duration((*to - *from).num_seconds()));
            }
            TimelineEvent::Triggered {
                description, at, ..
            } => {
                println!("{} at {}", description, at.to_rfc3339());
            }
            TimelineEvent::Step { path, description } => {
                println!("* {} ({})", description, path);
            }
            TimelineEvent::Logbook { shown, folded } => {
                for entry in shown {
                    println!("  - {}", entry.description());
                }
                if !folded.is_empty() {
                    println!("  ... {} more entr(ies) folded", folded.len());
                }
            }
            TimelineEvent::BrokenPath { path } => {
                println!(
                    "! Unable to extract path {}. Download the trace and report as a bug.",
                    path
                );
            }
            TimelineEvent::Finished {
                at,
                runtime_seconds,
            } => {
                println!(
                    "Finished at {} (runtime: {:.2} seconds)",
                    at.to_rfc3339(),
                    runtime_seconds
                );
            }
            TimelineEvent::StillRunning => println!("Still running"),
        }
    }
    0
}

fn human_duration(seconds: i64) -> String {
    if seconds >= 60 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}
