//! Command-line front end for reelscript.
//!
//! Brainstorms short-form Python video ideas, expands one into a narrated
//! tutorial script, and renders highlighted code cards. Generation talks to
//! an OpenAI-compatible endpoint configured through the environment (or a
//! `.env` file).

use std::error::Error;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use reelscript_core::{
    cumulative_violations, export_csv, full_source_matches, normalize, render_all, render_ansi, step_deltas,
    AnsiOptions, CodeCard, EndpointConfig, FileStore, Generator, IdeaHistory, IdeaRecord, Normalized, Outcome,
    RenderConfig, RenderFormat, Shape, TutorialScript, DEFAULT_IDEA_COUNT,
};

mod endpoint;

use endpoint::OpenAiEndpoint;

/// Brainstorm and script one-minute Python tutorials.
#[derive(Parser, Debug)]
#[command(name = "reelscript")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the idea history
    #[arg(long, global = true, default_value = ".reelscript")]
    history_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a batch of video ideas
    Ideas {
        /// How many ideas to ask for (1-15)
        #[arg(long, short = 'n', default_value_t = DEFAULT_IDEA_COUNT)]
        count: usize,

        /// Print the ideas as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate a tutorial script for one idea
    Script {
        /// Free-form topic for a custom idea
        #[arg(long, conflicts_with = "pick")]
        title: Option<String>,

        /// 1-based index into the idea history, newest first
        #[arg(long)]
        pick: Option<usize>,

        #[arg(long, value_enum, default_value_t = ScriptFormat::Text)]
        format: ScriptFormat,

        /// Also write an HTML code card of the full script here
        #[arg(long)]
        card: Option<PathBuf>,
    },

    /// Print a Python file with syntax colours
    Highlight {
        /// File to read, or `-` for stdin
        input: PathBuf,

        /// Show line numbers
        #[arg(long)]
        gutter: bool,

        /// Comma-separated 1-based lines to mark
        #[arg(long, value_delimiter = ',')]
        emphasize: Vec<usize>,
    },

    /// Render every source file under a directory
    Render {
        root: PathBuf,

        #[arg(long)]
        output_dir: PathBuf,

        /// File extension to pick up
        #[arg(long, default_value = "py")]
        ext: String,

        #[arg(long, value_enum, default_value_t = CardFormat::Html)]
        format: CardFormat,
    },

    /// Normalize a saved completion and print the validated JSON
    Normalize {
        /// File to read, or `-` for stdin
        input: PathBuf,

        /// idea-list or tutorial-script
        #[arg(long)]
        shape: Shape,
    },

    /// Inspect or manage the idea history
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Subcommand, Debug)]
enum HistoryAction {
    /// List stored ideas, newest first
    List,
    /// Delete the stored history
    Clear,
    /// Export the history as CSV
    Export {
        /// Output file; stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ScriptFormat {
    Text,
    Markdown,
    Json,
    Narration,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CardFormat {
    Html,
    Ansi,
}

fn read_input(path: &Path) -> io::Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        let bytes = fs::read(path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn open_history(dir: &Path) -> IdeaHistory<FileStore> {
    IdeaHistory::new(FileStore::new(dir))
}

/// Stored ideas, newest first. Failures are logged and read as empty.
fn recent_ideas(history: &IdeaHistory<FileStore>) -> Vec<IdeaRecord> {
    match history.load() {
        Ok(mut ideas) => {
            ideas.reverse();
            ideas
        }
        Err(e) => {
            warn!(error = %e, "could not read idea history");
            Vec::new()
        }
    }
}

fn generator() -> Result<Generator<OpenAiEndpoint>, Box<dyn Error>> {
    let config = EndpointConfig::from_env()?;
    Ok(Generator::new(OpenAiEndpoint::new(config)?))
}

fn print_script(script: &TutorialScript, title: &str, format: ScriptFormat) -> Result<(), Box<dyn Error>> {
    match format {
        ScriptFormat::Text => {
            println!("{}\n", title);
            for (index, step) in script.steps.iter().enumerate() {
                println!("[{}] {}", TutorialScript::step_label(index), step.narration);
                if step.has_code() {
                    println!("{}", render_ansi(&step.code_so_far, &AnsiOptions::default()));
                }
                println!();
            }
            println!("[Closer] {}", script.closer);
        }
        ScriptFormat::Markdown => print!("{}", script.to_markdown(title)),
        ScriptFormat::Json => println!("{}", serde_json::to_string_pretty(script)?),
        ScriptFormat::Narration => println!("{}", script.narration_script()),
    }
    Ok(())
}

async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    match args.command {
        Command::Ideas { count, json } => {
            let generator = generator()?;
            let ideas = match generator.ideas(count).await? {
                Outcome::Ready(ideas) => ideas,
                Outcome::Discarded => return Err("request was discarded".into()),
            };

            let mut history = open_history(&args.history_dir);
            if let Err(e) = history.record(&ideas) {
                warn!(error = %e, "could not save ideas to history");
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&ideas)?);
            } else {
                for (i, idea) in ideas.iter().enumerate() {
                    println!("{}. {}\n   {}\n", i + 1, idea.title, idea.caption);
                }
            }
        }

        Command::Script {
            title,
            pick,
            format,
            card,
        } => {
            let idea = match (title, pick) {
                (Some(title), _) => IdeaRecord::custom(&title).ok_or("the custom idea is empty")?,
                (None, Some(n)) => {
                    let ideas = recent_ideas(&open_history(&args.history_dir));
                    n.checked_sub(1)
                        .and_then(|i| ideas.get(i).cloned())
                        .ok_or_else(|| format!("no idea #{} in history ({} stored)", n, ideas.len()))?
                }
                (None, None) => return Err("pass --title or --pick".into()),
            };

            if idea.is_custom {
                let mut history = open_history(&args.history_dir);
                if let Err(e) = history.record(std::slice::from_ref(&idea)) {
                    warn!(error = %e, "could not save custom idea to history");
                }
            }

            let generator = generator()?;
            let script = match generator.script(&idea).await? {
                Outcome::Ready(script) => script,
                Outcome::Discarded => return Err("request was discarded".into()),
            };

            for step in cumulative_violations(&script) {
                eprintln!("Warning: {} drops code shown by the step before it", TutorialScript::step_label(step));
            }
            if !full_source_matches(&script) {
                eprintln!("Warning: full script differs from the last step's code");
            }

            print_script(&script, &idea.title, format)?;

            if let Some(path) = card {
                let emphasized = step_deltas(&script).last().map(|d| d.added_lines.clone()).unwrap_or_default();
                let html = CodeCard::new()
                    .with_title(idea.title.clone())
                    .with_emphasized(emphasized)
                    .to_html(&script.full_source);
                fs::write(&path, html)?;
                eprintln!("Code card: {:?}", path);
            }
        }

        Command::Highlight {
            input,
            gutter,
            emphasize,
        } => {
            let source = read_input(&input)?;
            let options = AnsiOptions {
                gutter,
                emphasized: emphasize,
                ..Default::default()
            };
            println!("{}", render_ansi(&source, &options));
        }

        Command::Render {
            root,
            output_dir,
            ext,
            format,
        } => {
            let config = RenderConfig {
                extension: ext,
                format: match format {
                    CardFormat::Html => RenderFormat::Html,
                    CardFormat::Ansi => RenderFormat::Ansi,
                },
                ..Default::default()
            };
            let summary = render_all(&root, &output_dir, &config)?;

            println!("\n[summary]");
            println!("  Files found: {}", summary.files);
            println!("  Rendered: {}", summary.rendered);
            println!("  Failed: {}", summary.failed);
            println!("  Lines: {}", summary.lines);
            println!("  Tokens: {}", summary.tokens);
            println!("  Output: {:?}", output_dir);
        }

        Command::Normalize { input, shape } => {
            let raw = read_input(&input)?;
            let json = match normalize(&raw, shape)? {
                Normalized::Ideas(ideas) => serde_json::to_string_pretty(&ideas)?,
                Normalized::Script(script) => serde_json::to_string_pretty(&script)?,
            };
            println!("{}", json);
        }

        Command::History { action } => {
            let mut history = open_history(&args.history_dir);
            match action {
                HistoryAction::List => {
                    let ideas = recent_ideas(&history);
                    if ideas.is_empty() {
                        println!("No ideas yet.");
                    }
                    for (i, idea) in ideas.iter().enumerate() {
                        let tag = if idea.is_custom { " (custom)" } else { "" };
                        println!("{}. {}{}", i + 1, idea.title, tag);
                    }
                }
                HistoryAction::Clear => {
                    history.clear()?;
                    println!("History cleared.");
                }
                HistoryAction::Export { output } => {
                    let ideas = history.load()?;
                    match output {
                        Some(path) => export_csv(&ideas, fs::File::create(&path)?)?,
                        None => export_csv(&ideas, io::stdout().lock())?,
                    }
                }
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
