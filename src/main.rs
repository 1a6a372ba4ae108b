mod keyboard;
mod label;
mod layout;
mod repl;
mod scale;
mod synth;
mod theory;
mod tonic;
mod tuning;
mod voice;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};

use layout::{Layout, Note, Selection};
use tuning::{Transposition, ratio};

#[derive(Parser)]
#[command(name = "maqamat", about = "53-EDO maqam scales on the command line")]
#[command(version)]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write the log to a file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct SelectArgs {
    /// Maqam name, e.g. "Bayati on D"
    #[arg(default_value = "Rast on C")]
    maqam: String,

    /// Upper jins (defaults to the maqam's own)
    #[arg(long)]
    upper: Option<String>,

    /// Transpose to this tonic, e.g. D, "E♭", "Eb1/2 sikah"
    #[arg(long)]
    tonic: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// List maqamat and ajnas
    List {
        /// Print both registries as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the tonics available for transposition
    Tonics {
        /// Print the catalog as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the one-octave scale of a maqam
    Scale {
        #[command(flatten)]
        select: SelectArgs,

        /// Also list the lower and upper jins over three octaves
        #[arg(long)]
        jins: bool,

        /// Print the full layout as JSON
        #[arg(long)]
        json: bool,
    },

    /// Pluck a scale up and down through speakers
    Play {
        #[command(flatten)]
        select: SelectArgs,

        /// Notes per minute
        #[arg(long, default_value_t = 120)]
        tempo: u32,

        /// Path to a .voice file
        #[arg(long)]
        voice: Option<PathBuf>,
    },

    /// Interactive keyboard mode: play the scale by typing
    Live {
        #[command(flatten)]
        select: SelectArgs,

        /// Path to a .voice file
        #[arg(long)]
        voice: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Live mode owns the terminal, so it only logs to a file.
    let to_terminal = !matches!(cli.command, Command::Live { .. });
    init_logging(cli.verbose, cli.log_file.as_deref(), to_terminal);

    match cli.command {
        Command::List { json: true } => print_json(&Registries {
            maqamat: theory::MAQAMAT,
            ajnas: theory::JINS,
        }),
        Command::List { json: false } => print_registries(),
        Command::Tonics { json } => {
            let tonics = tonic::build_options();
            if json {
                print_json(&tonics);
            } else {
                for t in tonics {
                    println!("  {:<14} {}", t.name, t.info());
                }
            }
        }
        Command::Scale { select, jins, json } => {
            let (selection, tonic_name) = resolve(&select);
            let layout = rebuild_or_exit(&selection);
            if json {
                print_json(&layout);
            } else {
                print_layout(&layout, &selection, &tonic_name, jins);
            }
        }
        Command::Play {
            select,
            tempo,
            voice,
        } => {
            let (selection, tonic_name) = resolve(&select);
            let layout = rebuild_or_exit(&selection);
            let voice = load_voice(voice.as_deref());

            // Up the octave and back down
            let mut run: Vec<(String, f64)> =
                layout.scale.iter().map(|n| (n.label.clone(), n.freq)).collect();
            let down: Vec<(String, f64)> = run.iter().rev().skip(1).cloned().collect();
            run.extend(down);

            println!(
                "Playing: {} (upper {}), tonic {}, {} notes/min",
                layout.maqam, layout.upper_jins, tonic_name, tempo
            );
            println!();

            if let Err(e) = synth::play(&run, tempo, voice) {
                fail("Playback error", e);
            }
        }
        Command::Live { select, voice } => {
            let (selection, _) = resolve(&select);
            let voice = load_voice(voice.as_deref());
            if let Err(e) = repl::run(selection, voice) {
                fail("Live mode error", e);
            }
        }
    }
}

fn init_logging(verbose: bool, log_file: Option<&Path>, to_terminal: bool) {
    use simplelog::*;

    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };

    let result = match log_file {
        Some(path) => {
            let file = File::create(path).unwrap_or_else(|e| {
                eprintln!("Error creating {}: {}", path.display(), e);
                std::process::exit(1);
            });
            WriteLogger::init(level, Config::default(), file)
        }
        None if to_terminal => TermLogger::init(
            level,
            Config::default(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ),
        None => return,
    };

    if let Err(e) = result {
        eprintln!("Logger error: {}", e);
    }
    log::debug!("maqamat starting (log level: {:?})", level);
}

#[derive(Serialize)]
struct Registries {
    maqamat: &'static [theory::Maqam],
    ajnas: &'static [theory::Jins],
}

fn print_json(value: &impl Serialize) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => fail("JSON error", e),
    }
}

fn fail(context: &str, e: impl std::fmt::Display) -> ! {
    eprintln!("{}: {}", context, e);
    std::process::exit(1);
}

/// Selection from the command line, plus the display name of its tonic.
fn resolve(args: &SelectArgs) -> (Selection, String) {
    let tonic = match &args.tonic {
        Some(name) => tonic::find(name).unwrap_or_else(|e| fail("Error", e)),
        None => tonic::build_options()
            .into_iter()
            .next()
            .unwrap_or_else(|| fail("Error", "empty tonic catalog")),
    };
    let selection = Selection::new(&args.maqam, args.upper.as_deref(), tonic.transposition())
        .unwrap_or_else(|e| fail("Error", e));
    (selection, tonic.name)
}

fn rebuild_or_exit(selection: &Selection) -> Layout {
    layout::rebuild(selection).unwrap_or_else(|e| fail("Error", e))
}

fn load_voice(path: Option<&Path>) -> voice::Voice {
    match path {
        Some(p) => voice::load(p).unwrap_or_else(|e| fail(&p.display().to_string(), e)),
        None => voice::Voice::default(),
    }
}

fn print_registries() {
    println!("Maqamat:");
    for (i, m) in theory::MAQAMAT.iter().enumerate() {
        println!(
            "  {}. {:<14} tonic {:<5} lower {:<9} upper on {} ({}; default {})",
            i + 1,
            m.name,
            m.tonic_name,
            m.lower,
            label::label(m.upper_anchor),
            m.upper_options.join(", "),
            m.upper_default
        );
    }
    println!();
    println!("Ajnas:");
    for j in theory::JINS {
        let steps: Vec<String> = j
            .offsets
            .iter()
            .zip(j.labels)
            .map(|(o, l)| format!("{} {}", o, l))
            .collect();
        println!("  {:<9} {}", j.name, steps.join(" | "));
    }
}

fn print_note(n: &Note, transposition: Transposition) {
    let marks = match (n.is_tonic, n.is_micro) {
        (true, _) => " *",
        (false, true) => " ½",
        _ => "",
    };
    println!(
        "  {:<18} {:>8.2} Hz  |  ratio {:.6}{}",
        n.label,
        n.freq,
        ratio(transposition.apply(n.position)),
        marks
    );
}

fn print_layout(layout: &Layout, selection: &Selection, tonic_name: &str, jins: bool) {
    let maqam = selection.maqam;
    let t = layout.transposition;
    let tonic = tonic::build_options()
        .into_iter()
        .find(|o| o.name == tonic_name)
        .map(|o| o.info())
        .unwrap_or_default();

    println!("Maqam: {}", layout.maqam);
    println!("Tonic: {} {}", tonic_name, tonic);
    println!("Lower jins: {} (tonic {})", maqam.lower, maqam.tonic_name);
    println!(
        "Upper jins: {} (base {})",
        layout.upper_jins,
        label::label(maqam.upper_anchor)
    );
    println!();
    println!(
        "Full scale (1 octave): {} → {}",
        maqam.tonic_name, maqam.tonic_name
    );
    for n in &layout.scale {
        print_note(n, t);
    }

    if jins {
        println!();
        println!("--- Lower: {} ---", maqam.lower);
        for n in &layout.lower {
            print_note(n, t);
        }
        println!();
        println!("--- Upper: {} ---", layout.upper_jins);
        for n in &layout.upper {
            print_note(n, t);
        }
    }
}
