//! Yamlet command-line tool for checking, formatting, and transcoding documents.
//!
//! Usage: yamlet [OPTIONS] [FILE|DIR]
//!
//! Options:
//!   -f, --from <FORMAT>    Input format (yamlet, json, yaml, toml)
//!                          [default: inferred from the file extension, else yamlet]
//!   -t, --to <FORMAT>      Output format (yamlet, json, yaml, toml) [default: yamlet]
//!   -w, --write            Write output to file with inferred name
//!   -o, --output <FILE>    Write output to specified file
//!   --check                Check if input is valid (exit 0 if valid, 1 if invalid)
//!   --tokens               Print the raw token stream of a Yamlet document
//!   -h, --help             Print help
//!   -V, --version          Print version
//!
//! Set `YAMLET_INDENT` to change the indentation of Yamlet output and
//! `RUST_LOG` (e.g. `libyamlet=debug`) to see parser diagnostics.

use libyamlet::{tokenize, EncodeOptions};
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::process;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod transcode;

use transcode::Format;

/// Extensions picked up when a directory is given as input.
const DIRECTORY_EXTENSIONS: &[&str] = &["yamlet", "yml", "yaml"];

#[derive(Debug, Default)]
struct Options {
    from: Option<Format>,
    to: Option<Format>,
    write_back: bool,
    output_file: Option<String>,
    check_only: bool,
    tokens: bool,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn format_arg(args: &[String], i: usize, flag: &str) -> Format {
    let Some(name) = args.get(i) else {
        eprintln!("Error: {} requires a format argument", flag);
        process::exit(1);
    };
    match Format::from_name(name) {
        Some(format) => format,
        None => {
            eprintln!("Error: Unknown format: {}", name);
            process::exit(1);
        }
    }
}

fn main() {
    init_logging();

    let args: Vec<String> = std::env::args().collect();
    let mut opts = Options::default();
    let mut input_path: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                return;
            }
            "-V" | "--version" => {
                println!("yamlet {}", env!("CARGO_PKG_VERSION"));
                return;
            }
            "-f" | "--from" => {
                i += 1;
                opts.from = Some(format_arg(&args, i, "-f"));
            }
            "-t" | "--to" => {
                i += 1;
                opts.to = Some(format_arg(&args, i, "-t"));
            }
            "-w" | "--write" => {
                opts.write_back = true;
            }
            "-o" | "--output" => {
                i += 1;
                match args.get(i) {
                    Some(path) => opts.output_file = Some(path.clone()),
                    None => {
                        eprintln!("Error: --output requires an argument");
                        process::exit(1);
                    }
                }
            }
            "--check" => {
                opts.check_only = true;
            }
            "--tokens" => {
                opts.tokens = true;
            }
            "-" => {
                // stdin
            }
            arg if arg.starts_with('-') => {
                eprintln!("Error: Unknown option: {}", arg);
                process::exit(1);
            }
            arg => {
                if input_path.is_some() {
                    eprintln!("Error: Multiple input paths not supported");
                    process::exit(1);
                }
                input_path = Some(arg.to_string());
            }
        }
        i += 1;
    }

    if opts.write_back && opts.output_file.is_some() {
        eprintln!("Error: --write and --output are mutually exclusive");
        process::exit(1);
    }
    if opts.tokens && (opts.check_only || opts.to.is_some()) {
        eprintln!("Error: --tokens cannot be combined with --check or --to");
        process::exit(1);
    }
    if opts.tokens && opts.from.is_some_and(|f| f != Format::Yamlet) {
        eprintln!("Error: --tokens only reads Yamlet input");
        process::exit(1);
    }

    if let Some(path) = input_path.as_deref() {
        if Path::new(path).is_dir() {
            if opts.output_file.is_some() {
                eprintln!("Error: --output cannot be used with directory input");
                process::exit(1);
            }
            process::exit(process_directory(path, &opts));
        }
    }

    let input = match input_path.as_deref() {
        Some(path) => match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                eprintln!("Error reading {}: {}", path, e);
                process::exit(1);
            }
        },
        None => {
            let mut buffer = String::new();
            if let Err(e) = io::stdin().read_to_string(&mut buffer) {
                eprintln!("Error reading stdin: {}", e);
                process::exit(1);
            }
            buffer
        }
    };

    process::exit(process_input(&input, input_path.as_deref(), &opts));
}

/// Process every Yamlet or YAML file directly inside `dir_path`, in name
/// order. Returns the exit code.
fn process_directory(dir_path: &str, opts: &Options) -> i32 {
    let entries = match fs::read_dir(dir_path) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Error reading directory {}: {}", dir_path, e);
            return 1;
        }
    };

    let mut paths: Vec<_> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| DIRECTORY_EXTENSIONS.contains(&e))
        })
        .collect();
    paths.sort();

    let mut had_errors = false;
    for path in paths {
        let path_str = path.to_string_lossy();
        debug!(path = %path_str, "Processing directory entry");
        let input = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                eprintln!("Error reading {}: {}", path_str, e);
                had_errors = true;
                continue;
            }
        };
        if process_input(&input, Some(&path_str), opts) != 0 {
            had_errors = true;
        }
    }

    if had_errors {
        1
    } else {
        0
    }
}

fn report_error(input_file: Option<&str>, e: &str) {
    match input_file {
        Some(path) => eprintln!("{}: {}", path, e),
        None => eprintln!("Parse error: {}", e),
    }
}

/// Decode one document and act on it. Returns the exit code.
fn process_input(input: &str, input_file: Option<&str>, opts: &Options) -> i32 {
    let filename = input_file.map(|p| {
        Path::new(p)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| p.to_string())
    });

    if opts.tokens {
        return print_tokens(input, input_file);
    }

    let from = opts
        .from
        .or_else(|| input_file.and_then(|p| Format::from_path(Path::new(p))))
        .unwrap_or(Format::Yamlet);
    debug!(?from, file = ?filename, "Decoding input");

    let value = match from.decode(input, filename.as_deref()) {
        Ok(v) => v,
        Err(e) => {
            report_error(input_file, &e);
            return 1;
        }
    };

    if opts.check_only {
        match input_file {
            Some(path) => println!("{}: ok", path),
            None => println!("ok"),
        }
        return 0;
    }

    let to = opts.to.unwrap_or(Format::Yamlet);
    let output = match to.encode(&value, &EncodeOptions::from_env()) {
        Ok(text) => text,
        Err(e) => {
            match input_file {
                Some(path) => eprintln!("{}: {}", path, e),
                None => eprintln!("Error: {}", e),
            }
            return 1;
        }
    };

    write_text_output(&output, opts, input_file, to)
}

fn print_tokens(input: &str, input_file: Option<&str>) -> i32 {
    let tokens = match tokenize(input) {
        Ok(tokens) => tokens,
        Err(e) => {
            report_error(input_file, &e.to_string());
            return 1;
        }
    };
    for token in tokens {
        println!(
            "{}:{}\t{:?}\t{:?}",
            token.line_num, token.col, token.typ, token.text
        );
    }
    0
}

fn write_text_output(
    output: &str,
    opts: &Options,
    input_file: Option<&str>,
    format: Format,
) -> i32 {
    if let Some(path) = opts.output_file.as_deref() {
        if let Err(e) = fs::write(path, output) {
            eprintln!("Error writing {}: {}", path, e);
            return 1;
        }
    } else if opts.write_back {
        let Some(input_path) = input_file else {
            eprintln!("Error: --write requires an input file");
            return 1;
        };
        let output_path = Path::new(input_path).with_extension(format.extension());
        if let Err(e) = fs::write(&output_path, output) {
            eprintln!("Error writing {}: {}", output_path.display(), e);
            return 1;
        }
    } else {
        print!("{}", output);
        if !output.ends_with('\n') {
            println!();
        }
    }
    0
}

fn print_help() {
    println!(
        "yamlet - Yamlet command-line tool

USAGE:
    yamlet [OPTIONS] [FILE|DIR]

ARGS:
    [FILE|DIR]    Input file or directory (reads from stdin if not provided)
                  When a directory is given, processes all .yamlet, .yml
                  and .yaml files in it

OPTIONS:
    -f, --from <FORMAT>    Input format [default: inferred from the extension, else yamlet]
                           Supported: yamlet, json, yaml (yml), toml

    -t, --to <FORMAT>      Output format [default: yamlet]
                           Supported: yamlet, json, yaml (yml), toml

    -w, --write            Write output next to the input with the extension
                           of the output format (reformats .yamlet files in place)

    -o, --output <FILE>    Write output to specified file (not valid with directory input)

    --check                Check if input is valid (exit 0 if valid, 1 if invalid)

    --tokens               Print the raw token stream of a Yamlet document,
                           one token per line as LINE:COL, kind and text

    -h, --help             Print help

    -V, --version          Print version

ENVIRONMENT:
    YAMLET_INDENT          Indentation width of Yamlet output (1-8) [default: 2]
    RUST_LOG               Diagnostic filter, e.g. libyamlet=debug [default: warn]

EXAMPLES:
    # Reformat a Yamlet file with aligned values
    yamlet config.yamlet

    # Validate every Yamlet and YAML file in a directory
    yamlet --check ./configs/

    # Convert Yamlet to JSON
    yamlet -t json config.yamlet

    # Convert JSON to Yamlet
    yamlet data.json -o data.yamlet

    # Convert a YAML file to Yamlet, writing config.yamlet
    yamlet -w config.yaml

    # Convert Yamlet to TOML
    yamlet -t toml config.yamlet

    # Inspect how a document tokenizes
    yamlet --tokens config.yamlet
"
    );
}
