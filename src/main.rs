//
//  dusage: show disk quota usage for a user, a project or a directory.
//
//  Reads the cluster layout from dusage.toml, queries BeeGFS or Lustre
//  through their command line tools, and prints a table (or CSV/JSON).
//
#[macro_use] extern crate log;

mod config;
mod render;
mod unixuser;

use std::env;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{ArgAction, Parser};

use hpc_quota::exec::System;
use hpc_quota::resolve::{LocalDirs, Resolver};
use hpc_quota::{backend, Error, Subject};

use crate::render::Palette;
use crate::unixuser::{UnixGroups, User};

#[derive(Parser, Debug)]
#[command(name = "dusage", version, about = "Show disk quota usage.")]
struct Args {
    /// The username to check (default: the invoking user).
    #[arg(short, long, conflicts_with_all = ["project", "directory"])]
    user: Option<String>,

    /// The allocation project.
    #[arg(short, long, conflicts_with = "directory")]
    project: Option<String>,

    /// The directory/path to check.
    #[arg(short, long)]
    directory: Option<String>,

    /// Print comma-separated values for parsing by other scripts.
    #[arg(long, conflicts_with = "json")]
    csv: bool,

    /// Print JSON.
    #[arg(long)]
    json: bool,

    /// Disable colors.
    #[arg(long)]
    no_colors: bool,

    /// Configuration file.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Cluster section to use from the configuration file.
    #[arg(long)]
    cluster: Option<String>,

    /// More logging. Repeat for more.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn cluster_name(args: &Args) -> hpc_quota::Result<String> {
    if let Some(ref c) = args.cluster {
        return Ok(c.clone());
    }
    if let Ok(c) = env::var("DUSAGE_HOSTNAME") {
        if !c.is_empty() {
            return Ok(c);
        }
    }
    unixuser::hostname().map_err(|e| Error::Identity(format!("gethostname: {}", e)))
}

// Work out what to query. A named user must exist.
fn subject(args: &Args) -> hpc_quota::Result<Subject> {
    if let Some(ref d) = args.directory {
        return Ok(Subject::Path(d.clone()));
    }
    if let Some(ref p) = args.project {
        return Ok(Subject::Project(p.clone()));
    }
    let user = match args.user {
        Some(ref u) => {
            let found = User::by_name(u).map_err(|e| Error::Identity(format!("{}: {}", u, e)))?;
            if found.is_none() {
                return Err(Error::NotFound(format!("user {} not found", u)));
            }
            u.clone()
        },
        None => unixuser::current_identity()?.user,
    };
    Ok(Subject::Account(user))
}

fn run(args: &Args, palette: &Palette) -> hpc_quota::Result<String> {
    let config_file = config::locate(args.config.as_deref());
    let cluster = cluster_name(args)?;
    let cfg = config::load(&config_file, &cluster)?;
    info!("cluster {}: {} at {}", cluster, cfg.file_system, cfg.file_system_prefix);

    let subject = subject(args)?;
    let backend = backend::select(cfg.file_system, Arc::new(System), unixuser::current_identity)?;
    let resolver = Resolver::new(&cfg, backend.as_ref(), &UnixGroups, &LocalDirs);
    let map = resolver.resolve(&subject)?;
    info!("{} entries for {:?}", map.len(), subject);

    if let Subject::Project(ref p) = subject {
        if map.is_empty() {
            return Err(Error::NotFound(format!("the project {} does not seem to exist", p)));
        }
    }

    let masked = env::var_os("DUSAGE_ANONYMIZE_OUTPUT").map_or(false, |v| !v.is_empty());
    if args.json {
        render::json(&map).map_err(|e| Error::Parse(format!("json: {}", e)))
    } else if args.csv {
        Ok(render::csv(&map, masked))
    } else {
        Ok(render::report(&map, palette, masked))
    }
}

fn main() {
    let args = Args::parse();

    let level = match args.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        _ => log::LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let colors = !args.no_colors && env::var_os("NO_COLOR").is_none();
    if !colors {
        colored::control::set_override(false);
    }
    let palette = Palette::new(colors);

    match run(&args, &palette) {
        Ok(out) => {
            if out.ends_with('\n') {
                print!("{}", out);
            } else {
                println!("{}", out);
            }
        },
        Err(e) => {
            eprintln!("{}{}", palette.error("ERROR: "), e);
            process::exit(1);
        },
    }
}
