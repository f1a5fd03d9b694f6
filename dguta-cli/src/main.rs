use std::{
    fs::File,
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use humansize::{format_size, BINARY};
use log::info;

use dguta_core::{
    parse_stat_line, AgeBucket, Db, DirSummary, FileType, Filter, Summariser, Tree,
};

#[derive(Parser)]
#[command(
    name = "dguta",
    version,
    about = "Build and query directory/group/user/type/age disk-usage summary stores"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Aggregate raw stat lines (path\tsize\tuid\tgid\tatime\tmtime\tis_dir)
    /// into the intermediate summary format on stdout.
    Summarise {
        /// Input file; stdin when omitted.
        input: Option<PathBuf>,
        /// Reference epoch-seconds for age bucketing; now when omitted.
        #[arg(long)]
        ref_time: Option<i64>,
    },
    /// Load intermediate summary lines into a freshly created store.
    Store {
        /// Store directory to create.
        #[arg(long)]
        db: PathBuf,
        /// Input file; stdin when omitted.
        input: Option<PathBuf>,
        /// Directories held in memory per commit.
        #[arg(long, default_value_t = 10_000)]
        batch_size: usize,
    },
    /// Find the base directories holding the filtered data.
    Where {
        /// Store directory to query; repeat the flag for a union of stores.
        #[arg(long, required = true)]
        db: Vec<PathBuf>,
        /// Directory to start from.
        dir: String,
        #[command(flatten)]
        filter: FilterArgs,
        /// How many levels to descend past the starting directory.
        #[arg(long, default_value_t = 2)]
        splits: usize,
        /// Prefixes granted one extra level of descent.
        #[arg(long)]
        deeper_under: Vec<String>,
        /// Show at most this many results.
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// List the shallowest directories that directly hold filtered files.
    Locate {
        #[arg(long, required = true)]
        db: Vec<PathBuf>,
        dir: String,
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long)]
        json: bool,
    },
    /// Print store diagnostics.
    Info {
        #[arg(long, required = true)]
        db: Vec<PathBuf>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Args)]
struct FilterArgs {
    /// Only count entries belonging to these group ids.
    #[arg(long, value_delimiter = ',')]
    gids: Vec<u32>,
    /// Only count entries belonging to these user ids.
    #[arg(long, value_delimiter = ',')]
    uids: Vec<u32>,
    /// Only count entries of these file types (e.g. bam,vcf.gz,temp).
    #[arg(long, value_delimiter = ',')]
    types: Vec<FileType>,
    /// Age bucket to query (all, a1y..a7y, m1y..m7y).
    #[arg(long, default_value = "all")]
    age: AgeBucket,
}

impl FilterArgs {
    fn to_filter(&self) -> Filter {
        Filter {
            gids: some_if_nonempty(&self.gids),
            uids: some_if_nonempty(&self.uids),
            types: some_if_nonempty(&self.types),
            age: self.age,
        }
    }
}

fn some_if_nonempty<T: Clone>(v: &[T]) -> Option<Vec<T>> {
    if v.is_empty() {
        None
    } else {
        Some(v.to_vec())
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Summarise { input, ref_time } => summarise(input, ref_time),
        Command::Store {
            db,
            input,
            batch_size,
        } => store(db, input, batch_size),
        Command::Where {
            db,
            dir,
            filter,
            splits,
            deeper_under,
            limit,
            json,
        } => where_is(db, &dir, &filter.to_filter(), splits, deeper_under, limit, json),
        Command::Locate {
            db,
            dir,
            filter,
            json,
        } => locate(db, &dir, &filter.to_filter(), json),
        Command::Info { db, json } => show_info(db, json),
    }
}

fn open_input(input: Option<PathBuf>) -> Result<Box<dyn BufRead>> {
    Ok(match input {
        Some(path) => {
            let f = File::open(&path).with_context(|| format!("opening {}", path.display()))?;
            Box::new(BufReader::new(f))
        }
        None => Box::new(BufReader::new(io::stdin())),
    })
}

fn summarise(input: Option<PathBuf>, ref_time: Option<i64>) -> Result<()> {
    let ref_time = match ref_time {
        Some(t) => t,
        None => SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64,
    };
    let mut summariser = Summariser::new(ref_time);

    let mut lineno = 0u64;
    for line in open_input(input)?.lines() {
        lineno += 1;
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let rec = parse_stat_line(&line, lineno)?;
        summariser.add(&rec)?;
    }

    let stdout = io::stdout().lock();
    summariser.output(BufWriter::new(stdout))?;
    info!("summarised {lineno} stat lines");
    Ok(())
}

fn store(db_path: PathBuf, input: Option<PathBuf>, batch_size: usize) -> Result<()> {
    let reader = open_input(input)?;
    let mut db = Db::new(vec![db_path.clone()]);
    db.create()
        .with_context(|| format!("creating store at {}", db_path.display()))?;
    db.store(reader, batch_size)?;
    db.close()?;
    info!("store written to {}", db_path.display());
    Ok(())
}

fn where_is(
    db: Vec<PathBuf>,
    dir: &str,
    filter: &Filter,
    splits: usize,
    deeper_under: Vec<String>,
    limit: usize,
    json: bool,
) -> Result<()> {
    let mut tree = Tree::new(db)?;
    let split_fn = move |path: &str| {
        if deeper_under.iter().any(|p| path.starts_with(p.as_str())) {
            splits + 1
        } else {
            splits
        }
    };

    let result = tree.where_is(dir, filter, &split_fn);
    let summaries = match result {
        Ok(s) => s,
        Err(e) if e.is_dir_not_found() => Vec::new(),
        Err(e) => return Err(e.into()),
    };
    let summaries = &summaries[..summaries.len().min(limit)];
    print_summaries(summaries, json)?;
    tree.close()?;
    Ok(())
}

fn locate(db: Vec<PathBuf>, dir: &str, filter: &Filter, json: bool) -> Result<()> {
    let mut tree = Tree::new(db)?;
    let result = tree.file_locations(dir, filter);
    let summaries = match result {
        Ok(s) => s,
        Err(e) if e.is_dir_not_found() => Vec::new(),
        Err(e) => return Err(e.into()),
    };
    print_summaries(&summaries, json)?;
    tree.close()?;
    Ok(())
}

fn print_summaries(summaries: &[DirSummary], json: bool) -> Result<()> {
    let mut out = io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut out, summaries)?;
        writeln!(out)?;
        return Ok(());
    }
    if summaries.is_empty() {
        writeln!(out, "no results")?;
        return Ok(());
    }
    for s in summaries {
        writeln!(
            out,
            "{}\t{}\t{} files\t{}",
            s.dir,
            format_size(s.size, BINARY),
            s.count,
            s.age
        )?;
    }
    Ok(())
}

fn show_info(db: Vec<PathBuf>, json: bool) -> Result<()> {
    let mut handle = Db::new(db);
    handle.open()?;
    let info = handle.info()?;
    let mut out = io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut out, &info)?;
        writeln!(out)?;
    } else {
        writeln!(out, "directories: {}", info.num_dirs)?;
        writeln!(out, "guta records: {}", info.num_dgutas)?;
        writeln!(out, "parents: {}", info.num_parents)?;
        writeln!(out, "children: {}", info.num_children)?;
    }
    handle.close()?;
    Ok(())
}
