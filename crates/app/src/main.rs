use std::fmt;

use services::{AppServices, Clock};
use tracker_core::model::{
    AdmitStatus, ExamKind, ExamProgress, InternationalAdmit, PortfolioProject, ProjectStatus,
    StudentDraft, StudentId,
};
use tracker_core::progress::{NormalizeOptions, ProgressTriple, normalize_score};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArg { name: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidNumber { name: &'static str, raw: String },
    InvalidTriple { flag: &'static str, raw: String },
    InvalidScore { flag: &'static str, reason: String },
    InvalidMilestone { flag: &'static str, reason: String },
    InvalidStudentId { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArg { name } => write!(f, "missing <{name}>"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidNumber { name, raw } => write!(f, "invalid {name} value: {raw}"),
            ArgsError::InvalidTriple { flag, raw } => {
                write!(f, "{flag} expects start,current,target; got: {raw}")
            }
            ArgsError::InvalidScore { flag, reason }
            | ArgsError::InvalidMilestone { flag, reason } => write!(f, "{flag}: {reason}"),
            ArgsError::InvalidStudentId { raw } => write!(f, "invalid student id: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn require_arg(
    args: &mut impl Iterator<Item = String>,
    name: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingArg { name })
}

fn parse_number(raw: &str, name: &'static str) -> Result<f64, ArgsError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| ArgsError::InvalidNumber {
            name,
            raw: raw.to_string(),
        })
}

fn parse_student_id(raw: &str) -> Result<StudentId, ArgsError> {
    raw.parse().map_err(|_| ArgsError::InvalidStudentId {
        raw: raw.to_string(),
    })
}

/// Parse `start,current,target` for an exam flag; empty parts are missing.
fn parse_triple(raw: &str, flag: &'static str) -> Result<[Option<f64>; 3], ArgsError> {
    let invalid = || ArgsError::InvalidTriple {
        flag,
        raw: raw.to_string(),
    };
    let parts: Vec<Option<f64>> = raw
        .split(',')
        .map(str::trim)
        .map(|p| {
            if p.is_empty() {
                Ok(None)
            } else {
                p.parse::<f64>().map(Some).map_err(|_| invalid())
            }
        })
        .collect::<Result<_, _>>()?;
    <[Option<f64>; 3]>::try_from(parts).map_err(|_| invalid())
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  tracker slug <full-name> <academic-year> [--exclude <id>]");
    eprintln!("  tracker add --name <n> --year <y> [--slug <s>]");
    eprintln!("              [--ielts s,c,t] [--sat-english s,c,t] [--sat-math s,c,t]");
    eprintln!("              [--project title[:status]]... [--admit program,country[,status]]...");
    eprintln!("              (blank parts of s,c,t default to 0)");
    eprintln!("  tracker update <id> <same flags as add>   # replaces all fields");
    eprintln!("  tracker list [--limit <n>]");
    eprintln!("  tracker show <slug>");
    eprintln!("  tracker delete <id>");
    eprintln!("  tracker progress <start> <current> <target>");
    eprintln!("  tracker normalize <score> <min> <max> [--raw] [--fraction]");
    eprintln!();
    eprintln!("Global options:");
    eprintln!("  --db <sqlite_url>   default sqlite://tracker.sqlite3");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  TRACKER_DB_URL, RUST_LOG");
}

#[derive(Debug)]
enum Command {
    Slug {
        full_name: String,
        academic_year: String,
        exclude: Option<StudentId>,
    },
    Add(Box<StudentDraft>),
    Update {
        id: StudentId,
        draft: Box<StudentDraft>,
    },
    List {
        limit: u32,
    },
    Show {
        slug: String,
    },
    Delete {
        id: StudentId,
    },
    Progress(ProgressTriple),
    Normalize {
        score: f64,
        min: f64,
        max: f64,
        options: NormalizeOptions,
    },
    Help,
}

#[derive(Debug)]
struct Args {
    db_url: String,
    command: Command,
}

impl Args {
    fn parse(argv: impl IntoIterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("TRACKER_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://tracker.sqlite3".into(), normalize_sqlite_url);

        // Pull out global flags so subcommands only see their own.
        let mut rest = Vec::new();
        let mut argv = argv.into_iter();
        while let Some(arg) = argv.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut argv, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--help" | "-h" => {
                    return Ok(Self {
                        db_url,
                        command: Command::Help,
                    });
                }
                _ => rest.push(arg),
            }
        }

        let mut rest = rest.into_iter();
        let command = match rest.next() {
            None => Command::Help,
            Some(cmd) => match cmd.as_str() {
                "slug" => parse_slug(&mut rest)?,
                "add" => Command::Add(Box::new(parse_draft(&mut rest)?)),
                "update" => {
                    let id = parse_student_id(&require_arg(&mut rest, "id")?)?;
                    Command::Update {
                        id,
                        draft: Box::new(parse_draft(&mut rest)?),
                    }
                }
                "list" => parse_list(&mut rest)?,
                "show" => Command::Show {
                    slug: require_arg(&mut rest, "slug")?,
                },
                "delete" => Command::Delete {
                    id: parse_student_id(&require_arg(&mut rest, "id")?)?,
                },
                "progress" => parse_progress(&mut rest)?,
                "normalize" => parse_normalize(&mut rest)?,
                _ => return Err(ArgsError::UnknownCommand(cmd)),
            },
        };

        if let Some(extra) = rest.next() {
            return Err(ArgsError::UnknownArg(extra));
        }

        Ok(Self { db_url, command })
    }
}

fn parse_slug(args: &mut impl Iterator<Item = String>) -> Result<Command, ArgsError> {
    let mut positional = Vec::new();
    let mut exclude = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--exclude" => {
                exclude = Some(parse_student_id(&require_value(args, "--exclude")?)?);
            }
            _ if arg.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let full_name = require_arg(&mut positional, "full-name")?;
    let academic_year = require_arg(&mut positional, "academic-year")?;
    if let Some(extra) = positional.next() {
        return Err(ArgsError::UnknownArg(extra));
    }
    Ok(Command::Slug {
        full_name,
        academic_year,
        exclude,
    })
}

fn parse_exam(
    args: &mut impl Iterator<Item = String>,
    kind: ExamKind,
    flag: &'static str,
) -> Result<Option<ExamProgress>, ArgsError> {
    let [start, current, target] = parse_triple(&require_value(args, flag)?, flag)?;
    ExamProgress::from_partial(kind, start, current, target).map_err(|e| {
        ArgsError::InvalidScore {
            flag,
            reason: e.to_string(),
        }
    })
}

/// Accept `in-progress`, `in_progress` or `IN_PROGRESS` alike.
fn status_token(raw: &str) -> String {
    raw.trim().to_ascii_uppercase().replace('-', "_")
}

/// Parse `title[:status]` for `--project`.
fn parse_project(raw: &str) -> Result<PortfolioProject, ArgsError> {
    let invalid = |reason: String| ArgsError::InvalidMilestone {
        flag: "--project",
        reason,
    };
    let (title, status) = raw.split_once(':').unwrap_or((raw, ""));
    let status =
        ProjectStatus::parse(&status_token(status)).map_err(|e| invalid(e.to_string()))?;
    PortfolioProject::new(title, "", status).map_err(|e| invalid(e.to_string()))
}

/// Parse `program,country[,status]` for `--admit`.
fn parse_admit(raw: &str) -> Result<InternationalAdmit, ArgsError> {
    let invalid = |reason: String| ArgsError::InvalidMilestone {
        flag: "--admit",
        reason,
    };
    let mut parts = raw.splitn(3, ',');
    let (Some(program), Some(country)) = (parts.next(), parts.next()) else {
        return Err(invalid(format!("expected program,country[,status]; got: {raw}")));
    };
    let status = AdmitStatus::parse(&status_token(parts.next().unwrap_or("")))
        .map_err(|e| invalid(e.to_string()))?;
    InternationalAdmit::new(program, country, status).map_err(|e| invalid(e.to_string()))
}

/// Flags shared by `add` and `update`; the draft replaces every field.
fn parse_draft(args: &mut impl Iterator<Item = String>) -> Result<StudentDraft, ArgsError> {
    let mut name = None;
    let mut year = None;
    let mut slug = None;
    let mut exams = Vec::new();
    let mut projects = Vec::new();
    let mut admits = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--name" => name = Some(require_value(args, "--name")?),
            "--year" => year = Some(require_value(args, "--year")?),
            "--slug" => slug = Some(require_value(args, "--slug")?),
            "--ielts" => exams.push(parse_exam(args, ExamKind::Ielts, "--ielts")?),
            "--sat-english" => {
                exams.push(parse_exam(args, ExamKind::SatEnglish, "--sat-english")?);
            }
            "--sat-math" => exams.push(parse_exam(args, ExamKind::SatMath, "--sat-math")?),
            "--project" => projects.push(parse_project(&require_value(args, "--project")?)?),
            "--admit" => admits.push(parse_admit(&require_value(args, "--admit")?)?),
            _ => return Err(ArgsError::UnknownArg(arg)),
        }
    }

    let name = name.ok_or(ArgsError::MissingValue { flag: "--name" })?;
    let year = year.ok_or(ArgsError::MissingValue { flag: "--year" })?;
    let mut draft = StudentDraft::new(name, year);
    draft.slug = slug;
    let draft = exams.into_iter().flatten().fold(draft, StudentDraft::with_exam);
    let draft = projects.into_iter().fold(draft, StudentDraft::with_project);
    Ok(admits.into_iter().fold(draft, StudentDraft::with_admit))
}

fn parse_list(args: &mut impl Iterator<Item = String>) -> Result<Command, ArgsError> {
    let mut limit = 100;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--limit" => {
                let value = require_value(args, "--limit")?;
                limit = value.parse().map_err(|_| ArgsError::InvalidNumber {
                    name: "--limit",
                    raw: value.clone(),
                })?;
            }
            _ => return Err(ArgsError::UnknownArg(arg)),
        }
    }
    Ok(Command::List { limit })
}

fn parse_progress(args: &mut impl Iterator<Item = String>) -> Result<Command, ArgsError> {
    let start = parse_number(&require_arg(args, "start")?, "start")?;
    let current = parse_number(&require_arg(args, "current")?, "current")?;
    let target = parse_number(&require_arg(args, "target")?, "target")?;
    Ok(Command::Progress(ProgressTriple::new(start, current, target)))
}

fn parse_normalize(args: &mut impl Iterator<Item = String>) -> Result<Command, ArgsError> {
    let mut positional = Vec::new();
    let mut options = NormalizeOptions::default();
    for arg in args.by_ref() {
        match arg.as_str() {
            "--raw" => options.clamp = false,
            "--fraction" => options.as_percentage = false,
            _ if arg.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let score = parse_number(&require_arg(&mut positional, "score")?, "score")?;
    let min = parse_number(&require_arg(&mut positional, "min")?, "min")?;
    let max = parse_number(&require_arg(&mut positional, "max")?, "max")?;
    if let Some(extra) = positional.next() {
        return Err(ArgsError::UnknownArg(extra));
    }
    Ok(Command::Normalize {
        score,
        min,
        max,
        options,
    })
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
        log::info!("created database file {}", path.display());
    }

    Ok(())
}

async fn execute(command: Command, db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Help => {
            print_usage();
            return Ok(());
        }
        Command::Progress(triple) => {
            println!("{}", serde_json::to_string(&triple.result())?);
            return Ok(());
        }
        Command::Normalize {
            score,
            min,
            max,
            options,
        } => {
            println!("{}", normalize_score(score, min, max, options));
            return Ok(());
        }
        _ => {}
    }

    log::debug!("using database {db_url}");
    prepare_sqlite_file(db_url)?;
    let app = AppServices::new_sqlite(db_url, Clock::default_clock()).await?;
    let students = app.students();

    match command {
        Command::Slug {
            full_name,
            academic_year,
            exclude,
        } => {
            let check = students
                .check_slug(&full_name, &academic_year, exclude)
                .await?;
            println!("{}", serde_json::to_string(&check)?);
        }
        Command::Add(draft) => {
            let id = students.create_student(*draft).await?;
            if let Some(student) = students.get_student(id).await? {
                println!("{id}\t{}", student.slug());
            }
        }
        Command::Update { id, draft } => {
            let student = students.update_student(id, *draft).await?;
            println!("{id}\t{}", student.slug());
        }
        Command::List { limit } => {
            for student in students.list_students(limit).await? {
                println!(
                    "{}\t{}\t{}\t{}",
                    student.id(),
                    student.slug(),
                    student.full_name(),
                    student.academic_year()
                );
            }
        }
        Command::Show { slug } => match students.profile_by_slug(&slug).await? {
            Some(profile) => println!("{}", serde_json::to_string_pretty(&profile)?),
            None => {
                return Err(Box::new(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no student with slug `{slug}`"),
                )));
            }
        },
        Command::Delete { id } => students.delete_student(id).await?,
        Command::Progress(_) | Command::Normalize { .. } | Command::Help => {}
    }

    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse(std::env::args().skip(1)).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;
    execute(args.command, &args.db_url).await
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
