//! rootline CLI: genealogical graph engine.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use rootline::config::{load_config, EngineConfig};
use rootline::gedcom;
use rootline::gramps;
use rootline::graph::kinship::kinship_term;
use rootline::graph::FamilyGraph;
use rootline::id::CrId;
use rootline::model::Person;
use rootline::note::frontmatter::{extract_frontmatter, replace_frontmatter};
use rootline::note::record::PersonRecord;
use rootline::note::wikilink::Wikilink;
use rootline::report::ParseReport;
use rootline::sync::{plan_repairs, resolve_person, NoteRecord, RecordIndex};

#[derive(Parser)]
#[command(name = "rootline", version, about = "Genealogical graph engine")]
struct Cli {
    /// Path to a rootline.toml configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a Gramps XML or GEDCOM file and print the summary.
    Import {
        /// Path to the interchange document (.gramps/.xml or .ged).
        file: PathBuf,

        /// Write person notes into this directory.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Export a note vault as Gramps XML or GEDCOM.
    Export {
        /// Directory containing person notes.
        vault: PathBuf,

        /// Output path; the extension picks the format (.gramps or .ged).
        #[arg(long)]
        out: PathBuf,
    },

    /// Check and repair dual-stored relationship fields in a note vault.
    Sync {
        /// Directory containing person notes.
        vault: PathBuf,

        /// Write the planned repairs back to the notes.
        #[arg(long)]
        apply: bool,
    },

    /// Compute the kinship term between two persons.
    Kin {
        /// Directory containing person notes.
        vault: PathBuf,

        /// Name or cr_id of the reference person.
        from: String,

        /// Name or cr_id of the relative.
        to: String,
    },

    /// Parse a document and print its diagnostic list.
    Info {
        /// Path to the interchange document.
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rootline=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Import { file, out } => import(&file, out.as_deref()),
        Commands::Export { vault, out } => export(&vault, &out, &config),
        Commands::Sync { vault, apply } => sync(&vault, apply),
        Commands::Kin { vault, from, to } => kin(&vault, &from, &to),
        Commands::Info { file } => info(&file),
    }
}

fn is_gedcom(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("ged") || e.eq_ignore_ascii_case("gedcom"))
}

fn import(file: &Path, out: Option<&Path>) -> Result<()> {
    let text = std::fs::read_to_string(file).into_diagnostic()?;

    let (persons, report) = if is_gedcom(file) {
        let import = gedcom::import_document(&text)?;
        println!("imported: {}", import.summary);
        (import.persons, import.report)
    } else {
        let import = gramps::import_document(&text)?;
        println!("imported: {}", import.summary);
        (import.persons, import.report)
    };

    print_report(&report);
    if !report.valid() {
        println!("import has errors; nothing was written");
        return Ok(());
    }

    if let Some(out) = out {
        std::fs::create_dir_all(out).into_diagnostic()?;
        let names = note_names(&persons);
        for person in persons.values() {
            let record = record_from_person(person, &names);
            let text = replace_frontmatter("", &record.to_fields());
            let path = out.join(format!("{}.md", names[&person.cr_id]));
            std::fs::write(&path, text).into_diagnostic()?;
        }
        println!("wrote {} notes to {}", persons.len(), out.display());
    }
    Ok(())
}

fn export(vault: &Path, out: &Path, config: &EngineConfig) -> Result<()> {
    let (notes, mut report) = load_vault(vault)?;
    let index = RecordIndex::build(&notes);
    let mut persons: Vec<Person> = Vec::new();
    for entry in &notes {
        if let Some(person) = resolve_person(entry, &index, &mut report) {
            persons.push(person);
        }
    }
    print_report(&report);
    let graph = FamilyGraph::from_persons(persons)?;

    let summary = if is_gedcom(out) {
        let options = gedcom::GedcomExportOptions {
            privacy: config.privacy.clone(),
        };
        let (text, summary) = gedcom::export(&graph, &options)?;
        std::fs::write(out, text).into_diagnostic()?;
        summary
    } else {
        let options = gramps::GrampsExportOptions {
            privacy: config.privacy.clone(),
        };
        let (text, summary) = gramps::export(&graph, &[], &BTreeMap::new(), &options)?;
        std::fs::write(out, text).into_diagnostic()?;
        summary
    };
    println!("exported: {summary}");
    for warning in &summary.warnings {
        println!("  {warning}");
    }
    Ok(())
}

fn sync(vault: &Path, apply: bool) -> Result<()> {
    let (notes, mut report) = load_vault(vault)?;
    let index = RecordIndex::build(&notes);
    let patches = plan_repairs(&notes, &index, &mut report);
    print_report(&report);

    let mut touched = 0usize;
    for (note, patch) in &patches {
        if patch.is_empty() {
            continue;
        }
        touched += 1;
        println!("{note}: {} field(s) to repair", patch.len());
        if apply {
            let path = vault.join(format!("{note}.md"));
            let text = std::fs::read_to_string(&path).into_diagnostic()?;
            let (mut fields, _) = extract_frontmatter(&text)?;
            patch.apply(&mut fields);
            std::fs::write(&path, replace_frontmatter(&text, &fields)).into_diagnostic()?;
        }
    }
    if touched == 0 {
        println!("all records consistent, nothing to repair");
    } else if apply {
        println!("repaired {touched} note(s)");
    } else {
        println!("{touched} note(s) need repair (run with --apply to write)");
    }
    Ok(())
}

fn kin(vault: &Path, from: &str, to: &str) -> Result<()> {
    let (notes, mut report) = load_vault(vault)?;
    let index = RecordIndex::build(&notes);
    let mut persons: BTreeMap<CrId, Person> = BTreeMap::new();
    for entry in &notes {
        if let Some(person) = resolve_person(entry, &index, &mut report) {
            persons.insert(person.cr_id.clone(), person);
        }
    }
    let resolve_arg = |arg: &str| -> Option<CrId> {
        CrId::new(arg)
            .filter(|id| persons.contains_key(id))
            .or_else(|| {
                persons
                    .values()
                    .find(|p| p.name.eq_ignore_ascii_case(arg))
                    .map(|p| p.cr_id.clone())
            })
    };
    let Some(from_id) = resolve_arg(from) else {
        println!("unknown person: {from}");
        return Ok(());
    };
    let Some(to_id) = resolve_arg(to) else {
        println!("unknown person: {to}");
        return Ok(());
    };

    let graph = FamilyGraph::from_persons(persons.values().cloned())?;
    match graph.shortest_kin_path(&from_id, &to_id)? {
        Some(path) => {
            let term = kinship_term(&path, &persons);
            println!("{to} is {from}'s {term} ({} step(s))", path.len());
        }
        None => println!("{from} and {to} are not connected"),
    }
    Ok(())
}

fn info(file: &Path) -> Result<()> {
    let text = std::fs::read_to_string(file).into_diagnostic()?;
    let report = if is_gedcom(file) {
        let import = gedcom::import_document(&text)?;
        println!("{}", import.summary);
        import.report
    } else {
        let import = gramps::import_document(&text)?;
        println!("{}", import.summary);
        import.report
    };
    if report.diagnostics.is_empty() {
        println!("no problems found");
    }
    print_report(&report);
    Ok(())
}

fn print_report(report: &ParseReport) {
    for diagnostic in &report.diagnostics {
        println!("  {diagnostic}");
    }
}

/// Read every `*.md` file in the vault directory into a note record.
fn load_vault(vault: &Path) -> Result<(Vec<NoteRecord>, ParseReport)> {
    let mut notes: Vec<NoteRecord> = Vec::new();
    let mut report = ParseReport::new();
    let mut entries: Vec<PathBuf> = std::fs::read_dir(vault)
        .into_diagnostic()?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("md"))
        .collect();
    entries.sort();

    for path in entries {
        let note = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_owned();
        let text = std::fs::read_to_string(&path).into_diagnostic()?;
        match extract_frontmatter(&text) {
            Ok((fields, _)) => {
                let record = PersonRecord::from_fields(&fields);
                record.validate(&note, &mut report);
                notes.push(NoteRecord { note, record });
            }
            Err(e) => report.warning(&note, format!("skipped: {e}")),
        }
    }
    Ok((notes, report))
}

/// Filesystem-safe, collision-free note names for a person set.
fn note_names(persons: &BTreeMap<CrId, Person>) -> BTreeMap<CrId, String> {
    let mut names: BTreeMap<CrId, String> = BTreeMap::new();
    let mut used: BTreeMap<String, usize> = BTreeMap::new();
    for (id, person) in persons {
        let base: String = person
            .name
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => ' ',
                other => other,
            })
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        let base = if base.is_empty() {
            id.as_str().to_owned()
        } else {
            base
        };
        let count = used.entry(base.clone()).or_insert(0);
        let name = if *count == 0 {
            base.clone()
        } else {
            format!("{base} {}", *count + 1)
        };
        *count += 1;
        names.insert(id.clone(), name);
    }
    names
}

/// Build a dual-stored note record from a canonical person.
fn record_from_person(person: &Person, names: &BTreeMap<CrId, String>) -> PersonRecord {
    let mut record = PersonRecord {
        cr_id: Some(person.cr_id.clone()),
        name: Some(person.name.clone()),
        sex: Some(person.sex),
        gender_identity: person.gender_identity.clone(),
        pronouns: person.pronouns.clone(),
        birth_date: person.birth_date.clone(),
        death_date: person.death_date.clone(),
        birth_place: person.birth_place.clone(),
        death_place: person.death_place.clone(),
        burial_place: person.burial_place.clone(),
        occupation: person.occupation.clone(),
        ..Default::default()
    };
    let link = |id: &CrId| names.get(id).map(|n| Wikilink::format(n));

    record.father.id = person.father.clone();
    record.father.link = person.father.as_ref().and_then(&link);
    record.mother.id = person.mother.clone();
    record.mother.link = person.mother.as_ref().and_then(&link);
    record.adoptive_father.id = person.adoptive_father.clone();
    record.adoptive_father.link = person.adoptive_father.as_ref().and_then(&link);
    record.adoptive_mother.id = person.adoptive_mother.clone();
    record.adoptive_mother.link = person.adoptive_mother.as_ref().and_then(&link);

    record.stepfathers.ids = person.stepfathers.clone();
    record.stepfathers.links = person.stepfathers.iter().filter_map(&link).collect();
    record.stepmothers.ids = person.stepmothers.clone();
    record.stepmothers.links = person.stepmothers.iter().filter_map(&link).collect();
    record.spouses.ids = person.spouses.clone();
    record.spouses.links = person.spouses.iter().filter_map(&link).collect();
    record.children.ids = person.children.clone();
    record.children.links = person.children.iter().filter_map(&link).collect();
    record
}
