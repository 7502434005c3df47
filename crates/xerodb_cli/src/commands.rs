//! Command dispatch.
//!
//! Commands are plain words (`add_rna_seq`, `get_expression`, ...) so
//! existing scripts keep working; unknown words are reported, not rejected.

use crate::config::{
    Args, ANNOTATION_FILE, DIFFERENTIAL_EXPRESSION_FILE, GO_ANNOTATIONS_FILE, GO_TERMS_FILE,
    RNA_SEQ_FILE, SEQUENCE_FILE, UNIPROT_FILE,
};
use anyhow::{bail, Context, Result};
use log::{info, warn};
use std::io::{self, BufRead, Write};
use std::path::Path;
use xerodb_core::{
    BatchLoader, ExpressionRepository, GeneStore, LinkOutcome, LoadOptions, LoadReport,
    UpsertOptions,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    CreateDb,
    Init,
    AddRnaSeq,
    AddGenes,
    AddSeq,
    AddGeneInfo,
    AddUniprot,
    AddGoTerms,
    AddGoAnnotations,
    AddDe,
    LinkExperiment,
    GetExpression,
    GetChats,
}

impl Command {
    pub fn parse(word: &str) -> Option<Self> {
        match word.trim() {
            "create_db" => Some(Self::CreateDb),
            "init" => Some(Self::Init),
            "add_rna_seq" => Some(Self::AddRnaSeq),
            "add_genes" => Some(Self::AddGenes),
            "add_seq" => Some(Self::AddSeq),
            "add_gene_info" => Some(Self::AddGeneInfo),
            "add_uniprot" => Some(Self::AddUniprot),
            "add_go_terms" => Some(Self::AddGoTerms),
            "add_go_annotations" => Some(Self::AddGoAnnotations),
            "add_de" => Some(Self::AddDe),
            "link_experiment" => Some(Self::LinkExperiment),
            "get_expression" => Some(Self::GetExpression),
            "get_chats" => Some(Self::GetChats),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::CreateDb => "create_db",
            Self::Init => "init",
            Self::AddRnaSeq => "add_rna_seq",
            Self::AddGenes => "add_genes",
            Self::AddSeq => "add_seq",
            Self::AddGeneInfo => "add_gene_info",
            Self::AddUniprot => "add_uniprot",
            Self::AddGoTerms => "add_go_terms",
            Self::AddGoAnnotations => "add_go_annotations",
            Self::AddDe => "add_de",
            Self::LinkExperiment => "link_experiment",
            Self::GetExpression => "get_expression",
            Self::GetChats => "get_chats",
        }
    }
}

/// Runs the command named in `args`.
pub fn run(args: &Args) -> Result<()> {
    let Some(command) = Command::parse(&args.command) else {
        warn!(
            "event=command module=cli status=unrecognized command={}",
            args.command
        );
        println!("Unrecognized command");
        return Ok(());
    };
    info!("event=command module=cli status=start command={}", command.name());

    match command {
        Command::CreateDb => {
            confirm_destructive(args, command)?;
            recreate(args)?;
        }
        Command::Init => {
            confirm_destructive(args, command)?;
            let mut store = recreate(args)?;
            load_sequences(args, &mut store)?;
            load_rna_seq(args, &mut store)?;
        }
        Command::AddRnaSeq => load_rna_seq(args, &mut open(args)?)?,
        Command::AddGenes => {
            let path = args.input_path(RNA_SEQ_FILE);
            let mut store = open(args)?;
            let report = loader(args, &mut store).load_gene_names(&path);
            print_report(&path, report?);
        }
        Command::AddSeq => load_sequences(args, &mut open(args)?)?,
        Command::AddGeneInfo => {
            let path = args.input_path(ANNOTATION_FILE);
            let mut store = open(args)?;
            let report = loader(args, &mut store).load_annotations(&path);
            print_report(&path, report?);
        }
        Command::AddUniprot => {
            let path = args.input_path(UNIPROT_FILE);
            let mut store = open(args)?;
            let report = loader(args, &mut store).load_uniprot_mapping(&path);
            print_report(&path, report?);
        }
        Command::AddGoTerms => {
            let path = args.input_path(GO_TERMS_FILE);
            let mut store = open(args)?;
            let report = loader(args, &mut store).load_go_terms(&path);
            print_report(&path, report?);
        }
        Command::AddGoAnnotations => {
            let path = args.input_path(GO_ANNOTATIONS_FILE);
            let mut store = open(args)?;
            let report = loader(args, &mut store).load_go_annotations(&path);
            print_report(&path, report?);
        }
        Command::AddDe => {
            let path = args.input_path(DIFFERENTIAL_EXPRESSION_FILE);
            let mut store = open(args)?;
            let report = loader(args, &mut store).load_differential_expression(&path);
            print_report(&path, report?);
        }
        Command::LinkExperiment => link_experiment(args)?,
        Command::GetExpression => get_expression(args)?,
        Command::GetChats => get_chats()?,
    }

    info!("event=command module=cli status=ok command={}", command.name());
    Ok(())
}

fn confirm_destructive(args: &Args, command: Command) -> Result<()> {
    if !args.yes {
        bail!(
            "`{}` deletes every row in `{}`; rerun with --yes to confirm",
            command.name(),
            args.db.display()
        );
    }
    Ok(())
}

fn open(args: &Args) -> Result<GeneStore> {
    let store = GeneStore::open(&args.db)
        .with_context(|| format!("open database `{}`", args.db.display()))?;
    Ok(store.with_options(upsert_options(args)))
}

fn recreate(args: &Args) -> Result<GeneStore> {
    println!("Recreating database `{}`", args.db.display());
    let store = GeneStore::recreate(&args.db)
        .with_context(|| format!("recreate database `{}`", args.db.display()))?;
    println!("Schema created");
    Ok(store.with_options(upsert_options(args)))
}

fn upsert_options(args: &Args) -> UpsertOptions {
    UpsertOptions {
        batch_size: args.batch_size,
    }
}

fn loader<'store>(args: &Args, store: &'store mut GeneStore) -> BatchLoader<'store> {
    BatchLoader::with_options(
        store,
        LoadOptions {
            species: args.species.clone(),
            experiment: args.experiment.clone(),
        },
    )
}

fn load_rna_seq(args: &Args, store: &mut GeneStore) -> Result<()> {
    let path = args.input_path(RNA_SEQ_FILE);
    let report = loader(args, store).load_rna_seq(&path);
    print_report(&path, report?);
    Ok(())
}

fn load_sequences(args: &Args, store: &mut GeneStore) -> Result<()> {
    let path = args.input_path(SEQUENCE_FILE);
    let report = loader(args, store).load_sequences(&path);
    print_report(&path, report?);
    Ok(())
}

fn print_report(path: &Path, report: LoadReport) {
    println!(
        "{}: {} rows read, {} inserted, {} updated, {} linked",
        path.display(),
        report.rows_read,
        report.inserted,
        report.updated,
        report.linked
    );
    if report.conflicts > 0 {
        println!(
            "{}: {} experiment(s) already belong to another species and were left unchanged",
            path.display(),
            report.conflicts
        );
    }
}

fn link_experiment(args: &Args) -> Result<()> {
    let Some(experiment) = args.experiment.as_deref() else {
        bail!("link_experiment needs --experiment <NAME>");
    };
    let mut store = open(args)?;
    match store.link_experiment_species(experiment, &args.species)? {
        LinkOutcome::Linked => println!("Linked `{experiment}` to `{}`", args.species),
        LinkOutcome::AlreadyLinked => {
            println!("`{experiment}` is already linked to `{}`", args.species)
        }
        LinkOutcome::Conflict { existing } => println!(
            "`{experiment}` belongs to `{}`; left unchanged",
            existing.name
        ),
    }
    Ok(())
}

fn get_expression(args: &Args) -> Result<()> {
    let gene_name = prompt("Gene name:")?;
    let store = open(args)?;
    let expressions = store.expressions().expression_for_gene(&gene_name)?;

    let times: Vec<&str> = expressions
        .iter()
        .map(|expression| expression.time.as_deref().unwrap_or(""))
        .collect();
    let treatments: Vec<&str> = expressions
        .iter()
        .map(|expression| expression.treatment.as_deref().unwrap_or(""))
        .collect();

    println!();
    println!("{times:?}");
    println!("{treatments:?}");
    Ok(())
}

// Chat storage was dropped from the schema; the command only explains that.
fn get_chats() -> Result<()> {
    let users = prompt("Users: ")?;
    let users: Vec<&str> = users.split_whitespace().collect();
    warn!(
        "event=command module=cli status=unsupported command=get_chats users={}",
        users.len()
    );
    println!("Chat storage is not supported by this database");
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{label}")?;
    stdout.flush()?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("read from stdin")?;
    Ok(line.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::Command;

    #[test]
    fn every_command_word_round_trips() {
        let words = [
            "create_db",
            "init",
            "add_rna_seq",
            "add_genes",
            "add_seq",
            "add_gene_info",
            "add_uniprot",
            "add_go_terms",
            "add_go_annotations",
            "add_de",
            "link_experiment",
            "get_expression",
            "get_chats",
        ];
        for word in words {
            let command = Command::parse(word).unwrap();
            assert_eq!(command.name(), word);
        }
    }

    #[test]
    fn unknown_words_are_not_commands() {
        assert_eq!(Command::parse("add_users"), None);
        assert_eq!(Command::parse(""), None);
    }
}
