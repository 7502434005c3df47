//! Command-line and environment configuration.
//!
//! Every setting has a flag; the storage, data and species settings also
//! fall back to `XERODB_*` environment variables.

use clap::Parser;
use std::path::{Path, PathBuf};
use xerodb_core::{
    default_log_dir, default_log_level, DEFAULT_BATCH_SIZE, DEFAULT_DATABASE_NAME, DEFAULT_SPECIES,
};

pub const DEFAULT_DATA_DIR: &str = "data";

pub const RNA_SEQ_FILE: &str = "Xe_seedlings_normalised_counts_tidy.csv";
pub const SEQUENCE_FILE: &str = "Xelegans_CDS_annot150424.fasta";
pub const ANNOTATION_FILE: &str = "Xelegans_topBlasthit_Arabidopsis_annot150424.csv";
pub const UNIPROT_FILE: &str = "uniprot_to_At_gene_all.csv";
pub const GO_TERMS_FILE: &str = "go_terms.csv";
pub const GO_ANNOTATIONS_FILE: &str = "gene_go_annotations.csv";
pub const DIFFERENTIAL_EXPRESSION_FILE: &str = "differential_expression.csv";

#[derive(Debug, Parser)]
#[command(name = "xerodb")]
#[command(version)]
#[command(about = "Build and query the Xerophyta gene-expression store")]
#[command(long_about = r#"
xerodb - load and inspect the Xerophyta gene-expression SQLite store

COMMANDS:
  create_db           Delete and recreate the database (needs --yes)
  init                create_db, then add_seq and add_rna_seq (needs --yes)
  add_rna_seq         Load normalised RNA-seq counts
  add_genes           Register the genes named in the RNA-seq table
  add_seq             Load coding sequences from FASTA
  add_gene_info       Load top-hit annotations
  add_uniprot         Load the UniProt to Arabidopsis mapping
  add_go_terms        Load the GO vocabulary
  add_go_annotations  Load gene to GO term annotations
  add_de              Load differential-expression classifications
  link_experiment     Link --experiment to --species
  get_expression      Print times and treatments measured for a gene
"#)]
pub struct Args {
    /// Command to run.
    pub command: String,

    #[arg(
        long,
        value_name = "FILE",
        env = "XERODB_PATH",
        default_value = DEFAULT_DATABASE_NAME
    )]
    pub db: PathBuf,

    #[arg(
        long = "data-dir",
        value_name = "DIR",
        env = "XERODB_DATA_DIR",
        default_value = DEFAULT_DATA_DIR
    )]
    pub data_dir: PathBuf,

    /// Input file, replacing the command's default file under --data-dir.
    #[arg(long, value_name = "FILE")]
    pub file: Option<PathBuf>,

    #[arg(long, env = "XERODB_SPECIES", default_value = DEFAULT_SPECIES)]
    pub species: String,

    /// Experiment for rows without one, and the target of link_experiment.
    #[arg(long)]
    pub experiment: Option<String>,

    /// Records per committed transaction.
    #[arg(long = "batch-size", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    #[arg(long = "log-level", env = "XERODB_LOG_LEVEL")]
    pub log_level: Option<String>,

    #[arg(long = "log-dir", value_name = "DIR", env = "XERODB_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Confirm destructive commands.
    #[arg(long)]
    pub yes: bool,
}

impl Args {
    /// Input path for a command: `--file` or `<data dir>/<default_name>`.
    pub fn input_path(&self, default_name: &str) -> PathBuf {
        self.file
            .clone()
            .unwrap_or_else(|| self.data_dir.join(default_name))
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(default_log_level())
    }

    /// Absolute log directory; relative values resolve against `cwd`.
    pub fn log_dir(&self, cwd: &Path) -> PathBuf {
        match &self.log_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => cwd.join(dir),
            None => default_log_dir(cwd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Args, RNA_SEQ_FILE};
    use clap::Parser;
    use std::path::{Path, PathBuf};

    #[test]
    fn defaults_follow_project_layout() {
        let args = Args::try_parse_from(["xerodb", "add_rna_seq"]).unwrap();
        assert_eq!(args.command, "add_rna_seq");
        assert_eq!(
            args.input_path(RNA_SEQ_FILE),
            Path::new("data").join(RNA_SEQ_FILE)
        );
        assert_eq!(args.batch_size, 1000);
        assert!(!args.yes);
    }

    #[test]
    fn file_flag_overrides_default_input() {
        let args =
            Args::try_parse_from(["xerodb", "add_seq", "--file", "/tmp/cds.fasta"]).unwrap();
        assert_eq!(args.input_path("ignored.fasta"), PathBuf::from("/tmp/cds.fasta"));
    }

    #[test]
    fn relative_log_dir_resolves_against_cwd() {
        let args = Args::try_parse_from(["xerodb", "init", "--log-dir", "out/logs"]).unwrap();
        assert_eq!(
            args.log_dir(Path::new("/work")),
            PathBuf::from("/work/out/logs")
        );

        let args = Args::try_parse_from(["xerodb", "init"]).unwrap();
        assert_eq!(args.log_dir(Path::new("/work")), PathBuf::from("/work/logs"));
    }
}
