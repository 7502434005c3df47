use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use xerodb_core::{
    BatchLoader, DegFilter, ExpressionQuery, ExpressionRepository, GeneRepository, GeneStore,
    GoRepository, HomologueRepository, LoadError, LoadOptions, RepoError, DEFAULT_SPECIES,
};

const RNA_SEQ: &str = "\
id,gene_name,treatment,time,replicate,normalised_counts,log2_counts
S1,Xe_0001,dehydration,T0,1,12.5,3.64
S2,Xe_0001,dehydration,T1,1,40.0,5.32
S1,Xe_0002,dehydration,T0,1,3.0,1.58
";

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn seedlings() -> LoadOptions {
    LoadOptions {
        experiment: Some("seedlings".to_string()),
        ..LoadOptions::default()
    }
}

fn load_genes_and_hits(store: &mut GeneStore, dir: &TempDir) {
    let rna_seq = write(dir, "rna_seq.csv", RNA_SEQ);
    let annotations = write(
        dir,
        "annotations.csv",
        "gene_name,sequence_description,Hit_ACC\n\
         Xe_0001,Dehydrin ERD10,P42759\n\
         Xe_0002,Unknown protein,\n",
    );
    let mut loader = BatchLoader::new(store);
    loader.load_gene_names(&rna_seq).unwrap();
    loader.load_annotations(&annotations).unwrap();
}

fn expression_ids(store: &GeneStore, gene_name: &str) -> Vec<String> {
    let mut ids: Vec<String> = store
        .expressions()
        .expression_for_gene(gene_name)
        .unwrap()
        .into_iter()
        .map(|expression| expression.id)
        .collect();
    ids.sort();
    ids
}

#[test]
fn rna_seq_rows_get_composite_ids_and_a_linked_experiment() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "rna_seq.csv", RNA_SEQ);
    let mut store = GeneStore::open_in_memory().unwrap();

    let report = BatchLoader::with_options(&mut store, seedlings())
        .load_rna_seq(&path)
        .unwrap();

    assert_eq!(report.rows_read, 3);
    assert_eq!((report.inserted, report.updated), (3, 0));
    assert_eq!(report.conflicts, 0);
    assert_eq!(
        expression_ids(&store, "Xe_0001"),
        vec!["S1_Xe_0001".to_string(), "S2_Xe_0001".to_string()]
    );
    let stored = store.expressions().expression_for_gene("Xe_0002").unwrap();
    assert_eq!(stored[0].experiment_name.as_deref(), Some("seedlings"));
    assert_eq!(stored[0].normalised_expression, Some(3.0));

    let species = store
        .genes()
        .species_by_name(DEFAULT_SPECIES)
        .unwrap()
        .unwrap();
    let experiment = store
        .expressions()
        .experiment_by_name("seedlings")
        .unwrap()
        .unwrap();
    assert_eq!(experiment.species_id, Some(species.id));
}

#[test]
fn experiment_on_another_species_is_reported_as_a_conflict() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "rna_seq.csv", RNA_SEQ);
    let mut store = GeneStore::open_in_memory().unwrap();
    store
        .link_experiment_species("seedlings", "Xerophyta humilis")
        .unwrap();

    let report = BatchLoader::with_options(&mut store, seedlings())
        .load_rna_seq(&path)
        .unwrap();

    assert_eq!(report.conflicts, 1);
    assert_eq!(report.inserted, 3);
    let humilis = store
        .genes()
        .species_by_name("Xerophyta humilis")
        .unwrap()
        .unwrap();
    let experiment = store
        .expressions()
        .experiment_by_name("seedlings")
        .unwrap()
        .unwrap();
    assert_eq!(experiment.species_id, Some(humilis.id));

    let reload = BatchLoader::with_options(&mut store, seedlings())
        .load_rna_seq(&path)
        .unwrap();
    assert_eq!(reload.conflicts, 1);
}

#[test]
fn reloading_rna_seq_updates_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "rna_seq.csv", RNA_SEQ);
    let mut store = GeneStore::open_in_memory().unwrap();

    BatchLoader::with_options(&mut store, seedlings())
        .load_rna_seq(&path)
        .unwrap();
    let again = BatchLoader::with_options(&mut store, seedlings())
        .load_rna_seq(&path)
        .unwrap();

    assert_eq!((again.inserted, again.updated), (0, 3));
    assert_eq!(
        store.expressions().genes_with_expression_data().unwrap(),
        vec!["Xe_0001".to_string(), "Xe_0002".to_string()]
    );
}

#[test]
fn gene_names_are_registered_once_per_species() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "rna_seq.csv", RNA_SEQ);
    let mut store = GeneStore::open_in_memory().unwrap();

    let report = BatchLoader::new(&mut store).load_gene_names(&path).unwrap();

    assert_eq!(report.rows_read, 3);
    assert_eq!(report.inserted, 2);
    assert_eq!(
        store.genes().gene_names().unwrap(),
        vec!["Xe_0001".to_string(), "Xe_0002".to_string()]
    );
    let species = store
        .genes()
        .species_by_name(DEFAULT_SPECIES)
        .unwrap()
        .unwrap();
    let gene = store
        .genes()
        .gene_by_name("Xe_0001", Some(species.id))
        .unwrap();
    assert!(gene.is_some());
}

#[test]
fn sequences_attach_to_existing_genes() {
    let dir = tempfile::tempdir().unwrap();
    let fasta = write(
        &dir,
        "sequences.fasta",
        ">Xe_0001 dehydrin\nATGAAA\nTTTTAG\n>Xe_0003\nATGCCCTAA\n",
    );
    let rna_seq = write(&dir, "rna_seq.csv", RNA_SEQ);
    let mut store = GeneStore::open_in_memory().unwrap();

    BatchLoader::new(&mut store).load_gene_names(&rna_seq).unwrap();
    let report = BatchLoader::new(&mut store).load_sequences(&fasta).unwrap();

    assert_eq!(report.rows_read, 2);
    assert_eq!((report.inserted, report.updated), (1, 1));
    let gene = store.genes().gene_by_name("Xe_0001", None).unwrap().unwrap();
    assert_eq!(gene.nt_sequence.as_deref(), Some("ATGAAATTTTAG"));
    let new_gene = store.genes().gene_by_name("Xe_0003", None).unwrap().unwrap();
    assert_eq!(new_gene.nt_sequence.as_deref(), Some("ATGCCCTAA"));
}

#[test]
fn annotations_accept_the_hit_accession_header() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = GeneStore::open_in_memory().unwrap();
    load_genes_and_hits(&mut store, &dir);

    let info = store.genes().gene_info("Xe_0001").unwrap().unwrap();
    assert_eq!(info.hit_acc.as_deref(), Some("P42759"));
    let unannotated = store.genes().gene_info("Xe_0002").unwrap().unwrap();
    assert_eq!(unannotated.hit_acc, None);
    assert_eq!(
        store.genes().hit_accessions().unwrap(),
        vec!["P42759".to_string()]
    );
}

#[test]
fn uniprot_mapping_stores_homologues_and_links_hits() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = GeneStore::open_in_memory().unwrap();
    load_genes_and_hits(&mut store, &dir);
    let mapping = write(
        &dir,
        "uniprot.csv",
        "Hit_ACC,Entry,Gene Names,Protein names\n\
         P42759,P42759,ERD10 LTI45 At1g20450 F5M15.5,Dehydrin ERD10\n\
         Q9SLJ2,Q9SLJ2,RAB18,Dehydrin Rab18\n",
    );

    let report = BatchLoader::new(&mut store)
        .load_uniprot_mapping(&mapping)
        .unwrap();

    assert_eq!(report.rows_read, 2);
    assert_eq!(report.linked, 1);
    let homologue = store.homologues().homologue("P42759").unwrap().unwrap();
    assert_eq!(homologue.at_locus_id.as_deref(), Some("AT1G20450"));
    assert_eq!(homologue.description.as_deref(), Some("Dehydrin ERD10"));
    assert_eq!(
        store.homologues().common_names_for("P42759").unwrap(),
        vec!["ERD10".to_string(), "LTI45".to_string(), "F5M15.5".to_string()]
    );
    let unlinked = store.homologues().homologue("Q9SLJ2").unwrap().unwrap();
    assert_eq!(unlinked.at_locus_id, None);

    let result = store
        .homologues()
        .genes_for_arabidopsis(&["AT1G20450".to_string(), "RAB18".to_string()])
        .unwrap();
    assert_eq!(result.matched, vec!["AT1G20450".to_string()]);
    assert_eq!(result.unmatched, vec!["RAB18".to_string()]);
    assert_eq!(result.rows[0].gene_name, "Xe_0001");

    let again = BatchLoader::new(&mut store)
        .load_uniprot_mapping(&mapping)
        .unwrap();
    assert_eq!(again.linked, 0);
    assert_eq!(again.inserted, 0);
}

#[test]
fn go_terms_and_annotations_load_together() {
    let dir = tempfile::tempdir().unwrap();
    let terms = write(
        &dir,
        "go_terms.csv",
        "go_id,go_name,category\n\
         P:0009414,response to water deprivation,\n\
         GO:0003677,DNA binding,F\n",
    );
    let annotations = write(
        &dir,
        "gene_go_annotations.csv",
        "gene_name,go_id\n\
         Xe_0001,0009414\n\
         Xe_0002,GO:0003677\n\
         Xe_0001,P:0009414\n",
    );
    let mut store = GeneStore::open_in_memory().unwrap();

    let loaded = BatchLoader::new(&mut store).load_go_terms(&terms).unwrap();
    assert_eq!(loaded.inserted, 2);
    let term = store.go_terms().go_term("0003677").unwrap().unwrap();
    assert_eq!(term.go_id, "F:0003677");

    let report = BatchLoader::new(&mut store)
        .load_go_annotations(&annotations)
        .unwrap();
    assert_eq!(report.rows_read, 3);
    assert_eq!(report.linked, 2);
    let result = store
        .go_terms()
        .genes_for_go_terms(&["F:0003677".to_string()])
        .unwrap();
    assert_eq!(result.rows[0].gene_name, "Xe_0002");
}

#[test]
fn go_term_without_category_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let terms = write(
        &dir,
        "go_terms.csv",
        "go_id,go_name,category\n\
         P:0009414,response to water deprivation,\n\
         0003677,DNA binding,\n",
    );
    let mut store = GeneStore::open_in_memory().unwrap();

    let err = BatchLoader::new(&mut store).load_go_terms(&terms).unwrap_err();

    assert!(matches!(
        err,
        LoadError::MissingValue {
            line: 3,
            column: "category",
            ..
        }
    ));
    assert!(store.go_terms().go_term("P:0009414").unwrap().is_none());
}

#[test]
fn annotation_with_unknown_term_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let terms = write(
        &dir,
        "go_terms.csv",
        "go_id,go_name,category\nP:0009414,response to water deprivation,\n",
    );
    let annotations = write(
        &dir,
        "gene_go_annotations.csv",
        "gene_name,go_id\nXe_0001,P:0009414\nXe_0002,C:0005634\n",
    );
    let mut store = GeneStore::open_in_memory().unwrap();
    BatchLoader::new(&mut store).load_go_terms(&terms).unwrap();

    let err = BatchLoader::new(&mut store)
        .load_go_annotations(&annotations)
        .unwrap_err();

    assert!(matches!(
        err,
        LoadError::Repo(RepoError::UnknownReference {
            kind: "go_terms",
            ..
        })
    ));
    assert!(store.go_terms().go_terms_for_gene("Xe_0001").unwrap().is_empty());
}

#[test]
fn differential_expression_drives_deg_filters() {
    let dir = tempfile::tempdir().unwrap();
    let rna_seq = write(&dir, "rna_seq.csv", RNA_SEQ);
    let de = write(
        &dir,
        "differential_expression.csv",
        "gene_name,experiment_name,re_set,re_direction,de_set,de_direction\n\
         Xe_0001,seedlings,,,DE,UP\n\
         Xe_0002,seedlings,RE,down,,\n",
    );
    let mut store = GeneStore::open_in_memory().unwrap();
    BatchLoader::with_options(&mut store, seedlings())
        .load_rna_seq(&rna_seq)
        .unwrap();

    let report = BatchLoader::new(&mut store)
        .load_differential_expression(&de)
        .unwrap();
    assert_eq!(report.inserted, 2);

    let up = ExpressionQuery {
        deg_filter: DegFilter::ShowUp,
        ..ExpressionQuery::for_experiment("seedlings")
    };
    let rows = store.expressions().expression_table(&up).unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|row| row.gene_name == "Xe_0001"));

    let classification = store
        .expressions()
        .differential_expression("Xe_0002", "seedlings")
        .unwrap()
        .unwrap();
    assert_eq!(classification.de_direction, None);
    assert_eq!(classification.re_set.as_deref(), Some("RE"));
}

#[test]
fn malformed_row_aborts_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        &dir,
        "rna_seq.csv",
        "id,gene_name,treatment,time,replicate,normalised_counts,log2_counts\n\
         S1,Xe_0001,dehydration,T0,1,12.5,3.64\n\
         S2,Xe_0002,dehydration,T0,first,3.0,1.58\n",
    );
    let mut store = GeneStore::open_in_memory().unwrap();

    let err = BatchLoader::with_options(&mut store, seedlings())
        .load_rna_seq(&path)
        .unwrap_err();

    assert!(matches!(err, LoadError::Csv { .. }));
    assert!(store
        .expressions()
        .genes_with_expression_data()
        .unwrap()
        .is_empty());
    assert!(store.expressions().experiments().unwrap().is_empty());
}

#[test]
fn unknown_columns_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        &dir,
        "annotations.csv",
        "gene_name,sequence_description,Hit_ACC,colour\nXe_0001,dehydrin,P42759,red\n",
    );
    let mut store = GeneStore::open_in_memory().unwrap();

    let err = BatchLoader::new(&mut store)
        .load_annotations(&path)
        .unwrap_err();
    assert!(matches!(err, LoadError::Csv { .. }));
    assert!(store.genes().gene_info("Xe_0001").unwrap().is_none());
}

#[test]
fn blank_required_cell_reports_its_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        &dir,
        "rna_seq.csv",
        "id,gene_name,treatment\nS1,Xe_0001,dehydration\nS2,  ,dehydration\n",
    );
    let mut store = GeneStore::open_in_memory().unwrap();

    let err = BatchLoader::new(&mut store).load_rna_seq(&path).unwrap_err();

    match err {
        LoadError::MissingValue { path: at, line, column } => {
            assert_eq!(at, path);
            assert_eq!(line, 3);
            assert_eq!(column, "gene_name");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_file_is_an_io_error() {
    let mut store = GeneStore::open_in_memory().unwrap();
    let err = BatchLoader::new(&mut store)
        .load_sequences(Path::new("/nonexistent/sequences.fasta"))
        .unwrap_err();
    assert!(matches!(err, LoadError::Io { .. }));
}
