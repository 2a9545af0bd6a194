#![allow(dead_code)]
use std::path::PathBuf;

use color_eyre::Result;

use lmtk::{
    genotype::{read_genotype_table, GenotypeMatrix},
    segregation::{encode, SegregationTable, SymbolAliases},
};

pub const TEST_CROSS: &str = "tests/data/cross.tsv";
pub const PARENTS: [&str; 2] = ["P1", "P2"];
pub const OFFSPRING: [&str; 8] = ["F1", "F2", "F3", "F4", "F5", "F6", "F7", "F8"];

pub fn create_test_matrix() -> Result<GenotypeMatrix> {
    Ok(read_genotype_table(PathBuf::from(TEST_CROSS))?)
}

pub fn create_test_table() -> Result<SegregationTable> {
    let matrix = create_test_matrix()?;
    Ok(encode(&matrix, &PARENTS, &SymbolAliases::default())?)
}

#[cfg(feature = "clap")]
pub fn silent_verbosity() -> lmtk::clap::LogAndVerbosity {
    lmtk::clap::LogAndVerbosity {
        verbosity: 1,
        log_file: None,
        silent: false,
    }
}

#[cfg(feature = "clap")]
pub fn output_args(dir: &std::path::Path, prefix: Option<&str>) -> lmtk::args::OutputArgs {
    lmtk::args::OutputArgs {
        output: dir.to_path_buf(),
        prefix: prefix.map(String::from),
    }
}
