use std::io::BufWriter;
use std::path::PathBuf;

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;

use crate::args::OutputArgs;
use crate::io::{get_input, get_output, push_to_output};
use crate::linkage::LinkageGroups;
use crate::reconcile::{reconcile, ParentAssignment};
use crate::segregation::{write_joinmap, SymbolAliases};
use crate::subcommands::encode::read_table;

fn read_groups(path: PathBuf) -> Result<LinkageGroups> {
    LinkageGroups::read_tsv(get_input(Some(path.clone()))?).wrap_err(eyre!("Failed to read linkage groups {path:?}"))
}

#[doc(hidden)]
pub fn run(
    file: PathBuf,
    p1_groups: PathBuf,
    p2_groups: PathBuf,
    p1_reference: u32,
    p2_reference: u32,
    out: OutputArgs,
) -> Result<()> {
    let table = read_table(&file, &SymbolAliases::default())?;

    let p1 = ParentAssignment::new("P1", read_groups(p1_groups)?, p1_reference);
    let p2 = ParentAssignment::new("P2", read_groups(p2_groups)?, p2_reference);

    let (phased, crosstab) = reconcile(&table, &p1, &p2)?;

    let mut output = out.output.clone();
    push_to_output(&out.prefix, &mut output, "phased", "loc");
    write_joinmap(&phased, BufWriter::new(get_output(Some(output.clone()))?))?;
    tracing::info!("Wrote the phased table to {output:?}");

    let mut output = out.output;
    push_to_output(&out.prefix, &mut output, "phase_crosstab", "tsv");
    crosstab.write_tsv(BufWriter::new(get_output(Some(output))?))?;

    Ok(())
}
