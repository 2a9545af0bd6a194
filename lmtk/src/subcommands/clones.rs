use std::io::BufWriter;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{ensure, eyre, WrapErr};
use color_eyre::Result;

use crate::adapters::asmap::{congruence_matrix, flag_clones, mstmap_aliases, Asmap};
use crate::adapters::backcross::Backcross;
use crate::adapters::carthagene::CarthaGene;
use crate::adapters::{Adapter, CallMatrix};
use crate::args::{AliasArgs, Tool};
use crate::io::{get_buffered_input, get_output, get_strict_tsv_writer, read_ids};
use crate::segregation::{Parent, SymbolAliases};
use crate::utils::precision_f64;

fn read_matrix(file: &Path, tool: Tool, individuals: Option<PathBuf>, aliases: &AliasArgs) -> Result<CallMatrix> {
    let input = get_buffered_input(Some(file.to_path_buf()))?;
    let matrix = match tool {
        Tool::Backcross => Backcross {
            aliases: aliases.resolve(SymbolAliases::default())?,
            ..Default::default()
        }
        .read(input, Parent::P1)?,
        Tool::Carthagene => {
            let individuals = individuals
                .ok_or_else(|| eyre!("CarthaGene raw files carry no individual ids, supply them with --individuals"))?;
            CarthaGene {
                aliases: aliases.resolve(SymbolAliases::default())?,
                individuals: read_ids(&individuals)?,
            }
            .read(input, Parent::P1)?
        }
        Tool::Asmap => Asmap {
            aliases: aliases.resolve(mstmap_aliases())?,
            ..Default::default()
        }
        .read(input, Parent::P1)?,
    };
    Ok(matrix)
}

#[doc(hidden)]
pub fn run(
    file: PathBuf,
    tool: Tool,
    individuals: Option<PathBuf>,
    aliases: AliasArgs,
    threshold: f64,
    matrix_out: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    ensure!((0.0..=1.0).contains(&threshold), "Congruence threshold has to be between 0 and 1");

    let matrix = read_matrix(&file, tool, individuals, &aliases)
        .wrap_err(eyre!("Failed to read the encoded matrix {file:?}"))?;
    tracing::info!("{} loci of {} individuals", matrix.nloci(), matrix.nindividuals());

    let congruence = congruence_matrix(&matrix)?;
    if let Some(path) = matrix_out {
        congruence.write_tsv(BufWriter::new(get_output(Some(path))?))?;
    }

    let clones = flag_clones(&congruence, threshold);
    tracing::info!("{} candidate clone pairs at congruence >= {threshold}", clones.len());

    let mut writer = get_strict_tsv_writer(BufWriter::new(get_output(output)?));
    writer.write_record(["first", "second", "congruence"])?;
    for pair in clones {
        let congruence = precision_f64(pair.congruence, 4).to_string();
        writer.write_record([pair.first.as_str(), pair.second.as_str(), congruence.as_str()])?;
    }
    writer.flush()?;

    Ok(())
}
