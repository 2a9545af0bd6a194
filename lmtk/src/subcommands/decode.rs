use std::io::BufWriter;
use std::path::PathBuf;

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;

use crate::adapters::asmap::parse_mstmap_output;
use crate::adapters::carthagene::{parse_groups, parse_marker_info, parse_ordered_map, parse_pairwise, MarkerTable};
use crate::args::Listing;
use crate::io::{get_buffered_input, get_output};
use crate::linkage::{write_maps_tsv, StatKind};

fn read_markers(path: Option<PathBuf>) -> Result<Option<MarkerTable>> {
    match path {
        Some(path) => {
            let table = parse_marker_info(get_buffered_input(Some(path.clone()))?)
                .wrap_err(eyre!("Failed to parse the marker info listing {path:?}"))?;
            Ok(Some(table))
        }
        None => Ok(None),
    }
}

#[doc(hidden)]
pub fn run(
    file: PathBuf,
    listing: Listing,
    markers: Option<PathBuf>,
    stat: StatKind,
    output: Option<PathBuf>,
) -> Result<()> {
    let markers = read_markers(markers)?;
    let input = get_buffered_input(Some(file.clone()))?;
    let writer = BufWriter::new(get_output(output)?);

    let required = |markers: &Option<MarkerTable>| {
        markers
            .clone()
            .ok_or_else(|| eyre!("Decoding {listing:?} needs the marker info listing (--markers)"))
    };

    match listing {
        Listing::MarkerInfo => {
            let table = parse_marker_info(input).wrap_err(eyre!("Failed to parse {file:?}"))?;
            tracing::info!("{} markers", table.len());
            table.write_tsv(writer)?
        }
        Listing::Pairwise => {
            let markers = required(&markers)?;
            let matrix = parse_pairwise(input, &markers, stat).wrap_err(eyre!("Failed to parse {file:?}"))?;
            tracing::info!("{0}x{0} matrix, {1} pairs missing", matrix.len(), matrix.missing_pairs());
            matrix.write_tsv(writer)?
        }
        Listing::Groups => {
            let markers = required(&markers)?;
            let groups = parse_groups(input, &markers).wrap_err(eyre!("Failed to parse {file:?}"))?;
            tracing::info!("{} loci in {} groups", groups.records.len(), groups.groups().len());
            groups.write_tsv(writer)?
        }
        Listing::Map => {
            let maps = parse_ordered_map(input, markers.as_ref()).wrap_err(eyre!("Failed to parse {file:?}"))?;
            tracing::info!("{} maps", maps.len());
            write_maps_tsv(&maps, writer)?
        }
        Listing::Mstmap => {
            let maps = parse_mstmap_output(input).wrap_err(eyre!("Failed to parse {file:?}"))?;
            tracing::info!("{} maps", maps.len());
            write_maps_tsv(&maps, writer)?
        }
    }

    Ok(())
}
