// LMTK - Linkage mapping toolkit
// Copyright (C) 2024  Osma S. Rautila
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

//! LMTK - Linkage mapping toolkit
//!
//! This library and program sit between the genotypes of an outbred full-sib cross and the
//! external engines used for linkage mapping. Genotypes are classified into JoinMap style
//! segregation types, encoded into per-parent engine input files and the text listings the
//! engines print are parsed back into typed matrices, groups and maps.
//!
//! LMTK toolkit commands
//!
//! * Classify loci into segregation types (abxcd, efxeg, hkxhk, lmxll, nnxnp)
//! * Encode per-parent pseudo-testcross files for R/qtl, CarthaGene and ASMap
//! * Decode marker info, pairwise, group and map listings
//! * Flag clones with pairwise congruence
//! * Phase a segregation table from the linkage groups of both parents
//! * Drive CarthaGene sessions for grouping and ordering
//!
//! ## Running LMTK
//!
//! To print the available commands use:
//! ```bash
//! lmtk --help
//! ```
//!
//! A full run from a genotype table to parental maps:
//! ```bash
//!lmtk segregation cross.tsv -P mother,father -o ${outdir} -p pop
//!
//!lmtk carthagene ${outdir}/pop_segregation.loc --engine carthagene -o ${outdir} -p pop
//!
//!lmtk reconcile ${outdir}/pop_segregation.loc --p1-groups ${outdir}/pop_P1_groups.tsv --p2-groups ${outdir}/pop_P2_groups.tsv -o ${outdir}
//! ```

#[doc(hidden)]
pub mod args;
#[doc(hidden)]
pub mod error;
#[doc(hidden)]
pub mod io;
#[doc(hidden)]
pub mod utils;

#[cfg(feature = "clap")]
#[doc(hidden)]
pub mod clap;

/// Loci and the dose matrix of a cross
pub mod genotype;

/// Segregation types, phases and the JoinMap style table
pub mod segregation;

/// Pairwise statistics, linkage groups and ordered maps
pub mod linkage;

/// Phase assignment from the linkage groups of both parents
pub mod reconcile;

/// Line oriented sessions with external engines
pub mod engine;

/// Temporary files handed to engines
pub mod scratch;
