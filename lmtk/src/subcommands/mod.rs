/// Encode a genotype table into a JoinMap style segregation table
pub mod segregation;

/// Write per-parent input files for a mapping engine
pub mod encode;

/// Parse engine listings into TSV tables
pub mod decode;

/// Flag likely duplicate individuals
pub mod clones;

/// Phase a segregation table from the linkage groups of both parents
pub mod reconcile;

/// Group and order both parents through a CarthaGene session
pub mod carthagene;
