use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::engine::EngineConfig;
use crate::error::{Error, Result};
use crate::scratch::ScratchSpace;
use crate::segregation::SymbolAliases;

#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "clap", derive(clap::Args))]
pub struct GenotypeArgs {
    /// Genotype table with columns locus, chromosome, position and one dose column per individual
    pub file: PathBuf,

    /// The two parents, i.e. -P mother,father
    #[cfg_attr(feature = "clap", arg(short = 'P', long, value_delimiter = ',', num_args = 1..))]
    pub parents: Vec<String>,

    /// Offspring to keep, one id per row
    #[cfg_attr(feature = "clap", arg(short = 'S', long))]
    pub offspring: Option<PathBuf>,

    /// Loci to keep, one id per row
    #[cfg_attr(feature = "clap", arg(long))]
    pub loci: Option<PathBuf>,

    /// Sort loci by chromosome and position before encoding
    #[cfg_attr(feature = "clap", arg(long))]
    pub sort: bool,
}

#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "clap", derive(clap::Args))]
pub struct OutputArgs {
    /// Output directory
    #[cfg_attr(feature = "clap", arg(short = 'o', long = "outdir", default_value_os_t = PathBuf::from("./"), value_hint = clap::ValueHint::DirPath))]
    pub output: PathBuf,

    /// Output filename prefix
    #[cfg_attr(feature = "clap", arg(short = 'p', long))]
    pub prefix: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "clap", derive(clap::Args))]
pub struct AliasArgs {
    /// JSON file with homozygous, heterozygous, duplicate and missing symbols
    #[cfg_attr(feature = "clap", arg(long))]
    pub alias_config: Option<PathBuf>,

    #[cfg_attr(feature = "clap", arg(long = "homozygous-symbol"))]
    pub homozygous: Option<char>,

    #[cfg_attr(feature = "clap", arg(long = "heterozygous-symbol"))]
    pub heterozygous: Option<char>,

    #[cfg_attr(feature = "clap", arg(long = "duplicate-symbol"))]
    pub duplicate: Option<char>,

    #[cfg_attr(feature = "clap", arg(long = "missing-symbol"))]
    pub missing: Option<char>,
}

impl AliasArgs {
    /// Apply the configuration file and the single symbol overrides on top of `base`
    pub fn resolve(&self, base: SymbolAliases) -> Result<SymbolAliases> {
        let mut aliases = match &self.alias_config {
            Some(path) => {
                let file = std::fs::File::open(path).map_err(|source| Error::Io {
                    path: path.clone(),
                    source,
                })?;
                serde_json::from_reader(std::io::BufReader::new(file))
                    .map_err(|e| Error::malformed(format!("alias configuration {path:?}: {e}")))?
            }
            None => base,
        };

        if let Some(c) = self.homozygous {
            aliases.homozygous = c;
        }
        if let Some(c) = self.heterozygous {
            aliases.heterozygous = c;
        }
        if let Some(c) = self.duplicate {
            aliases.duplicate = c;
        }
        if let Some(c) = self.missing {
            aliases.missing = c;
        }

        aliases.validate(std::iter::empty(), None)?;
        Ok(aliases)
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "clap", derive(clap::Args))]
pub struct EngineArgs {
    /// Engine executable
    #[cfg_attr(feature = "clap", arg(long))]
    pub engine: Option<String>,

    /// JSON file with program, args, end_marker and echo_command
    #[cfg_attr(feature = "clap", arg(long))]
    pub engine_config: Option<PathBuf>,

    /// Directory for the files handed to the engine
    #[cfg_attr(feature = "clap", arg(long, value_hint = clap::ValueHint::DirPath))]
    pub scratch_dir: Option<PathBuf>,

    /// Do not remove the scratch files
    #[cfg_attr(feature = "clap", arg(long))]
    pub keep_scratch: bool,
}

impl EngineArgs {
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = match &self.engine_config {
            Some(path) => EngineConfig::from_json(path)?,
            None => EngineConfig::default(),
        };
        if let Some(program) = &self.engine {
            config.program = program.clone();
        }
        Ok(config)
    }

    pub fn scratch(&self, prefix: Option<String>) -> ScratchSpace {
        let mut scratch = ScratchSpace::default();
        if let Some(dir) = &self.scratch_dir {
            scratch.dir = dir.clone();
        }
        if prefix.is_some() {
            scratch.prefix = prefix;
        }
        scratch.keep = self.keep_scratch;
        scratch
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum Tool {
    #[default]
    Backcross,
    Carthagene,
    Asmap,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum Listing {
    MarkerInfo,
    Pairwise,
    Groups,
    Map,
    Mstmap,
}

#[cfg(test)]
#[rustfmt::skip]
mod tests {
    use super::*;

    #[test]
    fn alias_overrides() {
        let args = AliasArgs { missing: Some('.'), ..Default::default() };
        let aliases = args.resolve(SymbolAliases::default()).unwrap();
        assert_eq!(aliases.missing, '.');
        assert_eq!(aliases.homozygous, 'A');

        let args = AliasArgs { heterozygous: Some('A'), ..Default::default() };
        assert!(matches!(args.resolve(SymbolAliases::default()), Err(Error::UnknownSymbolAlias { .. })));
    }

    #[test]
    fn alias_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aliases.json");
        std::fs::write(&path, r#"{"homozygous": "a", "heterozygous": "b", "duplicate": "d", "missing": "u"}"#).unwrap();
        let args = AliasArgs { alias_config: Some(path), duplicate: Some('x'), ..Default::default() };
        let aliases = args.resolve(SymbolAliases::default()).unwrap();
        assert_eq!(aliases, SymbolAliases { homozygous: 'a', heterozygous: 'b', duplicate: 'x', missing: 'u' });
    }

    #[test]
    fn engine_overrides() {
        let args = EngineArgs { engine: Some(String::from("/opt/cg/carthagene")), scratch_dir: Some(PathBuf::from("/tmp/x")), ..Default::default() };
        assert_eq!(args.engine_config().unwrap().program, "/opt/cg/carthagene");
        let scratch = args.scratch(Some(String::from("run1")));
        assert_eq!(scratch.dir, PathBuf::from("/tmp/x"));
        assert_eq!(scratch.prefix.as_deref(), Some("run1"));
    }
}
