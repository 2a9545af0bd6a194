use std::collections::BTreeSet;
use std::io::{BufRead, Write};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::genotype::{Dose, GenotypeMatrix, Locus};

/// Segregation classes of a cross between two outbred parents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegregationType {
    Abxcd,
    Efxeg,
    Hkxhk,
    Lmxll,
    Nnxnp,
}

use SegregationType::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Parent {
    P1,
    P2,
}

impl std::fmt::Display for Parent {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::P1 => write!(f, "P1"),
            Self::P2 => write!(f, "P2"),
        }
    }
}

impl SegregationType {
    pub const ALL: [SegregationType; 5] = [Abxcd, Efxeg, Hkxhk, Lmxll, Nnxnp];

    /// Classify a locus from the allele pairs of the two parents.
    ///
    /// Returns the class and the four alleles reordered within each parent so
    /// that they line up with the class letters, e.g. for `efxeg` the shared
    /// allele is first in both parents. `None` when neither parent
    /// segregates.
    ///
    /// An `lmxll` or `nnxnp` locus whose parents share no allele (`ab x cc`)
    /// cannot line up with the letters and keeps the input order.
    pub fn classify(p1: [char; 2], p2: [char; 2]) -> Option<(Self, [char; 4])> {
        let [a, b] = p1;
        let [c, d] = p2;

        match (a == b, c == d) {
            (true, true) => None,
            (false, true) => match b == c {
                true => Some((Lmxll, [b, a, c, d])),
                false => Some((Lmxll, [a, b, c, d])),
            },
            (true, false) => match d == a {
                true => Some((Nnxnp, [a, b, d, c])),
                false => Some((Nnxnp, [a, b, c, d])),
            },
            (false, false) => {
                if a == c && b == d {
                    Some((Hkxhk, [a, b, c, d]))
                } else if a == d && b == c {
                    Some((Hkxhk, [a, b, d, c]))
                } else if a == c {
                    Some((Efxeg, [a, b, c, d]))
                } else if a == d {
                    Some((Efxeg, [a, b, d, c]))
                } else if b == c {
                    Some((Efxeg, [b, a, c, d]))
                } else if b == d {
                    Some((Efxeg, [b, a, d, c]))
                } else {
                    Some((Abxcd, [a, b, c, d]))
                }
            }
        }
    }

    pub fn letters(&self) -> [char; 4] {
        match self {
            Abxcd => ['a', 'b', 'c', 'd'],
            Efxeg => ['e', 'f', 'e', 'g'],
            Hkxhk => ['h', 'k', 'h', 'k'],
            Lmxll => ['l', 'm', 'l', 'l'],
            Nnxnp => ['n', 'n', 'n', 'p'],
        }
    }

    pub fn segregates_in(&self, parent: Parent) -> bool {
        let l = self.letters();
        match parent {
            Parent::P1 => l[0] != l[1],
            Parent::P2 => l[2] != l[3],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Abxcd => "abxcd",
            Efxeg => "efxeg",
            Hkxhk => "hkxhk",
            Lmxll => "lmxll",
            Nnxnp => "nnxnp",
        }
    }
}

impl std::fmt::Display for SegregationType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SegregationType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim_matches(['<', '>']) {
            "abxcd" => Ok(Abxcd),
            "efxeg" => Ok(Efxeg),
            "hkxhk" => Ok(Hkxhk),
            "lmxll" => Ok(Lmxll),
            "nnxnp" => Ok(Nnxnp),
            _ => Err(format!("unknown segregation type {s:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PhaseBit {
    Coupling,
    Repulsion,
}

impl PhaseBit {
    pub fn as_char(&self) -> char {
        match self {
            Self::Coupling => '0',
            Self::Repulsion => '1',
        }
    }

    fn from_char(c: char) -> Option<Self> {
        match c {
            '0' => Some(Self::Coupling),
            '1' => Some(Self::Repulsion),
            _ => None,
        }
    }
}

/// Linkage phase of a locus in both parents, written `{p1p2}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Phase {
    pub p1: PhaseBit,
    pub p2: PhaseBit,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{{{}{}}}", self.p1.as_char(), self.p2.as_char())
    }
}

pub fn phase_label(phase: &Option<Phase>) -> String {
    match phase {
        Some(p) => p.to_string(),
        None => String::from("{??}"),
    }
}

fn parse_phase(token: &str) -> Option<Option<Phase>> {
    let inner = token.strip_prefix('{')?.strip_suffix('}')?;
    let chars: Vec<char> = inner.chars().collect();
    match chars.as_slice() {
        ['?', '?'] => Some(None),
        [p1, p2] => Some(Some(Phase {
            p1: PhaseBit::from_char(*p1)?,
            p2: PhaseBit::from_char(*p2)?,
        })),
        _ => None,
    }
}

/// Symbols used for calls in the textual conventions of the mapping engines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolAliases {
    pub homozygous: char,
    pub heterozygous: char,
    pub duplicate: char,
    pub missing: char,
}

impl Default for SymbolAliases {
    fn default() -> Self {
        Self {
            homozygous: 'A',
            heterozygous: 'H',
            duplicate: 'D',
            missing: '-',
        }
    }
}

impl SymbolAliases {
    pub fn roles(&self) -> [(char, &'static str); 4] {
        [
            (self.homozygous, "homozygous-symbol"),
            (self.heterozygous, "heterozygous-symbol"),
            (self.duplicate, "duplicate-symbol"),
            (self.missing, "missing-symbol"),
        ]
    }

    /// Aliases have to be distinct from each other and from every allele symbol in use
    pub fn validate<I>(&self, in_use: I, locus: Option<&str>) -> Result<()>
    where
        I: IntoIterator<Item = char>,
    {
        let roles = self.roles();
        for (i, (alias, role)) in roles.iter().enumerate() {
            if roles[..i].iter().any(|(other, _)| other == alias) {
                return Err(Error::UnknownSymbolAlias {
                    alias: *alias,
                    role: *role,
                    locus: None,
                });
            }
        }

        for symbol in in_use {
            if let Some((alias, role)) = roles.iter().find(|(a, _)| *a == symbol) {
                return Err(Error::UnknownSymbolAlias {
                    alias: *alias,
                    role: *role,
                    locus: locus.map(String::from),
                });
            }
        }
        Ok(())
    }
}

/// Offspring genotype in class letters, e.g. `lm` or `bd`. `None` is missing.
pub type OffspringCode = Option<[char; 2]>;

/// Which allele of a parent an offspring received
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inheritance {
    First,
    Second,
    Either,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegregationCall {
    pub locus: Locus,
    pub alleles: [char; 4],
    pub seg_type: SegregationType,
    pub phase: Option<Phase>,
    pub offspring: Vec<OffspringCode>,
}

impl SegregationCall {
    /// Which allele of `parent` offspring `idx` inherited
    pub fn inherited(&self, idx: usize, parent: Parent) -> Inheritance {
        let Some([u, v]) = self.offspring[idx] else {
            return Inheritance::Unknown;
        };

        let letters = self.seg_type.letters();
        let (own, other) = match parent {
            Parent::P1 => ([letters[0], letters[1]], [letters[2], letters[3]]),
            Parent::P2 => ([letters[2], letters[3]], [letters[0], letters[1]]),
        };

        if own[0] == own[1] {
            return Inheritance::Unknown;
        }

        let mut options = BTreeSet::new();
        for (from_own, from_other) in [(u, v), (v, u)] {
            if other.contains(&from_other) {
                if from_own == own[0] {
                    options.insert(0);
                } else if from_own == own[1] {
                    options.insert(1);
                }
            }
        }

        match (options.contains(&0), options.contains(&1)) {
            (true, false) => Inheritance::First,
            (false, true) => Inheritance::Second,
            (true, true) => Inheritance::Either,
            (false, false) => Inheritance::Unknown,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderSummary {
    pub input_loci: usize,
    pub encoded: usize,
    pub non_segregating: usize,
    pub missing_parent: usize,
    pub inconsistent_calls: usize,
}

impl EncoderSummary {
    pub fn dropped(&self) -> usize {
        self.non_segregating + self.missing_parent
    }
}

/// The standardised table of segregation calls every engine adapter consumes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegregationTable {
    pub name: String,
    pub parents: [String; 2],
    pub offspring: Vec<String>,
    pub calls: Vec<SegregationCall>,
    pub aliases: SymbolAliases,
    pub summary: EncoderSummary,
}

impl SegregationTable {
    pub fn locus_ids(&self) -> Vec<String> {
        self.calls.iter().map(|c| c.locus.id.clone()).collect()
    }

    pub fn get(&self, locus: &str) -> Option<&SegregationCall> {
        self.calls.iter().find(|c| c.locus.id == locus)
    }

    pub fn type_counts(&self) -> Vec<(SegregationType, usize)> {
        SegregationType::ALL
            .iter()
            .map(|t| (*t, self.calls.iter().filter(|c| c.seg_type == *t).count()))
            .collect()
    }
}

/// Allele calls of one locus given as explicit symbols
#[derive(Debug, Clone, PartialEq)]
pub struct AlleleCalls {
    pub locus: Locus,
    pub parents: Vec<Option<[char; 2]>>,
    pub offspring: Vec<Option<[char; 2]>>,
}

pub fn dose_alleles(dose: Dose) -> Option<[char; 2]> {
    match dose? {
        0 => Some(['0', '0']),
        1 => Some(['0', '1']),
        _ => Some(['1', '1']),
    }
}

fn code_offspring(seg_type: SegregationType, alleles: [char; 4], call: [char; 2]) -> OffspringCode {
    let letters = seg_type.letters();
    let [x, y] = call;

    for i in 0..2 {
        for j in 2..4 {
            if (alleles[i] == x && alleles[j] == y) || (alleles[i] == y && alleles[j] == x) {
                let mut code = [letters[i], letters[j]];
                code.sort_unstable();
                return Some(code);
            }
        }
    }
    None
}

fn encode_locus(
    locus: Locus,
    parents: [Option<[char; 2]>; 2],
    offspring: &[Option<[char; 2]>],
    aliases: &SymbolAliases,
    summary: &mut EncoderSummary,
) -> Result<Option<SegregationCall>> {
    summary.input_loci += 1;

    let (Some(p1), Some(p2)) = (parents[0], parents[1]) else {
        tracing::trace!("Locus {} has a missing parental call", locus.id);
        summary.missing_parent += 1;
        return Ok(None);
    };

    let in_use = p1
        .iter()
        .chain(p2.iter())
        .chain(offspring.iter().flatten().flatten())
        .copied()
        .collect::<BTreeSet<char>>();
    aliases.validate(in_use, Some(&locus.id))?;

    let Some((seg_type, alleles)) = SegregationType::classify(p1, p2) else {
        tracing::trace!("Locus {} does not segregate", locus.id);
        summary.non_segregating += 1;
        return Ok(None);
    };

    let offspring = offspring
        .iter()
        .map(|call| match call {
            Some(call) => {
                let code = code_offspring(seg_type, alleles, *call);
                if code.is_none() {
                    tracing::trace!("Locus {}: call {call:?} is not Mendelian", locus.id);
                    summary.inconsistent_calls += 1;
                }
                code
            }
            None => None,
        })
        .collect();

    summary.encoded += 1;

    Ok(Some(SegregationCall {
        locus,
        alleles,
        seg_type,
        phase: None,
        offspring,
    }))
}

fn log_summary(summary: &EncoderSummary) {
    tracing::info!(
        "Encoded {}/{} loci: {} not segregating, {} with missing parental calls, {} offspring calls inconsistent with the parents",
        summary.encoded,
        summary.input_loci,
        summary.non_segregating,
        summary.missing_parent,
        summary.inconsistent_calls
    );
}

/// Classify every locus of a genotype matrix from its two parents
pub fn encode<S: AsRef<str>>(
    matrix: &GenotypeMatrix,
    parents: &[S],
    aliases: &SymbolAliases,
) -> Result<SegregationTable> {
    if parents.len() != 2 {
        return Err(Error::IncompatibleParentCount {
            found: parents.len(),
        });
    }

    let p1 = matrix.individual_row(parents[0].as_ref())?;
    let p2 = matrix.individual_row(parents[1].as_ref())?;

    let offspring: Vec<String> = matrix
        .individuals()
        .iter()
        .filter(|id| !parents.iter().any(|p| p.as_ref() == id.as_str()))
        .cloned()
        .collect();

    let offspring_rows = offspring
        .iter()
        .map(|id| matrix.individual_row(id))
        .collect::<Result<Vec<_>>>()?;

    let mut summary = EncoderSummary::default();
    let mut calls = vec![];

    for (col, locus) in matrix.loci().enumerate() {
        let offspring_calls: Vec<Option<[char; 2]>> = offspring_rows
            .iter()
            .map(|row| dose_alleles(row[col]))
            .collect();

        if let Some(call) = encode_locus(
            locus.clone(),
            [dose_alleles(p1[col]), dose_alleles(p2[col])],
            &offspring_calls,
            aliases,
            &mut summary,
        )? {
            calls.push(call);
        }
    }

    log_summary(&summary);

    Ok(SegregationTable {
        name: String::from("lmtk"),
        parents: [parents[0].as_ref().to_string(), parents[1].as_ref().to_string()],
        offspring,
        calls,
        aliases: aliases.clone(),
        summary,
    })
}

/// Classify loci given as explicit allele symbols, e.g. for multi-allelic markers
pub fn encode_alleles<S: AsRef<str>>(
    parents: &[S],
    offspring: Vec<String>,
    rows: Vec<AlleleCalls>,
    aliases: &SymbolAliases,
) -> Result<SegregationTable> {
    if parents.len() != 2 {
        return Err(Error::IncompatibleParentCount {
            found: parents.len(),
        });
    }

    let mut summary = EncoderSummary::default();
    let mut calls = vec![];

    for row in rows {
        if row.parents.len() != 2 {
            return Err(Error::IncompatibleParentCount {
                found: row.parents.len(),
            });
        }
        if row.offspring.len() != offspring.len() {
            return Err(Error::malformed(format!(
                "locus {} has {} offspring calls for {} offspring",
                row.locus.id,
                row.offspring.len(),
                offspring.len()
            )));
        }

        if let Some(call) = encode_locus(
            row.locus,
            [row.parents[0], row.parents[1]],
            &row.offspring,
            aliases,
            &mut summary,
        )? {
            calls.push(call);
        }
    }

    log_summary(&summary);

    Ok(SegregationTable {
        name: String::from("lmtk"),
        parents: [parents[0].as_ref().to_string(), parents[1].as_ref().to_string()],
        offspring,
        calls,
        aliases: aliases.clone(),
        summary,
    })
}

fn code_token(code: &OffspringCode, missing: char) -> String {
    match code {
        Some([x, y]) => format!("{x}{y}"),
        None => format!("{missing}{missing}"),
    }
}

/// Write the table as a JoinMap CP locus file.
///
/// The locus metadata and canonical alleles travel in a trailing `;` comment
/// which JoinMap ignores, individual ids follow `individual names:`. The
/// parent ids and the missing symbol are kept in `;` header comments.
pub fn write_joinmap<W: Write>(table: &SegregationTable, mut output: W) -> Result<()> {
    writeln!(output, "name = {}", table.name)?;
    writeln!(output, "popt = CP")?;
    writeln!(output, "nloc = {}", table.calls.len())?;
    writeln!(output, "nind = {}", table.offspring.len())?;
    writeln!(output, "; parents = {} {}", table.parents[0], table.parents[1])?;
    writeln!(output, "; missing = {}", table.aliases.missing)?;
    writeln!(output)?;

    for call in &table.calls {
        let codes: Vec<String> = call
            .offspring
            .iter()
            .map(|c| code_token(c, table.aliases.missing))
            .collect();
        writeln!(
            output,
            "{}\t<{}>\t{}\t{}\t; {} {} {}",
            call.locus.id,
            call.seg_type,
            phase_label(&call.phase),
            codes.join(" "),
            call.locus.chromosome,
            call.locus.position,
            call.alleles.iter().collect::<String>(),
        )?;
    }

    writeln!(output)?;
    writeln!(output, "individual names:")?;
    for id in &table.offspring {
        writeln!(output, "{id}")?;
    }
    output.flush()?;
    Ok(())
}

/// Read a JoinMap CP locus file written by [`write_joinmap`]
///
/// `parents` and the missing symbol of `aliases` are used unless the file
/// header records its own.
pub fn read_joinmap<R: BufRead>(
    input: R,
    parents: [String; 2],
    aliases: &SymbolAliases,
) -> Result<SegregationTable> {
    let mut parents = parents;
    let mut aliases = aliases.clone();
    let mut name = String::from("lmtk");
    let mut nind: Option<usize> = None;
    let mut calls = vec![];
    let mut offspring = vec![];
    let mut in_names = false;

    for (n, line) in input.lines().enumerate() {
        let line = line?;
        let lineno = n + 1;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        if let Some(comment) = trimmed.strip_prefix(';') {
            match comment.split_once('=').map(|(k, v)| (k.trim(), v.trim())) {
                Some(("parents", value)) => match value.split_whitespace().collect::<Vec<_>>().as_slice() {
                    [p1, p2] => parents = [p1.to_string(), p2.to_string()],
                    _ => return Err(Error::unparsable(lineno, trimmed, "expected two parent ids")),
                },
                Some(("missing", value)) => {
                    let mut chars = value.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => aliases.missing = c,
                        _ => {
                            return Err(Error::unparsable(
                                lineno,
                                trimmed,
                                "missing symbol is not a single character",
                            ))
                        }
                    }
                }
                _ => (),
            }
            continue;
        }

        if in_names {
            offspring.push(trimmed.to_string());
            continue;
        }

        if trimmed.eq_ignore_ascii_case("individual names:") {
            in_names = true;
            continue;
        }

        if let Some((key, value)) = trimmed.split_once('=') {
            match key.trim() {
                "name" => name = value.trim().to_string(),
                "nind" => {
                    nind = Some(value.trim().parse().map_err(|_| {
                        Error::unparsable(lineno, trimmed, "nind is not an integer")
                    })?)
                }
                _ => (),
            }
            continue;
        }

        calls.push(parse_locus_line(lineno, trimmed, &aliases)?);
    }

    if let Some(nind) = nind {
        if nind != offspring.len() {
            return Err(Error::malformed(format!(
                "nind = {nind} but {} individual names are listed",
                offspring.len()
            )));
        }
    }

    if let Some(call) = calls.iter().find(|c| c.offspring.len() != offspring.len()) {
        return Err(Error::malformed(format!(
            "locus {} has {} codes for {} individuals",
            call.locus.id,
            call.offspring.len(),
            offspring.len()
        )));
    }

    Ok(SegregationTable {
        name,
        parents,
        offspring,
        summary: EncoderSummary {
            input_loci: calls.len(),
            encoded: calls.len(),
            ..Default::default()
        },
        calls,
        aliases,
    })
}

fn parse_locus_line(lineno: usize, line: &str, aliases: &SymbolAliases) -> Result<SegregationCall> {
    let (body, comment) = match line.split_once(';') {
        Some((body, comment)) => (body, Some(comment)),
        None => (line, None),
    };

    let mut fields = body.split_whitespace();
    let id = fields
        .next()
        .ok_or_else(|| Error::unparsable(lineno, line, "missing locus name"))?;
    let seg_type: SegregationType = fields
        .next()
        .ok_or_else(|| Error::unparsable(lineno, line, "missing segregation type"))?
        .parse()
        .map_err(|e: String| Error::unparsable(lineno, line, e))?;

    let mut fields = fields.peekable();
    let phase = match fields.peek() {
        Some(token) if token.starts_with('{') => {
            let phase = parse_phase(token)
                .ok_or_else(|| Error::unparsable(lineno, line, "invalid phase"))?;
            fields.next();
            phase
        }
        _ => None,
    };

    let letters = seg_type.letters();
    let missing = format!("{0}{0}", aliases.missing);
    let offspring = fields
        .map(|token| {
            if token == missing || token == "--" {
                return Ok(None);
            }
            let chars: Vec<char> = token.chars().collect();
            match chars.as_slice() {
                [x, y] if letters.contains(x) && letters.contains(y) => Ok(Some([*x, *y])),
                _ => Err(Error::unparsable(
                    lineno,
                    line,
                    format!("genotype code {token:?} does not fit <{seg_type}>"),
                )),
            }
        })
        .collect::<Result<Vec<OffspringCode>>>()?;

    let mut locus = Locus::new(id, "", 0);
    let mut alleles = letters;

    if let Some(comment) = comment {
        let meta: Vec<&str> = comment.split_whitespace().collect();
        if let [chromosome, position, symbols] = meta.as_slice() {
            locus.chromosome = chromosome.to_string();
            locus.position = position
                .parse()
                .map_err(|_| Error::unparsable(lineno, line, "position is not an integer"))?;
            let symbols: Vec<char> = symbols.chars().collect();
            if let [a, b, c, d] = symbols.as_slice() {
                alleles = [*a, *b, *c, *d];
            }
        }
    }

    Ok(SegregationCall {
        locus,
        alleles,
        seg_type,
        phase,
        offspring,
    })
}
