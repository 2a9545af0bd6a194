use std::collections::HashMap;
use std::io::{BufRead, Write};

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::adapters::backcross::{pseudo_testcross, BackcrossOptions};
use crate::adapters::{order_groups_parallel, verify_locus_set, Adapter, Call, CallMatrix, ParentMatrices};
use crate::engine::{with_session, Engine, Session};
use crate::error::{Error, Result};
use crate::genotype::Locus;
use crate::linkage::{LinkageGroups, MapEntry, OrderedMap, OrderedMaps, PairwiseMatrix, Stat, StatKind};
use crate::scratch::ScratchSpace;
use crate::segregation::{Parent, SegregationTable, SymbolAliases};
use crate::utils::is_missing_token;

/// Single-letter backcross raw files
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CarthaGene {
    pub aliases: SymbolAliases,
    /// Raw files carry no individual ids, reading needs them
    pub individuals: Vec<String>,
}

impl Adapter for CarthaGene {
    fn name(&self) -> &'static str {
        "carthagene"
    }

    fn suffix(&self) -> &'static str {
        "raw"
    }

    fn encode(&self, table: &SegregationTable) -> Result<ParentMatrices> {
        let options = BackcrossOptions::default();
        Ok(ParentMatrices {
            p1: pseudo_testcross(table, Parent::P1, &options)?,
            p2: pseudo_testcross(table, Parent::P2, &options)?,
        })
    }

    fn write<W: Write>(&self, matrix: &CallMatrix, mut output: W) -> Result<()> {
        writeln!(output, "data type f2 backcross")?;
        writeln!(output, "{} {} 0 0", matrix.nindividuals(), matrix.nloci())?;
        for (locus, row) in matrix.loci.iter().zip(matrix.calls.rows()) {
            let calls: String = row.iter().map(|c| c.symbol(&self.aliases)).collect();
            writeln!(output, "*{} {calls}", locus.id)?;
        }
        output.flush()?;
        Ok(())
    }

    fn read<R: BufRead>(&self, input: R, parent: Parent) -> Result<CallMatrix> {
        read_raw(input, parent, &self.individuals, &self.aliases)
    }
}

pub fn read_raw<R: BufRead>(
    input: R,
    parent: Parent,
    individuals: &[String],
    aliases: &SymbolAliases,
) -> Result<CallMatrix> {
    let mut lines = input.lines().enumerate();

    let mut next_line = || -> Result<Option<(usize, String)>> {
        for (n, line) in lines.by_ref() {
            let line = line?;
            if !line.trim().is_empty() {
                return Ok(Some((n + 1, line)));
            }
        }
        Ok(None)
    };

    match next_line()? {
        Some((_, line)) if line.trim().starts_with("data type") => (),
        Some((n, line)) => return Err(Error::unparsable(n, &line, "expected a data type line")),
        None => return Err(Error::malformed("empty raw file")),
    }

    let (n, line) = next_line()?.ok_or_else(|| Error::malformed("raw file has no dimension line"))?;
    let dims = line
        .split_whitespace()
        .map(|t| t.parse::<usize>())
        .collect::<std::result::Result<Vec<usize>, _>>()
        .map_err(|_| Error::unparsable(n, &line, "dimensions are not integers"))?;
    let (nind, nloci) = match dims.as_slice() {
        [nind, nloci, ..] => (*nind, *nloci),
        _ => return Err(Error::unparsable(n, &line, "expected individual and locus counts")),
    };
    if nind != individuals.len() {
        return Err(Error::malformed(format!(
            "raw file has {nind} individuals but {} ids were given",
            individuals.len()
        )));
    }

    let mut loci = vec![];
    let mut calls = Vec::with_capacity(nind * nloci);
    while let Some((n, line)) = next_line()? {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('*') else {
            return Err(Error::unparsable(n, line, "locus lines start with '*'"));
        };
        let mut fields = rest.split_whitespace();
        let id = fields
            .next()
            .ok_or_else(|| Error::unparsable(n, line, "missing locus name"))?;
        let symbols: String = fields.collect();
        if symbols.chars().count() != nind {
            return Err(Error::unparsable(n, line, format!("expected {nind} calls")));
        }
        for s in symbols.chars() {
            let call = Call::from_symbol(s, aliases)
                .ok_or_else(|| Error::unparsable(n, line, format!("unknown call {s:?}")))?;
            calls.push(call);
        }
        loci.push(Locus::new(id, "", 0));
    }

    if loci.len() != nloci {
        return Err(Error::malformed(format!(
            "raw file declares {nloci} loci but lists {}",
            loci.len()
        )));
    }

    let calls = Array2::from_shape_vec((nloci, nind), calls).map_err(|e| Error::malformed(e.to_string()))?;
    CallMatrix::new(parent, loci, individuals.to_vec(), calls)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerInfo {
    pub index: usize,
    pub locus: String,
    pub kind: String,
}

/// Markers known to an engine session, by name and by engine index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkerTable {
    records: Vec<MarkerInfo>,
    by_name: HashMap<String, usize>,
    by_index: HashMap<usize, usize>,
}

impl MarkerTable {
    pub fn new(records: Vec<MarkerInfo>) -> Result<Self> {
        let mut by_name = HashMap::new();
        let mut by_index = HashMap::new();
        for (i, r) in records.iter().enumerate() {
            if by_name.insert(r.locus.clone(), i).is_some() {
                return Err(Error::malformed(format!("marker {} is listed twice", r.locus)));
            }
            if by_index.insert(r.index, i).is_some() {
                return Err(Error::malformed(format!("marker index {} is listed twice", r.index)));
            }
        }
        Ok(Self {
            records,
            by_name,
            by_index,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[MarkerInfo] {
        &self.records
    }

    pub fn labels(&self) -> Vec<String> {
        self.records.iter().map(|r| r.locus.clone()).collect()
    }

    /// Look a token up by marker name, then by engine index
    pub fn resolve(&self, token: &str) -> Option<&MarkerInfo> {
        if let Some(i) = self.by_name.get(token) {
            return Some(&self.records[*i]);
        }
        token
            .parse::<usize>()
            .ok()
            .and_then(|idx| self.by_index.get(&idx))
            .map(|i| &self.records[*i])
    }

    pub fn write_tsv<W: Write>(&self, output: W) -> Result<()> {
        let mut writer = crate::io::get_strict_tsv_writer(output);
        writer.write_record(["index", "locus", "type"])?;
        for r in &self.records {
            writer.write_record([r.index.to_string().as_str(), r.locus.as_str(), r.kind.as_str()])?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn skippable(line: &str) -> bool {
    let line = line.trim();
    line.is_empty() || line.starts_with('#')
}

/// Parse an `index locus type` listing, lines not starting with an index are headers
pub fn parse_marker_info<R: BufRead>(input: R) -> Result<MarkerTable> {
    let mut records = vec![];
    for (n, line) in input.lines().enumerate() {
        let line = line?;
        if skippable(&line) {
            continue;
        }

        let tokens: Vec<&str> = line.split_whitespace().filter(|t| *t != ":").collect();
        let Some(Ok(index)) = tokens.first().map(|t| t.parse::<usize>()) else {
            tracing::trace!("Skipping marker info header {line:?}");
            continue;
        };
        if tokens.len() != 3 {
            return Err(Error::unparsable(
                n + 1,
                &line,
                format!("expected 3 fields, found {}", tokens.len()),
            ));
        }
        records.push(MarkerInfo {
            index,
            locus: tokens[1].to_string(),
            kind: tokens[2].to_string(),
        });
    }
    MarkerTable::new(records)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Full,
    UpperWithDiagonal,
    Upper,
    LowerWithDiagonal,
    Lower,
}

impl Layout {
    fn detect(lens: &[usize], n: usize) -> Option<Self> {
        let rows = lens.len();
        let fits = |f: &dyn Fn(usize) -> usize| lens.iter().enumerate().all(|(r, len)| *len == f(r));

        if rows == n && fits(&|_: usize| n) {
            Some(Self::Full)
        } else if rows == n && fits(&|r: usize| n - r) {
            Some(Self::UpperWithDiagonal)
        } else if rows == n && fits(&|r: usize| r + 1) {
            Some(Self::LowerWithDiagonal)
        } else if rows + 1 == n && fits(&|r: usize| n - 1 - r) {
            Some(Self::Upper)
        } else if rows + 1 == n && fits(&|r: usize| r + 1) {
            Some(Self::Lower)
        } else {
            None
        }
    }

    fn cell(&self, row: usize, col: usize) -> (usize, usize) {
        match self {
            Self::Full | Self::LowerWithDiagonal => (row, col),
            Self::UpperWithDiagonal => (row, row + col),
            Self::Upper => (row, row + 1 + col),
            Self::Lower => (row + 1, col),
        }
    }
}

fn parse_stat(token: &str, kind: StatKind) -> std::result::Result<Stat, String> {
    if is_missing_token(token) {
        return Ok(Stat::Missing);
    }
    let value: f64 = token
        .parse()
        .map_err(|_| format!("{token:?} is not a number"))?;
    match kind.accepts(value) {
        true => Ok(Stat::Present(value)),
        false => Err(format!("{value} is out of range for {kind:?}")),
    }
}

/// Parse a full or triangular block of a pairwise statistic.
///
/// Labels come from `markers` by position. The block may hold the full
/// matrix, or the upper or lower triangle with or without the diagonal.
pub fn parse_pairwise<R: BufRead>(input: R, markers: &MarkerTable, kind: StatKind) -> Result<PairwiseMatrix> {
    let n = markers.len();

    let mut rows: Vec<(usize, String)> = vec![];
    for (i, line) in input.lines().enumerate() {
        let line = line?;
        if !skippable(&line) {
            rows.push((i + 1, line));
        }
    }

    let lens: Vec<usize> = rows.iter().map(|(_, l)| l.split_whitespace().count()).collect();
    let layout = Layout::detect(&lens, n).ok_or_else(|| {
        let (line, text) = rows.last().cloned().unwrap_or_default();
        Error::unparsable(line, &text, format!("rows do not form a full or triangular block of {n} markers"))
    })?;

    let mut matrix = PairwiseMatrix::new(kind, markers.labels())?;
    for (r, (line, text)) in rows.iter().enumerate() {
        for (c, token) in text.split_whitespace().enumerate() {
            let (i, j) = layout.cell(r, c);
            let stat = parse_stat(token, kind).map_err(|e| Error::unparsable(*line, text, e))?;
            if i == j {
                continue;
            }

            if layout == Layout::Full && j < i {
                let mirror = matrix.get_idx(j, i);
                let same = match (mirror, stat) {
                    (Stat::Present(a), Stat::Present(b)) => (a - b).abs() <= 1e-9,
                    (Stat::Missing, Stat::Missing) => true,
                    _ => false,
                };
                if !same {
                    return Err(Error::unparsable(*line, text, format!("matrix is not symmetric at ({i}, {j})")));
                }
                continue;
            }
            matrix.set(i, j, stat)?;
        }
    }

    tracing::debug!("Parsed a {n}x{n} {kind:?} matrix, {} pairs missing", matrix.missing_pairs());
    Ok(matrix)
}

/// Parse `label: locus locus ...` lines into a group assignment
pub fn parse_groups<R: BufRead>(input: R, markers: &MarkerTable) -> Result<LinkageGroups> {
    let mut groups = LinkageGroups::default();
    for (i, line) in input.lines().enumerate() {
        let line = line?;
        let n = i + 1;
        if skippable(&line) {
            continue;
        }

        let (label, loci) = line
            .split_once(':')
            .ok_or_else(|| Error::unparsable(n, &line, "expected 'label: loci'"))?;
        if !label.chars().any(|c| c.is_ascii_digit()) {
            continue;
        }
        let label = label
            .split_whitespace()
            .last()
            .map(|l| l.trim_start_matches(|c: char| !c.is_ascii_digit()))
            .and_then(|l| l.parse::<u32>().ok())
            .filter(|l| *l > 0)
            .ok_or_else(|| Error::unparsable(n, &line, "group label is not a positive integer"))?;

        for token in loci.split_whitespace() {
            let marker = markers.resolve(token).ok_or_else(|| Error::UnknownLocusReference {
                locus: token.to_string(),
                line: Some(n),
            })?;
            groups.push(&marker.locus, label);
        }
    }
    Ok(groups)
}

fn parse_maps<R: BufRead>(input: R, markers: Option<&MarkerTable>, default_group: Option<&str>) -> Result<OrderedMaps> {
    let mut listed: Vec<(String, Vec<MapEntry>)> = vec![];
    if let Some(group) = default_group {
        listed.push((group.to_string(), vec![]));
    }

    for (i, line) in input.lines().enumerate() {
        let line = line?;
        let n = i + 1;
        if skippable(&line) {
            continue;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens[0].eq_ignore_ascii_case("group") {
            if default_group.is_some() {
                continue;
            }
            let [_, label] = tokens.as_slice() else {
                return Err(Error::unparsable(n, &line, "expected 'group <label>'"));
            };
            if listed.iter().any(|(g, _)| g == label) {
                return Err(Error::unparsable(n, &line, "group is listed twice"));
            }
            listed.push((label.to_string(), vec![]));
            continue;
        }

        let (locus, distance) = match tokens.as_slice() {
            [locus, distance] => (*locus, *distance),
            [locus, distance, unit] if unit.eq_ignore_ascii_case("cm") => (*locus, *distance),
            _ => return Err(Error::unparsable(n, &line, "expected 'locus distance [cM]'")),
        };

        let locus = match markers {
            Some(markers) => markers
                .resolve(locus)
                .map(|m| m.locus.clone())
                .ok_or_else(|| Error::UnknownLocusReference {
                    locus: locus.to_string(),
                    line: Some(n),
                })?,
            None => locus.to_string(),
        };

        let distance: f64 = distance
            .parse()
            .map_err(|_| Error::unparsable(n, &line, "distance is not a number"))?;

        let (_, entries) = listed
            .last_mut()
            .ok_or_else(|| Error::unparsable(n, &line, "map entry before any group header"))?;
        entries.push(MapEntry { locus, distance });
    }

    let mut maps = OrderedMaps::new();
    for (group, entries) in listed {
        let map = OrderedMap::new(&group, entries)?;
        maps.insert(group, map);
    }
    Ok(maps)
}

/// Parse `group <label>` blocks of `locus distance [cM]` lines.
///
/// Loci are resolved against `markers` when given.
pub fn parse_ordered_map<R: BufRead>(input: R, markers: Option<&MarkerTable>) -> Result<OrderedMaps> {
    parse_maps(input, markers, None)
}

/// Parse the listing of one map, group headers are ignored
pub fn parse_single_map<R: BufRead>(input: R, group: &str, markers: Option<&MarkerTable>) -> Result<OrderedMap> {
    let mut maps = parse_maps(input, markers, Some(group))?;
    maps.shift_remove(group)
        .ok_or_else(|| Error::malformed(format!("no map for group {group}")))
}

/// Commands sent to the engine, `$file`, `$distance`, `$lod`, `$loci` and `$n` are substituted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarthaGeneCommands {
    pub load: String,
    pub marker_info: String,
    pub group: String,
    pub select: String,
    pub build: String,
    pub print_map: String,
}

impl Default for CarthaGeneCommands {
    fn default() -> Self {
        Self {
            load: String::from("dsload $file"),
            marker_info: String::from("mrkinfo"),
            group: String::from("group $distance $lod"),
            select: String::from("mrkselset {$loci}"),
            build: String::from("build $n"),
            print_map: String::from("bestprintd"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverConfig {
    #[serde(default)]
    pub commands: CarthaGeneCommands,
    /// Recombination fraction threshold for grouping
    pub distance: f64,
    pub lod: f64,
    /// Number of candidate orders kept by the build command
    pub candidates: usize,
    /// One session per linkage group on the rayon pool
    pub parallel: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            commands: CarthaGeneCommands::default(),
            distance: 0.3,
            lod: 3.0,
            candidates: 10,
            parallel: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DriverOutput {
    pub markers: MarkerTable,
    pub groups: LinkageGroups,
    pub maps: OrderedMaps,
}

fn render(template: &str, vars: &[(&str, String)]) -> String {
    vars.iter()
        .fold(template.to_string(), |acc, (name, value)| acc.replace(name, value))
}

fn join_response(lines: Vec<String>) -> String {
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

/// Runs the grouping and ordering of one parent through engine sessions
#[derive(Debug, Clone, PartialEq)]
pub struct CarthaGeneDriver {
    pub config: DriverConfig,
    pub adapter: CarthaGene,
}

impl CarthaGeneDriver {
    pub fn new(config: DriverConfig, aliases: SymbolAliases) -> Self {
        Self {
            config,
            adapter: CarthaGene {
                aliases,
                individuals: vec![],
            },
        }
    }

    fn load<S: Session>(&self, session: &mut S, file: &str) -> Result<()> {
        let c = &self.config.commands;
        session.send(&render(&c.load, &[("$file", file.to_string())]))?;
        Ok(())
    }

    fn order<S: Session>(&self, session: &mut S, group: u32, loci: &[String], markers: &MarkerTable) -> Result<OrderedMap> {
        let c = &self.config.commands;
        let indices = loci
            .iter()
            .map(|l| {
                markers
                    .resolve(l)
                    .map(|m| m.index.to_string())
                    .ok_or_else(|| Error::UnknownLocusReference {
                        locus: l.clone(),
                        line: None,
                    })
            })
            .collect::<Result<Vec<String>>>()?;

        session.send(&render(&c.select, &[("$loci", indices.join(" "))]))?;
        session.send(&render(&c.build, &[("$n", self.config.candidates.to_string())]))?;
        let response = join_response(session.send(&c.print_map)?);

        let map = parse_single_map(response.as_bytes(), &group.to_string(), Some(markers))?;
        tracing::debug!("Group {group}: {} loci, {:.1} cM", map.len(), map.length());
        Ok(map)
    }

    /// Write `matrix` to a scratch raw file and group and order its loci
    pub fn run<E>(&self, engine: &E, matrix: &CallMatrix, scratch: &ScratchSpace) -> Result<DriverOutput>
    where
        E: Engine + Sync,
    {
        let file = scratch.file(&matrix.parent.to_string(), self.adapter.suffix());
        let output = crate::io::get_output(Some(file.path().to_path_buf()))?;
        self.adapter.write(matrix, std::io::BufWriter::new(output))?;
        let path = file.path().to_string_lossy().to_string();

        let c = &self.config.commands;
        let (markers, groups, maps) = with_session(engine, |session| {
            self.load(session, &path)?;

            let info = join_response(session.send(&c.marker_info)?);
            let markers = parse_marker_info(info.as_bytes())?;
            verify_locus_set(matrix.locus_ids(), markers.records().iter().map(|r| r.locus.as_str()))?;

            let group_cmd = render(
                &c.group,
                &[("$distance", self.config.distance.to_string()), ("$lod", self.config.lod.to_string())],
            );
            let listing = join_response(session.send(&group_cmd)?);
            let groups = parse_groups(listing.as_bytes(), &markers)?;
            tracing::info!("{}: {} loci in {} linkage groups", matrix.parent, groups.records.len(), groups.groups().len());

            let maps = match self.config.parallel {
                true => None,
                false => {
                    let mut maps = OrderedMaps::new();
                    for (group, loci) in groups.groups() {
                        let map = self.order(session, group, &loci, &markers)?;
                        maps.insert(map.group.clone(), map);
                    }
                    Some(maps)
                }
            };
            Ok((markers, groups, maps))
        })?;

        let maps = match maps {
            Some(maps) => maps,
            None => order_groups_parallel(&groups.groups(), |group, loci| {
                with_session(engine, |session| {
                    self.load(session, &path)?;
                    self.order(session, group, loci, &markers)
                })
            })?,
        };

        Ok(DriverOutput {
            markers,
            groups,
            maps,
        })
    }
}

#[cfg(test)]
#[rustfmt::skip]
mod tests {
    use super::*;

    fn markers(n: usize) -> MarkerTable {
        MarkerTable::new((1..=n).map(|i| MarkerInfo { index: i, locus: format!("m{i}"), kind: String::from("f2") }).collect()).unwrap()
    }

    #[test]
    fn marker_info() {
        let text = "\nNum  Names : Sets\n  1 m1 : f2\n  2 m2 : f2\n\n# done\n";
        let info = parse_marker_info(text.as_bytes()).unwrap();
        assert_eq!(info.labels(), vec!["m1", "m2"]);
        assert_eq!(info.resolve("2").unwrap().locus, "m2");
        assert_eq!(info.resolve("m1").unwrap().index, 1);
    }

    #[test]
    fn marker_info_wrong_field_count() {
        let text = "1 m1 f2\n2 m2\n";
        let res = parse_marker_info(text.as_bytes());
        assert!(matches!(res, Err(Error::UnparsableRecord { line: 2, .. })));
    }

    #[test]
    fn pairwise_upper_triangle() {
        let text = "0.1 0.2 -\n0.3 0.4\n0.5\n";
        let m = parse_pairwise(text.as_bytes(), &markers(4), StatKind::RecombinationFraction).unwrap();
        assert_eq!(m.len(), 4);
        assert!(m.is_symmetric());
        for i in 0..4 {
            assert_eq!(m.get_idx(i, i), Stat::Missing);
        }
        assert_eq!(m.get("m4", "m1").unwrap(), Stat::Missing);
        assert_eq!(m.get("m3", "m1").unwrap(), Stat::Present(0.2));
        assert_eq!(m.get("m4", "m3").unwrap(), Stat::Present(0.5));
    }

    #[test]
    fn pairwise_layouts_agree() {
        let full = "NA 1 2\n1 NA 3\n2 3 NA\n";
        let upper_diag = "NA 1 2\nNA 3\nNA\n";
        let lower_diag = "NA\n1 NA\n2 3 NA\n";
        let lower = "1\n2 3\n";
        let parse = |t: &str| parse_pairwise(t.as_bytes(), &markers(3), StatKind::Lod).unwrap();
        let m = parse(full);
        assert_eq!(parse(upper_diag), m);
        assert_eq!(parse(lower_diag), m);
        assert_eq!(parse(lower), m);
        assert_eq!(m.get("m2", "m3").unwrap(), Stat::Present(3.0));
    }

    #[test]
    fn pairwise_errors() {
        let asymmetric = "NA 1\n2 NA\n";
        assert!(matches!(parse_pairwise(asymmetric.as_bytes(), &markers(2), StatKind::Lod), Err(Error::UnparsableRecord { line: 2, .. })));

        let out_of_range = "0.1 1.5\n0.2\n";
        assert!(parse_pairwise(out_of_range.as_bytes(), &markers(3), StatKind::RecombinationFraction).is_err());

        let ragged = "0.1\n0.2 0.3 0.4\n";
        assert!(matches!(parse_pairwise(ragged.as_bytes(), &markers(3), StatKind::RecombinationFraction), Err(Error::UnparsableRecord { .. })));

        let text = "0.1 abc\n0.2\n";
        assert!(matches!(parse_pairwise(text.as_bytes(), &markers(3), StatKind::RecombinationFraction), Err(Error::UnparsableRecord { line: 1, .. })));
    }

    #[test]
    fn groups() {
        let text = "Group ID : Marker ID List\ngroup 1: m1 m2\n2 : 3 m4\n";
        let g = parse_groups(text.as_bytes(), &markers(4)).unwrap();
        let groups = g.groups();
        assert_eq!(groups[&1], vec!["m1", "m2"]);
        assert_eq!(groups[&2], vec!["m3", "m4"]);

        let text = "1: m1 m9\n";
        let res = parse_groups(text.as_bytes(), &markers(4));
        assert!(matches!(res, Err(Error::UnknownLocusReference { locus, line: Some(1) }) if locus == "m9"));

        let text = "0: m1\n";
        assert!(matches!(parse_groups(text.as_bytes(), &markers(4)), Err(Error::UnparsableRecord { .. })));
    }

    #[test]
    fn ordered_map() {
        let text = "group 1\nm1 0.0 cM\nm2 5.5 cM\n\ngroup 2\nm3 0\nm4 12\n";
        let maps = parse_ordered_map(text.as_bytes(), Some(&markers(4))).unwrap();
        assert_eq!(maps.keys().collect::<Vec<_>>(), vec!["1", "2"]);
        assert_eq!(maps["1"].length(), 5.5);
        assert_eq!(maps["2"].loci(), vec!["m3", "m4"]);
    }

    #[test]
    fn ordered_map_order_violation() {
        let text = "group 1\nm1 0\nm2 5\nm3 3\nm4 10\n";
        let res = parse_ordered_map(text.as_bytes(), None);
        assert!(matches!(res, Err(Error::InvalidMapOrder { record: 3, .. })));
    }

    #[test]
    fn ordered_map_shapes() {
        assert!(matches!(parse_ordered_map("m1 0\n".as_bytes(), None), Err(Error::UnparsableRecord { line: 1, .. })));
        assert!(matches!(parse_ordered_map("group 1\nm1 x\n".as_bytes(), None), Err(Error::UnparsableRecord { line: 2, .. })));
        assert!(matches!(parse_ordered_map("group 1\nm9 0\n".as_bytes(), Some(&markers(2))), Err(Error::UnknownLocusReference { .. })));
    }

    fn matrix() -> CallMatrix {
        use Call::*;
        CallMatrix::new(
            Parent::P1,
            vec![Locus::new("m1", "", 0), Locus::new("m2", "", 0), Locus::new("m3", "", 0)],
            vec!["F1".into(), "F2".into(), "F3".into()],
            ndarray::array![[Homozygous, Heterozygous, Missing], [Heterozygous, Heterozygous, Homozygous], [Missing, Homozygous, Homozygous]],
        ).unwrap()
    }

    #[test]
    fn raw_round_trip() {
        let adapter = CarthaGene { aliases: SymbolAliases::default(), individuals: vec!["F1".into(), "F2".into(), "F3".into()] };
        let m = matrix();
        let mut out = vec![];
        adapter.write(&m, &mut out).unwrap();
        let text = String::from_utf8(out.clone()).unwrap();
        assert_eq!(text, "data type f2 backcross\n3 3 0 0\n*m1 AH-\n*m2 HHA\n*m3 -AA\n");

        let again = adapter.read(out.as_slice(), Parent::P1).unwrap();
        assert_eq!(again, m);

        let short = CarthaGene { individuals: vec!["F1".into()], ..adapter };
        assert!(short.read(text.as_bytes(), Parent::P1).is_err());
    }

    #[cfg(unix)]
    fn shell_driver(parallel: bool) -> CarthaGeneDriver {
        let commands = CarthaGeneCommands {
            load: String::from("test -f '$file' && echo loaded"),
            marker_info: String::from("printf 'Num Names : Sets\\n1 m1 : f2\\n2 m2 : f2\\n3 m3 : f2\\n'"),
            group: String::from("echo '1: m1 m3'; echo '2: m2'"),
            select: String::from("SEL='$loci'"),
            build: String::from("true"),
            print_map: String::from("d=0; for i in $SEL; do echo \"$i $d\"; d=$((d+10)); done"),
        };
        let config = DriverConfig { commands, parallel, ..Default::default() };
        CarthaGeneDriver::new(config, SymbolAliases::default())
    }

    #[cfg(unix)]
    fn shell() -> crate::engine::ProcessEngine {
        crate::engine::ProcessEngine::new(crate::engine::EngineConfig {
            program: String::from("sh"),
            args: vec![],
            end_marker: String::from("__LMTK_END__"),
            echo_command: String::from("echo __LMTK_END__"),
        })
    }

    #[cfg(unix)]
    #[test]
    fn driver_session() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchSpace::new(dir.path().to_path_buf(), Some(String::from("test")));

        for parallel in [false, true] {
            let out = shell_driver(parallel).run(&shell(), &matrix(), &scratch).unwrap();
            assert_eq!(out.markers.len(), 3);
            assert_eq!(out.groups.groups()[&1], vec!["m1", "m3"]);
            assert_eq!(out.maps["1"].loci(), vec!["m1", "m3"]);
            assert_eq!(out.maps["1"].length(), 10.0);
            assert_eq!(out.maps["2"].loci(), vec!["m2"]);
            assert!(!dir.path().join("test_P1.raw").exists());
        }
    }

    #[cfg(unix)]
    #[test]
    fn driver_rejects_foreign_markers() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchSpace::new(dir.path().to_path_buf(), None);
        let mut driver = shell_driver(false);
        driver.config.commands.marker_info = String::from("printf '1 m1 f2\\n2 m2 f2\\n3 m7 f2\\n'");
        let res = driver.run(&shell(), &matrix(), &scratch);
        assert!(matches!(res, Err(Error::UnknownLocusReference { .. })));
        assert!(!dir.path().join("P1.raw").exists());
    }
}
