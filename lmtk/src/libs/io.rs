use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use csv::{QuoteStyle, Reader, ReaderBuilder, Writer, WriterBuilder};

use crate::error::{Error, Result};
use crate::utils::strip_prefix;

pub fn get_tsv_reader<R: io::Read>(input: R, has_headers: bool) -> Reader<R> {
    ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(has_headers)
        .flexible(false)
        .from_reader(input)
}

pub fn get_csv_reader<R: io::Read>(input: R, has_headers: bool) -> Reader<R> {
    ReaderBuilder::new()
        .delimiter(b',')
        .has_headers(has_headers)
        .flexible(false)
        .from_reader(input)
}

pub fn get_csv_writer<W: io::Write>(output: W) -> Writer<W> {
    WriterBuilder::new()
        .delimiter(b',')
        .has_headers(false)
        .flexible(true)
        .quote_style(QuoteStyle::Never)
        .from_writer(output)
}

pub fn get_strict_tsv_writer<W: io::Write>(output: W) -> Writer<W> {
    WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .double_quote(false)
        .quote_style(QuoteStyle::Never)
        .from_writer(output)
}

pub fn get_input(filename: Option<PathBuf>) -> Result<Box<dyn io::Read>> {
    let input: Box<dyn io::Read> = match filename {
        Some(name) if name.as_os_str() == "-" => Box::new(io::stdin()),
        Some(name) => match niffler::from_path(&name) {
            Ok((reader, _)) => reader,
            Err(err) => {
                return Err(Error::Io {
                    path: name,
                    source: io::Error::new(io::ErrorKind::NotFound, err.to_string()),
                })
            }
        },
        None => Box::new(io::stdin()),
    };
    Ok(input)
}

pub fn get_buffered_input(filename: Option<PathBuf>) -> Result<Box<dyn BufRead>> {
    Ok(Box::new(BufReader::new(get_input(filename)?)))
}

pub fn get_output(filename: Option<PathBuf>) -> Result<Box<dyn io::Write>> {
    let output: Box<dyn io::Write> = match filename {
        Some(name) if name.as_os_str() == "-" => Box::new(io::stdout()),
        Some(name) => match File::options()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&name)
        {
            Ok(x) => Box::new(x),
            Err(source) => return Err(Error::Io { path: name, source }),
        },
        None => Box::new(io::stdout()),
    };
    Ok(output)
}

pub fn read_lines<P>(filename: P) -> Result<io::Lines<BufReader<File>>>
where
    P: AsRef<Path>,
{
    let file = File::open(&filename).map_err(|source| Error::Io {
        path: filename.as_ref().to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file).lines())
}

/// Read one id per row, ignoring blank rows
pub fn read_ids(path: &Path) -> Result<Vec<String>> {
    let mut ids = vec![];
    for line in read_lines(path)? {
        let line = line?;
        let line = line.trim();
        if !line.is_empty() {
            ids.push(line.to_string());
        }
    }
    Ok(ids)
}

pub fn push_to_output(prefix: &Option<String>, output: &mut PathBuf, name: &str, suffix: &str) {
    match strip_prefix(prefix.clone()) {
        Some(prefix) => output.push(format!("{prefix}_{name}.{suffix}")),
        None => output.push(format!("{name}.{suffix}")),
    }
}

#[cfg(test)]
#[rustfmt::skip]
mod tests {
    use super::*;

    #[test]
    fn test_push_to_output() {
        let mut output = PathBuf::new();
        push_to_output(&None, &mut output, "map", "tsv");
        assert_eq!(output, PathBuf::from("map.tsv"));

        let mut output = PathBuf::from("./foo");
        push_to_output(&None, &mut output, "map", "tsv");
        assert_eq!(output, PathBuf::from("./foo/map.tsv"));

        let mut output = PathBuf::from("./foo");
        push_to_output(&Some("nice".to_string()), &mut output, "map", "tsv");
        assert_eq!(output, PathBuf::from("./foo/nice_map.tsv"));
    }
}
