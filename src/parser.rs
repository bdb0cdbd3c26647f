//! Plain-text instances in the OR-Library layout.
//!
//! The first line holds `n_jobs n_machines`, every following line lists the
//! `machine duration` pairs of one job. Blank lines and lines starting with
//! `#` are skipped.

use crate::data::Instance;
use crate::error::Error;
use crate::json;
use std::fs;
use std::path::Path;
use std::str::FromStr;

pub fn parse_instance(name: &str, contents: &str) -> Result<Instance, Error> {
  let mut lines = contents
    .lines()
    .enumerate()
    .map(|(i, line)| (i + 1, line.trim()))
    .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'));

  let (prelude_line, prelude) = lines.next().ok_or_else(|| Error::Parse {
    line: 1,
    message: "prelude missing".to_string(),
  })?;
  let prelude_items: Vec<&str> = prelude.split_whitespace().collect();
  let n_jobs: usize = parse_field(prelude_items.get(0), prelude_line, "n_jobs")?;
  let n_machines: usize = parse_field(prelude_items.get(1), prelude_line, "n_machines")?;
  if prelude_items.len() > 2 {
    return Err(Error::Parse {
      line: prelude_line,
      message: format!("unexpected prelude item `{}`", prelude_items[2]),
    });
  }

  let mut raw_jobs = Vec::with_capacity(n_jobs);
  for (line_no, line) in lines {
    let items: Vec<&str> = line.split_whitespace().collect();
    if items.len() % 2 != 0 {
      return Err(Error::Parse {
        line: line_no,
        message: "expected machine and duration pairs".to_string(),
      });
    }

    let mut operations = Vec::with_capacity(items.len() / 2);
    for pair in items.chunks(2) {
      let machine: i64 = parse_field(pair.get(0), line_no, "machine")?;
      let duration: i64 = parse_field(pair.get(1), line_no, "duration")?;
      operations.push((machine, duration));
    }
    raw_jobs.push(operations);
  }

  return Ok(Instance::new(name, n_jobs, n_machines, raw_jobs, None)?);
}

fn parse_field<T: FromStr>(item: Option<&&str>, line: usize, what: &str) -> Result<T, Error> {
  let item = item.ok_or_else(|| Error::Parse {
    line: line,
    message: format!("{} missing", what),
  })?;
  return item.parse().map_err(|_| Error::Parse {
    line: line,
    message: format!("invalid {} `{}`", what, item),
  });
}

/// Reads `.json` files as JSON instances and everything else as plain text
/// named after the file stem.
pub fn read_instance(path: &Path) -> Result<Instance, Error> {
  let contents = fs::read_to_string(path)?;
  let is_json = path
    .extension()
    .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));

  if is_json {
    return json::parse_instance(&contents);
  }

  let name = path
    .file_stem()
    .and_then(|stem| stem.to_str())
    .unwrap_or("unnamed");
  return parse_instance(name, &contents);
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::data::test::ft03;
  use crate::error::ValidationError;

  const FT03: &str = "# ft03
3 3
0 3 1 2 2 2
1 2 2 1 0 1

2 3 0 1 1 2
";

  #[test]
  fn test_parse_instance() {
    let inst = parse_instance("ft03", FT03).unwrap();
    assert_eq!(inst.name(), "ft03");
    assert_eq!(inst.n_jobs(), 3);
    assert_eq!(inst.durations(), ft03().durations());
    assert_eq!(inst.machines(), ft03().machines());
  }

  #[test]
  fn test_parse_errors_name_the_line() {
    match parse_instance("bad", "2 2\n0 1 1\n") {
      Err(Error::Parse { line: 2, .. }) => {}
      other => panic!("unexpected result {:?}", other),
    }
    match parse_instance("bad", "2 x\n") {
      Err(Error::Parse { line: 1, message }) => assert!(message.contains("n_machines")),
      other => panic!("unexpected result {:?}", other),
    }
    match parse_instance("bad", "\n\n") {
      Err(Error::Parse { line: 1, .. }) => {}
      other => panic!("unexpected result {:?}", other),
    }
  }

  #[test]
  fn test_job_count_is_validated() {
    match parse_instance("short", "2 1\n0 4\n") {
      Err(Error::Validation(ValidationError::JobCountMismatch {
        expected: 2,
        found: 1,
      })) => {}
      other => panic!("unexpected result {:?}", other),
    }
  }

  #[test]
  fn test_read_instance_by_extension() {
    let dir = std::env::temp_dir();
    let text_path = dir.join("jobshop_parser_test_ft03.txt");
    let json_path = dir.join("jobshop_parser_test_ft03.json");
    fs::write(&text_path, FT03).unwrap();
    fs::write(&json_path, json::instance_to_string(&ft03()).unwrap()).unwrap();

    let from_text = read_instance(&text_path).unwrap();
    assert_eq!(from_text.name(), "jobshop_parser_test_ft03");
    assert_eq!(from_text.durations(), ft03().durations());
    assert_eq!(read_instance(&json_path).unwrap(), ft03());

    fs::remove_file(&text_path).unwrap();
    fs::remove_file(&json_path).unwrap();
  }
}
