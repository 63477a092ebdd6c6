use std::io::{self, BufRead, Write};

use anyhow::Result;
use tracing::warn;

/// Ask a yes/no question on stdin, writing the question to stderr so stdout only holds output
pub fn confirm(question: &str) -> Result<bool> {
  let stdin = io::stdin();
  let stderr = io::stderr();
  confirm_with(&mut stdin.lock(), &mut stderr.lock(), question)
}

/// Ask a yes/no question; only `y` or `Y` counts as yes
pub fn confirm_with<R: BufRead, W: Write>(reader: &mut R, writer: &mut W, question: &str) -> Result<bool> {
  write!(writer, "{question} (y/n): ")?;
  writer.flush()?;

  let mut answer = String::new();
  reader.read_line(&mut answer)?;

  Ok(matches!(answer.trim(), "y" | "Y"))
}

/// Decide whether a deletion should proceed, given the mutation flags
///
/// - `--force` alone never deletes
/// - `--delete --force` deletes without asking
/// - `--delete` asks first
pub fn should_delete(delete: bool, force: bool, question: &str) -> Result<bool> {
  decide(delete, force, || confirm(question))
}

fn decide<F>(delete: bool, force: bool, ask: F) -> Result<bool>
where
  F: FnOnce() -> Result<bool>,
{
  match (delete, force) {
    (false, true) => {
      warn!("--force was provided without --delete; nothing will be deleted");
      Ok(false)
    }
    (false, false) => Ok(false),
    (true, true) => Ok(true),
    (true, false) => ask(),
  }
}

#[cfg(test)]
mod tests {
  use std::io::Cursor;

  use rstest::*;

  use super::*;

  #[rstest]
  #[case("y\n", true)]
  #[case("Y\n", true)]
  #[case("  y  \n", true)]
  #[case("yes\n", false)]
  #[case("n\n", false)]
  #[case("\n", false)]
  #[case("", false)]
  fn confirm_with_test(#[case] input: &str, #[case] expected: bool) {
    let mut reader = Cursor::new(input.as_bytes());
    let mut writer = Vec::new();

    let result = confirm_with(&mut reader, &mut writer, "Delete it?").unwrap();

    assert_eq!(result, expected);
    assert_eq!(String::from_utf8(writer).unwrap(), "Delete it? (y/n): ");
  }

  #[rstest]
  #[case(false, false, false)]
  #[case(false, true, false)]
  #[case(true, true, true)]
  fn decide_without_asking_test(#[case] delete: bool, #[case] force: bool, #[case] expected: bool) {
    let result = decide(delete, force, || panic!("should not prompt")).unwrap();
    assert_eq!(result, expected);
  }

  #[rstest]
  #[case(true)]
  #[case(false)]
  fn decide_asks_when_not_forced(#[case] answer: bool) {
    let result = decide(true, false, || Ok(answer)).unwrap();
    assert_eq!(result, answer);
  }
}
