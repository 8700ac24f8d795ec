use std::io::{self, BufRead, Write};
use std::path::PathBuf;

/// Reads one trimmed line, `None` at end of input.
fn read_answer<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    question: &str,
) -> io::Result<Option<String>> {
    write!(out, "{question}")?;
    out.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Asks a yes/no question; only `y` (any case) counts as yes.
pub fn confirm<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    question: &str,
) -> io::Result<bool> {
    let answer = read_answer(input, out, &format!("{question} (y/n): "))?;
    Ok(answer.is_some_and(|a| a.eq_ignore_ascii_case("y")))
}

/// Prompts until the user names an existing directory.
///
/// Returns `None` when the user declines to retry or input ends.
pub fn ask_input_directory<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
) -> io::Result<Option<PathBuf>> {
    loop {
        let Some(answer) = read_answer(input, out, "Directory to analyze: ")? else {
            return Ok(None);
        };

        if answer.is_empty() {
            writeln!(out, "Error: the directory name cannot be empty!")?;
            continue;
        }

        let path = PathBuf::from(&answer);
        let problem = if !path.exists() {
            format!("Error: the directory '{answer}' does not exist!")
        } else if !path.is_dir() {
            format!("Error: '{answer}' is not a directory!")
        } else {
            return Ok(Some(path));
        };

        writeln!(out, "{problem}")?;
        if !confirm(input, out, "Try again?")? {
            return Ok(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn run_prompt(script: &str) -> (Option<PathBuf>, String) {
        let mut input = Cursor::new(script.as_bytes().to_vec());
        let mut out = Vec::new();
        let dir = ask_input_directory(&mut input, &mut out).expect("prompt");
        (dir, String::from_utf8(out).expect("utf8"))
    }

    #[test]
    fn empty_answer_reprompts() {
        let dir = TempDir::new().expect("tempdir");
        let script = format!("\n  \n{}\n", dir.path().display());
        let (chosen, transcript) = run_prompt(&script);
        assert_eq!(chosen.as_deref(), Some(dir.path()));
        assert_eq!(transcript.matches("cannot be empty").count(), 2);
    }

    #[test]
    fn missing_directory_offers_retry() {
        let dir = TempDir::new().expect("tempdir");
        let missing = dir.path().join("nope");
        let script = format!("{}\nY\n{}\n", missing.display(), dir.path().display());
        let (chosen, transcript) = run_prompt(&script);
        assert_eq!(chosen.as_deref(), Some(dir.path()));
        assert!(transcript.contains("does not exist"));
    }

    #[test]
    fn declining_retry_cancels() {
        let dir = TempDir::new().expect("tempdir");
        let file = dir.path().join("photo.jpg");
        std::fs::write(&file, b"x").expect("write");
        let (chosen, transcript) = run_prompt(&format!("{}\nn\n", file.display()));
        assert!(chosen.is_none());
        assert!(transcript.contains("is not a directory"));
    }

    #[test]
    fn end_of_input_cancels() {
        let (chosen, _) = run_prompt("");
        assert!(chosen.is_none());
    }

    #[test]
    fn only_y_confirms() {
        for (answer, expected) in [
            ("y\n", true),
            ("Y\n", true),
            ("yes\n", false),
            ("s\n", false),
            ("", false),
        ] {
            let mut input = Cursor::new(answer.as_bytes().to_vec());
            let mut out = Vec::new();
            assert_eq!(
                confirm(&mut input, &mut out, "Proceed?").expect("confirm"),
                expected,
                "answer {answer:?}"
            );
        }
    }
}
