//! Interactive confirmation.

use std::io::{self, BufRead, Write};

/// Asks `question` on stderr until the answer is yes or no.
///
/// End of input counts as no.
pub(crate) fn confirm(question: &str) -> io::Result<bool> {
    let stdin = io::stdin();
    confirm_with(question, &mut stdin.lock(), &mut io::stderr())
}

fn confirm_with<R: BufRead, W: Write>(question: &str, input: &mut R, out: &mut W) -> io::Result<bool> {
    loop {
        write!(out, "{question} (yes / no) ")?;
        out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(out)?;
            return Ok(false);
        }

        match line.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn answer(input: &str) -> bool {
        let mut out = Vec::new();
        confirm_with("Continue?", &mut Cursor::new(input.as_bytes()), &mut out).unwrap()
    }

    #[test]
    fn test_answers() {
        assert!(answer("yes\n"));
        assert!(answer("Y\n"));
        assert!(!answer("no\n"));
        assert!(!answer(""));
    }

    #[test]
    fn test_reprompts_on_garbage() {
        let mut out = Vec::new();
        let result =
            confirm_with("Continue?", &mut Cursor::new(b"maybe\nyes\n".to_vec()), &mut out).unwrap();
        assert!(result);
        assert_eq!(String::from_utf8(out).unwrap().matches("Continue?").count(), 2);
    }
}
