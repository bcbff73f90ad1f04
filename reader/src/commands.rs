//! Line commands understood by the interactive reader.

use std::path::PathBuf;

use crate::error::ReaderError;
use crate::validation::validate_text;

pub const HELP: &str = "\
Commands:
  load <file>           load a story (clears the speech cache)
  list                  show the story with sentence numbers
  read <n>              read sentence n aloud
  read all              read every sentence in order
  word <text>           read a word or phrase aloud
  edit                  enter edit mode (prefetch paused)
  edit <n> <text>       replace the text of sentence n
  done                  leave edit mode and prefetch again
  export <n> <file>     write sentence n as a WAV file
  status                show playback and cache state
  help                  show this help
  quit                  exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Load(PathBuf),
    List,
    /// Sentence number as shown to the user, starting at 1
    Read(usize),
    ReadAll,
    Word(String),
    BeginEdit,
    Edit(usize, String),
    Done,
    Export(usize, PathBuf),
    Status,
    Help,
    Quit,
}

fn sentence_number(arg: Option<&str>) -> Result<usize, ReaderError> {
    let arg = arg.ok_or_else(|| ReaderError::InvalidInput("Missing sentence number".to_string()))?;
    match arg.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(ReaderError::InvalidInput(format!(
            "Invalid sentence number: {arg}"
        ))),
    }
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse(line: &str) -> Result<Option<Command>, ReaderError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (name, rest) = match line.split_once(char::is_whitespace) {
        Some((name, rest)) => (name, rest.trim()),
        None => (line, ""),
    };

    let command = match name.to_ascii_lowercase().as_str() {
        "load" if !rest.is_empty() => Command::Load(PathBuf::from(rest)),
        "load" => return Err(ReaderError::InvalidInput("Missing story file".to_string())),
        "list" | "ls" => Command::List,
        "read" | "r" if rest.eq_ignore_ascii_case("all") => Command::ReadAll,
        "read" | "r" => Command::Read(sentence_number(Some(rest).filter(|r| !r.is_empty()))?),
        "word" | "w" => {
            validate_text(rest)?;
            Command::Word(rest.to_string())
        }
        "edit" if rest.is_empty() => Command::BeginEdit,
        "edit" => {
            let (number, text) = rest
                .split_once(char::is_whitespace)
                .map(|(n, t)| (n, t.trim()))
                .unwrap_or((rest, ""));
            let number = sentence_number(Some(number))?;
            validate_text(text)?;
            Command::Edit(number, text.to_string())
        }
        "done" => Command::Done,
        "export" => {
            let mut parts = rest.splitn(2, char::is_whitespace);
            let number = sentence_number(parts.next().filter(|n| !n.is_empty()))?;
            let path = parts
                .next()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .ok_or_else(|| ReaderError::InvalidInput("Missing output file".to_string()))?;
            Command::Export(number, PathBuf::from(path))
        }
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => {
            return Err(ReaderError::InvalidInput(format!(
                "Unknown command: {other} (try 'help')"
            )))
        }
    };
    Ok(Some(command))
}
