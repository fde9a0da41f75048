use anyhow::{Result, bail};
use regex::Regex;

/// An argv template with `{column}` placeholders resolved against a
/// roster header up front, so typos fail before any work starts.
///
/// Placeholders are only accepted in arguments. The program word must be
/// literal: roster data gets to fill in arguments, never to pick what
/// runs. Arguments are passed to the process as-is, one argv entry per
/// template word, with no shell in between.
#[derive(Debug, Clone)]
pub struct CommandTemplate {
    program: String,
    args: Vec<Vec<Segment>>,
}

#[derive(Debug, Clone)]
enum Segment {
    Literal(String),
    Field(usize),
}

impl CommandTemplate {
    /// Compile the words after `--` against the roster's column names.
    pub fn compile(words: &[String], headers: &[String]) -> Result<Self> {
        let Some((program, arg_words)) = words.split_first() else {
            bail!("no command given after `--`");
        };
        let placeholder = Regex::new(r"\{([^{}]+)\}")?;

        if placeholder.is_match(program) {
            bail!("placeholders are not allowed in the program name ({program})");
        }

        let mut args = Vec::with_capacity(arg_words.len());
        for word in arg_words {
            args.push(compile_word(word, &placeholder, headers)?);
        }
        Ok(Self {
            program: program.clone(),
            args,
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Expand the argument list for one row of fields.
    pub fn render_args(&self, fields: &[String]) -> Vec<String> {
        self.args
            .iter()
            .map(|segments| {
                let mut arg = String::new();
                for segment in segments {
                    match segment {
                        Segment::Literal(text) => arg.push_str(text),
                        Segment::Field(column) => {
                            arg.push_str(fields.get(*column).map(String::as_str).unwrap_or(""));
                        }
                    }
                }
                arg
            })
            .collect()
    }

    /// The full command line for one row, for logs and dry runs.
    pub fn render_line(&self, fields: &[String]) -> String {
        let mut line = self.program.clone();
        for arg in self.render_args(fields) {
            line.push(' ');
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                line.push_str(&format!("{arg:?}"));
            } else {
                line.push_str(&arg);
            }
        }
        line
    }
}

fn compile_word(word: &str, placeholder: &Regex, headers: &[String]) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut cursor = 0;
    for caps in placeholder.captures_iter(word) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > cursor {
            segments.push(Segment::Literal(word[cursor..whole.start()].to_string()));
        }
        match headers.iter().position(|header| header == name.as_str()) {
            Some(column) => segments.push(Segment::Field(column)),
            None => bail!(
                "unknown column {{{}}} in argument {word:?}; the roster has: {}",
                name.as_str(),
                headers.join(", ")
            ),
        }
        cursor = whole.end();
    }
    if cursor < word.len() {
        segments.push(Segment::Literal(word[cursor..].to_string()));
    }
    Ok(segments)
}
