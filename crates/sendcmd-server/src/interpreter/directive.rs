//! Classification of batch entries.
//!
//! Every entry is classified before anything runs. Directives change the
//! session instead of being handed to the shell.

/// What a batch entry asks the interpreter to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive<'a> {
    /// Blank entry; nothing to run.
    Skip,
    /// `exit`, any case. Stops the batch.
    Exit,
    /// `cd <path>`
    ChangeDir(&'a str),
    /// `X:`, switch to the root of drive `X`.
    DriveChange(char),
    /// `set NAME=VALUE`; holds everything after `set `.
    SetEnv(&'a str),
    /// Anything else, run through the shell.
    Shell(&'a str),
}

impl<'a> Directive<'a> {
    /// Classifies one entry. Surrounding whitespace is ignored.
    pub fn classify(command: &'a str) -> Self {
        let command = command.trim();

        if command.is_empty() {
            return Directive::Skip;
        }

        if command.eq_ignore_ascii_case("exit") {
            return Directive::Exit;
        }

        if let Some(path) = strip_keyword(command, "cd") {
            return Directive::ChangeDir(path);
        }

        if let Some(letter) = drive_letter(command) {
            return Directive::DriveChange(letter);
        }

        if let Some(assignment) = strip_keyword(command, "set") {
            return Directive::SetEnv(assignment);
        }

        Directive::Shell(command)
    }
}

/// Returns the argument after `keyword` when `command` is `keyword`,
/// whitespace, then a non-empty argument.
fn strip_keyword<'a>(command: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = command.strip_prefix(keyword)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim_start();
    (!rest.is_empty()).then_some(rest)
}

fn drive_letter(command: &str) -> Option<char> {
    let mut chars = command.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some(letter), Some(':'), None) if letter.is_ascii_alphabetic() => Some(letter),
        _ => None,
    }
}
