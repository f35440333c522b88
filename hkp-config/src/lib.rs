use std::path::Path;

pub mod device_settings;
pub mod script;
pub mod serial_coms;

/// USB serial numbers of HKP keypads start with this.
pub const SERIAL_NUMBER_PREFIX: &str = "hkp:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptError {
    pub message: String,
    /// One based line number in the script, if the error belongs to a line.
    pub line: Option<usize>,
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(f, "{} (line {line})", &self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ScriptError {}

impl From<std::io::Error> for ScriptError {
    fn from(err: std::io::Error) -> Self {
        Self {
            message: err.to_string(),
            line: None,
        }
    }
}

impl ScriptError {
    pub fn new(message: String, line: usize) -> Self {
        Self {
            message,
            line: Some(line),
        }
    }

    /// Formats the error with the offending line quoted, compiler style.
    pub fn long_format(&self, source_file: &Path, source: &str) -> String {
        let Some(line) = self.line else {
            return format!("error: {}\n   --> {}", self.message, source_file.display());
        };
        let text = line
            .checked_sub(1)
            .and_then(|i| source.lines().nth(i))
            .unwrap_or_default();
        let width = line.to_string().len();
        format!(
            "error: {}\n{:width$}--> {}:{line}\n{:width$} |\n{line} | {text}\n",
            self.message,
            "",
            source_file.display(),
            "",
        )
    }
}

/// Reads and checks a settings script, printing any error in long form.
pub fn pretty_load(file: &Path) -> Result<String, ScriptError> {
    let src = std::fs::read_to_string(file)?;
    match script::parse_script(&src) {
        Ok(_) => Ok(src),
        Err(err) => {
            eprintln!("{}", err.long_format(file, &src));
            Err(err)
        }
    }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod test;
