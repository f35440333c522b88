//! Settings scripts: files of protocol lines sent to a keypad by `apply`.
//!
//! Blank lines and lines starting with `#` are skipped. Every other line must parse as a keypad
//! command; a script with any bad line is refused as a whole.

use hkp_common::protocol::{parse_command, Command, MAX_LINE_LEN};

use crate::ScriptError;

/// Returns the command lines of `src` in order, trimmed.
pub fn parse_script(src: &str) -> Result<Vec<&str>, ScriptError> {
    let mut lines = vec![];
    for (i, line) in src.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        check_line(line).map_err(|message| ScriptError::new(message, i + 1))?;
        lines.push(line);
    }
    Ok(lines)
}

/// Checks one command line the way the keypad would parse it.
pub fn check_line(line: &str) -> Result<(), String> {
    if line.len() > MAX_LINE_LEN {
        return Err(format!("line longer than {MAX_LINE_LEN} bytes"));
    }
    match parse_command(line) {
        Ok(Command::Boot) => Err("boot is not allowed in a settings script".into()),
        Ok(_) => Ok(()),
        Err(err) => Err(format!("{err}: {line}")),
    }
}

#[cfg(test)]
#[path = "script_test.rs"]
mod test;
