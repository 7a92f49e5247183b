//! Wire command set understood by the MKS Wi-Fi firmware.

use std::fmt;

/// A command code placed on the wire, before the CRLF terminator.
///
/// This is the Marlin SD-print subset plus the MKS-specific status queries.
/// Variants that carry a file name are formatted at send time; everything
/// else is a fixed code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Hotend/bed temperature query (MKS equivalent of Marlin M105).
    TempQuery,
    /// SD/USB print progress in percent.
    Progress,
    /// Elapsed print time (hh:mm:ss).
    Elapsed,
    /// Machine state: IDLE / PRINTING / PAUSE.
    State,
    /// Open a file on the printer's storage for writing.
    BeginWrite { name: String },
    /// Close the file opened by `BeginWrite`.
    EndWrite,
    /// Select a stored file for printing.
    Select { name: String },
    /// Start, or resume, the selected print.
    Start,
    /// Pause the running print.
    Pause,
    /// Abort the running print (MKS reuses M26 instead of Marlin M524).
    Abort,
    /// Toggle between SD and USB storage.
    SwitchStorage,
}

impl Command {
    /// The exact text sent to the printer.
    pub fn wire(&self) -> String {
        match self {
            Command::TempQuery => "M991".to_string(),
            Command::Progress => "M27".to_string(),
            Command::Elapsed => "M992".to_string(),
            Command::State => "M997".to_string(),
            Command::BeginWrite { name } => format!("M28 {name}"),
            Command::EndWrite => "M29".to_string(),
            Command::Select { name } => format!("M23 {name}"),
            Command::Start => "M24".to_string(),
            Command::Pause => "M25".to_string(),
            Command::Abort => "M26".to_string(),
            Command::SwitchStorage => "M998".to_string(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wire())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_codes() {
        assert_eq!(Command::TempQuery.wire(), "M991");
        assert_eq!(Command::Progress.wire(), "M27");
        assert_eq!(Command::Elapsed.wire(), "M992");
        assert_eq!(Command::State.wire(), "M997");
        assert_eq!(Command::EndWrite.wire(), "M29");
        assert_eq!(Command::Start.wire(), "M24");
        assert_eq!(Command::Pause.wire(), "M25");
        assert_eq!(Command::Abort.wire(), "M26");
        assert_eq!(Command::SwitchStorage.wire(), "M998");
    }

    #[test]
    fn test_templated_codes_carry_the_name() {
        let begin = Command::BeginWrite { name: "FACTI~1.GCO".to_string() };
        assert_eq!(begin.wire(), "M28 FACTI~1.GCO");
        let select = Command::Select { name: "benchy.gcode".to_string() };
        assert_eq!(select.wire(), "M23 benchy.gcode");
    }

    #[test]
    fn test_display_matches_wire() {
        assert_eq!(Command::State.to_string(), "M997");
    }
}
