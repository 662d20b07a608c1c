/// Extracts the id of a freshly created task from the tool's `add` output.
///
/// The tool prints a human sentence (`Created task 42.`) rather than a
/// record, so this is a heuristic and kept swappable.
pub trait CreatedIdParser {
    fn parse_created_id(&self, stdout: &str) -> Option<u32>;
}

/// Takes the first run of decimal digits.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstDigitRun;

impl CreatedIdParser for FirstDigitRun {
    fn parse_created_id(&self, stdout: &str) -> Option<u32> {
        stdout
            .split(|ch: char| !ch.is_ascii_digit())
            .find(|run| !run.is_empty())
            .and_then(|run| run.parse().ok())
    }
}
