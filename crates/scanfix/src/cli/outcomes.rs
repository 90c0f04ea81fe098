//! Recent-outcomes table shown after watch sessions and batch runs.

use console::style;
use scanfix_core::ProcessingOutcome;

/// Emit recent outcomes: JSON on stdout, or a table on stderr.
pub fn emit_outcomes(outcomes: &[ProcessingOutcome], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcomes)?);
    } else {
        print_outcomes(outcomes);
    }
    Ok(())
}

/// Print recent outcomes, newest first, to stderr.
fn print_outcomes(outcomes: &[ProcessingOutcome]) {
    if outcomes.is_empty() {
        eprintln!("  No scans processed.");
        return;
    }

    eprintln!();
    eprintln!("  Recent scans (newest first)");
    eprintln!("  ------------------------------------");
    for outcome in outcomes {
        let mark = if outcome.succeeded {
            style("✓").green()
        } else {
            style("✗").red()
        };
        eprintln!("  {} {}", mark.for_stderr(), format_outcome(outcome));
    }
}

fn format_outcome(outcome: &ProcessingOutcome) -> String {
    let when = outcome.attempted_at.format("%Y-%m-%d %H:%M:%S");
    match &outcome.error_detail {
        Some(detail) if !outcome.succeeded => {
            format!("{when}  {}  ({detail})", outcome.source_file_name)
        }
        _ => format!("{when}  {}", outcome.source_file_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn outcome(succeeded: bool) -> ProcessingOutcome {
        let at = "2024-03-01T09:15:00Z".parse().unwrap();
        let source = PathBuf::from("/scans/scan1.jpg");
        let output = PathBuf::from("/scans/fixed/scan1.jpg");
        if succeeded {
            ProcessingOutcome::success(source, output, at)
        } else {
            ProcessingOutcome::failure(source, output, at, "Decode error")
        }
    }

    #[test]
    fn success_line_has_time_and_name() {
        assert_eq!(format_outcome(&outcome(true)), "2024-03-01 09:15:00  scan1.jpg");
    }

    #[test]
    fn failure_line_has_detail() {
        let line = format_outcome(&outcome(false));
        assert!(line.ends_with("scan1.jpg  (Decode error)"));
    }
}
