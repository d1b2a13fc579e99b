/// Diagnostic reporting using ariadne for rejected import files
use crate::span::Span;
use crate::store::ImportError;
use ariadne::{Color, Label, Report, ReportKind, Source};
use std::ops::Range;

/// Convert a span to a range for ariadne
fn span_to_range(span: Span) -> Range<usize> {
    span.range()
}

/// Byte range of the first line, used when an error has no precise location
fn whole_source(source: &str) -> Range<usize> {
    0..source.find('\n').unwrap_or(source.len())
}

/// Byte range of the object key `name`, skipping string values that happen to match
fn key_range(source: &str, name: &str) -> Option<Range<usize>> {
    let needle = format!("\"{}\"", name);
    source
        .match_indices(&needle)
        .map(|(start, _)| start..start + needle.len())
        .find(|range| source[range.end..].trim_start().starts_with(':'))
}

/// Report an import error with source context
pub fn report_import_error(source_name: &str, source: &str, error: &ImportError) -> String {
    let mut output = Vec::new();

    let report = match error {
        ImportError::Syntax { message, span } => {
            Report::build(ReportKind::Error, source_name, span.start)
                .with_message("Import file is not valid JSON")
                .with_label(
                    Label::new((source_name, span_to_range(*span)))
                        .with_message(message)
                        .with_color(Color::Red),
                )
                .with_help("Make sure it's a valid JSON file exported from the picker")
                .finish()
        }
        ImportError::NotAnObject => Report::build(ReportKind::Error, source_name, 0)
            .with_message("Import file is not a list mapping")
            .with_label(
                Label::new((source_name, whole_source(source)))
                    .with_message("expected an object here")
                    .with_color(Color::Red),
            )
            .with_note("Import files look like {\"List name\": [\"Name 1\", \"Name 2\"]}")
            .finish(),
        ImportError::InvalidList { name } => {
            let range = key_range(source, name).unwrap_or_else(|| whole_source(source));
            Report::build(ReportKind::Error, source_name, range.start)
                .with_message(format!("Invalid list: '{}'", name))
                .with_label(
                    Label::new((source_name, range))
                        .with_message(format!("list '{}' must be an array of names", name))
                        .with_color(Color::Red),
                )
                .with_help("Every list must be an array of strings")
                .finish()
        }
    };

    if report
        .write((source_name, Source::from(source)), &mut output)
        .is_err()
    {
        return error.to_string();
    }

    String::from_utf8_lossy(&output).into_owned()
}
