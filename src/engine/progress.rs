//! Engine progress streams.
//!
//! Docker reports build, pull and push progress as JSON lines
//! (`{"stream": ...}`, `{"status": ..., "id": ..., "progress": ...}`,
//! `{"error": ..., "errorDetail": {...}}`). CLI engines may also print
//! plain text; anything that is not a recognized JSON object is passed
//! through as [`ProgressEvent::Plain`].

use serde::Deserialize;

/// One parsed progress line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Build output (`stream`).
    Stream(String),
    /// Layer or transfer status.
    Status {
        id: Option<String>,
        status: String,
        progress: Option<String>,
    },
    /// Engine-reported error; the operation has failed.
    Error(String),
    /// Unstructured output.
    Plain(String),
}

impl ProgressEvent {
    /// Text suitable for a single line of terminal output, if any.
    pub fn display(&self) -> Option<String> {
        let text = match self {
            ProgressEvent::Stream(s) | ProgressEvent::Plain(s) | ProgressEvent::Error(s) => {
                s.trim_end().to_string()
            }
            ProgressEvent::Status {
                id,
                status,
                progress,
            } => {
                let mut line = String::new();
                if let Some(id) = id {
                    line.push_str(id);
                    line.push_str(": ");
                }
                line.push_str(status);
                if let Some(progress) = progress {
                    line.push(' ');
                    line.push_str(progress);
                }
                line
            }
        };
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ProgressEvent::Error(_))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProgress {
    stream: Option<String>,
    status: Option<String>,
    id: Option<String>,
    progress: Option<String>,
    error: Option<String>,
    error_detail: Option<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// Parse one line of engine output.
pub fn parse_line(line: &str) -> ProgressEvent {
    let trimmed = line.trim();
    if !trimmed.starts_with('{') {
        return ProgressEvent::Plain(line.to_string());
    }

    let Ok(raw) = serde_json::from_str::<RawProgress>(trimmed) else {
        return ProgressEvent::Plain(line.to_string());
    };

    if let Some(message) = raw
        .error_detail
        .and_then(|d| d.message)
        .or(raw.error)
    {
        return ProgressEvent::Error(message);
    }
    if let Some(stream) = raw.stream {
        return ProgressEvent::Stream(stream);
    }
    if let Some(status) = raw.status {
        return ProgressEvent::Status {
            id: raw.id,
            status,
            progress: raw.progress.filter(|p| !p.is_empty()),
        };
    }
    ProgressEvent::Plain(line.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_stream_lines() {
        let event = parse_line(r#"{"stream":"Step 1/3 : FROM alpine\n"}"#);
        assert_eq!(event, ProgressEvent::Stream("Step 1/3 : FROM alpine\n".into()));
        assert_eq!(event.display().as_deref(), Some("Step 1/3 : FROM alpine"));
    }

    #[test]
    fn parses_status_lines() {
        let event = parse_line(
            r#"{"status":"Pushing","id":"abc123","progress":"[==>   ] 1MB/4MB"}"#,
        );
        assert_eq!(
            event.display().as_deref(),
            Some("abc123: Pushing [==>   ] 1MB/4MB")
        );
    }

    #[test]
    fn error_detail_wins_over_error() {
        let event = parse_line(
            r#"{"error":"short","errorDetail":{"message":"denied: requested access"}}"#,
        );
        assert_eq!(event, ProgressEvent::Error("denied: requested access".into()));
        assert!(event.is_error());
    }

    #[test]
    fn bare_error_is_recognized() {
        assert!(parse_line(r#"{"error":"boom"}"#).is_error());
    }

    #[test]
    fn plain_text_passes_through() {
        let event = parse_line("#5 [2/3] RUN apk add curl");
        assert_eq!(event, ProgressEvent::Plain("#5 [2/3] RUN apk add curl".into()));
    }

    #[test]
    fn unrecognized_json_is_plain() {
        assert!(matches!(parse_line(r#"{"aux":{"ID":"sha256:1"}}"#), ProgressEvent::Plain(_)));
        assert!(matches!(parse_line("{not json"), ProgressEvent::Plain(_)));
    }

    #[test]
    fn blank_lines_have_no_display() {
        assert_eq!(parse_line("   ").display(), None);
        assert_eq!(parse_line(r#"{"stream":"\n"}"#).display(), None);
    }
}
