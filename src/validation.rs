use crate::error::{FieldViolation, ValidationError};
use crate::types::{BuildRequest, BuildRequestCandidate};
use url::Url;

const REQUIRED: &str = "is required";
const NOT_A_URL: &str = "must be an absolute http(s) URL";

/// Check a wire candidate and turn it into a `BuildRequest`.
///
/// Every violation is collected so the caller sees all bad fields at once.
/// Values are trimmed before the emptiness check and stored trimmed.
pub fn validate(candidate: BuildRequestCandidate) -> Result<BuildRequest, ValidationError> {
    let mut violations = Vec::new();

    let project_github_url = required("project_github_url", candidate.project_github_url, &mut violations);
    if let Some(url) = project_github_url.as_deref() {
        if !is_http_url(url) {
            violations.push(FieldViolation {
                field: "project_github_url",
                reason: NOT_A_URL,
            });
        }
    }
    let build_command = required("build_command", candidate.build_command, &mut violations);
    let build_out_dir = required("build_out_dir", candidate.build_out_dir, &mut violations);

    match (project_github_url, build_command, build_out_dir) {
        (Some(url), Some(command), Some(out_dir)) if violations.is_empty() => {
            Ok(BuildRequest::new(url, command, out_dir))
        }
        _ => Err(ValidationError { violations }),
    }
}

fn required(
    field: &'static str,
    value: Option<String>,
    violations: &mut Vec<FieldViolation>,
) -> Option<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Some(v),
        _ => {
            violations.push(FieldViolation {
                field,
                reason: REQUIRED,
            });
            None
        }
    }
}

fn is_http_url(raw: &str) -> bool {
    match Url::parse(raw) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty()),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(url: Option<&str>, command: Option<&str>, out_dir: Option<&str>) -> BuildRequestCandidate {
        BuildRequestCandidate {
            project_github_url: url.map(str::to_string),
            build_command: command.map(str::to_string),
            build_out_dir: out_dir.map(str::to_string),
        }
    }

    #[test]
    fn test_accepts_complete_request() {
        let request = validate(candidate(
            Some("https://github.com/a/b"),
            Some("npm run build"),
            Some("dist"),
        ))
        .unwrap();
        assert_eq!(request.project_github_url(), "https://github.com/a/b");
        assert_eq!(request.build_command(), "npm run build");
        assert_eq!(request.build_out_dir(), "dist");
    }

    #[test]
    fn test_trims_surrounding_whitespace() {
        let request = validate(candidate(
            Some("  https://github.com/a/b "),
            Some(" make "),
            Some("\tbuild\n"),
        ))
        .unwrap();
        assert_eq!(request.build_command(), "make");
        assert_eq!(request.build_out_dir(), "build");
    }

    #[test]
    fn test_reports_every_missing_field() {
        let err = validate(candidate(None, Some(""), Some("   "))).unwrap_err();
        assert_eq!(
            err.fields(),
            vec!["project_github_url", "build_command", "build_out_dir"]
        );
    }

    #[test]
    fn test_rejects_non_http_url() {
        for bad in ["github.com/a/b", "ftp://github.com/a/b", "not a url"] {
            let err = validate(candidate(Some(bad), Some("make"), Some("dist"))).unwrap_err();
            assert_eq!(err.fields(), vec!["project_github_url"], "input {bad:?}");
            assert!(err.to_string().contains("absolute http(s) URL"));
        }
    }

    #[test]
    fn test_accepts_plain_http_url() {
        assert!(validate(candidate(Some("http://git.internal/x.git"), Some("make"), Some("out"))).is_ok());
    }
}
