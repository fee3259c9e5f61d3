use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::domain::ProgressEvent;

/// CSI sequences such as "\x1b[0;31m" or "\x1b[K"
static ANSI_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("valid ANSI regex"));

/// `[download]  45.2% of ~12.34MiB at  1.23MiB/s ETA 00:45`
static DOWNLOAD_PERCENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[download\]\s+(\d+(?:\.\d+)?)%").expect("valid download progress regex")
});

static DOWNLOAD_SPEED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bat\s+([\d.]+\s*[KMGT]?i?B/s)").expect("valid download speed regex")
});

static DOWNLOAD_ETA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bETA\s+(\d+(?::\d+)+)").expect("valid ETA regex"));

/// Strip terminal colour/cursor escapes and surrounding whitespace from tool output.
pub fn clean_tool_output(raw: &str) -> String {
    ANSI_ESCAPE.replace_all(raw, "").trim().to_string()
}

/// Host part of a URL, for log fields. Non-URL inputs (e.g. "ytsearch:...") yield None.
pub fn url_host(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
}

/// Interpret one cleaned stdout line of yt-dlp. Lines that carry nothing
/// worth showing yield None.
pub fn parse_progress_line(line: &str) -> Option<ProgressEvent> {
    if let Some(caps) = DOWNLOAD_PERCENT.captures(line) {
        let percent = caps[1].parse::<f32>().ok()?.clamp(0.0, 100.0);
        return Some(ProgressEvent::Percent {
            percent,
            speed: DOWNLOAD_SPEED
                .captures(line)
                .map(|c| c[1].to_string()),
            eta: DOWNLOAD_ETA.captures(line).map(|c| c[1].to_string()),
        });
    }

    if line.starts_with("[Merger]") || line.contains("Merging formats") {
        return Some(ProgressEvent::Status("Merging files...".to_string()));
    }
    if line.starts_with("[download] Destination:") {
        return Some(ProgressEvent::Status("Downloading video...".to_string()));
    }
    if let Some(info) = line.strip_prefix("[info] ") {
        return Some(ProgressEvent::Status(info.to_string()));
    }
    if line.contains("Extracting URL") {
        return Some(ProgressEvent::Status(
            "Fetching video information...".to_string(),
        ));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_tool_output() {
        assert_eq!(clean_tool_output("network error\n"), "network error");
        assert_eq!(
            clean_tool_output("\x1b[0;31mERROR:\x1b[0m Unsupported URL\n"),
            "ERROR: Unsupported URL"
        );
        assert_eq!(clean_tool_output("  \n"), "");
    }

    #[test]
    fn test_url_host() {
        assert_eq!(
            url_host("https://www.example.com/watch?v=1").as_deref(),
            Some("www.example.com")
        );
        assert_eq!(url_host("ytsearch:rust"), None);
        assert_eq!(url_host("not a url"), None);
    }

    #[test]
    fn test_parse_percent_line() {
        let event = parse_progress_line("[download]  45.2% of ~123.45MiB at  1.23MiB/s ETA 00:45");
        assert_eq!(
            event,
            Some(ProgressEvent::Percent {
                percent: 45.2,
                speed: Some("1.23MiB/s".to_string()),
                eta: Some("00:45".to_string()),
            })
        );
    }

    #[test]
    fn test_parse_finished_percent_line() {
        let event = parse_progress_line("[download] 100% of 10.00MiB in 00:00:03 at 3.10MiB/s");
        assert_eq!(
            event,
            Some(ProgressEvent::Percent {
                percent: 100.0,
                speed: Some("3.10MiB/s".to_string()),
                eta: None,
            })
        );
    }

    #[test]
    fn test_parse_status_lines() {
        assert_eq!(
            parse_progress_line("[Merger] Merging formats into \"/tmp/a.mp4\""),
            Some(ProgressEvent::Status("Merging files...".to_string()))
        );
        assert_eq!(
            parse_progress_line("[info] abc123: Downloading 1 format(s): 22"),
            Some(ProgressEvent::Status(
                "abc123: Downloading 1 format(s): 22".to_string()
            ))
        );
        assert_eq!(
            parse_progress_line("[download] Destination: /tmp/a.mp4"),
            Some(ProgressEvent::Status("Downloading video...".to_string()))
        );
        assert_eq!(parse_progress_line("[youtube] abc123: Downloading webpage"), None);
    }
}
