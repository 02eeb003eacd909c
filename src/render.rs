//! HTML report renderer.
//!
//! Produces one self-contained page: inline CSS, one collapsible section per
//! thread, messages grouped under a header per calendar day.

use crate::error::{ReportError, Result};
use crate::models::{Direction, Thread};
use std::borrow::Cow;
use std::fs;
use std::path::Path;
use tracing::debug;

pub const DEFAULT_TITLE: &str = "Message Threads";
pub const DEFAULT_SELF_LABEL: &str = "Me";
const UNKNOWN_DAY_LABEL: &str = "Unknown date";

const STYLE: &str = "body{margin:0;background:#f5f6f8;color:#1f2328;font-family:system-ui,-apple-system,Segoe UI,Arial,sans-serif} \
.container{max-width:900px;margin:0 auto;padding:24px} \
h1{font-size:22px;margin:0 0 16px 0} \
.thread{background:#fff;border:1px solid #d8dee4;border-radius:8px;margin-bottom:10px;overflow:hidden} \
.thread-header{display:flex;gap:10px;align-items:baseline;width:100%;padding:12px 14px;border:0;background:none;cursor:pointer;text-align:left;font:inherit} \
.thread-header:hover{background:#f0f3f6} \
.contact{font-weight:600} .number,.count{color:#656d76;font-size:13px} .count{margin-left:auto} \
.thread-body{padding:0 14px 12px 14px;border-top:1px solid #d8dee4} \
.day{font-size:13px;color:#656d76;margin:14px 0 6px 0;text-transform:capitalize} \
.messages{list-style:none;margin:0;padding:0} \
.message{padding:4px 0;white-space:pre-wrap} \
.message.sent .sender{color:#0969da} .message.received .sender{color:#1a7f37} \
.sender{font-weight:600} .time{color:#656d76;font-size:12px;margin:0 6px}";

const SCRIPT: &str = "function toggleThread(id){var el=document.getElementById(id);if(el){el.hidden=!el.hidden;}}";

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub title: String,
    /// HTML-escape bodies and contact names. Off reproduces the old verbatim
    /// output, which lets message text inject markup into the page.
    pub escape_bodies: bool,
    /// Sender label for outgoing messages.
    pub self_label: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            escape_bodies: true,
            self_label: DEFAULT_SELF_LABEL.to_string(),
        }
    }
}

impl RenderOptions {
    fn text<'a>(&self, raw: &'a str) -> Cow<'a, str> {
        if self.escape_bodies {
            html_escape::encode_text(raw)
        } else {
            Cow::Borrowed(raw)
        }
    }
}

pub fn message_count_label(count: usize) -> String {
    if count == 1 {
        "1 message".to_string()
    } else {
        format!("{} messages", count)
    }
}

pub fn render_html(threads: &[Thread], options: &RenderOptions) -> String {
    let title = html_escape::encode_text(&options.title);

    let mut s = String::new();
    s.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    s.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    s.push_str(&format!("<title>{}</title>\n", title));
    s.push_str(&format!("<style>{}</style>\n", STYLE));
    s.push_str("</head>\n<body>\n<div class=\"container\">\n");
    s.push_str(&format!("<h1>{}</h1>\n", title));

    for (i, thread) in threads.iter().enumerate() {
        render_thread(&mut s, i, thread, options);
    }

    s.push_str("</div>\n");
    s.push_str(&format!("<script>{}</script>\n", SCRIPT));
    s.push_str("</body>\n</html>\n");
    s
}

fn render_thread(s: &mut String, index: usize, thread: &Thread, options: &RenderOptions) {
    let body_id = format!("thread-{}-body", index);
    // A number standing in for an unknown contact is not message text.
    let label = if thread.has_known_contact() {
        options.text(thread.display_label())
    } else {
        html_escape::encode_text(thread.display_label())
    };

    s.push_str(&format!("<section class=\"thread\" id=\"thread-{}\">\n", index));
    s.push_str(&format!(
        "<button class=\"thread-header\" type=\"button\" onclick=\"toggleThread('{}')\">",
        body_id
    ));
    s.push_str(&format!("<span class=\"contact\">{}</span>", label));
    if thread.has_known_contact() {
        s.push_str(&format!(
            "<span class=\"number\">{}</span>",
            html_escape::encode_text(&thread.number)
        ));
    }
    s.push_str(&format!(
        "<span class=\"count\">{}</span></button>\n",
        message_count_label(thread.messages.len())
    ));
    s.push_str(&format!("<div class=\"thread-body\" id=\"{}\" hidden>\n", body_id));

    // Messages arrive sorted, so each day is one contiguous run.
    let mut current_day: Option<&str> = None;
    for message in &thread.messages {
        let day_key = message.date.as_ref().map(|d| d.day_key.as_str()).unwrap_or_default();
        if current_day != Some(day_key) {
            if current_day.is_some() {
                s.push_str("</ul>\n");
            }
            let day_label = message
                .date
                .as_ref()
                .map(|d| d.day_label.as_str())
                .unwrap_or(UNKNOWN_DAY_LABEL);
            s.push_str(&format!("<h3 class=\"day\">{}</h3>\n<ul class=\"messages\">\n", day_label));
            current_day = Some(day_key);
        }

        let sender = match message.direction {
            Direction::Sent => options.text(&options.self_label),
            Direction::Received => label.clone(),
        };
        let time = message.date.as_ref().map(|d| d.time.as_str()).unwrap_or_default();
        s.push_str(&format!(
            "<li class=\"message {}\"><span class=\"sender\">{}</span><span class=\"time\">{}</span><span class=\"body\">{}</span></li>\n",
            message.direction.as_str(),
            sender,
            time,
            options.text(&message.body)
        ));
    }
    if current_day.is_some() {
        s.push_str("</ul>\n");
    }

    s.push_str("</div>\n</section>\n");
}

/// Write the report, replacing any existing file.
///
/// The document goes to a sibling temp file first and is renamed into place,
/// so a failed write leaves the previous report untouched.
pub fn write_report(path: &Path, html: &str) -> Result<()> {
    let fail = |source: std::io::Error| ReportError::WriteOutput {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(fail)?;
    }

    let tmp_path = path.with_extension("html.tmp");
    if let Err(e) = fs::write(&tmp_path, html).and_then(|_| fs::rename(&tmp_path, path)) {
        let _ = fs::remove_file(&tmp_path);
        return Err(fail(e));
    }

    debug!(path = %path.display(), bytes = html.len(), "wrote report");
    Ok(())
}
