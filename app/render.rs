use crate::state::{FlashKind, FlashMessage};

/// Central template renderer for the leafscan app.
///
/// Every screen shares one HTML shell (`app/assets/app.html`) with `{{TOKEN}}`
/// placeholders. `render_page` resolves the shell-wide tokens and hands the
/// rest to a screen-specific closure.
const TEMPLATE: &str = include_str!("assets/app.html");

/// The three screens of the app.
#[derive(Clone, Copy)]
pub enum Screen {
    Welcome,
    TryNow,
    Check,
}

impl Screen {
    fn title(self) -> &'static str {
        match self {
            Screen::Welcome => "Leafscan",
            Screen::TryNow  => "Leafscan · Try now",
            Screen::Check   => "Leafscan · Check your plant",
        }
    }
}

/// Renders a full page.
///
/// `fill` substitutes the screen-specific placeholders (`{{CONTENT}}`,
/// `{{HEAD_EXTRA}}`); anything left unfilled is blanked.
pub fn render_page<F>(screen: Screen, flash: Option<&FlashMessage>, fill: F) -> String
where
    F: FnOnce(String) -> String,
{
    let mut html = TEMPLATE.to_owned();
    html = html.replace("{{TITLE}}", screen.title());
    html = html.replace("{{FLASH}}", &render_flash_html(flash));
    html = fill(html);
    blank_remaining(html)
}

/// Replaces any `{{TOKEN}}` that wasn't substituted with an empty string.
fn blank_remaining(mut html: String) -> String {
    while let Some(start) = html.find("{{") {
        if let Some(end) = html[start..].find("}}") {
            let abs_end = start + end + 2;
            html.replace_range(start..abs_end, "");
        } else {
            break;
        }
    }
    html
}

pub fn render_flash_html(flash: Option<&FlashMessage>) -> String {
    match flash {
        None    => String::new(),
        Some(f) => {
            let cls = match f.kind {
                FlashKind::Success => "flash-success",
                FlashKind::Error   => "flash-error",
            };
            format!(r#"<div class="flash {}">{}</div>"#, cls, html_escape(&f.text))
        }
    }
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
     .replace('<', "&lt;")
     .replace('>', "&gt;")
     .replace('"', "&quot;")
}
