//! Dashboard Rendering
//!
//! Server-rendered HTML pages with Font Awesome icons and inline SVG charts.
//! Everything interpolated into markup goes through [`escape`].

pub mod charts;
pub mod pages;

pub use pages::{render_batch, render_index, render_not_found, IndexView, Notice};

const FONT_AWESOME_CSS: &str =
    "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.5.1/css/all.min.css";

const STYLE: &str = r#"
:root { --free-red: #cd1e25; --ink: #212529; --muted: #6c757d; --card: #ffffff; --bg: #f4f5f7; }
* { box-sizing: border-box; }
body { margin: 0; font-family: system-ui, -apple-system, "Segoe UI", Roboto, sans-serif; color: var(--ink); background: var(--bg); }
header.top { background: var(--free-red); color: #fff; padding: 14px 28px; display: flex; align-items: center; gap: 12px; }
header.top h1 { font-size: 1.4rem; margin: 0; }
header.top a { color: #fff; text-decoration: none; }
main { max-width: 1180px; margin: 0 auto; padding: 24px; }
section { background: var(--card); border-radius: 10px; padding: 18px 22px; margin-bottom: 20px; box-shadow: 0 1px 3px rgba(0,0,0,.08); }
h2 { font-size: 1.15rem; margin-top: 0; }
.grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(210px, 1fr)); gap: 14px; }
.charts { display: grid; grid-template-columns: repeat(auto-fit, minmax(340px, 1fr)); gap: 18px; }
.card { border: 1px solid #e3e6ea; border-radius: 8px; padding: 14px; }
.card .value { font-size: 1.6rem; font-weight: 700; }
.card .label { color: var(--muted); font-size: .85rem; }
.card i { color: var(--free-red); margin-right: 6px; }
.ok { color: #28a745; } .ko { color: #dc3545; }
.banner { border-radius: 8px; padding: 12px 16px; margin-bottom: 18px; }
.banner.error { background: #f8d7da; color: #842029; }
.banner.info { background: #cff4fc; color: #055160; }
.muted { color: var(--muted); }
form.upload { display: flex; flex-wrap: wrap; gap: 12px; align-items: end; }
form.upload label { display: flex; flex-direction: column; font-size: .85rem; gap: 4px; }
button { background: var(--free-red); color: #fff; border: 0; border-radius: 6px; padding: 9px 16px; cursor: pointer; }
table { width: 100%; border-collapse: collapse; font-size: .85rem; }
th, td { text-align: left; padding: 6px 8px; border-bottom: 1px solid #e9ecef; vertical-align: top; }
th { background: #f8f9fa; }
figure.chart { margin: 0; }
figure.chart figcaption { font-weight: 600; margin-bottom: 8px; }
svg text { font-size: 10px; fill: var(--ink); }
ul.legend { list-style: none; padding: 0; margin: 8px 0 0; font-size: .85rem; }
ul.legend .swatch { display: inline-block; width: 10px; height: 10px; border-radius: 2px; margin-right: 6px; }
.tag { display: inline-block; border-radius: 10px; padding: 1px 8px; font-size: .75rem; background: #e9ecef; }
.tag.negatif, .tag.haute { background: #f8d7da; } .tag.positif { background: #d1e7dd; } .tag.moyenne { background: #ffe5d0; }
"#;

/// Escape text for HTML element content and attribute values
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Font Awesome solid icon
pub fn icon(name: &str) -> String {
    format!(r#"<i class="fa-solid fa-{}" aria-hidden="true"></i>"#, escape(name))
}

/// Wrap page content in the common layout
pub fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="fr">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<link rel="stylesheet" href="{css}">
<style>{style}</style>
</head>
<body>
<header class="top">{logo}<h1><a href="/">FreeMobilaChat</a></h1><span class="muted" style="color:#ffd9db">Analyse des messages clients</span></header>
<main>
{body}
</main>
</body>
</html>
"#,
        title = escape(title),
        css = FONT_AWESOME_CSS,
        style = STYLE,
        logo = icon("comments"),
        body = body,
    )
}

/// KPI card
pub fn metric_card(icon_name: &str, label: &str, value: &str, detail: Option<&str>) -> String {
    let detail = detail
        .map(|d| format!(r#"<div class="label">{}</div>"#, escape(d)))
        .unwrap_or_default();
    format!(
        r#"<div class="card"><div class="label">{}{}</div><div class="value">{}</div>{}</div>"#,
        icon(icon_name),
        escape(label),
        escape(value),
        detail
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(
            escape(r#"<script>alert("x")&'</script>"#),
            "&lt;script&gt;alert(&quot;x&quot;)&amp;&#39;&lt;/script&gt;"
        );
        assert_eq!(escape("déjà vu"), "déjà vu");
    }

    #[test]
    fn test_layout_has_title_and_icons() {
        let html = layout("FreeMobilaChat <beta>", "<p>ok</p>");
        assert!(html.contains("<title>FreeMobilaChat &lt;beta&gt;</title>"));
        assert!(html.contains(r#"<i class="fa-solid fa-comments""#));
        assert!(html.contains("font-awesome"));
    }

    #[test]
    fn test_metric_card() {
        let card = metric_card("triangle-exclamation", "Réclamations", "12", Some("40.0%"));
        assert!(card.contains("fa-triangle-exclamation"));
        assert!(card.contains("Réclamations"));
        assert!(card.contains(">12<"));
    }
}
