//! Inline SVG charts

use std::f64::consts::PI;
use std::fmt::Write;

use super::escape;
use crate::kpi::LabelCount;

const DEFAULT_COLOR: &str = "#0d6efd";

/// One value of a chart
#[derive(Debug, Clone)]
pub struct Datum {
    pub label: String,
    pub value: usize,
    pub color: String,
}

impl Datum {
    pub fn new(label: impl Into<String>, value: usize, color: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value,
            color: color.into(),
        }
    }
}

/// Fixed colors per sentiment
pub fn sentiment_color(label: &str) -> &'static str {
    match label {
        "positif" => "#28a745",
        "negatif" => "#dc3545",
        "neutre" => "#ffc107",
        _ => "#6c757d",
    }
}

pub fn urgency_color(label: &str) -> &'static str {
    match label {
        "haute" => "#dc3545",
        "moyenne" => "#fd7e14",
        "faible" => "#f8b4b4",
        _ => "#6c757d",
    }
}

pub fn category_color(label: &str) -> &'static str {
    match label {
        "produit" => "#0d6efd",
        "service" => "#20c997",
        "support" => "#6f42c1",
        "promotion" => "#ffc107",
        _ => "#6c757d",
    }
}

/// One line of a line chart, index-aligned with the x labels
#[derive(Debug, Clone)]
pub struct Series {
    pub label: String,
    pub color: String,
    pub values: Vec<usize>,
}

impl Series {
    pub fn new(label: impl Into<String>, color: impl Into<String>, values: Vec<usize>) -> Self {
        Self {
            label: label.into(),
            color: color.into(),
            values,
        }
    }
}

/// Turn KPI counts into chart data with a color function
pub fn data_from(counts: &[LabelCount], color: impl Fn(&str) -> &'static str) -> Vec<Datum> {
    counts
        .iter()
        .map(|c| Datum::new(c.label.clone(), c.count, color(&c.label)))
        .collect()
}

fn empty_chart(title: &str) -> String {
    format!(
        r#"<figure class="chart"><figcaption>{}</figcaption><p class="muted"><i class="fa-solid fa-chart-simple"></i> Aucune donnée</p></figure>"#,
        escape(title)
    )
}

fn legend(data: &[Datum], total: usize) -> String {
    let mut out = String::from(r#"<ul class="legend">"#);
    for d in data {
        let pct = if total == 0 {
            0.0
        } else {
            d.value as f64 * 100.0 / total as f64
        };
        let _ = write!(
            out,
            r#"<li><span class="swatch" style="background:{}"></span>{} <strong>{}</strong> ({:.1}%)</li>"#,
            escape(&d.color),
            escape(&d.label),
            d.value,
            pct
        );
    }
    out.push_str("</ul>");
    out
}

/// Pie chart with a legend
pub fn pie_chart(title: &str, data: &[Datum]) -> String {
    let total: usize = data.iter().map(|d| d.value).sum();
    if total == 0 {
        return empty_chart(title);
    }

    let (cx, cy, r) = (110.0_f64, 110.0_f64, 100.0_f64);
    let mut svg = format!(
        r#"<svg class="pie" viewBox="0 0 220 220" width="220" height="220" role="img" aria-label="{}">"#,
        escape(title)
    );

    let mut angle = -PI / 2.0;
    for d in data.iter().filter(|d| d.value > 0) {
        let fraction = d.value as f64 / total as f64;
        if fraction >= 1.0 {
            let _ = write!(
                svg,
                r#"<circle cx="{cx}" cy="{cy}" r="{r}" fill="{}"><title>{}: {}</title></circle>"#,
                escape(&d.color),
                escape(&d.label),
                d.value
            );
            break;
        }

        let end = angle + fraction * 2.0 * PI;
        let (x1, y1) = (cx + r * angle.cos(), cy + r * angle.sin());
        let (x2, y2) = (cx + r * end.cos(), cy + r * end.sin());
        let large_arc = if fraction > 0.5 { 1 } else { 0 };
        let _ = write!(
            svg,
            r#"<path d="M {cx} {cy} L {x1:.2} {y1:.2} A {r} {r} 0 {large_arc} 1 {x2:.2} {y2:.2} Z" fill="{}"><title>{}: {}</title></path>"#,
            escape(&d.color),
            escape(&d.label),
            d.value
        );
        angle = end;
    }
    svg.push_str("</svg>");

    format!(
        r#"<figure class="chart"><figcaption>{}</figcaption>{}{}</figure>"#,
        escape(title),
        svg,
        legend(data, total)
    )
}

/// Vertical bar chart
pub fn bar_chart(title: &str, data: &[Datum]) -> String {
    let max = data.iter().map(|d| d.value).max().unwrap_or(0);
    if max == 0 {
        return empty_chart(title);
    }

    let (width, height, top, bottom) = (360.0_f64, 220.0_f64, 20.0_f64, 40.0_f64);
    let slot = width / data.len() as f64;
    let bar_width = slot * 0.6;
    let plot_height = height - top - bottom;

    let mut svg = format!(
        r#"<svg class="bars" viewBox="0 0 {width} {height}" width="100%" height="{height}" role="img" aria-label="{}">"#,
        escape(title)
    );
    for (i, d) in data.iter().enumerate() {
        let h = d.value as f64 / max as f64 * plot_height;
        let x = i as f64 * slot + (slot - bar_width) / 2.0;
        let y = top + plot_height - h;
        let color = if d.color.is_empty() { DEFAULT_COLOR } else { d.color.as_str() };
        let _ = write!(
            svg,
            r#"<rect x="{x:.2}" y="{y:.2}" width="{bar_width:.2}" height="{h:.2}" fill="{}"><title>{}: {}</title></rect>"#,
            escape(color),
            escape(&d.label),
            d.value
        );
        let _ = write!(
            svg,
            r#"<text x="{:.2}" y="{:.2}" text-anchor="middle" class="value">{}</text><text x="{:.2}" y="{:.2}" text-anchor="middle">{}</text>"#,
            x + bar_width / 2.0,
            y - 4.0,
            d.value,
            x + bar_width / 2.0,
            height - bottom + 16.0,
            escape(&d.label)
        );
    }
    svg.push_str("</svg>");

    format!(
        r#"<figure class="chart"><figcaption>{}</figcaption>{}</figure>"#,
        escape(title),
        svg
    )
}

/// Horizontal bar chart, at most `limit` rows
pub fn hbar_chart(title: &str, data: &[Datum], limit: usize) -> String {
    let data = &data[..data.len().min(limit)];
    let max = data.iter().map(|d| d.value).max().unwrap_or(0);
    if max == 0 {
        return empty_chart(title);
    }

    let (label_width, bar_area, row) = (140.0_f64, 200.0_f64, 24.0_f64);
    let height = row * data.len() as f64 + 8.0;
    let width = label_width + bar_area + 40.0;

    let mut svg = format!(
        r#"<svg class="hbars" viewBox="0 0 {width} {height}" width="100%" height="{height}" role="img" aria-label="{}">"#,
        escape(title)
    );
    for (i, d) in data.iter().enumerate() {
        let y = i as f64 * row + 4.0;
        let w = d.value as f64 / max as f64 * bar_area;
        let color = if d.color.is_empty() { DEFAULT_COLOR } else { d.color.as_str() };
        let _ = write!(
            svg,
            r#"<text x="{:.2}" y="{:.2}" text-anchor="end">{}</text><rect x="{label_width}" y="{y:.2}" width="{w:.2}" height="{:.2}" fill="{}"><title>{}: {}</title></rect><text x="{:.2}" y="{:.2}" class="value">{}</text>"#,
            label_width - 6.0,
            y + row * 0.6,
            escape(&d.label),
            row - 6.0,
            escape(color),
            escape(&d.label),
            d.value,
            label_width + w + 4.0,
            y + row * 0.6,
            d.value
        );
    }
    svg.push_str("</svg>");

    format!(
        r#"<figure class="chart"><figcaption>{}</figcaption>{}</figure>"#,
        escape(title),
        svg
    )
}

/// Line chart with markers, one polyline per series
pub fn line_chart(title: &str, x_labels: &[String], series: &[Series]) -> String {
    let max = series
        .iter()
        .flat_map(|s| s.values.iter().copied())
        .max()
        .unwrap_or(0);
    if x_labels.is_empty() || max == 0 {
        return empty_chart(title);
    }

    let (width, height, left, right, top, bottom) =
        (520.0_f64, 240.0_f64, 32.0_f64, 12.0_f64, 16.0_f64, 44.0_f64);
    let plot_width = width - left - right;
    let plot_height = height - top - bottom;
    let step = if x_labels.len() > 1 {
        plot_width / (x_labels.len() - 1) as f64
    } else {
        0.0
    };
    let x_at = |i: usize| {
        if x_labels.len() == 1 {
            left + plot_width / 2.0
        } else {
            left + i as f64 * step
        }
    };
    let y_at = |v: usize| top + plot_height - v as f64 / max as f64 * plot_height;

    let mut svg = format!(
        r#"<svg class="lines" viewBox="0 0 {width} {height}" width="100%" height="{height}" role="img" aria-label="{}">"#,
        escape(title)
    );
    let _ = write!(
        svg,
        r##"<line x1="{left}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="#ced4da"/><text x="{:.2}" y="{:.2}" text-anchor="end">{max}</text>"##,
        top + plot_height,
        width - right,
        top + plot_height,
        left - 4.0,
        top + 4.0
    );

    // At most ~8 date labels on the axis
    let label_every = x_labels.len().div_ceil(8).max(1);
    for (i, label) in x_labels.iter().enumerate() {
        if i % label_every == 0 || i == x_labels.len() - 1 {
            let _ = write!(
                svg,
                r#"<text x="{:.2}" y="{:.2}" text-anchor="middle">{}</text>"#,
                x_at(i),
                height - bottom + 16.0,
                escape(label)
            );
        }
    }

    for s in series {
        let points: Vec<String> = s
            .values
            .iter()
            .enumerate()
            .take(x_labels.len())
            .map(|(i, &v)| format!("{:.2},{:.2}", x_at(i), y_at(v)))
            .collect();
        let _ = write!(
            svg,
            r#"<polyline fill="none" stroke="{}" stroke-width="2" points="{}"><title>{}</title></polyline>"#,
            escape(&s.color),
            points.join(" "),
            escape(&s.label)
        );
        for (i, &v) in s.values.iter().enumerate().take(x_labels.len()) {
            let _ = write!(
                svg,
                r#"<circle cx="{:.2}" cy="{:.2}" r="3" fill="{}"><title>{} {}: {}</title></circle>"#,
                x_at(i),
                y_at(v),
                escape(&s.color),
                escape(&s.label),
                escape(&x_labels[i]),
                v
            );
        }
    }
    svg.push_str("</svg>");

    let mut legend = String::from(r#"<ul class="legend">"#);
    for s in series {
        let _ = write!(
            legend,
            r#"<li><span class="swatch" style="background:{}"></span>{} <strong>{}</strong></li>"#,
            escape(&s.color),
            escape(&s.label),
            s.values.iter().sum::<usize>()
        );
    }
    legend.push_str("</ul>");

    format!(
        r#"<figure class="chart"><figcaption>{}</figcaption>{}{}</figure>"#,
        escape(title),
        svg,
        legend
    )
}

/// Histogram of counts over [0, 1]
pub fn histogram(title: &str, bins: &[usize]) -> String {
    if bins.iter().all(|&b| b == 0) {
        return empty_chart(title);
    }

    let width = bins.len() as f64;
    let data: Vec<Datum> = bins
        .iter()
        .enumerate()
        .map(|(i, &count)| {
            let low = i as f64 / width;
            Datum::new(format!("{:.2}", low), count, "#17a2b8")
        })
        .collect();
    bar_chart(title, &data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pie_chart_paths() {
        let data = vec![
            Datum::new("positif", 1, sentiment_color("positif")),
            Datum::new("negatif", 3, sentiment_color("negatif")),
        ];
        let svg = pie_chart("Sentiments", &data);
        assert_eq!(svg.matches("<path").count(), 2);
        assert!(svg.contains("#dc3545"));
        assert!(svg.contains("(75.0%)"));
    }

    #[test]
    fn test_single_slice_is_circle() {
        let svg = pie_chart("Sentiments", &[Datum::new("neutre", 5, "#ffc107")]);
        assert!(svg.contains("<circle"));
        assert!(!svg.contains("<path"));
    }

    #[test]
    fn test_empty_charts() {
        assert!(pie_chart("x", &[]).contains("Aucune donnée"));
        assert!(bar_chart("x", &[Datum::new("a", 0, "")]).contains("Aucune donnée"));
        assert!(histogram("x", &[0; 20]).contains("Aucune donnée"));
    }

    #[test]
    fn test_hbar_limit_and_escape() {
        let data: Vec<Datum> = (0..15)
            .map(|i| Datum::new(format!("<t{}>", i), 15 - i, ""))
            .collect();
        let svg = hbar_chart("Top", &data, 10);
        assert_eq!(svg.matches("<rect").count(), 10);
        assert!(svg.contains("&lt;t0&gt;"));
        assert!(!svg.contains("<t0>"));
    }

    #[test]
    fn test_line_chart_series() {
        let days = vec!["2024-05-01".to_string(), "2024-05-02".to_string(), "2024-05-03".to_string()];
        let series = vec![
            Series::new("Total", DEFAULT_COLOR, vec![4, 1, 6]),
            Series::new("negatif", sentiment_color("negatif"), vec![2, 0, 5]),
        ];
        let svg = line_chart("Volume", &days, &series);

        assert_eq!(svg.matches("<polyline").count(), 2);
        assert_eq!(svg.matches("<circle").count(), 6);
        assert!(svg.contains("2024-05-03"));
        assert!(svg.contains("<strong>11</strong>"));
    }

    #[test]
    fn test_line_chart_single_day_and_empty() {
        let day = vec!["2024-05-01".to_string()];
        let svg = line_chart("Volume", &day, &[Series::new("Total", "", vec![3])]);
        assert_eq!(svg.matches("<circle").count(), 1);

        assert!(line_chart("Volume", &[], &[]).contains("Aucune donnée"));
        assert!(line_chart("Volume", &day, &[Series::new("Total", "", vec![0])]).contains("Aucune donnée"));
    }

    #[test]
    fn test_histogram_bins() {
        let mut bins = vec![0; 20];
        bins[14] = 3;
        bins[17] = 1;
        let svg = histogram("Confiance", &bins);
        assert_eq!(svg.matches("<rect").count(), 20);
        assert!(svg.contains("0.70"));
    }
}
