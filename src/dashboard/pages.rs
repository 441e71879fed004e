//! Dashboard pages

use std::fmt::Write;

use super::charts::{
    self, category_color, data_from, sentiment_color, urgency_color, Datum, Series,
};
use super::{escape, icon, layout, metric_card};
use crate::batch::{Batch, BatchSummary};
use crate::classify::{Backend, BackendStatus};
use crate::kpi::KpiReport;
use crate::labels::claim_str;

/// Banner shown above the dashboard
#[derive(Debug, Clone)]
pub struct Notice {
    pub message: String,
    pub hint: Option<String>,
    pub is_error: bool,
}

impl Notice {
    pub fn error(message: impl Into<String>, hint: Option<String>) -> Self {
        Self {
            message: message.into(),
            hint,
            is_error: true,
        }
    }
}

/// Everything the home page shows
pub struct IndexView<'a> {
    pub statuses: &'a [BackendStatus],
    pub batches: &'a [BatchSummary],
    pub latest: Option<&'a Batch>,
    pub default_backend: Backend,
    pub max_size_mb: u64,
    pub notice: Option<Notice>,
}

fn notice_html(notice: &Notice) -> String {
    let (class, icon_name) = if notice.is_error {
        ("error", "circle-exclamation")
    } else {
        ("info", "circle-info")
    };
    let hint = notice
        .hint
        .as_deref()
        .map(|h| format!(r#"<div>{} {}</div>"#, icon("lightbulb"), escape(h)))
        .unwrap_or_default();
    format!(
        r#"<div class="banner {}">{} <strong>{}</strong>{}</div>"#,
        class,
        icon(icon_name),
        escape(&notice.message),
        hint
    )
}

fn upload_form(statuses: &[BackendStatus], default_backend: Backend, max_size_mb: u64) -> String {
    let mut options = String::new();
    for status in statuses {
        let selected = if status.backend == default_backend {
            " selected"
        } else {
            ""
        };
        let suffix = if status.available { "" } else { " (indisponible)" };
        let _ = write!(
            options,
            r#"<option value="{}"{}>{}{}</option>"#,
            status.backend.as_str(),
            selected,
            escape(status.label),
            suffix
        );
    }

    format!(
        r#"<section>
<h2>{} Analyser un fichier</h2>
<form class="upload" method="post" action="/upload" enctype="multipart/form-data">
<label>Fichier CSV (max {} Mo)<input type="file" name="file" accept=".csv,.txt" required></label>
<label>Modèle<select name="backend">{}</select></label>
<label>Colonne texte (optionnel)<input type="text" name="text_column" placeholder="text"></label>
<button type="submit">{} Classifier</button>
</form>
</section>"#,
        icon("file-csv"),
        max_size_mb,
        options,
        icon("play")
    )
}

fn status_cards(statuses: &[BackendStatus]) -> String {
    let mut cards = String::new();
    for status in statuses {
        let (class, icon_name, state) = if status.available {
            ("ok", "circle-check", "disponible")
        } else {
            ("ko", "circle-xmark", "indisponible")
        };
        let default = if status.is_default { " · par défaut" } else { "" };
        let _ = write!(
            cards,
            r#"<div class="card"><div class="label">{} {}{}</div><div class="{}"><i class="fa-solid fa-{}"></i> {}</div><div class="label">{}</div></div>"#,
            icon("microchip"),
            escape(status.label),
            default,
            class,
            icon_name,
            state,
            escape(&status.detail)
        );
    }
    format!(
        r#"<section><h2>{} Modèles</h2><div class="grid">{}</div></section>"#,
        icon("server"),
        cards
    )
}

fn batch_list(batches: &[BatchSummary]) -> String {
    if batches.is_empty() {
        return format!(
            r#"<section><h2>{} Analyses récentes</h2><p class="muted">Aucune analyse pour le moment.</p></section>"#,
            icon("clock-rotate-left")
        );
    }

    let mut rows = String::new();
    for b in batches {
        let _ = write!(
            rows,
            r#"<tr><td><a href="/batches/{id}">{}</a></td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>"#,
            escape(&b.file_name),
            b.created_at.format("%Y-%m-%d %H:%M:%S"),
            b.backend.label(),
            b.total,
            b.claims,
            b.fallback_count,
            id = b.id,
        );
    }

    format!(
        r#"<section><h2>{} Analyses récentes</h2><table><thead><tr><th>Fichier</th><th>Date (UTC)</th><th>Modèle</th><th>Messages</th><th>Réclamations</th><th>Repli règles</th></tr></thead><tbody>{}</tbody></table></section>"#,
        icon("clock-rotate-left"),
        rows
    )
}

fn kpi_cards(kpis: &KpiReport, fallback_count: usize) -> String {
    let cards = [
        metric_card("envelope", "Messages", &kpis.total.to_string(), None),
        metric_card(
            "triangle-exclamation",
            "Réclamations",
            &kpis.claims.to_string(),
            Some(&format!("{:.1}%", kpis.claim_percent)),
        ),
        metric_card(
            "face-frown",
            "Négatifs",
            &kpis.negatives.to_string(),
            Some(&format!("{:.1}%", kpis.negative_percent)),
        ),
        metric_card(
            "fire",
            "Urgence haute",
            &kpis.urgent.to_string(),
            Some(&format!("{:.1}%", kpis.urgent_percent)),
        ),
        metric_card(
            "face-smile",
            "Satisfaction",
            &format!("{:.0}/100", kpis.satisfaction_index),
            Some(satisfaction_level(kpis.satisfaction_index)),
        ),
        metric_card(
            "bullseye",
            "Confiance moyenne",
            &format!("{:.2}", kpis.confidence_avg),
            Some(&format!(
                "min {:.2} · max {:.2}",
                kpis.confidence_min, kpis.confidence_max
            )),
        ),
        metric_card(
            "life-ring",
            "Repli règles",
            &fallback_count.to_string(),
            None,
        ),
    ];
    format!(r#"<div class="grid">{}</div>"#, cards.concat())
}

fn satisfaction_level(index: f64) -> &'static str {
    if index > 60.0 {
        "Bonne"
    } else if index > 40.0 {
        "Moyenne"
    } else {
        "Faible"
    }
}

/// Daily volume with one line per sentiment, empty without dates
fn timeline_chart(kpis: &KpiReport) -> String {
    if kpis.daily.is_empty() {
        return String::new();
    }

    let days: Vec<String> = kpis.daily.iter().map(|d| d.date.format("%Y-%m-%d").to_string()).collect();
    let series = [
        Series::new("Volume total", "#cd1e25", kpis.daily.iter().map(|d| d.total).collect()),
        Series::new("positif", sentiment_color("positif"), kpis.daily.iter().map(|d| d.positif).collect()),
        Series::new("negatif", sentiment_color("negatif"), kpis.daily.iter().map(|d| d.negatif).collect()),
        Series::new("neutre", sentiment_color("neutre"), kpis.daily.iter().map(|d| d.neutre).collect()),
    ];
    charts::line_chart("Évolution temporelle du volume", &days, &series)
}

fn charts_section(kpis: &KpiReport) -> String {
    let topics: Vec<Datum> = data_from(&kpis.topic, |_| "#0d6efd");
    let incidents: Vec<Datum> = data_from(&kpis.incident, |_| "#6f42c1");

    format!(
        r#"<section><h2>{} Visualisations</h2><div class="charts">{}{}{}{}{}{}{}</div></section>"#,
        icon("chart-pie"),
        charts::pie_chart(
            "Distribution des sentiments",
            &data_from(&kpis.sentiment, sentiment_color)
        ),
        charts::bar_chart(
            "Distribution des niveaux d'urgence",
            &data_from(&kpis.urgency, urgency_color)
        ),
        charts::hbar_chart("Top 10 thèmes", &topics, 10),
        charts::pie_chart(
            "Répartition par catégorie",
            &data_from(&kpis.category, category_color)
        ),
        charts::bar_chart("Incidents", &incidents),
        charts::histogram(
            "Distribution des scores de confiance",
            &kpis.confidence_histogram
        ),
        timeline_chart(kpis),
    )
}

fn cleaning_section(batch: &Batch) -> String {
    let c = &batch.cleaning;
    let mut errors = String::new();
    if !batch.errors.is_empty() {
        errors.push_str(r#"<details><summary>Lignes ignorées</summary><ul>"#);
        for e in &batch.errors {
            let _ = write!(errors, "<li>{}</li>", escape(e));
        }
        errors.push_str("</ul></details>");
    }

    format!(
        r#"<section><h2>{} Nettoyage</h2><table><tbody>
<tr><th>Colonne texte</th><td>{}</td></tr>
<tr><th>Colonne date</th><td>{}</td></tr>
<tr><th>Lignes lues</th><td>{}</td></tr>
<tr><th>Lignes invalides</th><td>{}</td></tr>
<tr><th>Textes vides supprimés</th><td>{}</td></tr>
<tr><th>Doublons supprimés</th><td>{}</td></tr>
<tr><th>Messages classifiés</th><td>{}</td></tr>
<tr><th>Lignes avec labels importés</th><td>{}</td></tr>
<tr><th>Longueur moyenne avant / après</th><td>{:.1} / {:.1}</td></tr>
</tbody></table>{}</section>"#,
        icon("broom"),
        escape(&batch.text_column),
        batch.date_column.as_deref().map(escape).unwrap_or_else(|| "aucune".to_string()),
        c.total_original,
        batch.rows_failed,
        c.empty_removed,
        c.duplicates_removed,
        c.total_cleaned,
        batch.annotated_rows,
        c.avg_length_before,
        c.avg_length_after,
        errors
    )
}

fn preview_table(batch: &Batch, limit: usize) -> String {
    let mut rows = String::new();
    for (record, c) in batch.rows().take(limit) {
        let _ = write!(
            rows,
            r#"<tr><td>{}</td><td>{}</td><td><span class="tag {s}">{s}</span></td><td>{}</td><td><span class="tag {u}">{u}</span></td><td>{}</td><td>{}</td><td>{:.2}</td><td>{}</td></tr>"#,
            record.row,
            escape(&record.text),
            claim_str(c.is_claim),
            c.topic,
            c.incident,
            c.confidence,
            c.backend.label(),
            s = c.sentiment,
            u = c.urgency,
        );
    }

    format!(
        r#"<section><h2>{} Aperçu ({} premières lignes)</h2>
<p><a href="/api/v1/batches/{id}/export?format=csv">{} Export CSV</a> · <a href="/api/v1/batches/{id}/export?format=json">{} Export JSON</a></p>
<table><thead><tr><th>Ligne</th><th>Texte</th><th>Sentiment</th><th>Réclamation</th><th>Urgence</th><th>Thème</th><th>Incident</th><th>Confiance</th><th>Modèle</th></tr></thead><tbody>{}</tbody></table></section>"#,
        icon("table"),
        limit.min(batch.records.len()),
        icon("file-arrow-down"),
        icon("file-code"),
        rows,
        id = batch.id,
    )
}

/// Home page: upload form, backend status, recent batches
pub fn render_index(view: &IndexView<'_>) -> String {
    let mut body = String::new();

    if let Some(notice) = &view.notice {
        body.push_str(&notice_html(notice));
    }
    body.push_str(&upload_form(
        view.statuses,
        view.default_backend,
        view.max_size_mb,
    ));
    body.push_str(&status_cards(view.statuses));

    if let Some(latest) = view.latest {
        let _ = write!(
            body,
            r#"<section><h2>{} Dernière analyse : <a href="/batches/{}">{}</a></h2>{}<div class="charts">{}</div></section>"#,
            icon("chart-line"),
            latest.id,
            escape(&latest.file_name),
            kpi_cards(&latest.kpis, latest.fallback_count),
            charts::pie_chart(
                "Distribution des sentiments",
                &data_from(&latest.kpis.sentiment, sentiment_color)
            ),
        );
    }

    body.push_str(&batch_list(view.batches));
    layout("FreeMobilaChat - Dashboard", &body)
}

/// Detail page of one batch
pub fn render_batch(batch: &Batch, preview_rows: usize) -> String {
    let mut body = String::new();

    let fallback = if batch.fallback_count > 0 {
        notice_html(&Notice {
            message: format!(
                "{} message(s) classifiés par les règles : le modèle {} n'a pas répondu.",
                batch.fallback_count,
                batch.backend.label()
            ),
            hint: None,
            is_error: false,
        })
    } else {
        String::new()
    };

    let _ = write!(
        body,
        r#"{}<section><h2>{} {}</h2><p class="muted">Modèle {} · {} UTC · <a href="/">{} Retour</a></p>{}</section>"#,
        fallback,
        icon("file-lines"),
        escape(&batch.file_name),
        batch.backend.label(),
        batch.created_at.format("%Y-%m-%d %H:%M:%S"),
        icon("arrow-left"),
        kpi_cards(&batch.kpis, batch.fallback_count),
    );
    body.push_str(&charts_section(&batch.kpis));
    body.push_str(&cleaning_section(batch));
    body.push_str(&preview_table(batch, preview_rows));

    layout(&format!("FreeMobilaChat - {}", batch.file_name), &body)
}

/// 404 page
pub fn render_not_found(what: &str) -> String {
    let body = format!(
        r#"<section><h2>{} Introuvable</h2><p>{}</p><p><a href="/">{} Retour au dashboard</a></p></section>"#,
        icon("magnifying-glass"),
        escape(what),
        icon("house")
    );
    layout("FreeMobilaChat - Introuvable", &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{Pipeline, Upload};
    use crate::classify::ClassifierRegistry;
    use crate::ingest::TextCleaner;
    use std::sync::Arc;

    async fn sample_batch() -> Batch {
        let pipeline = Pipeline::new(
            Arc::new(ClassifierRegistry::rules_only()),
            TextCleaner::new(),
            1024 * 1024,
        );
        pipeline
            .run(Upload {
                file_name: "<b>tweets</b>.csv".to_string(),
                bytes: b"text\nPanne fibre urgent\nMerci Free\n<script>x</script>\n".to_vec(),
                backend: None,
                text_column: None,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_batch_page() {
        let batch = sample_batch().await;
        let html = render_batch(&batch, 100);

        assert!(html.contains("Distribution des sentiments"));
        assert!(html.contains("Top 10 thèmes"));
        assert!(html.contains("Répartition par catégorie"));
        assert!(html.contains("Satisfaction"));
        assert!(!html.contains("Évolution temporelle"));
        assert!(html.contains("export?format=csv"));
        assert!(html.contains("&lt;b&gt;tweets&lt;/b&gt;.csv"));
        assert!(html.contains("&lt;script&gt;x&lt;/script&gt;"));
        assert!(!html.contains("<script>"));
    }

    #[tokio::test]
    async fn test_batch_page_with_dates() {
        let pipeline = Pipeline::new(
            Arc::new(ClassifierRegistry::rules_only()),
            TextCleaner::new(),
            1024 * 1024,
        );
        let batch = pipeline
            .run(Upload {
                file_name: "dated.csv".to_string(),
                bytes: b"date,text\n2024-05-01,Panne fibre\n2024-05-02,Merci Free\n".to_vec(),
                backend: None,
                text_column: None,
            })
            .await
            .unwrap();
        let html = render_batch(&batch, 100);

        assert!(html.contains("Évolution temporelle du volume"));
        assert!(html.contains("<polyline"));
        assert!(html.contains("2024-05-02"));
        assert!(html.contains("<th>Colonne date</th><td>date</td>"));
    }

    #[tokio::test]
    async fn test_index_page() {
        let batch = sample_batch().await;
        let registry = ClassifierRegistry::rules_only();
        let statuses = registry.status().await;
        let summaries = vec![batch.summary()];

        let html = render_index(&IndexView {
            statuses: &statuses,
            batches: &summaries,
            latest: Some(&batch),
            default_backend: Backend::Rules,
            max_size_mb: 50,
            notice: Some(Notice::error("Fichier vide", Some("Choisissez un CSV".into()))),
        });

        assert!(html.contains("<title>FreeMobilaChat - Dashboard</title>"));
        assert!(html.contains(r#"action="/upload""#));
        assert!(html.contains(r#"<option value="rules" selected>"#));
        assert!(html.contains("(indisponible)"));
        assert!(html.contains("Fichier vide"));
        assert!(html.contains(&format!("/batches/{}", batch.id)));
        assert!(html.matches("fa-solid").count() > 5);
    }

    #[test]
    fn test_empty_index() {
        let html = render_index(&IndexView {
            statuses: &[],
            batches: &[],
            latest: None,
            default_backend: Backend::Rules,
            max_size_mb: 50,
            notice: None,
        });
        assert!(html.contains("Aucune analyse"));
    }

    #[test]
    fn test_not_found_page() {
        let html = render_not_found("Analyse <x> introuvable");
        assert!(html.contains("Analyse &lt;x&gt; introuvable"));
    }
}
