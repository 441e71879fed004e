//! Prompt construction and response parsing for the LLM backend

use chrono::Utc;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::classify::{clamp_confidence, Backend, Classification, ClassifyError};
use crate::labels::{
    normalize_claim, Category, Incident, Sentiment, Topic, Urgency,
};

const CLAIM_TOKENS: &[&str] = &[
    "panne",
    "bug",
    "incident",
    "bloqué",
    "bloque",
    "erreur",
    "facture",
    "dysfonctionnement",
    "plainte",
    "réclamation",
    "reclamation",
    "sav",
    "support",
    "service client",
    "retard",
    "activation",
    "installation",
    "ticket",
    "remboursement",
];

const URGENT_TOKENS: &[&str] = &[
    "urgent",
    "criti",
    "impossible",
    "panne totale",
    "depuis plusieurs jours",
    "bloqué",
    "bloque",
    "vite",
    "heures",
];

const BILLING_TOKENS: &[&str] = &[
    "facture",
    "facturation",
    "paiement",
    "prelevement",
    "prélèvement",
    "remboursement",
];

const NETWORK_TOKENS: &[&str] = &[
    "4g", "5g", "mobile", "smartphone", "reseau", "réseau", "connexion", "wifi",
];

const SERVICE_TOKENS: &[&str] = &["sav", "service client", "support", "hotline", "assistance"];

fn join_labels<T: std::fmt::Display>(labels: &[T]) -> String {
    labels
        .iter()
        .map(|l| l.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build the classification prompt for one chunk of messages.
pub fn build_prompt(texts: &[String]) -> String {
    let mut listing = String::new();
    for (i, text) in texts.iter().enumerate() {
        // one message per line
        let flat = text.replace(['\n', '\r'], " ");
        listing.push_str(&format!("{}: {}\n", i, flat));
    }

    format!(
        r#"Tu es un expert en analyse de tweets pour Free Mobile (opérateur télécoms français).

OBJECTIF: Classifier {count} tweets et retourner TOUS les KPI suivants:
- sentiment ∈ [{sentiments}]
- categorie ∈ [{categories}]
- is_claim ∈ [oui, non]
- urgence ∈ [{urgencies}]
- score_confiance entre 0.0 et 1.0 (2 décimales max)
- topics ∈ [{topics}]
- incident ∈ [{incidents}]

RAPPELS MÉTIERS:
- is_claim = "oui" dès qu'un problème, panne, bug, facturation ou mécontentement est mentionné.
- urgence = "haute" si panne totale, vocabulaire critique ("bloqué", "urgent", "impossible").
- incident doit décrire le problème (panne_connexion, probleme_facturation, etc.). Utilise "non_specifie" uniquement si tu ne peux pas déterminer.

CONTRAINTE: Chaque tweet DOIT avoir exactement un objet JSON complet avec toutes les clés ci-dessus.

TWEETS À CLASSIFIER:
{listing}
FORMAT STRICT (aucun texte avant/après):
{{
    "results": [
        {{
            "index": 0,
            "sentiment": "negatif",
            "categorie": "support",
            "score_confiance": 0.94,
            "is_claim": "oui",
            "urgence": "haute",
            "topics": "reseau",
            "incident": "panne_connexion"
        }}
    ]
}}
"#,
        count = texts.len(),
        sentiments = join_labels(Sentiment::all()),
        categories = join_labels(Category::all()),
        urgencies = join_labels(Urgency::all()),
        topics = join_labels(Topic::all()),
        incidents = join_labels(Incident::all()),
        listing = listing,
    )
}

fn results_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?s)\{.*"results".*\}"#).expect("valid results pattern"))
}

/// Extract the outermost JSON object mentioning `results` from model output.
pub fn extract_json(text: &str) -> Option<&str> {
    results_regex().find(text).map(|m| m.as_str())
}

fn str_field(entry: &Value, key: &str) -> Option<String> {
    match entry.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn f32_field(entry: &Value, key: &str) -> Option<f32> {
    match entry.get(key)? {
        Value::Number(n) => n.as_f64().map(|v| v as f32),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn index_field(entry: &Value) -> Option<usize> {
    match entry.get("index")? {
        Value::Number(n) => n.as_u64().map(|v| v as usize),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Normalize one raw result object onto the fixed label sets.
///
/// Missing or unknown values fall back to defaults derived from the
/// sentiment and claim flag.
pub fn normalize_entry(entry: &Value) -> Classification {
    let sentiment = str_field(entry, "sentiment")
        .and_then(|s| Sentiment::normalize(&s))
        .unwrap_or(Sentiment::Neutre);

    let category = str_field(entry, "categorie")
        .or_else(|| str_field(entry, "category"))
        .and_then(|s| Category::normalize(&s))
        .unwrap_or(Category::Autre);

    let score = f32_field(entry, "score_confiance")
        .or_else(|| f32_field(entry, "confidence"))
        .unwrap_or(0.6);
    let confidence = (clamp_confidence(score) * 100.0).round() / 100.0;

    let is_claim = str_field(entry, "is_claim")
        .and_then(|s| normalize_claim(&s))
        .unwrap_or(sentiment == Sentiment::Negatif);

    let urgency = match str_field(entry, "urgence").or_else(|| str_field(entry, "urgency")) {
        None => Urgency::Faible,
        Some(raw) => Urgency::normalize(&raw).unwrap_or(if is_claim {
            Urgency::Moyenne
        } else {
            Urgency::Faible
        }),
    };

    let topic = str_field(entry, "topics")
        .or_else(|| str_field(entry, "topic"))
        .and_then(|s| Topic::normalize(&s))
        .unwrap_or_else(|| category.as_topic());

    let incident_default = if is_claim {
        Incident::NonSpecifie
    } else {
        Incident::Aucun
    };
    let incident = str_field(entry, "incident")
        .and_then(|s| Incident::normalize(&s))
        .unwrap_or(incident_default);

    Classification {
        sentiment,
        is_claim,
        urgency,
        topic,
        incident,
        category,
        confidence,
        backend: Backend::Llm,
        classified_at: Utc::now(),
    }
}

/// Parse a model answer into exactly `expected` classifications.
///
/// Results are placed by their `index` when every index is in range and
/// unique; otherwise they are taken in order. Missing results are padded
/// with defaults and extra ones dropped.
pub fn parse_response(text: &str, expected: usize) -> Result<Vec<Classification>, ClassifyError> {
    let json = extract_json(text)
        .ok_or_else(|| ClassifyError::InvalidResponse("no JSON object with results".into()))?;

    let data: Value = serde_json::from_str(json)
        .map_err(|e| ClassifyError::InvalidResponse(format!("JSON parse error: {}", e)))?;

    let entries = data
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| ClassifyError::InvalidResponse("`results` is not an array".into()))?;

    if entries.is_empty() && expected > 0 {
        return Err(ClassifyError::InvalidResponse("empty results".into()));
    }

    if entries.len() != expected {
        tracing::warn!(
            expected = expected,
            actual = entries.len(),
            "LLM returned an unexpected number of results"
        );
    }

    let indices: Vec<Option<usize>> = entries.iter().map(index_field).collect();
    let mut seen = vec![false; expected];
    let by_index = indices.iter().all(|idx| match idx {
        Some(i) if *i < expected && !seen[*i] => {
            seen[*i] = true;
            true
        }
        _ => false,
    });

    let mut slots: Vec<Option<Classification>> = vec![None; expected];
    if by_index {
        for (entry, idx) in entries.iter().zip(indices) {
            if let Some(i) = idx {
                slots[i] = Some(normalize_entry(entry));
            }
        }
    } else {
        for (slot, entry) in slots.iter_mut().zip(entries.iter()) {
            *slot = Some(normalize_entry(entry));
        }
    }

    Ok(slots
        .into_iter()
        .map(|slot| slot.unwrap_or_else(|| normalize_entry(&Value::Null)))
        .collect())
}

fn contains_any(text: &str, tokens: &[&str]) -> bool {
    tokens.iter().any(|t| text.contains(t))
}

/// Keyword heuristics correcting obvious LLM misses.
pub fn apply_quality_guards(texts: &[String], results: &mut [Classification]) {
    for (text, result) in texts.iter().zip(results.iter_mut()) {
        let text = text.to_lowercase();

        if result.sentiment == Sentiment::Negatif {
            result.is_claim = true;
            if result.urgency == Urgency::Faible {
                result.urgency = Urgency::Moyenne;
            }
        }
        if contains_any(&text, CLAIM_TOKENS) {
            result.is_claim = true;
            if result.urgency == Urgency::Faible {
                result.urgency = Urgency::Moyenne;
            }
        }
        if contains_any(&text, URGENT_TOKENS) {
            result.urgency = Urgency::Haute;
            result.is_claim = true;
        }
        if contains_any(&text, BILLING_TOKENS) {
            result.topic = Topic::Facture;
            result.incident = Incident::ProblemeFacturation;
        }
        if contains_any(&text, NETWORK_TOKENS) {
            result.topic = Topic::Reseau;
            if matches!(result.incident, Incident::Aucun | Incident::NonSpecifie) {
                result.incident = Incident::PanneConnexion;
            }
        }
        if contains_any(&text, SERVICE_TOKENS) {
            result.topic = Topic::ServiceClient;
        }
        if result.incident == Incident::Aucun && result.is_claim && text.contains("box") {
            result.incident = Incident::BugFreebox;
        }
        result.confidence = clamp_confidence(result.confidence);
    }
}
