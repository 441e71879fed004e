//! Rule-Based Classifier
//!
//! Keyword and regex rules tuned for French telecom customer messages.
//! Thousands of messages per second, no external dependency, and the
//! fallback for every other backend.

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;

use super::{Backend, Classification, Classifier, ClassifyError};
use crate::labels::{strip_accents, Category, Incident, Sentiment, Topic, Urgency};

const CLAIM_KEYWORDS: &[&str] = &[
    // Explicit complaints
    "réclamation",
    "reclamation",
    "plainte",
    "réclame",
    // Problems and outages
    "problème",
    "probleme",
    "souci",
    "bug",
    "erreur",
    "dysfonctionnement",
    "défaillance",
    "panne",
    "coupure",
    "interruption",
    "déconnexion",
    "perte de connexion",
    // Not working
    "ne fonctionne pas",
    "ne marche pas",
    "ne fonctionne plus",
    "marche plus",
    "fonctionne plus",
    "impossible de",
    "n'arrive pas",
    "ne peut pas",
    // Loss of service
    "plus de connexion",
    "plus d'internet",
    "plus de réseau",
    "sans connexion",
    "sans internet",
    "sans réseau",
    "aucune connexion",
    "aucun internet",
    "aucun réseau",
    // Dissatisfaction
    "déçu",
    "mécontent",
    "insatisfait",
    "catastrophe",
    "scandale",
    "honteux",
    "inadmissible",
    "inacceptable",
    "ras le bol",
    "en ai marre",
    // Refunds and cancellation
    "remboursement",
    "dédommagement",
    "compensation",
    "résiliation",
    "résilier",
    "changer d'opérateur",
    "quitter free",
    // Strong negative qualifiers
    "nul",
    "pourri",
    "minable",
    "catastrophique",
    "lamentable",
    "pire",
    // Prolonged duration
    "depuis plusieurs jours",
    "depuis une semaine",
    "toujours pas",
    "encore rien",
];

/// Entries containing `\d` are regexes, everything else is a literal.
const URGENCY_HIGH_KEYWORDS: &[&str] = &[
    "urgent",
    "urgence",
    "immédiat",
    "tout de suite",
    "rapidement",
    "au plus vite",
    "critique",
    "grave",
    "sérieux",
    "prioritaire",
    "panne totale",
    "coupure totale",
    "coupure complète",
    "coupure générale",
    "plus de connexion",
    "plus d'internet",
    "plus de réseau",
    "sans connexion",
    "sans internet",
    "sans réseau",
    "aucune connexion",
    "aucun réseau",
    "aucun internet",
    "plus rien",
    "complètement hs",
    "totalement hs",
    "depuis plusieurs jours",
    "depuis une semaine",
    "depuis des jours",
    r"depuis \d+ jours",
    r"depuis \d+ semaines",
    r"depuis \d+ heures",
    r"ça fait \d+ jours",
    r"ça fait \d+ semaines",
    "télétravail",
    "professionnel",
    "entreprise",
    "business",
    "au travail",
    "pour le travail",
    "réseau entreprise",
    "systématiquement",
    "à chaque fois",
    "tous les jours",
    "en permanence",
];

const URGENCY_MEDIUM_KEYWORDS: &[&str] = &[
    "problème",
    "probleme",
    "souci",
    "bug",
    "lenteur",
    "ralentissement",
    "parfois",
    "de temps en temps",
    "occasionnellement",
];

const FIBRE_KEYWORDS: &[&str] = &[
    "fibre",
    "box",
    "freebox",
    "internet",
    "wifi",
    "connexion internet",
    "débit",
    "ligne",
    "adsl",
    "réseau fixe",
];

const MOBILE_KEYWORDS: &[&str] = &[
    "mobile",
    "4g",
    "5g",
    "forfait mobile",
    "réseau mobile",
    "appel",
    "sms",
    "data",
    "roaming",
    "carte sim",
    "free mobile",
];

const FACTURE_KEYWORDS: &[&str] = &[
    "facture",
    "facturation",
    "paiement",
    "prélèvement",
    "montant",
    "prix",
    "tarif",
    "abonnement",
    "coût",
    "euros",
    "€",
];

/// Checked in order; the first match wins.
const INCIDENT_PATTERNS: &[(Incident, &str)] = &[
    (
        Incident::PanneConnexion,
        r"\b(panne|coupure|déconnexion|pas de connexion|plus de connexion)\b",
    ),
    (
        Incident::DebitInsuffisant,
        r"\b(lent|lenteur|ralentissement|débit|vitesse)\b",
    ),
    (
        Incident::RetardActivation,
        r"\b(activation|activer|installer|installation)\b",
    ),
    (
        Incident::ProblemeFacturation,
        r"\b(facture|surfacturation|prélèvement|montant erroné)\b",
    ),
    (
        Incident::BugFreebox,
        r"\b(bug|erreur|dysfonctionnement|ne fonctionne pas)\b",
    ),
    (
        Incident::Information,
        r"\b(service client|sav|support|assistance|hotline)\b",
    ),
];

const POSITIVE_WORDS: &[&str] = &[
    "merci",
    "super",
    "génial",
    "excellent",
    "bravo",
    "parfait",
    "top",
    "content",
    "satisfait",
    "formidable",
];

const NEGATIVE_WORDS: &[&str] = &[
    "panne",
    "nul",
    "bug",
    "problème",
    "probleme",
    "mauvais",
    "honte",
    "catastrophe",
    "déçu",
    "inadmissible",
    "lamentable",
    "pourri",
];

const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (Category::Produit, &["fibre", "mobile", "box", "débit", "4g", "5g"]),
    (Category::Service, &["sav", "service", "support", "assistance"]),
    (
        Category::Support,
        &["aide", "dépannage", "installation", "technicien"],
    ),
    (Category::Promotion, &["offre", "promo", "prix", "réduction"]),
];

/// Lowercase and drop accents so "débit" and "debit" match alike
fn fold_text(text: &str) -> String {
    strip_accents(&text.to_lowercase())
}

/// Build one case-insensitive alternation from literal keywords
fn literal_alternation(keywords: &[&str]) -> Regex {
    let body = keywords
        .iter()
        .map(|kw| regex::escape(&fold_text(kw)))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?i)(?:{})", body)).expect("escaped keywords form a valid pattern")
}

/// Like `literal_alternation`, but entries containing `\d` stay regexes
fn mixed_alternation(keywords: &[&str]) -> Regex {
    let body = keywords
        .iter()
        .map(|kw| {
            if kw.contains(r"\d") {
                fold_text(kw)
            } else {
                regex::escape(&fold_text(kw))
            }
        })
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?i)(?:{})", body)).expect("built-in urgency patterns are valid")
}

fn word_alternation(words: &[&str]) -> Regex {
    let body = words
        .iter()
        .map(|w| regex::escape(&fold_text(w)))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{})\b", body)).expect("escaped words form a valid pattern")
}

/// Keyword and pattern based classifier
pub struct RuleClassifier {
    claim: Regex,
    urgency_high: Regex,
    urgency_medium: Regex,
    incidents: Vec<(Incident, Regex)>,
    positive: Regex,
    negative: Regex,
}

impl Default for RuleClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleClassifier {
    /// Compile all rule patterns
    pub fn new() -> Self {
        let incidents = INCIDENT_PATTERNS
            .iter()
            .map(|(incident, pattern)| {
                let re = Regex::new(&format!("(?i){}", fold_text(pattern)))
                    .expect("built-in incident patterns are valid");
                (*incident, re)
            })
            .collect();

        tracing::debug!("Rule patterns compiled");

        Self {
            claim: literal_alternation(CLAIM_KEYWORDS),
            urgency_high: mixed_alternation(URGENCY_HIGH_KEYWORDS),
            urgency_medium: literal_alternation(URGENCY_MEDIUM_KEYWORDS),
            incidents,
            positive: word_alternation(POSITIVE_WORDS),
            negative: word_alternation(NEGATIVE_WORDS),
        }
    }

    /// Whether the message is a complaint
    pub fn detect_claim(&self, text: &str) -> bool {
        self.claim.is_match(&fold_text(text))
    }

    pub fn detect_urgency(&self, text: &str) -> Urgency {
        let text = fold_text(text);
        if self.urgency_high.is_match(&text) {
            Urgency::Haute
        } else if self.urgency_medium.is_match(&text) {
            Urgency::Moyenne
        } else {
            Urgency::Faible
        }
    }

    /// Dominant topic among fibre, mobile and billing keywords
    pub fn detect_topic(&self, text: &str) -> Topic {
        let lowered = fold_text(text);
        let count = |keywords: &[&str]| {
            keywords
                .iter()
                .filter(|kw| lowered.contains(&fold_text(kw)))
                .count()
        };

        let fibre = count(FIBRE_KEYWORDS);
        let mobile = count(MOBILE_KEYWORDS);
        let facture = count(FACTURE_KEYWORDS);

        if fibre > mobile && fibre > facture {
            Topic::Fibre
        } else if mobile > facture {
            Topic::Mobile
        } else if facture > 0 {
            Topic::Facture
        } else {
            Topic::Autre
        }
    }

    pub fn detect_incident(&self, text: &str) -> Incident {
        let text = fold_text(text);
        self.incidents
            .iter()
            .find(|(_, re)| re.is_match(&text))
            .map(|(incident, _)| *incident)
            .unwrap_or(Incident::Aucun)
    }

    /// Negative words take precedence over positive ones
    pub fn detect_sentiment(&self, text: &str) -> Sentiment {
        let text = fold_text(text);
        if self.negative.is_match(&text) {
            Sentiment::Negatif
        } else if self.positive.is_match(&text) {
            Sentiment::Positif
        } else {
            Sentiment::Neutre
        }
    }

    pub fn detect_category(&self, text: &str) -> Category {
        let lowered = fold_text(text);
        CATEGORY_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|kw| lowered.contains(&fold_text(kw))))
            .map(|(category, _)| *category)
            .unwrap_or(Category::Autre)
    }

    /// Full rule-based classification of a single message
    pub fn classify(&self, text: &str) -> Classification {
        let is_claim = self.detect_claim(text);

        Classification {
            sentiment: self.detect_sentiment(text),
            is_claim,
            urgency: self.detect_urgency(text),
            topic: self.detect_topic(text),
            incident: self.detect_incident(text),
            category: self.detect_category(text),
            confidence: if is_claim { 0.85 } else { 0.70 },
            backend: Backend::Rules,
            classified_at: Utc::now(),
        }
    }

    /// Classify synchronously, used by the other backends for fallback
    pub fn classify_all(&self, texts: &[String]) -> Vec<Classification> {
        texts.iter().map(|text| self.classify(text)).collect()
    }
}

#[async_trait]
impl Classifier for RuleClassifier {
    fn backend(&self) -> Backend {
        Backend::Rules
    }

    async fn classify_batch(&self, texts: &[String]) -> Result<Vec<Classification>, ClassifyError> {
        tracing::debug!(count = texts.len(), "Classifying with rules");
        Ok(self.classify_all(texts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_detection() {
        let rules = RuleClassifier::new();
        assert!(rules.detect_claim("Panne internet depuis ce matin, urgent!"));
        assert!(rules.detect_claim("Ma box NE FONCTIONNE PAS"));
        assert!(!rules.detect_claim("Comment activer ma box?"));
    }

    #[test]
    fn test_urgency_levels() {
        let rules = RuleClassifier::new();
        assert_eq!(rules.detect_urgency("Panne internet, urgent!"), Urgency::Haute);
        assert_eq!(
            rules.detect_urgency("plus de connexion depuis 3 jours"),
            Urgency::Haute
        );
        assert_eq!(rules.detect_urgency("Lenteur de connexion fibre"), Urgency::Moyenne);
        assert_eq!(rules.detect_urgency("Super service Free Mobile"), Urgency::Faible);
    }

    #[test]
    fn test_topic_detection() {
        let rules = RuleClassifier::new();
        assert_eq!(rules.detect_topic("Lenteur de connexion fibre"), Topic::Fibre);
        assert_eq!(rules.detect_topic("Super service Free Mobile"), Topic::Mobile);
        assert_eq!(rules.detect_topic("Facture trop élevée ce mois"), Topic::Facture);
        assert_eq!(rules.detect_topic("Bonjour à tous"), Topic::Autre);
    }

    #[test]
    fn test_incident_detection_order() {
        let rules = RuleClassifier::new();
        assert_eq!(
            rules.detect_incident("Panne et lenteur ce soir"),
            Incident::PanneConnexion
        );
        assert_eq!(
            rules.detect_incident("Comment activer ma box?"),
            Incident::RetardActivation
        );
        assert_eq!(
            rules.detect_incident("Facture incompréhensible"),
            Incident::ProblemeFacturation
        );
        assert_eq!(rules.detect_incident("Bonne journée"), Incident::Aucun);
    }

    #[test]
    fn test_sentiment_negative_wins() {
        let rules = RuleClassifier::new();
        assert_eq!(rules.detect_sentiment("Merci beaucoup"), Sentiment::Positif);
        assert_eq!(
            rules.detect_sentiment("Merci mais encore une panne"),
            Sentiment::Negatif
        );
        assert_eq!(rules.detect_sentiment("Quelle heure?"), Sentiment::Neutre);
    }

    #[test]
    fn test_confidence_follows_claim() {
        let rules = RuleClassifier::new();
        assert_eq!(rules.classify("panne totale").confidence, 0.85);
        assert_eq!(rules.classify("bonjour").confidence, 0.70);
    }

    #[test]
    fn test_matches_without_accents() {
        let rules = RuleClassifier::new();
        assert!(rules.detect_claim("reclamation envoyee"));
        assert_eq!(rules.detect_sentiment("tres decu"), Sentiment::Negatif);
        assert_eq!(rules.detect_incident("DÉBIT très faible"), Incident::DebitInsuffisant);
    }

    #[tokio::test]
    async fn test_batch_preserves_order_and_count() {
        let rules = RuleClassifier::new();
        let texts = vec![
            "Super service".to_string(),
            "Panne totale".to_string(),
            String::new(),
        ];

        let results = rules.classify_batch(&texts).await.unwrap();

        assert_eq!(results.len(), 3);
        assert!(!results[0].is_claim);
        assert!(results[1].is_claim);
        assert_eq!(results[2].backend, Backend::Rules);
    }
}
