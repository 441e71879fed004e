//! Classification Labels
//!
//! Fixed label sets produced by every classifier backend:
//! - `Sentiment`: positif / negatif / neutre
//! - `Urgency`: haute / moyenne / faible
//! - `Topic`, `Incident`, `Category`: telecom-specific taxonomies
//!
//! Labels arrive from LLM responses and uploaded columns in many spellings
//! ("NEGATIVE", "négatif", "high", "yes"). Each enum exposes `normalize` which
//! maps the known aliases onto the fixed set and returns `None` otherwise.

use serde::{Deserialize, Serialize};

/// Replace accented French letters (lowercase) with their ASCII base.
pub fn strip_accents(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'à' | 'â' | 'ä' => 'a',
            'î' | 'ï' => 'i',
            'ô' | 'ö' => 'o',
            'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

/// Lowercase, trim and fold French accents to ASCII.
pub fn fold(value: &str) -> String {
    strip_accents(&value.trim().to_lowercase())
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            other => other,
        })
        .collect()
}

/// Message sentiment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positif,
    Negatif,
    #[default]
    Neutre,
}

impl Sentiment {
    pub fn all() -> &'static [Sentiment] {
        &[Sentiment::Positif, Sentiment::Negatif, Sentiment::Neutre]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positif => "positif",
            Sentiment::Negatif => "negatif",
            Sentiment::Neutre => "neutre",
        }
    }

    pub fn normalize(value: &str) -> Option<Self> {
        match fold(value).as_str() {
            "positif" | "positive" | "pos" | "good" | "happy" | "tres_positif" => {
                Some(Sentiment::Positif)
            }
            "negatif" | "negative" | "neg" | "bad" | "angry" | "tres_negatif" => {
                Some(Sentiment::Negatif)
            }
            "neutre" | "neutral" | "neu" | "ok" => Some(Sentiment::Neutre),
            _ => None,
        }
    }
}

/// Priority of a message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Haute,
    Moyenne,
    #[default]
    Faible,
}

impl Urgency {
    pub fn all() -> &'static [Urgency] {
        &[Urgency::Haute, Urgency::Moyenne, Urgency::Faible]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::Haute => "haute",
            Urgency::Moyenne => "moyenne",
            Urgency::Faible => "faible",
        }
    }

    pub fn normalize(value: &str) -> Option<Self> {
        match fold(value).as_str() {
            "haute" | "high" | "critical" | "critique" | "urgent" | "tres_haute" | "elevee" => {
                Some(Urgency::Haute)
            }
            "moyenne" | "medium" | "moderee" | "modere" => Some(Urgency::Moyenne),
            "faible" | "low" | "basse" | "normale" => Some(Urgency::Faible),
            _ => None,
        }
    }
}

/// Main subject of a message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Fibre,
    Mobile,
    Reseau,
    Freebox,
    Wifi,
    Facture,
    ServiceClient,
    SupportTechnique,
    Promotion,
    #[default]
    Autre,
}

impl Topic {
    pub fn all() -> &'static [Topic] {
        &[
            Topic::Fibre,
            Topic::Mobile,
            Topic::Reseau,
            Topic::Freebox,
            Topic::Wifi,
            Topic::Facture,
            Topic::ServiceClient,
            Topic::SupportTechnique,
            Topic::Promotion,
            Topic::Autre,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::Fibre => "fibre",
            Topic::Mobile => "mobile",
            Topic::Reseau => "reseau",
            Topic::Freebox => "freebox",
            Topic::Wifi => "wifi",
            Topic::Facture => "facture",
            Topic::ServiceClient => "service_client",
            Topic::SupportTechnique => "support_technique",
            Topic::Promotion => "promotion",
            Topic::Autre => "autre",
        }
    }

    pub fn normalize(value: &str) -> Option<Self> {
        match fold(value).as_str() {
            "fibre" | "fiber" => Some(Topic::Fibre),
            "mobile" | "4g" | "5g" => Some(Topic::Mobile),
            "reseau" | "network" => Some(Topic::Reseau),
            "freebox" | "box" => Some(Topic::Freebox),
            "wifi" => Some(Topic::Wifi),
            "facture" | "facturation" | "billing" => Some(Topic::Facture),
            "service_client" | "sav" | "customer_service" | "service" => {
                Some(Topic::ServiceClient)
            }
            "support_technique" | "support" => Some(Topic::SupportTechnique),
            "promotion" | "promo" => Some(Topic::Promotion),
            "autre" | "other" => Some(Topic::Autre),
            _ => None,
        }
    }
}

/// Kind of incident reported in a message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Incident {
    PanneConnexion,
    BugFreebox,
    ProblemeFacturation,
    ProblemeMobile,
    RetardActivation,
    DebitInsuffisant,
    Information,
    #[default]
    Aucun,
    NonSpecifie,
}

impl Incident {
    pub fn all() -> &'static [Incident] {
        &[
            Incident::PanneConnexion,
            Incident::BugFreebox,
            Incident::ProblemeFacturation,
            Incident::ProblemeMobile,
            Incident::RetardActivation,
            Incident::DebitInsuffisant,
            Incident::Information,
            Incident::Aucun,
            Incident::NonSpecifie,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Incident::PanneConnexion => "panne_connexion",
            Incident::BugFreebox => "bug_freebox",
            Incident::ProblemeFacturation => "probleme_facturation",
            Incident::ProblemeMobile => "probleme_mobile",
            Incident::RetardActivation => "retard_activation",
            Incident::DebitInsuffisant => "debit_insuffisant",
            Incident::Information => "information",
            Incident::Aucun => "aucun",
            Incident::NonSpecifie => "non_specifie",
        }
    }

    pub fn normalize(value: &str) -> Option<Self> {
        match fold(value).as_str() {
            "panne_connexion" | "incident_reseau" | "reseau" | "connexion" => {
                Some(Incident::PanneConnexion)
            }
            "bug_freebox" | "technique" => Some(Incident::BugFreebox),
            "probleme_facturation" | "facturation" => Some(Incident::ProblemeFacturation),
            "probleme_mobile" | "mobile" => Some(Incident::ProblemeMobile),
            "retard_activation" | "activation" => Some(Incident::RetardActivation),
            "debit_insuffisant" | "debit" => Some(Incident::DebitInsuffisant),
            "information" | "service_client" => Some(Incident::Information),
            "aucun" | "none" => Some(Incident::Aucun),
            "non_specifie" | "autre" | "non_classifie" => Some(Incident::NonSpecifie),
            _ => None,
        }
    }
}

/// Coarse business category returned by the LLM
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Produit,
    Service,
    Support,
    Promotion,
    #[default]
    Autre,
}

impl Category {
    pub fn all() -> &'static [Category] {
        &[
            Category::Produit,
            Category::Service,
            Category::Support,
            Category::Promotion,
            Category::Autre,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Produit => "produit",
            Category::Service => "service",
            Category::Support => "support",
            Category::Promotion => "promotion",
            Category::Autre => "autre",
        }
    }

    pub fn normalize(value: &str) -> Option<Self> {
        match fold(value).as_str() {
            "produit" | "product" => Some(Category::Produit),
            "service" => Some(Category::Service),
            "support" => Some(Category::Support),
            "promotion" | "promo" => Some(Category::Promotion),
            "autre" | "other" => Some(Category::Autre),
            _ => None,
        }
    }

    /// Topic to use when a backend only produced a category
    pub fn as_topic(&self) -> Topic {
        match self {
            Category::Promotion => Topic::Promotion,
            Category::Support => Topic::SupportTechnique,
            Category::Service => Topic::ServiceClient,
            Category::Produit | Category::Autre => Topic::Autre,
        }
    }
}

/// Parse a yes/no claim flag ("oui", "yes", "1", "true")
pub fn normalize_claim(value: &str) -> Option<bool> {
    match fold(value).as_str() {
        "oui" | "yes" | "true" | "1" | "reclamation" => Some(true),
        "non" | "no" | "false" | "0" => Some(false),
        _ => None,
    }
}

/// Render a claim flag the way the dashboard shows it
pub fn claim_str(is_claim: bool) -> &'static str {
    if is_claim {
        "oui"
    } else {
        "non"
    }
}

macro_rules! impl_display {
    ($($ty:ty),*) => {
        $(
            impl std::fmt::Display for $ty {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )*
    };
}

impl_display!(Sentiment, Urgency, Topic, Incident, Category);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentiment_aliases() {
        assert_eq!(Sentiment::normalize("NEGATIVE"), Some(Sentiment::Negatif));
        assert_eq!(Sentiment::normalize(" négatif "), Some(Sentiment::Negatif));
        assert_eq!(Sentiment::normalize("Positif"), Some(Sentiment::Positif));
        assert_eq!(Sentiment::normalize("ok"), Some(Sentiment::Neutre));
        assert_eq!(Sentiment::normalize("mixed"), None);
    }

    #[test]
    fn test_urgency_aliases() {
        assert_eq!(Urgency::normalize("HIGH"), Some(Urgency::Haute));
        assert_eq!(Urgency::normalize("élevée"), Some(Urgency::Haute));
        assert_eq!(Urgency::normalize("basse"), Some(Urgency::Faible));
        assert_eq!(Urgency::normalize("modérée"), Some(Urgency::Moyenne));
    }

    #[test]
    fn test_claim_flag() {
        assert_eq!(normalize_claim("YES"), Some(true));
        assert_eq!(normalize_claim("non"), Some(false));
        assert_eq!(normalize_claim("peut-être"), None);
        assert_eq!(claim_str(true), "oui");
    }

    #[test]
    fn test_serde_wire_names() {
        let json = serde_json::to_string(&Incident::PanneConnexion).unwrap();
        assert_eq!(json, "\"panne_connexion\"");
        let topic: Topic = serde_json::from_str("\"service_client\"").unwrap();
        assert_eq!(topic, Topic::ServiceClient);
    }

    #[test]
    fn test_display_matches_wire_name() {
        for topic in Topic::all() {
            let json = serde_json::to_string(topic).unwrap();
            assert_eq!(json.trim_matches('"'), topic.to_string());
        }
    }
}
