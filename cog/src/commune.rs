//! Lecture des champs d'une ligne commune (`comsimp`)

use crate::code::derive_ci;
use crate::types::Record;

/// Champs d'une commune utiles à l'enrichissement
#[derive(Debug, Clone, Copy)]
pub struct CommuneFields<'a> {
    pub dep: &'a str,
    pub com: &'a str,
    pub artmin: Option<&'a str>,
    pub nccenr: Option<&'a str>,
}

impl<'a> CommuneFields<'a> {
    pub fn from_record(record: &'a Record) -> Self {
        Self {
            dep: record.text("dep").unwrap_or_default(),
            com: record.text("com").unwrap_or_default(),
            artmin: record.text("artmin"),
            nccenr: record.text("nccenr"),
        }
    }

    /// Identifiant commune dérivé (voir [`derive_ci`])
    pub fn ci(&self) -> Option<String> {
        derive_ci(self.dep, self.com)
    }

    /// Nom complet avec article (`"(Le)"` + `"Havre"` -> `"Le Havre"`)
    pub fn display_name(&self) -> String {
        article_name(self.artmin, self.nccenr.unwrap_or_default())
    }
}

/// Combine l'article en minuscules du COG et le nom enrichi
///
/// L'article est publié entre parenthèses ; une élision (`L'`) n'est pas
/// suivie d'une espace.
pub fn article_name(artmin: Option<&str>, nccenr: &str) -> String {
    let article = artmin
        .map(|a| a.trim().trim_start_matches('(').trim_end_matches(')').trim())
        .unwrap_or_default();

    if article.is_empty() {
        nccenr.trim().to_string()
    } else if article.ends_with('\'') {
        format!("{}{}", article, nccenr.trim())
    } else {
        format!("{} {}", article, nccenr.trim())
    }
}
