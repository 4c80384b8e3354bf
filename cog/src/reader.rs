//! Lecture des fichiers CSV sources (COG, correspondances, coordonnées)
//!
//! Les fichiers sont décodés en entier avant d'être passés au lecteur CSV :
//! l'INSEE publie ses fichiers en Windows-1252 / Latin-9, les fichiers
//! convertis en UTF-8 restent le cas par défaut.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use encoding_rs::Encoding;
use regex::Regex;
use tracing::debug;

use crate::types::{Record, SourceRow};
use crate::CogError;

/// Format d'un fichier source
#[derive(Debug, Clone, Copy)]
pub struct SourceFormat {
    /// Séparateur de champs (`,` ou `;`)
    pub delimiter: u8,

    /// Le fichier a une ligne d'en-tête
    pub has_headers: bool,

    /// Encodage du fichier
    pub encoding: &'static Encoding,
}

impl Default for SourceFormat {
    fn default() -> Self {
        Self {
            delimiter: b',',
            has_headers: true,
            encoding: encoding_rs::UTF_8,
        }
    }
}

impl SourceFormat {
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn without_headers(mut self) -> Self {
        self.has_headers = false;
        self
    }

    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }
}

/// Résout un label d'encodage (`utf-8`, `windows-1252`, `iso-8859-15`...)
pub fn encoding_for_label(label: &str) -> Option<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
}

/// Normalise un en-tête CSV en nom de colonne
///
/// Minuscules, suppression des caractères hors mots/espaces, espaces
/// internes remplacés par `_` (ex: `"Code Postal"` -> `code_postal`).
pub fn normalize_header(header: &str) -> String {
    static NON_WORD: OnceLock<Regex> = OnceLock::new();
    static SPACES: OnceLock<Regex> = OnceLock::new();

    let non_word = NON_WORD.get_or_init(|| Regex::new(r"[^\s\w]+").expect("valid regex"));
    let spaces = SPACES.get_or_init(|| Regex::new(r"\s+").expect("valid regex"));

    let lowered = header.trim_start_matches('\u{feff}').to_lowercase();
    let cleaned = non_word.replace_all(&lowered, "");
    spaces.replace_all(cleaned.trim(), "_").into_owned()
}

/// Lecteur ligne à ligne d'un fichier source
pub struct SourceReader {
    path: PathBuf,
    headers: Vec<String>,
    reader: csv::Reader<Cursor<Vec<u8>>>,
    line: u64,
}

impl SourceReader {
    /// Ouvre et décode un fichier source
    pub fn open(path: &Path, format: SourceFormat) -> Result<Self, CogError> {
        let data = std::fs::read(path).map_err(|e| CogError::io(path, e))?;

        let (decoded, used, had_errors) = format.encoding.decode(&data);
        if had_errors {
            return Err(CogError::Encoding {
                path: path.to_path_buf(),
                reason: format!("invalid byte sequence for {}", used.name()),
            });
        }

        // Lignes courtes tolérées (champs finaux absents = NULL) ;
        // un champ en trop est rejeté dans `next`
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(format.delimiter)
            .has_headers(format.has_headers)
            .flexible(true)
            .from_reader(Cursor::new(decoded.into_owned().into_bytes()));

        let headers = if format.has_headers {
            reader
                .headers()
                .map_err(|source| CogError::Csv {
                    path: path.to_path_buf(),
                    source,
                })?
                .iter()
                .map(normalize_header)
                .collect()
        } else {
            Vec::new()
        };

        debug!(path = %path.display(), columns = ?headers, "Opened source file");

        Ok(Self {
            path: path.to_path_buf(),
            headers,
            reader,
            line: 0,
        })
    }

    /// En-têtes normalisés (vide pour un fichier sans en-tête)
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Vérifie la présence d'une colonne obligatoire
    pub fn require_column(&self, column: &str) -> Result<(), CogError> {
        if self.headers.iter().any(|h| h == column) {
            Ok(())
        } else {
            Err(CogError::MissingColumn {
                path: self.path.clone(),
                column: column.to_string(),
            })
        }
    }

    fn to_row(&self, raw: Vec<String>) -> SourceRow {
        let mut record = Record::new();
        for (idx, header) in self.headers.iter().enumerate() {
            record.set_text(header, raw.get(idx).map(String::as_str));
        }
        SourceRow {
            line: self.line,
            raw,
            record,
        }
    }
}

impl Iterator for SourceReader {
    type Item = Result<SourceRow, CogError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut raw = csv::StringRecord::new();
        match self.reader.read_record(&mut raw) {
            Ok(true) => {
                self.line += 1;
                if !self.headers.is_empty() && raw.len() > self.headers.len() {
                    return Some(Err(CogError::malformed(
                        &self.path,
                        self.line,
                        format!("expected {} fields, found {}", self.headers.len(), raw.len()),
                    )));
                }
                let raw: Vec<String> = raw.iter().map(str::to_string).collect();
                Some(Ok(self.to_row(raw)))
            }
            Ok(false) => None,
            Err(source) => Some(Err(CogError::Csv {
                path: self.path.clone(),
                source,
            })),
        }
    }
}
