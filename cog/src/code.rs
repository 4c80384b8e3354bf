//! Codes géographiques INSEE : identifiant commune (`ci`), Corse, codes postaux

/// Longueur d'un identifiant commune ou d'un code postal
pub const CODE_LEN: usize = 5;

/// Dérive l'identifiant commune `ci` = département ‖ numéro de commune
///
/// Les lettres du département sont conservées (`2A`, `2B`). Le numéro de
/// commune est complété par des zéros pour obtenir 5 caractères.
/// Retourne `None` si le résultat ne fait pas 5 caractères.
pub fn derive_ci(dep: &str, com: &str) -> Option<String> {
    let dep = dep.trim();
    let com = com.trim();
    if dep.is_empty() || com.is_empty() || dep.len() >= CODE_LEN {
        return None;
    }

    let width = CODE_LEN - dep.len();
    let ci = format!("{}{:0>width$}", dep, com, width = width);
    (ci.len() == CODE_LEN && ci.is_ascii()).then_some(ci)
}

/// Clé de recherche d'un `ci` : `2A`/`2B` deviennent `20`
///
/// Seule la partie département (deux premiers caractères) est concernée.
pub fn corsica_key(ci: &str) -> String {
    ci.char_indices()
        .map(|(idx, c)| match c {
            'A' | 'B' | 'a' | 'b' if idx < 2 => '0',
            _ => c,
        })
        .collect()
}

/// Normalise un code numérique (INSEE ou postal) sur 5 chiffres
///
/// Les départements corses sont ramenés à `20`. Un code vide, non
/// numérique ou trop long donne `None`.
pub fn normalize_code(raw: &str) -> Option<String> {
    let code = corsica_key(raw.trim());
    if code.is_empty() || code.len() > CODE_LEN || !code.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("{:0>5}", code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_ci() {
        assert_eq!(derive_ci("01", "001"), Some("01001".to_string()));
        assert_eq!(derive_ci("75", "056"), Some("75056".to_string()));
        assert_eq!(derive_ci("2A", "004"), Some("2A004".to_string()));
        assert_eq!(derive_ci("971", "01"), Some("97101".to_string()));
        assert_eq!(derive_ci("01", "1"), Some("01001".to_string()));
    }

    #[test]
    fn test_derive_ci_invalid() {
        assert_eq!(derive_ci("", "001"), None);
        assert_eq!(derive_ci("01", ""), None);
        assert_eq!(derive_ci("01", "0001"), None);
        assert_eq!(derive_ci("12345", "1"), None);
    }

    #[test]
    fn test_derive_ci_always_five_chars() {
        for (dep, com) in [("01", "1"), ("2B", "33"), ("974", "22"), ("95", "690")] {
            let ci = derive_ci(dep, com).unwrap();
            assert_eq!(ci.len(), CODE_LEN);
            assert!(ci.starts_with(dep));
        }
    }

    #[test]
    fn test_corsica_key() {
        assert_eq!(corsica_key("2A004"), "20004");
        assert_eq!(corsica_key("2B033"), "20033");
        assert_eq!(corsica_key("75056"), "75056");
        assert_eq!(corsica_key("20004"), "20004");
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code("1001"), Some("01001".to_string()));
        assert_eq!(normalize_code(" 75056 "), Some("75056".to_string()));
        assert_eq!(normalize_code("2A004"), Some("20004".to_string()));
        assert_eq!(normalize_code("1400"), Some("01400".to_string()));
        assert_eq!(normalize_code(""), None);
        assert_eq!(normalize_code("abc"), None);
        assert_eq!(normalize_code("123456"), None);
    }
}
