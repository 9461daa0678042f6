use phf::{Map, Set, phf_map, phf_set};

static ATOMIC_MASSES: Map<&'static str, f64> = phf_map! {
    "H" => 1.008, "D" => 2.014, "Li" => 6.94, "B" => 10.81, "C" => 12.011,
    "N" => 14.007, "O" => 15.999, "F" => 18.998, "Na" => 22.990, "Mg" => 24.305,
    "Si" => 28.085, "P" => 30.974, "S" => 32.06, "Cl" => 35.45, "K" => 39.098,
    "Ca" => 40.078, "Fe" => 55.845, "Zn" => 65.38, "Se" => 78.971, "Br" => 79.904,
    "I" => 126.904,
};

// Two-letter symbols that are safe to recognize from an upper-case atom name.
// "CA", "NA", "HG" etc. are left out on purpose; in polymer force fields they
// almost always name carbon, nitrogen, or hydrogen atoms.
static TWO_LETTER_PREFIXES: Set<&'static str> = phf_set! {
    "CL", "BR", "SI", "LI", "MG", "ZN", "FE", "SE",
};

/// Normalizes an element symbol to its canonical capitalization ("CL" -> "Cl").
pub fn normalize_symbol(symbol: &str) -> String {
    let trimmed = symbol.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => {
            let rest: String = chars.as_str().to_ascii_lowercase();
            format!("{}{}", first.to_ascii_uppercase(), rest)
        }
        None => String::new(),
    }
}

/// Atomic mass (Da) of an element symbol, in any capitalization.
pub fn mass_of(symbol: &str) -> Option<f64> {
    ATOMIC_MASSES.get(normalize_symbol(symbol).as_str()).copied()
}

/// Guesses the element of an atom from its name.
///
/// Leading digits are skipped ("1HB" -> H). A two-letter element is only
/// recognized for the unambiguous prefixes listed above; otherwise the first
/// letter decides. Returns an empty string when nothing matches.
pub fn guess_element(atom_name: &str) -> String {
    let letters: String = atom_name
        .trim()
        .chars()
        .skip_while(|c| !c.is_ascii_alphabetic())
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();

    if letters.len() >= 2 && TWO_LETTER_PREFIXES.contains(&letters[..2]) {
        return normalize_symbol(&letters[..2]);
    }
    match letters.get(..1) {
        Some(first) if mass_of(first).is_some() => first.to_string(),
        _ => String::new(),
    }
}
