const NUMERALS: [(u32, &str); 13] = [
    (1000, "M"),
    (900, "CM"),
    (500, "D"),
    (400, "CD"),
    (100, "C"),
    (90, "XC"),
    (50, "L"),
    (40, "XL"),
    (10, "X"),
    (9, "IX"),
    (5, "V"),
    (4, "IV"),
    (1, "I"),
];

/// Formats `1..=3999` as a Roman numeral.
pub fn to_roman(mut value: u32) -> Option<String> {
    if value == 0 || value > 3999 {
        return None;
    }
    let mut out = String::new();
    for (weight, glyph) in NUMERALS {
        while value >= weight {
            out.push_str(glyph);
            value -= weight;
        }
    }
    Some(out)
}
