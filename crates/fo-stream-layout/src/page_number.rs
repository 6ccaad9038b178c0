//! Page-number formatting.

/// Format `number` with a format token.
///
/// Supported tokens are decimal (`1`, or zero-padded as in `01`), roman
/// (`i`, `I`) and alphabetic (`a`, `A`). Unknown tokens fall back to
/// decimal.
pub fn format_page_number(number: u32, format: &str) -> String {
    match format {
        "i" => roman(number).to_ascii_lowercase(),
        "I" => roman(number),
        "a" => alphabetic(number, b'a'),
        "A" => alphabetic(number, b'A'),
        token if is_padded_decimal(token) => format!("{:0width$}", number, width = token.len()),
        "1" => number.to_string(),
        other => {
            log::debug!("unsupported page number format '{}', using decimal", other);
            number.to_string()
        }
    }
}

/// `01`, `001` and so on.
fn is_padded_decimal(token: &str) -> bool {
    token.len() > 1 && token.ends_with('1') && token.bytes().rev().skip(1).all(|b| b == b'0')
}

fn roman(number: u32) -> String {
    if number == 0 || number > 3999 {
        return number.to_string();
    }
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
    let mut rest = number;
    let mut out = String::new();
    for (value, numeral) in NUMERALS {
        while rest >= value {
            out.push_str(numeral);
            rest -= value;
        }
    }
    out
}

/// Bijective base-26: a..z, aa, ab, ...
fn alphabetic(number: u32, base: u8) -> String {
    if number == 0 {
        return number.to_string();
    }
    let mut n = number;
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push(char::from(base + (n % 26) as u8));
        n /= 26;
    }
    letters.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_and_padding() {
        assert_eq!(format_page_number(7, "1"), "7");
        assert_eq!(format_page_number(7, "001"), "007");
        assert_eq!(format_page_number(1234, "01"), "1234");
        assert_eq!(format_page_number(3, "x"), "3");
    }

    #[test]
    fn roman_numerals() {
        assert_eq!(format_page_number(4, "i"), "iv");
        assert_eq!(format_page_number(1994, "I"), "MCMXCIV");
        assert_eq!(format_page_number(0, "I"), "0");
    }

    #[test]
    fn alphabetic_is_bijective() {
        assert_eq!(format_page_number(1, "a"), "a");
        assert_eq!(format_page_number(26, "a"), "z");
        assert_eq!(format_page_number(27, "A"), "AA");
        assert_eq!(format_page_number(703, "a"), "aaa");
    }
}
