//! Normalisation for free-text form input.

/// Masks a Brazilian phone number: `(21) 98765-4321` for mobiles,
/// `(21) 3456-7890` for landlines. Shorter inputs come back as bare digits.
pub fn format_phone_mask(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() >= 11 {
        format!("({}) {}-{}", &digits[..2], &digits[2..7], &digits[7..11])
    } else if digits.len() == 10 {
        format!("({}) {}-{}", &digits[..2], &digits[2..6], &digits[6..10])
    } else {
        digits
    }
}

/// Capitalises the first letter of every word and lowercases the rest.
pub fn title_case(raw: &str) -> String {
    let mut titled = String::with_capacity(raw.len());
    let mut previous_is_letter = false;
    for c in raw.trim().chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                titled.extend(c.to_lowercase());
            } else {
                titled.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            titled.push(c);
            previous_is_letter = false;
        }
    }
    titled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_mobile_and_landline_numbers() {
        assert_eq!(format_phone_mask("21987654321"), "(21) 98765-4321");
        assert_eq!(format_phone_mask("(21) 98765-4321 ramal 2"), "(21) 98765-4321");
        assert_eq!(format_phone_mask("2134567890"), "(21) 3456-7890");
        assert_eq!(format_phone_mask("98765"), "98765");
        assert_eq!(format_phone_mask(""), "");
    }

    #[test]
    fn title_cases_names() {
        assert_eq!(title_case("  maria DA silva "), "Maria Da Silva");
        assert_eq!(title_case("joão d'avila"), "João D'Avila");
    }
}
