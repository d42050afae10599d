/// Normalize a Brazilian phone number for the messaging gateway.
///
/// Best-effort heuristic, not a numbering-plan validator. Strips formatting
/// and fills in the pieces local numbers usually omit: the mobile `9`
/// prefix, the area code (assumed `11` when absent) and the country code
/// `55`. Inputs that match none of the known lengths pass through as their
/// bare digits.
pub fn normalize(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    match digits.len() {
        13 if digits.starts_with("55") => digits,
        11 => format!("55{digits}"),
        10 => format!("55{}9{}", &digits[..2], &digits[2..]),
        9 => format!("5511{digits}"),
        8 => format!("55119{digits}"),
        _ => digits,
    }
}

#[cfg(test)]
mod tests {
    use super::normalize;

    #[test]
    fn eleven_digits_get_country_code() {
        assert_eq!(normalize("11999998888"), "5511999998888");
    }

    #[test]
    fn ten_digits_gain_mobile_nine_after_area_code() {
        assert_eq!(normalize("1133334444"), "5511933334444");
    }

    #[test]
    fn nine_digits_gain_default_area_code() {
        assert_eq!(normalize("999998888"), "5511999998888");
    }

    #[test]
    fn eight_digits_gain_nine_and_default_area_code() {
        assert_eq!(normalize("33334444"), "5511933334444");
    }

    #[test]
    fn thirteen_digits_with_country_code_pass_through() {
        assert_eq!(normalize("5511999998888"), "5511999998888");
    }

    #[test]
    fn formatting_is_stripped_before_the_rules_apply() {
        assert_eq!(normalize("+55 (11) 99999-8888"), "5511999998888");
        assert_eq!(normalize("(11) 3333-4444"), "5511933334444");
    }

    #[test]
    fn unknown_lengths_pass_through_as_digits() {
        assert_eq!(normalize("123"), "123");
        assert_eq!(normalize("4411999998888"), "4411999998888");
        assert_eq!(normalize(""), "");
    }
}
