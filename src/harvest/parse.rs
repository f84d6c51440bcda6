// src/harvest/parse.rs
//! Catch-message parsing, kept apart from the harvester so phrasing changes
//! stay in one place.

use crate::error::CatchParseError;

/// Whether `text` is a catch announcement at all.
pub fn is_catch(text: &str, prefix: &str) -> bool {
    !prefix.is_empty() && text.contains(prefix)
}

/// Extract the raw category name from a catch message: the text between the
/// end of `prefix` and the next `!`.
///
/// `"<@1> You caught **France!** (`#1A2B`)"` with prefix `"You caught **"`
/// yields `"France"`. Surrounding whitespace, quotes and markdown asterisks are
/// stripped; the result is not lower-cased or alias-resolved.
pub fn parse_catch_category<'a>(text: &'a str, prefix: &str) -> Result<&'a str, CatchParseError> {
    if prefix.is_empty() {
        return Err(CatchParseError::MissingPrefix);
    }
    let start = text
        .find(prefix)
        .map(|i| i + prefix.len())
        .ok_or(CatchParseError::MissingPrefix)?;
    let rest = &text[start..];
    let end = rest.find('!').ok_or(CatchParseError::Unterminated)?;
    let name = rest[..end]
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '*')
        .trim();
    if name.is_empty() {
        return Err(CatchParseError::Empty);
    }
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    const P: &str = "You caught **";

    #[test]
    fn extracts_between_prefix_and_bang() {
        let t = "<@123> You caught **France!** (`#1A2B3C`)";
        assert_eq!(parse_catch_category(t, P), Ok("France"));
    }

    #[test]
    fn multi_word_and_punctuated_names() {
        let t = "<@1> You caught **Bosnia and Herzegovina!**";
        assert_eq!(parse_catch_category(t, P), Ok("Bosnia and Herzegovina"));
        let t = "<@1> You caught **Cote d'Ivoire!** This is a **new countryball**";
        assert_eq!(parse_catch_category(t, P), Ok("Cote d'Ivoire"));
    }

    #[test]
    fn bang_before_prefix_is_ignored() {
        let t = "Wow! <@1> You caught **Japan!**";
        assert_eq!(parse_catch_category(t, P), Ok("Japan"));
    }

    #[test]
    fn quoted_names_are_unwrapped() {
        let t = "<@1> You caught **\"Egypt\"!**";
        assert_eq!(parse_catch_category(t, P), Ok("Egypt"));
    }

    #[test]
    fn failures() {
        assert_eq!(
            parse_catch_category("nothing here", P),
            Err(CatchParseError::MissingPrefix)
        );
        assert_eq!(
            parse_catch_category("You caught **France", P),
            Err(CatchParseError::Unterminated)
        );
        assert_eq!(
            parse_catch_category("You caught ** !", P),
            Err(CatchParseError::Empty)
        );
        assert!(!is_catch("anything", ""));
    }
}
