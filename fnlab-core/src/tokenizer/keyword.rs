#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::EnumString,
    strum::Display,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum Keyword {
    #[strum(serialize = "False")]
    False,
    #[strum(serialize = "None")]
    None,
    #[strum(serialize = "True")]
    True,
    And,
    As,
    Assert,
    Async,
    Await,
    Break,
    Class,
    Continue,
    Def,
    Del,
    Elif,
    Else,
    Except,
    Finally,
    For,
    From,
    Global,
    If,
    Import,
    In,
    Is,
    Lambda,
    Nonlocal,
    Not,
    Or,
    Pass,
    Raise,
    Return,
    Try,
    While,
    With,
    Yield,
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_keywords_round_trip_through_their_spelling() {
        for kw in Keyword::iter() {
            assert_eq!(Keyword::try_from(kw.as_ref()), Ok(kw));
        }
        assert_eq!(Keyword::True.to_string(), "True");
        assert_eq!(Keyword::Nonlocal.to_string(), "nonlocal");
    }

    #[test]
    fn test_keywords_are_case_sensitive() {
        assert!(Keyword::try_from("true").is_err());
        assert!(Keyword::try_from("DEF").is_err());
        // soft keywords stay identifiers
        assert!(Keyword::try_from("match").is_err());
    }
}
