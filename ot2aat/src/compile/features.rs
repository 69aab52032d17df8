//! Mapping OpenType feature tags to AAT feature types and selectors.

/// The AAT `(type, selector)` that turns on the behaviour of an OpenType
/// feature, if there is a well-known equivalent.
pub fn aat_feature(tag: &str) -> Option<(u16, u16)> {
    let pair = match tag {
        "rlig" => (1, 0),
        "liga" => (1, 2),
        "dlig" => (1, 4),
        "clig" => (1, 18),
        "hlig" => (1, 20),
        "pnum" => (6, 1),
        "tnum" => (6, 0),
        "ordn" => (10, 3),
        "sups" => (10, 1),
        "subs" => (10, 2),
        "afrc" => (11, 1),
        "frac" => (11, 2),
        "zero" => (14, 4),
        "onum" => (21, 0),
        "lnum" => (21, 1),
        "case" => (33, 0),
        "cpsp" => (33, 2),
        "ss01" | "ss02" | "ss03" | "ss04" | "ss05" | "ss06" | "ss07" | "ss08" | "ss09"
        | "ss10" | "ss11" | "ss12" | "ss13" | "ss14" | "ss15" | "ss16" | "ss17" | "ss18"
        | "ss19" | "ss20" => {
            let n: u16 = tag[2..].parse().ok()?;
            (35, n * 2)
        }
        "calt" => (36, 0),
        "swsh" => (36, 2),
        "cswh" => (36, 4),
        "smcp" => (37, 1),
        "c2sc" => (38, 1),
        "c2pc" => (38, 2),
        _ => return None,
    };
    Some(pair)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("liga", Some((1, 2)))]
    #[case("smcp", Some((37, 1)))]
    #[case("ss01", Some((35, 2)))]
    #[case("ss20", Some((35, 40)))]
    #[case("ss21", None)]
    #[case("ccmp", None)]
    fn known_tags(#[case] tag: &str, #[case] expected: Option<(u16, u16)>) {
        assert_eq!(aat_feature(tag), expected);
    }
}
