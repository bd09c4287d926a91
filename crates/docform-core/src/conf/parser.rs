use super::ConfNode;
use crate::DocError;
use chumsky::prelude::*;

type ParseError<'src> = Rich<'src, char>;

/// Parse a block into its top-level items.
///
/// `#` starts a comment running to the end of the line. Strings may use
/// single or double quotes; the quote character is escaped by doubling it.
pub fn parse(src: &str) -> Result<Vec<ConfNode>, DocError> {
    block().parse(src).into_result().map_err(|errors| {
        DocError::MalformedBlock(
            errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; "),
        )
    })
}

fn quoted<'src>(
    delimiter: char,
) -> impl Parser<'src, &'src str, String, extra::Err<ParseError<'src>>> + Clone {
    let doubled: &'static str = if delimiter == '\'' { "''" } else { "\"\"" };
    just(delimiter)
        .ignore_then(
            choice((just(doubled).to(delimiter), none_of(delimiter)))
                .repeated()
                .collect::<String>(),
        )
        .then_ignore(just(delimiter))
}

fn block<'src>() -> impl Parser<'src, &'src str, Vec<ConfNode>, extra::Err<ParseError<'src>>> {
    let comment = just('#').then(none_of('\n').repeated()).ignored();
    let blank = choice((any().filter(|c: &char| c.is_whitespace()).ignored(), comment)).repeated();

    let string = choice((quoted('\''), quoted('"')));

    let identifier = any()
        .filter(|c: &char| c.is_ascii_alphabetic() || *c == '_')
        .then(
            any()
                .filter(|c: &char| c.is_ascii_alphanumeric() || *c == '_')
                .repeated(),
        )
        .to_slice();

    let node = recursive(|node| {
        let list = just('(')
            .ignore_then(blank.clone())
            .ignore_then(
                node.then_ignore(blank.clone())
                    .repeated()
                    .collect::<Vec<ConfNode>>(),
            )
            .then_ignore(just(')'));

        let named = identifier
            .then_ignore(blank.clone())
            .then(choice((
                list.clone(),
                string.clone().map(|s| vec![ConfNode::Str(s)]),
            )))
            .map(|(name, children)| ConfNode::node(name, children));

        choice((
            named,
            list.map(ConfNode::group),
            string.clone().map(ConfNode::Str),
        ))
    });

    blank
        .clone()
        .ignore_then(node.then_ignore(blank).repeated().collect::<Vec<ConfNode>>())
        .then_ignore(end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::render_items;

    #[test]
    fn parses_values_block() {
        let items = parse("WM(Formularwerte((ID 'a' VALUE 'b')))").expect("parse");
        assert_eq!(items.len(), 1);
        let entry = &items[0].find_all("Formularwerte")[0].children()[0];
        assert_eq!(entry.value_of("ID"), Some("a"));
        assert_eq!(entry.value_of("VALUE"), Some("b"));
    }

    #[test]
    fn doubled_quotes_and_double_quoted_strings() {
        let items = parse("A 'it''s' B \"say \"\"hi\"\"\"").expect("parse");
        assert_eq!(items[0].literal(), Some("it's"));
        assert_eq!(items[1].literal(), Some("say \"hi\""));
    }

    #[test]
    fn comments_and_whitespace() {
        let src = "# header\nWM(\n  Formular( # inline\n    TITLE 'x'\n  )\n)\n";
        let items = parse(src).expect("parse");
        assert_eq!(items[0].find_all("TITLE")[0].literal(), Some("x"));
    }

    #[test]
    fn empty_input_is_empty_forest() {
        assert!(parse("").expect("parse").is_empty());
        assert!(parse("  # only a comment").expect("parse").is_empty());
    }

    #[test]
    fn render_then_parse_is_identity() {
        let src = "WM(Druckfunktionen((FUNCTION 'a')(FUNCTION 'b'))) x('' 'q''q')";
        let items = parse(src).expect("parse");
        assert_eq!(parse(&render_items(&items)).expect("reparse"), items);
    }

    #[test]
    fn malformed_input_is_reported() {
        assert!(matches!(parse("WM(("), Err(DocError::MalformedBlock(_))));
        assert!(matches!(parse("bare"), Err(DocError::MalformedBlock(_))));
        assert!(matches!(parse("'open"), Err(DocError::MalformedBlock(_))));
    }
}
