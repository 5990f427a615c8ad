//! Properties of the DAX tokenizer.

use bpa_expr::{TokenList, TokenTag, tokenize};
use proptest::prelude::*;

proptest! {
    #[test]
    fn tokenizer_is_total_and_finite(text in "\\PC{0,200}") {
        let tokens: Vec<_> = tokenize(&text).collect();
        prop_assert!(tokens.len() <= text.chars().count());
        for pair in tokens.windows(2) {
            prop_assert!(pair[0].offset < pair[1].offset);
        }
    }

    #[test]
    fn tokenizer_is_restartable(text in "[A-Z\\[\\]'\"()/*+ 0-9.,-]{0,80}") {
        let stream = tokenize(&text);
        let first: Vec<_> = stream.clone().collect();
        let second: Vec<_> = stream.collect();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn token_text_is_a_slice_of_the_input(text in "[a-zA-Z0-9\\[\\]'\"(){}/*+<>=&|, .-]{0,80}") {
        let chars: Vec<char> = text.chars().collect();
        for token in tokenize(&text) {
            let end = token.offset + token.text.chars().count();
            let slice: String = chars[token.offset..end].iter().collect();
            prop_assert_eq!(slice, token.text);
        }
    }
}

#[test]
fn measure_expression_structure() {
    let list = TokenList::new(
        "VAR total = SUM ( 'Sales'[Amount] ) RETURN DIVIDE ( total, [Count] ) /* safe */",
    );
    let tags: Vec<TokenTag> = list.cursors().map(|cursor| cursor.tag()).collect();
    assert_eq!(
        tags,
        vec![
            TokenTag::Var,
            TokenTag::TableOrVariable,
            TokenTag::Eq,
            TokenTag::Function,
            TokenTag::OpenParens,
            TokenTag::Table,
            TokenTag::ColumnOrMeasure,
            TokenTag::CloseParens,
            TokenTag::Return,
            TokenTag::Function,
            TokenTag::OpenParens,
            TokenTag::TableOrVariable,
            TokenTag::Comma,
            TokenTag::ColumnOrMeasure,
            TokenTag::CloseParens,
        ]
    );
}

#[test]
fn unterminated_and_unknown_input_never_fails() {
    let tags: Vec<TokenTag> = tokenize("[Open \"str").map(|token| token.tag).collect();
    assert_eq!(tags, vec![TokenTag::ColumnOrMeasure]);
    let tags: Vec<TokenTag> = tokenize("# ~").map(|token| token.tag).collect();
    assert_eq!(tags, vec![TokenTag::Unknown, TokenTag::Unknown]);
}
