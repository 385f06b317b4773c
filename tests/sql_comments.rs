mod common;

use common::parsed;
use sqlweave::query::{Expr, Literal};
use sqlweave::{format, Dialect};

#[test]
fn line_comment_before_select() {
    let stmt = parsed("-- this is a comment\nSELECT 1");
    let q = stmt.as_select().expect("expected SELECT");
    assert_eq!(q.select.len(), 1);
}

#[test]
fn inline_comments_between_tokens() {
    let stmt = parsed("SELECT /* keep */ a -- trailing comment\nFROM t");
    let out = format(&stmt, &Dialect::Generic.config()).expect("format");
    assert_eq!(out.sql, "SELECT a FROM t");
}

#[test]
fn block_comment_multiline() {
    let stmt = parsed("/* leading\n block\n comment */\nSELECT 1");
    assert!(stmt.as_select().is_some());
}

#[test]
fn comment_like_text_inside_string_literal_is_kept() {
    let stmt = parsed("SELECT '-- not a comment' as t");
    let q = stmt.as_select().expect("expected SELECT");
    assert_eq!(q.select[0].expr, Expr::Literal(Literal::String("-- not a comment".into())));
}

#[test]
fn nested_block_comments() {
    let stmt = parsed("/* outer /* inner */ still comment */ SELECT 1");
    assert!(stmt.as_select().is_some());
}

#[test]
fn unterminated_block_comment_is_a_syntax_error() {
    let err = sqlweave::parse("SELECT 1 /* never closed").unwrap_err();
    assert_eq!(err.code_str(), "syntax_error");
}
