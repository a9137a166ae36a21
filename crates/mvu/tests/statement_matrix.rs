use mvu::{normalize_all, parse_literal, CommandKind, Extractor, Literal};
use serde_json::json;

fn commands(text: &str) -> Vec<(CommandKind, String, Vec<String>, Option<String>)> {
    let extraction = Extractor::new(Default::default()).unwrap().extract(text);
    let (commands, _) = normalize_all(&extraction.statements);
    commands
        .into_iter()
        .map(|c| {
            let args = c.args.iter().map(|a| a.source().into_owned()).collect();
            (c.kind, c.path, args, c.reason)
        })
        .collect()
}

#[test]
fn literal_matrix() {
    let cases = [
        ("true", json!(true)),
        ("false", json!(false)),
        ("null", json!(null)),
        ("42", json!(42)),
        ("3.14", json!(3.14)),
        ("-10", json!(-10)),
        ("{\"a\": 1}", json!({"a": 1})),
        ("[1, 2, 3]", json!([1, 2, 3])),
        ("\"hello\"", json!("hello")),
        ("'world'", json!("world")),
        ("10 + 5", json!(15)),
        ("100 / 4", json!(25)),
        ("7 - 10", json!(-3)),
        ("{name: 'B', tags: ['x',],}", json!({"name": "B", "tags": ["x"]})),
    ];
    for (src, expected) in cases {
        assert_eq!(parse_literal(src).unwrap(), Literal::Value(expected), "literal {src:?}");
    }
    assert_eq!(parse_literal("undefined").unwrap(), Literal::Undefined);
    for bad in ["", "hello", "1 + ", "{a: }", "10 / 0"] {
        assert!(parse_literal(bad).is_err(), "literal {bad:?} should fail");
    }
}

#[test]
fn extraction_matrix() {
    let single = commands("_.set('path.to.var', 100);//更新原因");
    assert_eq!(
        single,
        vec![(
            CommandKind::Set,
            "path.to.var".to_string(),
            vec!["100".to_string()],
            Some("更新原因".to_string())
        )]
    );

    let many = commands(
        "
      _.set('a', 1);//原因1
      _.add('b', 5);//原因2
      _.delete('c');//原因3
    ",
    );
    let kinds: Vec<CommandKind> = many.iter().map(|c| c.0).collect();
    assert_eq!(kinds, vec![CommandKind::Set, CommandKind::Add, CommandKind::Delete]);
    let reasons: Vec<Option<&str>> = many.iter().map(|c| c.3.as_deref()).collect();
    assert_eq!(reasons, vec![Some("原因1"), Some("原因2"), Some("原因3")]);

    let nested = commands("_.set('path', {\"nested\": [1, 2, 3]});");
    assert_eq!(nested[0].2, vec!["{\"nested\": [1, 2, 3]}".to_string()]);
}

#[test]
fn wrapper_block_matrix() {
    let cases = [
        "<UpdateVariable>\n<Analysis>变量分析</Analysis>\n_.set('好感度', 50, 60);//好感度提升\n</UpdateVariable>",
        "<updatevariable><analysis>_.set('x', 1);</analysis>_.set('好感度', 50, 60);</updatevariable>",
        "<UpdateVariable>\n_.set('好感度', 50, 60);\n",
        "prose <UpdateVariable type=\"delta\">_.set('好感度', 50, 60);</UpdateVariable> more prose",
    ];
    for text in cases {
        let found = commands(text);
        assert_eq!(found.len(), 1, "text {text:?}");
        assert_eq!(found[0].0, CommandKind::Set);
        assert_eq!(found[0].1, "好感度");
        assert_eq!(found[0].2, vec!["50".to_string(), "60".to_string()]);
    }
}

#[test]
fn alias_matrix() {
    let found = commands(
        "
      _.remove('a');//删除
      _.unset('b');//删除
      _.assign('c', 'key', 'value');//插入
      _.insert('d', 1);
    ",
    );
    let kinds: Vec<CommandKind> = found.iter().map(|c| c.0).collect();
    assert_eq!(
        kinds,
        vec![CommandKind::Delete, CommandKind::Delete, CommandKind::Insert, CommandKind::Insert]
    );
    assert_eq!(found[2].2, vec!["'key'".to_string(), "'value'".to_string()]);
}

#[test]
fn arity_matrix() {
    let cases = [
        ("_.set('a');", 0),
        ("_.set('a', 1, 2, 3);", 1),
        ("_.add('a');", 1),
        ("_.add('a', 1, 2);", 0),
        ("_.delete('a', 'b');", 1),
        ("_.delete('a', 'b', 'c');", 0),
        ("_.insert('a');", 0),
        ("_.insert('a', 'k', 'v', 'x');", 0),
        ("_.frobnicate('a', 1);", 0),
    ];
    for (text, expected) in cases {
        assert_eq!(commands(text).len(), expected, "text {text:?}");
    }
}
