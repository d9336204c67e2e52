//! Integration tests for the filter compiler
//!
//! Tests end-to-end behavior from filter text through to trees, wire JSON
//! and evaluation.

use grcfilter::query::{
    build_query, from_wire, matches, matches_with, to_wire, Expression, FilterIdsType, Literal,
    Operator, Record,
};
use grcfilter::{parse, FilterConfig, FilterError};
use std::collections::HashMap;
use std::io::Write;

fn eq(attr: &str, value: &str) -> Expression {
    Expression::comparison(attr, Operator::Equal, Literal::classify(value))
}

fn parse_ok(input: &str) -> Expression {
    parse(input).unwrap().unwrap()
}

#[test]
fn test_parse_is_idempotent() {
    let input = r#"(title ~ "access review" OR #Program,1,2#) AND NOT status = Draft"#;
    assert_eq!(parse(input).unwrap(), parse(input).unwrap());
}

#[test]
fn test_and_binds_tighter_than_or() {
    assert_eq!(
        parse_ok("a = 1 OR b = 2 AND c = 3"),
        Expression::or(eq("a", "1"), Expression::and(eq("b", "2"), eq("c", "3")))
    );
}

#[test]
fn test_and_is_left_associative() {
    assert_eq!(
        parse_ok("a=1 AND b=2 AND c=3"),
        Expression::and(Expression::and(eq("a", "1"), eq("b", "2")), eq("c", "3"))
    );
}

#[test]
fn test_negation() {
    assert_eq!(parse_ok("NOT a = 1"), Expression::not(eq("a", "1")));
}

#[test]
fn test_quoted_literal_unescaping() {
    assert_eq!(
        parse_ok(r#"title = "hello \"world\"""#),
        Expression::comparison("title", Operator::Equal, Literal::string("hello \"world\""))
    );
}

#[test]
fn test_bare_text_search() {
    assert_eq!(parse_ok("foo bar"), Expression::text_search("foo bar"));
}

#[test]
fn test_parentheses_override_precedence() {
    let grouped = parse_ok("(a=1 OR b=2) AND c=3");
    assert_eq!(
        grouped,
        Expression::and(Expression::or(eq("a", "1"), eq("b", "2")), eq("c", "3"))
    );
    assert_ne!(grouped, parse_ok("a=1 OR b=2 AND c=3"));
}

#[test]
fn test_error_is_at_or_after_unmatched_paren() {
    let input = "a = (1 AND";
    let err = parse(input).unwrap_err();
    let paren_column = input.find('(').unwrap() + 1;
    assert!(err.column >= paren_column);
    assert!(!err.expected.is_empty());
}

#[test]
fn test_unterminated_string_is_an_error() {
    let err = parse(r#"title = "open"#).unwrap_err();
    assert_eq!(err.column, 14);
    assert_eq!(err.found, "end of input");
}

#[test]
fn test_empty_input() {
    assert_eq!(parse("").unwrap(), None);
}

#[test]
fn test_keywords_are_case_insensitive() {
    assert_eq!(parse_ok("a=1 and b=2 oR not c=3"), parse_ok("a=1 AND b=2 OR NOT c=3"));
}

#[test]
fn test_attribute_and_literal_case_is_kept() {
    assert_eq!(parse_ok("Title = Foo"), eq("Title", "Foo"));
}

#[test]
fn test_dotted_attribute_and_literal_kinds() {
    let expr = parse_ok("person.email = a@b.com AND due < 2024-05-01 AND score >= 7.5");
    assert_eq!(expr.attributes(), vec!["person.email", "due", "score"]);

    let wire = to_wire(&expr);
    assert_eq!(wire["left"]["left"]["value_type"], "word");
    assert_eq!(wire["left"]["right"]["value_type"], "date");
    assert_eq!(wire["right"]["value_type"], "number");
}

#[test]
fn test_unknown_attributes_are_not_errors() {
    assert!(parse("no_such_attribute.anywhere = 1").is_ok());
}

#[test]
fn test_display_reparses_to_same_tree() {
    let inputs = [
        "a = 1 OR b = 2 AND c = 3",
        r#"NOT ("due date" <= 01/31/2025 OR owner != "Jane Doe")"#,
        "quarterly review AND !~ legacy",
        "#Program,12,PROG-7# OR title ~ and_more",
        r#"note = "say \"hi\"""#,
        r##"#Program,"a,b",PROG-7# AND lang = C#"##,
        "C# developer",
    ];
    for input in inputs {
        let expr = parse_ok(input);
        assert_eq!(parse_ok(&expr.to_string()), expr, "rendered from {}", input);
    }
}

#[test]
fn test_display_reparses_built_trees() {
    let trees = [
        Expression::comparison("n", Operator::Equal, Literal::from_kind("word", "42").unwrap()),
        Expression::relevant_with_type(
            "Program",
            vec!["a,b".to_string(), " padded ".to_string()],
            FilterIdsType::Slug,
        )
        .unwrap(),
    ];
    for expr in trees {
        assert_eq!(parse(&expr.to_string()).unwrap(), Some(expr.clone()), "{}", expr);
    }
}

#[test]
fn test_deep_nesting_is_a_parse_error() {
    let err = parse(&"(".repeat(4096)).unwrap_err();
    assert_eq!(err.column, 129);

    let input = format!("{}a = 1{}", "(".repeat(400), ")".repeat(400));
    assert!(parse(&input).is_err());

    let input = format!("{}a = 1{}", "(".repeat(100), ")".repeat(100));
    assert_eq!(parse_ok(&input), eq("a", "1"));
}

#[test]
fn test_wire_round_trip_for_every_node_kind() {
    let expr = parse_ok(r#"(NOT a != "x" OR #Audit,4#) AND ~ text AND !~ other"#);
    assert_eq!(from_wire(&to_wire(&expr)).unwrap(), Some(expr));
}

#[test]
fn test_parse_from_many_threads() {
    let handles: Vec<_> = (0..8)
        .map(|i| {
            std::thread::spawn(move || {
                let input = format!("a = {} AND b ~ x", i);
                parse(&input).unwrap().unwrap()
            })
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        let expr = handle.join().unwrap();
        assert_eq!(expr.children()[0], &eq("a", &i.to_string()));
    }
}

struct Control {
    title: &'static str,
    status: &'static str,
    owners: Vec<&'static str>,
    programs: Vec<&'static str>,
}

impl Record for Control {
    fn attribute(&self, path: &str) -> Vec<String> {
        match path {
            "title" => vec![self.title.to_string()],
            "status" => vec![self.status.to_string()],
            "owner.email" => self.owners.iter().map(|o| o.to_string()).collect(),
            _ => vec![],
        }
    }

    fn searchable_text(&self) -> Vec<String> {
        vec![self.title.to_string()]
    }

    fn is_relevant_to(&self, object_name: &str, ids: &[String]) -> bool {
        object_name == "Program" && ids.iter().any(|id| self.programs.contains(&id.as_str()))
    }
}

#[test]
fn test_evaluate_custom_record() {
    let controls = [
        Control {
            title: "Access review",
            status: "Active",
            owners: vec!["jane@example.com"],
            programs: vec!["1"],
        },
        Control {
            title: "Backup policy",
            status: "Draft",
            owners: vec!["bob@example.com", "ann@example.com"],
            programs: vec!["2"],
        },
    ];

    let filter = parse(r#"#Program,1,2# AND status != draft AND owner.email ~ "@example""#).unwrap();
    let titles: Vec<&str> = controls
        .iter()
        .filter(|c| matches(filter.as_ref(), *c))
        .map(|c| c.title)
        .collect();
    assert_eq!(titles, vec!["Access review"]);

    let filter = parse("!~ access").unwrap();
    assert!(!matches(filter.as_ref(), &controls[0]));
    assert!(matches(filter.as_ref(), &controls[1]));
}

#[test]
fn test_evaluate_map_record() {
    let mut record: HashMap<String, Vec<String>> = HashMap::new();
    record.insert("title".to_string(), vec!["Vendor risk".to_string()]);
    record.insert("__text__".to_string(), vec!["Vendor risk".to_string()]);

    assert!(parse_ok("vendor AND title = \"VENDOR RISK\"").evaluate(&record));
    assert!(!parse_ok("title = vendor").evaluate(&record));
}

#[test]
fn test_search_fields_from_config_file() {
    let mut record: HashMap<String, Vec<String>> = HashMap::new();
    record.insert("notes".to_string(), vec!["Reviewed by SOC team".to_string()]);
    record.insert("owner".to_string(), vec!["jane@example.com".to_string()]);
    let filter = parse("jane").unwrap();

    assert!(!matches_with(filter.as_ref(), &record, &FilterConfig::default()));
    assert!(matches_with(parse("soc").unwrap().as_ref(), &record, &FilterConfig::default()));

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"default_search_fields": ["owner"]}}"#).unwrap();
    let config = FilterConfig::from_file(file.path()).unwrap();
    assert!(matches_with(filter.as_ref(), &record, &config));
}

#[test]
fn test_build_query_with_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"default_limit": 10, "max_query_length": 64}}"#).unwrap();
    let config = FilterConfig::from_file(file.path()).unwrap();

    let request = build_query("Assessment", "status = Completed", &config).unwrap();
    let body = serde_json::to_value(&request).unwrap();
    assert_eq!(body["object_name"], "Assessment");
    assert_eq!(body["limit"], serde_json::json!([0, 10]));

    let long = "x".repeat(65);
    let err = build_query("Assessment", &long, &config).unwrap_err();
    assert!(matches!(err, FilterError::Parse(ref e) if e.column == 65));
}
