use super::ast::{
    ComparisonOperator, Direction, Expression, LambdaBody, Literal, OrderByItem, QueryItem,
    QueryOption, QueryOptions,
};

peg::parser! {
    pub grammar query_string() for str {
        rule _() = quiet!{ [' ' | '\t' | '\r' | '\n']* }
        rule __() = quiet!{ [' ' | '\t' | '\r' | '\n']+ }

        rule ident_char() = ['a'..='z' | 'A'..='Z' | '0'..='9' | '_']
        rule digit() = ['0'..='9']

        rule kw(word: &'static str)
            = input:$([_]*<{word.len()}>) !ident_char() {?
                if input == word { Ok(()) } else { Err(word) }
            }

        rule segment() -> String
            = quiet!{ s:$("$it" !ident_char() / ['a'..='z' | 'A'..='Z' | '_'] ident_char()*) { s.to_owned() } }
            / expected!("identifier")

        rule path() -> Vec<String> = segment() ++ "/"

        rule string() -> String
            = "'" chars:("''" { '\'' } / [^'\''])* "'" { chars.into_iter().collect() }

        rule datetime() -> String
            = s:$(
                digit()*<4> "-" digit()*<2> "-" digit()*<2> "T" digit()*<2> ":" digit()*<2>
                (":" digit()*<2> ("." digit()+)?)?
                ("Z" / ['+' | '-'] digit()*<2> ":" digit()*<2>)?
            ) { s.to_owned() }

        rule float() -> String
            = s:$("-"? digit()+ "." digit()+ (['e' | 'E'] ['+' | '-']? digit()+)?) !ident_char() { s.to_owned() }

        rule integer() -> i64
            = s:$("-"? digit()+) !ident_char() {? s.parse().or(Err("integer")) }

        rule literal() -> Literal
            = s:string() { Literal::String(s) }
            / d:datetime() { Literal::DateTime(d) }
            / f:float() { Literal::Float(f) }
            / i:integer() { Literal::Integer(i) }
            / kw("true") { Literal::Boolean(true) }
            / kw("false") { Literal::Boolean(false) }
            / kw("null") { Literal::Null }

        rule comparison_operator() -> ComparisonOperator
            = op:$("eq" / "ne" / "gt" / "ge" / "lt" / "le") !ident_char() {?
                op.parse().or(Err("comparison operator"))
            }

        rule expression() -> Expression = precedence!{
            l:(@) __ kw("or") _ r:@ { Expression::Or(Box::new(l), Box::new(r)) }
            --
            l:(@) __ kw("and") _ r:@ { Expression::And(Box::new(l), Box::new(r)) }
            --
            l:(@) __ operator:comparison_operator() _ r:@ {
                Expression::Comparison { left: Box::new(l), operator, right: Box::new(r) }
            }
            --
            kw("not") _ e:@ { Expression::Not(Box::new(e)) }
            --
            e:primary() { e }
        }

        rule primary() -> Expression
            = "(" _ e:expression() _ ")" { e }
            / l:literal() { Expression::Literal(l) }
            / lambda()
            / function()
            / p:path() { Expression::Path(p) }

        rule lambda() -> Expression
            = collection:(s:segment() "/" { s })+ operator:segment() _ "(" _ body:lambda_body()? _ ")" {
                Expression::Lambda { collection, operator, body }
            }

        rule lambda_body() -> LambdaBody
            = variable:segment() _ ":" _ predicate:expression() {
                LambdaBody { variable, predicate: Box::new(predicate) }
            }

        rule function() -> Expression
            = !(kw("not") / kw("and") / kw("or")) name:segment() _ "(" _ args:(expression() ** (_ "," _)) _ ")" {
                Expression::Function { name, args }
            }

        pub rule filter() -> Expression = _ e:expression() _ { e }

        rule direction() -> Direction
            = kw("asc") { Direction::Asc }
            / kw("desc") { Direction::Desc }

        rule orderby_item() -> OrderByItem
            = p:path() d:(__ d:direction() { d })? {
                OrderByItem { path: p, direction: d.unwrap_or_default() }
            }

        rule orderby_items() -> Vec<OrderByItem> = orderby_item() ++ (_ "," _)

        pub rule orderby() -> Vec<OrderByItem> = _ items:orderby_items() _ { items }

        rule query_option() -> QueryOption
            = "$filter=" _ e:expression() { QueryOption::Filter(e) }
            / "$orderby=" _ o:orderby_items() { QueryOption::OrderBy(o) }
            / "$select=" _ i:items() { QueryOption::Select(i) }
            / "$expand=" _ i:items() { QueryOption::Expand(i) }

        rule item() -> QueryItem
            = p:path() _ o:("(" _ o:(query_option() ** (_ ";" _)) _ ")" { o })? {?
                QueryOptions::from_options(o.unwrap_or_default())
                    .map(|options| QueryItem { path: p, options })
            }

        rule items() -> Vec<QueryItem> = item() ++ (_ "," _)

        // a `$select` or `$expand` value
        pub rule query_items() -> Vec<QueryItem> = _ i:items() _ { i }
    }
}

#[cfg(test)]
mod tests {
    use super::query_string;
    use crate::odata::ast::*;

    fn path(p: &str) -> Vec<String> {
        p.split('/').map(str::to_owned).collect()
    }

    fn comparison(left: Expression, operator: ComparisonOperator, right: Expression) -> Expression {
        Expression::Comparison {
            left: Box::new(left),
            operator,
            right: Box::new(right),
        }
    }

    #[test]
    fn parses_comparisons_and_literals() {
        assert_eq!(
            query_string::filter("ModelName eq 'model1'").unwrap(),
            comparison(
                Expression::Path(path("ModelName")),
                ComparisonOperator::Eq,
                Expression::Literal(Literal::String("model1".to_owned()))
            )
        );
        assert_eq!(
            query_string::filter("Seats gt 2").unwrap(),
            comparison(
                Expression::Path(path("Seats")),
                ComparisonOperator::Gt,
                Expression::Literal(Literal::Integer(2))
            )
        );
        assert_eq!(
            query_string::filter("BuiltOn ge 2021-03-21T08:50:00Z").unwrap(),
            comparison(
                Expression::Path(path("BuiltOn")),
                ComparisonOperator::Ge,
                Expression::Literal(Literal::DateTime("2021-03-21T08:50:00Z".to_owned()))
            )
        );
        assert_eq!(
            query_string::filter("Name eq 'it''s'").unwrap(),
            comparison(
                Expression::Path(path("Name")),
                ComparisonOperator::Eq,
                Expression::Literal(Literal::String("it's".to_owned()))
            )
        );
        assert_eq!(
            query_string::filter("nullable ne null").unwrap(),
            comparison(
                Expression::Path(path("nullable")),
                ComparisonOperator::Ne,
                Expression::Literal(Literal::Null)
            )
        );
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let parsed = query_string::filter("A eq 1 or B eq 2 and C eq 3").unwrap();
        let Expression::Or(left, right) = parsed else {
            panic!("expected or at the root");
        };
        assert!(matches!(*left, Expression::Comparison { .. }));
        assert!(matches!(*right, Expression::And(_, _)));
    }

    #[test]
    fn parses_not_functions_and_parentheses() {
        let parsed = query_string::filter("not (contains(Name, 'blue') or Seats lt 4)").unwrap();
        let Expression::Not(inner) = parsed else {
            panic!("expected not");
        };
        let Expression::Or(left, _) = *inner else {
            panic!("expected or inside not");
        };
        assert_eq!(
            *left,
            Expression::Function {
                name: "contains".to_owned(),
                args: vec![
                    Expression::Path(path("Name")),
                    Expression::Literal(Literal::String("blue".to_owned()))
                ],
            }
        );
    }

    #[test]
    fn parses_lambdas() {
        let parsed =
            query_string::filter("Engine/Options/SubOptions/any(s: s/Name eq 'x')").unwrap();
        let Expression::Lambda {
            collection,
            operator,
            body: Some(body),
        } = parsed
        else {
            panic!("expected lambda");
        };
        assert_eq!(collection, path("Engine/Options/SubOptions"));
        assert_eq!(operator, "any");
        assert_eq!(body.variable, "s");
        assert_eq!(
            *body.predicate,
            comparison(
                Expression::Path(path("s/Name")),
                ComparisonOperator::Eq,
                Expression::Literal(Literal::String("x".to_owned()))
            )
        );

        assert_eq!(
            query_string::filter("Manufacturers/any()").unwrap(),
            Expression::Lambda {
                collection: path("Manufacturers"),
                operator: "any".to_owned(),
                body: None,
            }
        );
    }

    #[test]
    fn parses_orderby() {
        assert_eq!(
            query_string::orderby("Engine/Options/Supercharger asc, ModelName desc, Seats")
                .unwrap(),
            vec![
                OrderByItem {
                    path: path("Engine/Options/Supercharger"),
                    direction: Direction::Asc
                },
                OrderByItem {
                    path: path("ModelName"),
                    direction: Direction::Desc
                },
                OrderByItem {
                    path: path("Seats"),
                    direction: Direction::Asc
                },
            ]
        );
    }

    #[test]
    fn parses_items_with_nested_options() {
        let items = query_string::query_items(
            "ModelName,Engine/Options/SubOptions($select=Name;$filter=contains(Name, 'blue'))",
        )
        .unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].path, path("ModelName"));
        assert_eq!(items[0].options, QueryOptions::default());

        let options = &items[1].options;
        assert_eq!(items[1].path, path("Engine/Options/SubOptions"));
        assert!(options.filter.is_some());
        assert_eq!(
            options.select.as_deref().map(|s| s[0].path.clone()),
            Some(path("Name"))
        );

        let items =
            query_string::query_items("Manufacturers($filter=Name eq 'manu2';$orderby=Name desc)")
                .unwrap();
        assert_eq!(
            items[0].options.orderby,
            Some(vec![OrderByItem {
                path: path("Name"),
                direction: Direction::Desc
            }])
        );
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(query_string::filter("ModelName eq").is_err());
        assert!(query_string::filter("ModelName eq 'open").is_err());
        assert!(query_string::query_items("Engine(").is_err());
        assert!(query_string::query_items("Engine($filter=A eq 1;$filter=B eq 2)").is_err());
        assert!(query_string::orderby("ModelName sideways").is_err());
    }
}
