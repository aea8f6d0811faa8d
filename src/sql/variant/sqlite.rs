use crate::sql::ast::{binary_op, sql_function, string_literal, BinaryOperator, Expr, Ident, Value};

use super::{is_plain_key, operand, Variant};

/// Sqlite json1, using the `->` and `->>` operators (sqlite 3.38+).
pub struct Sqlite;

fn json_path(path: &[String]) -> Expr {
    let mut rendered = String::from("$");
    for key in path {
        if is_plain_key(key) {
            rendered.push('.');
            rendered.push_str(key);
        } else {
            rendered.push_str(&format!(".\"{}\"", key.replace('"', "\\\"")));
        }
    }
    string_literal(rendered)
}

impl Variant for Sqlite {
    fn json_object(&self, pairs: Vec<(String, Expr)>) -> Expr {
        let args = pairs
            .into_iter()
            .flat_map(|(key, value)| [string_literal(key), value])
            .collect();
        sql_function("JSON_OBJECT", args)
    }
    fn json_array(&self, items: Vec<Expr>) -> Expr {
        sql_function("JSON_ARRAY", items)
    }
    fn json_array_aggregate(&self, value: Expr) -> Expr {
        sql_function("JSON_GROUP_ARRAY", vec![value])
    }
    fn json_each(&self, array: Expr) -> Expr {
        sql_function("JSON_EACH", vec![array])
    }
    fn json_each_value(&self, alias: &Ident) -> Expr {
        // `value` loses the json form of primitives, re-extract the element from the exploded text
        binary_op(
            Expr::CompoundIdentifier(vec![alias.clone(), Ident::unquoted("json")]),
            BinaryOperator::Arrow,
            Expr::CompoundIdentifier(vec![alias.clone(), Ident::unquoted("fullkey")]),
        )
    }
    fn json_extract(&self, source: Expr, path: &[String]) -> Expr {
        binary_op(operand(source), BinaryOperator::Arrow, json_path(path))
    }
    fn json_extract_text(&self, source: Expr, path: &[String]) -> Expr {
        binary_op(operand(source), BinaryOperator::LongArrow, json_path(path))
    }
    fn json_cast(&self, value: Expr) -> Expr {
        sql_function("JSON", vec![value])
    }
    fn json_quote(&self, value: &str) -> Expr {
        sql_function("JSON_QUOTE", vec![string_literal(value)])
    }
    fn json_array_length(&self, array: Expr) -> Expr {
        sql_function("JSON_ARRAY_LENGTH", vec![array])
    }
    fn cast_to_integer(&self, value: Expr) -> Expr {
        Expr::Cast {
            expr: Box::new(value),
            data_type: "INTEGER".to_owned(),
        }
    }
    fn cast_to_datetime(&self, value: Expr) -> Expr {
        sql_function("datetime", vec![value])
    }
    fn unbounded_limit(&self) -> Expr {
        Expr::Value(Value::Number("-1".to_owned()))
    }
}
