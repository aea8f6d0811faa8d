use crate::sql::ast::{binary_op, sql_function, string_literal, BinaryOperator, Expr, Ident};

use super::{each_value_column, is_plain_key, operand, Variant};

/// Postgres `jsonb`, using the `#>` and `#>>` path operators.
pub struct Postgres;

fn json_path(path: &[String]) -> Expr {
    let keys: Vec<String> = path
        .iter()
        .map(|key| {
            if is_plain_key(key) {
                key.to_owned()
            } else {
                format!("\"{}\"", key.replace('\\', "\\\\").replace('"', "\\\""))
            }
        })
        .collect();
    string_literal(format!("{{{}}}", keys.join(",")))
}

fn cast(value: Expr, data_type: &str) -> Expr {
    Expr::Cast {
        expr: Box::new(value),
        data_type: data_type.to_owned(),
    }
}

/// `jsonb_array_elements` and `jsonb_array_length` raise on scalars, only hand them arrays.
fn only_arrays(array: Expr) -> Expr {
    // built arrays need no guard
    if matches!(&array, Expr::Function(function) if function.name.to_string() == "jsonb_build_array")
    {
        return array;
    }
    Expr::Case {
        conditions: vec![(
            binary_op(
                sql_function("jsonb_typeof", vec![array.clone()]),
                BinaryOperator::Eq,
                string_literal("array"),
            ),
            array,
        )],
        else_result: None,
    }
}

impl Variant for Postgres {
    fn json_object(&self, pairs: Vec<(String, Expr)>) -> Expr {
        let args = pairs
            .into_iter()
            .flat_map(|(key, value)| [string_literal(key), value])
            .collect();
        sql_function("jsonb_build_object", args)
    }
    fn json_array(&self, items: Vec<Expr>) -> Expr {
        sql_function("jsonb_build_array", items)
    }
    fn json_array_aggregate(&self, value: Expr) -> Expr {
        sql_function("jsonb_agg", vec![value])
    }
    fn json_each(&self, array: Expr) -> Expr {
        sql_function("jsonb_array_elements", vec![only_arrays(array)])
    }
    fn json_each_value(&self, alias: &Ident) -> Expr {
        each_value_column(alias)
    }
    fn json_extract(&self, source: Expr, path: &[String]) -> Expr {
        binary_op(operand(source), BinaryOperator::HashArrow, json_path(path))
    }
    fn json_extract_text(&self, source: Expr, path: &[String]) -> Expr {
        binary_op(operand(source), BinaryOperator::HashLongArrow, json_path(path))
    }
    fn json_cast(&self, value: Expr) -> Expr {
        cast(value, "jsonb")
    }
    fn json_quote(&self, value: &str) -> Expr {
        sql_function("to_jsonb", vec![cast(string_literal(value), "text")])
    }
    fn json_array_length(&self, array: Expr) -> Expr {
        sql_function("jsonb_array_length", vec![only_arrays(array)])
    }
    fn cast_to_integer(&self, value: Expr) -> Expr {
        cast(value, "integer")
    }
    fn cast_to_datetime(&self, value: Expr) -> Expr {
        cast(value, "timestamptz")
    }
    fn unbounded_limit(&self) -> Expr {
        Expr::Identifier(Ident::unquoted("ALL"))
    }
}
