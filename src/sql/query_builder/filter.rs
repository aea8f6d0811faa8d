use crate::{
    odata::ast::{ComparisonOperator, Direction, Expression, LambdaBody, Literal, OrderByItem, QueryOptions},
    schema::FieldMeta,
    sql::ast::{
        binary_op, string_literal, BinaryOperator, Expr, Ident, OrderByExpr, Query, SelectItem,
        TableFactor, UnaryOperator, Value,
    },
};

use super::{aliasing, select_tree::SelectNode, QueryBuilder, QueryBuilderError, MAX_DEPTH};

/// What unprefixed paths in a filter resolve against.
#[derive(Debug, Clone)]
pub struct Scope {
    pub field: FieldMeta,
    pub source: Expr,
    pub ident: String,
}

/// Scopes visible while compiling one filter: the filtered element itself plus the
/// variables bound by enclosing lambdas, innermost last.
struct Environment {
    base: Scope,
    bound: Vec<(String, Scope)>,
}

impl Environment {
    fn new(base: Scope) -> Self {
        Self {
            base,
            bound: vec![],
        }
    }
    fn current(&self) -> &Scope {
        self.bound
            .last()
            .map(|(_, scope)| scope)
            .unwrap_or(&self.base)
    }
    /// Picks the scope a path refers to and strips the variable naming it, if any.
    fn resolve<'p>(&self, path: &'p [String]) -> (&Scope, &'p [String]) {
        match path.split_first() {
            Some((head, rest)) if head == "$it" => (&self.base, rest),
            Some((head, rest)) => match self.bound.iter().rev().find(|(name, _)| name == head) {
                Some((_, scope)) => (scope, rest),
                None => (self.current(), path),
            },
            None => (self.current(), path),
        }
    }
}

fn sql_operator(operator: ComparisonOperator) -> BinaryOperator {
    match operator {
        ComparisonOperator::Eq => BinaryOperator::Eq,
        ComparisonOperator::Ne => BinaryOperator::NotEq,
        ComparisonOperator::Gt => BinaryOperator::Gt,
        ComparisonOperator::Ge => BinaryOperator::GtEq,
        ComparisonOperator::Lt => BinaryOperator::Lt,
        ComparisonOperator::Le => BinaryOperator::LtEq,
    }
}

fn nested(expr: Expr) -> Expr {
    Expr::Nested(Box::new(expr))
}

fn not(expr: Expr) -> Expr {
    Expr::UnaryOp {
        op: UnaryOperator::Not,
        expr: Box::new(nested(expr)),
    }
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn is_null(expression: &Expression) -> bool {
    matches!(expression, Expression::Literal(Literal::Null))
}

impl<'a> QueryBuilder<'a> {
    pub(super) fn filter_expression(
        &self,
        scope: &Scope,
        filter: &Expression,
    ) -> Result<Expr, QueryBuilderError> {
        let mut environment = Environment::new(scope.clone());
        self.predicate(&mut environment, filter, 0)
    }

    pub(super) fn order_by_expressions(
        &self,
        scope: &Scope,
        orderby: &[OrderByItem],
    ) -> Result<Vec<OrderByExpr>, QueryBuilderError> {
        let environment = Environment::new(scope.clone());
        orderby
            .iter()
            .map(|item| {
                let (scope, path) = environment.resolve(&item.path);
                self.path_meta(scope, path)?;
                let source = self.path_source(scope, path)?;
                Ok(OrderByExpr {
                    expr: self.variant.json_extract_text(source, path),
                    asc: Some(item.direction == Direction::Asc),
                })
            })
            .collect()
    }

    fn predicate(
        &self,
        environment: &mut Environment,
        expression: &Expression,
        depth: usize,
    ) -> Result<Expr, QueryBuilderError> {
        if depth > MAX_DEPTH {
            return Err(QueryBuilderError::MaxDepthExceeded(MAX_DEPTH));
        }
        match expression {
            Expression::Or(left, right) => Ok(nested(binary_op(
                self.predicate(environment, left, depth + 1)?,
                BinaryOperator::Or,
                self.predicate(environment, right, depth + 1)?,
            ))),
            Expression::And(left, right) => Ok(nested(binary_op(
                self.predicate(environment, left, depth + 1)?,
                BinaryOperator::And,
                self.predicate(environment, right, depth + 1)?,
            ))),
            Expression::Not(inner) => Ok(not(self.predicate(environment, inner, depth + 1)?)),
            Expression::Comparison {
                left,
                operator,
                right,
            } => self.comparison(environment, left, *operator, right, depth),
            Expression::Function { name, args } => self.function(environment, name, args),
            Expression::Lambda {
                collection,
                operator,
                body,
            } => self.lambda(environment, collection, operator, body.as_ref(), depth),
            Expression::Path(path) => {
                let (scope, path) = environment.resolve(path);
                match self.path_meta(scope, path)? {
                    FieldMeta::Boolean => Ok(nested(binary_op(
                        self.path_value(scope, path)?,
                        BinaryOperator::Eq,
                        string_literal("true"),
                    ))),
                    _ => Err(QueryBuilderError::Unsupported(format!(
                        "non boolean property {} used as a condition",
                        path.join("/")
                    ))),
                }
            }
            Expression::Literal(Literal::Boolean(value)) => Ok(Expr::Value(Value::Boolean(*value))),
            Expression::Literal(literal) => Err(QueryBuilderError::Unsupported(format!(
                "literal {:?} used as a condition",
                literal
            ))),
        }
    }

    fn comparison(
        &self,
        environment: &mut Environment,
        left: &Expression,
        operator: ComparisonOperator,
        right: &Expression,
        depth: usize,
    ) -> Result<Expr, QueryBuilderError> {
        if is_null(left) || is_null(right) {
            let other = if is_null(left) { right } else { left };
            // json null and a missing key must both count as null
            let value = match other {
                Expression::Path(path) => {
                    let (scope, path) = environment.resolve(path);
                    self.path_meta(scope, path)?;
                    self.variant
                        .json_extract_text(self.path_source(scope, path)?, path)
                }
                other => self.operand(environment, other, depth)?,
            };
            return match operator {
                ComparisonOperator::Eq => Ok(nested(Expr::IsNull(Box::new(value)))),
                ComparisonOperator::Ne => Ok(nested(Expr::IsNotNull(Box::new(value)))),
                operator => Err(QueryBuilderError::Unsupported(format!(
                    "operator {} against null",
                    operator
                ))),
            };
        }

        Ok(nested(binary_op(
            self.operand(environment, left, depth)?,
            sql_operator(operator),
            self.operand(environment, right, depth)?,
        )))
    }

    fn operand(
        &self,
        environment: &mut Environment,
        expression: &Expression,
        depth: usize,
    ) -> Result<Expr, QueryBuilderError> {
        match expression {
            Expression::Path(path) => {
                let (scope, path) = environment.resolve(path);
                self.path_value(scope, path)
            }
            Expression::Literal(literal) => Ok(self.literal(literal)),
            Expression::Function { name, args } => self.function(environment, name, args),
            expression => self.predicate(environment, expression, depth + 1),
        }
    }

    fn literal(&self, literal: &Literal) -> Expr {
        match literal {
            Literal::String(value) => self.variant.json_quote(value),
            Literal::Integer(value) => self
                .variant
                .cast_to_integer(Expr::Value(Value::Number(value.to_string()))),
            Literal::Float(value) => self
                .variant
                .cast_to_integer(Expr::Value(Value::Number(value.to_owned()))),
            Literal::Boolean(value) => string_literal(value.to_string()),
            Literal::DateTime(value) => self.variant.cast_to_datetime(string_literal(value)),
            Literal::Null => Expr::Value(Value::Null),
        }
    }

    /// A property lowered according to its type, ready for comparison.
    fn path_value(&self, scope: &Scope, path: &[String]) -> Result<Expr, QueryBuilderError> {
        let field = self.path_meta(scope, path)?;
        let source = self.path_source(scope, path)?;
        Ok(match field {
            FieldMeta::String | FieldMeta::Boolean => self.variant.json_extract(source, path),
            FieldMeta::Number => self
                .variant
                .cast_to_integer(self.variant.json_extract_text(source, path)),
            FieldMeta::DateTime => self
                .variant
                .cast_to_datetime(self.variant.json_extract_text(source, path)),
            _ => self.variant.json_extract_text(source, path),
        })
    }

    fn path_meta(&self, scope: &Scope, path: &[String]) -> Result<FieldMeta, QueryBuilderError> {
        let metas = self.graph.field_meta_from_query_path(&scope.field, path)?;
        metas
            .first()
            .map(|meta| (*meta).to_owned())
            .ok_or_else(|| QueryBuilderError::Internal(format!("no field at {}", path.join("/"))))
    }

    /// The expression `path` should be extracted from.
    ///
    /// Usually the scope's own source. When the path crosses a relationship, a projection
    /// expanding just what the path needs is built instead, whatever the request selected.
    fn path_source(&self, scope: &Scope, path: &[String]) -> Result<Expr, QueryBuilderError> {
        let expands = self.expand_items_to_reach_path(&scope.field, path)?;
        if expands.is_empty() {
            return Ok(scope.source.clone());
        }

        let mut node = SelectNode::default();
        node.insert(path, &QueryOptions::default(), false)?;
        for item in &expands {
            if item.is_empty() {
                node.expand = true;
            } else {
                node.insert(item, &QueryOptions::default(), true)?;
            }
        }
        self.project(
            &scope.field,
            &aliasing::filter_alias(&scope.ident),
            scope.source.clone(),
            &[],
            Some(&node),
            0,
        )
    }

    /// Relationship paths, relative to `field`, that must be expanded to reach `path`.
    /// An empty item means `field` itself is the relationship.
    pub(super) fn expand_items_to_reach_path(
        &self,
        field: &FieldMeta,
        path: &[String],
    ) -> Result<Vec<Vec<String>>, QueryBuilderError> {
        let mut items = vec![];
        self.collect_expands(field, path, &mut vec![], &mut items, 0)?;
        Ok(items)
    }

    fn collect_expands(
        &self,
        field: &FieldMeta,
        path: &[String],
        prefix: &mut Vec<String>,
        items: &mut Vec<Vec<String>>,
        depth: usize,
    ) -> Result<(), QueryBuilderError> {
        if depth > MAX_DEPTH {
            return Err(QueryBuilderError::MaxDepthExceeded(MAX_DEPTH));
        }
        let Some((segment, rest)) = path.split_first() else {
            return Ok(());
        };
        let schemas = match field {
            FieldMeta::Collection { items: item } => {
                return self.collect_expands(item, path, prefix, items, depth + 1)
            }
            FieldMeta::Relationship { schema, .. } => {
                if !items.contains(prefix) {
                    items.push(prefix.clone());
                }
                std::slice::from_ref(schema)
            }
            FieldMeta::Complex { schemas, .. } => schemas.as_slice(),
            _ => return Err(QueryBuilderError::PrimitiveSubPath(path.join("/"))),
        };

        for name in schemas {
            let Some(field) = self.graph.schema(name)?.fields.get(segment) else {
                continue;
            };
            // candidates that can not reach the rest of the path contribute nothing
            if self.graph.field_meta_from_query_path(field, rest).is_err() {
                continue;
            }
            prefix.push(segment.to_owned());
            let collected = self.collect_expands(field, rest, prefix, items, depth + 1);
            prefix.pop();
            collected?;
        }
        Ok(())
    }

    fn function(
        &self,
        environment: &mut Environment,
        name: &str,
        args: &[Expression],
    ) -> Result<Expr, QueryBuilderError> {
        match name {
            "contains" | "startswith" | "endswith" => {
                let [Expression::Path(path), Expression::Literal(Literal::String(value))] = args
                else {
                    return Err(QueryBuilderError::InvalidFunctionArgument(format!(
                        "{name} expects a property path and a string literal"
                    )));
                };
                let (scope, path) = environment.resolve(path);
                self.path_meta(scope, path)?;
                let text = self
                    .variant
                    .json_extract_text(self.path_source(scope, path)?, path);
                let value = escape_like(value);
                let pattern = match name {
                    "contains" => format!("%{value}%"),
                    "startswith" => format!("{value}%"),
                    _ => format!("%{value}"),
                };
                Ok(Expr::Like {
                    expr: Box::new(text),
                    pattern: Box::new(string_literal(pattern)),
                    escape: Some('\\'),
                })
            }
            "length" => {
                let [Expression::Path(path)] = args else {
                    return Err(QueryBuilderError::InvalidFunctionArgument(
                        "length expects a single property path".to_owned(),
                    ));
                };
                let (scope, path) = environment.resolve(path);
                let FieldMeta::Collection { .. } = self.path_meta(scope, path)? else {
                    return Err(QueryBuilderError::InvalidFunctionArgument(format!(
                        "length requires a collection, {} is not one",
                        path.join("/")
                    )));
                };
                let source = self.path_source(scope, path)?;
                Ok(self
                    .variant
                    .json_array_length(self.variant.json_extract(source, path)))
            }
            name => Err(QueryBuilderError::Unsupported(format!("function {name}"))),
        }
    }

    /// `any` holds when some element matches, `all` when no element fails to match.
    fn lambda(
        &self,
        environment: &mut Environment,
        collection: &[String],
        operator: &str,
        body: Option<&LambdaBody>,
        depth: usize,
    ) -> Result<Expr, QueryBuilderError> {
        let negated = match operator {
            "any" => false,
            "all" => true,
            operator => {
                return Err(QueryBuilderError::Unsupported(format!(
                    "lambda operator {operator}"
                )))
            }
        };

        let (scope, path) = environment.resolve(collection);
        let FieldMeta::Collection { items } = self.path_meta(scope, path)? else {
            return Err(QueryBuilderError::InvalidFunctionArgument(format!(
                "{operator} requires a collection, {} is not one",
                collection.join("/")
            )));
        };
        let array = self
            .variant
            .json_extract(self.path_source(scope, path)?, path);
        let alias_name = aliasing::lambda_alias(&scope.ident, path);
        let alias = Ident::quoted(&alias_name);

        let predicate = match body {
            None if negated => {
                return Err(QueryBuilderError::InvalidFunctionArgument(
                    "all requires a predicate".to_owned(),
                ))
            }
            None => None,
            Some(body) => {
                let element = Scope {
                    field: *items,
                    source: self.variant.json_each_value(&alias),
                    ident: alias_name,
                };
                environment.bound.push((body.variable.to_owned(), element));
                let inner = self.predicate(environment, &body.predicate, depth + 1);
                environment.bound.pop();
                let inner = inner?;
                Some(if negated { not(inner) } else { inner })
            }
        };

        let subquery = Query::new(vec![SelectItem::UnnamedExpr(Expr::Value(Value::Number(
            "1".to_owned(),
        )))])
        .from(vec![TableFactor::TableFunction {
            expr: self.variant.json_each(array),
            alias: Some(alias),
        }])
        .predicate(predicate);

        Ok(Expr::Exists {
            subquery: subquery.boxed(),
            negated,
        })
    }
}
