use crate::{
    schema::{Discriminator, FieldMeta},
    sql::{
        ast::{
            binary_op, BinaryOperator, Expr, Ident, ObjectName, Query, SelectItem, TableFactor,
        },
        variant::each_value_column,
    },
};

use super::{aliasing, filter::Scope, select_tree::SelectNode, QueryBuilder, QueryBuilderError, MAX_DEPTH};

/// A node asking for nothing beyond the stored value.
fn is_plain(node: &SelectNode) -> bool {
    !node.has_children() && node.filter.is_none() && node.orderby.is_none() && !node.expand
}

fn data_column(alias: &Ident) -> Expr {
    Expr::CompoundIdentifier(vec![alias.clone(), Ident::unquoted("data")])
}

fn child_path(path: &[String], key: &str) -> Vec<String> {
    let mut child = path.to_vec();
    child.push(key.to_owned());
    child
}

impl<'a> QueryBuilder<'a> {
    /// Builds the expression producing the json value of `field`, read from `source` at `path`
    /// and shaped by `node`.
    ///
    /// `ident` names the field in the aliases of any subquery this generates.
    pub(super) fn project(
        &self,
        field: &FieldMeta,
        ident: &str,
        source: Expr,
        path: &[String],
        node: Option<&SelectNode>,
        depth: usize,
    ) -> Result<Expr, QueryBuilderError> {
        if depth > MAX_DEPTH {
            return Err(QueryBuilderError::MaxDepthExceeded(MAX_DEPTH));
        }
        match field {
            FieldMeta::Complex {
                schemas,
                discriminator,
            } => match node {
                Some(node) if node.has_children() => self.complex_object(
                    schemas,
                    discriminator.as_ref(),
                    ident,
                    source,
                    path,
                    node,
                    depth,
                ),
                // unshaped objects are returned as stored, nulls included
                _ => Ok(self.extract(source, path)),
            },
            FieldMeta::Relationship { schema, property } => match node {
                Some(node) if node.expand => {
                    self.relationship(schema, property, ident, source, path, node, depth)
                }
                _ => Ok(self.extract(source, path)),
            },
            FieldMeta::Collection { items } => match node {
                Some(node) if !is_plain(node) => match items.as_ref() {
                    FieldMeta::Relationship { schema, property } if node.expand => self
                        .relationship_collection(
                            schema, property, ident, source, path, node, depth,
                        ),
                    items => self.collection(items, ident, source, path, node, depth),
                },
                _ => Ok(self.extract(source, path)),
            },
            _ => match node.and_then(|node| node.children.keys().next()) {
                Some(child) => Err(QueryBuilderError::PrimitiveSubPath(
                    child_path(path, child).join("/"),
                )),
                None => Ok(self.extract(source, path)),
            },
        }
    }

    fn extract(&self, source: Expr, path: &[String]) -> Expr {
        if path.is_empty() {
            source
        } else {
            self.variant.json_extract(source, path)
        }
    }

    /// One object per candidate schema. With several candidates the one whose
    /// discriminator matches the stored value is picked at run time.
    #[allow(clippy::too_many_arguments)]
    fn complex_object(
        &self,
        schemas: &[String],
        discriminator: Option<&Discriminator>,
        ident: &str,
        source: Expr,
        path: &[String],
        node: &SelectNode,
        depth: usize,
    ) -> Result<Expr, QueryBuilderError> {
        let candidates = schemas
            .iter()
            .map(|name| Ok((name, self.graph.schema(name)?)))
            .collect::<Result<Vec<_>, QueryBuilderError>>()?;

        for child in node.children.keys() {
            if !candidates
                .iter()
                .any(|(_, schema)| schema.fields.contains_key(child))
            {
                return Err(QueryBuilderError::UnknownField {
                    field: child.to_owned(),
                    schemas: schemas.to_vec(),
                });
            }
        }

        let mut objects = Vec::with_capacity(candidates.len());
        for (name, schema) in candidates {
            let mut pairs = vec![];
            if let Some(discriminator) = discriminator {
                pairs.push((
                    discriminator.property.to_owned(),
                    self.variant.json_quote(discriminator.value_for(name)),
                ));
            }
            for (key, field) in &schema.fields {
                let is_discriminator =
                    discriminator.is_some_and(|discriminator| &discriminator.property == key);
                if is_discriminator || !node.allows(key) {
                    continue;
                }
                let value = self.project(
                    field,
                    &aliasing::field_alias(ident, key),
                    source.clone(),
                    &child_path(path, key),
                    node.child(key),
                    depth + 1,
                )?;
                pairs.push((key.to_owned(), self.variant.json_cast(value)));
            }
            objects.push(self.variant.json_object(pairs));
        }

        if objects.len() == 1 {
            return Ok(objects.remove(0));
        }
        let Some(discriminator) = discriminator else {
            return Err(QueryBuilderError::MissingDiscriminator(schemas.to_vec()));
        };

        let alias = Ident::quoted(aliasing::variant_alias(ident));
        let candidate = each_value_column(&alias);
        let matches_stored = binary_op(
            self.variant
                .json_extract(candidate.clone(), &[discriminator.property.to_owned()]),
            BinaryOperator::Eq,
            self.variant
                .json_extract(source, &child_path(path, &discriminator.property)),
        );
        let query = Query::new(vec![SelectItem::UnnamedExpr(candidate)])
            .from(vec![TableFactor::TableFunction {
                expr: self.variant.json_each(self.variant.json_array(objects)),
                alias: Some(alias),
            }])
            .predicate(Some(matches_stored));
        Ok(Expr::Subquery(query.boxed()))
    }

    /// Correlated subquery fetching the related document from its own table.
    #[allow(clippy::too_many_arguments)]
    fn relationship(
        &self,
        schema: &str,
        property: &str,
        ident: &str,
        source: Expr,
        path: &[String],
        node: &SelectNode,
        depth: usize,
    ) -> Result<Expr, QueryBuilderError> {
        let table = self.graph.table(schema)?;
        // aliased so a relationship back into the same table can not shadow the outer row
        let alias = Ident::quoted(ident);
        let target = data_column(&alias);
        let root = FieldMeta::root(schema);

        let object = self.project(&root, ident, target.clone(), &[], Some(node), depth + 1)?;

        let mut predicate = binary_op(
            self.variant
                .json_extract(target.clone(), &[property.to_owned()]),
            BinaryOperator::Eq,
            self.variant
                .json_extract(source, &child_path(path, property)),
        );
        if let Some(filter) = &node.filter {
            let scope = Scope {
                field: root,
                source: target,
                ident: ident.to_owned(),
            };
            predicate = binary_op(
                predicate,
                BinaryOperator::And,
                self.filter_expression(&scope, filter)?,
            );
        }

        let query = Query::new(vec![SelectItem::UnnamedExpr(object)])
            .from(vec![TableFactor::Table {
                name: ObjectName(vec![Ident::unquoted(table)]),
                alias: Some(alias),
            }])
            .predicate(Some(predicate));
        Ok(Expr::Subquery(query.boxed()))
    }

    /// Joins the target table against the exploded array of stored references once,
    /// instead of one subquery per element.
    #[allow(clippy::too_many_arguments)]
    fn relationship_collection(
        &self,
        schema: &str,
        property: &str,
        ident: &str,
        source: Expr,
        path: &[String],
        node: &SelectNode,
        depth: usize,
    ) -> Result<Expr, QueryBuilderError> {
        let table = self.graph.table(schema)?;
        let alias = Ident::quoted(ident);
        let each = Ident::quoted(aliasing::elements_alias(ident));
        let rows = Ident::quoted(aliasing::rows_alias(ident));
        let target = data_column(&alias);
        let scope = Scope {
            field: FieldMeta::root(schema),
            source: target.clone(),
            ident: ident.to_owned(),
        };

        let object = self.project(
            &scope.field,
            ident,
            target.clone(),
            &[],
            Some(&node.without_filter_and_orderby()),
            depth + 1,
        )?;

        let key = [property.to_owned()];
        let mut predicate = binary_op(
            self.variant.json_extract(target, &key),
            BinaryOperator::Eq,
            self.variant.json_extract(each_value_column(&each), &key),
        );
        if let Some(filter) = &node.filter {
            predicate = binary_op(
                predicate,
                BinaryOperator::And,
                self.filter_expression(&scope, filter)?,
            );
        }
        let order_by = match &node.orderby {
            Some(orderby) => self.order_by_expressions(&scope, orderby)?,
            None => vec![],
        };

        let related = Query::new(vec![SelectItem::ExprWithAlias {
            expr: object,
            alias: Ident::unquoted("value"),
        }])
        .from(vec![
            TableFactor::Table {
                name: ObjectName(vec![Ident::unquoted(table)]),
                alias: Some(alias),
            },
            TableFactor::TableFunction {
                expr: self.variant.json_each(self.extract(source, path)),
                alias: Some(each),
            },
        ])
        .predicate(Some(predicate))
        .order_by(order_by);

        Ok(self.aggregate_rows(related, rows, false))
    }

    /// Explodes the array into rows, filters and orders them, projects each element
    /// and aggregates the result back into an array.
    fn collection(
        &self,
        items: &FieldMeta,
        ident: &str,
        source: Expr,
        path: &[String],
        node: &SelectNode,
        depth: usize,
    ) -> Result<Expr, QueryBuilderError> {
        let each_name = aliasing::elements_alias(ident);
        let each = Ident::quoted(&each_name);
        let rows = Ident::quoted(aliasing::rows_alias(ident));

        let value = self.project(
            items,
            &each_name,
            each_value_column(&each),
            &[],
            Some(&node.without_filter_and_orderby()),
            depth + 1,
        )?;

        let scope = Scope {
            field: items.to_owned(),
            source: self.variant.json_each_value(&each),
            ident: each_name,
        };
        let predicate = match &node.filter {
            Some(filter) => Some(self.filter_expression(&scope, filter)?),
            None => None,
        };
        let order_by = match &node.orderby {
            Some(orderby) => self.order_by_expressions(&scope, orderby)?,
            None => vec![],
        };

        let elements = Query::new(vec![SelectItem::ExprWithAlias {
            expr: value,
            alias: Ident::unquoted("value"),
        }])
        .from(vec![TableFactor::TableFunction {
            expr: self.variant.json_each(self.extract(source, path)),
            alias: Some(each),
        }])
        .predicate(predicate)
        .order_by(order_by);

        Ok(self.aggregate_rows(elements, rows, items.is_primitive()))
    }

    /// `(SELECT <aggregate>(value) FROM (<rows>) AS alias)`. Primitive values are aggregated
    /// as they are, anything else is re-typed as json first.
    fn aggregate_rows(&self, rows: Query, alias: Ident, primitive: bool) -> Expr {
        let value = each_value_column(&alias);
        let value = if primitive {
            value
        } else {
            self.variant.json_cast(value)
        };
        let query = Query::new(vec![SelectItem::UnnamedExpr(
            self.variant.json_array_aggregate(value),
        )])
        .from(vec![TableFactor::Derived {
            subquery: rows.boxed(),
            alias: Some(alias),
        }]);
        Expr::Subquery(query.boxed())
    }
}
