use super::{
    ast::{
        Expr, Function, FunctionArgExpr, Ident, ObjectName, OrderByExpr, Query, SelectItem,
        TableFactor, Value,
    },
    variant::Variant,
};
use crate::{
    odata::{self, ODataParams},
    schema::{FieldMeta, SchemaGraph},
};

mod aliasing;
mod error;
mod filter;
mod projection;
mod select_tree;

pub use error::{Clause, QueryBuilderError};
pub use select_tree::SelectNode;

use self::filter::Scope;

/// Bound on how deep projection trees, schema paths and filter expressions may nest.
pub const MAX_DEPTH: usize = 32;

/// Compiles OData requests against one schema graph into sql for one dialect.
///
/// Builders hold no per request state and can be shared freely.
#[derive(Clone, Copy)]
pub struct QueryBuilder<'a> {
    variant: &'a dyn Variant,
    graph: &'a SchemaGraph,
}

/// Empty query options are treated as absent.
fn option(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

impl<'a> QueryBuilder<'a> {
    pub fn new(variant: &'a dyn Variant, graph: &'a SchemaGraph) -> Self {
        Self { variant, graph }
    }

    /// `SELECT id, <document> AS data FROM <table> [WHERE ..] [ORDER BY ..] [LIMIT .. [OFFSET ..]]`
    pub fn build_sql_query(
        &self,
        schema_name: &str,
        params: &ODataParams,
    ) -> Result<String, QueryBuilderError> {
        let table = self.graph.table(schema_name)?;
        let scope = self.root_scope(schema_name, table);

        let predicate = self.where_clause(&scope, option(&params.filter))?;
        let order_by = self.order_by_clause(&scope, option(&params.orderby))?;

        let select = match option(&params.select) {
            Some(select) => odata::parse_select(select).map_err(|source| {
                QueryBuilderError::Parse {
                    clause: Clause::Select,
                    source,
                }
            })?,
            None => vec![],
        };
        let expand = match option(&params.expand) {
            Some(expand) => odata::parse_expand(expand).map_err(|source| {
                QueryBuilderError::Parse {
                    clause: Clause::Expand,
                    source,
                }
            })?,
            None => vec![],
        };
        let tree = SelectNode::from_items(&select, &expand)?;
        let document = self
            .project(
                &scope.field,
                &scope.ident,
                scope.source.clone(),
                &[],
                Some(&tree),
                0,
            )
            .map_err(|err| err.in_clause(Clause::Select))?;

        // a limit is needed for the offset to apply
        let limit = match (params.top, params.skip) {
            (Some(top), _) => Some(Expr::Value(Value::Number(top.to_string()))),
            (None, Some(_)) => Some(self.variant.unbounded_limit()),
            (None, None) => None,
        };

        let query = Query::new(vec![
            SelectItem::UnnamedExpr(Expr::Identifier(Ident::unquoted("id"))),
            SelectItem::ExprWithAlias {
                expr: document,
                alias: Ident::unquoted("data"),
            },
        ])
        .from(vec![root_table(table)])
        .predicate(predicate)
        .order_by(order_by)
        .limit(limit)
        .offset(params.skip);

        Ok(query.to_string())
    }

    /// `SELECT COUNT(*) FROM <table> [WHERE ..]`
    pub fn build_count_query(
        &self,
        schema_name: &str,
        filter: Option<&str>,
    ) -> Result<String, QueryBuilderError> {
        let table = self.graph.table(schema_name)?;
        let scope = self.root_scope(schema_name, table);
        let filter = filter.map(str::trim).filter(|filter| !filter.is_empty());
        let predicate = self.where_clause(&scope, filter)?;

        let count = Expr::Function(Function {
            name: ObjectName(vec![Ident::unquoted("COUNT")]),
            args: vec![FunctionArgExpr::Wildcard],
            distinct: false,
        });
        let query = Query::new(vec![SelectItem::UnnamedExpr(count)])
            .from(vec![root_table(table)])
            .predicate(predicate);

        Ok(query.to_string())
    }

    fn root_scope(&self, schema_name: &str, table: &str) -> Scope {
        Scope {
            field: FieldMeta::root(schema_name),
            source: Expr::CompoundIdentifier(vec![
                Ident::unquoted(table),
                Ident::unquoted("data"),
            ]),
            ident: schema_name.to_owned(),
        }
    }

    fn where_clause(
        &self,
        scope: &Scope,
        filter: Option<&str>,
    ) -> Result<Option<Expr>, QueryBuilderError> {
        let Some(filter) = filter else {
            return Ok(None);
        };
        let expression = odata::parse_filter(filter).map_err(|source| QueryBuilderError::Parse {
            clause: Clause::Filter,
            source,
        })?;
        self.filter_expression(scope, &expression)
            .map(Some)
            .map_err(|err| err.in_clause(Clause::Filter))
    }

    fn order_by_clause(
        &self,
        scope: &Scope,
        orderby: Option<&str>,
    ) -> Result<Vec<OrderByExpr>, QueryBuilderError> {
        let Some(orderby) = orderby else {
            return Ok(vec![]);
        };
        let items = odata::parse_orderby(orderby).map_err(|source| QueryBuilderError::Parse {
            clause: Clause::OrderBy,
            source,
        })?;
        self.order_by_expressions(scope, &items)
            .map_err(|err| err.in_clause(Clause::OrderBy))
    }
}

fn root_table(table: &str) -> TableFactor {
    TableFactor::Table {
        name: ObjectName(vec![Ident::unquoted(table)]),
        alias: None,
    }
}

pub fn build_sql_query(
    variant: &dyn Variant,
    graph: &SchemaGraph,
    schema_name: &str,
    params: &ODataParams,
) -> Result<String, QueryBuilderError> {
    QueryBuilder::new(variant, graph).build_sql_query(schema_name, params)
}

pub fn build_count_query(
    variant: &dyn Variant,
    graph: &SchemaGraph,
    schema_name: &str,
    filter: Option<&str>,
) -> Result<String, QueryBuilderError> {
    QueryBuilder::new(variant, graph).build_count_query(schema_name, filter)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        schema::tests::car_graph,
        sql::variant::{Postgres, Sqlite},
    };

    fn params(filter: Option<&str>, top: Option<u64>, skip: Option<u64>) -> ODataParams {
        ODataParams {
            filter: filter.map(str::to_owned),
            top,
            skip,
            ..Default::default()
        }
    }

    #[test]
    fn plain_query() {
        let graph = car_graph();
        assert_eq!(
            build_sql_query(&Sqlite, &graph, "Car", &ODataParams::default()).unwrap(),
            "SELECT id, car_rows.data AS data FROM car_rows"
        );
    }

    #[test]
    fn paging() {
        let graph = car_graph();
        let sql = |top, skip| build_sql_query(&Sqlite, &graph, "Car", &params(None, top, skip)).unwrap();
        assert_eq!(
            sql(Some(2), None),
            "SELECT id, car_rows.data AS data FROM car_rows LIMIT 2"
        );
        assert_eq!(
            sql(Some(2), Some(4)),
            "SELECT id, car_rows.data AS data FROM car_rows LIMIT 2 OFFSET 4"
        );
        assert_eq!(
            sql(None, Some(4)),
            "SELECT id, car_rows.data AS data FROM car_rows LIMIT -1 OFFSET 4"
        );

        assert_eq!(
            build_sql_query(&Postgres, &graph, "Car", &params(None, None, Some(4))).unwrap(),
            "SELECT id, car_rows.data AS data FROM car_rows LIMIT ALL OFFSET 4"
        );
    }

    #[test]
    fn filter_and_orderby() {
        let graph = car_graph();
        let params = ODataParams {
            filter: Some("Seats gt 2".to_owned()),
            orderby: Some("ModelName desc".to_owned()),
            select: Some("ModelName".to_owned()),
            ..Default::default()
        };
        assert_eq!(
            build_sql_query(&Sqlite, &graph, "Car", &params).unwrap(),
            "SELECT id, JSON_OBJECT('ModelName', JSON(car_rows.data -> '$.ModelName')) AS data \
             FROM car_rows WHERE (CAST(car_rows.data ->> '$.Seats' AS INTEGER) > CAST(2 AS INTEGER)) \
             ORDER BY car_rows.data ->> '$.ModelName' DESC"
        );
    }

    #[test]
    fn count_ignores_everything_but_the_filter() {
        let graph = car_graph();
        assert_eq!(
            build_count_query(&Sqlite, &graph, "Car", None).unwrap(),
            "SELECT COUNT(*) FROM car_rows"
        );
        assert_eq!(
            build_count_query(&Sqlite, &graph, "Car", Some("ModelName eq 'a'")).unwrap(),
            "SELECT COUNT(*) FROM car_rows WHERE (car_rows.data -> '$.ModelName' = JSON_QUOTE('a'))"
        );
        assert_eq!(
            build_count_query(&Sqlite, &graph, "Car", Some("  ")).unwrap(),
            "SELECT COUNT(*) FROM car_rows"
        );
    }

    #[test]
    fn schemas_without_tables_can_not_be_queried() {
        let graph = car_graph();
        assert!(matches!(
            build_sql_query(&Sqlite, &graph, "Engine", &ODataParams::default()),
            Err(QueryBuilderError::TableMissing(schema)) if schema == "Engine"
        ));
        assert!(matches!(
            build_count_query(&Sqlite, &graph, "Truck", None),
            Err(QueryBuilderError::UnknownSchema(_))
        ));
    }

    #[test]
    fn projection_errors_name_the_select_clause() {
        let mut json = serde_json::to_value(car_graph()).unwrap();
        json["Manufacturer"]
            .as_object_mut()
            .unwrap()
            .remove("table");
        let graph: SchemaGraph = serde_json::from_value(json).unwrap();

        let err = build_sql_query(
            &Sqlite,
            &graph,
            "Car",
            &ODataParams {
                expand: Some("Manufacturer".to_owned()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            QueryBuilderError::Clause {
                clause: Clause::Select,
                source,
            } if matches!(*source, QueryBuilderError::TableMissing(ref schema) if schema == "Manufacturer")
        ));
    }

    #[test]
    fn errors_name_their_clause() {
        let graph = car_graph();
        let err = build_sql_query(&Sqlite, &graph, "Car", &params(Some("Seats gt"), None, None))
            .unwrap_err();
        assert!(matches!(
            err,
            QueryBuilderError::Parse {
                clause: Clause::Filter,
                ..
            }
        ));

        let err = build_sql_query(&Sqlite, &graph, "Car", &params(Some("Wheels eq 4"), None, None))
            .unwrap_err();
        assert!(err.to_string().starts_with("$filter: "));

        let err = build_sql_query(
            &Sqlite,
            &graph,
            "Car",
            &ODataParams {
                select: Some("Engine/Options,Engine($select=Options)".to_owned()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            QueryBuilderError::Clause {
                clause: Clause::Select,
                ..
            }
        ));
    }
}
