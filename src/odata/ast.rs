use strum::{Display, EnumString};

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Or(Box<Expression>, Box<Expression>),
    And(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
    Comparison {
        left: Box<Expression>,
        operator: ComparisonOperator,
        right: Box<Expression>,
    },
    Function {
        name: String,
        args: Vec<Expression>,
    },
    /// `Path/any(x: ...)` or `Path/all(x: ...)`. `any()` carries no body.
    Lambda {
        collection: Vec<String>,
        operator: String,
        body: Option<LambdaBody>,
    },
    Path(Vec<String>),
    Literal(Literal),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LambdaBody {
    pub variable: String,
    pub predicate: Box<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ComparisonOperator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Integer(i64),
    /// Kept as written so it renders back without float formatting drift.
    Float(String),
    Boolean(bool),
    DateTime(String),
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByItem {
    pub path: Vec<String>,
    pub direction: Direction,
}

/// One item of a `$select` or `$expand` list.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryItem {
    pub path: Vec<String>,
    pub options: QueryOptions,
}

/// The `(...)` options attached to a select or expand item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    pub filter: Option<Expression>,
    pub orderby: Option<Vec<OrderByItem>>,
    pub select: Option<Vec<QueryItem>>,
    pub expand: Option<Vec<QueryItem>>,
}

pub(super) enum QueryOption {
    Filter(Expression),
    OrderBy(Vec<OrderByItem>),
    Select(Vec<QueryItem>),
    Expand(Vec<QueryItem>),
}

impl QueryOptions {
    pub(super) fn from_options(options: Vec<QueryOption>) -> Result<Self, &'static str> {
        let mut query_options = QueryOptions::default();
        for option in options {
            match option {
                QueryOption::Filter(filter) => {
                    if query_options.filter.replace(filter).is_some() {
                        return Err("at most one $filter per item");
                    }
                }
                QueryOption::OrderBy(orderby) => {
                    if query_options.orderby.replace(orderby).is_some() {
                        return Err("at most one $orderby per item");
                    }
                }
                QueryOption::Select(select) => {
                    if query_options.select.replace(select).is_some() {
                        return Err("at most one $select per item");
                    }
                }
                QueryOption::Expand(expand) => {
                    if query_options.expand.replace(expand).is_some() {
                        return Err("at most one $expand per item");
                    }
                }
            }
        }
        Ok(query_options)
    }
}
