use std::{
    error::Error,
    fmt::{Display, Formatter},
};

use strum::Display;

use crate::odata::ParseError;

/// The query option a failure originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Clause {
    #[strum(serialize = "$filter")]
    Filter,
    #[strum(serialize = "$orderby")]
    OrderBy,
    #[strum(serialize = "$select")]
    Select,
    #[strum(serialize = "$expand")]
    Expand,
}

#[derive(Debug)]
pub enum QueryBuilderError {
    Internal(String),
    TableMissing(String),
    UnknownSchema(String),
    UnknownField { field: String, schemas: Vec<String> },
    PrimitiveSubPath(String),
    MissingDiscriminator(Vec<String>),
    Parse { clause: Clause, source: ParseError },
    DuplicateFilter(String),
    DuplicateOrderBy(String),
    SelectionSpecifiedTwice(String),
    ExpandInsideSelect(String),
    Unsupported(String),
    InvalidFunctionArgument(String),
    MaxDepthExceeded(usize),
    Clause {
        clause: Clause,
        source: Box<QueryBuilderError>,
    },
}

impl QueryBuilderError {
    pub fn in_clause(self, clause: Clause) -> Self {
        match self {
            QueryBuilderError::Parse { .. } | QueryBuilderError::Clause { .. } => self,
            err => QueryBuilderError::Clause {
                clause,
                source: Box::new(err),
            },
        }
    }
}

impl Display for QueryBuilderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryBuilderError::Internal(message) => write!(f, "Internal error: {}", message),
            QueryBuilderError::TableMissing(schema) => write!(
                f,
                "Schema {} has no backing table and can not be queried directly",
                schema
            ),
            QueryBuilderError::UnknownSchema(schema) => write!(f, "Unknown schema: {}", schema),
            QueryBuilderError::UnknownField { field, schemas } => write!(
                f,
                "Field {} is not defined by any of the schemas [{}]",
                field,
                schemas.join(", ")
            ),
            QueryBuilderError::PrimitiveSubPath(path) => {
                write!(f, "Can not subpath a primitive type, remaining path: {}", path)
            }
            QueryBuilderError::MissingDiscriminator(schemas) => write!(
                f,
                "Field with multiple schemas [{}] must declare a discriminator",
                schemas.join(", ")
            ),
            QueryBuilderError::Parse { clause, source } => {
                write!(f, "Failed to parse {}: {}", clause, source)
            }
            QueryBuilderError::DuplicateFilter(path) => {
                write!(f, "Filter specified more than once for {}", path)
            }
            QueryBuilderError::DuplicateOrderBy(path) => {
                write!(f, "Orderby specified more than once for {}", path)
            }
            QueryBuilderError::SelectionSpecifiedTwice(path) => {
                write!(f, "Selection for {} specified more than once", path)
            }
            QueryBuilderError::ExpandInsideSelect(path) => {
                write!(f, "$expand is not allowed inside $select, found at {}", path)
            }
            QueryBuilderError::Unsupported(what) => write!(f, "Unsupported: {}", what),
            QueryBuilderError::InvalidFunctionArgument(message) => {
                write!(f, "Invalid argument: {}", message)
            }
            QueryBuilderError::MaxDepthExceeded(depth) => {
                write!(f, "Query nesting exceeds the maximum depth of {}", depth)
            }
            QueryBuilderError::Clause { clause, source } => write!(f, "{}: {}", clause, source),
        }
    }
}

impl Error for QueryBuilderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            QueryBuilderError::Parse { source, .. } => Some(source),
            QueryBuilderError::Clause { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}
