use indexmap::{IndexMap, IndexSet};

use crate::odata::ast::{Expression, OrderByItem, QueryItem, QueryOptions};

use super::{Clause, QueryBuilderError, MAX_DEPTH};

/// One node of the projection tree built from `$select` and `$expand`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectNode {
    pub children: IndexMap<String, SelectNode>,
    /// Children named by `$select`. When non-empty, only these and the expanded children
    /// are projected.
    pub select_children: IndexSet<String>,
    pub expand_children: IndexSet<String>,
    pub filter: Option<Expression>,
    pub orderby: Option<Vec<OrderByItem>>,
    pub expand: bool,
    selection: Option<SelectionSource>,
}

/// How a node received its selected children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SelectionSource {
    /// `a/b`
    Path,
    /// `a($select=b)`
    Nested,
}

impl SelectNode {
    pub fn from_items(
        select: &[QueryItem],
        expand: &[QueryItem],
    ) -> Result<Self, QueryBuilderError> {
        let mut root = SelectNode::default();
        for item in select {
            root.insert(&item.path, &item.options, false)
                .map_err(|err| err.in_clause(Clause::Select))?;
        }
        for item in expand {
            root.insert(&item.path, &item.options, true)
                .map_err(|err| err.in_clause(Clause::Expand))?;
        }
        Ok(root)
    }

    /// Inserts one `$select` or `$expand` item, creating intermediate nodes as needed.
    pub fn insert(
        &mut self,
        path: &[String],
        options: &QueryOptions,
        is_expand: bool,
    ) -> Result<(), QueryBuilderError> {
        self.insert_at(&[], path, options, is_expand, false, 0)
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn child(&self, name: &str) -> Option<&SelectNode> {
        self.children.get(name)
    }

    /// Whether `field` is part of this node's projection.
    pub fn allows(&self, field: &str) -> bool {
        self.select_children.is_empty()
            || self.select_children.contains(field)
            || self.expand_children.contains(field)
    }

    /// Copy of this node for projecting collection items, whose filter and
    /// ordering already apply to the exploded rows.
    pub fn without_filter_and_orderby(&self) -> Self {
        SelectNode {
            filter: None,
            orderby: None,
            ..self.clone()
        }
    }

    fn insert_at(
        &mut self,
        location: &[String],
        path: &[String],
        options: &QueryOptions,
        is_expand: bool,
        via_path: bool,
        depth: usize,
    ) -> Result<(), QueryBuilderError> {
        if depth > MAX_DEPTH {
            return Err(QueryBuilderError::MaxDepthExceeded(MAX_DEPTH));
        }
        let Some((segment, rest)) = path.split_first() else {
            return self.apply_options(location, options, is_expand, depth);
        };

        if via_path && !is_expand {
            if self.selection == Some(SelectionSource::Nested) {
                return Err(QueryBuilderError::SelectionSpecifiedTwice(
                    location.join("/"),
                ));
            }
            self.selection = Some(SelectionSource::Path);
        }
        if is_expand {
            self.expand_children.insert(segment.to_owned());
        } else {
            self.select_children.insert(segment.to_owned());
        }

        let mut child_location = location.to_vec();
        child_location.push(segment.to_owned());
        self.children.entry(segment.to_owned()).or_default().insert_at(
            &child_location,
            rest,
            options,
            is_expand,
            true,
            depth + 1,
        )
    }

    fn apply_options(
        &mut self,
        location: &[String],
        options: &QueryOptions,
        is_expand: bool,
        depth: usize,
    ) -> Result<(), QueryBuilderError> {
        if let Some(filter) = &options.filter {
            if self.filter.is_some() {
                return Err(QueryBuilderError::DuplicateFilter(location.join("/")));
            }
            self.filter = Some(filter.clone());
        }
        if let Some(orderby) = &options.orderby {
            if self.orderby.is_some() {
                return Err(QueryBuilderError::DuplicateOrderBy(location.join("/")));
            }
            self.orderby = Some(orderby.clone());
        }
        if !is_expand && options.expand.is_some() {
            return Err(QueryBuilderError::ExpandInsideSelect(location.join("/")));
        }
        self.expand |= is_expand;

        if let Some(select) = &options.select {
            if self.selection.is_some() {
                return Err(QueryBuilderError::SelectionSpecifiedTwice(
                    location.join("/"),
                ));
            }
            self.selection = Some(SelectionSource::Nested);
            for item in select {
                self.insert_at(location, &item.path, &item.options, false, false, depth + 1)?;
            }
        }
        if let Some(expand) = &options.expand {
            for item in expand {
                self.insert_at(location, &item.path, &item.options, true, false, depth + 1)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::odata::{parse_expand, parse_select};

    fn tree(select: &str, expand: &str) -> Result<SelectNode, QueryBuilderError> {
        let select = if select.is_empty() {
            vec![]
        } else {
            parse_select(select).unwrap()
        };
        let expand = if expand.is_empty() {
            vec![]
        } else {
            parse_expand(expand).unwrap()
        };
        SelectNode::from_items(&select, &expand)
    }

    fn inner(err: QueryBuilderError) -> QueryBuilderError {
        match err {
            QueryBuilderError::Clause { source, .. } => *source,
            err => err,
        }
    }

    #[test]
    fn builds_nested_children() {
        let root = tree(
            "ModelName,Engine/Options/SubOptions($select=Name;$filter=contains(Name, 'blue'))",
            "Manufacturer($select=Name)",
        )
        .unwrap();

        assert_eq!(
            root.select_children.iter().collect::<Vec<_>>(),
            vec!["ModelName", "Engine"]
        );
        assert_eq!(
            root.expand_children.iter().collect::<Vec<_>>(),
            vec!["Manufacturer"]
        );

        let sub_options = &root.children["Engine"].children["Options"].children["SubOptions"];
        assert!(sub_options.filter.is_some());
        assert!(sub_options.select_children.contains("Name"));
        assert!(!sub_options.expand);

        let manufacturer = &root.children["Manufacturer"];
        assert!(manufacturer.expand);
        assert!(manufacturer.allows("Name"));
        assert!(!manufacturer.allows("Address"));
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let forward = tree("ModelName,Engine/Options,Manufacturer", "Manufacturer,Manufacturers").unwrap();
        let backward = tree("Manufacturer,Engine/Options,ModelName", "Manufacturers,Manufacturer").unwrap();
        assert_eq!(forward, backward);
        assert!(forward.children["Manufacturer"].expand);
    }

    #[test]
    fn expand_is_sticky() {
        let mut root = SelectNode::default();
        let path = vec!["Manufacturer".to_owned()];
        root.insert(&path, &QueryOptions::default(), true).unwrap();
        root.insert(&path, &QueryOptions::default(), false).unwrap();
        assert!(root.children["Manufacturer"].expand);
    }

    #[test]
    fn selection_from_two_forms_conflicts_in_both_orders() {
        let err = tree("Engine/Options,Engine($select=Options)", "").unwrap_err();
        assert!(matches!(
            inner(err),
            QueryBuilderError::SelectionSpecifiedTwice(path) if path == "Engine"
        ));

        let err = tree("Engine($select=Options),Engine/Options", "").unwrap_err();
        assert!(matches!(
            inner(err),
            QueryBuilderError::SelectionSpecifiedTwice(path) if path == "Engine"
        ));

        let err = tree("Engine($select=Options),Engine($select=Manufacturer)", "").unwrap_err();
        assert!(matches!(
            inner(err),
            QueryBuilderError::SelectionSpecifiedTwice(_)
        ));
    }

    #[test]
    fn paths_sharing_a_prefix_do_not_conflict() {
        let root = tree("Engine/Options,Engine/Manufacturer", "").unwrap();
        assert_eq!(root.children["Engine"].children.len(), 2);
    }

    #[test]
    fn expand_inside_select_fails() {
        let err = tree("Engine($expand=Manufacturer)", "").unwrap_err();
        assert!(matches!(
            inner(err),
            QueryBuilderError::ExpandInsideSelect(_)
        ));

        let err = tree("", "Manufacturers($select=Address($expand=Foo))").unwrap_err();
        assert!(matches!(
            inner(err),
            QueryBuilderError::ExpandInsideSelect(_)
        ));
    }

    #[test]
    fn duplicate_filters_and_orderbys_fail() {
        let err = tree(
            "OtherStereos($filter=Brand eq 'a')",
            "OtherStereos($filter=Brand eq 'b')",
        )
        .unwrap_err();
        assert!(matches!(
            inner(err),
            QueryBuilderError::DuplicateFilter(path) if path == "OtherStereos"
        ));

        let err = tree(
            "OtherStereos($orderby=Brand)",
            "OtherStereos($orderby=Brand desc)",
        )
        .unwrap_err();
        assert!(matches!(
            inner(err),
            QueryBuilderError::DuplicateOrderBy(_)
        ));
    }

    #[test]
    fn depth_is_bounded() {
        let deep = vec!["a".to_owned(); MAX_DEPTH + 2];
        let err = SelectNode::default()
            .insert(&deep, &QueryOptions::default(), false)
            .unwrap_err();
        assert!(matches!(err, QueryBuilderError::MaxDepthExceeded(_)));
    }
}
