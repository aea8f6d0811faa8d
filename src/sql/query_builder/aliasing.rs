//! Correlation names for the subqueries a projection or filter generates.
//!
//! Names follow the schema path that produced them, joined with `/`. OData property names
//! can never contain a `/`, and the `$` markers can never start one, so names derived from
//! different paths or for different purposes never collide.
//!
//! Postgres truncates identifiers to 63 bytes, so longer names keep a prefix and end in
//! `~` plus a hash of the full name. `~` never appears in a property name.
use sha2::{Digest, Sha256};

const MAX_ALIAS_LEN: usize = 63;
const HASH_LEN: usize = 16;

fn bounded(name: String) -> String {
    if name.len() <= MAX_ALIAS_LEN {
        return name;
    }
    let digest = Sha256::digest(name.as_bytes());
    let hash: String = digest
        .iter()
        .take(HASH_LEN / 2)
        .map(|byte| format!("{byte:02x}"))
        .collect();

    let mut cut = MAX_ALIAS_LEN - HASH_LEN - 1;
    while !name.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}~{}", &name[..cut], hash)
}

pub fn field_alias(parent: &str, field: &str) -> String {
    bounded(format!("{parent}/{field}"))
}

/// Rows of an exploded array.
pub fn elements_alias(ident: &str) -> String {
    bounded(format!("{ident}/$each"))
}

/// Derived table that re-aggregates projected collection elements.
pub fn rows_alias(ident: &str) -> String {
    bounded(format!("{ident}/$rows"))
}

/// Candidate objects of a polymorphic complex field.
pub fn variant_alias(ident: &str) -> String {
    bounded(format!("{ident}/$variant"))
}

pub fn lambda_alias(ident: &str, collection: &[String]) -> String {
    if collection.is_empty() {
        bounded(format!("{ident}/$lambda"))
    } else {
        bounded(format!("{ident}/{}/$lambda", collection.join("/")))
    }
}

/// Root of a sub-projection built only to source a filter.
pub fn filter_alias(ident: &str) -> String {
    bounded(format!("{ident}/$filter"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_follow_the_schema_path() {
        let engine = field_alias("Car", "Engine");
        assert_eq!(engine, "Car/Engine");
        assert_eq!(elements_alias(&engine), "Car/Engine/$each");
        assert_eq!(
            lambda_alias("Car", &["Engine".to_owned(), "SubOptions".to_owned()]),
            "Car/Engine/SubOptions/$lambda"
        );
        assert_ne!(elements_alias("Car/Engine"), field_alias("Car/Engine", "each"));
    }

    #[test]
    fn long_aliases_stay_within_identifier_limits() {
        let parent = "Car/Engine/Options/SubOptions/Manufacturer/Address";
        let city = field_alias(parent, "CityOfManufacture");
        let country = field_alias(parent, "CountryOfManufacture");

        assert_eq!(city.len(), MAX_ALIAS_LEN);
        assert_eq!(country.len(), MAX_ALIAS_LEN);
        assert!(city.starts_with("Car/Engine/Options/SubOptions/Manufactur"));
        assert_ne!(city, country);

        // deterministic, and children of a shortened name are shortened again
        assert_eq!(city, field_alias(parent, "CityOfManufacture"));
        assert!(elements_alias(&city).len() <= MAX_ALIAS_LEN);
        assert_ne!(elements_alias(&city), elements_alias(&country));
    }
}
