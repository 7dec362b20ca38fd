//! Statistic query providers.
//!
//! Each statistic is described by a [`StatsQueryProvider`]: the schema of its
//! partial aggregate, the SQL that builds one from a raw-event table, the SQL
//! that merges two partial aggregates, and the SQL that extracts the ranked
//! top N. The engine depends only on this contract; concrete variants live in
//! the entity modules.
//!
//! All SQL runs on the engine's DataFusion `SessionContext` against named
//! tables the engine registers before each stage, so a provider never touches
//! storage itself.

pub mod artists;
pub mod listening_activity;
pub mod releases;
#[cfg(test)]
pub(crate) mod test_util;

pub use artists::{ARTIST_COUNTRY_CACHE, SitewideArtistStats, UserArtistStats};
use datafusion::arrow::datatypes::SchemaRef;
pub use listening_activity::SitewideListeningActivity;
pub use releases::SitewideReleaseStats;

use crate::models::{Entity, Scope, StatsRange};

/// Query contract one statistic variant implements.
///
/// Both partial aggregates produced by [`aggregate_query`] in one run (full
/// and incremental) share [`partial_aggregate_schema`], so
/// [`combine_query`] can union them. Merge semantics are provider-defined;
/// every shipped variant is additive and documents that on its type.
///
/// [`aggregate_query`]: StatsQueryProvider::aggregate_query
/// [`partial_aggregate_schema`]: StatsQueryProvider::partial_aggregate_schema
/// [`combine_query`]: StatsQueryProvider::combine_query
pub trait StatsQueryProvider: Send + Sync {
    fn entity(&self) -> Entity;

    fn scope(&self) -> Scope;

    /// Schema of this statistic's partial aggregate; used to materialize an
    /// empty incremental aggregate when no incremental events exist.
    fn partial_aggregate_schema(&self) -> SchemaRef;

    /// Auxiliary lookup datasets to register before aggregation, in
    /// declaration order. Paths are relative to the storage base path.
    fn cache_tables(&self) -> Vec<String> {
        Vec::new()
    }

    /// Aggregation over the named raw-event table, producing a partial
    /// aggregate. `listen_count_limit` caps a single user's contribution per
    /// grouping key (sitewide scope only; the engine passes `None` for user
    /// scope).
    fn aggregate_query(
        &self,
        events_table: &str,
        cache_tables: &[String],
        listen_count_limit: Option<i64>,
    ) -> String;

    /// Merge two partial aggregates with identical schema. Rows present on
    /// only one side pass through with the other side's measure treated as
    /// absent.
    fn combine_query(&self, full_table: &str, incremental_table: &str) -> String;

    /// Ranked top-`n` extraction from the combined aggregate. User-scoped
    /// variants rank per user and may join `cache_tables` to enrich rows.
    fn top_n_query(&self, combined_table: &str, n: u32, cache_tables: &[String]) -> String;
}

/// Resolve the provider for an (entity, scope) pair.
///
/// `range` parameterizes range-sensitive statistics (listening activity
/// picks its histogram bucket size from it); entity charts ignore it.
pub fn provider_for(
    entity: Entity,
    scope: Scope,
    range: StatsRange,
) -> Option<Box<dyn StatsQueryProvider>> {
    match (entity, scope) {
        (Entity::Artists, Scope::Sitewide) => Some(Box::new(SitewideArtistStats)),
        (Entity::Artists, Scope::User) => Some(Box::new(UserArtistStats)),
        (Entity::Releases, Scope::Sitewide) => Some(Box::new(SitewideReleaseStats)),
        (Entity::ListeningActivity, Scope::Sitewide) => {
            Some(Box::new(SitewideListeningActivity::new(range)))
        }
        _ => None,
    }
}

/// Listen-count expression with the per-user cap applied when one is set.
pub(crate) fn capped_listen_count(listen_count_limit: Option<i64>) -> String {
    match listen_count_limit {
        Some(limit) => format!("CASE WHEN count(*) > {limit} THEN {limit} ELSE count(*) END"),
        None => "count(*)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_every_shipped_statistic() {
        for (entity, scope) in [
            (Entity::Artists, Scope::Sitewide),
            (Entity::Artists, Scope::User),
            (Entity::Releases, Scope::Sitewide),
            (Entity::ListeningActivity, Scope::Sitewide),
        ] {
            let provider = provider_for(entity, scope, StatsRange::Week).unwrap();
            assert_eq!(provider.entity(), entity);
            assert_eq!(provider.scope(), scope);
        }
    }

    #[test]
    fn unsupported_combinations_resolve_to_none() {
        assert!(provider_for(Entity::ListeningActivity, Scope::User, StatsRange::Week).is_none());
        assert!(provider_for(Entity::Releases, Scope::User, StatsRange::Week).is_none());
    }

    #[test]
    fn cap_expression_only_applies_when_limited() {
        assert_eq!(capped_listen_count(None), "count(*)");
        assert_eq!(
            capped_listen_count(Some(100)),
            "CASE WHEN count(*) > 100 THEN 100 ELSE count(*) END"
        );
    }
}
