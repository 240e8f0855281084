//! Merged, alias-expanded view of every known source.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{Driver, Source};

/// Read-only source lookup table, sorted by id.
///
/// Built from custom sources followed by each driver's default sources in
/// registration order. Every source contributes its canonical entry and one
/// entry per alias; the first entry seen for an id wins. A custom source
/// therefore shadows a driver source with the same id, and an alias that
/// collides with a canonical id resolves to whichever was listed first.
#[derive(Debug, Clone, Default)]
pub struct SourceCatalog {
    sources: BTreeMap<String, Source>,
}

impl SourceCatalog {
    pub fn build(custom: &[Source], drivers: &[Arc<dyn Driver>]) -> Self {
        let declared = custom
            .iter()
            .cloned()
            .chain(drivers.iter().flat_map(|driver| driver.default_sources()));

        let mut sources = BTreeMap::new();
        for source in declared {
            for entry in expand(source) {
                match sources.entry(entry.id().to_owned()) {
                    Entry::Vacant(slot) => {
                        slot.insert(entry);
                    }
                    Entry::Occupied(existing) => {
                        tracing::debug!(
                            id = entry.id(),
                            kept_driver = existing.get().driver(),
                            dropped_driver = entry.driver(),
                            "duplicate source id ignored"
                        );
                    }
                }
            }
        }

        Self { sources }
    }

    /// Looks a source up by canonical id or alias.
    pub fn resolve(&self, name: &str) -> Option<&Source> {
        self.sources.get(name)
    }

    pub fn sources(&self) -> &BTreeMap<String, Source> {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

fn expand(source: Source) -> Vec<Source> {
    let aliases = source
        .aliases()
        .iter()
        .filter_map(|alias| source.alias(alias).ok())
        .collect::<Vec<_>>();
    let mut entries = Vec::with_capacity(aliases.len() + 1);
    entries.push(source);
    entries.extend(aliases);
    entries
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use url::Url;

    use super::*;
    use crate::{Connection, DriverContext, SourceError};

    struct Defaults(Vec<Source>);

    impl Driver for Defaults {
        fn id(&self) -> &str {
            "D"
        }

        fn rank(&self) -> i32 {
            0
        }

        fn default_sources(&self) -> Vec<Source> {
            self.0.clone()
        }

        fn supported_properties(&self) -> BTreeSet<String> {
            BTreeSet::new()
        }

        fn default_dialect(&self) -> Option<String> {
            None
        }

        fn connect(
            &self,
            _source: &Source,
            _context: &DriverContext,
        ) -> Result<Box<dyn Connection>, SourceError> {
            Err(SourceError::unsupported("catalog tests never connect"))
        }
    }

    fn source(id: &str, driver: &str) -> Source {
        Source::new(id, driver, Url::parse("https://stats.test/api").expect("url"))
            .expect("valid source")
    }

    #[test]
    fn custom_source_shadows_driver_default() {
        let drivers: Vec<Arc<dyn Driver>> = vec![Arc::new(Defaults(vec![source("ECB", "D")]))];
        let catalog = SourceCatalog::build(&[source("ECB", "CUSTOM")], &drivers);

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.resolve("ECB").map(Source::driver), Some("CUSTOM"));
    }

    #[test]
    fn aliases_resolve_to_copies_with_alias_id() {
        let ecb = source("ECB", "D").with_alias("BCE").expect("alias");
        let drivers: Vec<Arc<dyn Driver>> = vec![Arc::new(Defaults(vec![ecb]))];
        let catalog = SourceCatalog::build(&[], &drivers);

        let alias = catalog.resolve("BCE").expect("alias entry");
        assert_eq!(alias.id(), "BCE");
        assert!(alias.is_alias());
        assert_eq!(
            catalog.sources().keys().cloned().collect::<Vec<_>>(),
            vec!["BCE", "ECB"]
        );
    }

    #[test]
    fn alias_colliding_with_later_canonical_id_wins() {
        let drivers: Vec<Arc<dyn Driver>> = vec![Arc::new(Defaults(vec![
            source("A", "D").with_alias("B").expect("alias"),
            source("B", "D"),
        ]))];
        let catalog = SourceCatalog::build(&[], &drivers);

        let b = catalog.resolve("B").expect("entry");
        assert!(b.is_alias());
        assert!(b.aliases().contains("B"));
    }

    #[test]
    fn earlier_registered_driver_wins_duplicate_ids() {
        let drivers: Vec<Arc<dyn Driver>> = vec![
            Arc::new(Defaults(vec![source("ECB", "FIRST")])),
            Arc::new(Defaults(vec![source("ECB", "SECOND"), source("IMF", "SECOND")])),
        ];
        let catalog = SourceCatalog::build(&[], &drivers);

        assert_eq!(catalog.resolve("ECB").map(Source::driver), Some("FIRST"));
        assert_eq!(catalog.resolve("IMF").map(Source::driver), Some("SECOND"));
    }

    #[test]
    fn unknown_name_is_absent() {
        let catalog = SourceCatalog::build(&[source("ECB", "D")], &[]);
        assert!(catalog.resolve("unknown").is_none());
    }
}
