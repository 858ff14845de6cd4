//! Cache hit/miss statistics

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Hit and miss tally for one cache.
///
/// All counters use `Ordering::Relaxed`; they are independent tallies and a
/// disabled counter records nothing.
#[derive(Debug, Default)]
pub struct CacheCounter {
    hits: AtomicU64,
    misses: AtomicU64,
    enabled: bool,
}

impl CacheCounter {
    /// Create a counter
    pub fn new(enabled: bool) -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            enabled,
        }
    }

    /// Record a cache hit
    #[inline]
    pub fn hit(&self) {
        if self.enabled {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a cache miss
    #[inline]
    pub fn miss(&self) {
        if self.enabled {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Snapshot the counters together with the current entry count
    pub fn snapshot(&self, size: usize) -> CacheStat {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStat {
            hits,
            misses,
            size,
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
        }
    }
}

/// Statistics for one cache
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStat {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that had to query or compile
    pub misses: u64,
    /// Current number of entries
    pub size: usize,
    /// `hits / (hits + misses)`, 0.0 when unused
    pub hit_rate: f64,
}

impl fmt::Display for CacheStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits: {:>8}, misses: {:>8}, hit_rate: {:>6.2}%, size: {:>8}",
            self.hits,
            self.misses,
            self.hit_rate * 100.0,
            self.size
        )
    }
}

/// Statistics for every cache owned by a [`Reflector`](crate::Reflector)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    /// Type name resolution
    pub types: CacheStat,
    /// Field descriptors
    pub fields: CacheStat,
    /// Property descriptors
    pub properties: CacheStat,
    /// Method descriptors
    pub methods: CacheStat,
    /// Method overload groups
    pub overloads: CacheStat,
    /// Constructor descriptors
    pub constructors: CacheStat,
    /// Compiled getters
    pub getters: CacheStat,
    /// Compiled setters
    pub setters: CacheStat,
    /// No-argument factories
    pub factories: CacheStat,
    /// Bound invokers
    pub invokers: CacheStat,
}

impl CacheStats {
    fn all(&self) -> [&CacheStat; 10] {
        [
            &self.types,
            &self.fields,
            &self.properties,
            &self.methods,
            &self.overloads,
            &self.constructors,
            &self.getters,
            &self.setters,
            &self.factories,
            &self.invokers,
        ]
    }

    /// Entries across all caches
    pub fn total_entries(&self) -> usize {
        self.all().iter().map(|s| s.size).sum()
    }

    /// Hits across all caches
    pub fn total_hits(&self) -> u64 {
        self.all().iter().map(|s| s.hits).sum()
    }

    /// Misses across all caches
    pub fn total_misses(&self) -> u64 {
        self.all().iter().map(|s| s.misses).sum()
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Reflection Cache Statistics:")?;
        writeln!(f, "  Types:          {}", self.types)?;
        writeln!(f, "  Fields:         {}", self.fields)?;
        writeln!(f, "  Properties:     {}", self.properties)?;
        writeln!(f, "  Methods:        {}", self.methods)?;
        writeln!(f, "  Overloads:      {}", self.overloads)?;
        writeln!(f, "  Constructors:   {}", self.constructors)?;
        writeln!(f, "  Getters:        {}", self.getters)?;
        writeln!(f, "  Setters:        {}", self.setters)?;
        writeln!(f, "  Factories:      {}", self.factories)?;
        writeln!(f, "  Invokers:       {}", self.invokers)?;
        Ok(())
    }
}
