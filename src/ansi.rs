use std::collections::hash_map::Entry;
use std::collections::{HashMap, VecDeque};

/// An opaque 8-bit RGB triple
pub type Rgb = (u8, u8, u8);

/// Foreground (top pixel) and background (bottom pixel) of one terminal cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColorPair {
    pub fg: Rgb,
    pub bg: Rgb,
}

impl ColorPair {
    pub fn new(fg: Rgb, bg: Rgb) -> Self {
        Self { fg, bg }
    }
}

/// Build the truecolor escape sequence for a foreground and optional background color.
pub fn rgb_to_ansi(fg: Rgb, bg: Option<Rgb>) -> String {
    let mut code = format!("\x1b[38;2;{};{};{}m", fg.0, fg.1, fg.2);
    if let Some((r, g, b)) = bg {
        code.push_str(&format!("\x1b[48;2;{};{};{}m", r, g, b));
    }
    code
}

/// Default number of color pairs kept by [`AnsiCache`]
pub const DEFAULT_CACHE_CAPACITY: usize = 1 << 16;

struct CachedCode {
    code: String,
    last_used: u64,
}

/// Memoized [`rgb_to_ansi`] for cell color pairs, bounded by an LRU policy.
///
/// Recency is tracked with a queue of `(pair, tick)` stamps. Hits push a fresh
/// stamp instead of moving entries, and stale stamps are skipped at eviction
/// time, so both lookups and inserts stay O(1) amortized.
pub struct AnsiCache {
    entries: HashMap<ColorPair, CachedCode>,
    recency: VecDeque<(ColorPair, u64)>,
    capacity: usize,
    tick: u64,
    hits: u64,
    misses: u64,
}

impl AnsiCache {
    /// Create a cache holding at most `capacity` escape codes (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: HashMap::with_capacity(capacity.min(4096)),
            recency: VecDeque::new(),
            capacity,
            tick: 0,
            hits: 0,
            misses: 0,
        }
    }

    /// Resolve the escape code for a color pair, building and caching it on a miss
    pub fn get(&mut self, pair: ColorPair) -> &str {
        self.tick += 1;
        let tick = self.tick;

        if !self.entries.contains_key(&pair) && self.entries.len() >= self.capacity {
            self.evict_one();
        }

        self.recency.push_back((pair, tick));
        if self.recency.len() > self.capacity * 4 {
            self.compact();
        }

        match self.entries.entry(pair) {
            Entry::Occupied(occupied) => {
                self.hits += 1;
                let cached = occupied.into_mut();
                cached.last_used = tick;
                &cached.code
            }
            Entry::Vacant(vacant) => {
                self.misses += 1;
                let cached = vacant.insert(CachedCode {
                    code: rgb_to_ansi(pair.fg, Some(pair.bg)),
                    last_used: tick,
                });
                &cached.code
            }
        }
    }

    fn evict_one(&mut self) {
        while let Some((pair, stamp)) = self.recency.pop_front() {
            let current = self.entries.get(&pair).map(|cached| cached.last_used);
            if current == Some(stamp) {
                self.entries.remove(&pair);
                return;
            }
        }
    }

    // Drop stamps that no longer match their entry's latest use.
    fn compact(&mut self) {
        let entries = &self.entries;
        self.recency
            .retain(|(pair, stamp)| entries.get(pair).map(|c| c.last_used) == Some(*stamp));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// (hits, misses) since creation
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }
}

impl Default for AnsiCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
