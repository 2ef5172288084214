use super::{Bin, Bins, Store};
use crate::schema::StoreSchema;

/// A dense store that collapses lowest-indexed bins when its bin limit is exceeded.
///
/// This store keeps at most `max_num_bins` distinct bins. When an insertion would require addressing more bins than
/// that, the lowest-indexed bins are merged into the lowest retained bin, which from then on absorbs every count at
/// or below its index. Collapsing is one-way: accuracy is permanently degraded for the collapsed range, while
/// queries landing strictly inside the retained range keep the full relative-error guarantee.
///
/// Use this store when a hard memory ceiling matters more than accuracy at the lower quantiles, e.g. when tracking
/// latencies where the tail (p95, p99) is what counts.
#[derive(Clone, Debug)]
pub struct CollapsingLowestDenseStore {
    /// The bin counts, stored contiguously.
    bins: Vec<u64>,

    /// The count stored in `bins[0]` corresponds to this index.
    offset: i32,

    /// Maximum number of bins to maintain.
    max_num_bins: usize,

    /// Total count across all bins.
    count: u64,

    /// Whether collapsing has occurred.
    is_collapsed: bool,
}

impl CollapsingLowestDenseStore {
    /// Creates an empty `CollapsingLowestDenseStore` with the given maximum number of bins.
    pub fn new(max_num_bins: usize) -> Self {
        assert!(max_num_bins >= 1, "max_num_bins must be at least 1");
        Self {
            bins: Vec::new(),
            offset: 0,
            max_num_bins,
            count: 0,
            is_collapsed: false,
        }
    }

    /// Returns the configured maximum number of bins.
    pub fn max_num_bins(&self) -> usize {
        self.max_num_bins
    }

    /// Returns `true` if this store has collapsed bins.
    ///
    /// If true, accuracy guarantees no longer hold for the lowest quantiles.
    pub fn is_collapsed(&self) -> bool {
        self.is_collapsed
    }

    /// Extends the addressable range to cover the given index, collapsing low bins when the limit does not allow
    /// growing.
    fn grow(&mut self, index: i32) {
        if self.bins.is_empty() {
            self.bins.push(0);
            self.offset = index;
            return;
        }

        if index < self.offset {
            let needed = (self.offset - index) as usize + self.bins.len();
            if needed > self.max_num_bins {
                // The index is below the range the limit allows: the lowest retained bin absorbs the count.
                self.is_collapsed = true;
                return;
            }

            let new_len = needed.max(self.bins.len() * 2).min(self.max_num_bins);
            let shift = new_len - self.bins.len();

            let mut new_bins = vec![0u64; new_len];
            new_bins[shift..].copy_from_slice(&self.bins);
            self.bins = new_bins;
            self.offset -= shift as i32;
        } else if index >= self.offset + self.bins.len() as i32 {
            let needed = (index - self.offset) as usize + 1;
            if needed > self.max_num_bins {
                // Slide the window up so it still ends at `index`, merging everything below the new lowest
                // retained index.
                let new_offset = index - (self.max_num_bins as i32 - 1);
                self.collapse_below(new_offset);
                self.bins.resize(self.max_num_bins, 0);
            } else {
                let new_len = needed.max(self.bins.len() * 2).min(self.max_num_bins);
                self.bins.resize(new_len, 0);
            }
        }
    }

    /// Merges every bin below `new_offset` into the bin at `new_offset`.
    fn collapse_below(&mut self, new_offset: i32) {
        self.is_collapsed = true;

        let n = (new_offset - self.offset) as usize;
        if n >= self.bins.len() {
            // The entire current window sits below the new one.
            let collapsed: u64 = self.bins.iter().sum();
            self.bins.clear();
            self.bins.push(collapsed);
        } else {
            let collapsed: u64 = self.bins[..n].iter().sum();
            self.bins[n] = self.bins[n].saturating_add(collapsed);
            self.bins.drain(..n);
        }
        self.offset = new_offset;
    }

    /// Returns the index into the bins array for the given logical index.
    ///
    /// Indices below the addressable range map to the lowest retained bin; `grow` guarantees the range covers
    /// everything above.
    #[inline]
    fn bin_index(&self, index: i32) -> usize {
        if index < self.offset {
            0
        } else {
            (index - self.offset) as usize
        }
    }
}

impl Store for CollapsingLowestDenseStore {
    fn add_with_count(&mut self, index: i32, count: u64) {
        if count == 0 {
            return;
        }

        self.grow(index);
        let bin_idx = self.bin_index(index);
        self.bins[bin_idx] = self.bins[bin_idx].saturating_add(count);
        self.count = self.count.saturating_add(count);
    }

    fn total_count(&self) -> u64 {
        self.count
    }

    fn min_index(&self) -> Option<i32> {
        self.bins
            .iter()
            .position(|&count| count > 0)
            .map(|i| self.offset + i as i32)
    }

    fn max_index(&self) -> Option<i32> {
        self.bins
            .iter()
            .rposition(|&count| count > 0)
            .map(|i| self.offset + i as i32)
    }

    fn key_at_rank(&self, rank: u64) -> Option<i32> {
        let mut cumulative = 0u64;
        for (i, &count) in self.bins.iter().enumerate() {
            cumulative += count;
            if cumulative > rank {
                return Some(self.offset + i as i32);
            }
        }

        self.max_index()
    }

    fn merge(&mut self, other: &Self) {
        if other.is_empty() {
            return;
        }

        if other.is_collapsed {
            self.is_collapsed = true;
        }

        for (i, &count) in other.bins.iter().enumerate() {
            if count > 0 {
                self.add_with_count(other.offset + i as i32, count);
            }
        }
    }

    fn bins(&self) -> Bins {
        let snapshot = self
            .bins
            .iter()
            .enumerate()
            .filter(|(_, &count)| count > 0)
            .map(|(i, &count)| Bin::new(self.offset + i as i32, count))
            .collect();
        Bins::from_snapshot(snapshot)
    }

    fn clear(&mut self) {
        self.bins.clear();
        self.offset = 0;
        self.count = 0;
        self.is_collapsed = false;
    }

    fn to_schema(&self) -> StoreSchema {
        let mut schema = match (self.min_index(), self.max_index()) {
            (Some(min_index), Some(max_index)) => {
                let start = self.bin_index(min_index);
                let end = self.bin_index(max_index);
                StoreSchema {
                    contiguous_bin_counts: self.bins[start..=end].iter().map(|&count| count as f64).collect(),
                    contiguous_bin_index_offset: min_index,
                    ..Default::default()
                }
            }
            _ => StoreSchema::default(),
        };
        schema.max_num_bins = Some(self.max_num_bins as u32);
        schema.collapsed = self.is_collapsed;
        schema
    }

    fn merge_from_schema(&mut self, schema: &StoreSchema) -> Result<(), crate::error::DeserializationError> {
        for bin in super::validate_schema_bins(schema)? {
            self.add_bin(bin);
        }
        if schema.collapsed {
            self.is_collapsed = true;
        }
        Ok(())
    }
}

// Equality over the logical bin contents and collapsing configuration; the backing array layout is not observable.
impl PartialEq for CollapsingLowestDenseStore {
    fn eq(&self, other: &Self) -> bool {
        self.count == other.count
            && self.max_num_bins == other.max_num_bins
            && self.is_collapsed == other.is_collapsed
            && self.bins().eq(other.bins())
    }
}

impl Eq for CollapsingLowestDenseStore {}

impl Default for CollapsingLowestDenseStore {
    /// Creates a collapsing lowest dense store with a default limit of 2048 bins.
    fn default() -> Self {
        Self::new(2048)
    }
}
