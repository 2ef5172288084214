use super::{Bin, Bins, Store};
use crate::schema::StoreSchema;

/// A dense store that collapses highest-indexed bins when its bin limit is exceeded.
///
/// The mirror image of [`CollapsingLowestDenseStore`][super::CollapsingLowestDenseStore]: at most `max_num_bins`
/// distinct bins are kept, and when an insertion would exceed that, the highest-indexed bins are merged into the
/// highest retained bin, which from then on absorbs every count at or above its index. Accuracy is permanently
/// degraded for the collapsed range; queries landing strictly inside the retained range keep the full
/// relative-error guarantee.
///
/// Use this store when the lower quantiles (p1, p5) matter most.
#[derive(Clone, Debug)]
pub struct CollapsingHighestDenseStore {
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

impl CollapsingHighestDenseStore {
    /// Creates an empty `CollapsingHighestDenseStore` with the given maximum number of bins.
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
    /// If true, accuracy guarantees no longer hold for the highest quantiles.
    pub fn is_collapsed(&self) -> bool {
        self.is_collapsed
    }

    /// Extends the addressable range to cover the given index, collapsing high bins when the limit does not allow
    /// growing.
    fn grow(&mut self, index: i32) {
        if self.bins.is_empty() {
            self.bins.push(0);
            self.offset = index;
            return;
        }

        if index >= self.offset + self.bins.len() as i32 {
            let needed = (index - self.offset) as usize + 1;
            if needed > self.max_num_bins {
                // The index is above the range the limit allows: the highest retained bin absorbs the count.
                self.is_collapsed = true;
                return;
            }

            let new_len = needed.max(self.bins.len() * 2).min(self.max_num_bins);
            self.bins.resize(new_len, 0);
        } else if index < self.offset {
            let needed = (self.offset - index) as usize + self.bins.len();
            if needed > self.max_num_bins {
                // Slide the window down so it starts at `index`, merging everything above the new highest
                // retained index.
                self.collapse_above(index + self.max_num_bins as i32 - 1);
            }

            let shift = (self.offset - index) as usize;
            let new_len = (shift + self.bins.len()).max(self.bins.len() * 2).min(self.max_num_bins);
            let lead = new_len - self.bins.len();

            let mut new_bins = vec![0u64; new_len];
            new_bins[lead..].copy_from_slice(&self.bins);
            self.bins = new_bins;
            self.offset -= lead as i32;
        }
    }

    /// Merges every bin above `new_top` into the bin at `new_top`.
    fn collapse_above(&mut self, new_top: i32) {
        self.is_collapsed = true;

        let top = self.offset + self.bins.len() as i32 - 1;
        let n = (top - new_top) as usize;
        if n >= self.bins.len() {
            // The entire current window sits above the new one.
            let collapsed: u64 = self.bins.iter().sum();
            self.bins.clear();
            self.bins.push(collapsed);
            self.offset = new_top;
        } else {
            let split = self.bins.len() - n;
            let collapsed: u64 = self.bins[split..].iter().sum();
            self.bins[split - 1] = self.bins[split - 1].saturating_add(collapsed);
            self.bins.truncate(split);
        }
    }

    /// Returns the index into the bins array for the given logical index.
    ///
    /// Indices above the addressable range map to the highest retained bin; `grow` guarantees the range covers
    /// everything below.
    #[inline]
    fn bin_index(&self, index: i32) -> usize {
        if index >= self.offset + self.bins.len() as i32 {
            self.bins.len() - 1
        } else {
            (index - self.offset) as usize
        }
    }
}

impl Store for CollapsingHighestDenseStore {
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
                let start = (min_index - self.offset) as usize;
                let end = (max_index - self.offset) as usize;
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
impl PartialEq for CollapsingHighestDenseStore {
    fn eq(&self, other: &Self) -> bool {
        self.count == other.count
            && self.max_num_bins == other.max_num_bins
            && self.is_collapsed == other.is_collapsed
            && self.bins().eq(other.bins())
    }
}

impl Eq for CollapsingHighestDenseStore {}

impl Default for CollapsingHighestDenseStore {
    /// Creates a collapsing highest dense store with a default limit of 2048 bins.
    fn default() -> Self {
        Self::new(2048)
    }
}
