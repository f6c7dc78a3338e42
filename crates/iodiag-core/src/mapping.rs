use crate::channel::{LogicalChannel, PhysicalAddress};
use crate::operator::DiInterface;
use crate::snapshot::DiPoint;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingEntry {
    pub physical: PhysicalAddress,
    pub logical: LogicalChannel,
}

/// A metadata entry that lost to an earlier claim on the same address or channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DroppedEntry {
    pub entry: MappingEntry,
    /// The entry that was kept in its place.
    pub kept: MappingEntry,
}

/// Physical-to-logical DI mapping, sorted by physical address.
///
/// Unique on both fields. Duplicates are resolved first-seen-wins in the
/// controller's metadata order; the losers stay visible in
/// [`dropped`](Self::dropped).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelMapping {
    entries: Vec<MappingEntry>,
    dropped: Vec<DroppedEntry>,
}

impl ChannelMapping {
    pub fn from_metadata<I>(metadata: I) -> Self
    where
        I: IntoIterator<Item = (LogicalChannel, DiPoint)>,
    {
        let mut by_physical: BTreeMap<PhysicalAddress, LogicalChannel> = BTreeMap::new();
        let mut by_logical: BTreeMap<LogicalChannel, PhysicalAddress> = BTreeMap::new();
        let mut dropped = Vec::new();

        for (logical, point) in metadata {
            let physical = point
                .physical_address
                .unwrap_or(PhysicalAddress(logical.0));
            let entry = MappingEntry { physical, logical };

            if let Some(&kept_logical) = by_physical.get(&physical) {
                dropped.push(DroppedEntry {
                    entry,
                    kept: MappingEntry {
                        physical,
                        logical: kept_logical,
                    },
                });
                continue;
            }
            if let Some(&kept_physical) = by_logical.get(&logical) {
                dropped.push(DroppedEntry {
                    entry,
                    kept: MappingEntry {
                        physical: kept_physical,
                        logical,
                    },
                });
                continue;
            }

            by_physical.insert(physical, logical);
            by_logical.insert(logical, physical);
        }

        let entries = by_physical
            .into_iter()
            .map(|(physical, logical)| MappingEntry { physical, logical })
            .collect();

        Self { entries, dropped }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn dropped(&self) -> &[DroppedEntry] {
        &self.dropped
    }

    /// Logical channels in ascending physical order.
    pub fn logical_channels(&self) -> impl Iterator<Item = LogicalChannel> + '_ {
        self.entries.iter().map(|entry| entry.logical)
    }

    pub fn expected_physical(&self, logical: LogicalChannel) -> Option<PhysicalAddress> {
        self.entries
            .iter()
            .find(|entry| entry.logical == logical)
            .map(|entry| entry.physical)
    }

    pub fn logical_for(&self, physical: PhysicalAddress) -> Option<LogicalChannel> {
        self.entries
            .binary_search_by_key(&physical, |entry| entry.physical)
            .ok()
            .map(|idx| self.entries[idx].logical)
    }
}

/// Build the mapping from a controller's DI metadata.
///
/// An absent DI interface yields an empty mapping, meaning "no physical
/// checks", not an error.
pub fn resolve_mapping(di: Option<&dyn DiInterface>) -> ChannelMapping {
    match di {
        Some(di) => ChannelMapping::from_metadata(di.di_metadata()),
        None => ChannelMapping::default(),
    }
}
