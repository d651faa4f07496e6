//! The registry of known blob-servers and the dispatch order over them.
//!
//! Built once at startup from the config files or the command line, then
//! shared read-only; nothing mutates it at request time.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single back-end blob-server: where it lives and which replication
/// group it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobServer {
    pub location: String,
    pub group: String,
}

/// The set of blob-servers known to this process, in insertion order.
#[derive(Debug, Default)]
pub struct ServerRegistry {
    servers: Vec<BlobServer>,
}

impl ServerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a server to the registry. Locations are kept without a
    /// trailing slash so request paths can be appended directly.
    pub fn add_server(&mut self, group: impl Into<String>, location: impl Into<String>) {
        let server = BlobServer {
            location: location.into().trim_end_matches('/').to_string(),
            group: group.into(),
        };

        if self.servers.contains(&server) {
            tracing::warn!(
                group = %server.group,
                location = %server.location,
                "duplicate blob-server entry in configuration"
            );
        }

        self.servers.push(server);
    }

    /// Every known server, in insertion order.
    pub fn servers(&self) -> &[BlobServer] {
        &self.servers
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Distinct group names, in first-appearance order.
    pub fn groups(&self) -> Vec<String> {
        let mut groups: Vec<String> = Vec::new();
        for entry in &self.servers {
            if !groups.iter().any(|group| group == &entry.group) {
                groups.push(entry.group.clone());
            }
        }
        groups
    }

    /// Members of `group`, in insertion order.
    pub fn group_members(&self, group: &str) -> Vec<BlobServer> {
        self.servers
            .iter()
            .filter(|entry| entry.group == group)
            .cloned()
            .collect()
    }

    /// The dispatch order used for uploads and downloads: the first member
    /// of each group, then the second member of each group, and so on.
    ///
    /// Until replication converges, different groups are the likeliest to
    /// hold disjoint content, so visiting one candidate per group first
    /// minimizes the expected number of lookups.
    ///
    /// Equivalent to a stable sort of the registry by (rank within group,
    /// group first-appearance index).
    pub fn ordered_servers(&self) -> Vec<BlobServer> {
        let groups = self.groups();
        let group_index: HashMap<&str, usize> = groups
            .iter()
            .enumerate()
            .map(|(index, group)| (group.as_str(), index))
            .collect();

        let mut ranks: HashMap<&str, usize> = HashMap::new();
        let mut keyed: Vec<(usize, usize, BlobServer)> = Vec::with_capacity(self.servers.len());
        for entry in &self.servers {
            let rank = ranks.entry(entry.group.as_str()).or_insert(0);
            keyed.push((*rank, group_index[entry.group.as_str()], entry.clone()));
            *rank += 1;
        }

        keyed.sort_by_key(|(rank, gidx, _)| (*rank, *gidx));
        keyed.into_iter().map(|(_, _, entry)| entry).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_of(entries: &[(&str, &str)]) -> ServerRegistry {
        let mut registry = ServerRegistry::new();
        for (group, location) in entries {
            registry.add_server(*group, *location);
        }
        registry
    }

    fn locations(servers: &[BlobServer]) -> Vec<&str> {
        servers.iter().map(|s| s.location.as_str()).collect()
    }

    #[test]
    fn groups_in_first_appearance_order() {
        let registry = registry_of(&[("g2", "b"), ("g1", "a"), ("g2", "c"), ("g3", "d")]);
        assert_eq!(registry.groups(), vec!["g2", "g1", "g3"]);
    }

    #[test]
    fn group_members_preserve_insertion_order() {
        let registry = registry_of(&[("g1", "a"), ("g2", "c"), ("g1", "b")]);
        assert_eq!(locations(&registry.group_members("g1")), vec!["a", "b"]);
        assert_eq!(locations(&registry.group_members("g2")), vec!["c"]);
        assert!(registry.group_members("missing").is_empty());
    }

    #[test]
    fn dispatch_order_round_robins_across_groups() {
        let registry = registry_of(&[
            ("g1", "A"),
            ("g1", "B"),
            ("g2", "C"),
            ("g2", "D"),
            ("g3", "E"),
            ("g3", "F"),
            ("g3", "G"),
        ]);

        let ordered = registry.ordered_servers();
        assert_eq!(locations(&ordered), vec!["A", "C", "E", "B", "D", "F", "G"]);
    }

    #[test]
    fn dispatch_order_is_a_permutation() {
        let registry = registry_of(&[
            ("g1", "a"),
            ("g2", "b"),
            ("g1", "c"),
            ("g3", "d"),
            ("g2", "e"),
        ]);

        let mut ordered = registry.ordered_servers();
        let mut all = registry.servers().to_vec();
        ordered.sort_by(|a, b| a.location.cmp(&b.location));
        all.sort_by(|a, b| a.location.cmp(&b.location));
        assert_eq!(ordered, all);
    }

    #[test]
    fn dispatch_order_imbalance_is_bounded() {
        let registry = registry_of(&[
            ("g1", "a"),
            ("g1", "b"),
            ("g1", "c"),
            ("g2", "d"),
            ("g2", "e"),
            ("g3", "f"),
        ]);

        let ordered = registry.ordered_servers();
        for prefix_len in 1..=ordered.len() {
            let mut counts: HashMap<&str, usize> = HashMap::new();
            for entry in &ordered[..prefix_len] {
                *counts.entry(entry.group.as_str()).or_insert(0) += 1;
            }
            // Only groups that still had members to contribute may differ,
            // and never by more than one.
            let max = counts.values().copied().max().unwrap_or(0);
            let min = registry
                .groups()
                .iter()
                .filter(|group| registry.group_members(group).len() >= max)
                .map(|group| counts.get(group.as_str()).copied().unwrap_or(0))
                .min()
                .unwrap_or(0);
            assert!(max - min <= 1, "imbalance at prefix {}", prefix_len);
        }
    }

    #[test]
    fn single_group_keeps_insertion_order() {
        let registry = registry_of(&[("default", "a"), ("default", "b"), ("default", "c")]);
        assert_eq!(locations(&registry.ordered_servers()), vec!["a", "b", "c"]);
    }

    #[test]
    fn trailing_slashes_are_trimmed() {
        let registry = registry_of(&[("default", "http://node1.example.com:3333/")]);
        assert_eq!(
            registry.servers()[0].location,
            "http://node1.example.com:3333"
        );
    }
}
