use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::MonitoringError;
use crate::types::HostName;

/// The addressed, typed envelope carried by the bus.
///
/// A message names its sender, a routing topic, a set of target hosts
/// and an ordered sequence of string payload parts. An empty target set
/// means broadcast: every subscriber of the topic delivers it.
///
/// Sender and topic are fixed at construction; targets and parts may be
/// extended or replaced up to the point the message is handed to
/// `send_message`. Receivers always get a deserialized copy, never the
/// publisher's instance.
///
/// Targets are kept in an ordered set, so [`targets_as_string`] and
/// [`for_each_target_do`] are deterministic.
///
/// [`targets_as_string`]: Message::targets_as_string
/// [`for_each_target_do`]: Message::for_each_target_do
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    sender: HostName,
    topic: String,
    targets: BTreeSet<HostName>,
    parts: Vec<String>,
}

impl Message {
    /// Create a targeted message.
    ///
    /// Any iterable of hosts and parts works: arrays, slices, `Vec`s
    /// and iterators all produce identical internal state.
    pub fn new<T, P, S>(
        sender: HostName,
        topic: impl Into<String>,
        targets: T,
        parts: P,
    ) -> Self
    where
        T: IntoIterator<Item = HostName>,
        P: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sender,
            topic: topic.into(),
            targets: targets.into_iter().collect(),
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a broadcast message (empty target set).
    pub fn broadcast<P, S>(sender: HostName, topic: impl Into<String>, parts: P) -> Self
    where
        P: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(sender, topic, std::iter::empty(), parts)
    }

    /// The sender's hostname.
    pub fn sender(&self) -> &HostName {
        &self.sender
    }

    /// The routing topic.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The payload parts, in insertion order.
    pub fn message_parts(&self) -> &[String] {
        &self.parts
    }

    /// Whether the target set is empty (deliver to all subscribers).
    pub fn is_broadcast(&self) -> bool {
        self.targets.is_empty()
    }

    /// Whether `host` is in the target set.
    pub fn targets_contains(&self, host: &HostName) -> bool {
        self.targets.contains(host)
    }

    /// Append targets to the target set.
    pub fn add_targets<T>(&mut self, new_targets: T)
    where
        T: IntoIterator<Item = HostName>,
    {
        self.targets.extend(new_targets);
    }

    /// Clear the target set and re-set it.
    pub fn replace_targets<T>(&mut self, new_targets: T)
    where
        T: IntoIterator<Item = HostName>,
    {
        self.targets.clear();
        self.targets.extend(new_targets);
    }

    /// Append payload parts.
    pub fn add_message_parts<P, S>(&mut self, new_parts: P)
    where
        P: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parts.extend(new_parts.into_iter().map(Into::into));
    }

    /// Invoke `action` once per target, in target-set order, passing
    /// the supplied context each time.
    ///
    /// Lets callers fan out per-recipient side effects (ack
    /// bookkeeping and the like) without holding the target collection.
    pub fn for_each_target_do<A, F>(&self, mut action: F, context: &mut A)
    where
        F: FnMut(&HostName, &mut A),
    {
        for target in &self.targets {
            action(target, context);
        }
    }

    /// The targets as a deterministic, comma-joined string.
    pub fn targets_as_string(&self) -> String {
        let names: Vec<&str> = self.targets.iter().map(|t| t.as_str()).collect();
        names.join(",")
    }

    /// Serialize to MessagePack bytes for the transport.
    ///
    /// Sender, topic, targets and parts all round-trip.
    pub fn to_bytes(&self) -> Result<Vec<u8>, MonitoringError> {
        rmp_serde::to_vec(self).map_err(Into::into)
    }

    /// Deserialize from MessagePack bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, MonitoringError> {
        rmp_serde::from_slice(data).map_err(Into::into)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "topic='{}' sender='{}' targets='{}' parts='{}'",
            self.topic,
            self.sender,
            self.targets_as_string(),
            self.parts.join("|")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(name: &str) -> HostName {
        name.parse().unwrap()
    }

    fn sample() -> Message {
        Message::new(
            host("node-a"),
            "status",
            [host("node-b"), host("node-c")],
            ["part1", "part2"],
        )
    }

    #[test]
    fn construction_shapes_are_equivalent() {
        let from_array = Message::new(host("a"), "t", [host("x"), host("y")], ["p"]);
        let from_vec = Message::new(host("a"), "t", vec![host("x"), host("y")], vec!["p"]);
        let from_iter = Message::new(
            host("a"),
            "t",
            vec!["x", "y"].into_iter().map(|n| host(n)),
            std::iter::once("p".to_string()),
        );
        assert_eq!(from_array, from_vec);
        assert_eq!(from_array, from_iter);
    }

    #[test]
    fn broadcast_has_empty_targets() {
        let msg = Message::broadcast(host("a"), "t", ["p"]);
        assert!(msg.is_broadcast());
        assert!(!msg.targets_contains(&host("a")));
        assert_eq!(msg.targets_as_string(), "");
    }

    #[test]
    fn targets_contains() {
        let msg = sample();
        assert!(msg.targets_contains(&host("node-b")));
        assert!(msg.targets_contains(&host("node-c")));
        assert!(!msg.targets_contains(&host("node-a")));
    }

    #[test]
    fn add_targets_appends() {
        let mut msg = sample();
        msg.add_targets([host("node-d")]);
        assert!(msg.targets_contains(&host("node-b")));
        assert!(msg.targets_contains(&host("node-d")));
    }

    #[test]
    fn replace_targets_clears_first() {
        let mut msg = sample();
        msg.replace_targets([host("node-z")]);
        assert!(!msg.targets_contains(&host("node-b")));
        assert!(msg.targets_contains(&host("node-z")));
        assert_eq!(msg.targets_as_string(), "node-z");
    }

    #[test]
    fn duplicate_targets_collapse() {
        let mut msg = Message::new(host("a"), "t", [host("x"), host("x")], Vec::<String>::new());
        msg.add_targets([host("x")]);
        assert_eq!(msg.targets_as_string(), "x");
    }

    #[test]
    fn parts_preserve_insertion_order() {
        let mut msg = sample();
        msg.add_message_parts(["part3"]);
        assert_eq!(msg.message_parts(), &["part1", "part2", "part3"]);
    }

    #[test]
    fn for_each_target_do_visits_each_once() {
        let msg = Message::new(
            host("s"),
            "t",
            [host("a"), host("b"), host("c")],
            Vec::<String>::new(),
        );
        let mut visited: Vec<String> = Vec::new();
        msg.for_each_target_do(|target, seen| seen.push(target.to_string()), &mut visited);
        assert_eq!(visited, ["a", "b", "c"]);
    }

    #[test]
    fn targets_as_string_is_deterministic() {
        let forward = Message::new(host("s"), "t", [host("a"), host("b")], Vec::<String>::new());
        let reversed = Message::new(host("s"), "t", [host("b"), host("a")], Vec::<String>::new());
        assert_eq!(forward.targets_as_string(), "a,b");
        assert_eq!(reversed.targets_as_string(), "a,b");
    }

    #[test]
    fn roundtrip_msgpack() {
        let msg = sample();
        let bytes = msg.to_bytes().expect("serialize");
        let decoded = Message::from_bytes(&bytes).expect("deserialize");
        assert_eq!(msg, decoded);
    }

    #[test]
    fn roundtrip_broadcast_and_empty_parts() {
        let msg = Message::broadcast(host("a"), "alive", Vec::<String>::new());
        let bytes = msg.to_bytes().expect("serialize");
        let decoded = Message::from_bytes(&bytes).expect("deserialize");
        assert!(decoded.is_broadcast());
        assert!(decoded.message_parts().is_empty());
    }

    #[test]
    fn invalid_bytes_rejected() {
        assert!(Message::from_bytes(b"not a message").is_err());
    }

    #[test]
    fn display_renders_all_fields() {
        let msg = sample();
        let rendered = msg.to_string();
        assert!(rendered.contains("topic='status'"));
        assert!(rendered.contains("sender='node-a'"));
        assert!(rendered.contains("targets='node-b,node-c'"));
        assert!(rendered.contains("parts='part1|part2'"));
    }
}
