use std::fmt::Display;

/// Operational phase reported by the upstream node.
///
/// The upstream label set is open-ended; anything not listed here collapses
/// into [NodeStatus::Unknown].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeStatus {
    #[default]
    Unknown,
    Peering,
    Syncing,
    Ready,
    Mining,
}

impl NodeStatus {
    /// Numeric code published on the `status` gauge.
    pub fn code(self) -> i64 {
        match self {
            NodeStatus::Peering => 1,
            NodeStatus::Syncing => 2,
            NodeStatus::Ready => 3,
            NodeStatus::Mining => 4,
            NodeStatus::Unknown => 0,
        }
    }
}

impl From<&str> for NodeStatus {
    fn from(label: &str) -> Self {
        match label {
            "Peering" => NodeStatus::Peering,
            "Syncing" => NodeStatus::Syncing,
            "Ready" => NodeStatus::Ready,
            "Mining" => NodeStatus::Mining,
            _ => NodeStatus::Unknown,
        }
    }
}

impl Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            NodeStatus::Peering => "Peering",
            NodeStatus::Syncing => "Syncing",
            NodeStatus::Ready => "Ready",
            NodeStatus::Mining => "Mining",
            NodeStatus::Unknown => "Unknown",
        };
        write!(f, "{label}")
    }
}

/// Maps an upstream status label to its gauge code. Labels are case sensitive.
pub fn status_code(label: &str) -> i64 {
    NodeStatus::from(label).code()
}

/// Node state as decoded from a single `getnodestate` call
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeState {
    /// Raw status label as sent by the node
    pub status: String,
    pub block_height: u64,
}

impl NodeState {
    pub fn node_status(&self) -> NodeStatus {
        NodeStatus::from(self.status.as_str())
    }

    pub fn status_code(&self) -> i64 {
        self.node_status().code()
    }
}
