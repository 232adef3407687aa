use crate::{
    core::{Task, TaskId, TaskKind},
    error::Result,
    packet::Packet,
};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// One task descriptor of the packet input format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Job {
    #[serde(alias = "num")]
    pub id: TaskId,
    #[serde(alias = "type")]
    pub kind: TaskKind,
    pub memory: u64,
}

impl Job {
    pub fn into_task(self) -> Task {
        Task::new(self.id, self.kind, self.memory)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketFile {
    pub tasks: Vec<Job>,
}

pub fn parse_packet(json: &str) -> Result<Packet> {
    let file: PacketFile = serde_json::from_str(json)?;
    Packet::from_jobs(file.tasks)
}

pub fn load_packet(path: impl AsRef<Path>) -> Result<Packet> {
    let json = fs::read_to_string(path)?;
    parse_packet(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::SimError, packet::PacketShape};

    #[test]
    fn parses_current_format() {
        let packet = parse_packet(
            r#"{"tasks": [
                {"id": 1, "kind": "COMPUTE", "memory": 512},
                {"id": 2, "kind": "IO", "memory": 64}
            ]}"#,
        )
        .unwrap();

        assert_eq!(packet.len(), 2);
        assert_eq!(packet.task(1).unwrap().kind, TaskKind::Compute);
        assert_eq!(packet.task(2).unwrap().memory, 64);
        assert_eq!(packet.shape(), Some(PacketShape::EqualSplit));
    }

    #[test]
    fn parses_legacy_field_names() {
        let packet = parse_packet(
            r#"{"tasks": [
                {"num": 3, "type": "MATH", "memory": 100},
                {"num": 4, "type": "INOUT", "memory": 200},
                {"num": 5, "type": "INOUT", "memory": 300}
            ]}"#,
        )
        .unwrap();

        assert_eq!(packet.ids().collect::<Vec<_>>(), vec![3, 4, 5]);
        assert_eq!(packet.total_memory(), 600);
    }

    #[test]
    fn malformed_packets_fail() {
        assert!(matches!(
            parse_packet(r#"{"tasks": [{"id": 1, "kind": "COMPUTE"}]}"#),
            Err(SimError::Parse(_))
        ));
        assert!(matches!(
            parse_packet(r#"{"tasks": [{"id": 1, "kind": "GPU", "memory": 1}]}"#),
            Err(SimError::Parse(_))
        ));
        assert!(matches!(parse_packet("not json"), Err(SimError::Parse(_))));
        assert!(matches!(
            parse_packet(r#"{"tasks": []}"#),
            Err(SimError::EmptyPacket)
        ));
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("packet.json");
        fs::write(&path, r#"{"tasks": [{"id": 9, "kind": "IO", "memory": 1}]}"#).unwrap();

        let packet = load_packet(&path).unwrap();
        assert_eq!(packet.ids().collect::<Vec<_>>(), vec![9]);

        assert!(matches!(
            load_packet(dir.path().join("missing.json")),
            Err(SimError::Io(_))
        ));
    }
}
