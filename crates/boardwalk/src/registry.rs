//! Which local connections are watching which room.
//!
//! Each connection hands the registry the sender half of its outbound
//! queue when it enters a room. Broadcasting is then a synchronous walk
//! over the room's senders; actual socket writes happen on each
//! connection's writer task.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::mpsc::UnboundedSender;

use boardwalk_game::RoomCode;
use boardwalk_transport::ConnectionId;

#[derive(Default)]
pub struct RoomRegistry {
    rooms: Mutex<HashMap<RoomCode, HashMap<ConnectionId, UnboundedSender<Vec<u8>>>>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection as a watcher of `room`. A connection
    /// watches at most one room; re-joining moves it.
    pub fn join(&self, room: &RoomCode, conn: ConnectionId, sender: UnboundedSender<Vec<u8>>) {
        let mut rooms = self.rooms.lock().unwrap_or_else(|e| e.into_inner());
        for members in rooms.values_mut() {
            members.remove(&conn);
        }
        rooms.entry(room.clone()).or_default().insert(conn, sender);
    }

    /// Removes a connection from `room`, dropping the room entry when
    /// it empties.
    pub fn leave(&self, room: &RoomCode, conn: ConnectionId) {
        let mut rooms = self.rooms.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(members) = rooms.get_mut(room) {
            members.remove(&conn);
            if members.is_empty() {
                rooms.remove(room);
            }
        }
    }

    /// Queues `bytes` to every watcher of `room`. Connections whose
    /// writer task has exited are dropped from the room. Returns how
    /// many queues accepted the message.
    pub fn broadcast(&self, room: &RoomCode, bytes: &[u8]) -> usize {
        let mut rooms = self.rooms.lock().unwrap_or_else(|e| e.into_inner());
        let Some(members) = rooms.get_mut(room) else {
            return 0;
        };
        members.retain(|_, sender| sender.send(bytes.to_vec()).is_ok());
        members.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    fn code(s: &str) -> RoomCode {
        RoomCode::normalized(s)
    }

    #[test]
    fn test_broadcast_reaches_all_members() {
        let registry = RoomRegistry::new();
        let (tx1, mut rx1) = unbounded_channel();
        let (tx2, mut rx2) = unbounded_channel();
        registry.join(&code("AAAAAA"), ConnectionId::new(1), tx1);
        registry.join(&code("AAAAAA"), ConnectionId::new(2), tx2);

        assert_eq!(registry.broadcast(&code("AAAAAA"), b"hi"), 2);
        assert_eq!(rx1.try_recv().unwrap(), b"hi".to_vec());
        assert_eq!(rx2.try_recv().unwrap(), b"hi".to_vec());
    }

    #[test]
    fn test_broadcast_skips_other_rooms() {
        let registry = RoomRegistry::new();
        let (tx, mut rx) = unbounded_channel();
        registry.join(&code("AAAAAA"), ConnectionId::new(1), tx);
        assert_eq!(registry.broadcast(&code("BBBBBB"), b"hi"), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_rejoining_moves_the_connection() {
        let registry = RoomRegistry::new();
        let (tx, mut rx) = unbounded_channel();
        registry.join(&code("AAAAAA"), ConnectionId::new(1), tx.clone());
        registry.join(&code("BBBBBB"), ConnectionId::new(1), tx);

        assert_eq!(registry.broadcast(&code("AAAAAA"), b"old"), 0);
        assert_eq!(registry.broadcast(&code("BBBBBB"), b"new"), 1);
        assert_eq!(rx.try_recv().unwrap(), b"new".to_vec());
    }

    #[test]
    fn test_dead_senders_are_pruned_on_broadcast() {
        let registry = RoomRegistry::new();
        let (tx, rx) = unbounded_channel();
        registry.join(&code("AAAAAA"), ConnectionId::new(1), tx);
        drop(rx);
        assert_eq!(registry.broadcast(&code("AAAAAA"), b"hi"), 0);
    }

    #[test]
    fn test_leave_removes_membership() {
        let registry = RoomRegistry::new();
        let (tx, _rx) = unbounded_channel();
        registry.join(&code("AAAAAA"), ConnectionId::new(1), tx);
        registry.leave(&code("AAAAAA"), ConnectionId::new(1));
        assert_eq!(registry.broadcast(&code("AAAAAA"), b"hi"), 0);
    }
}
