//! In-process loopback transport
//!
//! Records every issued operation and lets the caller inject transport
//! events. The gateway binary uses it as its built-in development transport;
//! integration tests script it to drive whole session lifecycles.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::jid::Jid;
use crate::message::{InboundMessage, MessageKey};
use crate::transport::{
    Connection, Connector, GroupMetadata, GroupSetting, OutgoingMessage, ParticipantAction,
    Transport, TransportEvent,
};

/// One operation issued against a [`MemoryTransport`]
#[derive(Debug, Clone, PartialEq)]
pub enum SentOp {
    Send {
        to: Jid,
        message: OutgoingMessage,
    },
    Delete {
        conversation: Jid,
        key: MessageKey,
    },
    Participants {
        group: Jid,
        targets: Vec<Jid>,
        action: ParticipantAction,
    },
    Setting {
        group: Jid,
        setting: GroupSetting,
    },
    Subject {
        group: Jid,
        subject: String,
    },
}

/// Loopback transport recording operations and replaying injected events
pub struct MemoryTransport {
    ops: Mutex<Vec<SentOp>>,
    groups: Mutex<HashMap<Jid, GroupMetadata>>,
    open: AtomicBool,
    events: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
}

impl MemoryTransport {
    /// Create a transport and the event stream its connection exposes
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            ops: Mutex::new(Vec::new()),
            groups: Mutex::new(HashMap::new()),
            open: AtomicBool::new(true),
            events: Mutex::new(Some(tx)),
        });
        (transport, rx)
    }

    /// Inject a transport event into the connection's event stream
    pub fn push_event(&self, event: TransportEvent) {
        if let Some(tx) = self.events.lock().unwrap().as_ref() {
            let _ = tx.send(event);
        }
    }

    /// End the event stream without a close event, as a transport whose
    /// internal connection died would
    pub fn end_events(&self) {
        self.events.lock().unwrap().take();
    }

    /// Configure the metadata returned for a group
    pub fn set_group(&self, meta: GroupMetadata) {
        self.groups.lock().unwrap().insert(meta.id.clone(), meta);
    }

    /// Snapshot of every operation issued so far
    pub fn ops(&self) -> Vec<SentOp> {
        self.ops.lock().unwrap().clone()
    }

    /// Text bodies of every `Send` op, in order
    pub fn sent_texts(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                SentOp::Send {
                    message: OutgoingMessage::Text { text, .. },
                    ..
                } => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Number of `Delete` ops issued
    pub fn delete_count(&self) -> usize {
        self.ops()
            .iter()
            .filter(|op| matches!(op, SentOp::Delete { .. }))
            .count()
    }

    /// Convenience: inject an inbound chat message
    pub fn deliver(&self, message: InboundMessage) {
        self.push_event(TransportEvent::Message(Box::new(message)));
    }

    fn record(&self, op: SentOp) -> Result<()> {
        if !self.is_open() {
            return Err(Error::Transport("connection closed".to_string()));
        }
        self.ops.lock().unwrap().push(op);
        Ok(())
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, to: &Jid, message: OutgoingMessage) -> Result<()> {
        self.record(SentOp::Send {
            to: to.clone(),
            message,
        })
    }

    async fn delete(&self, conversation: &Jid, key: &MessageKey) -> Result<()> {
        self.record(SentOp::Delete {
            conversation: conversation.clone(),
            key: key.clone(),
        })
    }

    async fn group_metadata(&self, group: &Jid) -> Result<GroupMetadata> {
        self.groups
            .lock()
            .unwrap()
            .get(group)
            .cloned()
            .ok_or_else(|| Error::Transport(format!("unknown group: {group}")))
    }

    async fn update_participants(
        &self,
        group: &Jid,
        targets: &[Jid],
        action: ParticipantAction,
    ) -> Result<()> {
        self.record(SentOp::Participants {
            group: group.clone(),
            targets: targets.to_vec(),
            action,
        })
    }

    async fn update_setting(&self, group: &Jid, setting: GroupSetting) -> Result<()> {
        self.record(SentOp::Setting {
            group: group.clone(),
            setting,
        })
    }

    async fn update_subject(&self, group: &Jid, subject: &str) -> Result<()> {
        self.record(SentOp::Subject {
            group: group.clone(),
            subject: subject.to_string(),
        })
    }

    async fn close(&self) -> Result<()> {
        self.open.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

/// Handle to one connection opened through a [`MemoryConnector`]
#[derive(Clone)]
pub struct MemoryHandle {
    pub auth_dir: PathBuf,
    pub transport: Arc<MemoryTransport>,
}

/// Loopback connector; every `connect` opens a fresh [`MemoryTransport`]
#[derive(Default)]
pub struct MemoryConnector {
    handles: Mutex<Vec<MemoryHandle>>,
    fail_next: AtomicBool,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `connect` fail with a credential-load error
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Every connection opened so far, oldest first
    pub fn handles(&self) -> Vec<MemoryHandle> {
        self.handles.lock().unwrap().clone()
    }

    /// The most recently opened connection
    pub fn last(&self) -> Option<MemoryHandle> {
        self.handles.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, auth_dir: &Path) -> Result<Connection> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(Error::CredentialLoad(format!(
                "unreadable auth state in {}",
                auth_dir.display()
            )));
        }
        let (transport, events) = MemoryTransport::new();
        self.handles.lock().unwrap().push(MemoryHandle {
            auth_dir: auth_dir.to_path_buf(),
            transport: transport.clone(),
        });
        Ok(Connection { transport, events })
    }
}
