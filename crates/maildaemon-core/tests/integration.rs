//! Integration tests for the engine.
//!
//! An in-memory mail store plays the server side of IMAP-like connections,
//! so caches, filters, moves and the daemon loop run end to end without a
//! network.

#![allow(clippy::unwrap_used)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use maildaemon_core::{
    CacheState, Config, Connection, ConnectionGroup, ConnectionSettings, DaemonGroup, EmailCache,
    Error, FetchMode, FlagChange, FolderInfo, FolderStore, MessageFilter, MessageId,
    MessageSource, Protocol, RawMessage, Result, run_daemon_group,
};

#[derive(Debug, Clone)]
struct Stored {
    uid: u32,
    flags: BTreeSet<String>,
    internal_date: Option<String>,
    data: Vec<u8>,
}

/// Server-side state, shared with the test so it can be inspected after the
/// connection moved into a group.
#[derive(Debug, Default)]
struct Server {
    folders: BTreeMap<String, Vec<Stored>>,
    folder_flags: BTreeMap<String, BTreeSet<String>>,
    next_uid: u32,
    connected: bool,
    dead: bool,
    calls: Vec<String>,
    /// Folders whose SELECT is refused.
    unopenable: BTreeSet<String>,
    failing_list: bool,
    /// Leaves `\Deleted` messages in place when a folder is closed.
    keep_deleted: bool,
}

impl Server {
    fn with_folders(names: &[&str]) -> Arc<Mutex<Self>> {
        let mut server = Self {
            next_uid: 1,
            ..Self::default()
        };
        for name in names {
            server.folders.insert((*name).to_string(), Vec::new());
        }
        Arc::new(Mutex::new(server))
    }

    fn deliver(&mut self, folder: &str, data: &[u8]) -> u32 {
        let uid = self.next_uid;
        self.deliver_as(folder, uid, data);
        uid
    }

    fn deliver_as(&mut self, folder: &str, uid: u32, data: &[u8]) {
        self.next_uid = self.next_uid.max(uid + 1);
        self.folders.get_mut(folder).unwrap().push(Stored {
            uid,
            flags: BTreeSet::new(),
            internal_date: Some("17-Jul-1996 02:44:25 -0700".into()),
            data: data.to_vec(),
        });
    }

    fn expunge(&mut self, folder: &str) {
        if let Some(messages) = self.folders.get_mut(folder) {
            messages.retain(|stored| !stored.flags.contains("Deleted"));
        }
    }

    fn stored(&self, folder: &str, uid: u32) -> Option<&Stored> {
        self.folders.get(folder)?.iter().find(|stored| stored.uid == uid)
    }

    fn called(&self, op: &str) -> bool {
        self.calls.iter().any(|call| call.starts_with(op))
    }
}

struct MemoryConnection {
    settings: ConnectionSettings,
    server: Arc<Mutex<Server>>,
    open: Option<String>,
}

impl MemoryConnection {
    fn boxed(name: &str, server: &Arc<Mutex<Server>>) -> Box<dyn Connection> {
        Box::new(Self {
            settings: ConnectionSettings::new(name, Protocol::Imap, "mail.example.com"),
            server: server.clone(),
            open: None,
        })
    }

    fn refused(op: &str, args: impl ToString, reason: &str) -> Error {
        Error::OperationFailed {
            op: op.to_string(),
            args: args.to_string(),
            reason: reason.to_string(),
        }
    }

    fn open_folder_name(&self) -> Result<String> {
        self.open
            .clone()
            .ok_or_else(|| Self::refused("fetch", "", "no folder open"))
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    async fn connect(&mut self) -> Result<()> {
        self.server.lock().unwrap().connected = true;
        Ok(())
    }

    async fn is_alive(&mut self) -> bool {
        let server = self.server.lock().unwrap();
        server.connected && !server.dead
    }

    async fn disconnect(&mut self) -> Result<()> {
        let mut server = self.server.lock().unwrap();
        if let Some(folder) = self.open.take() {
            server.expunge(&folder);
        }
        server.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.server.lock().unwrap().connected
    }

    fn as_source(&mut self) -> Option<&mut dyn MessageSource> {
        Some(self)
    }

    fn as_folder_store(&mut self) -> Option<&mut dyn FolderStore> {
        Some(self)
    }
}

#[async_trait]
impl MessageSource for MemoryConnection {
    async fn list_folders(&mut self) -> Result<Vec<FolderInfo>> {
        let server = self.server.lock().unwrap();
        if server.failing_list {
            return Err(Self::refused("list", "*", "server busy"));
        }
        Ok(server
            .folders
            .keys()
            .map(|name| FolderInfo {
                name: name.clone(),
                flags: server.folder_flags.get(name).cloned().unwrap_or_default(),
                delimiter: Some('/'),
            })
            .collect())
    }

    async fn open_folder(&mut self, folder: &str) -> Result<()> {
        let mut server = self.server.lock().unwrap();
        if !server.folders.contains_key(folder) {
            return Err(Self::refused("open", folder, "no such folder"));
        }
        if server.unopenable.contains(folder) {
            return Err(Self::refused("open", folder, "permission denied"));
        }
        if self.open.as_deref() != Some(folder) {
            server.calls.push(format!("open {folder}"));
            self.open = Some(folder.to_string());
        }
        Ok(())
    }

    async fn close_folder(&mut self) -> Result<()> {
        let mut server = self.server.lock().unwrap();
        if let Some(folder) = self.open.take()
            && !server.keep_deleted
        {
            server.expunge(&folder);
        }
        Ok(())
    }

    async fn message_ids(&mut self) -> Result<Vec<MessageId>> {
        let folder = self.open_folder_name()?;
        let server = self.server.lock().unwrap();
        Ok(server.folders[&folder]
            .iter()
            .map(|stored| MessageId(stored.uid))
            .collect())
    }

    async fn fetch(&mut self, ids: &[MessageId], mode: FetchMode) -> Result<Vec<RawMessage>> {
        let folder = self.open_folder_name()?;
        let mut server = self.server.lock().unwrap();
        server.calls.push(format!("fetch {mode:?} {}", ids.len()));
        Ok(ids
            .iter()
            .filter_map(|id| server.stored(&folder, id.0))
            .map(|stored| {
                let data = match mode {
                    FetchMode::Full => stored.data.clone(),
                    FetchMode::Headers => {
                        let text = String::from_utf8_lossy(&stored.data);
                        let end = text.find("\r\n\r\n").map_or(text.len(), |i| i + 4);
                        text[..end].as_bytes().to_vec()
                    }
                };
                RawMessage {
                    id: MessageId(stored.uid),
                    flags: stored.flags.clone(),
                    internal_date: stored.internal_date.clone(),
                    data,
                }
            })
            .collect())
    }

    async fn fetch_flags(
        &mut self,
        ids: &[MessageId],
    ) -> Result<Vec<(MessageId, BTreeSet<String>)>> {
        let folder = self.open_folder_name()?;
        let mut server = self.server.lock().unwrap();
        server.calls.push(format!("fetch_flags {}", ids.len()));
        Ok(ids
            .iter()
            .filter_map(|id| server.stored(&folder, id.0))
            .map(|stored| (MessageId(stored.uid), stored.flags.clone()))
            .collect())
    }

    async fn delete(&mut self, folder: &str, id: MessageId) -> Result<()> {
        self.store_flags(folder, &[id], FlagChange::Add(vec!["Deleted".into()]), true)
            .await
    }
}

#[async_trait]
impl FolderStore for MemoryConnection {
    async fn store_flags(
        &mut self,
        folder: &str,
        ids: &[MessageId],
        change: FlagChange,
        _silent: bool,
    ) -> Result<()> {
        self.open_folder(folder).await?;
        let mut server = self.server.lock().unwrap();
        server.calls.push(format!("store {change}"));
        let messages = server.folders.get_mut(folder).unwrap();
        for stored in messages.iter_mut().filter(|s| ids.contains(&MessageId(s.uid))) {
            match &change {
                FlagChange::Add(flags) => stored.flags.extend(flags.iter().cloned()),
                FlagChange::Remove(flags) => stored.flags.retain(|f| !flags.contains(f)),
                FlagChange::Replace(flags) => stored.flags = flags.iter().cloned().collect(),
            }
        }
        Ok(())
    }

    async fn copy(&mut self, folder: &str, ids: &[MessageId], target: &str) -> Result<()> {
        if folder == target {
            return Err(Self::refused("copy", target, "same folder"));
        }
        self.open_folder(folder).await?;
        let mut server = self.server.lock().unwrap();
        if !server.folders.contains_key(target) {
            return Err(Self::refused("copy", target, "[TRYCREATE] no such folder"));
        }
        server.calls.push(format!("copy {target}"));
        let copies: Vec<Stored> = server.folders[folder]
            .iter()
            .filter(|s| ids.contains(&MessageId(s.uid)))
            .cloned()
            .collect();
        for mut stored in copies {
            stored.uid = server.next_uid;
            server.next_uid += 1;
            server.folders.get_mut(target).unwrap().push(stored);
        }
        Ok(())
    }

    async fn append(
        &mut self,
        folder: &str,
        message: &[u8],
        flags: &BTreeSet<String>,
        internal_date: Option<&str>,
    ) -> Result<()> {
        let mut server = self.server.lock().unwrap();
        if !server.folders.contains_key(folder) {
            return Err(Self::refused("append", folder, "[TRYCREATE] no such folder"));
        }
        server.calls.push(format!("append {folder}"));
        let uid = server.deliver(folder, message);
        let stored = server
            .folders
            .get_mut(folder)
            .unwrap()
            .iter_mut()
            .find(|s| s.uid == uid)
            .unwrap();
        stored.flags.clone_from(flags);
        stored.internal_date = internal_date.map(str::to_string);
        Ok(())
    }

    async fn expunge(&mut self, folder: &str) -> Result<()> {
        self.server.lock().unwrap().expunge(folder);
        Ok(())
    }
}

fn mail(from: &str, subject: &str) -> Vec<u8> {
    format!(
        "From: {from}\r\nTo: me@example.com\r\nSubject: {subject}\r\n\
         Date: Tue, 1 Jul 2003 10:52:37 +0200\r\n\r\nHello there.\r\n"
    )
    .into_bytes()
}

fn group_of(connections: &[(&str, &Arc<Mutex<Server>>)]) -> ConnectionGroup {
    let mut group = ConnectionGroup::new();
    for (name, server) in connections {
        group.insert(MemoryConnection::boxed(name, server));
    }
    group
}

fn source<'a>(group: &'a mut ConnectionGroup, name: &str) -> &'a mut dyn MessageSource {
    group.get_mut(name).unwrap().as_source().unwrap()
}

#[tokio::test]
async fn test_update_folders_is_idempotent() {
    let server = Server::with_folders(&["INBOX", "archive", "archive/2024", "[Gmail]"]);
    server
        .lock()
        .unwrap()
        .folder_flags
        .insert("[Gmail]".into(), ["\\Noselect".to_string()].into());
    let mut group = group_of(&[("work", &server)]);
    let mut cache = EmailCache::new("work");
    assert_eq!(cache.state(), CacheState::Disconnected);

    cache.update_folders(source(&mut group, "work")).await.unwrap();
    let first: Vec<_> = cache.folders().cloned().collect();
    cache.update_folders(source(&mut group, "work")).await.unwrap();
    let second: Vec<_> = cache.folders().cloned().collect();

    assert_eq!(first, second);
    assert_eq!(cache.state(), CacheState::FoldersSynced);
    let archive = cache.folder("archive").unwrap();
    assert!(archive.subfolders().contains("archive/2024"));
    assert!(!cache.folder("[Gmail]").unwrap().is_selectable());
}

#[tokio::test]
async fn test_folder_changes_are_mirrored() {
    let server = Server::with_folders(&["INBOX", "old"]);
    let mut group = group_of(&[("work", &server)]);
    let mut cache = EmailCache::new("work");
    cache.update_folders(source(&mut group, "work")).await.unwrap();

    {
        let mut server = server.lock().unwrap();
        server.folders.remove("old");
        server.folders.insert("new".into(), Vec::new());
        server
            .folder_flags
            .insert("INBOX".into(), ["\\Marked".to_string()].into());
    }
    cache.update_folders(source(&mut group, "work")).await.unwrap();

    let names: Vec<_> = cache.folders().map(|f| f.name().to_string()).collect();
    assert_eq!(names, ["INBOX", "new"]);
    assert!(cache.folder("INBOX").unwrap().flags().contains("\\Marked"));
}

#[tokio::test]
async fn test_messages_fetched_once_then_only_flags() {
    let server = Server::with_folders(&["INBOX", "[Gmail]"]);
    {
        let mut server = server.lock().unwrap();
        server.deliver("INBOX", &mail("a@example.com", "first"));
        server.deliver("INBOX", &mail("b@example.com", "second"));
        server
            .folder_flags
            .insert("[Gmail]".into(), ["\\Noselect".to_string()].into());
    }
    let mut group = group_of(&[("work", &server)]);
    let mut cache = EmailCache::new("work");

    cache.update(source(&mut group, "work")).await.unwrap();
    assert_eq!(cache.state(), CacheState::MessagesSynced);
    assert_eq!(cache.folder("INBOX").unwrap().len(), 2);
    let first = cache.message("INBOX", MessageId(1)).unwrap();
    assert_eq!(first.subject, "first");
    assert!(first.contents.is_empty(), "header-only fetch");

    {
        let mut server = server.lock().unwrap();
        server.calls.clear();
        server.folders.get_mut("INBOX").unwrap()[1].flags.insert("Seen".into());
        server.folders.get_mut("INBOX").unwrap().remove(0);
        server.deliver("INBOX", &mail("c@example.com", "third"));
    }
    cache.update(source(&mut group, "work")).await.unwrap();

    let inbox = cache.folder("INBOX").unwrap();
    let ids: Vec<_> = inbox.message_ids().collect();
    assert_eq!(ids, [MessageId(2), MessageId(3)]);
    assert!(inbox.message(MessageId(2)).unwrap().is_read());

    let calls = server.lock().unwrap().calls.clone();
    assert!(calls.contains(&"fetch Headers 1".to_string()), "{calls:?}");
    assert!(calls.contains(&"fetch_flags 1".to_string()), "{calls:?}");
    assert!(!calls.iter().any(|c| c == "open [Gmail]"), "{calls:?}");
}

#[tokio::test]
async fn test_unopenable_folder_is_skipped() {
    let server = Server::with_folders(&["INBOX", "Locked", "Sent"]);
    {
        let mut server = server.lock().unwrap();
        server.deliver("INBOX", &mail("a@example.com", "incoming"));
        server.deliver("Locked", &mail("b@example.com", "hidden"));
        server.deliver("Sent", &mail("me@example.com", "outgoing"));
        server.unopenable.insert("Locked".into());
    }
    let mut group = group_of(&[("work", &server)]);
    let mut cache = EmailCache::new("work");

    cache.update(source(&mut group, "work")).await.unwrap();

    assert_eq!(cache.state(), CacheState::MessagesSynced);
    assert!(cache.folder("Locked").unwrap().is_empty());
    assert_eq!(cache.folder("INBOX").unwrap().len(), 1);
    let sent: Vec<_> = cache.folder("Sent").unwrap().messages().collect();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "outgoing");
    assert!(!server.lock().unwrap().called("open Locked"));
}

#[tokio::test]
async fn test_mark_read_round_trip() {
    let server = Server::with_folders(&["INBOX"]);
    server
        .lock()
        .unwrap()
        .deliver("INBOX", &mail("a@example.com", "unread"));
    let mut group = group_of(&[("work", &server)]);
    let mut cache = EmailCache::new("work");
    cache.update(source(&mut group, "work")).await.unwrap();

    let message = cache.message("INBOX", MessageId(1)).unwrap().clone();
    assert!(!message.is_read());
    message
        .set_flag(&mut group, FlagChange::Add(vec!["Seen".into()]))
        .await
        .unwrap();
    assert!(!message.is_read(), "local flags wait for the server");

    cache.update(source(&mut group, "work")).await.unwrap();
    assert!(cache.message("INBOX", MessageId(1)).unwrap().is_read());
}

#[tokio::test]
async fn test_filter_moves_within_connection() {
    let server = Server::with_folders(&["INBOX", "archive/notifications"]);
    {
        let mut server = server.lock().unwrap();
        server.deliver("INBOX", &mail("Bot <notify@example.com>", "build done"));
        server.deliver("INBOX", &mail("friend@example.com", "lunch?"));
    }
    let mut group = group_of(&[("work", &server)]);
    let filter = MessageFilter::from_config(
        "notifications",
        &json!({
            "connections": ["work"],
            "condition": "from_address:=notify@example.com",
            "actions": ["move:archive/notifications"]
        }),
        &group,
    )
    .unwrap();

    let mut cache = EmailCache::new("work");
    cache.update(source(&mut group, "work")).await.unwrap();
    let matching: Vec<_> = cache
        .messages()
        .filter(|m| filter.applies_to(m))
        .cloned()
        .collect();
    assert_eq!(matching.len(), 1);

    filter
        .apply_unconditionally(&matching[0], &mut group)
        .await
        .unwrap();
    cache.update(source(&mut group, "work")).await.unwrap();
    cache.update(source(&mut group, "work")).await.unwrap();

    let inbox: Vec<_> = cache.folder("INBOX").unwrap().messages().collect();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].subject, "lunch?");
    let archived: Vec<_> = cache
        .folder("archive/notifications")
        .unwrap()
        .messages()
        .collect();
    assert_eq!(archived.len(), 1);
    assert_eq!(archived[0].from.as_ref().unwrap().address, "notify@example.com");
}

#[tokio::test]
async fn test_move_to_own_folder_is_noop() {
    let server = Server::with_folders(&["INBOX"]);
    server
        .lock()
        .unwrap()
        .deliver("INBOX", &mail("a@example.com", "stay"));
    let mut group = group_of(&[("work", &server)]);
    let mut cache = EmailCache::new("work");
    cache.update(source(&mut group, "work")).await.unwrap();
    let message = cache.message("INBOX", MessageId(1)).unwrap().clone();
    server.lock().unwrap().calls.clear();

    message.move_to(&mut group, "work", "INBOX").await.unwrap();

    let server = server.lock().unwrap();
    assert!(server.calls.is_empty(), "{:?}", server.calls);
    assert!(server.stored("INBOX", 1).is_some());
}

#[tokio::test]
async fn test_failed_copy_does_not_delete() {
    let server = Server::with_folders(&["INBOX"]);
    server
        .lock()
        .unwrap()
        .deliver("INBOX", &mail("a@example.com", "keep"));
    let mut group = group_of(&[("work", &server)]);
    let mut cache = EmailCache::new("work");
    cache.update(source(&mut group, "work")).await.unwrap();
    let message = cache.message("INBOX", MessageId(1)).unwrap().clone();

    let err = message.move_to(&mut group, "work", "missing").await.unwrap_err();
    assert!(matches!(err, Error::OperationFailed { .. }));

    let server = server.lock().unwrap();
    assert!(!server.called("store"));
    assert!(server.stored("INBOX", 1).unwrap().flags.is_empty());
}

#[tokio::test]
async fn test_move_across_connections() {
    let a = Server::with_folders(&["INBOX"]);
    let b = Server::with_folders(&["INBOX"]);
    let original = mail("a@example.com", "travelling");
    a.lock().unwrap().deliver_as("INBOX", 42, &original);
    a.lock()
        .unwrap()
        .folders
        .get_mut("INBOX")
        .unwrap()[0]
        .flags
        .insert("Flagged".into());
    let mut group = group_of(&[("a", &a), ("b", &b)]);

    let mut cache = EmailCache::new("a");
    cache.update(source(&mut group, "a")).await.unwrap();
    let message = cache.message("INBOX", MessageId(42)).unwrap().clone();

    message.move_to(&mut group, "b", "INBOX").await.unwrap();

    {
        let b = b.lock().unwrap();
        let arrived = &b.folders["INBOX"];
        assert_eq!(arrived.len(), 1);
        assert_eq!(arrived[0].data, original);
        assert!(arrived[0].flags.contains("Flagged"));
        assert_eq!(arrived[0].internal_date.as_deref(), Some("17-Jul-1996 02:44:25 -0700"));
        assert!(b.called("append INBOX"));
    }
    {
        let mut a = a.lock().unwrap();
        assert!(a.stored("INBOX", 42).unwrap().flags.contains("Deleted"));
        a.expunge("INBOX");
        assert!(a.stored("INBOX", 42).is_none());
    }
}

#[tokio::test]
async fn test_copy_across_connections_keeps_original() {
    let a = Server::with_folders(&["INBOX"]);
    let b = Server::with_folders(&["Archive"]);
    a.lock()
        .unwrap()
        .deliver("INBOX", &mail("a@example.com", "twin"));
    let mut group = group_of(&[("a", &a), ("b", &b)]);
    let mut cache = EmailCache::new("a");
    cache.update(source(&mut group, "a")).await.unwrap();
    let message = cache.message("INBOX", MessageId(1)).unwrap().clone();

    message.copy_to(&mut group, "b", "Archive").await.unwrap();

    assert_eq!(b.lock().unwrap().folders["Archive"].len(), 1);
    assert!(a.lock().unwrap().stored("INBOX", 1).unwrap().flags.is_empty());
}

#[tokio::test]
async fn test_purge_dead_keeps_order() {
    let servers: Vec<_> = (0..3).map(|_| Server::with_folders(&["INBOX"])).collect();
    let mut group = group_of(&[("a", &servers[0]), ("b", &servers[1]), ("c", &servers[2])]);
    assert_eq!(group.connect_all().await, 3);
    servers[1].lock().unwrap().dead = true;

    let removed = group.purge_dead().await;

    assert_eq!(removed, ["b"]);
    assert_eq!(group.names(), ["a", "c"]);
}

#[test]
fn test_config_missing_actions_is_construction_error() {
    let config = Config::from_json(
        r#"{
            "connections": {"work": {"protocol": "IMAP", "domain": "imap.example.com"}},
            "filters": {"broken": {"connections": ["work"], "condition": "subject:~x"}}
        }"#,
    )
    .unwrap();
    let group = config
        .connection_group(Arc::new(maildaemon_core::StaticCredentials), None)
        .unwrap();

    let err = config.message_filters(&group).unwrap_err();
    match err {
        Error::Construction { section, .. } => assert_eq!(section, "filter: broken"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_daemon_loop_paces_and_disconnects() {
    let server = Server::with_folders(&["INBOX", "Archive"]);
    server
        .lock()
        .unwrap()
        .deliver("INBOX", &mail("notify@example.com", "ping"));
    let group = group_of(&[("work", &server)]);
    let filter = MessageFilter::from_config(
        "archive",
        &json!({
            "connections": ["work"],
            "condition": [["from_address:=notify@example.com"]],
            "actions": ["move:Archive", "mark:read"]
        }),
        &group,
    )
    .unwrap();
    let mut daemon = DaemonGroup::new(group, vec![filter]);
    assert_eq!(daemon.caches().len(), 1);

    let started = tokio::time::Instant::now();
    let iterations = daemon.run(Some(3), Duration::from_secs(4)).await.unwrap();

    assert_eq!(iterations, 3);
    assert!(started.elapsed() >= Duration::from_secs(8));
    let server = server.lock().unwrap();
    assert!(!server.connected);
    assert!(server.folders["INBOX"].is_empty());
    let archived = &server.folders["Archive"];
    assert_eq!(archived.len(), 1);
    assert_eq!(
        daemon
            .cache("work")
            .unwrap()
            .folder("Archive")
            .unwrap()
            .len(),
        1
    );
}

#[tokio::test]
async fn test_update_isolates_failing_connection() {
    let broken = Server::with_folders(&["INBOX"]);
    let healthy = Server::with_folders(&["INBOX"]);
    {
        let mut broken = broken.lock().unwrap();
        broken.deliver("INBOX", &mail("a@example.com", "unreachable"));
        broken.failing_list = true;
    }
    healthy
        .lock()
        .unwrap()
        .deliver("INBOX", &mail("b@example.com", "reachable"));
    let group = group_of(&[("broken", &broken), ("healthy", &healthy)]);
    let mut daemon = DaemonGroup::new(group, Vec::new());
    assert_eq!(daemon.connections_mut().connect_all().await, 2);

    daemon.update().await;

    let failed = daemon.cache("broken").unwrap();
    assert_eq!(failed.state(), CacheState::Disconnected);
    assert_eq!(failed.messages().count(), 0);
    let cache = daemon.cache("healthy").unwrap();
    assert_eq!(cache.state(), CacheState::MessagesSynced);
    assert_eq!(cache.message("INBOX", MessageId(1)).unwrap().subject, "reachable");
    assert_eq!(daemon.connections().len(), 2);
}

fn filter(name: &str, condition: &str, action: &str, group: &ConnectionGroup) -> MessageFilter {
    MessageFilter::from_config(
        name,
        &json!({"connections": ["work"], "condition": condition, "actions": [action]}),
        group,
    )
    .unwrap()
}

#[tokio::test]
async fn test_first_matching_filter_wins() {
    let server = Server::with_folders(&["INBOX"]);
    {
        let mut server = server.lock().unwrap();
        server.deliver("INBOX", &mail("notify@example.com", "build failed"));
        server.deliver("INBOX", &mail("friend@example.com", "lunch?"));
    }
    let group = group_of(&[("work", &server)]);
    let filters = vec![
        filter("by-sender", "from_address:=notify@example.com", "mark:read", &group),
        filter("by-subject", "subject:~build", "mark:flagged", &group),
    ];
    let mut daemon = DaemonGroup::new(group, filters);
    daemon.update().await;

    assert_eq!(daemon.apply_filters().await.unwrap(), 1);

    let server = server.lock().unwrap();
    let matched = &server.stored("INBOX", 1).unwrap().flags;
    assert!(matched.contains("Seen"));
    assert!(!matched.contains("Flagged"));
    assert!(server.stored("INBOX", 2).unwrap().flags.is_empty());
}

#[tokio::test]
async fn test_filters_skip_deleted_messages() {
    let server = Server::with_folders(&["INBOX"]);
    {
        let mut server = server.lock().unwrap();
        server.keep_deleted = true;
        server.deliver("INBOX", &mail("a@example.com", "gone"));
        server.deliver("INBOX", &mail("a@example.com", "still here"));
        server.folders.get_mut("INBOX").unwrap()[0]
            .flags
            .insert("Deleted".into());
    }
    let group = group_of(&[("work", &server)]);
    let filters = vec![filter("star", "from_address:=a@example.com", "mark:flagged", &group)];
    let mut daemon = DaemonGroup::new(group, filters);
    daemon.update().await;
    let cache = daemon.cache("work").unwrap();
    assert!(cache.message("INBOX", MessageId(1)).unwrap().is_deleted());

    assert_eq!(daemon.apply_filters().await.unwrap(), 1);

    let server = server.lock().unwrap();
    assert!(!server.stored("INBOX", 1).unwrap().flags.contains("Flagged"));
    assert!(server.stored("INBOX", 2).unwrap().flags.contains("Flagged"));
}

#[tokio::test(start_paused = true)]
async fn test_daemon_stops_when_every_connection_died() {
    let server = Server::with_folders(&["INBOX"]);
    server.lock().unwrap().dead = true;
    let group = group_of(&[("work", &server)]);

    let iterations = run_daemon_group(group, Vec::new(), None).await.unwrap();

    assert_eq!(iterations, 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_action_stops_the_loop() {
    let server = Server::with_folders(&["INBOX"]);
    server
        .lock()
        .unwrap()
        .deliver("INBOX", &mail("a@example.com", "nowhere to go"));
    let group = group_of(&[("work", &server)]);
    let filter = MessageFilter::from_config(
        "broken",
        &json!({
            "connections": ["work"],
            "condition": "subject:~nowhere",
            "actions": ["move:Missing"]
        }),
        &group,
    )
    .unwrap();

    let err = DaemonGroup::new(group, vec![filter])
        .run(None, Duration::from_secs(4))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::OperationFailed { ref op, .. } if op == "copy"));
    assert!(!server.lock().unwrap().connected);
}
